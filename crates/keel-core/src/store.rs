//! On-disk migration store.
//!
//! The migrations directory is the source of truth. [`MigrationStore::load`]
//! rebuilds the in-memory view from it, and every mutation writes the file
//! first and only then updates the view.

use crate::error::{CoreError, CoreResult};
use crate::migration::{
    migration_file_name, parse_migration_id, slugify, DescriptorSet, Migration, MigrationFile,
    BASELINE_SQUASH_ID,
};
use crate::statement::StatementInput;
use crate::template::TemplateCatalog;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Slug used when neither a name nor a template name is available
pub const FALLBACK_SLUG: &str = "none";

/// Ordered set of migrations backed by a directory of YAML files
#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
    catalog: TemplateCatalog,
    migrations: BTreeMap<u32, Migration>,
    squash: BTreeMap<u32, u32>,
}

impl MigrationStore {
    /// Scan `dir` and load every migration file in it.
    ///
    /// A missing directory yields an empty store. Files whose names do not
    /// start with a numeric ID are skipped.
    pub fn load(dir: &Path, catalog: TemplateCatalog) -> CoreResult<Self> {
        let mut store = Self {
            dir: dir.to_path_buf(),
            catalog,
            migrations: BTreeMap::new(),
            squash: BTreeMap::new(),
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Migrations directory {} does not exist yet", dir.display());
                return Ok(store);
            }
            Err(e) => return Err(CoreError::io_at(dir, e)),
        };

        let mut files: BTreeMap<u32, String> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::io_at(dir, e))?;
            let file_type = entry.file_type().map_err(|e| CoreError::io_at(dir, e))?;
            if !file_type.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(id) = parse_migration_id(&file_name) else {
                log::debug!("Skipping {file_name}: not a migration file");
                continue;
            };
            if let Some(existing) = files.get(&id) {
                let (file1, file2) = if *existing < file_name {
                    (existing.clone(), file_name)
                } else {
                    (file_name, existing.clone())
                };
                return Err(CoreError::DuplicateMigration { id, file1, file2 });
            }
            files.insert(id, file_name);
        }

        for (id, file_name) in files {
            let data = MigrationFile::read(&dir.join(&file_name), id)?;
            store.insert(Migration::new(id, file_name, data));
        }

        log::debug!(
            "Loaded {} migrations from {} (latest {})",
            store.migrations.len(),
            dir.display(),
            store.latest_id()
        );
        Ok(store)
    }

    /// Directory backing this store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Merged template catalog
    pub fn templates(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Highest known migration ID, 0 when empty
    pub fn latest_id(&self) -> u32 {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    /// Migration by ID
    pub fn get(&self, id: u32) -> CoreResult<&Migration> {
        self.migrations
            .get(&id)
            .ok_or(CoreError::MigrationNotFound { id })
    }

    /// Whether a migration with this ID exists
    pub fn contains(&self, id: u32) -> bool {
        self.migrations.contains_key(&id)
    }

    /// Migrations in ID order
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    /// Number of migrations
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the store holds no migrations
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Highest ID of the migrations squashing `id`, if any
    pub fn squashed_by(&self, id: u32) -> Option<u32> {
        self.squash.get(&id).copied()
    }

    /// Squash index: squash target ID to the highest squashing migration ID
    pub fn squash_index(&self) -> &BTreeMap<u32, u32> {
        &self.squash
    }

    /// Create a new migration with ID `latest_id + 1`.
    ///
    /// An empty `inputs` list resolves a single statement from the default
    /// template. When `name` slugifies to nothing, the slug falls back to the
    /// first template used, then to `none`.
    pub fn create(
        &mut self,
        name: &str,
        inputs: &[StatementInput],
        squash_target: Option<u32>,
    ) -> CoreResult<&Migration> {
        let id = self.next_id();
        if let Some(target) = squash_target {
            self.check_squash_target(id, target)?;
        }

        let default_input = [StatementInput::default()];
        let inputs = if inputs.is_empty() {
            &default_input[..]
        } else {
            inputs
        };

        let upgrade = inputs
            .iter()
            .map(|input| self.catalog.resolve(input))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut slug = slugify(name);
        if slug.is_empty() {
            slug = inputs
                .iter()
                .find(|input| input.sql.trim().is_empty())
                .map(|input| {
                    slugify(
                        input
                            .template
                            .as_deref()
                            .filter(|t| !t.is_empty())
                            .unwrap_or(self.catalog.default_name()),
                    )
                })
                .unwrap_or_default();
        }
        if slug.is_empty() {
            slug = FALLBACK_SLUG.to_string();
        }

        let data = MigrationFile {
            upgrade,
            squash_id: squash_target,
            descriptor_sets: BTreeMap::new(),
        };
        self.write_new(id, &slug, data)
    }

    /// Store a fully-formed migration body under a new ID
    pub fn create_from(&mut self, name: &str, data: MigrationFile) -> CoreResult<&Migration> {
        let id = self.next_id();
        let mut slug = slugify(name);
        if slug.is_empty() {
            slug = FALLBACK_SLUG.to_string();
        }
        self.write_new(id, &slug, data)
    }

    /// Append one resolved statement to migration `id`
    pub fn add(&mut self, id: u32, input: &StatementInput) -> CoreResult<&Migration> {
        let statement = self.catalog.resolve(input)?;
        self.update(id, |data| {
            data.upgrade.push(statement);
            Ok(())
        })
    }

    /// Attach a named descriptor set to migration `id`, replacing any set of
    /// the same name
    pub fn add_descriptor_set(
        &mut self,
        id: u32,
        name: &str,
        set: DescriptorSet,
    ) -> CoreResult<&Migration> {
        if name.trim().is_empty() {
            return Err(CoreError::InvalidDescriptorSet {
                name: name.to_string(),
                message: "name must not be empty".to_string(),
            });
        }
        self.update(id, |data| {
            data.descriptor_sets.insert(name.to_string(), set);
            Ok(())
        })
    }

    fn next_id(&self) -> u32 {
        self.latest_id() + 1
    }

    fn check_squash_target(&self, id: u32, target: u32) -> CoreResult<()> {
        let migration = self.get(target)?;
        if target >= id {
            return Err(CoreError::InvalidSquashTarget {
                id,
                target,
                reason: "target must be lower than the new migration".to_string(),
            });
        }
        match migration.squash_id() {
            Some(BASELINE_SQUASH_ID) => Err(CoreError::BaselineSquash { target }),
            Some(root) => Err(CoreError::SquashConflict { target, root }),
            None => Ok(()),
        }
    }

    fn write_new(&mut self, id: u32, slug: &str, data: MigrationFile) -> CoreResult<&Migration> {
        fs::create_dir_all(&self.dir).map_err(|e| CoreError::io_at(&self.dir, e))?;
        let file_name = migration_file_name(id, slug);
        data.write(&self.dir.join(&file_name))?;
        log::debug!("Created migration {id} ({file_name})");

        self.insert(Migration::new(id, file_name, data));
        self.get(id)
    }

    fn update<F>(&mut self, id: u32, apply: F) -> CoreResult<&Migration>
    where
        F: FnOnce(&mut MigrationFile) -> CoreResult<()>,
    {
        let dir = self.dir.clone();
        let migration = self
            .migrations
            .get_mut(&id)
            .ok_or(CoreError::MigrationNotFound { id })?;

        let mut data = migration.data().clone();
        apply(&mut data)?;
        data.write(&dir.join(migration.file_name()))?;
        *migration.data_mut() = data;
        log::debug!("Updated migration {id} ({})", migration.file_name());

        self.get(id)
    }

    fn insert(&mut self, migration: Migration) {
        let id = migration.id();
        if let Some(target) = migration.squash_id() {
            let entry = self.squash.entry(target).or_insert(id);
            *entry = (*entry).max(id);
        }
        self.migrations.insert(id, migration);
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
