//! Migration entity, its YAML file format, and file-name conventions.

use crate::error::{CoreError, CoreResult};
use crate::statement::Statement;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Extension of migration files
pub const MIGRATION_FILE_EXT: &str = ".yaml";

/// Squash marker carried by bootstrapped baseline migrations
pub const BASELINE_SQUASH_ID: u32 = 0;

/// Serialized type descriptors attached to schema changes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorSet(Vec<u8>);

impl DescriptorSet {
    /// Wrap serialized descriptor bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether no bytes are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for DescriptorSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for DescriptorSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s.trim())
            .map(DescriptorSet)
            .map_err(serde::de::Error::custom)
    }
}

/// On-disk body of a migration file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationFile {
    /// Ordered upgrade statements
    #[serde(default)]
    pub upgrade: Vec<Statement>,

    /// Earliest migration ID this one supersedes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash_id: Option<u32>,

    /// Named descriptor sets referenced by statements
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub descriptor_sets: BTreeMap<String, DescriptorSet>,
}

impl MigrationFile {
    /// Read and validate a migration file
    pub fn read(path: &Path, id: u32) -> CoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| CoreError::io_at(path, e))?;
        let file: MigrationFile =
            serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidMigration {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        file.validate(id)
            .map_err(|message| CoreError::InvalidMigration {
                path: path.display().to_string(),
                message,
            })?;
        Ok(file)
    }

    /// Write the file atomically (temp file, then rename)
    pub fn write(&self, path: &Path) -> CoreResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, yaml).map_err(|e| CoreError::io_at(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| CoreError::io_at(path, e))?;
        Ok(())
    }

    fn validate(&self, id: u32) -> Result<(), String> {
        for (pos, statement) in self.upgrade.iter().enumerate() {
            if statement.sql.trim().is_empty() {
                return Err(format!("upgrade[{pos}]: sql must not be empty"));
            }
            if statement.descriptor_set.as_deref() == Some("") {
                return Err(format!("upgrade[{pos}]: descriptor_set must not be empty"));
            }
        }
        if let Some(squash_id) = self.squash_id {
            if squash_id >= id {
                return Err(format!(
                    "squash_id {squash_id} must be lower than the migration ID {id}"
                ));
            }
        }
        if self.descriptor_sets.keys().any(|name| name.is_empty()) {
            return Err("descriptor set names must not be empty".to_string());
        }
        Ok(())
    }
}

/// A migration known to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    id: u32,
    file_name: String,
    data: MigrationFile,
}

impl Migration {
    pub(crate) fn new(id: u32, file_name: String, data: MigrationFile) -> Self {
        Self {
            id,
            file_name,
            data,
        }
    }

    /// Migration ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// File name inside the migrations directory
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Slug portion of the file name
    pub fn slug(&self) -> &str {
        let rest = match self.file_name.split_once('_') {
            Some((_, rest)) => rest,
            None => return "",
        };
        rest.strip_suffix(MIGRATION_FILE_EXT).unwrap_or(rest)
    }

    /// Human-readable name (slug with spaces)
    pub fn name(&self) -> String {
        self.slug().replace('_', " ")
    }

    /// Squash marker, if any
    pub fn squash_id(&self) -> Option<u32> {
        self.data.squash_id
    }

    /// Upgrade statements in authored order
    pub fn statements(&self) -> &[Statement] {
        &self.data.upgrade
    }

    /// Descriptor set by name
    pub fn descriptor_set(&self, name: &str) -> Option<&DescriptorSet> {
        self.data.descriptor_sets.get(name)
    }

    /// Names of attached descriptor sets
    pub fn descriptor_set_names(&self) -> impl Iterator<Item = &str> {
        self.data.descriptor_sets.keys().map(String::as_str)
    }

    /// File body
    pub fn data(&self) -> &MigrationFile {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut MigrationFile {
        &mut self.data
    }
}

fn slug_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("valid regex"))
}

fn repeated_underscores() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_+").expect("valid regex"))
}

/// Lowercase, collapse anything outside `[a-z0-9_]` into single underscores,
/// and trim leading/trailing `-` and `_`
pub fn slugify(s: &str) -> String {
    let lower = s.to_lowercase();
    let replaced = slug_chars().replace_all(&lower, "_");
    let collapsed = repeated_underscores().replace_all(&replaced, "_");
    collapsed.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// `{id:05}_{slug}.yaml`
pub fn migration_file_name(id: u32, slug: &str) -> String {
    format!("{id:05}_{slug}{MIGRATION_FILE_EXT}")
}

/// Numeric prefix before the first `_` of a migration file name
pub fn parse_migration_id(file_name: &str) -> Option<u32> {
    if !file_name.ends_with(MIGRATION_FILE_EXT) {
        return None;
    }
    let (prefix, _) = file_name.split_once('_')?;
    prefix.parse().ok()
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
