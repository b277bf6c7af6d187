//! Migration session bound to one config file.
//!
//! A [`Migrations`] session owns the loaded config, the migration store and
//! the lazily-opened database connection. Instance and database provisioning
//! runs at most once per session, and the connection is released exactly
//! once, by [`Migrations::close`] or on drop.

use crate::bootstrap::{synthesize, BOOTSTRAP_NAME};
use crate::error::MigrateResult;
use crate::upgrade::{UpgradeHooks, UpgradeSummary, Upgrader};
use chrono::{DateTime, Utc};
use keel_core::config::{DEFAULT_EMULATOR_DIR, ENV_EMULATOR_DIR};
use keel_core::{
    Config, ConfigOverrides, CoreError, DescriptorSet, ExecutionEnvironment, Migration,
    MigrationStore, StatementInput,
};
use keel_db::{Connector, Database, DatabaseTarget, DuckDbConnector, LedgerRow};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a session is opened
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Identifier overrides from the command line
    pub overrides: ConfigOverrides,
    /// Force (`Some(true)`) or disable (`Some(false)`) the emulator;
    /// `None` detects it from `KEEL_EMULATOR_DIR`
    pub emulator: Option<bool>,
    /// Fail when the config file is missing instead of starting from defaults
    pub config_required: bool,
}

impl SessionOptions {
    /// Emulator data directory, or `None` for the cloud environment
    fn emulator_dir(&self, config_path: &Path) -> Option<PathBuf> {
        let from_env = std::env::var(ENV_EMULATOR_DIR)
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        match self.emulator {
            Some(false) => None,
            Some(true) => Some(from_env.unwrap_or_else(|| default_emulator_dir(config_path))),
            None => from_env,
        }
    }
}

fn default_emulator_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(DEFAULT_EMULATOR_DIR),
        _ => PathBuf::from(DEFAULT_EMULATOR_DIR),
    }
}

/// Ledger state of one migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    /// Not applied yet
    Pending,
    /// Ledger row without `complete_time`
    Started,
    /// Ledger row with `complete_time`
    Completed,
    /// Superseded by a squash; never gets a ledger row
    Squashed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Pending => write!(f, "pending"),
            MigrationState::Started => write!(f, "started"),
            MigrationState::Completed => write!(f, "completed"),
            MigrationState::Squashed => write!(f, "squashed"),
        }
    }
}

/// One line of `status` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub id: u32,
    pub name: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash_id: Option<u32>,
    pub state: MigrationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<DateTime<Utc>>,
}

/// A migration session
pub struct Migrations {
    config_path: PathBuf,
    config: Config,
    store: MigrationStore,
    environment: ExecutionEnvironment,
    emulator_dir: Option<PathBuf>,
    connector: Option<Arc<dyn Connector>>,
    backend: Option<Arc<dyn Database>>,
    instance_ensured: bool,
    database_ensured: bool,
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrations")
            .field("config_path", &self.config_path)
            .field("environment", &self.environment)
            .field("latest_id", &self.store.latest_id())
            .field("connected", &self.backend.is_some())
            .finish()
    }
}

impl Migrations {
    /// Load the config and migrations, apply overrides, and validate.
    ///
    /// A missing config file is only an error when
    /// [`SessionOptions::config_required`] is set; otherwise the session starts
    /// from defaults and takes identifiers from flags and env vars.
    pub fn open(config_path: impl Into<PathBuf>, options: &SessionOptions) -> MigrateResult<Self> {
        let config_path = config_path.into();
        let mut config = match Config::load(&config_path) {
            Ok(config) => config,
            Err(CoreError::ConfigNotFound { .. }) if !options.config_required => {
                log::debug!(
                    "{} not found, using defaults",
                    config_path.display()
                );
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.fill_defaults();
        config.apply_overrides(&options.overrides);
        config.validate()?;
        Self::build(config_path, config, options)
    }

    /// Write a new config file and create the migrations directory.
    ///
    /// Identifiers from flags and env vars are written into the file. The
    /// target instance and database are provisioned when all identifiers
    /// are known.
    pub async fn init(
        config_path: impl Into<PathBuf>,
        options: &SessionOptions,
    ) -> MigrateResult<Self> {
        let config_path = config_path.into();
        let mut config = Config::default();
        config.apply_overrides(&options.overrides);
        config.create(&config_path)?;
        log::info!("Created {}", config_path.display());

        let dir = config.migrations_dir(&config_path);
        std::fs::create_dir_all(&dir).map_err(|e| CoreError::io_at(&dir, e))?;

        let ready = config.validate().is_ok();
        let mut session = Self::build(config_path, config, options)?;
        if ready {
            session.ensure_environment().await?;
        } else {
            log::debug!("Identifiers incomplete, skipping provisioning");
        }
        Ok(session)
    }

    fn build(config_path: PathBuf, config: Config, options: &SessionOptions) -> MigrateResult<Self> {
        let store = MigrationStore::load(
            &config.migrations_dir(&config_path),
            config.template_catalog(),
        )?;
        let emulator_dir = options.emulator_dir(&config_path);
        let environment = if emulator_dir.is_some() {
            ExecutionEnvironment::Emulator
        } else {
            ExecutionEnvironment::Cloud
        };
        log::debug!(
            "Session for {} in the {environment} environment with {} migration(s)",
            config_path.display(),
            store.len()
        );

        Ok(Self {
            config_path,
            config,
            store,
            environment,
            emulator_dir,
            connector: None,
            backend: None,
            instance_ensured: false,
            database_ensured: false,
        })
    }

    /// Use `connector` instead of the DuckDB connector chosen from the config
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn store(&self) -> &MigrationStore {
        &self.store
    }

    /// Environment statements are filtered for
    pub fn environment(&self) -> ExecutionEnvironment {
        self.environment
    }

    pub fn latest_id(&self) -> u32 {
        self.store.latest_id()
    }

    pub fn get(&self, id: u32) -> MigrateResult<&Migration> {
        Ok(self.store.get(id)?)
    }

    /// Path of migration `id`'s file, if it exists
    pub fn migration_path(&self, id: u32) -> Option<PathBuf> {
        self.store
            .get(id)
            .ok()
            .map(|m| self.store.dir().join(m.file_name()))
    }

    /// Create a migration from statement inputs
    pub fn create(
        &mut self,
        name: &str,
        inputs: &[StatementInput],
        squash_target: Option<u32>,
    ) -> MigrateResult<&Migration> {
        Ok(self.store.create(name, inputs, squash_target)?)
    }

    /// Append a statement to migration `id`
    pub fn add(&mut self, id: u32, input: &StatementInput) -> MigrateResult<&Migration> {
        Ok(self.store.add(id, input)?)
    }

    /// Attach a descriptor set to migration `id`
    pub fn add_descriptor_set(
        &mut self,
        id: u32,
        name: &str,
        set: DescriptorSet,
    ) -> MigrateResult<&Migration> {
        Ok(self.store.add_descriptor_set(id, name, set)?)
    }

    /// Attach the serialized descriptor set stored at `path`
    pub fn add_descriptor_file(
        &mut self,
        id: u32,
        name: &str,
        path: &Path,
    ) -> MigrateResult<&Migration> {
        let bytes = std::fs::read(path).map_err(|e| CoreError::io_at(path, e))?;
        if bytes.is_empty() {
            return Err(CoreError::InvalidDescriptorSet {
                name: name.to_string(),
                message: format!("{} is empty", path.display()),
            }
            .into());
        }
        self.add_descriptor_set(id, name, DescriptorSet::new(bytes))
    }

    /// Create a baseline migration from the target's live schema
    pub async fn bootstrap(&mut self, name: Option<&str>) -> MigrateResult<&Migration> {
        let db = self.connect().await?;
        let schema = db.live_schema().await?;
        let data = synthesize(&schema, &self.config.table)?;
        let name = name.filter(|n| !n.trim().is_empty()).unwrap_or(BOOTSTRAP_NAME);
        log::info!(
            "Bootstrapping {} statement(s) from {}",
            data.upgrade.len(),
            self.config.database_name()
        );
        Ok(self.store.create_from(name, data)?)
    }

    /// Apply every pending migration
    pub async fn upgrade(
        &mut self,
        hooks: &mut dyn UpgradeHooks,
        cancel: &CancellationToken,
    ) -> MigrateResult<UpgradeSummary> {
        let db = self.connect().await?;
        Upgrader::new(
            &self.store,
            db.as_ref(),
            &self.config.table,
            self.environment,
            cancel,
        )
        .run(hooks)
        .await
    }

    /// Ledger state of every migration in the store
    pub async fn status(&mut self) -> MigrateResult<Vec<MigrationStatus>> {
        let db = self.connect().await?;
        let rows = if db.table_exists(&self.config.table).await? {
            db.ledger_rows(&self.config.table).await?
        } else {
            Vec::new()
        };
        Ok(project_status(&self.store, &rows))
    }

    /// Release the database connection. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            log::debug!("Closing {} connection", backend.db_type());
        }
    }

    fn target(&self) -> DatabaseTarget {
        DatabaseTarget::from(&self.config)
    }

    fn connector(&mut self) -> MigrateResult<Arc<dyn Connector>> {
        if let Some(connector) = &self.connector {
            return Ok(Arc::clone(connector));
        }
        let connector: Arc<dyn Connector> = match &self.emulator_dir {
            Some(root) => Arc::new(DuckDbConnector::emulator(root.clone())),
            None => {
                let path = self.config.database_path(&self.config_path).ok_or_else(|| {
                    CoreError::ConfigInvalid {
                        message: "database.path required outside the emulator".to_string(),
                    }
                })?;
                Arc::new(DuckDbConnector::cloud(path))
            }
        };
        self.connector = Some(Arc::clone(&connector));
        Ok(connector)
    }

    async fn ensure_environment(&mut self) -> MigrateResult<()> {
        if self.environment != ExecutionEnvironment::Emulator {
            return Ok(());
        }
        let connector = self.connector()?;
        let target = self.target();
        if !self.instance_ensured {
            connector.ensure_instance(&target).await?;
            self.instance_ensured = true;
        }
        if !self.database_ensured {
            connector.ensure_database(&target).await?;
            self.database_ensured = true;
        }
        Ok(())
    }

    async fn connect(&mut self) -> MigrateResult<Arc<dyn Database>> {
        self.ensure_environment().await?;
        if let Some(backend) = &self.backend {
            return Ok(Arc::clone(backend));
        }
        let connector = self.connector()?;
        let backend = connector.connect(&self.target()).await?;
        log::debug!(
            "Connected to {} ({})",
            self.config.database_name(),
            backend.db_type()
        );
        self.backend = Some(Arc::clone(&backend));
        Ok(backend)
    }
}

impl Drop for Migrations {
    fn drop(&mut self) {
        self.close();
    }
}

/// Combine ledger rows with the squash walk the next upgrade would take
fn project_status(store: &MigrationStore, rows: &[LedgerRow]) -> Vec<MigrationStatus> {
    let rows: BTreeMap<u32, &LedgerRow> = rows.iter().map(|row| (row.id, row)).collect();
    let head = rows.keys().next_back().copied().unwrap_or(0);

    let mut squashed = Vec::new();
    let mut id = head;
    while id < store.latest_id() {
        id += 1;
        let start = id;
        if let Some(target) = store.squashed_by(start).filter(|t| *t > start) {
            squashed.extend(start..target);
            id = target;
        }
        if let Ok(migration) = store.get(id) {
            if migration.squash_id().is_some_and(|s| s != start) {
                squashed.push(id);
            }
        }
    }

    store
        .iter()
        .map(|migration| {
            let id = migration.id();
            let row = rows.get(&id);
            let state = match row {
                Some(row) if row.complete_time.is_some() => MigrationState::Completed,
                Some(_) => MigrationState::Started,
                None if id <= head || squashed.contains(&id) => MigrationState::Squashed,
                None => MigrationState::Pending,
            };
            MigrationStatus {
                id,
                name: migration.name(),
                file_name: migration.file_name().to_string(),
                squash_id: migration.squash_id(),
                state,
                start_time: row.map(|r| r.start_time),
                complete_time: row.and_then(|r| r.complete_time),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
