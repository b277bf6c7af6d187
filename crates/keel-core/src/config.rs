//! Configuration types and parsing for .keel.yaml

use crate::error::{CoreError, CoreResult};
use crate::template::{Template, TemplateCatalog};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default config file name
pub const CONFIG_FILE: &str = ".keel.yaml";

/// Default migrations directory, relative to the config file
pub const DEFAULT_MIGRATIONS_PATH: &str = "./migrations";

/// Default ledger table name
pub const DEFAULT_LEDGER_TABLE: &str = "migrations";

/// Env var supplying the project ID
pub const ENV_PROJECT_ID: &str = "KEEL_PROJECT_ID";

/// Env var supplying the instance ID
pub const ENV_INSTANCE_ID: &str = "KEEL_INSTANCE_ID";

/// Env var supplying the database ID
pub const ENV_DATABASE_ID: &str = "KEEL_DATABASE_ID";

/// Env var naming the emulator data directory; its presence selects the emulator
pub const ENV_EMULATOR_DIR: &str = "KEEL_EMULATOR_DIR";

/// Emulator data directory used when emulation is forced without `KEEL_EMULATOR_DIR`
pub const DEFAULT_EMULATOR_DIR: &str = ".keel/emulator";

/// Project configuration from .keel.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding migration files
    #[serde(default = "default_migrations_path")]
    pub path: String,

    /// Project identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,

    /// Instance identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,

    /// Database identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database_id: String,

    /// Ledger table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Cloud target connection settings
    #[serde(default, skip_serializing_if = "DatabaseConfig::is_empty")]
    pub database: DatabaseConfig,

    /// Named SQL templates, merged over the built-ins
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, Template>,
}

/// Cloud target connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB database path (or `:memory:`) used outside the emulator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DatabaseConfig {
    fn is_empty(&self) -> bool {
        self.path.is_none()
    }
}

/// Identifier overrides coming from the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Project ID override
    pub project_id: Option<String>,
    /// Instance ID override
    pub instance_id: Option<String>,
    /// Database ID override
    pub database_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: default_migrations_path(),
            project_id: String::new(),
            instance_id: String::new(),
            database_id: String::new(),
            table: default_table(),
            database: DatabaseConfig::default(),
            templates: BTreeMap::new(),
        }
    }
}

fn default_migrations_path() -> String {
    DEFAULT_MIGRATIONS_PATH.to_string()
}

fn default_table() -> String {
    DEFAULT_LEDGER_TABLE.to_string()
}

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::ConfigNotFound {
                path: path.display().to_string(),
            },
            _ => CoreError::io_at(path, e),
        })?;
        if !metadata.is_file() {
            return Err(CoreError::NotARegularFile {
                path: path.display().to_string(),
                kind: "config".to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io_at(path, e))?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write a new config file, refusing to overwrite an existing one
    pub fn create(&self, path: &Path) -> CoreResult<()> {
        if path.exists() {
            return Err(CoreError::ConfigExists {
                path: path.display().to_string(),
            });
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io_at(parent, e))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|e| CoreError::io_at(path, e))?;
        Ok(())
    }

    /// Fill defaults that an empty or partial config leaves unset
    pub fn fill_defaults(&mut self) {
        if self.path.is_empty() {
            self.path = default_migrations_path();
        }
        if self.table.is_empty() {
            self.table = default_table();
        }
    }

    /// Apply command-line overrides, then fall back to environment variables
    /// for identifiers still unset
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        fn apply(field: &mut String, flag: &Option<String>, env_var: &str) {
            if let Some(value) = flag.as_ref().filter(|v| !v.is_empty()) {
                *field = value.clone();
            }
            if field.is_empty() {
                if let Ok(value) = std::env::var(env_var) {
                    *field = value;
                }
            }
        }

        apply(&mut self.project_id, &overrides.project_id, ENV_PROJECT_ID);
        apply(&mut self.instance_id, &overrides.instance_id, ENV_INSTANCE_ID);
        apply(&mut self.database_id, &overrides.database_id, ENV_DATABASE_ID);
    }

    /// Validate the identifiers every database-facing command needs
    pub fn validate(&self) -> CoreResult<()> {
        let required = [
            ("project ID", &self.project_id),
            ("instance ID", &self.instance_id),
            ("database ID", &self.database_id),
        ];
        for (what, value) in required {
            if value.is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{what} required"),
                });
            }
        }

        if self.path.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migrations path required".to_string(),
            });
        }

        if !identifier_pattern().is_match(&self.table) {
            return Err(CoreError::ConfigInvalid {
                message: format!("ledger table {:?} is not a valid identifier", self.table),
            });
        }

        Ok(())
    }

    /// Migrations directory resolved against the config file's directory
    pub fn migrations_dir(&self, config_path: &Path) -> PathBuf {
        resolve_relative(config_path, &self.path)
    }

    /// Cloud target database path resolved against the config file's directory
    pub fn database_path(&self, config_path: &Path) -> Option<PathBuf> {
        self.database.path.as_deref().map(|p| {
            if p == ":memory:" {
                PathBuf::from(p)
            } else {
                resolve_relative(config_path, p)
            }
        })
    }

    /// Merged template catalog for this config
    pub fn template_catalog(&self) -> TemplateCatalog {
        TemplateCatalog::with_overrides(&self.templates)
    }

    /// `projects/{project}/instances`
    pub fn instances_name(&self) -> String {
        format!("projects/{}/instances", self.project_id)
    }

    /// `projects/{project}/instances/{instance}`
    pub fn instance_name(&self) -> String {
        format!("{}/{}", self.instances_name(), self.instance_id)
    }

    /// `projects/{project}/instances/{instance}/databases/{database}`
    pub fn database_name(&self) -> String {
        format!("{}/databases/{}", self.instance_name(), self.database_id)
    }
}

fn resolve_relative(config_path: &Path, p: &str) -> PathBuf {
    let p = Path::new(p);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(p),
        _ => p.to_path_buf(),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
