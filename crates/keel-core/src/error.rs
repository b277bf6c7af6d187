//! Error types for keel-core

use thiserror::Error;

/// Core error type for Keel
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config {path}: {message}")]
    ConfigParseError { path: String, message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Config file already exists (init)
    #[error("[E004] {path:?} already exists")]
    ConfigExists { path: String },

    /// E005: Expected a regular file
    #[error("[E005] {path:?} is not a regular {kind} file")]
    NotARegularFile { path: String, kind: String },

    /// E010: Migration not found
    #[error("[E010] Migration {id} not found")]
    MigrationNotFound { id: u32 },

    /// E011: Two files on disk claim the same migration ID
    #[error("[E011] Migration {id} has conflicting migration files {file1:?} and {file2:?}")]
    DuplicateMigration {
        id: u32,
        file1: String,
        file2: String,
    },

    /// E012: Squashing a migration that is itself a squash
    #[error("[E012] Migration {target} already squashes migration {root}; squash {root} instead")]
    SquashConflict { target: u32, root: u32 },

    /// E018: Squashing a bootstrapped baseline
    #[error("[E018] Migration {target} is a bootstrap baseline and cannot be squashed")]
    BaselineSquash { target: u32 },

    /// E013: Invalid squash target
    #[error("[E013] Invalid squash target {target} for migration {id}: {reason}")]
    InvalidSquashTarget { id: u32, target: u32, reason: String },

    /// E014: Migration file failed validation
    #[error("[E014] Invalid migration file {path}: {message}")]
    InvalidMigration { path: String, message: String },

    /// E015: Template lookup failed
    #[error("[E015] {name:?} template not found")]
    TemplateNotFound { name: String },

    /// E016: Unknown enum value supplied by the user
    #[error("[E016] {value:?} is not a valid {kind}")]
    InvalidValue { kind: String, value: String },

    /// E017: Descriptor set encoding error
    #[error("[E017] Invalid descriptor set {name:?}: {message}")]
    InvalidDescriptorSet { name: String, message: String },

    /// E020: IO error
    #[error("[E020] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E021: IO error with file path context
    #[error("[E021] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E022: YAML serialization error
    #[error("[E022] YAML error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Wrap an IO error with the path that caused it
    pub fn io_at(path: &std::path::Path, source: std::io::Error) -> Self {
        CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        }
    }
}
