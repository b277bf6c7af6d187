//! keel-core - Core library for Keel
//!
//! This crate provides configuration parsing, statement classification,
//! the template catalog, and the on-disk migration store shared by every
//! Keel component.

pub mod config;
pub mod error;
pub mod migration;
pub mod statement;
pub mod store;
pub mod template;

pub use config::{Config, ConfigOverrides, DatabaseConfig};
pub use error::{CoreError, CoreResult};
pub use migration::{slugify, DescriptorSet, Migration, MigrationFile, BASELINE_SQUASH_ID};
pub use statement::{
    detect_mode, is_type_bundle_ddl, Environment, ExecutionEnvironment, ExecutionMode, Statement,
    StatementInput, StatementType,
};
pub use store::MigrationStore;
pub use template::{Template, TemplateCatalog};
