//! keel-migrate - Migration engine for Keel
//!
//! This crate provides the `Migrations` session, the upgrade engine with its
//! batching and squash resolution, and baseline synthesis from a live
//! schema.

pub mod batch;
pub mod bootstrap;
pub mod error;
pub mod session;
pub mod upgrade;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use batch::{plan_batches, Batch, Batcher};
pub use bootstrap::synthesize;
pub use error::{MigrateError, MigrateResult};
pub use session::{MigrationState, MigrationStatus, Migrations, SessionOptions};
pub use upgrade::{NoopHooks, UpgradeHooks, UpgradeSummary, Upgrader};
