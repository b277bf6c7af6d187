//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::Duration;
use keel_core::config::CONFIG_FILE;
use keel_core::ConfigOverrides;
use keel_migrate::{Migrations, SessionOptions};
use std::path::{Component, Path, PathBuf};

use crate::cli::{GlobalArgs, MigrationRef};

/// Config file named on the command line, or `.keel.yaml`
pub(crate) fn config_path(global: &GlobalArgs) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Session options from the global flags.
///
/// A missing config file is only an error when `--config` was given.
pub(crate) fn session_options(global: &GlobalArgs) -> SessionOptions {
    SessionOptions {
        overrides: ConfigOverrides {
            project_id: global.project.clone(),
            instance_id: global.instance.clone(),
            database_id: global.database.clone(),
        },
        emulator: global.emulator,
        config_required: global.config.is_some(),
    }
}

/// Open a session for the configured project
pub(crate) fn open_session(global: &GlobalArgs) -> Result<Migrations> {
    let path = config_path(global);
    Migrations::open(&path, &session_options(global))
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// Resolve a migration reference to an existing ID
pub(crate) fn resolve_migration(session: &Migrations, migration: MigrationRef) -> Result<u32> {
    let id = match migration {
        MigrationRef::Latest => session.latest_id(),
        MigrationRef::Id(id) => id,
    };
    session.get(id)?;
    Ok(id)
}

/// Path of migration `id` relative to the working directory when possible
pub(crate) fn display_path(session: &Migrations, id: u32) -> String {
    let Some(path) = session.migration_path(id) else {
        return String::new();
    };
    relative_to_cwd(&path).display().to_string()
}

fn relative_to_cwd(path: &Path) -> PathBuf {
    if !path.is_absolute() {
        return path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
    }
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Human-readable elapsed time
pub(crate) fn display_duration(elapsed: Duration) -> String {
    let ms = elapsed.num_milliseconds().max(0);
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
