//! Init command implementation

use anyhow::{Context, Result};
use keel_migrate::Migrations;

use crate::cli::{GlobalArgs, InitArgs};
use crate::commands::common::{config_path, display_path, session_options};

/// Execute the init command
pub async fn execute(args: &InitArgs, global: &GlobalArgs) -> Result<()> {
    let path = config_path(global);
    let options = session_options(global);
    let mut session = Migrations::init(&path, &options)
        .await
        .with_context(|| format!("Failed to initialize {}", path.display()))?;

    println!("Created {}", path.display());

    if args.bootstrap {
        // Bootstrapping talks to the database, so identifiers must be complete.
        session
            .config()
            .validate()
            .context("Cannot bootstrap")?;
        let id = session.bootstrap(None).await?.id();
        println!("{}", display_path(&session, id));
    }

    session.close();
    Ok(())
}
