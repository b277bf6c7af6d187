//! Bootstrap command implementation

use anyhow::Result;

use crate::cli::{BootstrapArgs, GlobalArgs};
use crate::commands::common::{display_path, open_session};

/// Execute the bootstrap command
pub async fn execute(args: &BootstrapArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = open_session(global)?;
    let id = session.bootstrap(args.name.as_deref()).await?.id();
    println!("{}", display_path(&session, id));
    session.close();
    Ok(())
}
