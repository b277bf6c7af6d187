//! Add command implementation

use anyhow::Result;

use crate::cli::{AddArgs, GlobalArgs};
use crate::commands::common::{display_path, open_session, resolve_migration};

/// Execute the add command
pub async fn execute(args: &AddArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = open_session(global)?;
    let id = resolve_migration(&session, args.migration)?;
    session.add(id, &args.statement.to_input())?;
    println!("{}", display_path(&session, id));
    Ok(())
}
