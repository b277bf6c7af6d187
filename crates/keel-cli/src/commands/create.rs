//! Create command implementation

use anyhow::Result;

use crate::cli::{CreateArgs, GlobalArgs};
use crate::commands::common::{display_path, open_session};

/// Execute the create command
pub async fn execute(args: &CreateArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = open_session(global)?;
    let input = args.statement.to_input();
    let id = session
        .create(&args.name, std::slice::from_ref(&input), args.squash)?
        .id();
    println!("{}", display_path(&session, id));
    Ok(())
}
