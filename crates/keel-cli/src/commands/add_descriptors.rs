//! Add-descriptors command implementation

use anyhow::{bail, Result};

use crate::cli::{AddDescriptorsArgs, GlobalArgs};
use crate::commands::common::{display_path, open_session, resolve_migration};

/// Execute the add-descriptors command
pub async fn execute(args: &AddDescriptorsArgs, global: &GlobalArgs) -> Result<()> {
    if args.name.trim().is_empty() {
        bail!("name is required");
    }
    if args.file.as_os_str().is_empty() {
        bail!("path is required");
    }

    let mut session = open_session(global)?;
    let id = resolve_migration(&session, args.migration)?;
    session.add_descriptor_file(id, &args.name, &args.file)?;
    println!("{}", display_path(&session, id));
    Ok(())
}
