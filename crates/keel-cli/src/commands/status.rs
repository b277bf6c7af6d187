//! Status command implementation

use anyhow::{Context, Result};
use keel_migrate::MigrationStatus;

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::open_session;

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = open_session(global)?;
    let statuses = session.status().await;
    session.close();
    let statuses = statuses?;

    match args.output {
        StatusOutput::Table => print!("{}", format_table(&statuses)),
        StatusOutput::Json => {
            let json = serde_json::to_string_pretty(&statuses)
                .context("Failed to serialize status")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Render statuses as an aligned table
fn format_table(statuses: &[MigrationStatus]) -> String {
    if statuses.is_empty() {
        return "No migrations\n".to_string();
    }

    let id_width = statuses
        .iter()
        .map(|s| s.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    let name_width = statuses
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let state_width = 9;

    let mut out = format!(
        "{:<id_width$}  {:<name_width$}  {:<state_width$}  {}\n",
        "ID", "NAME", "STATE", "COMPLETED"
    );
    out.push_str(&format!(
        "{:-<id_width$}  {:-<name_width$}  {:-<state_width$}  {}\n",
        "",
        "",
        "",
        "-".repeat(20)
    ));

    for status in statuses {
        let state = match status.squash_id {
            Some(squash_id) if squash_id > 0 => format!("{} ({squash_id})", status.state),
            _ => status.state.to_string(),
        };
        let completed = status
            .complete_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<id_width$}  {:<name_width$}  {:<state_width$}  {}\n",
            status.id, status.name, state, completed
        ));
    }
    out
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
