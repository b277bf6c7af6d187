//! Environments command implementation

use anyhow::Result;
use keel_core::Environment;

/// Execute the environments command
pub async fn execute() -> Result<()> {
    print!("{}", format_environments());
    Ok(())
}

fn format_environments() -> String {
    Environment::ALL_TAGS
        .iter()
        .map(|env| {
            if *env == Environment::default() {
                format!("{env} (default)\n")
            } else {
                format!("{env}\n")
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "environments_test.rs"]
mod tests;
