//! Templates command implementation

use anyhow::{Context, Result};
use keel_core::{Config, TemplateCatalog};

use crate::cli::GlobalArgs;
use crate::commands::common::config_path;

/// Execute the templates command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    print!("{}", format_templates(&catalog(global)?));
    Ok(())
}

/// Merged catalog; the built-ins alone when the default config is absent
fn catalog(global: &GlobalArgs) -> Result<TemplateCatalog> {
    let path = config_path(global);
    if global.config.is_none() && !path.exists() {
        return Ok(TemplateCatalog::builtin());
    }
    let config =
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(config.template_catalog())
}

fn format_templates(catalog: &TemplateCatalog) -> String {
    catalog
        .iter()
        .map(|(name, _)| {
            if name == catalog.default_name() {
                format!("{name} (default)\n")
            } else {
                format!("{name}\n")
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "templates_test.rs"]
mod tests;
