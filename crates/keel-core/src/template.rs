//! Named SQL templates and the statement resolver.
//!
//! Built-in templates are merged with the templates declared in the config
//! file (config entries win on name collisions) into one immutable
//! [`TemplateCatalog`] per session.

use crate::error::{CoreError, CoreResult};
use crate::statement::{Environment, Statement, StatementInput, StatementType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the built-in template used when nothing is marked default
pub const BUILTIN_DEFAULT_TEMPLATE: &str = "create-table";

/// A named SQL template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    /// Template SQL
    pub sql: String,

    /// Environment tag applied to statements built from this template
    #[serde(default)]
    pub env: Environment,

    /// Statement type applied to statements built from this template
    #[serde(rename = "type", default)]
    pub statement_type: StatementType,

    /// Whether this template is used when no template is named
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

impl Template {
    fn ddl(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            env: Environment::All,
            statement_type: StatementType::Ddl,
            default: false,
        }
    }
}

const CREATE_TABLE: &str = "
CREATE TABLE test (
  id VARCHAR NOT NULL DEFAULT (gen_random_uuid()),
  name VARCHAR,
  update_time TIMESTAMP NOT NULL DEFAULT (now()),
  PRIMARY KEY (id)
)
";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (BUILTIN_DEFAULT_TEMPLATE, CREATE_TABLE),
    ("drop-table", "DROP TABLE test"),
    ("add-column", "ALTER TABLE test ADD COLUMN slug VARCHAR"),
    ("drop-column", "ALTER TABLE test DROP COLUMN slug"),
    ("rename-column", "ALTER TABLE test RENAME COLUMN slug TO handle"),
    (
        "set-default",
        "ALTER TABLE test ALTER COLUMN id SET DEFAULT (gen_random_uuid())",
    ),
    ("drop-default", "ALTER TABLE test ALTER COLUMN id DROP DEFAULT"),
    ("create-index", "CREATE UNIQUE INDEX uq_test_slug ON test (slug)"),
    ("drop-index", "DROP INDEX uq_test_slug"),
    (
        "create-view",
        "CREATE VIEW test_names AS SELECT id, name FROM test",
    ),
    ("drop-view", "DROP VIEW test_names"),
];

/// Built-in templates keyed by name, none marked default
pub fn builtin_templates() -> BTreeMap<String, Template> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|(name, sql)| (name.to_string(), Template::ddl(sql)))
        .collect()
}

/// Merged, name-ordered template lookup with exactly one default
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, Template>,
    default_name: String,
}

impl TemplateCatalog {
    /// Catalog of the built-in templates only
    pub fn builtin() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }

    /// Merge config templates over the built-ins
    pub fn with_overrides(overrides: &BTreeMap<String, Template>) -> Self {
        let mut templates = builtin_templates();
        for (name, template) in overrides {
            templates.insert(name.clone(), template.clone());
        }

        let marked = templates
            .iter()
            .find(|(_, t)| t.default)
            .map(|(name, _)| name.clone());

        let default_name = match marked {
            Some(name) => {
                // Only the first marked template keeps the flag.
                for (other, template) in templates.iter_mut() {
                    if *other != name {
                        template.default = false;
                    }
                }
                name
            }
            None => {
                let fallback = templates
                    .entry(BUILTIN_DEFAULT_TEMPLATE.to_string())
                    .or_insert_with(|| Template::ddl(CREATE_TABLE));
                fallback.default = true;
                BUILTIN_DEFAULT_TEMPLATE.to_string()
            }
        };

        Self {
            templates,
            default_name,
        }
    }

    /// Iterate templates in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a template by name
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Name of the default template
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty (never true in practice)
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Turn caller input into a fully-formed statement.
    ///
    /// Literal SQL wins over any template reference. Without SQL the named
    /// template (or the default one) supplies SQL, environment and type; the
    /// caller's environment and type still take precedence when given.
    pub fn resolve(&self, input: &StatementInput) -> CoreResult<Statement> {
        if !input.sql.trim().is_empty() {
            return Ok(Statement::new(
                &input.sql,
                input.env.unwrap_or_default(),
                input.statement_type.unwrap_or_default(),
            ));
        }

        let name = input
            .template
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.default_name);

        let template = self
            .templates
            .get(name)
            .ok_or_else(|| CoreError::TemplateNotFound {
                name: name.to_string(),
            })?;

        Ok(Statement::new(
            &template.sql,
            input.env.unwrap_or(template.env),
            input.statement_type.unwrap_or(template.statement_type),
        ))
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
#[path = "template_test.rs"]
mod tests;
