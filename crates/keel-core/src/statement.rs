//! Statements, their environment tags and execution types.
//!
//! A [`Statement`] is one executable SQL operation. Its [`StatementType`] may
//! be `AUTOMATIC`, in which case the execution mode is inferred from the SQL
//! text every time it is needed (authoring and upgrade).

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Environment a statement applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Every environment (default)
    #[default]
    All,
    /// Only the cloud-hosted target database
    #[serde(alias = "GOOGLE_CLOUD")]
    Cloud,
    /// Only locally-managed emulated instances
    Emulator,
}

impl Environment {
    /// All tags, in display order
    pub const ALL_TAGS: [Environment; 3] =
        [Environment::All, Environment::Cloud, Environment::Emulator];

    /// Whether a statement carrying this tag runs in `target`
    pub fn applies_to(self, target: ExecutionEnvironment) -> bool {
        match self {
            Environment::All => true,
            Environment::Cloud => target == ExecutionEnvironment::Cloud,
            Environment::Emulator => target == ExecutionEnvironment::Emulator,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::All => write!(f, "ALL"),
            Environment::Cloud => write!(f, "CLOUD"),
            Environment::Emulator => write!(f, "EMULATOR"),
        }
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match normalize_tag(s).as_str() {
            "ALL" => Ok(Environment::All),
            "CLOUD" | "GOOGLE_CLOUD" => Ok(Environment::Cloud),
            "EMULATOR" => Ok(Environment::Emulator),
            _ => Err(CoreError::InvalidValue {
                kind: "env".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Environment an upgrade is currently running against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionEnvironment {
    /// The configured target database
    #[default]
    Cloud,
    /// A locally-managed emulated instance
    Emulator,
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionEnvironment::Cloud => write!(f, "cloud"),
            ExecutionEnvironment::Emulator => write!(f, "emulator"),
        }
    }
}

/// Declared statement type, as stored in migration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementType {
    /// Infer from the SQL text at run time
    #[default]
    Automatic,
    /// Schema change
    Ddl,
    /// Transactional data mutation
    Dml,
    /// Partitioned (non-transactional) data mutation
    PartitionedDml,
}

impl StatementType {
    /// Resolve to a concrete execution mode, classifying `AUTOMATIC` from `sql`
    pub fn resolve(self, sql: &str) -> ExecutionMode {
        match self {
            StatementType::Automatic => detect_mode(sql),
            StatementType::Ddl => ExecutionMode::Ddl,
            StatementType::Dml => ExecutionMode::Dml,
            StatementType::PartitionedDml => ExecutionMode::PartitionedDml,
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementType::Automatic => write!(f, "AUTOMATIC"),
            StatementType::Ddl => write!(f, "DDL"),
            StatementType::Dml => write!(f, "DML"),
            StatementType::PartitionedDml => write!(f, "PARTITIONED_DML"),
        }
    }
}

impl FromStr for StatementType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match normalize_tag(s).as_str() {
            "AUTOMATIC" => Ok(StatementType::Automatic),
            "DDL" => Ok(StatementType::Ddl),
            "DML" => Ok(StatementType::Dml),
            "PARTITIONED_DML" => Ok(StatementType::PartitionedDml),
            _ => Err(CoreError::InvalidValue {
                kind: "type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Concrete way a batch of statements is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// One schema-change operation
    Ddl,
    /// One atomic read-write transaction
    Dml,
    /// One partitioned update per statement
    PartitionedDml,
}

impl From<ExecutionMode> for StatementType {
    fn from(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Ddl => StatementType::Ddl,
            ExecutionMode::Dml => StatementType::Dml,
            ExecutionMode::PartitionedDml => StatementType::PartitionedDml,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        StatementType::from(*self).fmt(f)
    }
}

/// One executable SQL statement inside a migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Statement {
    /// SQL text, trimmed with exactly one trailing newline
    pub sql: String,

    /// Environment tag
    #[serde(default)]
    pub env: Environment,

    /// Declared type
    #[serde(rename = "type", default)]
    pub statement_type: StatementType,

    /// Named descriptor set this statement depends on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_set: Option<String>,
}

impl Statement {
    /// Build a statement with normalized SQL and `AUTOMATIC` already resolved
    pub fn new(sql: &str, env: Environment, statement_type: StatementType) -> Self {
        let statement_type = StatementType::from(statement_type.resolve(sql));
        Self {
            sql: normalize_sql(sql),
            env,
            statement_type,
            descriptor_set: None,
        }
    }

    /// Attach a descriptor-set reference
    pub fn with_descriptor_set(mut self, name: impl Into<String>) -> Self {
        self.descriptor_set = Some(name.into());
        self
    }

    /// Execution mode, re-classifying `AUTOMATIC` from the stored SQL
    pub fn mode(&self) -> ExecutionMode {
        self.statement_type.resolve(&self.sql)
    }

    /// Descriptor-set reference, treating an empty name as absent
    pub fn descriptor_set(&self) -> Option<&str> {
        self.descriptor_set.as_deref().filter(|s| !s.is_empty())
    }
}

/// Caller-supplied ingredients for a new statement
#[derive(Debug, Clone, Default)]
pub struct StatementInput {
    /// Literal SQL; when empty a template is used
    pub sql: String,

    /// Environment override
    pub env: Option<Environment>,

    /// Template name; `None` selects the default template
    pub template: Option<String>,

    /// Type override
    pub statement_type: Option<StatementType>,
}

impl StatementInput {
    /// Input carrying literal SQL
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    /// Input selecting a named template
    pub fn template(name: impl Into<String>) -> Self {
        Self {
            template: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the environment tag
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Set the statement type
    pub fn with_type(mut self, statement_type: StatementType) -> Self {
        self.statement_type = Some(statement_type);
        self
    }
}

fn insert_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\W*INSERT\b").expect("valid regex"))
}

fn partitioned_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\W*(DELETE|UPDATE)\b").expect("valid regex"))
}

fn type_bundle_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\W*(CREATE|ALTER)\W+PROTO\W+BUNDLE\b").expect("valid regex")
    })
}

/// Classify SQL by its leading keyword.
///
/// `INSERT` is a transactional write, `DELETE`/`UPDATE` are partitioned writes,
/// and everything else is treated as a schema change.
pub fn detect_mode(sql: &str) -> ExecutionMode {
    let sql = sql.trim();
    if insert_prefix().is_match(sql) {
        ExecutionMode::Dml
    } else if partitioned_prefix().is_match(sql) {
        ExecutionMode::PartitionedDml
    } else {
        ExecutionMode::Ddl
    }
}

/// Whether `sql` creates or alters a typed-schema bundle
pub fn is_type_bundle_ddl(sql: &str) -> bool {
    type_bundle_prefix().is_match(sql.trim())
}

/// Trim SQL and terminate it with exactly one newline
pub fn normalize_sql(sql: &str) -> String {
    let mut out = sql.trim().to_string();
    out.push('\n');
    out
}

fn normalize_tag(s: &str) -> String {
    s.trim().replace(['-', ' '], "_").to_uppercase()
}

#[cfg(test)]
#[path = "statement_test.rs"]
mod tests;
