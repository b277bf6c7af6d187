//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use keel_core::{Environment, StatementInput, StatementType};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Keel - schema migrations with a ledger, squashes and batched execution
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file [default: .keel.yaml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Force (`--emulator`) or disable (`--emulator=false`) the emulator;
    /// detected from KEEL_EMULATOR_DIR by default
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub emulator: Option<bool>,

    /// Project ID
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Instance ID
    #[arg(short, long, global = true)]
    pub instance: Option<String>,

    /// Database ID
    #[arg(short, long, global = true)]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a config file and create the migrations directory
    Init(InitArgs),

    /// Create a migration from the live database schema
    Bootstrap(BootstrapArgs),

    /// Create a new migration
    Create(CreateArgs),

    /// Append a statement to an existing migration
    Add(AddArgs),

    /// Attach a serialized descriptor set to a migration
    AddDescriptors(AddDescriptorsArgs),

    /// Apply all pending migrations
    #[command(alias = "up")]
    Upgrade,

    /// Show every migration with its ledger state
    #[command(alias = "ls")]
    Status(StatusArgs),

    /// List available statement templates
    Templates,

    /// List environment tags
    #[command(alias = "envs")]
    Environments,
}

/// Arguments for the init command
#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Create an initial migration from the current schema
    #[arg(long)]
    pub bootstrap: bool,
}

/// Arguments for the bootstrap command
#[derive(Args, Debug, Default)]
pub struct BootstrapArgs {
    /// Migration name [default: init]
    pub name: Option<String>,
}

/// Options describing one statement
#[derive(Args, Debug, Clone, Default)]
pub struct StatementArgs {
    /// Statement SQL; overrides any template
    #[arg(short, long)]
    pub sql: Option<String>,

    /// Environment the statement runs in (ALL, CLOUD, EMULATOR)
    #[arg(short, long)]
    pub env: Option<Environment>,

    /// SQL template name (see `keel templates`)
    #[arg(short, long)]
    pub template: Option<String>,

    /// Statement type (DDL, DML, PARTITIONED_DML, AUTOMATIC)
    #[arg(long = "type")]
    pub statement_type: Option<StatementType>,
}

impl StatementArgs {
    /// Statement input for the resolver
    pub fn to_input(&self) -> StatementInput {
        StatementInput {
            sql: self.sql.clone().unwrap_or_default(),
            env: self.env,
            template: self.template.clone().filter(|t| !t.is_empty()),
            statement_type: self.statement_type,
        }
    }
}

/// Arguments for the create command
#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Migration name
    pub name: String,

    #[command(flatten)]
    pub statement: StatementArgs,

    /// Earliest migration ID the new migration supersedes
    #[arg(long)]
    pub squash: Option<u32>,
}

/// A migration named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationRef {
    /// The highest migration ID
    #[default]
    Latest,
    /// A specific migration ID
    Id(u32),
}

impl FromStr for MigrationRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(MigrationRef::Latest);
        }
        s.parse::<u32>()
            .map(MigrationRef::Id)
            .map_err(|_| format!("{s:?} is not a migration ID or \"latest\""))
    }
}

impl fmt::Display for MigrationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationRef::Latest => write!(f, "latest"),
            MigrationRef::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Arguments for the add command
#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// Migration to append to (ID or "latest")
    #[arg(short, long, default_value = "latest")]
    pub migration: MigrationRef,

    #[command(flatten)]
    pub statement: StatementArgs,
}

/// Arguments for the add-descriptors command
#[derive(Args, Debug)]
pub struct AddDescriptorsArgs {
    /// Descriptor set name referenced by statements
    pub name: String,

    /// Serialized descriptor set file
    pub file: PathBuf,

    /// Migration to attach to (ID or "latest")
    #[arg(short, long, default_value = "latest")]
    pub migration: MigrationRef,
}

/// Arguments for the status command
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: StatusOutput,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusOutput {
    /// Table format
    #[default]
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
