//! Keel CLI - schema migrations with a ledger, squashes and batched execution

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{
    add, add_descriptors, bootstrap, create, environments, init, status, templates, upgrade,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match &cli.command {
        Commands::Init(args) => init::execute(args, &cli.global).await,
        Commands::Bootstrap(args) => bootstrap::execute(args, &cli.global).await,
        Commands::Create(args) => create::execute(args, &cli.global).await,
        Commands::Add(args) => add::execute(args, &cli.global).await,
        Commands::AddDescriptors(args) => add_descriptors::execute(args, &cli.global).await,
        Commands::Upgrade => upgrade::execute(&cli.global, &cancel).await,
        Commands::Status(args) => status::execute(args, &cli.global).await,
        Commands::Templates => templates::execute(&cli.global).await,
        Commands::Environments => environments::execute().await,
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug output with `--verbose`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::warn!("Interrupted, stopping after the current operation");
        cancel.cancel();
    }
}
