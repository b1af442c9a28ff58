//! stagehand - stage an offline Pyodide bundle

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stagehand_cli::cmd;
use stagehand_cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli.root.clone();
    let (quiet, dry_run) = (cli.quiet, cli.dry_run);

    match cli.into_command() {
        Commands::Stage(args) => cmd::stage::stage(&root, &args, quiet, dry_run).await,
        Commands::Status => cmd::status::status(&root).await,
        Commands::Manifest => cmd::manifest::manifest(&root, quiet, dry_run).await,
        Commands::Clean { runtime, packages } => {
            cmd::clean::clean(&root, runtime, packages, quiet, dry_run)
        }
    }
}
