//! hashemb CLI - Command-line driver for the reference sparse embedding layer.
//!
//! Generates synthetic checkpoints and batch files, and runs the layer's
//! forward/backward/update cycle over them.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hashemb_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the run summary.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("hashemb=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!("hashemb starting...");

    match cli.command {
        Commands::Generate(cmd) => cmd.run()?,
        Commands::Run(cmd) => cmd.run()?,
    }

    info!("hashemb completed successfully");
    Ok(())
}
