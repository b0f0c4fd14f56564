// server/src/cli/cli.rs
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::debug;

use crate::cli::handlers;

/// Command line of the medledger coordinator.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Prescription and access request ledger coordinator", long_about = None)]
#[clap(propagate_version = true)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Commands {
    /// Run the HTTP API until SIGINT or SIGTERM
    Serve {
        #[arg(long, value_parser = clap::value_parser!(PathBuf), help = "Path to the YAML configuration file.")]
        config: Option<PathBuf>,
        #[arg(long, value_parser = clap::value_parser!(u16), help = "Listen port. Overrides the configuration and PORT.")]
        port: Option<u16>,
        #[arg(long, value_parser = clap::value_parser!(String), help = "Listen address. Overrides the configuration and HOST.")]
        host: Option<String>,
    },
    /// Print averages from a recorded metrics file
    Report {
        #[arg(long, value_parser = clap::value_parser!(PathBuf), help = "Metrics file to read. Defaults to the configured one.")]
        metrics_file: Option<PathBuf>,
        #[arg(long, value_parser = clap::value_parser!(PathBuf), help = "Path to the YAML configuration file.")]
        config: Option<PathBuf>,
    },
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    debug!("Parsed arguments: {:?}", args);
    run_command(args.command.unwrap_or(Commands::Serve { config: None, port: None, host: None })).await
}

pub async fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Serve { config, port, host } => handlers::handle_serve(config, port, host).await,
        Commands::Report { metrics_file, config } => handlers::handle_report(metrics_file, config),
    }
}
