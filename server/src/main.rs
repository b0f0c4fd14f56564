// server/src/main.rs

// Entry point for the medledger coordinator. Parses the command line and
// dispatches to the CLI handlers.

use anyhow::Result;
use medledger_server::cli::cli::start_cli;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls the level
    env_logger::init();

    start_cli().await
}
