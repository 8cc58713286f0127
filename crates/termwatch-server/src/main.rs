//! Termwatch CLI
//!
//! Starts the Termwatch HTTP server for controlling the extraction worker.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use termwatch_server::{config::ServiceConfig, init_tracing, start_server, ServerError};

/// Alert term extraction service
#[derive(Debug, Parser)]
#[command(name = "termwatch", version, about)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TERMWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind_address: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => {
            eprintln!("Warning: No config file specified, using defaults and environment");
            ServiceConfig::default()
        }
    };
    config.apply_env()?;

    if let Some(address) = cli.bind_address {
        config.bind_address = address;
    }
    if let Some(port) = cli.port {
        config.bind_port = port;
    }

    init_tracing(&config.log_level);

    start_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["termwatch", "--config", "termwatch.toml", "-p", "9000"]);
        assert_eq!(cli.config, Some(PathBuf::from("termwatch.toml")));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.bind_address.is_none());
    }
}
