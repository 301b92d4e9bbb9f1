// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use scan_session::BackendKind;

mod cli;

#[derive(Parser)]
#[command(name = "scan-session")]
#[command(about = "Drive a scanner session against simulated engines")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one explicit scan: start, decode, show the result
    Scan {
        /// Backend to scan with (engine-a or engine-b); defaults to the configured one
        #[arg(short, long)]
        backend: Option<BackendKind>,

        /// Text the simulated engine decodes
        #[arg(short, long, default_value = "ABC123")]
        payload: String,

        /// Deny the camera permission request
        #[arg(long)]
        deny_permission: bool,

        /// Make the first license activation attempt fail
        #[arg(long)]
        fail_activation: bool,
    },

    /// Run a continuous session, switching through backends
    Live {
        /// Backends to switch through, in order
        #[arg(short, long, value_delimiter = ',', default_value = "engine-a,engine-b")]
        sequence: Vec<BackendKind>,

        /// Decodes delivered per backend before switching
        #[arg(short, long, default_value = "2")]
        decodes: usize,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=scan_session=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = scan_session::ScannerConfig::load()?;

    match cli.command {
        Commands::Scan {
            backend,
            payload,
            deny_permission,
            fail_activation,
        } => {
            let options = cli::ScanOptions {
                backend: backend.unwrap_or(config.default_backend),
                payload,
                deny_permission,
                fail_activation,
            };
            cli::scan_once(&config, options).await
        }
        Commands::Live { sequence, decodes } => cli::live(&config, &sequence, decodes).await,
        Commands::Config => cli::print_config(&config),
    }
}
