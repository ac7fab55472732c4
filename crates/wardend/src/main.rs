//! wardend: the Warden daemon.
//!
//! Single binary that assembles the Warden subsystems:
//! - Version store (redb)
//! - Fleet client (JSON pod file)
//! - Manifest providers
//! - Control loop (rollout + eviction)
//! - Health monitor + HTTP endpoints
//!
//! # Usage
//!
//! ```text
//! wardend run --config /etc/warden/warden.toml
//! wardend show --config /etc/warden/warden.toml --namespace content
//! wardend promote --config /etc/warden/warden.toml --namespace content --repo docs
//! ```

mod admin;
mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use warden_core::WardenConfig;

#[derive(Parser)]
#[command(name = "wardend", about = "Warden pod health and data rollout controller")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop and the health endpoints.
    Run {
        #[arg(long, default_value = "/etc/warden/warden.toml")]
        config: PathBuf,
    },
    /// Print the known-good and latest versions of a namespace.
    Show {
        #[arg(long, default_value = "/etc/warden/warden.toml")]
        config: PathBuf,

        #[arg(long)]
        namespace: String,
    },
    /// Mark the latest version of a repo as known-good.
    Promote {
        #[arg(long, default_value = "/etc/warden/warden.toml")]
        config: PathBuf,

        #[arg(long)]
        namespace: String,

        #[arg(long)]
        repo: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,warden=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run { config } => {
            let config = WardenConfig::from_file(&config)?;
            daemon::run(config).await
        }
        Command::Show { config, namespace } => {
            let config = WardenConfig::from_file(&config)?;
            admin::show(&config, &namespace)
        }
        Command::Promote {
            config,
            namespace,
            repo,
        } => {
            let config = WardenConfig::from_file(&config)?;
            admin::promote(&config, &namespace, &repo)
        }
    }
}
