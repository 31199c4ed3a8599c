//! remlink
//!
//! Two-party remote-control link. `remlink console` listens and drives the
//! interactive command loop; `remlink agent` connects out and executes
//! received commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use remlink::agent::Agent;
use remlink::capability::executor::Executor;
use remlink::capability::{NoCapture, SystemShell};
use remlink::config::Config;
use remlink::console::Console;

#[derive(Parser, Debug)]
#[command(name = "remlink")]
#[command(about = "Two-party remote-control link over framed TCP")]
struct Args {
    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Connect out to a console and execute its commands
    Agent {
        /// Console address to connect to (overrides config)
        #[arg(long)]
        connect: Option<String>,

        /// Command channel port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Listen for an agent and drive the interactive command loop
    Console {
        /// Address to listen on (overrides config)
        #[arg(long)]
        listen: Option<String>,

        /// Command channel port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging to stderr so stdout stays free for the interactive console
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).context("Failed to load configuration")?,
        None => Config::default(),
    };

    match args.role {
        Role::Agent { connect, port } => {
            if let Some(host) = connect {
                config.connect_host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            info!(
                addr = %config.command_addr(&config.connect_host),
                "Starting agent"
            );

            let cwd = std::env::current_dir().context("Cannot determine working directory")?;
            let executor = Executor::new(
                Box::new(SystemShell::new(config.shell_timeout())),
                Box::new(NoCapture),
                cwd,
            );
            Agent::new(config, executor).run().await
        }
        Role::Console { listen, port } => {
            if let Some(host) = listen {
                config.listen_host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            info!(
                addr = %config.command_addr(&config.listen_host),
                "Starting console"
            );

            Console::new(config).run().await
        }
    }
}
