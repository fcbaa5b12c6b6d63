//! webmote CLI: serves browser gamepads as local virtual controllers.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webmote_daemon::config::{Config, TransportMode};
use webmote_daemon::setup::{build_backend, load_config};
use webmote_daemon::Daemon;

#[derive(Parser)]
#[command(
    name = "webmote",
    about = "Drive virtual game controllers from a browser",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon until interrupted.
    Serve {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<String>,

        /// Address to listen on.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,

        /// Transport for clients that request no sub-protocol.
        #[arg(long, value_name = "direct|signaling")]
        transport: Option<TransportMode>,
    },

    /// Print the effective configuration as TOML.
    Config {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            port,
            transport,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(transport) = transport {
                config.server.transport = transport;
            }
            init_tracing(&config);

            tracing::info!(
                bind = %config.server.bind,
                port = config.server.port,
                backend = ?config.backend.kind,
                "starting webmote daemon"
            );
            let backend = build_backend(&config.backend)?;
            Daemon::new(config, backend).run().await?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
