use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};

use duet_core::{DuetPaths, logging};
use duet_relay::interfaces;
use duet_relay::{RelayConfig, RelayServer, SlotPolicy};

/// Two-player WebSocket relay.
#[derive(Parser, Debug)]
#[command(name = "duet-relay", version)]
struct Cli {
    /// Server port (default 15000)
    #[arg(long)]
    port: Option<u16>,

    /// Interface address to bind (default 0.0.0.0)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Largest accepted inbound message, in bytes (default 202)
    #[arg(long)]
    max_message_size: Option<usize>,

    /// Free a player's slot when they disconnect
    #[arg(long)]
    release_slots_on_disconnect: bool,

    /// Config file (default ~/.duet/relay.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write daily-rotated logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    /// Layer command-line overrides on top of the file config.
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(size) = self.max_message_size {
            config.max_message_size = size;
        }
        if self.release_slots_on_disconnect {
            config.slot_policy = SlotPolicy::ReleaseOnDisconnect;
        }
    }
}

fn load_config(cli: &Cli) -> RelayConfig {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => match DuetPaths::relay_config_path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("No default config location: {e}");
                None
            }
        },
    };

    let mut config = path
        .map(|p| RelayConfig::load_or_default(&p))
        .unwrap_or_default();
    cli.apply(&mut config);
    config
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _log_guard = match logging::init_logging(cli.log_dir.as_deref(), logging::DEFAULT_FILTER)
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    info!("Starting communication server...");
    let config = load_config(&cli);
    info!("- Port: {}", config.port);

    if let Err(e) = interfaces::log_local_addresses() {
        error!("{e}");
        std::process::exit(1);
    }

    let server = match RelayServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("{e}");
        std::process::exit(1);
    }
}
