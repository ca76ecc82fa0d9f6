//! Chat Relay Coordinator - Entry Point
//!
//! Binds the listener and runs the coordinator until every client has
//! departed or the process is interrupted.

use std::net::{IpAddr, Ipv4Addr};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use chat_relay::config::{DEFAULT_CAPACITY, DEFAULT_PORT};
use chat_relay::{logging, Coordinator, JsonObserver, RelayConfig};

#[derive(Parser)]
#[command(name = "chat_relay")]
#[command(about = "TCP chat relay coordinator")]
struct Cli {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Maximum number of concurrent clients
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Longest idle pause between loop iterations, in milliseconds
    #[arg(long, default_value_t = 50)]
    idle_wait_ms: u64,

    /// Print relayed messages as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("chat_relay=info");

    let cli = Cli::parse();
    let config = RelayConfig {
        host: cli.host,
        port: cli.port,
        capacity: cli.capacity,
        idle_wait: Duration::from_millis(cli.idle_wait_ms),
        ..RelayConfig::default()
    };

    let coordinator = match Coordinator::bind(config).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let coordinator = if cli.json {
        coordinator.with_observer(JsonObserver::new(std::io::stdout()))
    } else {
        coordinator
    };

    match coordinator.local_addr() {
        Ok(addr) => info!("Chat relay listening on {}", addr),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    tokio::select! {
        _ = coordinator.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for interrupt: {}", e);
                return ExitCode::FAILURE;
            }
            info!("Interrupted, shutting down");
        }
    }

    ExitCode::SUCCESS
}
