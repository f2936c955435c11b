use clap::Parser;
use log::{info, warn};
use server::config::{ServerConfig, DEFAULT_SKINS};
use server::network::Server;
use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE, MOVE_STEP};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Distance moved per movement intent along each axis
    #[arg(long, default_value_t = MOVE_STEP)]
    step: f32,

    /// Seconds of silence before a client is dropped (0 disables)
    #[arg(long, default_value = "5")]
    idle_timeout_secs: u64,

    /// Skin offered to players; repeat to add more
    #[arg(long = "skin")]
    skins: Vec<String>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let skins = if args.skins.is_empty() {
            DEFAULT_SKINS.iter().map(|s| s.to_string()).collect()
        } else {
            args.skins
        };

        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_duration: ServerConfig::tick_duration_from_rate(args.tick_rate),
            max_clients: args.max_clients,
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            step: args.step,
            skins,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!(
        "Starting server on {}:{} at {}Hz",
        args.host, args.port, args.tick_rate
    );

    let mut server = Server::new(args.into()).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                shutdown.shutdown();
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });

    server.run().await
}
