use clap::Parser;
use client::config::ClientConfig;
use client::network::Client;
use log::info;
use shared::DEFAULT_TICK_RATE;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Client ticks per second
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Wander around randomly instead of standing still
    #[arg(short, long)]
    bot: bool,

    /// Seed for the bot's random walk
    #[arg(long)]
    seed: Option<u64>,

    /// Smooth remote movement over this many milliseconds (0 disables)
    #[arg(short, long, default_value = "0")]
    interpolate: u64,

    /// Milliseconds of silence before a heartbeat is sent
    #[arg(long, default_value = "1000")]
    heartbeat_ms: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        ClientConfig {
            server_addr: args.server,
            tick_duration: ClientConfig::tick_duration_from_rate(args.tick_rate),
            bot: args.bot,
            seed: args.seed,
            interpolation: Duration::from_millis(args.interpolate),
            heartbeat_interval: Duration::from_millis(args.heartbeat_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.bot {
        info!("Bot mode: wandering randomly");
    }
    if args.interpolate > 0 {
        info!("Interpolating remote movement over {}ms", args.interpolate);
    }

    let mut client = Client::connect(args.into()).await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, disconnecting"),
    }

    Ok(())
}
