use authority::network::Server;
use clap::Parser;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the UDP socket to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate in Hz
    #[arg(short, long, default_value_t = shared::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of concurrent sessions
    #[arg(short, long, default_value = "32")]
    max_sessions: usize,

    /// Seconds of silence before a session is swept out
    #[arg(long, default_value = "5")]
    session_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let addr = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate as f64);

    info!("Starting authority on {} at {}Hz", addr, args.tick_rate);

    let mut server = Server::new(
        &addr,
        tick_duration,
        args.max_sessions,
        Duration::from_secs(args.session_timeout),
    )
    .await?;
    server.run().await?;

    Ok(())
}
