use clap::Parser;
use log::info;
use projection::network::Viewer;
use projection::track::{ProjectionConfig, StalePolicy};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Frame rate for sampling projected positions
    #[arg(short, long, default_value = "60")]
    frame_rate: u32,

    /// Expected server tick rate in Hz
    #[arg(short, long, default_value_t = shared::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Blend window for authoritative corrections, in milliseconds
    #[arg(short, long, default_value = "100")]
    blend_ms: u64,

    /// What to do when snapshots stop arriving: extrapolate or freeze
    #[arg(long, default_value = "extrapolate")]
    stale_policy: String,

    /// Missed ticks before an entity counts as stale
    #[arg(long, default_value = "5")]
    stale_after_ticks: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let stale_policy = match args.stale_policy.as_str() {
        "extrapolate" => StalePolicy::Extrapolate,
        "freeze" => StalePolicy::Freeze,
        other => return Err(format!("unknown stale policy: {}", other).into()),
    };

    let config = ProjectionConfig {
        tick_interval: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        blend_window: Duration::from_millis(args.blend_ms),
        stale_policy,
        stale_after_ticks: args.stale_after_ticks,
    };

    info!("Connecting to {}", args.server);

    let frame_duration = Duration::from_secs_f64(1.0 / args.frame_rate as f64);
    let mut viewer = Viewer::new(&args.server, config, frame_duration).await?;

    viewer.run().await?;

    Ok(())
}
