mod game;
mod network;
mod prediction;
mod reporting;

use clap::Parser;
use log::info;
use shared::{MotionPattern, PatternParams, WeaponSpec};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Autofire rate in shots per second (0 disables firing)
    #[arg(short = 'f', long, default_value = "2.0")]
    fire_rate: f32,

    /// Projectile pattern: straight, wavy, amplitude, parametric, boomerang
    #[arg(short = 'p', long, default_value = "straight")]
    pattern: String,
}

fn weapon_for(pattern: &str) -> WeaponSpec {
    let (pattern, params) = match pattern {
        "wavy" => (
            MotionPattern::Wavy,
            PatternParams {
                magnitude: 0.6,
                period: 8.0,
                ..PatternParams::default()
            },
        ),
        "amplitude" => (
            MotionPattern::AmplitudeWave,
            PatternParams {
                amplitude: 4.0,
                frequency: 3.0,
                ..PatternParams::default()
            },
        ),
        "parametric" => (
            MotionPattern::Parametric,
            PatternParams {
                magnitude: 5.0,
                ..PatternParams::default()
            },
        ),
        "boomerang" => (MotionPattern::Boomerang, PatternParams::default()),
        _ => (MotionPattern::Straight, PatternParams::default()),
    };

    WeaponSpec {
        damage_min: 4,
        damage_max: 9,
        speed: 60.0,
        lifetime_s: 1.2,
        pattern,
        params,
        pierce: false,
        pierce_count: 0,
        projectile_radius: 0.8,
        base_rate: 2.0,
        projectiles_per_shot: 1,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Pattern: {}, fire rate: {}/s", args.pattern, args.fire_rate);

    let weapon = weapon_for(&args.pattern);
    let mut client =
        network::Client::new(&args.server, args.fake_ping, args.fire_rate, weapon).await?;

    client.run().await?;

    Ok(())
}
