use clap::Parser;
use log::info;
use rand::Rng;
use server::game::Enemy;
use server::network::Server;
use shared::{CombatConfig, EnemyAttackSpec, MotionPattern, PatternParams, Vec3};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum concurrent clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Number of enemies to seed the arena with
    #[arg(short, long, default_value = "8")]
    enemies: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate as f32);

    info!("Starting combat server on {}", address);
    info!("Tick rate: {}Hz, max clients: {}", args.tick_rate, args.max_clients);

    let mut server = Server::new(
        &address,
        tick_duration,
        args.max_clients,
        CombatConfig::default(),
    )
    .await?;

    seed_enemies(&mut server, args.enemies);

    server.run().await?;

    Ok(())
}

/// Scatters a ring of basic ranged enemies around the arena origin. Real
/// deployments feed the roster from zone/spawn data instead.
fn seed_enemies(server: &mut Server, count: usize) {
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let angle = (i as f32 / count.max(1) as f32) * std::f32::consts::TAU;
        let distance = rng.gen_range(40.0..90.0);
        let position = Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);

        server.game_mut().spawn_enemy(Enemy {
            id: format!("enemy-{}", i + 1),
            position,
            hitbox_radius: 2.0,
            current_hp: 30,
            max_hp: 30,
            defense: 2,
            attack: EnemyAttackSpec {
                damage_min: 3,
                damage_max: 6,
                speed: 40.0,
                lifetime_s: 1.5,
                pattern: MotionPattern::Straight,
                params: PatternParams::default(),
                projectile_radius: 1.0,
                cooldown_s: 2.0,
                aggro_radius: 60.0,
            },
            cooldown_s: rng.gen_range(0.0..2.0),
        });
    }

    info!("Seeded {} enemies", count);
}
