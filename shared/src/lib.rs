//! Simulation code shared verbatim by the predicting client and the
//! authoritative server.
//!
//! The central invariant of this crate is that a projectile's position is a
//! pure function of its spawn parameters and elapsed time. Both sides run
//! the same trajectory code over independently-owned projectile copies that
//! are linked only by id, which lets the server verify client-reported hits
//! by recomputation instead of replaying history.

pub mod config;
pub mod grid;
pub mod math;
pub mod packets;
pub mod projectile;
pub mod trajectory;

pub use config::CombatConfig;
pub use grid::SpatialGrid;
pub use math::Vec3;
pub use packets::{EnemySnapshot, HitEntry, Packet, ProjectileSpawn};
pub use projectile::{
    EnemyAttackSpec, MotionPattern, OwnerKind, PatternParams, Projectile, WeaponSpec,
};
pub use trajectory::{facing_at, lateral_offset, position_at, FACING_EPSILON_MS};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wire protocol version, checked at connect time.
pub const PROTOCOL_VERSION: u32 = 1;

/// Wall clock in milliseconds since the epoch, the timestamp format used on
/// the wire and in projectile spawn times.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u64::MAX as u128) as u64
}
