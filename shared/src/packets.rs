use crate::math::Vec3;
use crate::projectile::{MotionPattern, OwnerKind, PatternParams, Projectile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Full parameter set needed to reconstruct a projectile on the other side.
/// Fire intent is one message per shot; both sides then advance their own
/// copy from these parameters alone.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectileSpawn {
    pub id: String,
    pub shot_seq: u32,
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub origin: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub lifetime_s: f32,
    pub spawn_time_ms: u64,
    pub pattern: MotionPattern,
    pub params: PatternParams,
    pub radius: f32,
    pub damage_min: i32,
    pub damage_max: i32,
    pub pierce: bool,
    pub pierce_count: u32,
}

impl From<&Projectile> for ProjectileSpawn {
    fn from(p: &Projectile) -> Self {
        Self {
            id: p.id.clone(),
            shot_seq: p.shot_seq,
            owner_id: p.owner_id.clone(),
            owner_kind: p.owner_kind,
            origin: p.origin,
            direction: p.direction,
            speed: p.speed,
            lifetime_s: p.lifetime_s,
            spawn_time_ms: p.spawn_time_ms,
            pattern: p.pattern,
            params: p.params,
            radius: p.radius,
            damage_min: p.damage_min,
            damage_max: p.damage_max,
            pierce: p.pierce,
            pierce_count: p.pierce_count,
        }
    }
}

impl ProjectileSpawn {
    pub fn into_projectile(self) -> Projectile {
        Projectile {
            id: self.id,
            shot_seq: self.shot_seq,
            owner_id: self.owner_id,
            owner_kind: self.owner_kind,
            origin: self.origin,
            direction: self.direction.planar_normalize(),
            speed: self.speed,
            lifetime_s: self.lifetime_s,
            spawn_time_ms: self.spawn_time_ms,
            pattern: self.pattern,
            params: self.params,
            radius: self.radius,
            damage_min: self.damage_min,
            damage_max: self.damage_max,
            pierce: self.pierce,
            pierce_count: self.pierce_count,
            hit_set: HashSet::new(),
        }
    }
}

/// One aggregated player-to-enemy hit claim: `hit_count` collisions against
/// one target over the reporting window, not one message per tick.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HitEntry {
    pub target_id: String,
    pub hit_count: u32,
    pub last_position: Vec3,
    pub timestamp_ms: u64,
}

/// Enemy state mirrored to clients for local targeting and rendering.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnemySnapshot {
    pub id: String,
    pub position: Vec3,
    pub hitbox_radius: f32,
    pub current_hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
    },
    Disconnect,
    /// Client-reported player ground position, cross-checked during
    /// verification rather than trusted.
    PlayerState {
        position: Vec3,
    },
    /// One message per shot. The server builds its authoritative twin from
    /// the same parameters.
    Fire {
        spawn: ProjectileSpawn,
    },
    /// Aggregated player-to-enemy hit claims.
    HitReport {
        entries: Vec<HitEntry>,
    },
    /// Enemy projectile struck the local player, per the client's own
    /// simulation. Subject to server-side trajectory verification.
    ProjectileHitMe {
        projectile_id: String,
        impact: Vec3,
        timestamp_ms: u64,
    },
    Pong {
        nonce: u32,
    },

    // Server -> client
    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    /// Player shots fired near this client, batched on a short interval.
    SpawnBatch {
        spawns: Vec<ProjectileSpawn>,
    },
    /// Enemy shots are rare and latency-sensitive, so they skip batching.
    EnemyFire {
        spawn: ProjectileSpawn,
    },
    EnemyState {
        timestamp_ms: u64,
        enemies: Vec<EnemySnapshot>,
    },
    /// Verified damage applied to an enemy.
    Damage {
        target_id: String,
        amount: i32,
        remaining_hp: i32,
    },
    /// Verified damage applied to the receiving player.
    PlayerDamage {
        amount: i32,
        remaining_hp: i32,
    },
    Ping {
        nonce: u32,
    },
}
