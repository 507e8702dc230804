use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which side fired a projectile. Enemy shots are verified against the
/// local player; player shots are verified against enemy rosters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerKind {
    Player,
    Enemy,
}

/// Closed set of trajectory families. Every projectile carries exactly one;
/// the trajectory engine matches exhaustively so an unhandled pattern is a
/// compile error, not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionPattern {
    Straight,
    Wavy,
    Parametric,
    Boomerang,
    AmplitudeWave,
}

/// Pattern tuning values. Fields a pattern does not use stay at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PatternParams {
    /// Lateral offset scale for AmplitudeWave, world units.
    pub amplitude: f32,
    /// Oscillation count over one lifetime for AmplitudeWave.
    pub frequency: f32,
    /// Heading deviation (radians) for Wavy, lateral scale for Parametric.
    pub magnitude: f32,
    /// Angular frequency of the Wavy heading oscillation, radians/second.
    pub period: f32,
}

/// One in-flight projectile. The client and server each own an independent
/// copy linked only by `id`; position is always recomputed from elapsed
/// time, never accumulated, so either side can rebuild "where should this
/// be right now" from the spawn parameters alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: String,
    /// Per-shot counter whose low bit selects wave phase parity. Two shots
    /// fired together with adjacent counters mirror each other laterally.
    pub shot_seq: u32,
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub origin: Vec3,
    /// Unit vector on the ground plane.
    pub direction: Vec3,
    /// World units per second.
    pub speed: f32,
    pub lifetime_s: f32,
    /// Wall clock at creation, milliseconds since the epoch.
    pub spawn_time_ms: u64,
    pub pattern: MotionPattern,
    pub params: PatternParams,
    /// Collision radius of the projectile itself.
    pub radius: f32,
    pub damage_min: i32,
    pub damage_max: i32,
    pub pierce: bool,
    /// Additional targets a piercing projectile may pass through after the
    /// first. A non-piercing projectile ignores this and dies on first hit.
    pub pierce_count: u32,
    /// Targets already struck. Piercing projectiles never hit the same
    /// target twice.
    pub hit_set: HashSet<String>,
}

impl Projectile {
    pub fn from_weapon(
        id: String,
        shot_seq: u32,
        owner_id: String,
        weapon: &WeaponSpec,
        origin: Vec3,
        direction: Vec3,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            shot_seq,
            owner_id,
            owner_kind: OwnerKind::Player,
            origin,
            direction: direction.planar_normalize(),
            speed: weapon.speed,
            lifetime_s: weapon.lifetime_s,
            spawn_time_ms: now_ms,
            pattern: weapon.pattern,
            params: weapon.params,
            radius: weapon.projectile_radius,
            damage_min: weapon.damage_min,
            damage_max: weapon.damage_max,
            pierce: weapon.pierce,
            pierce_count: weapon.pierce_count,
            hit_set: HashSet::new(),
        }
    }

    pub fn from_enemy_attack(
        id: String,
        shot_seq: u32,
        owner_id: String,
        attack: &EnemyAttackSpec,
        origin: Vec3,
        direction: Vec3,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            shot_seq,
            owner_id,
            owner_kind: OwnerKind::Enemy,
            origin,
            direction: direction.planar_normalize(),
            speed: attack.speed,
            lifetime_s: attack.lifetime_s,
            spawn_time_ms: now_ms,
            pattern: attack.pattern,
            params: attack.params,
            radius: attack.projectile_radius,
            damage_min: attack.damage_min,
            damage_max: attack.damage_max,
            pierce: false,
            pierce_count: 0,
            hit_set: HashSet::new(),
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.spawn_time_ms)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) as f32 / 1000.0 > self.lifetime_s
    }

    /// Maximum distinct targets this projectile may strike in total.
    pub fn max_hits(&self) -> u32 {
        if self.pierce {
            1 + self.pierce_count
        } else {
            1
        }
    }

    pub fn pierce_exhausted(&self) -> bool {
        self.hit_set.len() as u32 >= self.max_hits()
    }

    /// Records a strike against `target_id`. Returns false for a repeat
    /// target or a projectile whose budget is already spent.
    pub fn register_hit(&mut self, target_id: &str) -> bool {
        if self.pierce_exhausted() || self.hit_set.contains(target_id) {
            return false;
        }
        self.hit_set.insert(target_id.to_string());
        true
    }
}

/// Static weapon definition. Sourced from item data externally; the combat
/// core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub damage_min: i32,
    pub damage_max: i32,
    pub speed: f32,
    pub lifetime_s: f32,
    pub pattern: MotionPattern,
    pub params: PatternParams,
    pub pierce: bool,
    pub pierce_count: u32,
    pub projectile_radius: f32,
    /// Shots per second with zero attack stat.
    pub base_rate: f32,
    pub projectiles_per_shot: u32,
}

impl WeaponSpec {
    /// Effective range is how far the projectile travels over its lifetime.
    pub fn range(&self) -> f32 {
        self.speed * self.lifetime_s
    }

    /// Attack-stat scaling for fire rate. The stat source (a dexterity-like
    /// value) is defined outside the combat core.
    pub fn attack_rate(&self, attack_stat: f32) -> f32 {
        self.base_rate * (1.0 + attack_stat / STAT_RATE_SCALE)
    }

    /// Theoretical damage ceiling per second, used by DPS anomaly tracking.
    pub fn max_dps(&self, attack_stat: f32) -> f32 {
        self.attack_rate(attack_stat) * self.projectiles_per_shot as f32 * self.damage_max as f32
    }
}

/// Divisor mapping attack stat points to fire-rate multiplier.
pub const STAT_RATE_SCALE: f32 = 100.0;

/// Static enemy ranged attack definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyAttackSpec {
    pub damage_min: i32,
    pub damage_max: i32,
    pub speed: f32,
    pub lifetime_s: f32,
    pub pattern: MotionPattern,
    pub params: PatternParams,
    pub projectile_radius: f32,
    pub cooldown_s: f32,
    pub aggro_radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_weapon() -> WeaponSpec {
        WeaponSpec {
            damage_min: 5,
            damage_max: 10,
            speed: 80.0,
            lifetime_s: 0.5,
            pattern: MotionPattern::Straight,
            params: PatternParams::default(),
            pierce: false,
            pierce_count: 0,
            projectile_radius: 1.0,
            base_rate: 2.0,
            projectiles_per_shot: 1,
        }
    }

    fn spawn(weapon: &WeaponSpec) -> Projectile {
        Projectile::from_weapon(
            "p-1".to_string(),
            0,
            "player-1".to_string(),
            weapon,
            Vec3::default(),
            Vec3::new(1.0, 0.0, 0.0),
            1_000,
        )
    }

    #[test]
    fn test_expiry() {
        let p = spawn(&test_weapon());
        assert!(!p.is_expired(1_000));
        assert!(!p.is_expired(1_500));
        assert!(p.is_expired(1_600));
    }

    #[test]
    fn test_elapsed_saturates_before_spawn() {
        let p = spawn(&test_weapon());
        assert_eq!(p.elapsed_ms(500), 0);
    }

    #[test]
    fn test_non_piercing_dies_on_first_hit() {
        let mut p = spawn(&test_weapon());
        assert!(p.register_hit("e1"));
        assert!(p.pierce_exhausted());
        assert!(!p.register_hit("e2"));
    }

    #[test]
    fn test_pierce_budget_counts_distinct_targets() {
        let mut weapon = test_weapon();
        weapon.pierce = true;
        weapon.pierce_count = 2;
        let mut p = spawn(&weapon);

        assert!(p.register_hit("e1"));
        // Repeat target consumes nothing
        assert!(!p.register_hit("e1"));
        assert!(!p.pierce_exhausted());
        assert!(p.register_hit("e2"));
        assert!(p.register_hit("e3"));
        assert!(p.pierce_exhausted());
        assert!(!p.register_hit("e4"));
    }

    #[test]
    fn test_weapon_range() {
        let weapon = test_weapon();
        assert_eq!(weapon.range(), 40.0);
    }

    #[test]
    fn test_attack_rate_scales_with_stat() {
        let weapon = test_weapon();
        assert_eq!(weapon.attack_rate(0.0), 2.0);
        assert!(weapon.attack_rate(50.0) > weapon.attack_rate(0.0));
        assert_eq!(weapon.attack_rate(100.0), 4.0);
    }

    #[test]
    fn test_direction_normalized_on_spawn() {
        let weapon = test_weapon();
        let p = Projectile::from_weapon(
            "p-2".to_string(),
            1,
            "player-1".to_string(),
            &weapon,
            Vec3::default(),
            Vec3::new(10.0, 0.0, 0.0),
            0,
        );
        assert!((p.direction.planar_length() - 1.0).abs() < 1e-6);
    }
}
