//! Server-side hit verification and damage application.
//!
//! Everything arriving here is adversarial input. Player-to-enemy reports
//! are checked against weapon range; enemy-to-player reports are checked
//! against the recomputed trajectory of the server's own projectile record
//! with a latency-scaled leeway. Rejections are logged for audit and never
//! surfaced to the client as errors.

use crate::game::ServerGame;
use crate::registry::ProjectileRegistry;
use log::{debug, info, warn};
use rand::Rng;
use shared::{position_at, CombatConfig, HitEntry, OwnerKind, Vec3, WeaponSpec};
use std::collections::HashMap;

/// Verified damage against one enemy, ready to broadcast.
#[derive(Debug, Clone)]
pub struct DamageEvent {
    pub target_id: String,
    pub amount: i32,
    pub remaining_hp: i32,
    pub position: Vec3,
}

/// Outcome of verifying one enemy-projectile-hit-player report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyHitVerdict {
    /// Damage to apply to the reporting player.
    Accepted { damage: i32 },
    /// Position deviation exceeded the latency leeway.
    Rejected,
    /// Projectile id not tracked (already consumed or expired): too late,
    /// silently ignored.
    Unknown,
}

pub struct HitVerifier {
    config: CombatConfig,
}

impl HitVerifier {
    pub fn new(config: CombatConfig) -> Self {
        Self { config }
    }

    /// One damage roll: uniform in the weapon's range, reduced by defense,
    /// never below 1.
    fn roll_damage<R: Rng>(rng: &mut R, min: i32, max: i32, defense: i32) -> i32 {
        let raw = if max > min { rng.gen_range(min..=max) } else { min };
        (raw - defense).max(1)
    }

    /// Player-to-enemy: validates each aggregated entry and applies the
    /// summed damage rolls in one application per target.
    pub fn apply_player_hits<R: Rng>(
        &self,
        entries: &[HitEntry],
        attacker_pos: Vec3,
        weapon: &WeaponSpec,
        game: &mut ServerGame,
        rng: &mut R,
    ) -> Vec<DamageEvent> {
        let mut events = Vec::new();
        let max_range = weapon.range() + self.config.range_latency_allowance;

        for entry in entries {
            let Some(enemy) = game.enemies.get(&entry.target_id) else {
                debug!("Hit report for unknown enemy {}", entry.target_id);
                continue;
            };

            let distance = attacker_pos.planar_distance(&enemy.position);
            if distance > max_range {
                warn!(
                    "Rejected hit on {}: attacker {:.1} units away, weapon range {:.1}",
                    entry.target_id, distance, max_range
                );
                continue;
            }

            let defense = enemy.defense;
            let position = enemy.position;
            let mut total = 0;
            for _ in 0..entry.hit_count {
                total += Self::roll_damage(rng, weapon.damage_min, weapon.damage_max, defense);
            }

            if let Some((applied, remaining_hp)) = game.damage_enemy(&entry.target_id, total) {
                events.push(DamageEvent {
                    target_id: entry.target_id.clone(),
                    amount: applied,
                    remaining_hp,
                    position,
                });
            }
        }

        events
    }

    /// Enemy-to-player: recomputes where the server's projectile should be
    /// right now and accepts only if both the reporting player and the
    /// claimed impact sit within the latency-scaled leeway of that point.
    /// Accepted hits consume the registry entry, so a duplicate report of
    /// the same projectile resolves to `Unknown`.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_enemy_hit<R: Rng>(
        &self,
        registry: &mut ProjectileRegistry,
        projectile_id: &str,
        reported_impact: Vec3,
        player_pos: Vec3,
        ping_ms: u64,
        now_ms: u64,
        rng: &mut R,
    ) -> EnemyHitVerdict {
        let Some(projectile) = registry.get(projectile_id) else {
            return EnemyHitVerdict::Unknown;
        };

        // Only enemy-owned projectiles can hurt a player. A player-owned
        // registry entry here means a forged or misdirected claim.
        if projectile.owner_kind != OwnerKind::Enemy {
            warn!(
                "Rejected hit claim for {}: projectile is not enemy-owned",
                projectile_id
            );
            return EnemyHitVerdict::Rejected;
        }

        let expected = position_at(projectile, projectile.elapsed_ms(now_ms));
        let leeway = self.config.max_leeway(projectile.speed, ping_ms);

        let player_deviation = expected.planar_distance(&player_pos);
        let impact_deviation = expected.planar_distance(&reported_impact);

        if player_deviation > leeway || impact_deviation > leeway {
            warn!(
                "Rejected hit claim for {}: player off by {:.1}, impact off by {:.1}, \
                 leeway {:.1} at {}ms ping",
                projectile_id, player_deviation, impact_deviation, leeway, ping_ms
            );
            return EnemyHitVerdict::Rejected;
        }

        let (damage_min, damage_max) = (projectile.damage_min, projectile.damage_max);
        // Consume before applying: a second report for this id finds nothing.
        registry.take(projectile_id);

        EnemyHitVerdict::Accepted {
            damage: Self::roll_damage(rng, damage_min, damage_max, 0),
        }
    }
}

/// Per-player fixed-window hit counter. Hits past the cap are dropped
/// silently; this is a soft anti-spam cap, not a ban.
pub struct RateLimiter {
    window_ms: u64,
    max_hits: u32,
    windows: HashMap<u32, (u64, u32)>,
}

impl RateLimiter {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            window_ms: config.rate_limit_window_ms,
            max_hits: config.max_hits_per_window,
            windows: HashMap::new(),
        }
    }

    /// Counts `hits` against the player's current window. Returns how many
    /// of them are allowed through.
    pub fn allow(&mut self, player_id: u32, hits: u32, now_ms: u64) -> u32 {
        let (window_start, count) = self.windows.entry(player_id).or_insert((now_ms, 0));
        if now_ms.saturating_sub(*window_start) >= self.window_ms {
            *window_start = now_ms;
            *count = 0;
        }

        let allowed = hits.min(self.max_hits.saturating_sub(*count));
        *count += allowed;
        if allowed < hits {
            debug!(
                "Rate cap: dropped {} hits from player {} this window",
                hits - allowed,
                player_id
            );
        }
        allowed
    }

    pub fn forget(&mut self, player_id: u32) {
        self.windows.remove(&player_id);
    }
}

#[derive(Debug, Default, Clone)]
struct DpsWindow {
    total_damage: i64,
    window_start_ms: u64,
    anomalous_streak: u32,
    flags: u32,
}

/// Rolling-window DPS observation per attacking player. Sustained output
/// beyond the theoretical weapon maximum raises flags for human review and
/// never punishes automatically.
pub struct DpsTracker {
    window_ms: u64,
    leniency: f32,
    flag_windows: u32,
    players: HashMap<u32, DpsWindow>,
}

impl DpsTracker {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            window_ms: config.dps_window_ms,
            leniency: config.dps_leniency_multiplier,
            flag_windows: config.dps_flag_windows,
            players: HashMap::new(),
        }
    }

    /// Accumulates verified damage. `expected_max_dps` comes from the
    /// attacker's fire-rate formula and weapon ceiling.
    pub fn record(&mut self, player_id: u32, damage: i32, expected_max_dps: f32, now_ms: u64) {
        let window = self.players.entry(player_id).or_insert_with(|| DpsWindow {
            window_start_ms: now_ms,
            ..Default::default()
        });

        if now_ms.saturating_sub(window.window_start_ms) >= self.window_ms {
            let seconds = self.window_ms as f32 / 1000.0;
            let actual_dps = window.total_damage as f32 / seconds;
            let ceiling = expected_max_dps * self.leniency;

            if actual_dps > ceiling {
                window.anomalous_streak += 1;
                if window.anomalous_streak >= self.flag_windows {
                    window.flags += 1;
                    window.anomalous_streak = 0;
                    warn!(
                        "DPS flag for player {}: {:.1} sustained vs {:.1} ceiling ({} total flags)",
                        player_id, actual_dps, ceiling, window.flags
                    );
                }
            } else {
                window.anomalous_streak = 0;
            }

            window.total_damage = 0;
            window.window_start_ms = now_ms;
        }

        window.total_damage += damage as i64;
    }

    pub fn flags(&self, player_id: u32) -> u32 {
        self.players.get(&player_id).map_or(0, |w| w.flags)
    }

    pub fn forget(&mut self, player_id: u32) {
        if self.players.remove(&player_id).is_some() {
            info!("Cleared DPS tracking for player {}", player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_enemy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{MotionPattern, OwnerKind, PatternParams, Projectile};
    use std::collections::HashSet;

    fn enemy_projectile(id: &str, spawn_time_ms: u64) -> Projectile {
        Projectile {
            id: id.to_string(),
            shot_seq: 0,
            owner_id: "enemy-1".to_string(),
            owner_kind: OwnerKind::Enemy,
            origin: Vec3::default(),
            direction: Vec3::new(1.0, 0.0, 0.0),
            speed: 80.0,
            lifetime_s: 1.0,
            spawn_time_ms,
            pattern: MotionPattern::Straight,
            params: PatternParams::default(),
            radius: 1.0,
            damage_min: 4,
            damage_max: 8,
            pierce: false,
            pierce_count: 0,
            hit_set: HashSet::new(),
        }
    }

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

    #[test]
    fn test_accepts_hit_within_leeway() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut registry = ProjectileRegistry::new(&CombatConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        registry.spawn(enemy_projectile("p-1", 0));

        // At 250ms the projectile is at (20, 0, 0); the player stands there.
        let verdict = verifier.verify_enemy_hit(
            &mut registry,
            "p-1",
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(21.0, 0.0, 0.0),
            100,
            250,
            &mut rng,
        );
        match verdict {
            EnemyHitVerdict::Accepted { damage } => assert!(damage >= 1),
            other => panic!("Expected acceptance, got {:?}", other),
        }
        // Consumed on acceptance
        assert!(registry.get("p-1").is_none());
    }

    #[test]
    fn test_rejects_implausible_impact() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut registry = ProjectileRegistry::new(&CombatConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        registry.spawn(enemy_projectile("p-1", 0));

        // Claimed impact implies the projectile covered far more ground
        // than speed allows even with maximum leeway.
        let verdict = verifier.verify_enemy_hit(
            &mut registry,
            "p-1",
            Vec3::new(200.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            100,
            250,
            &mut rng,
        );
        assert_eq!(verdict, EnemyHitVerdict::Rejected);
        // Rejected hits leave the projectile alive
        assert!(registry.get("p-1").is_some());
    }

    #[test]
    fn test_player_owned_projectile_never_satisfies_self_hit() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut registry = ProjectileRegistry::new(&CombatConfig::default());
        let mut rng = StdRng::seed_from_u64(3);

        let mut squatter = enemy_projectile("enemy-1-shot-1", 0);
        squatter.owner_id = "player-2".to_string();
        squatter.owner_kind = OwnerKind::Player;
        registry.spawn(squatter);

        // Even a perfectly on-trajectory claim is refused when the registry
        // entry is player-owned, and the entry is not consumed.
        let impact = Vec3::new(20.0, 0.0, 0.0);
        let verdict =
            verifier.verify_enemy_hit(&mut registry, "enemy-1-shot-1", impact, impact, 100, 250, &mut rng);
        assert_eq!(verdict, EnemyHitVerdict::Rejected);
        assert!(registry.get("enemy-1-shot-1").is_some());
    }

    #[test]
    fn test_duplicate_report_is_unknown() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut registry = ProjectileRegistry::new(&CombatConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        registry.spawn(enemy_projectile("p-1", 0));

        let impact = Vec3::new(20.0, 0.0, 0.0);
        let first =
            verifier.verify_enemy_hit(&mut registry, "p-1", impact, impact, 100, 250, &mut rng);
        assert!(matches!(first, EnemyHitVerdict::Accepted { .. }));

        let second =
            verifier.verify_enemy_hit(&mut registry, "p-1", impact, impact, 100, 250, &mut rng);
        assert_eq!(second, EnemyHitVerdict::Unknown);
    }

    #[test]
    fn test_higher_ping_never_rejects_previously_accepted() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let impact = Vec3::new(26.0, 0.0, 0.0);
        let player = Vec3::new(24.0, 0.0, 0.0);

        let mut accepted_at_lower = false;
        for ping in [0u64, 100, 200, 400, 800] {
            let mut registry = ProjectileRegistry::new(&CombatConfig::default());
            registry.spawn(enemy_projectile("p-1", 0));
            let verdict =
                verifier.verify_enemy_hit(&mut registry, "p-1", impact, player, ping, 250, &mut rng);
            let accepted = matches!(verdict, EnemyHitVerdict::Accepted { .. });
            assert!(
                !accepted_at_lower || accepted,
                "hit accepted at lower ping but rejected at {}ms",
                ping
            );
            accepted_at_lower |= accepted;
        }
    }

    #[test]
    fn test_player_hits_apply_damage_once() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut game = ServerGame::new(20.0);
        let mut rng = StdRng::seed_from_u64(9);
        game.spawn_enemy(test_enemy("enemy-1", Vec3::new(20.0, 0.0, 0.0)));

        let entries = vec![HitEntry {
            target_id: "enemy-1".to_string(),
            hit_count: 2,
            last_position: Vec3::new(20.0, 0.0, 0.0),
            timestamp_ms: 250,
        }];
        let events =
            verifier.apply_player_hits(&entries, Vec3::default(), &test_weapon(), &mut game, &mut rng);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        // Two rolls of 5..=10 minus defense 2, floored at 1 each.
        assert!(event.amount >= 6 && event.amount <= 16);
        assert_eq!(event.remaining_hp, 30 - event.amount);
        assert_eq!(
            game.enemies.get("enemy-1").unwrap().current_hp,
            event.remaining_hp
        );
    }

    #[test]
    fn test_player_hits_rejected_out_of_range() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut game = ServerGame::new(20.0);
        let mut rng = StdRng::seed_from_u64(9);
        // Weapon range 40 + allowance 30; enemy at 500 is far outside.
        game.spawn_enemy(test_enemy("enemy-1", Vec3::new(500.0, 0.0, 0.0)));

        let entries = vec![HitEntry {
            target_id: "enemy-1".to_string(),
            hit_count: 1,
            last_position: Vec3::new(500.0, 0.0, 0.0),
            timestamp_ms: 250,
        }];
        let events =
            verifier.apply_player_hits(&entries, Vec3::default(), &test_weapon(), &mut game, &mut rng);

        assert!(events.is_empty());
        assert_eq!(game.enemies.get("enemy-1").unwrap().current_hp, 30);
    }

    #[test]
    fn test_unknown_enemy_ignored() {
        let verifier = HitVerifier::new(CombatConfig::default());
        let mut game = ServerGame::new(20.0);
        let mut rng = StdRng::seed_from_u64(9);

        let entries = vec![HitEntry {
            target_id: "ghost".to_string(),
            hit_count: 1,
            last_position: Vec3::default(),
            timestamp_ms: 0,
        }];
        let events =
            verifier.apply_player_hits(&entries, Vec3::default(), &test_weapon(), &mut game, &mut rng);
        assert!(events.is_empty());
    }

    #[test]
    fn test_rate_limiter_caps_per_window() {
        let mut config = CombatConfig::default();
        config.max_hits_per_window = 5;
        config.rate_limit_window_ms = 1000;
        let mut limiter = RateLimiter::new(&config);

        assert_eq!(limiter.allow(1, 3, 0), 3);
        assert_eq!(limiter.allow(1, 3, 100), 2);
        assert_eq!(limiter.allow(1, 3, 200), 0);
        // New window resets the counter
        assert_eq!(limiter.allow(1, 3, 1200), 3);
    }

    #[test]
    fn test_rate_limiter_windows_are_per_player() {
        let mut config = CombatConfig::default();
        config.max_hits_per_window = 2;
        let mut limiter = RateLimiter::new(&config);

        assert_eq!(limiter.allow(1, 2, 0), 2);
        assert_eq!(limiter.allow(2, 2, 0), 2);
        assert_eq!(limiter.allow(1, 1, 10), 0);
    }

    #[test]
    fn test_dps_flags_after_consecutive_windows() {
        let mut config = CombatConfig::default();
        config.dps_window_ms = 1000;
        config.dps_flag_windows = 2;
        config.dps_leniency_multiplier = 2.0;
        let mut tracker = DpsTracker::new(&config);

        // Expected max 10 dps, ceiling 20; sustain 100/window.
        tracker.record(1, 100, 10.0, 0);
        tracker.record(1, 100, 10.0, 1000); // closes window 1, streak 1
        tracker.record(1, 100, 10.0, 2000); // closes window 2, streak 2 -> flag
        assert_eq!(tracker.flags(1), 1);
    }

    #[test]
    fn test_dps_streak_resets_on_normal_window() {
        let mut config = CombatConfig::default();
        config.dps_window_ms = 1000;
        config.dps_flag_windows = 2;
        config.dps_leniency_multiplier = 2.0;
        let mut tracker = DpsTracker::new(&config);

        tracker.record(1, 100, 10.0, 0);
        tracker.record(1, 1, 10.0, 1000); // anomalous close, streak 1
        tracker.record(1, 100, 10.0, 2000); // normal close, streak resets
        tracker.record(1, 100, 10.0, 3000); // anomalous close, streak 1
        assert_eq!(tracker.flags(1), 0);
    }

    #[test]
    fn test_damage_roll_floors_at_one() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let damage = HitVerifier::roll_damage(&mut rng, 2, 4, 100);
            assert_eq!(damage, 1);
        }
    }
}
