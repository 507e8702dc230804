use serde::{Deserialize, Serialize};

/// Combat tuning values. These are balance/tolerance knobs, not invariants:
/// tests and deployments construct their own instead of relying on
/// hard-coded constants scattered through the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Spatial index cell edge length in world units.
    pub grid_cell_size: f32,
    /// Radius used when asking the grid for hit candidates around a
    /// projectile. Must cover the largest hitbox plus projectile radius.
    pub hit_lookup_radius: f32,

    /// Hits per target sent to the server instantly before batching kicks in.
    pub immediate_hit_budget: u32,
    /// Interval between aggregated hit report flushes, in milliseconds.
    pub report_flush_interval_ms: u64,
    /// Quiet time after which a target's immediate-hit budget resets.
    pub immediate_budget_reset_ms: u64,

    /// Lower clamp on measured ping when scaling hit leeway, milliseconds.
    pub min_ping_ms: u64,
    /// Upper clamp on measured ping when scaling hit leeway, milliseconds.
    pub max_ping_ms: u64,
    /// Flat positional tolerance added on top of the latency-scaled leeway.
    pub fixed_hit_tolerance: f32,
    /// Extra range granted on attacker-to-target distance checks to absorb
    /// latency between firing and reporting.
    pub range_latency_allowance: f32,

    /// Length of one rate-limiting window in milliseconds.
    pub rate_limit_window_ms: u64,
    /// Maximum accepted hits per player per window; the rest are dropped.
    pub max_hits_per_window: u32,

    /// Length of one DPS observation window in milliseconds.
    pub dps_window_ms: u64,
    /// Actual DPS may exceed the theoretical maximum by this factor before
    /// a window counts as anomalous.
    pub dps_leniency_multiplier: f32,
    /// Consecutive anomalous windows required to raise one flag.
    pub dps_flag_windows: u32,

    /// Players farther than this from an event never receive its packet.
    pub interest_radius: f32,
    /// Interval between player-shot spawn batch flushes, milliseconds.
    pub spawn_batch_interval_ms: u64,
    /// How long expired projectiles linger in the registry before removal,
    /// so late reports are judged by position rather than map timing.
    pub registry_expiry_grace_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            grid_cell_size: 20.0,
            hit_lookup_radius: 8.0,
            immediate_hit_budget: 2,
            report_flush_interval_ms: 200,
            immediate_budget_reset_ms: 1000,
            min_ping_ms: 50,
            max_ping_ms: 500,
            fixed_hit_tolerance: 10.0,
            range_latency_allowance: 30.0,
            rate_limit_window_ms: 1000,
            max_hits_per_window: 60,
            dps_window_ms: 5000,
            dps_leniency_multiplier: 2.0,
            dps_flag_windows: 3,
            interest_radius: 150.0,
            spawn_batch_interval_ms: 100,
            registry_expiry_grace_ms: 250,
        }
    }
}

impl CombatConfig {
    /// Latency-scaled positional leeway for verifying a reported hit from a
    /// projectile moving at `speed`, given the reporter's measured ping.
    pub fn max_leeway(&self, speed: f32, ping_ms: u64) -> f32 {
        let clamped = ping_ms.clamp(self.min_ping_ms, self.max_ping_ms);
        speed * (clamped as f32 / 1000.0) + self.fixed_hit_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_leeway_clamps_low_ping() {
        let cfg = CombatConfig::default();
        // 0ms and 50ms ping produce the same window
        assert_approx_eq!(cfg.max_leeway(80.0, 0), cfg.max_leeway(80.0, 50));
    }

    #[test]
    fn test_leeway_clamps_high_ping() {
        let cfg = CombatConfig::default();
        assert_approx_eq!(cfg.max_leeway(80.0, 500), cfg.max_leeway(80.0, 5000));
    }

    #[test]
    fn test_leeway_monotonic_in_ping() {
        let cfg = CombatConfig::default();
        let mut prev = 0.0;
        for ping in (0..1000).step_by(25) {
            let leeway = cfg.max_leeway(80.0, ping);
            assert!(leeway >= prev, "leeway shrank at ping {}", ping);
            prev = leeway;
        }
    }

    #[test]
    fn test_leeway_includes_fixed_tolerance() {
        let cfg = CombatConfig::default();
        assert!(cfg.max_leeway(0.0, 0) >= cfg.fixed_hit_tolerance);
    }
}
