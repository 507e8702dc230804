//! Authoritative in-flight projectile table.
//!
//! One entry per projectile the server believes exists, player-fired and
//! enemy-fired alike. Entries are advanced every tick only for expiry
//! bookkeeping; actual positions are recomputed on demand from the shared
//! trajectory engine.

use log::debug;
use shared::{position_at, CombatConfig, Projectile, Vec3};
use std::collections::HashMap;

pub struct ProjectileRegistry {
    projectiles: HashMap<String, Projectile>,
    /// Expired entries linger this long so late hit reports are judged by
    /// trajectory math rather than map-removal timing.
    expiry_grace_ms: u64,
}

impl ProjectileRegistry {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            projectiles: HashMap::new(),
            expiry_grace_ms: config.registry_expiry_grace_ms,
        }
    }

    pub fn spawn(&mut self, projectile: Projectile) {
        // Re-spawn of a known id keeps the original; the first creation of
        // a shot is the one both sides agreed on.
        self.projectiles
            .entry(projectile.id.clone())
            .or_insert(projectile);
    }

    pub fn get(&self, id: &str) -> Option<&Projectile> {
        self.projectiles.get(id)
    }

    /// Removes and returns the projectile. A second `take` of the same id
    /// returns `None`, which is what makes verified hit consumption
    /// idempotent.
    pub fn take(&mut self, id: &str) -> Option<Projectile> {
        self.projectiles.remove(id)
    }

    /// Expected position of a tracked projectile right now, recomputed from
    /// spawn parameters.
    pub fn expected_position(&self, id: &str, now_ms: u64) -> Option<Vec3> {
        self.projectiles
            .get(id)
            .map(|p| position_at(p, p.elapsed_ms(now_ms)))
    }

    /// Drops entries past lifetime plus grace. Runs once per server tick.
    pub fn tick(&mut self, now_ms: u64) {
        let grace = self.expiry_grace_ms;
        let before = self.projectiles.len();
        self.projectiles
            .retain(|_, p| p.elapsed_ms(now_ms) <= (p.lifetime_s * 1000.0) as u64 + grace);
        let dropped = before - self.projectiles.len();
        if dropped > 0 {
            debug!("Expired {} projectiles, {} in flight", dropped, self.projectiles.len());
        }
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }
}
