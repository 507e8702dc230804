//! Interest-radius broadcast filtering and spawn batching.
//!
//! Players outside the interest radius of an event never receive its packet
//! at all. Player-shot spawns are additionally queued per recipient and
//! flushed on a short interval as one batch packet, since dozens of
//! per-shot datagrams per second per shooter add up fast; enemy shots are
//! rare and skip the queue.

use shared::{CombatConfig, ProjectileSpawn, Vec3};
use std::collections::HashMap;

/// Clients within `radius` of `event_pos`. The shooter (or other excluded
/// client) is filtered out because they already run the local copy.
pub fn interest_filter(
    event_pos: &Vec3,
    players: &[(u32, Vec3)],
    radius: f32,
    exclude: Option<u32>,
) -> Vec<u32> {
    let radius_sq = radius * radius;
    players
        .iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .filter(|(_, pos)| pos.planar_distance_sq(event_pos) <= radius_sq)
        .map(|(id, _)| *id)
        .collect()
}

/// Per-recipient queue of player-shot spawns, flushed on a fixed interval.
pub struct SpawnBatcher {
    interval_ms: u64,
    last_flush_ms: u64,
    pending: HashMap<u32, Vec<ProjectileSpawn>>,
}

impl SpawnBatcher {
    pub fn new(config: &CombatConfig, now_ms: u64) -> Self {
        Self {
            interval_ms: config.spawn_batch_interval_ms,
            last_flush_ms: now_ms,
            pending: HashMap::new(),
        }
    }

    pub fn queue(&mut self, recipients: &[u32], spawn: &ProjectileSpawn) {
        for &recipient in recipients {
            self.pending
                .entry(recipient)
                .or_default()
                .push(spawn.clone());
        }
    }

    /// Drains all queued spawns grouped per recipient once the interval has
    /// elapsed; returns an empty list otherwise.
    pub fn flush(&mut self, now_ms: u64) -> Vec<(u32, Vec<ProjectileSpawn>)> {
        if now_ms.saturating_sub(self.last_flush_ms) < self.interval_ms {
            return Vec::new();
        }
        self.last_flush_ms = now_ms;
        self.pending.drain().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn forget(&mut self, recipient: u32) {
        self.pending.remove(&recipient);
    }
}
