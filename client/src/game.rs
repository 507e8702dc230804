//! Client world view.
//!
//! The local player is fully client-owned; enemies are mirrored from
//! server snapshots and interpolated a short way behind real time so
//! they move smoothly between updates.

use shared::{EnemySnapshot, Vec3};

/// How far behind real time enemies are rendered.
const INTERPOLATION_DELAY_MS: u64 = 100;
/// Snapshots older than this are dropped from the buffer.
const SNAPSHOT_RETENTION_MS: u64 = 500;

pub struct ClientWorld {
    pub player_position: Vec3,
    pub player_hp: i32,
    pub player_max_hp: i32,
    snapshot_buffer: Vec<(u64, Vec<EnemySnapshot>)>,
}

impl ClientWorld {
    pub fn new(max_hp: i32) -> Self {
        Self {
            player_position: Vec3::default(),
            player_hp: max_hp,
            player_max_hp: max_hp,
            snapshot_buffer: Vec::new(),
        }
    }

    pub fn apply_enemy_state(&mut self, timestamp_ms: u64, enemies: Vec<EnemySnapshot>) {
        self.snapshot_buffer.push((timestamp_ms, enemies));
        self.snapshot_buffer.sort_by_key(|(ts, _)| *ts);

        let cutoff = timestamp_ms.saturating_sub(SNAPSHOT_RETENTION_MS);
        self.snapshot_buffer.retain(|(ts, _)| *ts > cutoff);
    }

    pub fn apply_player_damage(&mut self, remaining_hp: i32) {
        self.player_hp = remaining_hp;
    }

    /// Enemy states at the delayed render time, interpolated between the
    /// surrounding snapshots. Enemies present only in the newer snapshot
    /// appear there without interpolation.
    pub fn enemies_at(&self, now_ms: u64) -> Vec<EnemySnapshot> {
        let render_time = now_ms.saturating_sub(INTERPOLATION_DELAY_MS);

        let mut before = None;
        let mut after = None;
        for (timestamp, enemies) in &self.snapshot_buffer {
            if *timestamp <= render_time {
                before = Some((*timestamp, enemies));
            } else {
                after = Some((*timestamp, enemies));
                break;
            }
        }

        match (before, after) {
            (Some((t1, older)), Some((t2, newer))) => {
                let alpha = if t2 > t1 {
                    ((render_time - t1) as f32) / ((t2 - t1) as f32)
                } else {
                    0.0
                }
                .clamp(0.0, 1.0);

                newer
                    .iter()
                    .map(|current| {
                        let mut enemy = current.clone();
                        if let Some(prev) = older.iter().find(|e| e.id == current.id) {
                            enemy.position = Vec3::new(
                                prev.position.x + (current.position.x - prev.position.x) * alpha,
                                prev.position.y + (current.position.y - prev.position.y) * alpha,
                                prev.position.z + (current.position.z - prev.position.z) * alpha,
                            );
                        }
                        enemy
                    })
                    .collect()
            }
            (Some((_, enemies)), None) => enemies.clone(),
            (None, Some((_, enemies))) => enemies.clone(),
            (None, None) => Vec::new(),
        }
    }
}
