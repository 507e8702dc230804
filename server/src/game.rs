//! Authoritative world state: the enemy roster, the server's spatial index,
//! and the enemy-side projectile producer.
//!
//! The full enemy behavior tree (chase/orbit/wander/charge) lives outside
//! the combat core. What combat needs from it is only the producer
//! interface implemented here: an off-cooldown enemy with a player inside
//! its aggro radius fires a projectile at that player.

use log::info;
use rand::Rng;
use shared::{EnemyAttackSpec, EnemySnapshot, Projectile, SpatialGrid, Vec3};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: String,
    pub position: Vec3,
    pub hitbox_radius: f32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub defense: i32,
    pub attack: EnemyAttackSpec,
    /// Seconds until this enemy may fire again.
    pub cooldown_s: f32,
}

pub struct ServerGame {
    pub enemies: HashMap<String, Enemy>,
    /// Ground-plane index over enemies, shared by hit verification range
    /// checks and aggro queries.
    pub enemy_grid: SpatialGrid,
    next_enemy_shot: u32,
}

impl ServerGame {
    pub fn new(grid_cell_size: f32) -> Self {
        Self {
            enemies: HashMap::new(),
            enemy_grid: SpatialGrid::new(grid_cell_size),
            next_enemy_shot: 0,
        }
    }

    pub fn spawn_enemy(&mut self, enemy: Enemy) {
        info!(
            "Spawned enemy {} at ({:.1}, {:.1})",
            enemy.id, enemy.position.x, enemy.position.z
        );
        self.enemy_grid.insert(&enemy.id, &enemy.position);
        self.enemies.insert(enemy.id.clone(), enemy);
    }

    pub fn move_enemy(&mut self, id: &str, position: Vec3) {
        if let Some(enemy) = self.enemies.get_mut(id) {
            enemy.position = position;
            self.enemy_grid.update(id, &position);
        }
    }

    /// Applies verified damage. Returns `(applied, remaining_hp)`; dead
    /// enemies leave both the roster and the grid.
    pub fn damage_enemy(&mut self, id: &str, amount: i32) -> Option<(i32, i32)> {
        let enemy = self.enemies.get_mut(id)?;
        enemy.current_hp = (enemy.current_hp - amount).max(0);
        let remaining = enemy.current_hp;
        if remaining == 0 {
            info!("Enemy {} killed", id);
            self.enemies.remove(id);
            self.enemy_grid.remove(id);
        }
        Some((amount, remaining))
    }

    /// Advances enemy attack cooldowns and fires at players in aggro range.
    /// Returns the projectiles produced this tick; the caller registers and
    /// broadcasts them.
    pub fn step_enemies<R: Rng>(
        &mut self,
        players: &[(u32, Vec3)],
        dt: f32,
        now_ms: u64,
        rng: &mut R,
    ) -> Vec<Projectile> {
        let mut fired = Vec::new();

        for enemy in self.enemies.values_mut() {
            enemy.cooldown_s = (enemy.cooldown_s - dt).max(0.0);
            if enemy.cooldown_s > 0.0 {
                continue;
            }

            let aggro_sq = enemy.attack.aggro_radius * enemy.attack.aggro_radius;
            let target = players
                .iter()
                .filter(|(_, pos)| enemy.position.planar_distance_sq(pos) <= aggro_sq)
                .min_by(|(_, a), (_, b)| {
                    enemy
                        .position
                        .planar_distance_sq(a)
                        .total_cmp(&enemy.position.planar_distance_sq(b))
                });

            if let Some((_, target_pos)) = target {
                let direction = target_pos.sub(&enemy.position).planar_normalize();
                if direction.planar_length_sq() == 0.0 {
                    continue;
                }

                self.next_enemy_shot = self.next_enemy_shot.wrapping_add(1);
                let id = format!("{}-shot-{}", enemy.id, self.next_enemy_shot);
                fired.push(Projectile::from_enemy_attack(
                    id,
                    self.next_enemy_shot,
                    enemy.id.clone(),
                    &enemy.attack,
                    enemy.position,
                    direction,
                    now_ms,
                ));
                // Small jitter keeps groups of enemies from firing in
                // lockstep.
                enemy.cooldown_s = enemy.attack.cooldown_s * rng.gen_range(0.9..1.1);
            }
        }

        fired
    }

    pub fn snapshots(&self) -> Vec<EnemySnapshot> {
        self.enemies
            .values()
            .map(|e| EnemySnapshot {
                id: e.id.clone(),
                position: e.position,
                hitbox_radius: e.hitbox_radius,
                current_hp: e.current_hp,
                max_hp: e.max_hp,
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn test_enemy(id: &str, position: Vec3) -> Enemy {
    use shared::{MotionPattern, PatternParams};

    Enemy {
        id: id.to_string(),
        position,
        hitbox_radius: 2.0,
        current_hp: 30,
        max_hp: 30,
        defense: 2,
        attack: EnemyAttackSpec {
            damage_min: 3,
            damage_max: 6,
            speed: 40.0,
            lifetime_s: 1.0,
            pattern: MotionPattern::Straight,
            params: PatternParams::default(),
            projectile_radius: 1.0,
            cooldown_s: 2.0,
            aggro_radius: 60.0,
        },
        cooldown_s: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_damage_kills_and_removes_from_grid() {
        let mut game = ServerGame::new(20.0);
        game.spawn_enemy(test_enemy("enemy-1", Vec3::new(10.0, 0.0, 10.0)));

        let (applied, remaining) = game.damage_enemy("enemy-1", 12).unwrap();
        assert_eq!((applied, remaining), (12, 18));
        assert!(game.enemy_grid.contains("enemy-1"));

        let (_, remaining) = game.damage_enemy("enemy-1", 50).unwrap();
        assert_eq!(remaining, 0);
        assert!(game.enemies.is_empty());
        assert!(!game.enemy_grid.contains("enemy-1"));
    }

    #[test]
    fn test_damage_unknown_enemy_is_none() {
        let mut game = ServerGame::new(20.0);
        assert!(game.damage_enemy("ghost", 5).is_none());
    }

    #[test]
    fn test_enemy_fires_at_player_in_aggro_range() {
        let mut game = ServerGame::new(20.0);
        game.spawn_enemy(test_enemy("enemy-1", Vec3::default()));
        let mut rng = StdRng::seed_from_u64(1);

        let players = vec![(1u32, Vec3::new(30.0, 0.0, 0.0))];
        let fired = game.step_enemies(&players, 0.05, 1_000, &mut rng);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].owner_id, "enemy-1");
        assert!((fired[0].direction.x - 1.0).abs() < 1e-5);

        // Cooldown holds on the next tick
        let fired = game.step_enemies(&players, 0.05, 1_050, &mut rng);
        assert!(fired.is_empty());
    }

    #[test]
    fn test_enemy_holds_fire_outside_aggro() {
        let mut game = ServerGame::new(20.0);
        game.spawn_enemy(test_enemy("enemy-1", Vec3::default()));
        let mut rng = StdRng::seed_from_u64(1);

        let players = vec![(1u32, Vec3::new(500.0, 0.0, 0.0))];
        assert!(game.step_enemies(&players, 0.05, 1_000, &mut rng).is_empty());
    }

    #[test]
    fn test_move_enemy_updates_grid() {
        let mut game = ServerGame::new(20.0);
        game.spawn_enemy(test_enemy("enemy-1", Vec3::default()));
        game.move_enemy("enemy-1", Vec3::new(100.0, 0.0, 100.0));

        let near = game.enemy_grid.query_radius(&Vec3::new(100.0, 0.0, 100.0), 5.0);
        assert_eq!(near, vec!["enemy-1".to_string()]);
    }
}
