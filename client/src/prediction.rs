//! Client-side projectile simulation and immediate hit detection.
//!
//! Firing never waits for the server: the shooter's projectile exists
//! locally the same frame the trigger is pulled, and collisions against
//! locally-known targets are detected here. The server remains the damage
//! authority; this module only produces hit claims for it to verify.

use log::debug;
use shared::{position_at, CombatConfig, Projectile, ProjectileSpawn, SpatialGrid, Vec3, WeaponSpec};
use std::collections::HashMap;

/// Locally-known target state, mirrored from server enemy snapshots.
#[derive(Debug, Clone)]
pub struct TargetState {
    pub position: Vec3,
    pub hitbox_radius: f32,
    pub current_hp: i32,
    pub max_hp: i32,
}

/// One locally-detected hit of an own projectile against a target.
#[derive(Debug, Clone)]
pub struct LocalHit {
    pub target_id: String,
    pub position: Vec3,
    pub timestamp_ms: u64,
}

/// One locally-detected enemy projectile strike on the local player.
#[derive(Debug, Clone)]
pub struct SelfHit {
    pub projectile_id: String,
    pub impact: Vec3,
    pub timestamp_ms: u64,
}

/// Everything one frame of simulation produced.
#[derive(Debug, Default)]
pub struct StepOutput {
    pub hits: Vec<LocalHit>,
    pub hits_on_me: Vec<SelfHit>,
}

/// Snapshot of one projectile for an external renderer.
#[derive(Debug, Clone)]
pub struct ProjectileView {
    pub id: String,
    pub position: Vec3,
    pub facing: Vec3,
    pub radius: f32,
}

pub struct LocalSimulation {
    config: CombatConfig,
    owner_id: String,
    /// Own shots: simulated and hit-checked.
    own: HashMap<String, Projectile>,
    /// Enemy shots: simulated and checked against the local player only.
    hostile: HashMap<String, Projectile>,
    /// Other players' shots: cosmetic, simulated for rendering only.
    remote: HashMap<String, Projectile>,
    targets: HashMap<String, TargetState>,
    target_grid: SpatialGrid,
    player_position: Vec3,
    player_hitbox: f32,
    next_shot_seq: u32,
}

impl LocalSimulation {
    pub fn new(owner_id: String, player_hitbox: f32, config: CombatConfig) -> Self {
        let cell = config.grid_cell_size;
        Self {
            config,
            owner_id,
            own: HashMap::new(),
            hostile: HashMap::new(),
            remote: HashMap::new(),
            targets: HashMap::new(),
            target_grid: SpatialGrid::new(cell),
            player_position: Vec3::default(),
            player_hitbox,
            next_shot_seq: 0,
        }
    }

    pub fn set_player_position(&mut self, position: Vec3) {
        self.player_position = position;
    }

    pub fn player_position(&self) -> Vec3 {
        self.player_position
    }

    pub fn upsert_target(&mut self, id: &str, target: TargetState) {
        self.target_grid.update(id, &target.position);
        self.targets.insert(id.to_string(), target);
    }

    pub fn remove_target(&mut self, id: &str) {
        self.targets.remove(id);
        self.target_grid.remove(id);
    }

    pub fn target(&self, id: &str) -> Option<&TargetState> {
        self.targets.get(id)
    }

    /// Creates the weapon's projectiles immediately and returns the spawn
    /// messages to send, one fire intent per projectile. Consecutive shot
    /// sequence numbers give multi-projectile volleys alternating wave
    /// parity, which is what fans twin shots apart.
    pub fn fire(&mut self, weapon: &WeaponSpec, direction: Vec3, now_ms: u64) -> Vec<ProjectileSpawn> {
        let mut spawns = Vec::with_capacity(weapon.projectiles_per_shot as usize);

        for _ in 0..weapon.projectiles_per_shot.max(1) {
            self.next_shot_seq = self.next_shot_seq.wrapping_add(1);
            let seq = self.next_shot_seq;
            let id = format!("{}-p{}", self.owner_id, seq);

            let projectile = Projectile::from_weapon(
                id,
                seq,
                self.owner_id.clone(),
                weapon,
                self.player_position,
                direction,
                now_ms,
            );
            spawns.push(ProjectileSpawn::from(&projectile));
            self.own.insert(projectile.id.clone(), projectile);
        }

        spawns
    }

    /// Adopts a spawn broadcast from the server. The echo of an own shot is
    /// dropped: the local copy already exists and is the one being
    /// simulated.
    pub fn adopt_remote_spawn(&mut self, spawn: ProjectileSpawn) {
        if self.own.contains_key(&spawn.id) {
            debug!("Ignoring echoed spawn of own projectile {}", spawn.id);
            return;
        }
        let projectile = spawn.into_projectile();
        self.remote.insert(projectile.id.clone(), projectile);
    }

    /// Adopts an enemy-fired projectile; these collide with the local
    /// player.
    pub fn adopt_enemy_spawn(&mut self, spawn: ProjectileSpawn) {
        let projectile = spawn.into_projectile();
        self.hostile.insert(projectile.id.clone(), projectile);
    }

    /// Advances every projectile to `now_ms` and collects hits. Positions
    /// are recomputed from elapsed time each frame; nothing accumulates.
    pub fn step(&mut self, now_ms: u64) -> StepOutput {
        let mut output = StepOutput::default();

        self.own.retain(|_, p| !p.is_expired(now_ms));
        self.hostile.retain(|_, p| !p.is_expired(now_ms));
        self.remote.retain(|_, p| !p.is_expired(now_ms));

        // Own projectiles vs known targets, grid first then exact check.
        let lookup = self.config.hit_lookup_radius;
        let mut spent = Vec::new();
        for projectile in self.own.values_mut() {
            let pos = position_at(projectile, projectile.elapsed_ms(now_ms));

            for candidate in self.target_grid.query_radius(&pos, lookup) {
                if projectile.hit_set.contains(&candidate) {
                    continue;
                }
                let Some(target) = self.targets.get(&candidate) else {
                    continue;
                };

                let reach = target.hitbox_radius + projectile.radius;
                if pos.planar_distance_sq(&target.position) <= reach * reach
                    && projectile.register_hit(&candidate)
                {
                    output.hits.push(LocalHit {
                        target_id: candidate,
                        position: pos,
                        timestamp_ms: now_ms,
                    });
                    if projectile.pierce_exhausted() {
                        spent.push(projectile.id.clone());
                        break;
                    }
                }
            }
        }
        for id in spent {
            self.own.remove(&id);
        }

        // Enemy projectiles vs the local player's single hitbox.
        let mut landed = Vec::new();
        for projectile in self.hostile.values() {
            let pos = position_at(projectile, projectile.elapsed_ms(now_ms));
            let reach = self.player_hitbox + projectile.radius;
            if pos.planar_distance_sq(&self.player_position) <= reach * reach {
                landed.push(projectile.id.clone());
                output.hits_on_me.push(SelfHit {
                    projectile_id: projectile.id.clone(),
                    impact: pos,
                    timestamp_ms: now_ms,
                });
            }
        }
        for id in landed {
            self.hostile.remove(&id);
        }

        output
    }

    /// Positions and facings of every live projectile for rendering.
    pub fn views(&self, now_ms: u64) -> Vec<ProjectileView> {
        self.own
            .values()
            .chain(self.hostile.values())
            .chain(self.remote.values())
            .map(|p| {
                let elapsed = p.elapsed_ms(now_ms);
                ProjectileView {
                    id: p.id.clone(),
                    position: position_at(p, elapsed),
                    facing: shared::facing_at(p, elapsed),
                    radius: p.radius,
                }
            })
            .collect()
    }

    pub fn live_projectiles(&self) -> usize {
        self.own.len() + self.hostile.len() + self.remote.len()
    }
}
