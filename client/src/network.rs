use crate::game::ClientWorld;
use crate::prediction::{LocalSimulation, TargetState};
use crate::reporting::HitReporter;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{now_ms, CombatConfig, Packet, Vec3, WeaponSpec, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const PLAYER_HITBOX_RADIUS: f32 = 1.5;
const PLAYER_MAX_HP: i32 = 100;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,

    world: ClientWorld,
    simulation: Option<LocalSimulation>,
    reporter: HitReporter,
    weapon: WeaponSpec,
    config: CombatConfig,

    fake_ping_ms: u64,
    /// Shots per second for the demo autofire loop; 0 disables it.
    fire_rate: f32,
    fire_angle: f32,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        fire_rate: f32,
        weapon: WeaponSpec,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        let config = CombatConfig::default();

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            world: ClientWorld::new(PLAYER_MAX_HP),
            simulation: None,
            reporter: HitReporter::new(&config),
            weapon,
            config,
            fake_ping_ms,
            fire_rate,
            fire_angle: 0.0,
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server at {}...", self.server_addr);
        self.send_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
        .await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                self.simulation = Some(LocalSimulation::new(
                    format!("player-{}", client_id),
                    PLAYER_HITBOX_RADIUS,
                    self.config.clone(),
                ));
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.simulation = None;
            }

            Packet::SpawnBatch { spawns } => {
                if let Some(sim) = self.simulation.as_mut() {
                    for spawn in spawns {
                        sim.adopt_remote_spawn(spawn);
                    }
                }
            }

            Packet::EnemyFire { spawn } => {
                if let Some(sim) = self.simulation.as_mut() {
                    sim.adopt_enemy_spawn(spawn);
                }
            }

            Packet::EnemyState {
                timestamp_ms,
                enemies,
            } => {
                self.world.apply_enemy_state(timestamp_ms, enemies);
            }

            Packet::Damage {
                target_id,
                amount,
                remaining_hp,
            } => {
                debug!("{} took {} damage ({} hp left)", target_id, amount, remaining_hp);
                if let Some(sim) = self.simulation.as_mut() {
                    if remaining_hp <= 0 {
                        sim.remove_target(&target_id);
                    }
                }
            }

            Packet::PlayerDamage {
                amount,
                remaining_hp,
            } => {
                info!("Took {} damage, {} hp left", amount, remaining_hp);
                self.world.apply_player_damage(remaining_hp);
            }

            Packet::Ping { nonce } => {
                self.send_packet(&Packet::Pong { nonce }).await?;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
        Ok(())
    }

    /// One simulation frame: refresh targets from the interpolated enemy
    /// view, advance projectiles, and report whatever landed.
    async fn frame(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(sim) = self.simulation.as_mut() else {
            return Ok(());
        };
        let now = now_ms();

        for enemy in self.world.enemies_at(now) {
            sim.upsert_target(
                &enemy.id,
                TargetState {
                    position: enemy.position,
                    hitbox_radius: enemy.hitbox_radius,
                    current_hp: enemy.current_hp,
                    max_hp: enemy.max_hp,
                },
            );
        }

        let output = sim.step(now);

        let mut entries = Vec::new();
        for hit in output.hits {
            if let Some(entry) = self.reporter.record(&hit.target_id, hit.position, hit.timestamp_ms) {
                entries.push(entry);
            }
        }
        entries.extend(self.reporter.flush(now));
        if !entries.is_empty() {
            self.send_packet(&Packet::HitReport { entries }).await?;
        }

        for hit in output.hits_on_me {
            self.send_packet(&Packet::ProjectileHitMe {
                projectile_id: hit.projectile_id,
                impact: hit.impact,
                timestamp_ms: hit.timestamp_ms,
            })
            .await?;
        }

        self.send_packet(&Packet::PlayerState {
            position: self.world.player_position,
        })
        .await?;

        Ok(())
    }

    /// Demo autofire: sweeps the aim around the compass so every pattern
    /// shape gets exercised.
    async fn fire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(sim) = self.simulation.as_mut() else {
            return Ok(());
        };

        self.fire_angle += 0.35;
        let direction = Vec3::from_planar_angle(self.fire_angle);
        let spawns = sim.fire(&self.weapon, direction, now_ms());

        for spawn in spawns {
            self.send_packet(&Packet::Fire { spawn }).await?;
        }
        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(Duration::from_millis(16));
        let fire_period = if self.fire_rate > 0.0 {
            Duration::from_secs_f32(1.0 / self.fire_rate)
        } else {
            // Effectively never.
            Duration::from_secs(3600)
        };
        let mut fire_interval = interval(fire_period);

        let mut buffer = [0u8; 4096];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                if let Err(e) = self.handle_packet(packet).await {
                                    error!("Error handling packet: {}", e);
                                }
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    if let Err(e) = self.frame().await {
                        error!("Error in simulation frame: {}", e);
                    }
                },

                _ = fire_interval.tick() => {
                    if self.fire_rate > 0.0 {
                        if let Err(e) = self.fire().await {
                            error!("Error firing: {}", e);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
