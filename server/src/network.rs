//! Server network layer: UDP socket handling, the authoritative tick loop,
//! and routing of untrusted client packets into verification.

use crate::client_manager::ClientManager;
use crate::culling::{interest_filter, SpawnBatcher};
use crate::game::ServerGame;
use crate::registry::ProjectileRegistry;
use crate::verify::{DpsTracker, EnemyHitVerdict, HitVerifier, RateLimiter};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    now_ms, CombatConfig, MotionPattern, Packet, PatternParams, Vec3, WeaponSpec, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);
const PING_INTERVAL: Duration = Duration::from_secs(2);

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the game loop to the network sender task.
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Starter weapon handed to every connecting player. Weapon/equipment data
/// is owned by the item system; the combat core just consumes a spec.
pub fn default_weapon() -> WeaponSpec {
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

/// Main server coordinating networking and the authoritative simulation.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: ServerGame,
    registry: ProjectileRegistry,
    verifier: HitVerifier,
    rate_limiter: RateLimiter,
    dps_tracker: DpsTracker,
    batcher: SpawnBatcher,
    config: CombatConfig,
    rng: StdRng,
    tick_duration: Duration,
    tick_count: u64,
    next_ping_nonce: u32,
    last_ping: Instant,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: CombatConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game: ServerGame::new(config.grid_cell_size),
            registry: ProjectileRegistry::new(&config),
            verifier: HitVerifier::new(config.clone()),
            rate_limiter: RateLimiter::new(&config),
            dps_tracker: DpsTracker::new(&config),
            batcher: SpawnBatcher::new(&config, now_ms()),
            config,
            rng: StdRng::from_entropy(),
            tick_duration,
            tick_count: 0,
            next_ping_nonce: 0,
            last_ping: Instant::now(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// World setup hook used by `main` before the loop starts.
    pub fn game_mut(&mut self) -> &mut ServerGame {
        &mut self.game
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that continuously listens for incoming packets.
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing packet queue.
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(GameMessage::SendPacket { packet, addr }) = game_rx.recv().await {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns the task that monitors client timeouts.
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut check_interval = interval(Duration::from_secs(1));

            loop {
                check_interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Sends a packet to a set of client ids, resolving addresses through
    /// the roster.
    async fn send_to_clients(&self, packet: &Packet, recipients: &[u32]) {
        let clients = self.clients.read().await;
        for &client_id in recipients {
            if let Some(addr) = clients.addr_of(client_id) {
                self.send_packet(packet, addr);
            }
        }
    }

    /// Processes one incoming packet. Everything here is untrusted input:
    /// malformed or implausible claims are logged and dropped, never
    /// escalated into faults.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        match packet {
            Packet::Connect { client_version } => {
                info!("Client connecting from {} (version {})", addr, client_version);

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(&response, addr);
                    return;
                }

                if let Some(existing_id) = client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&existing_id);
                    drop(clients);
                    self.forget_client(existing_id);
                }

                let new_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, default_weapon())
                };

                let response = match new_id {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.send_packet(&response, addr);
            }

            Packet::Disconnect => {
                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    drop(clients);
                    self.forget_client(client_id);
                }
            }

            Packet::PlayerState { position } => {
                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    if let Some(client) = clients.get_mut(client_id) {
                        client.position = position;
                        client.touch();
                    }
                }
            }

            Packet::Pong { nonce } => {
                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    if let Some(client) = clients.get_mut(client_id) {
                        client.pong_received(nonce);
                        client.touch();
                    }
                }
            }

            Packet::Fire { spawn } => {
                if let Some(client_id) = client_id {
                    self.handle_fire(client_id, spawn).await;
                }
            }

            Packet::HitReport { entries } => {
                if let Some(client_id) = client_id {
                    self.handle_hit_report(client_id, entries).await;
                }
            }

            Packet::ProjectileHitMe {
                projectile_id,
                impact,
                ..
            } => {
                if let Some(client_id) = client_id {
                    self.handle_projectile_hit_me(client_id, projectile_id, impact)
                        .await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// One fire intent per shot. The server builds its own authoritative
    /// twin from the same parameters and queues a cosmetic spawn for nearby
    /// other players.
    async fn handle_fire(&mut self, client_id: u32, mut spawn: shared::ProjectileSpawn) {
        {
            let mut clients = self.clients.write().await;
            let Some(client) = clients.get_mut(client_id) else {
                return;
            };
            client.touch();
            // The sender owns the shot no matter what the packet claims.
            spawn.owner_id = format!("player-{}", client_id);
            spawn.owner_kind = shared::OwnerKind::Player;
        }

        // Ids live in one registry shared with enemy shots, so a client
        // that picks its own ids could squat on an enemy's next shot id
        // and displace the real twin. Only sender-namespaced ids register.
        let prefix = format!("player-{}-", client_id);
        if !spawn.id.starts_with(&prefix) {
            warn!(
                "Rejected fire from client {}: projectile id {:?} outside its namespace",
                client_id, spawn.id
            );
            return;
        }

        let projectile = spawn.clone().into_projectile();
        let origin = projectile.origin;
        self.registry.spawn(projectile);

        let recipients = {
            let clients = self.clients.read().await;
            interest_filter(
                &origin,
                &clients.player_positions(),
                self.config.interest_radius,
                Some(client_id),
            )
        };
        self.batcher.queue(&recipients, &spawn);
    }

    async fn handle_hit_report(&mut self, client_id: u32, entries: Vec<shared::HitEntry>) {
        let now = now_ms();

        let (attacker_pos, weapon, attack_stat) = {
            let mut clients = self.clients.write().await;
            let Some(client) = clients.get_mut(client_id) else {
                return;
            };
            client.touch();
            (client.position, client.weapon.clone(), client.attack_stat)
        };

        // Soft per-window cap across all targets in the report.
        let mut capped = Vec::with_capacity(entries.len());
        for mut entry in entries {
            let allowed = self.rate_limiter.allow(client_id, entry.hit_count, now);
            if allowed == 0 {
                continue;
            }
            entry.hit_count = allowed;
            capped.push(entry);
        }
        if capped.is_empty() {
            return;
        }

        let events = self.verifier.apply_player_hits(
            &capped,
            attacker_pos,
            &weapon,
            &mut self.game,
            &mut self.rng,
        );

        let expected_max_dps = weapon.max_dps(attack_stat);
        for event in &events {
            self.dps_tracker
                .record(client_id, event.amount, expected_max_dps, now);

            let packet = Packet::Damage {
                target_id: event.target_id.clone(),
                amount: event.amount,
                remaining_hp: event.remaining_hp,
            };
            let recipients = {
                let clients = self.clients.read().await;
                interest_filter(
                    &event.position,
                    &clients.player_positions(),
                    self.config.interest_radius,
                    None,
                )
            };
            self.send_to_clients(&packet, &recipients).await;
        }
    }

    async fn handle_projectile_hit_me(
        &mut self,
        client_id: u32,
        projectile_id: String,
        impact: Vec3,
    ) {
        let (player_pos, ping_ms, addr) = {
            let mut clients = self.clients.write().await;
            let Some(client) = clients.get_mut(client_id) else {
                return;
            };
            client.touch();
            (client.position, client.ping_ms, client.addr)
        };

        let verdict = self.verifier.verify_enemy_hit(
            &mut self.registry,
            &projectile_id,
            impact,
            player_pos,
            ping_ms,
            now_ms(),
            &mut self.rng,
        );

        if let EnemyHitVerdict::Accepted { damage } = verdict {
            let remaining_hp = {
                let mut clients = self.clients.write().await;
                match clients.get_mut(client_id) {
                    Some(client) => client.apply_damage(damage),
                    None => return,
                }
            };
            let packet = Packet::PlayerDamage {
                amount: damage,
                remaining_hp,
            };
            self.send_packet(&packet, addr);
        }
        // Rejected and Unknown verdicts are already logged by the verifier
        // and deliberately produce no client-visible response.
    }

    fn forget_client(&mut self, client_id: u32) {
        self.rate_limiter.forget(client_id);
        self.dps_tracker.forget(client_id);
        self.batcher.forget(client_id);
    }

    /// One authoritative tick: advance projectile lifetimes, let enemies
    /// fire, flush spawn batches, broadcast enemy state, measure ping.
    async fn tick(&mut self, dt: f32) {
        let now = now_ms();
        self.tick_count += 1;

        self.registry.tick(now);

        let players = {
            let clients = self.clients.read().await;
            clients.player_positions()
        };

        // Enemy shots bypass the batcher for attack responsiveness.
        let fired = self.game.step_enemies(&players, dt, now, &mut self.rng);
        for projectile in fired {
            let spawn = shared::ProjectileSpawn::from(&projectile);
            let recipients =
                interest_filter(&projectile.origin, &players, self.config.interest_radius, None);
            self.registry.spawn(projectile);
            self.send_to_clients(&Packet::EnemyFire { spawn }, &recipients)
                .await;
        }

        // Player shot spawns go out as one batch per recipient.
        for (recipient, spawns) in self.batcher.flush(now) {
            let addr = {
                let clients = self.clients.read().await;
                clients.addr_of(recipient)
            };
            if let Some(addr) = addr {
                self.send_packet(&Packet::SpawnBatch { spawns }, addr);
            }
        }

        // Enemy state for local targeting, culled per recipient.
        if !self.game.enemies.is_empty() {
            let snapshots = self.game.snapshots();
            for (client_id, position) in &players {
                let visible: Vec<_> = snapshots
                    .iter()
                    .filter(|s| {
                        s.position.planar_distance_sq(position)
                            <= self.config.interest_radius * self.config.interest_radius
                    })
                    .cloned()
                    .collect();
                if !visible.is_empty() {
                    let packet = Packet::EnemyState {
                        timestamp_ms: now,
                        enemies: visible,
                    };
                    self.send_to_clients(&packet, &[*client_id]).await;
                }
            }
        }

        if self.last_ping.elapsed() >= PING_INTERVAL {
            self.last_ping = Instant::now();
            self.next_ping_nonce = self.next_ping_nonce.wrapping_add(1);
            let nonce = self.next_ping_nonce;

            let mut clients = self.clients.write().await;
            let addrs = clients.get_client_addrs();
            for (client_id, addr) in addrs {
                if let Some(client) = clients.get_mut(client_id) {
                    client.ping_sent(nonce);
                }
                self.send_packet(&Packet::Ping { nonce }, addr);
            }
        }

        if self.tick_count % 100 == 0 {
            let client_count = {
                let clients = self.clients.read().await;
                clients.len()
            };
            if client_count > 0 {
                debug!(
                    "Tick {}: {} clients, {} projectiles in flight, {} enemies",
                    self.tick_count,
                    client_count,
                    self.registry.len(),
                    self.game.enemies.len()
                );
            }
        }
    }

    /// Main server loop coordinating all operations.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.forget_client(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.tick(dt).await;
                },
            }
        }

        Ok(())
    }
}
