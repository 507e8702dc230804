//! Client connection lifecycle and per-player combat state.
//!
//! Tracks network identity (address, liveness, measured ping) alongside the
//! combat-facing state verification needs per player: last reported
//! position, hit points, and the equipped weapon whose parameters drive
//! range checks and the DPS ceiling.

use log::info;
use shared::{Vec3, WeaponSpec};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected player.
#[derive(Debug)]
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    /// Last time we received any packet from this client.
    pub last_seen: Instant,
    /// Round-trip time measured by nonce ping/pong, milliseconds.
    pub ping_ms: u64,
    /// Outstanding ping nonce and its send time.
    pending_ping: Option<(u32, Instant)>,
    /// Last client-reported ground position. Used for culling and range
    /// checks after the verifier's cross-checks, never trusted alone.
    pub position: Vec3,
    pub current_hp: i32,
    pub max_hp: i32,
    pub weapon: WeaponSpec,
    pub attack_stat: f32,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, weapon: WeaponSpec) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            ping_ms: 0,
            pending_ping: None,
            position: Vec3::default(),
            current_hp: 100,
            max_hp: 100,
            weapon,
            attack_stat: 0.0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Records an outgoing ping. A new nonce replaces any unanswered one.
    pub fn ping_sent(&mut self, nonce: u32) {
        self.pending_ping = Some((nonce, Instant::now()));
    }

    /// Matches a pong against the outstanding nonce and updates the
    /// measured round-trip time. Mismatched nonces are ignored.
    pub fn pong_received(&mut self, nonce: u32) {
        if let Some((expected, sent_at)) = self.pending_ping {
            if expected == nonce {
                self.ping_ms = sent_at.elapsed().as_millis().min(u64::MAX as u128) as u64;
                self.pending_ping = None;
            }
        }
    }

    pub fn apply_damage(&mut self, amount: i32) -> i32 {
        self.current_hp = (self.current_hp - amount).max(0);
        self.current_hp
    }
}

/// Roster of connected clients with capacity enforcement and timeout
/// cleanup, indexed by server-assigned id.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Returns the new client id, or `None` at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, weapon: WeaponSpec) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr, weapon));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Client> {
        self.clients.get_mut(&client_id)
    }

    /// `(id, position)` pairs for culling and enemy targeting.
    pub fn player_positions(&self) -> Vec<(u32, Vec3)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.position))
            .collect()
    }

    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    /// Removes and returns clients past the timeout threshold.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
