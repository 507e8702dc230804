//! # Combat Server Library
//!
//! Authoritative side of the projectile combat core. The server never
//! simulates the client's aiming or collision frames; instead it keeps its
//! own twin of every in-flight projectile, recomputes expected positions
//! from the shared trajectory engine, and treats every client report as an
//! adversarial claim to be verified.
//!
//! ## Module Organization
//!
//! - [`client_manager`] — connection roster, timeouts, measured ping, and
//!   the per-player combat state verification reads.
//! - [`game`] — enemy roster, the server's spatial index, and the enemy
//!   projectile producer.
//! - [`registry`] — authoritative in-flight projectile table with expiry
//!   and idempotent consumption.
//! - [`verify`] — hit verification, damage rolls, rate limiting, and DPS
//!   anomaly flagging.
//! - [`culling`] — interest-radius broadcast filtering and spawn batching.
//! - [`network`] — UDP socket plumbing and the tick loop tying the rest
//!   together.
//!
//! ## Trust Model
//!
//! Clients detect their own hits for responsiveness, but damage only ever
//! originates here. Player-to-enemy claims pass range and rate checks;
//! enemy-to-player claims must match the recomputed trajectory within a
//! latency-scaled leeway. Rejections are logged for audit and produce no
//! client-visible error, so a false positive costs a hit, not a player.

pub mod client_manager;
pub mod culling;
pub mod game;
pub mod network;
pub mod registry;
pub mod verify;
