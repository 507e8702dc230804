//! # Combat Client Library
//!
//! Client side of the projectile combat loop. The design is
//! client-authoritative for responsiveness: shots spawn locally the frame
//! they are fired, fly on deterministic trajectories, and collide against
//! locally-known targets. The server hears about hits afterwards and
//! remains the only authority over damage.
//!
//! ## Module Organization
//!
//! ### Prediction Module (`prediction`)
//! Local projectile simulation and hit detection:
//! - Immediate spawn on fire, no server round trip
//! - Stateless position sampling from elapsed time
//! - Grid-filtered collision checks against mirrored enemies
//! - Enemy projectiles checked against the local player
//!
//! ### Reporting Module (`reporting`)
//! Hit claim batching:
//! - Small per-target immediate budget for snappy feedback
//! - Overflow aggregation with interval flushing
//!
//! ### Game Module (`game`)
//! Client world view:
//! - Local player position and health
//! - Enemy mirror interpolated between server snapshots
//!
//! ### Network Module (`network`)
//! UDP client runtime:
//! - Connection handshake and packet dispatch
//! - Frame loop driving simulation and reporting
//! - Optional simulated latency for testing

pub mod game;
pub mod network;
pub mod prediction;
pub mod reporting;
