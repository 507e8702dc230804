//! Closed-form projectile motion shared by client prediction and server
//! verification.
//!
//! Position is a pure function of `(spawn parameters, elapsed time)` and is
//! never advanced by accumulation. Both sides call the exact same code, so
//! the server can recompute "where should this projectile be right now"
//! without replaying any history, and a divergence between the sides can
//! only come from clock disagreement, never from the formulas.

use crate::math::Vec3;
use crate::projectile::{MotionPattern, Projectile};

/// Sampling step for finite-difference facing, one frame at 60Hz. Both
/// sides must use this constant; a second epsilon is a false-reject bug.
pub const FACING_EPSILON_MS: u64 = 16;

const TWO_PI: f32 = std::f32::consts::TAU;

/// Wave phase selected by the shot counter's low bit: 0 for even shots,
/// pi for odd. Adjacent shots therefore mirror each other laterally.
fn phase_for(shot_seq: u32) -> f32 {
    if shot_seq & 1 == 0 {
        0.0
    } else {
        std::f32::consts::PI
    }
}

/// Lateral sign flip from the same parity bit, for patterns that mirror by
/// negation instead of phase shift.
fn parity_sign(shot_seq: u32) -> f32 {
    if shot_seq & 1 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Position at `elapsed_ms` after spawn. Elapsed time is clamped to the
/// projectile lifetime so that a slightly-late verification sample lands on
/// the final point of the path instead of extrapolating past it.
pub fn position_at(projectile: &Projectile, elapsed_ms: u64) -> Vec3 {
    let t = (elapsed_ms as f32 / 1000.0).min(projectile.lifetime_s);
    let origin = projectile.origin;
    let dir = projectile.direction;
    let speed = projectile.speed;
    let params = &projectile.params;

    match projectile.pattern {
        MotionPattern::Straight => origin.add(&dir.scale(speed * t)),

        MotionPattern::Wavy => {
            // The heading itself oscillates; travel distance stays speed*t
            // along the deviated heading.
            let base_angle = dir.planar_angle();
            let angle =
                base_angle + params.magnitude * (phase_for(projectile.shot_seq) + params.period * t).sin();
            origin.add(&Vec3::from_planar_angle(angle).scale(speed * t))
        }

        MotionPattern::AmplitudeWave => {
            let base = origin.add(&dir.scale(speed * t));
            let cycle = (t / projectile.lifetime_s) * params.frequency * TWO_PI;
            let offset = params.amplitude * (phase_for(projectile.shot_seq) + cycle).sin();
            base.add(&dir.perp_planar().scale(offset))
        }

        MotionPattern::Parametric => {
            let base = origin.add(&dir.scale(speed * t));
            let u = (t / projectile.lifetime_s) * TWO_PI;
            // Two-term Lissajous lateral curve, bounded by `magnitude`.
            let wave = 0.6 * u.sin() + 0.4 * (2.0 * u).sin();
            let offset = parity_sign(projectile.shot_seq) * params.magnitude * wave;
            base.add(&dir.perp_planar().scale(offset))
        }

        MotionPattern::Boomerang => {
            // Outbound to the lifetime midpoint, then the scalar distance
            // mirrors back toward the origin. Direction never changes.
            let half = projectile.lifetime_s / 2.0;
            let distance = if t <= half {
                speed * t
            } else {
                speed * (projectile.lifetime_s - t)
            };
            origin.add(&dir.scale(distance))
        }
    }
}

/// Render/verification heading at `elapsed_ms`. Patterns whose primary
/// heading never changes return the cached spawn direction; the others
/// sample the path at `t` and `t + FACING_EPSILON_MS`.
pub fn facing_at(projectile: &Projectile, elapsed_ms: u64) -> Vec3 {
    match projectile.pattern {
        MotionPattern::Straight | MotionPattern::AmplitudeWave | MotionPattern::Boomerang => {
            projectile.direction
        }
        MotionPattern::Wavy | MotionPattern::Parametric => {
            let here = position_at(projectile, elapsed_ms);
            let ahead = position_at(projectile, elapsed_ms + FACING_EPSILON_MS);
            let delta = ahead.sub(&here);
            if delta.planar_length_sq() < 1e-12 {
                projectile.direction
            } else {
                delta.planar_normalize()
            }
        }
    }
}

/// Lateral distance from the straight-line ray at `elapsed_ms`. Exposed for
/// bounded-deviation checks and twin-shot mirroring.
pub fn lateral_offset(projectile: &Projectile, elapsed_ms: u64) -> f32 {
    let pos = position_at(projectile, elapsed_ms);
    let rel = pos.sub(&projectile.origin);
    let perp = projectile.direction.perp_planar();
    rel.x * perp.x + rel.z * perp.z
}
