use serde::{Deserialize, Serialize};

/// A point or direction in world space. The ground plane is XZ; `y` is
/// height and is carried through combat math unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    /// Squared length on the ground plane. Height is ignored so that a
    /// projectile flying at chest height still ranges against ground
    /// positions.
    pub fn planar_length_sq(&self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    pub fn planar_length(&self) -> f32 {
        self.planar_length_sq().sqrt()
    }

    /// Normalizes on the ground plane, preserving `y` at zero. Returns the
    /// zero vector for degenerate input rather than NaN.
    pub fn planar_normalize(&self) -> Vec3 {
        let len = self.planar_length();
        if len == 0.0 {
            Vec3::default()
        } else {
            Vec3::new(self.x / len, 0.0, self.z / len)
        }
    }

    /// The ground-plane perpendicular (90 degrees counter-clockwise viewed
    /// from above). Used for lateral trajectory offsets.
    pub fn perp_planar(&self) -> Vec3 {
        Vec3::new(-self.z, 0.0, self.x)
    }

    pub fn planar_distance_sq(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    pub fn planar_distance(&self, other: &Vec3) -> f32 {
        self.planar_distance_sq(other).sqrt()
    }

    /// Heading angle on the ground plane in radians.
    pub fn planar_angle(&self) -> f32 {
        self.z.atan2(self.x)
    }

    /// Unit vector for a ground-plane heading angle.
    pub fn from_planar_angle(angle: f32) -> Vec3 {
        Vec3::new(angle.cos(), 0.0, angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_planar_length_ignores_height() {
        let v = Vec3::new(3.0, 100.0, 4.0);
        assert_approx_eq!(v.planar_length(), 5.0);
        assert_approx_eq!(v.planar_length_sq(), 25.0);
    }

    #[test]
    fn test_planar_normalize() {
        let v = Vec3::new(10.0, 5.0, 0.0).planar_normalize();
        assert_approx_eq!(v.x, 1.0);
        assert_approx_eq!(v.y, 0.0);
        assert_approx_eq!(v.z, 0.0);
    }

    #[test]
    fn test_planar_normalize_zero_is_zero() {
        let v = Vec3::new(0.0, 7.0, 0.0).planar_normalize();
        assert_eq!(v, Vec3::default());
    }

    #[test]
    fn test_perp_is_orthogonal() {
        let v = Vec3::new(0.6, 0.0, 0.8);
        let p = v.perp_planar();
        assert_approx_eq!(v.x * p.x + v.z * p.z, 0.0);
        assert_approx_eq!(p.planar_length(), 1.0);
    }

    #[test]
    fn test_angle_roundtrip() {
        let v = Vec3::new(0.0, 0.0, 1.0);
        let back = Vec3::from_planar_angle(v.planar_angle());
        assert_approx_eq!(back.x, v.x, 1e-6);
        assert_approx_eq!(back.z, v.z, 1e-6);
    }

    #[test]
    fn test_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 9.0, 4.0);
        assert_approx_eq!(a.planar_distance(&b), 5.0);
    }
}
