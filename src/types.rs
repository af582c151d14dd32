//! Common physical types for layout metrics.
//!
//! Grid coordinates are integer module indices (see `model`); everything measured
//! in metres goes through `Vec3`.

use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Numerical tolerance for floating-point comparisons of physical values.
pub const EPSILON_GENERAL: f64 = 1e-9;

/// A point or extent in physical space (metres).
///
/// # Examples
/// ```ignore
/// let module = Vec3::new(2.75, 2.75, 3.0);
/// let block = module.scale(2.0, 2.0, 1.0);
/// assert_eq!(block.volume(), 5.5 * 5.5 * 3.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Component-wise multiplication with per-axis factors.
    ///
    /// Used to turn module counts into metres.
    #[inline]
    pub fn scale(&self, fx: f64, fy: f64, fz: f64) -> Self {
        Self::new(self.x * fx, self.y * fy, self.z * fz)
    }

    /// Product of all components.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Accumulates volume-weighted points for a centre of gravity.
#[derive(Clone, Debug, Default)]
pub struct CentroidAccumulator {
    moment: Vec3,
    total_volume: f64,
}

impl CentroidAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point carrying the given volume.
    pub fn add(&mut self, center: Vec3, volume: f64) {
        self.moment = self.moment + center * volume;
        self.total_volume += volume;
    }

    /// The weighted centroid, or `None` if nothing with volume was added.
    pub fn compute(&self) -> Option<Vec3> {
        if self.total_volume <= EPSILON_GENERAL {
            None
        } else {
            Some(self.moment * (1.0 / self.total_volume))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.scale(2.0, 1.0, 0.5), Vec3::new(2.0, 2.0, 1.5));
    }

    #[test]
    fn test_vec3_validity() {
        assert!(Vec3::new(2.75, 2.75, 3.0).is_valid_dimension());
        assert!(!Vec3::new(0.0, 2.75, 3.0).is_valid_dimension());
        assert!(!Vec3::new(f64::NAN, 2.75, 3.0).is_valid_dimension());
        assert!(!Vec3::new(2.75, f64::INFINITY, 3.0).is_valid_dimension());
    }

    #[test]
    fn test_centroid_accumulator() {
        let mut acc = CentroidAccumulator::new();
        acc.add(Vec3::new(0.0, 0.0, 0.0), 10.0);
        acc.add(Vec3::new(10.0, 0.0, 4.0), 30.0);

        let c = acc.compute().unwrap();
        assert!((c.x - 7.5).abs() < EPSILON_GENERAL);
        assert!((c.y - 0.0).abs() < EPSILON_GENERAL);
        assert!((c.z - 3.0).abs() < EPSILON_GENERAL);
        assert!((acc.total_volume - 40.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_centroid_accumulator_empty() {
        assert!(CentroidAccumulator::new().compute().is_none());

        // Points without volume carry no weight
        let mut acc = CentroidAccumulator::new();
        acc.add(Vec3::new(1.0, 1.0, 1.0), 0.0);
        assert!(acc.compute().is_none());
    }
}
