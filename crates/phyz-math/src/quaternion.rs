//! Quaternion utilities for orientations and angular momenta.
//!
//! Convention: q = [w; x; y; z] where w is scalar, (x,y,z) is vector part.
//! Orientations are unit quaternions. Angular momenta are stored in the
//! conjugate-momentum form p = 2 q ⊗ (0, L_body), which is not normalized.

use crate::{Mat3, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A quaternion with scalar part `w` and vector part `v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// Scalar part (w).
    pub w: f64,
    /// Vector part (x, y, z).
    pub v: Vec3,
}

impl Quat {
    /// Create a new quaternion from scalar and vector parts.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            w,
            v: Vec3::new(x, y, z),
        }
    }

    /// Identity quaternion (no rotation).
    pub fn identity() -> Self {
        Self {
            w: 1.0,
            v: Vec3::zeros(),
        }
    }

    /// The zero quaternion, used as "no angular momentum".
    pub fn zero() -> Self {
        Self {
            w: 0.0,
            v: Vec3::zeros(),
        }
    }

    /// Pure quaternion (0, v).
    pub fn pure(v: Vec3) -> Self {
        Self { w: 0.0, v }
    }

    /// Create quaternion from axis-angle representation.
    /// axis should be a unit vector, angle in radians.
    pub fn from_axis_angle(axis: &Vec3, angle: f64) -> Self {
        let half_angle = angle * 0.5;
        let (s, c) = half_angle.sin_cos();
        Self { w: c, v: *axis * s }
    }

    /// Build from `[w, x, y, z]`.
    pub fn from_array(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    /// Pack as `[w, x, y, z]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.w, self.v.x, self.v.y, self.v.z]
    }

    /// Four-dimensional dot product.
    #[inline]
    pub fn dot(&self, other: &Quat) -> f64 {
        self.w * other.w + self.v.dot(&other.v)
    }

    /// Squared norm.
    #[inline]
    pub fn norm_sq(&self) -> f64 {
        self.dot(self)
    }

    /// Normalize this quaternion to unit length.
    pub fn normalize(&self) -> Self {
        let norm = self.norm_sq().sqrt();
        if norm < 1e-12 {
            return Self::identity();
        }
        *self * (1.0 / norm)
    }

    /// Conjugate of the quaternion (inverse for unit quaternions).
    pub fn conjugate(&self) -> Quat {
        Quat {
            w: self.w,
            v: -self.v,
        }
    }

    /// Product with the pure quaternion (0, t): `self ⊗ (0, t)`.
    #[inline]
    pub fn mul_vec(&self, t: &Vec3) -> Quat {
        Quat {
            w: -self.v.dot(t),
            v: *t * self.w + self.v.cross(t),
        }
    }

    /// Rotate a vector by this quaternion: q v q*.
    ///
    /// Valid for non-unit quaternions up to a factor |q|².
    #[inline]
    pub fn rotate(&self, a: &Vec3) -> Vec3 {
        (self.w * self.w - self.v.dot(&self.v)) * a
            + 2.0 * self.w * self.v.cross(a)
            + 2.0 * self.v.dot(a) * self.v
    }

    /// Rotate a vector by the inverse rotation: q* v q.
    #[inline]
    pub fn rotate_inverse(&self, a: &Vec3) -> Vec3 {
        self.conjugate().rotate(a)
    }

    /// Convert quaternion to 3x3 rotation matrix.
    pub fn to_matrix(&self) -> Mat3 {
        let w = self.w;
        let x = self.v.x;
        let y = self.v.y;
        let z = self.v.z;

        Mat3::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        )
    }

    /// Permutation P1 of the free-rotor splitting (rotation about body x).
    #[inline]
    pub fn perm_x(&self) -> Quat {
        Quat::new(-self.v.x, self.w, self.v.z, -self.v.y)
    }

    /// Permutation P2 of the free-rotor splitting (rotation about body y).
    #[inline]
    pub fn perm_y(&self) -> Quat {
        Quat::new(-self.v.y, -self.v.z, self.w, self.v.x)
    }

    /// Permutation P3 of the free-rotor splitting (rotation about body z).
    #[inline]
    pub fn perm_z(&self) -> Quat {
        Quat::new(-self.v.z, self.v.y, -self.v.x, self.w)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Quat {
    type Output = Quat;

    fn mul(self, other: Quat) -> Quat {
        Quat {
            w: self.w * other.w - self.v.dot(&other.v),
            v: self.v.cross(&other.v) + other.v * self.w + self.v * other.w,
        }
    }
}

impl Mul<f64> for Quat {
    type Output = Quat;

    fn mul(self, s: f64) -> Quat {
        Quat {
            w: self.w * s,
            v: self.v * s,
        }
    }
}

impl Mul<Quat> for f64 {
    type Output = Quat;

    fn mul(self, q: Quat) -> Quat {
        q * self
    }
}

impl Add for Quat {
    type Output = Quat;

    fn add(self, other: Quat) -> Quat {
        Quat {
            w: self.w + other.w,
            v: self.v + other.v,
        }
    }
}

impl AddAssign for Quat {
    fn add_assign(&mut self, other: Quat) {
        self.w += other.w;
        self.v += other.v;
    }
}

impl Sub for Quat {
    type Output = Quat;

    fn sub(self, other: Quat) -> Quat {
        Quat {
            w: self.w - other.w,
            v: self.v - other.v,
        }
    }
}

impl Neg for Quat {
    type Output = Quat;

    fn neg(self) -> Quat {
        Quat {
            w: -self.w,
            v: -self.v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_identity() {
        let q = Quat::identity();
        assert_eq!(q.w, 1.0);
        assert_eq!(q.v, Vec3::zeros());
    }

    #[test]
    fn test_rotate_matches_matrix() {
        let axis = Vec3::new(1.0, 2.0, -0.5).normalize();
        let q = Quat::from_axis_angle(&axis, 0.7);
        let a = Vec3::new(0.3, -1.2, 2.0);
        let by_quat = q.rotate(&a);
        let by_mat = q.to_matrix() * a;
        assert!((by_quat - by_mat).norm() < EPS);
    }

    #[test]
    fn test_rotate_inverse_roundtrip() {
        let q = Quat::from_axis_angle(&Vec3::z(), 1.1);
        let a = Vec3::new(1.0, 0.0, 0.0);
        let back = q.rotate_inverse(&q.rotate(&a));
        assert!((back - a).norm() < EPS);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let q = Quat::from_axis_angle(&Vec3::z(), std::f64::consts::FRAC_PI_2);
        let r = q.rotate(&Vec3::x());
        assert_relative_eq!(r.y, 1.0, epsilon = EPS);
        assert_relative_eq!(r.x, 0.0, epsilon = EPS);
    }

    #[test]
    fn test_mul_vec_is_product_with_pure() {
        let q = Quat::new(0.3, -0.2, 0.9, 0.1);
        let t = Vec3::new(1.0, 2.0, 3.0);
        let lhs = q.mul_vec(&t);
        let rhs = q * Quat::pure(t);
        assert_relative_eq!(lhs.w, rhs.w, epsilon = EPS);
        assert!((lhs.v - rhs.v).norm() < EPS);
    }

    #[test]
    fn test_permutations_preserve_norm() {
        let q = Quat::new(0.1, 0.2, 0.3, 0.4);
        for p in [q.perm_x(), q.perm_y(), q.perm_z()] {
            assert_relative_eq!(p.norm_sq(), q.norm_sq(), epsilon = EPS);
            assert_relative_eq!(p.dot(&q), 0.0, epsilon = EPS);
        }
    }

    #[test]
    fn test_normalize_degenerate() {
        let q = Quat::zero().normalize();
        assert_eq!(q, Quat::identity());
    }
}
