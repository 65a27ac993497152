//! Math primitives for the phyz particle integrators.
//!
//! Provides nalgebra vector aliases, a unit quaternion type with the
//! products needed by rotational integration, and the periodic simulation
//! box used to wrap particle positions.

pub mod boxdim;
pub mod quaternion;

pub use boxdim::BoxDim;
pub use quaternion::Quat;

use nalgebra as na;

/// 3D vector alias.
pub type Vec3 = na::Vector3<f64>;
/// 3x3 matrix alias.
pub type Mat3 = na::Matrix3<f64>;

/// Periodic image counter, one entry per axis.
pub type Image = [i32; 3];

/// Cross-product matrix: [v]× such that [v]× w = v × w.
#[inline]
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Symmetric outer product `a ⊗ b` packed as (xx, xy, xz, yy, yz, zz).
///
/// Off-diagonal entries are symmetrized: `xy = (a.x b.y + a.y b.x) / 2`.
#[inline]
pub fn sym_outer(a: &Vec3, b: &Vec3) -> [f64; 6] {
    [
        a.x * b.x,
        0.5 * (a.x * b.y + a.y * b.x),
        0.5 * (a.x * b.z + a.z * b.x),
        a.y * b.y,
        0.5 * (a.y * b.z + a.z * b.y),
        a.z * b.z,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skew_matches_cross() {
        let a = Vec3::new(1.0, -2.0, 0.5);
        let b = Vec3::new(0.3, 4.0, -1.0);
        let diff = skew(&a) * b - a.cross(&b);
        assert!(diff.norm() < 1e-14);
    }

    #[test]
    fn test_sym_outer_is_symmetric() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-1.0, 0.5, 2.0);
        assert_eq!(sym_outer(&a, &b), sym_outer(&b, &a));
        assert_eq!(sym_outer(&a, &b)[0], -1.0);
    }
}
