//! Orthorhombic periodic simulation box.

use crate::{Image, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned periodic box centered on the origin.
///
/// In two dimensions the z axis is never wrapped and does not enter the
/// volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDim {
    /// Lower corner.
    pub lo: Vec3,
    /// Upper corner.
    pub hi: Vec3,
    /// Periodicity flags per axis.
    pub periodic: [bool; 3],
    /// Spatial dimensionality (2 or 3).
    pub dimensions: u32,
}

impl BoxDim {
    /// Cubic 3D box of edge `l`.
    pub fn cube(l: f64) -> Self {
        Self::new(Vec3::new(l, l, l))
    }

    /// 3D box with edge lengths `l`.
    pub fn new(l: Vec3) -> Self {
        Self {
            lo: -0.5 * l,
            hi: 0.5 * l,
            periodic: [true; 3],
            dimensions: 3,
        }
    }

    /// 2D box in the xy plane. The z extent is kept at unit length.
    pub fn new_2d(lx: f64, ly: f64) -> Self {
        Self {
            lo: Vec3::new(-0.5 * lx, -0.5 * ly, -0.5),
            hi: Vec3::new(0.5 * lx, 0.5 * ly, 0.5),
            periodic: [true, true, false],
            dimensions: 2,
        }
    }

    /// Edge lengths.
    #[inline]
    pub fn length(&self) -> Vec3 {
        self.hi - self.lo
    }

    /// Volume in 3D, area in 2D.
    pub fn volume(&self) -> f64 {
        let l = self.length();
        if self.dimensions == 2 {
            l.x * l.y
        } else {
            l.x * l.y * l.z
        }
    }

    /// Whether `p` lies inside `[lo, hi)` on every wrapped axis.
    pub fn contains(&self, p: &Vec3) -> bool {
        (0..self.wrapped_axes()).all(|d| p[d] >= self.lo[d] && p[d] < self.hi[d])
    }

    /// Wrap `pos` back into the box, updating the image counter.
    pub fn wrap(&self, pos: &mut Vec3, image: &mut Image) {
        let l = self.length();
        for d in 0..self.wrapped_axes() {
            if !self.periodic[d] {
                continue;
            }
            let shift = ((pos[d] - self.lo[d]) / l[d]).floor();
            if shift != 0.0 {
                pos[d] -= shift * l[d];
                image[d] += shift as i32;
            }
            // floor() can land exactly on hi through rounding
            if pos[d] >= self.hi[d] {
                pos[d] -= l[d];
                image[d] += 1;
            }
        }
    }

    /// Minimum-image displacement.
    pub fn min_image(&self, mut dr: Vec3) -> Vec3 {
        let l = self.length();
        for d in 0..self.wrapped_axes() {
            if self.periodic[d] {
                dr[d] -= l[d] * (dr[d] / l[d]).round();
            }
        }
        dr
    }

    /// Unwrapped position from a wrapped one and its image counter.
    pub fn unwrap(&self, pos: &Vec3, image: &Image) -> Vec3 {
        let l = self.length();
        Vec3::new(
            pos.x + image[0] as f64 * l.x,
            pos.y + image[1] as f64 * l.y,
            pos.z + image[2] as f64 * l.z,
        )
    }

    fn wrapped_axes(&self) -> usize {
        if self.dimensions == 2 { 2 } else { 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_updates_image() {
        let b = BoxDim::cube(10.0);
        let mut p = Vec3::new(5.5, -5.5, 0.0);
        let mut img = [0, 0, 0];
        b.wrap(&mut p, &mut img);
        assert_relative_eq!(p.x, -4.5, epsilon = 1e-12);
        assert_relative_eq!(p.y, 4.5, epsilon = 1e-12);
        assert_eq!(img, [1, -1, 0]);
        assert!(b.contains(&p));
    }

    #[test]
    fn test_unwrap_inverts_wrap() {
        let b = BoxDim::cube(4.0);
        let original = Vec3::new(9.1, -3.0, 2.5);
        let mut p = original;
        let mut img = [0, 0, 0];
        b.wrap(&mut p, &mut img);
        let back = b.unwrap(&p, &img);
        assert!((back - original).norm() < 1e-12);
    }

    #[test]
    fn test_2d_leaves_z_alone() {
        let b = BoxDim::new_2d(2.0, 2.0);
        let mut p = Vec3::new(0.0, 0.0, 7.0);
        let mut img = [0, 0, 0];
        b.wrap(&mut p, &mut img);
        assert_eq!(p.z, 7.0);
        assert_eq!(img, [0, 0, 0]);
        assert_relative_eq!(b.volume(), 4.0);
    }

    #[test]
    fn test_min_image() {
        let b = BoxDim::cube(10.0);
        let dr = b.min_image(Vec3::new(9.0, -6.0, 1.0));
        assert!((dr - Vec3::new(-1.0, 4.0, 1.0)).norm() < 1e-12);
    }
}
