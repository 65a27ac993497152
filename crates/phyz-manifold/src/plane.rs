//! Plane z = shift.

use crate::{GpuManifoldParams, Manifold};
use phyz_math::{BoxDim, Vec3};
use serde::{Deserialize, Serialize};

/// Horizontal plane `z = shift`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Height of the plane along z.
    #[serde(default)]
    pub shift: f64,
}

impl Plane {
    pub fn new(shift: f64) -> Self {
        Self { shift }
    }
}

impl Manifold for Plane {
    fn implicit_function(&self, p: &Vec3) -> f64 {
        p.z - self.shift
    }

    fn gradient(&self, _p: &Vec3) -> Vec3 {
        Vec3::z()
    }

    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool {
        self.shift >= sim_box.lo.z && self.shift <= sim_box.hi.z
    }

    fn wgsl_source(&self) -> &'static str {
        PLANE_WGSL
    }

    fn gpu_params(&self) -> GpuManifoldParams {
        [[self.shift as f32, 0.0, 0.0, 0.0], [0.0; 4]]
    }
}

const PLANE_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    return p.z - manifold.a.x;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(0.0, 0.0, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_value() {
        let p = Plane::new(1.5);
        assert_eq!(p.implicit_function(&Vec3::new(3.0, -2.0, 1.5)), 0.0);
        assert_eq!(p.implicit_function(&Vec3::new(0.0, 0.0, 2.0)), 0.5);
    }

    #[test]
    fn test_plane_fit() {
        let b = BoxDim::cube(4.0);
        assert!(Plane::new(1.9).fits_inside_box(&b));
        assert!(!Plane::new(2.1).fits_inside_box(&b));
    }
}
