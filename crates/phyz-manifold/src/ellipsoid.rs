//! Axis-aligned ellipsoid.

use crate::{GpuManifoldParams, Manifold, lanes};
use phyz_math::{BoxDim, Vec3};
use serde::{Deserialize, Serialize};

/// Ellipsoid `(dx/a)² + (dy/b)² + (dz/c)² = 1` around `center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    #[serde(default = "Vec3::zeros")]
    pub center: Vec3,
}

impl Ellipsoid {
    pub fn new(a: f64, b: f64, c: f64, center: Vec3) -> Self {
        Self { a, b, c, center }
    }

    fn inv_sq(&self) -> Vec3 {
        Vec3::new(
            1.0 / (self.a * self.a),
            1.0 / (self.b * self.b),
            1.0 / (self.c * self.c),
        )
    }
}

impl Manifold for Ellipsoid {
    fn implicit_function(&self, p: &Vec3) -> f64 {
        let d = p - self.center;
        d.component_mul(&d).dot(&self.inv_sq()) - 1.0
    }

    fn gradient(&self, p: &Vec3) -> Vec3 {
        2.0 * (p - self.center).component_mul(&self.inv_sq())
    }

    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool {
        let half = Vec3::new(self.a, self.b, self.c);
        (0..3).all(|d| {
            self.center[d] - half[d] >= sim_box.lo[d] && self.center[d] + half[d] <= sim_box.hi[d]
        })
    }

    fn wgsl_source(&self) -> &'static str {
        ELLIPSOID_WGSL
    }

    fn gpu_params(&self) -> GpuManifoldParams {
        [lanes(&self.center, 0.0), lanes(&self.inv_sq(), 0.0)]
    }
}

const ELLIPSOID_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    let d = p - manifold.a.xyz;
    return dot(d * d, manifold.b.xyz) - 1.0;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    return 2.0 * (p - manifold.a.xyz) * manifold.b.xyz;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_gradient_matches;

    #[test]
    fn test_ellipsoid_poles() {
        let e = Ellipsoid::new(1.0, 2.0, 3.0, Vec3::zeros());
        assert!(e.implicit_function(&Vec3::new(0.0, 2.0, 0.0)).abs() < 1e-14);
        assert!(e.implicit_function(&Vec3::new(0.0, 0.0, 3.0)).abs() < 1e-14);
        assert_gradient_matches(&e, Vec3::new(0.5, -1.0, 1.2));
    }

    #[test]
    fn test_ellipsoid_fit() {
        let e = Ellipsoid::new(1.0, 2.0, 3.0, Vec3::zeros());
        assert!(e.fits_inside_box(&BoxDim::new(Vec3::new(2.0, 4.0, 6.0))));
        assert!(!e.fits_inside_box(&BoxDim::cube(5.0)));
    }
}
