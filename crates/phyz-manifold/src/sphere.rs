//! Sphere |x - P|² = r².

use crate::{GpuManifoldParams, Manifold, lanes};
use phyz_math::{BoxDim, Vec3};
use serde::{Deserialize, Serialize};

/// Sphere of radius `radius` centered on `center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub radius: f64,
    #[serde(default = "Vec3::zeros")]
    pub center: Vec3,
}

impl Sphere {
    pub fn new(radius: f64, center: Vec3) -> Self {
        Self { radius, center }
    }
}

impl Manifold for Sphere {
    fn implicit_function(&self, p: &Vec3) -> f64 {
        (p - self.center).norm_squared() - self.radius * self.radius
    }

    fn gradient(&self, p: &Vec3) -> Vec3 {
        2.0 * (p - self.center)
    }

    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool {
        (0..3).all(|d| {
            self.center[d] - self.radius >= sim_box.lo[d]
                && self.center[d] + self.radius <= sim_box.hi[d]
        })
    }

    fn wgsl_source(&self) -> &'static str {
        SPHERE_WGSL
    }

    fn gpu_params(&self) -> GpuManifoldParams {
        [lanes(&self.center, self.radius), [0.0; 4]]
    }
}

const SPHERE_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    let d = p - manifold.a.xyz;
    return dot(d, d) - manifold.a.w * manifold.a.w;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    return 2.0 * (p - manifold.a.xyz);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_gradient_matches;

    #[test]
    fn test_sphere_gradient() {
        let s = Sphere::new(1.5, Vec3::new(0.1, -0.2, 0.3));
        assert_gradient_matches(&s, Vec3::new(1.0, 0.4, -0.7));
    }

    #[test]
    fn test_sphere_fit() {
        let b = BoxDim::cube(4.0);
        assert!(Sphere::new(1.9, Vec3::zeros()).fits_inside_box(&b));
        assert!(!Sphere::new(1.9, Vec3::new(0.2, 0.0, 0.0)).fits_inside_box(&b));
    }
}
