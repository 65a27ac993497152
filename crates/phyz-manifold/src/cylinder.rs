//! Cylinder around the z axis.

use crate::{GpuManifoldParams, Manifold, lanes};
use phyz_math::{BoxDim, Vec3};
use serde::{Deserialize, Serialize};

/// Infinite cylinder `(x - Px)² + (y - Py)² = r²` aligned with z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub radius: f64,
    #[serde(default = "Vec3::zeros")]
    pub center: Vec3,
}

impl Cylinder {
    pub fn new(radius: f64, center: Vec3) -> Self {
        Self { radius, center }
    }
}

impl Manifold for Cylinder {
    fn implicit_function(&self, p: &Vec3) -> f64 {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        dx * dx + dy * dy - self.radius * self.radius
    }

    fn gradient(&self, p: &Vec3) -> Vec3 {
        Vec3::new(2.0 * (p.x - self.center.x), 2.0 * (p.y - self.center.y), 0.0)
    }

    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool {
        (0..2).all(|d| {
            self.center[d] - self.radius >= sim_box.lo[d]
                && self.center[d] + self.radius <= sim_box.hi[d]
        })
    }

    fn wgsl_source(&self) -> &'static str {
        CYLINDER_WGSL
    }

    fn gpu_params(&self) -> GpuManifoldParams {
        [lanes(&self.center, self.radius), [0.0; 4]]
    }
}

const CYLINDER_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    let d = p.xy - manifold.a.xy;
    return dot(d, d) - manifold.a.w * manifold.a.w;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(2.0 * (p.xy - manifold.a.xy), 0.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_gradient_matches;

    #[test]
    fn test_cylinder_ignores_z() {
        let c = Cylinder::new(1.0, Vec3::zeros());
        let a = c.implicit_function(&Vec3::new(1.0, 0.0, -3.0));
        let b = c.implicit_function(&Vec3::new(1.0, 0.0, 8.0));
        assert_eq!(a, 0.0);
        assert_eq!(a, b);
        assert_gradient_matches(&c, Vec3::new(0.3, 0.8, 1.0));
    }
}
