//! Triply periodic minimal surfaces.
//!
//! Wave numbers are derived from the box: `L = 2πN / box_length` for the
//! gyroid and primitive surfaces, `πN / box_length` for the diamond. They are
//! recomputed whenever the box changes, so the surface always tiles the box
//! with the requested number of unit cells.

use crate::{GpuManifoldParams, Manifold, lanes};
use phyz_math::{BoxDim, Vec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Which minimal surface to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpmsSurface {
    #[serde(alias = "G")]
    Gyroid,
    #[serde(alias = "D")]
    Diamond,
    #[serde(alias = "P")]
    Primitive,
}

/// Nodal approximation of a triply periodic minimal surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tpms {
    pub surface: TpmsSurface,
    /// Unit cells per box edge.
    pub cells: [u32; 3],
    /// Level-set offset: the surface is `f(x) = epsilon`.
    #[serde(default)]
    pub epsilon: f64,
    #[serde(skip, default = "Vec3::zeros")]
    wave: Vec3,
}

impl Tpms {
    pub fn new(surface: TpmsSurface, cells: [u32; 3], epsilon: f64, sim_box: &BoxDim) -> Self {
        let mut tpms = Self {
            surface,
            cells,
            epsilon,
            wave: Vec3::zeros(),
        };
        tpms.adjust_to_box(sim_box);
        tpms
    }

    /// Current wave numbers (Lx, Ly, Lz).
    pub fn wave_numbers(&self) -> Vec3 {
        self.wave
    }

    fn wave_for(&self, sim_box: &BoxDim) -> Vec3 {
        let scale = match self.surface {
            TpmsSurface::Diamond => PI,
            TpmsSurface::Gyroid | TpmsSurface::Primitive => 2.0 * PI,
        };
        let l = sim_box.length();
        Vec3::new(
            scale * self.cells[0] as f64 / l.x,
            scale * self.cells[1] as f64 / l.y,
            scale * self.cells[2] as f64 / l.z,
        )
    }
}

impl Manifold for Tpms {
    fn implicit_function(&self, p: &Vec3) -> f64 {
        let k = self.wave;
        let (sx, cx) = (k.x * p.x).sin_cos();
        let (sy, cy) = (k.y * p.y).sin_cos();
        let (sz, cz) = (k.z * p.z).sin_cos();
        let f = match self.surface {
            TpmsSurface::Gyroid => sx * cy + sy * cz + sz * cx,
            TpmsSurface::Diamond => cx * cy * cz - sx * sy * sz,
            TpmsSurface::Primitive => cx + cy + cz,
        };
        f - self.epsilon
    }

    fn gradient(&self, p: &Vec3) -> Vec3 {
        let k = self.wave;
        let (sx, cx) = (k.x * p.x).sin_cos();
        let (sy, cy) = (k.y * p.y).sin_cos();
        let (sz, cz) = (k.z * p.z).sin_cos();
        match self.surface {
            TpmsSurface::Gyroid => Vec3::new(
                k.x * (cx * cy - sz * sx),
                k.y * (cy * cz - sx * sy),
                k.z * (cz * cx - sy * sz),
            ),
            TpmsSurface::Diamond => Vec3::new(
                -k.x * (sx * cy * cz + cx * sy * sz),
                -k.y * (cx * sy * cz + sx * cy * sz),
                -k.z * (cx * cy * sz + sx * sy * cz),
            ),
            TpmsSurface::Primitive => Vec3::new(-k.x * sx, -k.y * sy, -k.z * sz),
        }
    }

    /// The surface is periodic with the box, so it fits whenever its wave
    /// numbers match the current box.
    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool {
        let expected = self.wave_for(sim_box);
        (expected - self.wave).norm() <= 1e-9 * expected.norm().max(1.0)
    }

    fn adjust_to_box(&mut self, sim_box: &BoxDim) {
        self.wave = self.wave_for(sim_box);
    }

    fn wgsl_source(&self) -> &'static str {
        match self.surface {
            TpmsSurface::Gyroid => GYROID_WGSL,
            TpmsSurface::Diamond => DIAMOND_WGSL,
            TpmsSurface::Primitive => PRIMITIVE_WGSL,
        }
    }

    fn gpu_params(&self) -> GpuManifoldParams {
        [lanes(&self.wave, self.epsilon), [0.0; 4]]
    }
}

const GYROID_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    let a = manifold.a.xyz * p;
    return sin(a.x) * cos(a.y) + sin(a.y) * cos(a.z) + sin(a.z) * cos(a.x) - manifold.a.w;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    let k = manifold.a.xyz;
    let s = sin(k * p);
    let c = cos(k * p);
    return k * vec3<f32>(
        c.x * c.y - s.z * s.x,
        c.y * c.z - s.x * s.y,
        c.z * c.x - s.y * s.z,
    );
}
"#;

const DIAMOND_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    let s = sin(manifold.a.xyz * p);
    let c = cos(manifold.a.xyz * p);
    return c.x * c.y * c.z - s.x * s.y * s.z - manifold.a.w;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    let k = manifold.a.xyz;
    let s = sin(k * p);
    let c = cos(k * p);
    return -k * vec3<f32>(
        s.x * c.y * c.z + c.x * s.y * s.z,
        c.x * s.y * c.z + s.x * c.y * s.z,
        c.x * c.y * s.z + s.x * s.y * c.z,
    );
}
"#;

const PRIMITIVE_WGSL: &str = r#"
fn manifold_value(p: vec3<f32>) -> f32 {
    let c = cos(manifold.a.xyz * p);
    return c.x + c.y + c.z - manifold.a.w;
}

fn manifold_gradient(p: vec3<f32>) -> vec3<f32> {
    let k = manifold.a.xyz;
    return -k * sin(k * p);
}
"#;
