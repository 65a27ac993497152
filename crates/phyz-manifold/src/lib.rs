//! Implicit surfaces that confine particles during constrained integration.
//!
//! A manifold is the zero set of a scalar function g(x). Integrators only
//! need g and its gradient, so every surface implements [`Manifold`] and the
//! integration methods are generic over it. Each surface also carries the
//! WGSL source of its value/gradient so GPU kernels can inline it.
//!
//! # Example
//!
//! ```
//! use phyz_manifold::{Manifold, Sphere};
//! use phyz_math::Vec3;
//!
//! let sphere = Sphere::new(2.0, Vec3::zeros());
//! let p = Vec3::new(2.0, 0.0, 0.0);
//! assert_eq!(sphere.implicit_function(&p), 0.0);
//! assert_eq!(sphere.gradient(&p), Vec3::new(4.0, 0.0, 0.0));
//! ```

pub mod any;
pub mod cylinder;
pub mod ellipsoid;
pub mod plane;
pub mod sphere;
pub mod tpms;

pub use any::AnyManifold;
pub use cylinder::Cylinder;
pub use ellipsoid::Ellipsoid;
pub use plane::Plane;
pub use sphere::Sphere;
pub use tpms::{Tpms, TpmsSurface};

use phyz_math::{BoxDim, Vec3};
use std::fmt;

/// Packed surface parameters uploaded to GPU kernels as two `vec4<f32>`.
pub type GpuManifoldParams = [[f32; 4]; 2];

/// Capability interface of a constraint surface.
pub trait Manifold: Clone + Send + Sync + fmt::Debug + 'static {
    /// Value of the implicit function g(p). Zero on the surface.
    fn implicit_function(&self, p: &Vec3) -> f64;

    /// Gradient ∇g(p). Must be non-zero wherever the constraint is active.
    fn gradient(&self, p: &Vec3) -> Vec3;

    /// Whether the surface lies entirely inside `sim_box`.
    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool;

    /// Re-derive box-dependent parameters after a box change.
    fn adjust_to_box(&mut self, _sim_box: &BoxDim) {}

    /// WGSL definitions of `manifold_value` and `manifold_gradient`.
    ///
    /// Both read their parameters from a `manifold` uniform holding two
    /// `vec4<f32>` fields `a` and `b`, filled from [`Manifold::gpu_params`].
    fn wgsl_source(&self) -> &'static str;

    /// Parameters for [`Manifold::wgsl_source`].
    fn gpu_params(&self) -> GpuManifoldParams;

    /// Unit normal at `p`.
    fn unit_normal(&self, p: &Vec3) -> Vec3 {
        self.gradient(p).normalize()
    }
}

/// Convert a vector to the xyz lanes of a GPU parameter slot.
pub(crate) fn lanes(v: &Vec3, w: f64) -> [f32; 4] {
    [v.x as f32, v.y as f32, v.z as f32, w as f32]
}
