//! phyz: constrained two-step particle integration.
//!
//! Umbrella crate re-exporting the math types, constraint manifolds, CPU
//! integration methods and scheduler, and the wgpu backend.

pub use phyz_gpu::{
    self, GpuContext, GpuTwoStepBrownian, GpuTwoStepLangevin, GpuTwoStepNve,
};
pub use phyz_manifold::{
    self, AnyManifold, Cylinder, Ellipsoid, Manifold, Plane, Sphere, Tpms, TpmsSurface,
};
pub use phyz_math::{self, BoxDim, Quat, Vec3};
pub use phyz_md::{
    self, AnisotropicMode, Communicator, Constraint, ForceComposite, ForceCompute, Gamma,
    GroupFilter, IntegrationMethod, IntegratorConfig, IntegratorTwoStep, MdError, MethodConfig,
    NetForce, Particle, ParticleData, ParticleGroup, RattleStats, Result, RigidBodies, RigidBody,
    Thermostat, ThermoSnapshot, TwoStepBrownian, TwoStepLangevin, TwoStepNve, Variant,
};
