//! Two-step particle integration with RATTLE manifold constraints.
//!
//! Provides:
//! - NVE, Langevin and Brownian integration methods over disjoint particle groups
//! - RATTLE projection of positions and velocities onto implicit surfaces
//! - Symplectic rotational integration for anisotropic particles
//! - A scheduler sequencing step one, migration, force recomputation and step two
//! - Degrees-of-freedom accounting and a thermodynamic summary
//!
//! # Example
//!
//! ```
//! use phyz_md::{
//!     Constraint, IntegratorTwoStep, Particle, ParticleData, ParticleGroup, TwoStepNve,
//! };
//! use phyz_manifold::{AnyManifold, Sphere};
//! use phyz_math::{BoxDim, Vec3};
//!
//! // One particle on a sphere of radius 2, moving tangentially
//! let mut pdata = ParticleData::new(BoxDim::cube(10.0));
//! pdata.add_particle(Particle::new(
//!     Vec3::new(2.0, 0.0, 0.0),
//!     Vec3::new(0.0, 1.0, 0.0),
//!     1.0,
//!     0,
//! ));
//!
//! let sphere = AnyManifold::from(Sphere::new(2.0, Vec3::zeros()));
//! let nve = TwoStepNve::with_manifold(
//!     ParticleGroup::all(&pdata),
//!     Constraint::new(sphere, 1e-9),
//! );
//!
//! let mut integrator = IntegratorTwoStep::new(0.005).unwrap();
//! integrator.add_method(Box::new(nve)).unwrap();
//! integrator.prepare_run(0, &mut pdata).unwrap();
//!
//! for t in 0..100 {
//!     integrator.update(t, &mut pdata).unwrap();
//! }
//! assert!((pdata.pos[0].norm() - 2.0).abs() < 1e-6);
//! ```

pub mod comm;
pub mod composite;
pub mod config;
pub mod error;
pub mod group;
pub mod integrator;
pub mod method;
pub mod particle;
pub mod particle_data;
pub mod random;
pub mod rattle;
pub mod rotation;
pub mod thermo;
pub mod variant;

pub use comm::{Communicator, ForceCompute, HalfStepHook, SingleRank};
pub use composite::{Constituent, ForceComposite, RigidBodies, RigidBody};
pub use config::{GroupFilter, IntegratorConfig, MethodConfig};
pub use error::{MdError, Result};
pub use group::ParticleGroup;
pub use integrator::{AnisotropicMode, IntegratorTwoStep};
pub use method::{
    Constraint, Gamma, IntegrationMethod, Thermostat, TwoStepBrownian, TwoStepLangevin, TwoStepNve,
};
pub use particle::Particle;
pub use particle_data::{NetForce, ParticleData};
pub use rattle::{PositionProjection, RattleStats, VelocityProjection};
pub use thermo::ThermoSnapshot;
pub use variant::Variant;
