//! wgpu compute backend for the two-step integration methods.
//!
//! GPU methods implement [`phyz_md::IntegrationMethod`] and plug into the
//! same [`phyz_md::IntegratorTwoStep`] as the CPU methods. A group's members
//! are split contiguously across the devices of a [`GpuContext`]; every
//! per-particle random draw is keyed by particle tag and timestep, so results
//! do not depend on the number of devices.

pub mod buffers;
pub mod context;
pub mod launch;
pub mod method;
pub mod partition;
pub mod shaders;

pub use buffers::{GpuParticle, StepParams, Writeback};
pub use context::{GpuContext, GpuDevice};
pub use launch::{GpuLauncher, Kernel};
pub use method::{GpuTwoStepBrownian, GpuTwoStepLangevin, GpuTwoStepNve};
pub use partition::GpuPartition;
