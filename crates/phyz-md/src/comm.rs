//! Collaborator interfaces the scheduler drives each step.

use crate::{NetForce, ParticleData, Result};

/// Domain-decomposition boundary.
///
/// `communicate` migrates particles that left the local domain and refreshes
/// ghosts. It runs exactly once per step, between step one and the force
/// recomputation.
pub trait Communicator {
    fn communicate(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()>;

    /// Force a full migration on the next `communicate`.
    fn force_migrate(&mut self) {}

    /// Global sum across ranks.
    fn all_reduce_sum(&self, value: f64) -> f64 {
        value
    }
}

/// Single-process communicator: nothing to migrate, sums are local.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRank;

impl Communicator for SingleRank {
    fn communicate(&mut self, _timestep: u64, _pdata: &mut ParticleData) -> Result<()> {
        Ok(())
    }
}

/// A force evaluator. Adds its contribution into `out`.
pub trait ForceCompute {
    fn compute(&mut self, timestep: u64, pdata: &ParticleData, out: &mut NetForce) -> Result<()>;

    /// Whether this force produces torques, for anisotropic auto-detection.
    fn couples_orientation(&self) -> bool {
        false
    }
}

/// Callback invoked between force recomputation and step two.
pub trait HalfStepHook {
    fn update(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()>;
}
