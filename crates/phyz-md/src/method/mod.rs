//! Integration methods: NVE, Langevin and Brownian, each optionally
//! constrained to a manifold.

mod brownian;
mod langevin;
mod nve;
mod thermostat;

pub use brownian::TwoStepBrownian;
pub use langevin::TwoStepLangevin;
pub use nve::TwoStepNve;
pub use thermostat::{Gamma, Thermostat};

use crate::comm::Communicator;
use crate::rattle::{self, DEFAULT_TOLERANCE, RattleStats};
use crate::{MdError, ParticleData, ParticleGroup, Result, rotation};
use phyz_manifold::Manifold;
use phyz_math::{BoxDim, Vec3};

/// One integration method applied to a fixed group of particles.
///
/// The scheduler calls `integrate_step_one` to advance positions to t+Δt
/// and velocities to t+Δt/2, recomputes forces, then calls
/// `integrate_step_two` to finish the velocities.
pub trait IntegrationMethod {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn group(&self) -> &ParticleGroup;

    fn delta_t(&self) -> f64;

    fn set_delta_t(&mut self, dt: f64);

    /// Enable or disable the rotational update.
    fn set_anisotropic(&mut self, aniso: bool);

    fn integrate_step_one(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()>;

    fn integrate_step_two(
        &mut self,
        timestep: u64,
        pdata: &mut ParticleData,
        comm: &dyn Communicator,
    ) -> Result<()>;

    /// Fold the constraint reaction into the net force, virial and
    /// acceleration. No-op for unconstrained methods.
    fn include_constraint_force(
        &mut self,
        _timestep: u64,
        _pdata: &mut ParticleData,
    ) -> Result<()> {
        Ok(())
    }

    /// Check that the method's parameters are usable for `pdata`.
    fn validate(&self, _pdata: &ParticleData) -> Result<()> {
        Ok(())
    }

    /// Check a prospective box without applying it.
    fn check_box(&self, _sim_box: &BoxDim) -> Result<()> {
        Ok(())
    }

    /// React to a new box. Fails if a constraint surface no longer fits.
    fn on_box_change(&mut self, _sim_box: &BoxDim) -> Result<()> {
        Ok(())
    }

    /// Resize per-type parameter tables.
    fn on_num_types_change(&mut self, _n_types: usize) {}

    /// Whether the method conserves total linear momentum.
    fn is_momentum_conserving(&self) -> bool {
        false
    }

    /// Translational degrees of freedom this method gives to `query`.
    fn translational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64;

    /// Rotational degrees of freedom this method gives to `query`.
    fn rotational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64 {
        self.group()
            .intersection(query)
            .iter()
            .map(|i| rotation::degrees_of_freedom(&pdata.inertia[i], pdata.dimensions()))
            .sum::<usize>() as f64
    }

    /// Convergence of the RATTLE solves in the last sub-step.
    fn rattle_stats(&self) -> RattleStats {
        RattleStats::default()
    }

    /// Logged quantity by name, if this method provides it.
    fn log_value(&self, _quantity: &str) -> Option<f64> {
        None
    }
}

/// A manifold together with its RATTLE tolerance.
#[derive(Debug, Clone)]
pub struct Constraint<M> {
    pub manifold: M,
    pub tolerance: f64,
}

impl<M: Manifold> Constraint<M> {
    pub fn new(manifold: M, tolerance: f64) -> Self {
        Self {
            manifold,
            tolerance,
        }
    }

    /// Constraint with the default tolerance.
    pub fn with_default_tolerance(manifold: M) -> Self {
        Self::new(manifold, DEFAULT_TOLERANCE)
    }

    /// Whether the surface, once adjusted to `sim_box`, fits inside it.
    /// Leaves the manifold untouched.
    pub fn check_box(&self, sim_box: &BoxDim) -> Result<()> {
        let mut adjusted = self.manifold.clone();
        adjusted.adjust_to_box(sim_box);
        if adjusted.fits_inside_box(sim_box) {
            Ok(())
        } else {
            Err(MdError::ManifoldOutsideBox)
        }
    }

    pub fn on_box_change(&mut self, sim_box: &BoxDim) -> Result<()> {
        self.check_box(sim_box)?;
        self.manifold.adjust_to_box(sim_box);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tolerance.is_finite() && self.tolerance >= 0.0 {
            Ok(())
        } else {
            Err(MdError::InvalidParameter(format!(
                "RATTLE tolerance must be non-negative, got {}",
                self.tolerance
            )))
        }
    }
}

/// D per member in the query, D - 1 when confined to a surface.
pub fn translational_dof<M>(
    group: &ParticleGroup,
    query: &ParticleGroup,
    pdata: &ParticleData,
    constraint: &Option<Constraint<M>>,
) -> f64 {
    let d = pdata.dimensions() as f64;
    let per_particle = if constraint.is_some() { d - 1.0 } else { d };
    per_particle * group.intersection_len(query) as f64
}

/// Velocity-Verlet first half for particle `i`: sets the half-step velocity
/// and returns the displacement, projected onto the manifold if constrained.
pub(crate) fn verlet_step_one<M: Manifold>(
    pdata: &mut ParticleData,
    i: usize,
    dt: f64,
    constraint: Option<&Constraint<M>>,
    stats: &mut RattleStats,
) -> Vec3 {
    let drift = pdata.vel[i] + 0.5 * dt * pdata.accel[i];
    match constraint {
        Some(c) => {
            let x0 = pdata.pos[i];
            let coupling = 0.5 * dt / pdata.mass[i];
            let pr = rattle::project_position(&c.manifold, x0, drift, coupling, dt, c.tolerance);
            stats.record(pr.iterations, pr.converged);
            pdata.vel[i] = pr.half_velocity;
            pr.position - x0
        }
        None => {
            pdata.vel[i] = drift;
            dt * drift
        }
    }
}

/// Velocity-Verlet second half for particle `i` with acceleration `accel`.
pub(crate) fn verlet_step_two<M: Manifold>(
    pdata: &mut ParticleData,
    i: usize,
    accel: Vec3,
    dt: f64,
    constraint: Option<&Constraint<M>>,
    stats: &mut RattleStats,
) {
    match constraint {
        Some(c) => {
            let normal = c.manifold.gradient(&pdata.pos[i]);
            let vp = rattle::project_velocity(
                &normal,
                pdata.vel[i],
                accel,
                pdata.mass[i],
                dt,
                c.tolerance,
            );
            stats.record(vp.iterations, vp.converged);
            pdata.vel[i] = vp.velocity;
        }
        None => pdata.vel[i] += 0.5 * dt * accel,
    }
}

/// Subtract the constraint reaction from the net force and virial of every
/// member and refresh its acceleration. `drift` gives the unconstrained
/// drift and coupling of each particle.
pub(crate) fn fold_constraint_force<M: Manifold>(
    constraint: &Constraint<M>,
    group: &ParticleGroup,
    pdata: &mut ParticleData,
    dt: f64,
    stats: &mut RattleStats,
    drift: impl Fn(&ParticleData, usize) -> (Vec3, f64),
) {
    for i in group {
        let (u, coupling) = drift(pdata, i);
        let x = pdata.pos[i];
        let pr = rattle::project_position(
            &constraint.manifold,
            x,
            u,
            coupling,
            dt,
            constraint.tolerance,
        );
        stats.record(pr.iterations, pr.converged);

        let w = pr.constraint_virial(&x);
        pdata.net.add(i, pr.constraint_force(), 0.0, w);
        pdata.accel[i] = pdata.net.force[i] / pdata.mass[i];
    }
}

/// Rotational first half for every member.
pub(crate) fn angular_step_one(group: &ParticleGroup, pdata: &mut ParticleData, dt: f64) {
    for i in group {
        let torque = pdata.net.torque[i];
        let inertia = pdata.inertia[i];
        rotation::step_one(
            &mut pdata.orientation[i],
            &mut pdata.angmom[i],
            &torque,
            &inertia,
            dt,
        );
    }
}

/// Rotational second half for every member.
pub(crate) fn angular_step_two(group: &ParticleGroup, pdata: &mut ParticleData, dt: f64) {
    for i in group {
        let torque = pdata.net.torque[i];
        let inertia = pdata.inertia[i];
        rotation::step_two(&pdata.orientation[i], &mut pdata.angmom[i], &torque, &inertia, dt);
    }
}
