//! Two-step scheduler driving disjoint integration methods.
//!
//! One timestep runs:
//! 1. step one of every method (positions to t+1, velocities to t+½)
//! 2. particle migration and rigid-body slaving
//! 3. net force recomputation at t+1, then constraint force folding
//! 4. the optional half-step hook
//! 5. step two of every method (velocities to t+1)

use crate::comm::{Communicator, ForceCompute, HalfStepHook, SingleRank};
use crate::composite::ForceComposite;
use crate::method::IntegrationMethod;
use crate::rattle::RattleStats;
use crate::{MdError, ParticleData, ParticleGroup, Result};
use log::{trace, warn};
use phyz_math::BoxDim;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the scheduler decides whether to integrate rotational degrees of
/// freedom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnisotropicMode {
    /// Integrate rotations when any force couples to orientation.
    #[default]
    Automatic,
    Anisotropic,
    Isotropic,
}

impl FromStr for AnisotropicMode {
    type Err = MdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(AnisotropicMode::Automatic),
            "true" => Ok(AnisotropicMode::Anisotropic),
            "false" => Ok(AnisotropicMode::Isotropic),
            other => Err(MdError::InvalidAnisotropicMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for AnisotropicMode {
    type Error = MdError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AnisotropicMode> for String {
    fn from(mode: AnisotropicMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for AnisotropicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnisotropicMode::Automatic => "auto",
            AnisotropicMode::Anisotropic => "true",
            AnisotropicMode::Isotropic => "false",
        };
        f.write_str(s)
    }
}

/// Velocity-Verlet style scheduler over a set of integration methods.
pub struct IntegratorTwoStep {
    dt: f64,
    methods: Vec<Box<dyn IntegrationMethod>>,
    forces: Vec<Box<dyn ForceCompute>>,
    composites: Vec<Box<dyn ForceComposite>>,
    comm: Option<Box<dyn Communicator>>,
    hook: Option<Box<dyn HalfStepHook>>,
    aniso_mode: AnisotropicMode,
    aniso: bool,
    prepared: bool,
    gave_warning: bool,
}

impl IntegratorTwoStep {
    pub fn new(dt: f64) -> Result<Self> {
        check_dt(dt)?;
        Ok(Self {
            dt,
            methods: Vec::new(),
            forces: Vec::new(),
            composites: Vec::new(),
            comm: None,
            hook: None,
            aniso_mode: AnisotropicMode::default(),
            aniso: false,
            prepared: false,
            gave_warning: false,
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn set_dt(&mut self, dt: f64) -> Result<()> {
        check_dt(dt)?;
        self.dt = dt;
        Ok(())
    }

    /// Register a method. Its group must not share any particle with an
    /// already registered method; on overlap the scheduler is left unchanged.
    pub fn add_method(&mut self, mut method: Box<dyn IntegrationMethod>) -> Result<()> {
        if let Some(existing) = self
            .methods
            .iter()
            .find(|m| m.group().intersection_len(method.group()) > 0)
        {
            return Err(MdError::OverlappingGroups {
                method: method.name().to_string(),
                existing: existing.name().to_string(),
            });
        }
        if method.group().is_empty() {
            warn!("integration method `{}` has no particles", method.name());
        }
        method.set_delta_t(self.dt);
        self.methods.push(method);
        self.prepared = false;
        Ok(())
    }

    pub fn remove_all_methods(&mut self) {
        self.methods.clear();
        self.prepared = false;
    }

    pub fn methods(&self) -> &[Box<dyn IntegrationMethod>] {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut [Box<dyn IntegrationMethod>] {
        &mut self.methods
    }

    pub fn add_force(&mut self, force: Box<dyn ForceCompute>) {
        self.forces.push(force);
        self.prepared = false;
    }

    pub fn add_composite(&mut self, composite: Box<dyn ForceComposite>) {
        self.composites.push(composite);
    }

    pub fn set_communicator(&mut self, comm: Box<dyn Communicator>) {
        self.comm = Some(comm);
    }

    pub fn set_half_step_hook(&mut self, hook: Option<Box<dyn HalfStepHook>>) {
        self.hook = hook;
    }

    pub fn set_anisotropic_mode(&mut self, mode: AnisotropicMode) {
        self.aniso_mode = mode;
        self.prepared = false;
    }

    pub fn anisotropic_mode(&self) -> AnisotropicMode {
        self.aniso_mode
    }

    /// Resolved anisotropic flag of the current run.
    pub fn is_anisotropic(&self) -> bool {
        self.aniso
    }

    fn resolve_anisotropic(&self) -> bool {
        let coupled = self.forces.iter().any(|f| f.couples_orientation());
        match self.aniso_mode {
            AnisotropicMode::Automatic => coupled,
            AnisotropicMode::Anisotropic => {
                if !coupled {
                    warn!("anisotropic integration forced on, but no force couples to orientation");
                }
                true
            }
            AnisotropicMode::Isotropic => {
                if coupled {
                    warn!("anisotropic integration forced off, but forces couple to orientation");
                }
                false
            }
        }
    }

    /// Bring forces and accelerations at `timestep` into a consistent state
    /// before the first `update`.
    pub fn prepare_run(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        for m in &self.methods {
            if let Some(&last) = m.group().members().last() {
                if last >= pdata.n() {
                    return Err(MdError::InvalidParameter(format!(
                        "method `{}` refers to particle {last}, store holds {}",
                        m.name(),
                        pdata.n()
                    )));
                }
            }
            m.validate(pdata)?;
        }
        self.aniso = self.resolve_anisotropic();
        let sim_box = *pdata.sim_box();
        for m in &mut self.methods {
            m.set_delta_t(self.dt);
            m.set_anisotropic(self.aniso);
            m.on_num_types_change(pdata.n_types());
            m.on_box_change(&sim_box)?;
        }

        if let Some(comm) = &mut self.comm {
            comm.force_migrate();
            comm.communicate(timestep, pdata)?;
        }
        for c in &mut self.composites {
            c.update_composite_particles(timestep, pdata)?;
        }

        self.compute_net_force(timestep, pdata)?;
        if !pdata.is_accel_set() {
            pdata.compute_accelerations();
        }
        for m in &mut self.methods {
            m.include_constraint_force(timestep, pdata)?;
        }

        self.prepared = true;
        trace!(
            "prepared run at step {timestep}: {} methods, anisotropic = {}",
            self.methods.len(),
            self.aniso
        );
        Ok(())
    }

    /// Advance the system from `timestep` to `timestep + 1`.
    pub fn update(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        if self.methods.is_empty() && !self.gave_warning {
            warn!("no integration methods registered, particles will not move");
            self.gave_warning = true;
        }
        if !self.prepared {
            return Err(MdError::NotPrepared);
        }
        let next = timestep + 1;

        for m in &mut self.methods {
            m.set_delta_t(self.dt);
            m.integrate_step_one(timestep, pdata)?;
        }
        trace!("step {timestep}: step one done");

        if let Some(comm) = &mut self.comm {
            comm.communicate(next, pdata)?;
        }
        for c in &mut self.composites {
            c.update_composite_particles(next, pdata)?;
        }

        self.compute_net_force(next, pdata)?;
        for m in &mut self.methods {
            m.include_constraint_force(next, pdata)?;
        }
        trace!("step {timestep}: forces at {next} computed");

        if let Some(hook) = &mut self.hook {
            hook.update(next, pdata)?;
        }

        let comm: &dyn Communicator = match &self.comm {
            Some(c) => c.as_ref(),
            None => &SingleRank,
        };
        for m in &mut self.methods {
            m.integrate_step_two(next, pdata, comm)?;
        }
        trace!("step {timestep}: step two done");
        Ok(())
    }

    /// Zero the accumulators and let every force compute add into them.
    pub fn compute_net_force(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let mut net = std::mem::take(&mut pdata.net);
        net.resize(pdata.n());
        net.zero();
        let result = self
            .forces
            .iter_mut()
            .try_for_each(|f| f.compute(timestep, pdata, &mut net));
        pdata.net = net;
        result
    }

    /// Resize the box. Fails, leaving the store's box and every constraint
    /// surface untouched, if any surface does not fit the new box.
    pub fn set_box(&mut self, pdata: &mut ParticleData, sim_box: BoxDim) -> Result<()> {
        for m in &self.methods {
            m.check_box(&sim_box)?;
        }
        for m in &mut self.methods {
            m.on_box_change(&sim_box)?;
        }
        pdata.set_box(sim_box);
        Ok(())
    }

    pub fn set_num_types(&mut self, pdata: &mut ParticleData, n_types: usize) {
        pdata.set_n_types(n_types);
        for m in &mut self.methods {
            m.on_num_types_change(pdata.n_types());
        }
    }

    /// Translational degrees of freedom of `query`.
    ///
    /// When a single momentum-conserving method spans every particle, the
    /// D conserved momentum components are removed, split over `query` in
    /// proportion to its size.
    pub fn translational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64 {
        let mut dof: f64 = self
            .methods
            .iter()
            .map(|m| m.translational_dof(query, pdata))
            .sum();

        let n = pdata.n();
        if let [only] = self.methods.as_slice() {
            if only.is_momentum_conserving() && only.group().len() == n && n > 0 {
                dof -= pdata.dimensions() as f64 * query.len() as f64 / n as f64;
            }
        }
        dof
    }

    /// Rotational degrees of freedom of `query`. Zero unless the run is
    /// anisotropic.
    pub fn rotational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64 {
        if !self.aniso {
            return 0.0;
        }
        self.methods
            .iter()
            .map(|m| m.rotational_dof(query, pdata))
            .sum()
    }

    /// First method that provides the named quantity.
    pub fn log_value(&self, quantity: &str) -> Option<f64> {
        self.methods.iter().find_map(|m| m.log_value(quantity))
    }

    /// RATTLE statistics of the last sub-step, summed over methods.
    pub fn rattle_stats(&self) -> RattleStats {
        let mut stats = RattleStats::default();
        for m in &self.methods {
            stats.merge(&m.rattle_stats());
        }
        stats
    }
}

fn check_dt(dt: f64) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(MdError::InvalidParameter(format!("dt must be positive, got {dt}")))
    }
}
