//! GPU-backed NVE, Langevin and Brownian methods.
//!
//! Particle state stays in the host [`ParticleData`]. Each sub-step packs
//! the group into [`GpuParticle`] records, runs one kernel across all
//! devices and copies back only the fields that kernel writes.

use crate::buffers::{
    FLAG_ANISO, FLAG_CONSTRAINED, FLAG_LIMIT, FLAG_NOISELESS_R, FLAG_NOISELESS_T, FLAG_OVERDAMPED,
    FLAG_ZERO_FORCE, GpuParticle, StepParams, Writeback,
};
use crate::context::GpuContext;
use crate::launch::{GpuLauncher, Kernel};
use crate::shaders;
use phyz_manifold::{AnyManifold, Manifold, Plane};
use phyz_md::method::translational_dof;
use phyz_md::{
    Communicator, Constraint, IntegrationMethod, ParticleData, ParticleGroup, Result, Thermostat,
    Variant,
};
use phyz_math::{BoxDim, Vec3};

/// State shared by every GPU method.
struct GpuCore<M> {
    name: String,
    group: ParticleGroup,
    dt: f64,
    aniso: bool,
    constraint: Option<Constraint<M>>,
    launcher: GpuLauncher,
}

impl<M: Manifold> GpuCore<M> {
    fn new(
        ctx: &GpuContext,
        name: &str,
        group: ParticleGroup,
        constraint: Option<Constraint<M>>,
    ) -> Result<Self> {
        let (src, params) = match &constraint {
            Some(c) => {
                c.validate()?;
                (c.manifold.wgsl_source(), c.manifold.gpu_params())
            }
            None => {
                let plane = Plane::new(0.0);
                (plane.wgsl_source(), plane.gpu_params())
            }
        };
        let launcher = GpuLauncher::new(ctx, group.len(), &shaders::module_source(src), params)?;
        Ok(Self {
            name: name.to_string(),
            group,
            dt: 0.0,
            aniso: false,
            constraint,
            launcher,
        })
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.constraint.is_some() {
            flags |= FLAG_CONSTRAINED;
        }
        if self.aniso {
            flags |= FLAG_ANISO;
        }
        flags
    }

    fn params(&self, pdata: &ParticleData, timestep: u64, extra_flags: u32) -> StepParams {
        let tolerance = self.constraint.as_ref().map_or(0.0, |c| c.tolerance);
        StepParams::new(pdata.dimensions(), self.dt, timestep, self.flags() | extra_flags)
            .with_tolerance(tolerance)
    }

    /// Pack the group, run `kernel`, unpack its outputs and wrap moved
    /// particles back into the box.
    fn launch(
        &self,
        kernel: Kernel,
        params: StepParams,
        pdata: &mut ParticleData,
        friction: impl Fn(&ParticleData, usize) -> (f64, Vec3),
    ) -> Result<Vec<GpuParticle>> {
        let mut records: Vec<GpuParticle> = self
            .group
            .iter()
            .map(|i| {
                let (gamma, gamma_r) = friction(pdata, i);
                GpuParticle::pack(pdata, i, gamma, gamma_r)
            })
            .collect();

        if records.is_empty() {
            return Ok(records);
        }
        self.launcher.run(kernel, params, &mut records)?;

        let writes = kernel.writes(self.aniso);
        for (rec, i) in records.iter().zip(self.group.iter()) {
            rec.unpack(pdata, i, writes);
            if writes.contains(Writeback::POSITION) {
                pdata.wrap(i);
            }
        }
        Ok(records)
    }

    fn check_box(&self, sim_box: &BoxDim) -> Result<()> {
        match &self.constraint {
            Some(c) => c.check_box(sim_box),
            None => Ok(()),
        }
    }

    fn on_box_change(&mut self, sim_box: &BoxDim) -> Result<()> {
        if let Some(c) = &mut self.constraint {
            c.on_box_change(sim_box)?;
            self.launcher.set_manifold(c.manifold.gpu_params());
        }
        Ok(())
    }
}

fn frictionless(_: &ParticleData, _: usize) -> (f64, Vec3) {
    (0.0, Vec3::zeros())
}

fn thermostat_flags(thermostat: &Thermostat) -> u32 {
    let mut flags = 0;
    if thermostat.noiseless_t {
        flags |= FLAG_NOISELESS_T;
    }
    if thermostat.noiseless_r {
        flags |= FLAG_NOISELESS_R;
    }
    flags
}

macro_rules! delegate_core {
    () => {
        fn name(&self) -> &str {
            &self.core.name
        }

        fn group(&self) -> &ParticleGroup {
            &self.core.group
        }

        fn delta_t(&self) -> f64 {
            self.core.dt
        }

        fn set_delta_t(&mut self, dt: f64) {
            self.core.dt = dt;
        }

        fn set_anisotropic(&mut self, aniso: bool) {
            self.core.aniso = aniso;
        }

        fn check_box(&self, sim_box: &BoxDim) -> Result<()> {
            self.core.check_box(sim_box)
        }

        fn on_box_change(&mut self, sim_box: &BoxDim) -> Result<()> {
            self.core.on_box_change(sim_box)
        }

        fn translational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64 {
            translational_dof(&self.core.group, query, pdata, &self.core.constraint)
        }
    };
}

/// NVE on the GPU. Same options as [`phyz_md::TwoStepNve`].
pub struct GpuTwoStepNve<M = AnyManifold> {
    core: GpuCore<M>,
    limit: Option<f64>,
    zero_force: bool,
}

impl GpuTwoStepNve<AnyManifold> {
    pub fn new(ctx: &GpuContext, group: ParticleGroup) -> Result<Self> {
        Self::build(ctx, group, None)
    }
}

impl<M: Manifold> GpuTwoStepNve<M> {
    pub fn with_manifold(ctx: &GpuContext, group: ParticleGroup, constraint: Constraint<M>) -> Result<Self> {
        Self::build(ctx, group, Some(constraint))
    }

    fn build(ctx: &GpuContext, group: ParticleGroup, constraint: Option<Constraint<M>>) -> Result<Self> {
        Ok(Self {
            core: GpuCore::new(ctx, "nve_gpu", group, constraint)?,
            limit: None,
            zero_force: false,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.core.name = name.into();
        self
    }

    pub fn set_limit(&mut self, limit: Option<f64>) {
        self.limit = limit;
    }

    pub fn set_zero_force(&mut self, zero_force: bool) {
        self.zero_force = zero_force;
    }

    fn extra_flags(&self) -> u32 {
        let mut flags = 0;
        if self.limit.is_some() {
            flags |= FLAG_LIMIT;
        }
        if self.zero_force {
            flags |= FLAG_ZERO_FORCE;
        }
        flags
    }
}

impl<M: Manifold> IntegrationMethod for GpuTwoStepNve<M> {
    delegate_core!();

    fn integrate_step_one(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let params = self
            .core
            .params(pdata, timestep, self.extra_flags())
            .with_limit(self.limit.unwrap_or(0.0));
        self.core.launch(Kernel::NveStepOne, params, pdata, frictionless)?;
        if self.core.aniso {
            self.core.launch(Kernel::AngularStepOne, params, pdata, frictionless)?;
        }
        Ok(())
    }

    fn integrate_step_two(
        &mut self,
        timestep: u64,
        pdata: &mut ParticleData,
        _comm: &dyn Communicator,
    ) -> Result<()> {
        let params = self
            .core
            .params(pdata, timestep, self.extra_flags())
            .with_limit(self.limit.unwrap_or(0.0));
        self.core.launch(Kernel::NveStepTwo, params, pdata, frictionless)?;
        if self.core.aniso {
            self.core.launch(Kernel::AngularStepTwo, params, pdata, frictionless)?;
        }
        Ok(())
    }

    fn include_constraint_force(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        if self.core.constraint.is_none() {
            return Ok(());
        }
        let params = self.core.params(pdata, timestep, 0);
        self.core
            .launch(Kernel::IncludeConstraintForce, params, pdata, frictionless)?;
        Ok(())
    }

    fn is_momentum_conserving(&self) -> bool {
        self.core.constraint.is_none()
    }
}

/// Langevin dynamics on the GPU. Same thermostat as
/// [`phyz_md::TwoStepLangevin`]; the random stream is PCG-based, so
/// trajectories match the CPU method statistically rather than bitwise.
pub struct GpuTwoStepLangevin<M = AnyManifold> {
    core: GpuCore<M>,
    thermostat: Thermostat,
    tally: bool,
    reservoir_energy: f64,
    extra_energy_over_dt: f64,
}

impl GpuTwoStepLangevin<AnyManifold> {
    pub fn new(ctx: &GpuContext, group: ParticleGroup, thermostat: Thermostat) -> Result<Self> {
        Self::build(ctx, group, None, thermostat)
    }
}

impl<M: Manifold> GpuTwoStepLangevin<M> {
    pub fn with_manifold(
        ctx: &GpuContext,
        group: ParticleGroup,
        constraint: Constraint<M>,
        thermostat: Thermostat,
    ) -> Result<Self> {
        Self::build(ctx, group, Some(constraint), thermostat)
    }

    fn build(
        ctx: &GpuContext,
        group: ParticleGroup,
        constraint: Option<Constraint<M>>,
        thermostat: Thermostat,
    ) -> Result<Self> {
        Ok(Self {
            core: GpuCore::new(ctx, "langevin_gpu", group, constraint)?,
            thermostat,
            tally: false,
            reservoir_energy: 0.0,
            extra_energy_over_dt: 0.0,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.core.name = name.into();
        self
    }

    pub fn thermostat_mut(&mut self) -> &mut Thermostat {
        &mut self.thermostat
    }

    pub fn set_temperature(&mut self, temperature: impl Into<Variant>) {
        self.thermostat.temperature = temperature.into();
    }

    pub fn set_tally(&mut self, tally: bool) {
        self.tally = tally;
    }

    pub fn reservoir_energy(&self) -> f64 {
        self.reservoir_energy + self.extra_energy_over_dt * self.core.dt
    }
}

impl<M: Manifold> IntegrationMethod for GpuTwoStepLangevin<M> {
    delegate_core!();

    fn integrate_step_one(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let params = self.core.params(pdata, timestep, 0);
        self.core.launch(Kernel::NveStepOne, params, pdata, frictionless)?;
        if self.core.aniso {
            self.core.launch(Kernel::AngularStepOne, params, pdata, frictionless)?;
        }
        Ok(())
    }

    fn integrate_step_two(
        &mut self,
        timestep: u64,
        pdata: &mut ParticleData,
        comm: &dyn Communicator,
    ) -> Result<()> {
        let temperature = self.thermostat.temperature.value(timestep);
        let params = self
            .core
            .params(pdata, timestep, thermostat_flags(&self.thermostat))
            .with_seed(self.thermostat.seed)
            .with_temperature(temperature);

        let thermostat = &self.thermostat;
        let records = self.core.launch(Kernel::LangevinStepTwo, params, pdata, |pd, i| {
            (thermostat.gamma_of(pd, i), thermostat.gamma_r_of(pd, i))
        })?;
        if self.core.aniso {
            self.core.launch(Kernel::AngularStepTwo, params, pdata, frictionless)?;
        }

        if self.tally {
            let local: f64 = records.iter().map(GpuParticle::bath_power).sum();
            let energy_transfer = comm.all_reduce_sum(local);
            self.reservoir_energy -= energy_transfer * self.core.dt;
            self.extra_energy_over_dt = 0.5 * energy_transfer;
        }
        Ok(())
    }

    fn include_constraint_force(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        if self.core.constraint.is_none() {
            return Ok(());
        }
        let params = self.core.params(pdata, timestep, 0);
        self.core
            .launch(Kernel::IncludeConstraintForce, params, pdata, frictionless)?;
        Ok(())
    }

    fn on_num_types_change(&mut self, n_types: usize) {
        self.thermostat.resize(n_types);
    }

    fn log_value(&self, quantity: &str) -> Option<f64> {
        let own = format!("{}_reservoir_energy", self.core.name);
        (self.tally && quantity == own).then(|| self.reservoir_energy())
    }
}

/// Brownian dynamics on the GPU. Same thermostat as
/// [`phyz_md::TwoStepBrownian`].
pub struct GpuTwoStepBrownian<M = AnyManifold> {
    core: GpuCore<M>,
    thermostat: Thermostat,
}

impl GpuTwoStepBrownian<AnyManifold> {
    pub fn new(ctx: &GpuContext, group: ParticleGroup, thermostat: Thermostat) -> Result<Self> {
        Self::build(ctx, group, None, thermostat)
    }
}

impl<M: Manifold> GpuTwoStepBrownian<M> {
    pub fn with_manifold(
        ctx: &GpuContext,
        group: ParticleGroup,
        constraint: Constraint<M>,
        thermostat: Thermostat,
    ) -> Result<Self> {
        Self::build(ctx, group, Some(constraint), thermostat)
    }

    fn build(
        ctx: &GpuContext,
        group: ParticleGroup,
        constraint: Option<Constraint<M>>,
        thermostat: Thermostat,
    ) -> Result<Self> {
        Ok(Self {
            core: GpuCore::new(ctx, "brownian_gpu", group, constraint)?,
            thermostat,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.core.name = name.into();
        self
    }

    pub fn thermostat_mut(&mut self) -> &mut Thermostat {
        &mut self.thermostat
    }

    pub fn set_temperature(&mut self, temperature: impl Into<Variant>) {
        self.thermostat.temperature = temperature.into();
    }
}

impl<M: Manifold> IntegrationMethod for GpuTwoStepBrownian<M> {
    delegate_core!();

    fn validate(&self, pdata: &ParticleData) -> Result<()> {
        self.thermostat.require_friction(pdata, &self.core.group)
    }

    fn integrate_step_one(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let temperature = self.thermostat.temperature.value(timestep);
        let params = self
            .core
            .params(pdata, timestep, thermostat_flags(&self.thermostat))
            .with_seed(self.thermostat.seed)
            .with_temperature(temperature);

        let thermostat = &self.thermostat;
        self.core.launch(Kernel::BrownianStepOne, params, pdata, |pd, i| {
            (thermostat.gamma_of(pd, i), thermostat.gamma_r_of(pd, i))
        })?;
        Ok(())
    }

    fn integrate_step_two(
        &mut self,
        _timestep: u64,
        _pdata: &mut ParticleData,
        _comm: &dyn Communicator,
    ) -> Result<()> {
        Ok(())
    }

    fn include_constraint_force(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        if self.core.constraint.is_none() {
            return Ok(());
        }
        let params = self.core.params(pdata, timestep, FLAG_OVERDAMPED);
        let thermostat = &self.thermostat;
        self.core
            .launch(Kernel::IncludeConstraintForce, params, pdata, |pd, i| {
                (thermostat.gamma_of(pd, i), Vec3::zeros())
            })?;
        Ok(())
    }

    fn on_num_types_change(&mut self, n_types: usize) {
        self.thermostat.resize(n_types);
    }
}
