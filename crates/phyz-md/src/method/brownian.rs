//! Overdamped Brownian dynamics, optionally constrained with RATTLE.

use super::{Constraint, IntegrationMethod, Thermostat, fold_constraint_force, translational_dof};
use crate::comm::Communicator;
use crate::random::{self, RngStream};
use crate::rattle::{self, RattleStats, tangential};
use crate::{ParticleData, ParticleGroup, Result, Variant, rotation};
use phyz_manifold::{AnyManifold, Manifold};
use phyz_math::{BoxDim, Vec3};

/// Brownian integration of a particle group.
///
/// All motion happens in step one: `Δx = Δt (F + F_R) / γ` with a uniform
/// random force of amplitude `sqrt(6 γ T / Δt)`. Velocities carry no dynamics
/// and are redrawn from the Maxwell-Boltzmann distribution every step so the
/// kinetic temperature reads `T`. Step two does nothing.
#[derive(Debug, Clone)]
pub struct TwoStepBrownian<M = AnyManifold> {
    name: String,
    group: ParticleGroup,
    dt: f64,
    aniso: bool,
    constraint: Option<Constraint<M>>,
    thermostat: Thermostat,
    stats: RattleStats,
}

impl TwoStepBrownian<AnyManifold> {
    pub fn new(group: ParticleGroup, thermostat: Thermostat) -> Self {
        Self::build(group, None, thermostat)
    }
}

impl<M: Manifold> TwoStepBrownian<M> {
    pub fn with_manifold(
        group: ParticleGroup,
        constraint: Constraint<M>,
        thermostat: Thermostat,
    ) -> Self {
        Self::build(group, Some(constraint), thermostat)
    }

    fn build(group: ParticleGroup, constraint: Option<Constraint<M>>, thermostat: Thermostat) -> Self {
        Self {
            name: "brownian".to_string(),
            group,
            dt: 0.0,
            aniso: false,
            constraint,
            thermostat,
            stats: RattleStats::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn thermostat(&self) -> &Thermostat {
        &self.thermostat
    }

    pub fn thermostat_mut(&mut self) -> &mut Thermostat {
        &mut self.thermostat
    }

    pub fn set_temperature(&mut self, temperature: impl Into<Variant>) {
        self.thermostat.temperature = temperature.into();
    }

    fn translate(&mut self, pdata: &mut ParticleData, i: usize, temperature: f64, timestep: u64) {
        let dt = self.dt;
        let dims = pdata.dimensions();
        let tag = pdata.tag[i];
        let gamma = self.thermostat.gamma_of(pdata, i);
        let coeff = self.thermostat.force_coefficient(gamma, temperature, dt);

        let mut rng = random::particle_rng(self.thermostat.seed, RngStream::Brownian, tag, timestep);
        let mut r = random::uniform_vec(&mut rng, dims);
        if let Some(c) = &self.constraint {
            r = tangential(&r, &c.manifold.gradient(&pdata.pos[i]));
        }
        let drift = (pdata.net.force[i] + coeff * r) / gamma;

        let x0 = pdata.pos[i];
        pdata.pos[i] = match &self.constraint {
            Some(c) => {
                let pr = rattle::project_position(&c.manifold, x0, drift, 1.0 / gamma, dt, c.tolerance);
                self.stats.record(pr.iterations, pr.converged);
                pr.position
            }
            None => x0 + dt * drift,
        };

        let sigma = if temperature > 0.0 {
            (temperature / pdata.mass[i]).sqrt()
        } else {
            0.0
        };
        let mut vel_rng =
            random::particle_rng(self.thermostat.seed, RngStream::BrownianVelocity, tag, timestep);
        let mut v = Vec3::new(
            random::normal(&mut vel_rng, sigma),
            random::normal(&mut vel_rng, sigma),
            random::normal(&mut vel_rng, sigma),
        );
        if dims == 2 {
            v.z = 0.0;
        }
        if let Some(c) = &self.constraint {
            v = tangential(&v, &c.manifold.gradient(&pdata.pos[i]));
        }
        pdata.vel[i] = v;
        pdata.wrap(i);
    }

    fn rotate(&self, pdata: &mut ParticleData, i: usize, temperature: f64, timestep: u64) {
        let dt = self.dt;
        let q = pdata.orientation[i];
        let inertia = pdata.inertia[i];
        let gamma_r = self.thermostat.gamma_r_of(pdata, i);
        let sigma = self.thermostat.torque_sigma(&gamma_r, temperature, dt);
        let t_body = rotation::body_torque(&q, &pdata.net.torque[i], &inertia);
        let zero = rotation::degenerate_axes(&inertia);

        let mut rng = random::particle_rng(
            self.thermostat.seed,
            RngStream::Rotational,
            pdata.tag[i],
            timestep,
        );

        let mut omega = Vec3::zeros();
        for d in 0..3 {
            let noise = random::normal(&mut rng, sigma[d]);
            if !zero[d] && gamma_r[d] > 0.0 {
                omega[d] = (t_body[d] + noise) / gamma_r[d];
            }
        }

        let mut q = q;
        let mut p = rotation::angmom_from_body(&q, &inertia.component_mul(&omega));
        rotation::free_rotate(&mut q, &mut p, &inertia, dt);

        let mut l_body = Vec3::zeros();
        for d in 0..3 {
            let s = if temperature > 0.0 {
                (inertia[d] * temperature).sqrt()
            } else {
                0.0
            };
            let draw = random::normal(&mut rng, s);
            if !zero[d] {
                l_body[d] = draw;
            }
        }

        pdata.orientation[i] = q;
        pdata.angmom[i] = rotation::angmom_from_body(&q, &l_body);
    }
}

impl<M: Manifold> IntegrationMethod for TwoStepBrownian<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn group(&self) -> &ParticleGroup {
        &self.group
    }

    fn delta_t(&self) -> f64 {
        self.dt
    }

    fn set_delta_t(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn set_anisotropic(&mut self, aniso: bool) {
        self.aniso = aniso;
    }

    fn integrate_step_one(&mut self, timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let temperature = self.thermostat.temperature.value(timestep);
        self.stats = RattleStats::default();

        let members = self.group.members().to_vec();
        for i in members {
            self.translate(pdata, i, temperature, timestep);
            if self.aniso {
                self.rotate(pdata, i, temperature, timestep);
            }
        }

        self.stats.log(&self.name, "step one", timestep);
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

    fn include_constraint_force(&mut self, _timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let Some(constraint) = &self.constraint else {
            return Ok(());
        };
        let thermostat = &self.thermostat;
        fold_constraint_force(constraint, &self.group, pdata, self.dt, &mut self.stats, |pd, i| {
            let gamma = thermostat.gamma_of(pd, i);
            (pd.net.force[i] / gamma, 1.0 / gamma)
        });
        Ok(())
    }

    /// Overdamped motion divides by γ.
    fn validate(&self, pdata: &ParticleData) -> Result<()> {
        self.thermostat.require_friction(pdata, &self.group)
    }

    fn check_box(&self, sim_box: &BoxDim) -> Result<()> {
        match &self.constraint {
            Some(c) => c.check_box(sim_box),
            None => Ok(()),
        }
    }

    fn on_box_change(&mut self, sim_box: &BoxDim) -> Result<()> {
        match &mut self.constraint {
            Some(c) => c.on_box_change(sim_box),
            None => Ok(()),
        }
    }

    fn on_num_types_change(&mut self, n_types: usize) {
        self.thermostat.resize(n_types);
    }

    fn translational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64 {
        translational_dof(&self.group, query, pdata, &self.constraint)
    }

    fn rattle_stats(&self) -> RattleStats {
        self.stats
    }
}
