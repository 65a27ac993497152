//! Langevin dynamics, optionally constrained with RATTLE.

use super::{
    Constraint, IntegrationMethod, Thermostat, angular_step_one, angular_step_two,
    fold_constraint_force, translational_dof, verlet_step_one, verlet_step_two,
};
use crate::comm::Communicator;
use crate::random::{self, RngStream};
use crate::rattle::{RattleStats, tangential};
use crate::{MdError, ParticleData, ParticleGroup, Result, Variant, rotation};
use phyz_manifold::{AnyManifold, Manifold};
use phyz_math::{BoxDim, Vec3};

/// Langevin integration of a particle group.
///
/// Step one is a plain velocity-Verlet half step. Step two adds the drag
/// `-γ v` and a uniform random force of amplitude `sqrt(6 γ T / Δt)` to the
/// net force before finishing the velocity. On a manifold the random force
/// is projected onto the tangent plane first.
///
/// With tallying enabled the energy exchanged with the heat bath is
/// accumulated and exposed as `<name>_reservoir_energy`.
#[derive(Debug, Clone)]
pub struct TwoStepLangevin<M = AnyManifold> {
    name: String,
    group: ParticleGroup,
    dt: f64,
    aniso: bool,
    constraint: Option<Constraint<M>>,
    thermostat: Thermostat,
    tally: bool,
    reservoir_energy: f64,
    extra_energy_over_dt: f64,
    stats: RattleStats,
}

impl TwoStepLangevin<AnyManifold> {
    pub fn new(group: ParticleGroup, thermostat: Thermostat) -> Self {
        Self::build(group, None, thermostat)
    }
}

impl<M: Manifold> TwoStepLangevin<M> {
    pub fn with_manifold(
        group: ParticleGroup,
        constraint: Constraint<M>,
        thermostat: Thermostat,
    ) -> Self {
        Self::build(group, Some(constraint), thermostat)
    }

    fn build(group: ParticleGroup, constraint: Option<Constraint<M>>, thermostat: Thermostat) -> Self {
        Self {
            name: "langevin".to_string(),
            group,
            dt: 0.0,
            aniso: false,
            constraint,
            thermostat,
            tally: false,
            reservoir_energy: 0.0,
            extra_energy_over_dt: 0.0,
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

    /// Enable or disable the reservoir energy tally.
    pub fn set_tally(&mut self, tally: bool) {
        self.tally = tally;
    }

    /// Energy handed to the heat bath so far, including the half-step
    /// estimate of the current step.
    pub fn reservoir_energy(&self) -> f64 {
        self.reservoir_energy + self.extra_energy_over_dt * self.dt
    }

    fn log_name(&self) -> String {
        format!("{}_reservoir_energy", self.name)
    }

    /// Random body-frame torque minus rotational drag, in the lab frame.
    fn bath_torque(&self, pdata: &ParticleData, i: usize, temperature: f64, timestep: u64) -> Vec3 {
        let gamma_r = self.thermostat.gamma_r_of(pdata, i);
        if gamma_r.iter().all(|g| *g <= 0.0) {
            return Vec3::zeros();
        }
        let q = pdata.orientation[i];
        let inertia = pdata.inertia[i];
        let s = rotation::body_angular_momentum(&q, &pdata.angmom[i]);
        let sigma = self.thermostat.torque_sigma(&gamma_r, temperature, self.dt);

        let mut rng = random::particle_rng(
            self.thermostat.seed,
            RngStream::Rotational,
            pdata.tag[i],
            timestep,
        );
        let noise = Vec3::new(
            random::normal(&mut rng, sigma.x),
            random::normal(&mut rng, sigma.y),
            random::normal(&mut rng, sigma.z),
        );

        let mut torque = Vec3::zeros();
        for (d, zero) in rotation::degenerate_axes(&inertia).into_iter().enumerate() {
            if !zero {
                torque[d] = noise[d] - gamma_r[d] * s[d] / inertia[d];
            }
        }
        q.rotate(&torque)
    }
}

impl<M: Manifold> IntegrationMethod for TwoStepLangevin<M> {
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
        let dt = self.dt;
        self.stats = RattleStats::default();

        for i in &self.group {
            let dx = verlet_step_one(pdata, i, dt, self.constraint.as_ref(), &mut self.stats);
            pdata.pos[i] += dx;
            pdata.wrap(i);
        }

        if self.aniso {
            angular_step_one(&self.group, pdata, dt);
        }

        self.stats.log(&self.name, "step one", timestep);
        Ok(())
    }

    fn integrate_step_two(
        &mut self,
        timestep: u64,
        pdata: &mut ParticleData,
        comm: &dyn Communicator,
    ) -> Result<()> {
        let dt = self.dt;
        let temperature = self.thermostat.temperature.value(timestep);
        let dims = pdata.dimensions();
        self.stats = RattleStats::default();
        let mut energy_transfer = 0.0;

        for i in &self.group {
            let mut rng = random::particle_rng(
                self.thermostat.seed,
                RngStream::Langevin,
                pdata.tag[i],
                timestep,
            );
            let gamma = self.thermostat.gamma_of(pdata, i);
            let coeff = self.thermostat.force_coefficient(gamma, temperature, dt);

            let mut r = if temperature > 0.0 {
                random::uniform_vec(&mut rng, dims)
            } else {
                Vec3::zeros()
            };
            if let Some(c) = &self.constraint {
                r = tangential(&r, &c.manifold.gradient(&pdata.pos[i]));
            }

            let bd_force = r * coeff - gamma * pdata.vel[i];
            let accel = (pdata.net.force[i] + bd_force) / pdata.mass[i];
            pdata.accel[i] = accel;
            verlet_step_two(pdata, i, accel, dt, self.constraint.as_ref(), &mut self.stats);

            if self.tally {
                energy_transfer += bd_force.dot(&pdata.vel[i]);
            }

            if self.aniso {
                let torque = self.bath_torque(pdata, i, temperature, timestep);
                pdata.net.torque[i] += torque;
            }
        }

        if self.aniso {
            angular_step_two(&self.group, pdata, dt);
        }

        if self.tally {
            let energy_transfer = comm.all_reduce_sum(energy_transfer);
            self.reservoir_energy -= energy_transfer * dt;
            self.extra_energy_over_dt = 0.5 * energy_transfer;
        }

        self.stats.log(&self.name, "step two", timestep);
        Ok(())
    }

    fn include_constraint_force(&mut self, _timestep: u64, pdata: &mut ParticleData) -> Result<()> {
        let Some(constraint) = &self.constraint else {
            return Ok(());
        };
        let dt = self.dt;
        fold_constraint_force(constraint, &self.group, pdata, dt, &mut self.stats, |pd, i| {
            (pd.vel[i] + 0.5 * dt * pd.accel[i], 0.5 * dt / pd.mass[i])
        });
        Ok(())
    }

    /// Diameter-scaled friction must be positive for every particle.
    fn validate(&self, pdata: &ParticleData) -> Result<()> {
        if let super::Gamma::DiameterScale(lambda) = self.thermostat.gamma {
            if pdata.diameter.iter().any(|d| lambda * d <= 0.0) {
                return Err(MdError::InvalidParameter(
                    "diameter-scaled gamma must be positive for every particle".into(),
                ));
            }
        }
        Ok(())
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

    fn log_value(&self, quantity: &str) -> Option<f64> {
        (self.tally && quantity == self.log_name()).then(|| self.reservoir_energy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particle;
    use crate::comm::SingleRank;
    use approx::assert_relative_eq;
    use phyz_manifold::Sphere;
    use phyz_math::Quat;

    fn gas(n: usize) -> ParticleData {
        let mut pdata = ParticleData::new(BoxDim::cube(50.0));
        for i in 0..n {
            let x = Vec3::new(i as f64 - n as f64 / 2.0, 0.0, 0.0);
            pdata.add_particle(Particle::new(x, Vec3::zeros(), 1.0, 0));
        }
        pdata
    }

    fn step<M: Manifold>(m: &mut TwoStepLangevin<M>, pdata: &mut ParticleData, t: u64) {
        m.integrate_step_one(t, pdata).unwrap();
        m.integrate_step_two(t, pdata, &SingleRank).unwrap();
    }

    #[test]
    fn test_zero_temperature_is_pure_drag() {
        let mut pdata = gas(1);
        pdata.vel[0] = Vec3::new(1.0, 0.0, 0.0);
        let mut thermostat = Thermostat::new(0.0, 1);
        thermostat.set_gamma(0, 2.0).unwrap();
        let mut m = TwoStepLangevin::new(ParticleGroup::all(&pdata), thermostat);
        m.set_delta_t(0.01);
        step(&mut m, &mut pdata, 0);
        // drag acts on the half-step velocity
        assert_relative_eq!(pdata.vel[0].x, 1.0 - 0.005 * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_thermalizes_to_set_point() {
        let mut pdata = gas(200);
        let mut m = TwoStepLangevin::new(ParticleGroup::all(&pdata), Thermostat::new(1.5, 42));
        m.set_delta_t(0.005);
        let mut ke = 0.0;
        let mut samples = 0;
        for t in 0..4000 {
            step(&mut m, &mut pdata, t);
            if t >= 2000 && t % 10 == 0 {
                ke += (0..pdata.n()).map(|i| pdata.kinetic_energy(i)).sum::<f64>();
                samples += 1;
            }
        }
        let temperature = 2.0 * ke / samples as f64 / (3.0 * pdata.n() as f64);
        assert_relative_eq!(temperature, 1.5, max_relative = 0.1);
    }

    #[test]
    fn test_noise_is_tangent_on_sphere() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        pdata.add_particle(Particle::new(Vec3::new(0.0, 0.0, 2.0), Vec3::zeros(), 1.0, 0));
        let sphere = Sphere::new(2.0, Vec3::zeros());
        let mut m = TwoStepLangevin::with_manifold(
            ParticleGroup::all(&pdata),
            Constraint::new(sphere, 1e-9),
            Thermostat::new(1.0, 3),
        );
        m.set_delta_t(0.002);
        for t in 0..50 {
            step(&mut m, &mut pdata, t);
            let x = pdata.pos[0];
            assert!(sphere.implicit_function(&x).abs() < 1e-6);
            assert!(pdata.vel[0].dot(&x.normalize()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tally_tracks_bath_energy() {
        let mut pdata = gas(1);
        pdata.vel[0] = Vec3::new(2.0, 0.0, 0.0);
        let mut m = TwoStepLangevin::new(ParticleGroup::all(&pdata), Thermostat::new(0.0, 0));
        m.set_delta_t(0.001);
        m.set_tally(true);
        let e0 = pdata.kinetic_energy(0);
        for t in 0..1000 {
            step(&mut m, &mut pdata, t);
        }
        // pure drag: energy lost by the particle ends up in the reservoir
        let lost = e0 - pdata.kinetic_energy(0);
        assert_relative_eq!(m.reservoir_energy(), lost, max_relative = 1e-2);
        assert_eq!(m.log_value("langevin_reservoir_energy"), Some(m.reservoir_energy()));
        assert_eq!(m.log_value("other"), None);
    }

    #[test]
    fn test_rotational_drag_slows_spin() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0).with_rotation(
            Quat::identity(),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ));
        let mut thermostat = Thermostat::new(0.0, 0);
        thermostat.set_gamma_r(0, Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let mut m = TwoStepLangevin::new(ParticleGroup::all(&pdata), thermostat);
        m.set_delta_t(0.01);
        m.set_anisotropic(true);
        for t in 0..100 {
            pdata.net.torque[0] = Vec3::zeros();
            step(&mut m, &mut pdata, t);
        }
        let l = rotation::body_angular_momentum(&pdata.orientation[0], &pdata.angmom[0]);
        // dL/dt = -γ_r L / I, so L(1) ≈ e^-1
        assert_relative_eq!(l.z, (-1.0f64).exp(), max_relative = 0.02);
    }
}
