//! Microcanonical velocity Verlet, optionally constrained with RATTLE.

use super::{
    Constraint, IntegrationMethod, angular_step_one, angular_step_two, fold_constraint_force,
    translational_dof, verlet_step_one, verlet_step_two,
};
use crate::comm::Communicator;
use crate::rattle::RattleStats;
use crate::{ParticleData, ParticleGroup, Result};
use phyz_manifold::{AnyManifold, Manifold};
use phyz_math::{BoxDim, Vec3};

/// NVE integration of a particle group.
///
/// With a limit set, no particle moves further than `limit` in one step and
/// speeds are clamped to `limit / Δt` after the second half. With
/// `zero_force`, accelerations are ignored (particles coast).
#[derive(Debug, Clone)]
pub struct TwoStepNve<M = AnyManifold> {
    name: String,
    group: ParticleGroup,
    dt: f64,
    aniso: bool,
    constraint: Option<Constraint<M>>,
    limit: Option<f64>,
    zero_force: bool,
    stats: RattleStats,
}

impl TwoStepNve<AnyManifold> {
    /// Unconstrained NVE.
    pub fn new(group: ParticleGroup) -> Self {
        Self::build(group, None)
    }
}

impl<M: Manifold> TwoStepNve<M> {
    /// NVE confined to `constraint`.
    pub fn with_manifold(group: ParticleGroup, constraint: Constraint<M>) -> Self {
        Self::build(group, Some(constraint))
    }

    fn build(group: ParticleGroup, constraint: Option<Constraint<M>>) -> Self {
        Self {
            name: "nve".to_string(),
            group,
            dt: 0.0,
            aniso: false,
            constraint,
            limit: None,
            zero_force: false,
            stats: RattleStats::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Maximum displacement per step. `None` removes the limit.
    pub fn set_limit(&mut self, limit: Option<f64>) {
        self.limit = limit;
    }

    pub fn limit(&self) -> Option<f64> {
        self.limit
    }

    pub fn set_zero_force(&mut self, zero_force: bool) {
        self.zero_force = zero_force;
    }

    pub fn constraint(&self) -> Option<&Constraint<M>> {
        self.constraint.as_ref()
    }
}

impl<M: Manifold> IntegrationMethod for TwoStepNve<M> {
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
            if self.zero_force {
                pdata.accel[i] = Vec3::zeros();
            }
            let mut dx = verlet_step_one(pdata, i, dt, self.constraint.as_ref(), &mut self.stats);

            if let Some(limit) = self.limit {
                let len = dx.norm();
                if len > limit {
                    dx *= limit / len;
                }
            }
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
        _comm: &dyn Communicator,
    ) -> Result<()> {
        let dt = self.dt;
        self.stats = RattleStats::default();

        for i in &self.group {
            let accel = if self.zero_force {
                Vec3::zeros()
            } else {
                pdata.net.force[i] / pdata.mass[i]
            };
            pdata.accel[i] = accel;
            verlet_step_two(pdata, i, accel, dt, self.constraint.as_ref(), &mut self.stats);

            if let Some(limit) = self.limit {
                let speed = pdata.vel[i].norm();
                if speed * dt > limit {
                    pdata.vel[i] *= limit / (dt * speed);
                }
            }
        }

        if self.aniso {
            angular_step_two(&self.group, pdata, dt);
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

    fn is_momentum_conserving(&self) -> bool {
        self.constraint.is_none()
    }

    fn translational_dof(&self, query: &ParticleGroup, pdata: &ParticleData) -> f64 {
        translational_dof(&self.group, query, pdata, &self.constraint)
    }

    fn rattle_stats(&self) -> RattleStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particle;
    use crate::comm::SingleRank;
    use approx::assert_relative_eq;
    use phyz_manifold::Sphere;

    fn single(x: Vec3, v: Vec3) -> ParticleData {
        let mut pdata = ParticleData::new(BoxDim::cube(20.0));
        pdata.add_particle(Particle::new(x, v, 1.0, 0));
        pdata
    }

    fn step<M: Manifold>(nve: &mut TwoStepNve<M>, pdata: &mut ParticleData, t: u64) {
        nve.integrate_step_one(t, pdata).unwrap();
        nve.integrate_step_two(t, pdata, &SingleRank).unwrap();
    }

    #[test]
    fn test_free_flight() {
        let mut pdata = single(Vec3::zeros(), Vec3::new(1.0, 2.0, 0.0));
        let mut nve = TwoStepNve::new(ParticleGroup::all(&pdata));
        nve.set_delta_t(0.1);
        step(&mut nve, &mut pdata, 0);
        assert_relative_eq!(pdata.pos[0].x, 0.1, epsilon = 1e-14);
        assert_relative_eq!(pdata.pos[0].y, 0.2, epsilon = 1e-14);
        assert!(nve.is_momentum_conserving());
    }

    #[test]
    fn test_sphere_single_step_stays_on_surface() {
        let r = 2.0;
        let eta = 1e-6;
        let mut pdata = single(Vec3::new(r, 0.0, 0.0), Vec3::new(0.0, 0.7, 0.3));
        let sphere = Sphere::new(r, Vec3::zeros());
        let mut nve =
            TwoStepNve::with_manifold(ParticleGroup::all(&pdata), Constraint::new(sphere, eta));
        nve.set_delta_t(0.005);
        step(&mut nve, &mut pdata, 0);

        let x = pdata.pos[0];
        assert!((x.norm() - r).abs() <= eta);
        assert!(pdata.vel[0].dot(&(x / x.norm())).abs() <= eta);
        assert!(!nve.is_momentum_conserving());
        assert_eq!(nve.rattle_stats().unconverged, 0);
    }

    #[test]
    fn test_displacement_and_speed_limit() {
        let mut pdata = single(Vec3::zeros(), Vec3::new(100.0, 0.0, 0.0));
        let mut nve = TwoStepNve::new(ParticleGroup::all(&pdata));
        nve.set_delta_t(0.1);
        nve.set_limit(Some(0.5));
        step(&mut nve, &mut pdata, 0);
        assert_relative_eq!(pdata.pos[0].x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(pdata.vel[0].x, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_force_coasts() {
        let mut pdata = single(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0));
        pdata.net.force[0] = Vec3::new(0.0, 50.0, 0.0);
        pdata.accel[0] = Vec3::new(0.0, 50.0, 0.0);
        let mut nve = TwoStepNve::new(ParticleGroup::all(&pdata));
        nve.set_delta_t(0.1);
        nve.set_zero_force(true);
        step(&mut nve, &mut pdata, 0);
        assert_eq!(pdata.vel[0], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(pdata.accel[0], Vec3::zeros());
    }

    #[test]
    fn test_constrained_dof() {
        let mut pdata = ParticleData::new(BoxDim::cube(20.0));
        for _ in 0..10 {
            pdata.add_particle(Particle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::zeros(), 1.0, 0));
        }
        let all = ParticleGroup::all(&pdata);
        let free = TwoStepNve::new(all.clone());
        let on_sphere = TwoStepNve::with_manifold(
            all.clone(),
            Constraint::with_default_tolerance(Sphere::new(2.0, Vec3::zeros())),
        );
        assert_eq!(free.translational_dof(&all, &pdata), 30.0);
        assert_eq!(on_sphere.translational_dof(&all, &pdata), 20.0);
        assert_eq!(on_sphere.translational_dof(&ParticleGroup::range(0..4), &pdata), 8.0);
    }

    #[test]
    fn test_fold_cancels_normal_force() {
        // static particle on a plane pushed into it: the folded force is tangential
        let mut pdata = single(Vec3::new(0.0, 0.0, 0.0), Vec3::zeros());
        pdata.net.force[0] = Vec3::new(1.0, 0.0, -3.0);
        pdata.accel[0] = pdata.net.force[0];
        let plane = phyz_manifold::Plane::new(0.0);
        let mut nve =
            TwoStepNve::with_manifold(ParticleGroup::all(&pdata), Constraint::new(plane, 1e-12));
        nve.set_delta_t(0.01);
        nve.include_constraint_force(0, &mut pdata).unwrap();
        assert_relative_eq!(pdata.net.force[0].z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pdata.net.force[0].x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(pdata.accel[0].z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_change_rejects_sphere() {
        let pdata = single(Vec3::new(2.0, 0.0, 0.0), Vec3::zeros());
        let mut nve = TwoStepNve::with_manifold(
            ParticleGroup::all(&pdata),
            Constraint::with_default_tolerance(Sphere::new(2.0, Vec3::zeros())),
        );
        assert!(nve.on_box_change(&BoxDim::cube(5.0)).is_ok());
        assert!(nve.on_box_change(&BoxDim::cube(3.0)).is_err());
    }
}
