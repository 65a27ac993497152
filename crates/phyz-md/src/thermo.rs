//! Thermodynamic summary of a particle group.

use crate::{IntegratorTwoStep, ParticleData, ParticleGroup, rotation};
use serde::Serialize;

/// Kinetic energies, degrees of freedom, temperature, potential energy and
/// pressure of one group at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermoSnapshot {
    pub translational_kinetic_energy: f64,
    pub rotational_kinetic_energy: f64,
    pub translational_dof: f64,
    pub rotational_dof: f64,
    pub kinetic_temperature: f64,
    pub potential_energy: f64,
    pub pressure: f64,
}

impl ThermoSnapshot {
    /// Pressure is `(2 K_t + tr W) / (D V)` with V the box area in 2D.
    pub fn compute(pdata: &ParticleData, group: &ParticleGroup, integrator: &IntegratorTwoStep) -> Self {
        let d = pdata.dimensions() as f64;
        let mut ke_t = 0.0;
        let mut ke_r = 0.0;
        let mut pe = 0.0;
        let mut w_trace = 0.0;

        for i in group {
            ke_t += pdata.kinetic_energy(i);
            ke_r += rotation::kinetic_energy(&pdata.orientation[i], &pdata.angmom[i], &pdata.inertia[i]);
            pe += pdata.net.energy[i];
            let [xx, _, _, yy, _, zz] = pdata.net.virial[i];
            w_trace += if pdata.dimensions() == 2 { xx + yy } else { xx + yy + zz };
        }

        let dof_t = integrator.translational_dof(group, pdata);
        let dof_r = integrator.rotational_dof(group, pdata);
        let ke_total = if dof_r > 0.0 { ke_t + ke_r } else { ke_t };
        let dof_total = dof_t + dof_r;
        let kinetic_temperature = if dof_total > 0.0 {
            2.0 * ke_total / dof_total
        } else {
            0.0
        };
        let pressure = (2.0 * ke_t + w_trace) / (d * pdata.sim_box().volume());

        Self {
            translational_kinetic_energy: ke_t,
            rotational_kinetic_energy: ke_r,
            translational_dof: dof_t,
            rotational_dof: dof_r,
            kinetic_temperature,
            potential_energy: pe,
            pressure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particle;
    use crate::method::TwoStepNve;
    use approx::assert_relative_eq;
    use phyz_math::{BoxDim, Vec3};

    #[test]
    fn test_ideal_gas() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        for i in 0..4 {
            let v = if i % 2 == 0 { 1.0 } else { -1.0 };
            pdata.add_particle(Particle::new(Vec3::new(i as f64, 0.0, 0.0), Vec3::new(v, 0.0, 0.0), 2.0, 0));
        }
        let all = ParticleGroup::all(&pdata);
        let mut integrator = IntegratorTwoStep::new(0.01).unwrap();
        integrator.add_method(Box::new(TwoStepNve::new(all.clone()))).unwrap();

        let s = ThermoSnapshot::compute(&pdata, &all, &integrator);
        assert_relative_eq!(s.translational_kinetic_energy, 4.0);
        assert_relative_eq!(s.translational_dof, 9.0);
        assert_relative_eq!(s.kinetic_temperature, 8.0 / 9.0);
        assert_relative_eq!(s.pressure, 8.0 / (3.0 * 1000.0));
        assert_eq!(s.rotational_dof, 0.0);
    }

    #[test]
    fn test_virial_enters_pressure() {
        let mut pdata = ParticleData::new(BoxDim::new_2d(4.0, 5.0));
        pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0));
        pdata.net.add(0, Vec3::zeros(), -1.5, [2.0, 0.0, 0.0, 4.0, 0.0, 100.0]);
        let all = ParticleGroup::all(&pdata);
        let integrator = IntegratorTwoStep::new(0.01).unwrap();

        let s = ThermoSnapshot::compute(&pdata, &all, &integrator);
        assert_relative_eq!(s.pressure, 6.0 / (2.0 * 20.0));
        assert_relative_eq!(s.potential_energy, -1.5);
        assert_eq!(s.kinetic_temperature, 0.0);
    }
}
