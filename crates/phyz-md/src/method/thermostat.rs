//! Thermostat parameters shared by the Langevin and Brownian methods.

use crate::{MdError, ParticleData, ParticleGroup, Result, Variant};
use phyz_math::Vec3;

/// Translational friction model.
#[derive(Debug, Clone, PartialEq)]
pub enum Gamma {
    /// One γ per particle type. Types without an entry use 1.
    PerType(Vec<f64>),
    /// γ = λ · diameter.
    DiameterScale(f64),
}

impl Default for Gamma {
    fn default() -> Self {
        Gamma::PerType(Vec::new())
    }
}

/// Temperature schedule, seed, friction and noise switches.
#[derive(Debug, Clone)]
pub struct Thermostat {
    pub temperature: Variant,
    pub seed: u64,
    pub gamma: Gamma,
    /// Rotational friction per type, one value per body axis.
    pub gamma_r: Vec<Vec3>,
    /// Suppress the translational random force.
    pub noiseless_t: bool,
    /// Suppress the rotational random torque.
    pub noiseless_r: bool,
}

impl Thermostat {
    pub fn new(temperature: impl Into<Variant>, seed: u64) -> Self {
        Self {
            temperature: temperature.into(),
            seed,
            gamma: Gamma::default(),
            gamma_r: Vec::new(),
            noiseless_t: false,
            noiseless_r: false,
        }
    }

    /// Translational friction of particle `i`.
    pub fn gamma_of(&self, pdata: &ParticleData, i: usize) -> f64 {
        match &self.gamma {
            Gamma::PerType(g) => g.get(pdata.type_id[i] as usize).copied().unwrap_or(1.0),
            Gamma::DiameterScale(lambda) => lambda * pdata.diameter[i],
        }
    }

    /// Fails unless every member of `group` has a positive, finite γ.
    pub fn require_friction(&self, pdata: &ParticleData, group: &ParticleGroup) -> Result<()> {
        match group.iter().find(|&i| {
            let g = self.gamma_of(pdata, i);
            !(g.is_finite() && g > 0.0)
        }) {
            Some(i) => Err(MdError::InvalidParameter(format!(
                "gamma of particle {i} must be positive, got {}",
                self.gamma_of(pdata, i)
            ))),
            None => Ok(()),
        }
    }

    /// Rotational friction of particle `i`.
    pub fn gamma_r_of(&self, pdata: &ParticleData, i: usize) -> Vec3 {
        self.gamma_r
            .get(pdata.type_id[i] as usize)
            .copied()
            .unwrap_or_else(Vec3::zeros)
    }

    /// Set γ for one type. Switches off diameter scaling.
    pub fn set_gamma(&mut self, type_id: u32, gamma: f64) -> Result<()> {
        if gamma.is_nan() || gamma < 0.0 {
            return Err(MdError::InvalidParameter(format!("gamma must be >= 0, got {gamma}")));
        }
        if let Gamma::DiameterScale(_) = self.gamma {
            self.gamma = Gamma::PerType(Vec::new());
        }
        if let Gamma::PerType(table) = &mut self.gamma {
            let t = type_id as usize;
            if table.len() <= t {
                table.resize(t + 1, 1.0);
            }
            table[t] = gamma;
        }
        Ok(())
    }

    pub fn set_gamma_r(&mut self, type_id: u32, gamma_r: Vec3) -> Result<()> {
        if gamma_r.iter().any(|g| g.is_nan() || *g < 0.0) {
            return Err(MdError::InvalidParameter(format!(
                "gamma_r must be >= 0, got {gamma_r:?}"
            )));
        }
        let t = type_id as usize;
        if self.gamma_r.len() <= t {
            self.gamma_r.resize(t + 1, Vec3::zeros());
        }
        self.gamma_r[t] = gamma_r;
        Ok(())
    }

    /// Grow the per-type tables to `n_types` entries.
    pub fn resize(&mut self, n_types: usize) {
        if let Gamma::PerType(t) = &mut self.gamma {
            if t.len() < n_types {
                t.resize(n_types, 1.0);
            }
        }
        if self.gamma_r.len() < n_types {
            self.gamma_r.resize(n_types, Vec3::zeros());
        }
    }

    /// Amplitude of the uniform random force, `sqrt(6 γ T / Δt)`.
    pub fn force_coefficient(&self, gamma: f64, temperature: f64, dt: f64) -> f64 {
        if self.noiseless_t || temperature <= 0.0 {
            0.0
        } else {
            (6.0 * gamma * temperature / dt).sqrt()
        }
    }

    /// Width of the Gaussian random torque per axis, `sqrt(2 γ_r T / Δt)`.
    pub fn torque_sigma(&self, gamma_r: &Vec3, temperature: f64, dt: f64) -> Vec3 {
        if self.noiseless_r || temperature <= 0.0 {
            Vec3::zeros()
        } else {
            gamma_r.map(|g| (2.0 * g * temperature / dt).sqrt())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particle;
    use phyz_math::BoxDim;

    #[test]
    fn test_gamma_models() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0).with_diameter(2.0));
        pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 1));

        let mut t = Thermostat::new(1.0, 0);
        assert_eq!(t.gamma_of(&pdata, 1), 1.0);
        t.set_gamma(1, 3.0).unwrap();
        assert_eq!(t.gamma_of(&pdata, 0), 1.0);
        assert_eq!(t.gamma_of(&pdata, 1), 3.0);

        t.gamma = Gamma::DiameterScale(0.5);
        assert_eq!(t.gamma_of(&pdata, 0), 1.0);
        t.set_gamma(0, 4.0).unwrap();
        assert_eq!(t.gamma, Gamma::PerType(vec![4.0]));
        assert!(t.set_gamma(0, -1.0).is_err());
    }

    #[test]
    fn test_noise_switches() {
        let mut t = Thermostat::new(1.0, 0);
        assert_eq!(t.force_coefficient(2.0, 3.0, 0.5), 6.0);
        assert_eq!(t.force_coefficient(2.0, 0.0, 0.5), 0.0);
        t.noiseless_t = true;
        assert_eq!(t.force_coefficient(2.0, 3.0, 0.5), 0.0);
        t.noiseless_r = true;
        assert_eq!(t.torque_sigma(&Vec3::new(1.0, 1.0, 1.0), 1.0, 0.1), Vec3::zeros());
    }
}
