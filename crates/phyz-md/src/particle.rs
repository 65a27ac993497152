//! Particle record used to populate the particle store.

use phyz_math::{Quat, Vec3};

/// A single particle, as handed to [`ParticleData::add_particle`].
///
/// Point particles leave orientation at identity and inertia at zero; the
/// rotational integrator then skips them.
///
/// [`ParticleData::add_particle`]: crate::ParticleData::add_particle
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Position.
    pub x: Vec3,
    /// Velocity.
    pub v: Vec3,
    pub mass: f64,
    /// Type id for per-type parameters.
    pub type_id: u32,
    pub diameter: f64,
    pub charge: f64,
    pub orientation: Quat,
    /// Angular momentum in quaternion form, `2 q ⊗ (0, L_body)`.
    pub angmom: Quat,
    /// Principal moments of inertia.
    pub inertia: Vec3,
}

impl Particle {
    /// Create a point particle.
    pub fn new(x: Vec3, v: Vec3, mass: f64, type_id: u32) -> Self {
        Self {
            x,
            v,
            mass,
            type_id,
            diameter: 1.0,
            charge: 0.0,
            orientation: Quat::identity(),
            angmom: Quat::zero(),
            inertia: Vec3::zeros(),
        }
    }

    pub fn with_diameter(mut self, diameter: f64) -> Self {
        self.diameter = diameter;
        self
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }

    /// Give the particle a body frame, moments of inertia and a body-frame
    /// angular momentum.
    pub fn with_rotation(mut self, orientation: Quat, inertia: Vec3, l_body: Vec3) -> Self {
        self.orientation = orientation.normalize();
        self.inertia = inertia;
        self.angmom = self.orientation.mul_vec(&l_body) * 2.0;
        self
    }

    /// Kinetic energy: 0.5 * m * v^2.
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.v.norm_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_particle_creation() {
        let p = Particle::new(Vec3::new(1.0, 2.0, 3.0), Vec3::zeros(), 1.0, 0);
        assert_eq!(p.x, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.mass, 1.0);
        assert_eq!(p.orientation, Quat::identity());
        assert_eq!(p.inertia, Vec3::zeros());
    }

    #[test]
    fn test_kinetic_energy() {
        let p = Particle::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 2.0, 0);
        assert!((p.kinetic_energy() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_with_rotation_stores_body_momentum() {
        let q = Quat::from_axis_angle(&Vec3::x(), 0.4);
        let l = Vec3::new(0.0, 0.5, -1.0);
        let p = Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0).with_rotation(
            q,
            Vec3::new(1.0, 1.0, 1.0),
            l,
        );
        let back = (p.orientation.conjugate() * p.angmom * 0.5).v;
        assert_relative_eq!(back.y, l.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, l.z, epsilon = 1e-12);
    }
}
