//! Composite particles: rigid bodies whose constituents follow a central
//! particle.

use crate::{ParticleData, Result, rotation};
use phyz_math::{Quat, Vec3};

/// Generator of composite particles.
pub trait ForceComposite {
    /// Place constituent particles from their central particles' state.
    fn update_composite_particles(
        &mut self,
        timestep: u64,
        pdata: &mut ParticleData,
    ) -> Result<()>;
}

/// One constituent: body-frame offset and orientation relative to the
/// central particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constituent {
    pub tag: u32,
    pub offset: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub central_tag: u32,
    pub constituents: Vec<Constituent>,
}

/// Rigid bodies slaved to their central particles.
#[derive(Debug, Clone, Default)]
pub struct RigidBodies {
    bodies: Vec<RigidBody>,
}

impl RigidBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, body: RigidBody) {
        self.bodies.push(body);
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }
}

impl ForceComposite for RigidBodies {
    fn update_composite_particles(
        &mut self,
        timestep: u64,
        pdata: &mut ParticleData,
    ) -> Result<()> {
        log::trace!("updating {} rigid bodies at step {timestep}", self.bodies.len());
        for body in &self.bodies {
            let c = pdata.index_of(body.central_tag)?;
            let center = pdata.unwrapped_position(c);
            let q = pdata.orientation[c];
            let v = pdata.vel[c];
            let omega = rotation::angular_velocity(&q, &pdata.angmom[c], &pdata.inertia[c]);

            for member in &body.constituents {
                let j = pdata.index_of(member.tag)?;
                let arm = q.rotate(&member.offset);
                pdata.pos[j] = center + arm;
                pdata.image[j] = [0; 3];
                pdata.wrap(j);
                pdata.orientation[j] = (q * member.orientation).normalize();
                pdata.vel[j] = v + omega.cross(&arm);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particle;
    use approx::assert_relative_eq;
    use phyz_math::BoxDim;

    #[test]
    fn test_constituents_follow_center() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        let center = pdata.add_particle(Particle::new(
            Vec3::new(4.5, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            1.0,
            0,
        ));
        let arm = pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 1));
        pdata.orientation[0] = Quat::from_axis_angle(&Vec3::z(), std::f64::consts::FRAC_PI_2);

        let mut rigid = RigidBodies::new();
        rigid.add_body(RigidBody {
            central_tag: center,
            constituents: vec![Constituent {
                tag: arm,
                offset: Vec3::new(1.0, 0.0, 0.0),
                orientation: Quat::identity(),
            }],
        });
        rigid.update_composite_particles(0, &mut pdata).unwrap();

        // offset rotated onto +y, no wrap needed
        assert_relative_eq!(pdata.pos[1].x, 4.5, epsilon = 1e-12);
        assert_relative_eq!(pdata.pos[1].y, 1.0, epsilon = 1e-12);
        assert_eq!(pdata.vel[1], Vec3::new(1.0, 0.0, 0.0));

        // rotate the body so the arm crosses the +x face
        pdata.orientation[0] = Quat::identity();
        rigid.update_composite_particles(1, &mut pdata).unwrap();
        assert_relative_eq!(pdata.pos[1].x, -4.5, epsilon = 1e-12);
        assert_eq!(pdata.image[1], [1, 0, 0]);
    }

    #[test]
    fn test_constituent_velocity_includes_spin() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        let q = Quat::from_axis_angle(&Vec3::z(), std::f64::consts::FRAC_PI_2);
        let center = pdata.add_particle(
            Particle::new(Vec3::zeros(), Vec3::new(0.5, 0.0, 0.0), 1.0, 0).with_rotation(
                q,
                Vec3::new(1.0, 1.0, 2.0),
                Vec3::new(0.0, 0.0, 2.0),
            ),
        );
        let arm = pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 1));

        let mut rigid = RigidBodies::new();
        rigid.add_body(RigidBody {
            central_tag: center,
            constituents: vec![Constituent {
                tag: arm,
                offset: Vec3::new(1.0, 0.0, 0.0),
                orientation: Quat::identity(),
            }],
        });
        rigid.update_composite_particles(0, &mut pdata).unwrap();

        // ω = ẑ, arm along +y: ω × r = -x̂
        assert_relative_eq!(pdata.pos[1].y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(pdata.vel[1].x, -0.5, epsilon = 1e-12);
        assert_relative_eq!(pdata.vel[1].y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pdata.vel[1].z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_tag_is_an_error() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        let mut rigid = RigidBodies::new();
        rigid.add_body(RigidBody {
            central_tag: 7,
            constituents: Vec::new(),
        });
        assert!(rigid.update_composite_particles(0, &mut pdata).is_err());
    }
}
