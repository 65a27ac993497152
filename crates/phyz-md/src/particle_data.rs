//! Structure-of-arrays particle store.
//!
//! The store owns every per-particle array. Integration methods borrow it
//! mutably for one sub-step and touch only the indices of their group.

use crate::{MdError, Particle, Result};
use phyz_math::{BoxDim, Image, Quat, Vec3};
use std::collections::HashMap;

/// Net force, torque, virial and potential energy accumulated by force
/// computes, one entry per particle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetForce {
    pub force: Vec<Vec3>,
    pub torque: Vec<Vec3>,
    /// Per-particle virial (xx, xy, xz, yy, yz, zz).
    pub virial: Vec<[f64; 6]>,
    pub energy: Vec<f64>,
}

impl NetForce {
    pub fn with_len(n: usize) -> Self {
        let mut net = Self::default();
        net.resize(n);
        net
    }

    pub fn len(&self) -> usize {
        self.force.len()
    }

    pub fn is_empty(&self) -> bool {
        self.force.is_empty()
    }

    pub fn resize(&mut self, n: usize) {
        self.force.resize(n, Vec3::zeros());
        self.torque.resize(n, Vec3::zeros());
        self.virial.resize(n, [0.0; 6]);
        self.energy.resize(n, 0.0);
    }

    /// Reset all accumulators to zero.
    pub fn zero(&mut self) {
        self.force.fill(Vec3::zeros());
        self.torque.fill(Vec3::zeros());
        self.virial.fill([0.0; 6]);
        self.energy.fill(0.0);
    }

    /// Add a pairwise or external contribution to particle `i`.
    pub fn add(&mut self, i: usize, force: Vec3, energy: f64, virial: [f64; 6]) {
        self.force[i] += force;
        self.energy[i] += energy;
        for (acc, w) in self.virial[i].iter_mut().zip(virial) {
            *acc += w;
        }
    }

    fn permute(&mut self, order: &[usize]) {
        self.force = order.iter().map(|&i| self.force[i]).collect();
        self.torque = order.iter().map(|&i| self.torque[i]).collect();
        self.virial = order.iter().map(|&i| self.virial[i]).collect();
        self.energy = order.iter().map(|&i| self.energy[i]).collect();
    }
}

/// Global particle store.
#[derive(Debug, Clone)]
pub struct ParticleData {
    pub pos: Vec<Vec3>,
    pub vel: Vec<Vec3>,
    pub mass: Vec<f64>,
    pub accel: Vec<Vec3>,
    pub image: Vec<Image>,
    pub orientation: Vec<Quat>,
    /// Angular momentum quaternions, `2 q ⊗ (0, L_body)`.
    pub angmom: Vec<Quat>,
    pub inertia: Vec<Vec3>,
    pub type_id: Vec<u32>,
    pub diameter: Vec<f64>,
    pub charge: Vec<f64>,
    /// Persistent particle tags. Survive reordering of the arrays.
    pub tag: Vec<u32>,
    pub net: NetForce,
    sim_box: BoxDim,
    n_types: usize,
    rtag: HashMap<u32, usize>,
    next_tag: u32,
    accel_set: bool,
}

impl ParticleData {
    /// Empty store in `sim_box`. Dimensionality follows the box.
    pub fn new(sim_box: BoxDim) -> Self {
        Self {
            pos: Vec::new(),
            vel: Vec::new(),
            mass: Vec::new(),
            accel: Vec::new(),
            image: Vec::new(),
            orientation: Vec::new(),
            angmom: Vec::new(),
            inertia: Vec::new(),
            type_id: Vec::new(),
            diameter: Vec::new(),
            charge: Vec::new(),
            tag: Vec::new(),
            net: NetForce::default(),
            sim_box,
            n_types: 1,
            rtag: HashMap::new(),
            next_tag: 0,
            accel_set: false,
        }
    }

    /// Insert a particle, wrapping it into the box. Returns its tag.
    pub fn add_particle(&mut self, p: Particle) -> u32 {
        let tag = self.next_tag;
        self.next_tag += 1;

        let mut x = p.x;
        let mut img = [0; 3];
        self.sim_box.wrap(&mut x, &mut img);

        self.rtag.insert(tag, self.pos.len());
        self.pos.push(x);
        self.vel.push(p.v);
        self.mass.push(p.mass);
        self.accel.push(Vec3::zeros());
        self.image.push(img);
        self.orientation.push(p.orientation);
        self.angmom.push(p.angmom);
        self.inertia.push(p.inertia);
        self.type_id.push(p.type_id);
        self.diameter.push(p.diameter);
        self.charge.push(p.charge);
        self.tag.push(tag);
        self.net.resize(self.pos.len());
        self.n_types = self.n_types.max(p.type_id as usize + 1);
        tag
    }

    /// Number of local particles.
    pub fn n(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    /// Declare additional particle types. Never shrinks.
    pub fn set_n_types(&mut self, n_types: usize) {
        self.n_types = self.n_types.max(n_types);
    }

    pub fn dimensions(&self) -> u32 {
        self.sim_box.dimensions
    }

    pub fn sim_box(&self) -> &BoxDim {
        &self.sim_box
    }

    /// Replace the box. Callers that hold constraints should go through
    /// `IntegratorTwoStep::set_box` so manifolds are re-validated.
    pub fn set_box(&mut self, sim_box: BoxDim) {
        self.sim_box = sim_box;
    }

    /// Current array index of the particle with `tag`.
    pub fn index_of(&self, tag: u32) -> Result<usize> {
        self.rtag.get(&tag).copied().ok_or(MdError::UnknownTag(tag))
    }

    /// Wrap particle `i` back into the box.
    #[inline]
    pub fn wrap(&mut self, i: usize) {
        self.sim_box.wrap(&mut self.pos[i], &mut self.image[i]);
    }

    /// Unwrapped position of particle `i`.
    pub fn unwrapped_position(&self, i: usize) -> Vec3 {
        self.sim_box.unwrap(&self.pos[i], &self.image[i])
    }

    pub fn is_accel_set(&self) -> bool {
        self.accel_set
    }

    /// Mark accelerations as valid, e.g. after restoring them from a snapshot.
    pub fn notify_accel_set(&mut self) {
        self.accel_set = true;
    }

    /// a = F / m for every particle.
    pub fn compute_accelerations(&mut self) {
        for i in 0..self.n() {
            self.accel[i] = self.net.force[i] / self.mass[i];
        }
        self.accel_set = true;
    }

    /// Reorder the arrays so that new index `k` holds old index `order[k]`.
    ///
    /// Tags follow their particles. Index-based groups built before the
    /// reorder must be rebuilt.
    pub fn reorder(&mut self, order: &[usize]) -> Result<()> {
        let n = self.n();
        let mut seen = vec![false; n];
        if order.len() != n {
            return Err(MdError::InvalidParameter(format!(
                "reorder expects {n} indices, got {}",
                order.len()
            )));
        }
        for &i in order {
            if i >= n || seen[i] {
                return Err(MdError::InvalidParameter(format!(
                    "reorder index {i} is out of range or repeated"
                )));
            }
            seen[i] = true;
        }

        fn apply<T: Copy>(v: &mut Vec<T>, order: &[usize]) {
            *v = order.iter().map(|&i| v[i]).collect();
        }
        apply(&mut self.pos, order);
        apply(&mut self.vel, order);
        apply(&mut self.mass, order);
        apply(&mut self.accel, order);
        apply(&mut self.image, order);
        apply(&mut self.orientation, order);
        apply(&mut self.angmom, order);
        apply(&mut self.inertia, order);
        apply(&mut self.type_id, order);
        apply(&mut self.diameter, order);
        apply(&mut self.charge, order);
        apply(&mut self.tag, order);
        self.net.permute(order);

        self.rtag = self.tag.iter().enumerate().map(|(i, &t)| (t, i)).collect();
        Ok(())
    }

    /// Translational kinetic energy of particle `i`.
    #[inline]
    pub fn kinetic_energy(&self, i: usize) -> f64 {
        0.5 * self.mass[i] * self.vel[i].norm_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ParticleData {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        for i in 0..4 {
            pdata.add_particle(Particle::new(
                Vec3::new(i as f64, 0.0, 0.0),
                Vec3::new(0.0, i as f64, 0.0),
                1.0 + i as f64,
                i % 2,
            ));
        }
        pdata
    }

    #[test]
    fn test_add_wraps_and_tags() {
        let mut pdata = ParticleData::new(BoxDim::cube(4.0));
        let tag = pdata.add_particle(Particle::new(Vec3::new(3.0, 0.0, 0.0), Vec3::zeros(), 1.0, 2));
        assert_eq!(tag, 0);
        assert_eq!(pdata.pos[0].x, -1.0);
        assert_eq!(pdata.image[0], [1, 0, 0]);
        assert_eq!(pdata.n_types(), 3);
        assert_eq!(pdata.net.len(), 1);
    }

    #[test]
    fn test_reorder_keeps_tags() {
        let mut pdata = store();
        pdata.reorder(&[3, 2, 1, 0]).unwrap();
        assert_eq!(pdata.tag, vec![3, 2, 1, 0]);
        assert_eq!(pdata.index_of(3).unwrap(), 0);
        assert_eq!(pdata.pos[0].x, 3.0);
        assert_eq!(pdata.mass[0], 4.0);
    }

    #[test]
    fn test_reorder_rejects_bad_permutation() {
        let mut pdata = store();
        assert!(pdata.reorder(&[0, 0, 1, 2]).is_err());
        assert!(pdata.reorder(&[0, 1]).is_err());
        assert_eq!(pdata.tag, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unknown_tag() {
        let pdata = store();
        assert!(matches!(pdata.index_of(99), Err(MdError::UnknownTag(99))));
    }

    #[test]
    fn test_compute_accelerations() {
        let mut pdata = store();
        pdata.net.force[1] = Vec3::new(4.0, 0.0, 0.0);
        assert!(!pdata.is_accel_set());
        pdata.compute_accelerations();
        assert_eq!(pdata.accel[1].x, 2.0);
        assert!(pdata.is_accel_set());
    }
}
