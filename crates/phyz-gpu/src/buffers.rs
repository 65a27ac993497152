//! Packed particle records and kernel parameters shared with WGSL.

use bytemuck::{Pod, Zeroable};
use phyz_md::ParticleData;
use phyz_math::{Quat, Vec3};
use std::ops::BitOr;

pub const FLAG_CONSTRAINED: u32 = 1 << 0;
pub const FLAG_ANISO: u32 = 1 << 1;
pub const FLAG_NOISELESS_T: u32 = 1 << 2;
pub const FLAG_NOISELESS_R: u32 = 1 << 3;
pub const FLAG_LIMIT: u32 = 1 << 4;
pub const FLAG_ZERO_FORCE: u32 = 1 << 5;
/// Constraint drift is `F / γ` instead of `v + Δt/2 a`.
pub const FLAG_OVERDAMPED: u32 = 1 << 6;

/// One particle as the kernels see it. Mirrors `struct Particle` in the
/// shader source.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuParticle {
    /// xyz position, w mass.
    pub pos_mass: [f32; 4],
    /// xyz velocity, w translational γ.
    pub vel_gamma: [f32; 4],
    pub accel: [f32; 4],
    /// xyz net force, w potential energy.
    pub force: [f32; 4],
    pub torque: [f32; 4],
    /// (w, x, y, z)
    pub orientation: [f32; 4],
    pub angmom: [f32; 4],
    pub inertia: [f32; 4],
    pub gamma_r: [f32; 4],
    /// Virial xx, xy, xz, yy.
    pub virial_lo: [f32; 4],
    /// Virial yz, zz, then the energy handed to the bath this step.
    pub virial_hi: [f32; 4],
    /// x holds the particle tag.
    pub tag: [u32; 4],
}

/// Uniform parameters of one kernel launch. Mirrors `struct StepParams`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct StepParams {
    pub n: u32,
    pub dims: u32,
    pub seed_lo: u32,
    pub seed_hi: u32,
    pub timestep_lo: u32,
    pub timestep_hi: u32,
    pub flags: u32,
    pub _padding: u32,
    pub dt: f32,
    pub temperature: f32,
    pub tolerance: f32,
    pub limit: f32,
}

impl StepParams {
    pub fn new(dims: u32, dt: f64, timestep: u64, flags: u32) -> Self {
        Self {
            n: 0,
            dims,
            seed_lo: 0,
            seed_hi: 0,
            timestep_lo: timestep as u32,
            timestep_hi: (timestep >> 32) as u32,
            flags,
            _padding: 0,
            dt: dt as f32,
            temperature: 0.0,
            tolerance: 0.0,
            limit: 0.0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_lo = seed as u32;
        self.seed_hi = (seed >> 32) as u32;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature as f32;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance as f32;
        self
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = limit as f32;
        self
    }
}

/// Fields a kernel writes, copied back to the host store after a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Writeback(u32);

impl Writeback {
    pub const NONE: Writeback = Writeback(0);
    pub const POSITION: Writeback = Writeback(1 << 0);
    pub const VELOCITY: Writeback = Writeback(1 << 1);
    pub const ACCEL: Writeback = Writeback(1 << 2);
    /// Net force and virial.
    pub const FORCE: Writeback = Writeback(1 << 3);
    pub const TORQUE: Writeback = Writeback(1 << 4);
    pub const ORIENTATION: Writeback = Writeback(1 << 5);
    pub const ANGMOM: Writeback = Writeback(1 << 6);

    pub fn contains(self, other: Writeback) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn without(self, other: Writeback) -> Writeback {
        Writeback(self.0 & !other.0)
    }
}

impl BitOr for Writeback {
    type Output = Writeback;

    fn bitor(self, rhs: Writeback) -> Writeback {
        Writeback(self.0 | rhs.0)
    }
}

#[inline]
fn lanes(v: &Vec3, w: f64) -> [f32; 4] {
    [v.x as f32, v.y as f32, v.z as f32, w as f32]
}

#[inline]
fn vec3(l: &[f32; 4]) -> Vec3 {
    Vec3::new(l[0] as f64, l[1] as f64, l[2] as f64)
}

#[inline]
fn quat(l: &[f32; 4]) -> Quat {
    Quat::new(l[0] as f64, l[1] as f64, l[2] as f64, l[3] as f64)
}

impl GpuParticle {
    /// Pack particle `i` with its friction coefficients.
    pub fn pack(pdata: &ParticleData, i: usize, gamma: f64, gamma_r: Vec3) -> Self {
        let w = pdata.net.virial[i];
        Self {
            pos_mass: lanes(&pdata.pos[i], pdata.mass[i]),
            vel_gamma: lanes(&pdata.vel[i], gamma),
            accel: lanes(&pdata.accel[i], 0.0),
            force: lanes(&pdata.net.force[i], pdata.net.energy[i]),
            torque: lanes(&pdata.net.torque[i], 0.0),
            orientation: pdata.orientation[i].to_array().map(|c| c as f32),
            angmom: pdata.angmom[i].to_array().map(|c| c as f32),
            inertia: lanes(&pdata.inertia[i], 0.0),
            gamma_r: lanes(&gamma_r, 0.0),
            virial_lo: [w[0] as f32, w[1] as f32, w[2] as f32, w[3] as f32],
            virial_hi: [w[4] as f32, w[5] as f32, 0.0, 0.0],
            tag: [pdata.tag[i], 0, 0, 0],
        }
    }

    /// Copy the fields in `writes` back into particle `i`.
    pub fn unpack(&self, pdata: &mut ParticleData, i: usize, writes: Writeback) {
        if writes.contains(Writeback::POSITION) {
            pdata.pos[i] = vec3(&self.pos_mass);
        }
        if writes.contains(Writeback::VELOCITY) {
            pdata.vel[i] = vec3(&self.vel_gamma);
        }
        if writes.contains(Writeback::ACCEL) {
            pdata.accel[i] = vec3(&self.accel);
        }
        if writes.contains(Writeback::FORCE) {
            pdata.net.force[i] = vec3(&self.force);
            let [xx, xy, xz, yy] = self.virial_lo;
            let [yz, zz, _, _] = self.virial_hi;
            pdata.net.virial[i] = [xx, xy, xz, yy, yz, zz].map(f64::from);
        }
        if writes.contains(Writeback::TORQUE) {
            pdata.net.torque[i] = vec3(&self.torque);
        }
        if writes.contains(Writeback::ORIENTATION) {
            pdata.orientation[i] = quat(&self.orientation).normalize();
        }
        if writes.contains(Writeback::ANGMOM) {
            pdata.angmom[i] = quat(&self.angmom);
        }
    }

    /// Energy this particle handed to the heat bath, `F_bath · v`.
    pub fn bath_power(&self) -> f64 {
        self.virial_hi[2] as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phyz_md::Particle;
    use phyz_math::BoxDim;

    #[test]
    fn test_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<GpuParticle>(), 12 * 16);
        assert_eq!(std::mem::size_of::<StepParams>(), 48);
    }

    #[test]
    fn test_unpack_respects_writeback() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        pdata.add_particle(Particle::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.5, 0.0, 0.0),
            2.0,
            0,
        ));
        let mut rec = GpuParticle::pack(&pdata, 0, 1.5, Vec3::zeros());
        assert_eq!(rec.pos_mass, [1.0, 2.0, 3.0, 2.0]);
        assert_eq!(rec.vel_gamma[3], 1.5);

        rec.pos_mass[0] = 4.0;
        rec.vel_gamma[0] = 9.0;
        rec.unpack(&mut pdata, 0, Writeback::POSITION);
        assert_eq!(pdata.pos[0].x, 4.0);
        assert_eq!(pdata.vel[0].x, 0.5);

        let both = Writeback::POSITION | Writeback::VELOCITY;
        assert!(both.contains(Writeback::VELOCITY));
        assert!(!both.without(Writeback::VELOCITY).contains(Writeback::VELOCITY));
    }

    #[test]
    fn test_params_split_wide_counters() {
        let p = StepParams::new(3, 0.01, (7u64 << 32) | 5, FLAG_CONSTRAINED).with_seed(u64::MAX);
        assert_eq!((p.timestep_lo, p.timestep_hi), (5, 7));
        assert_eq!((p.seed_lo, p.seed_hi), (u32::MAX, u32::MAX));
    }
}
