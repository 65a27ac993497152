//! Symplectic rotational integration of orientation and angular momentum.
//!
//! Angular momentum is carried as the quaternion `p = 2 q ⊗ (0, L_body)`.
//! The free-rotor propagator is split axis by axis (Trotter): half steps
//! about z and y, a full step about x, then y and z again. Axes whose moment
//! of inertia is below [`INERTIA_EPSILON`] are skipped entirely.

use phyz_math::{Quat, Vec3};

/// Moments of inertia below this value mark a degenerate axis.
pub const INERTIA_EPSILON: f64 = 1e-6;

/// Which principal axes are degenerate.
#[inline]
pub fn degenerate_axes(inertia: &Vec3) -> [bool; 3] {
    [
        inertia.x < INERTIA_EPSILON,
        inertia.y < INERTIA_EPSILON,
        inertia.z < INERTIA_EPSILON,
    ]
}

/// Lab-frame torque rotated into the body frame, with degenerate axes zeroed.
pub fn body_torque(q: &Quat, torque: &Vec3, inertia: &Vec3) -> Vec3 {
    let mut t = q.rotate_inverse(torque);
    for (d, zero) in degenerate_axes(inertia).into_iter().enumerate() {
        if zero {
            t[d] = 0.0;
        }
    }
    t
}

/// Body-frame angular momentum `(½ q* ⊗ p).v`.
#[inline]
pub fn body_angular_momentum(q: &Quat, p: &Quat) -> Vec3 {
    (q.conjugate() * *p * 0.5).v
}

/// Angular momentum quaternion from a body-frame angular momentum.
#[inline]
pub fn angmom_from_body(q: &Quat, l_body: &Vec3) -> Quat {
    q.mul_vec(l_body) * 2.0
}

/// Lab-frame angular velocity. Degenerate axes do not spin.
pub fn angular_velocity(q: &Quat, p: &Quat, inertia: &Vec3) -> Vec3 {
    let s = body_angular_momentum(q, p);
    let mut omega = Vec3::zeros();
    for (d, zero) in degenerate_axes(inertia).into_iter().enumerate() {
        if !zero {
            omega[d] = s[d] / inertia[d];
        }
    }
    q.rotate(&omega)
}

/// Rotational kinetic energy over non-degenerate axes.
pub fn kinetic_energy(q: &Quat, p: &Quat, inertia: &Vec3) -> f64 {
    let s = body_angular_momentum(q, p);
    degenerate_axes(inertia)
        .into_iter()
        .enumerate()
        .filter(|(_, zero)| !zero)
        .map(|(d, _)| 0.5 * s[d] * s[d] / inertia[d])
        .sum()
}

/// Number of rotational degrees of freedom of a body. In 2D only the z axis
/// can rotate.
pub fn degrees_of_freedom(inertia: &Vec3, dimensions: u32) -> usize {
    let zero = degenerate_axes(inertia);
    if dimensions == 2 {
        usize::from(!zero[2])
    } else {
        zero.iter().filter(|z| !**z).count()
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    fn perm(self, q: &Quat) -> Quat {
        match self {
            Axis::X => q.perm_x(),
            Axis::Y => q.perm_y(),
            Axis::Z => q.perm_z(),
        }
    }
}

/// Free rotation about one body axis for time `h`.
#[inline]
fn rotate_about(axis: Axis, moment: f64, h: f64, q: &mut Quat, p: &mut Quat) {
    let phi = 0.25 / moment * p.dot(&axis.perm(q));
    let (s, c) = (h * phi).sin_cos();
    let p_perm = axis.perm(p);
    let q_perm = axis.perm(q);
    *p = *p * c + p_perm * s;
    *q = *q * c + q_perm * s;
}

/// Trotter-split free rotation over `dt`, followed by renormalization of q.
pub fn free_rotate(q: &mut Quat, p: &mut Quat, inertia: &Vec3, dt: f64) {
    let [x_zero, y_zero, z_zero] = degenerate_axes(inertia);
    let half = 0.5 * dt;

    if !z_zero {
        rotate_about(Axis::Z, inertia.z, half, q, p);
    }
    if !y_zero {
        rotate_about(Axis::Y, inertia.y, half, q, p);
    }
    if !x_zero {
        rotate_about(Axis::X, inertia.x, dt, q, p);
    }
    if !y_zero {
        rotate_about(Axis::Y, inertia.y, half, q, p);
    }
    if !z_zero {
        rotate_about(Axis::Z, inertia.z, half, q, p);
    }

    *q = q.normalize();
}

/// First half: momentum kick to t+Δt/2, then orientation to t+Δt.
pub fn step_one(q: &mut Quat, p: &mut Quat, torque: &Vec3, inertia: &Vec3, dt: f64) {
    let t = body_torque(q, torque, inertia);
    *p += q.mul_vec(&t) * dt;
    free_rotate(q, p, inertia, dt);
}

/// Second half: momentum kick to t+Δt.
pub fn step_two(q: &Quat, p: &mut Quat, torque: &Vec3, inertia: &Vec3, dt: f64) {
    let t = body_torque(q, torque, inertia);
    *p += q.mul_vec(&t) * dt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_spin_about_symmetric_axis() {
        // body spinning about z at ω = 2 keeps L and advances the angle
        let inertia = Vec3::new(1.0, 1.0, 0.5);
        let mut q = Quat::identity();
        let l = Vec3::new(0.0, 0.0, 1.0);
        let mut p = angmom_from_body(&q, &l);
        let dt = 0.01;
        for _ in 0..100 {
            step_one(&mut q, &mut p, &Vec3::zeros(), &inertia, dt);
            step_two(&q, &mut p, &Vec3::zeros(), &inertia, dt);
        }
        let expected = Quat::from_axis_angle(&Vec3::z(), 2.0);
        assert_relative_eq!(q.w.abs(), expected.w.abs(), epsilon = 1e-9);
        assert_relative_eq!(q.v.z.abs(), expected.v.z.abs(), epsilon = 1e-9);
        let s = body_angular_momentum(&q, &p);
        assert_relative_eq!(s.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_energy_conserved_free_rotor() {
        let inertia = Vec3::new(1.0, 2.0, 3.0);
        let mut q = Quat::from_axis_angle(&Vec3::new(1.0, 1.0, 0.0).normalize(), 0.3);
        let mut p = angmom_from_body(&q, &Vec3::new(0.4, -0.7, 0.2));
        let e0 = kinetic_energy(&q, &p, &inertia);
        for _ in 0..1000 {
            step_one(&mut q, &mut p, &Vec3::zeros(), &inertia, 0.005);
            step_two(&q, &mut p, &Vec3::zeros(), &inertia, 0.005);
        }
        let e1 = kinetic_energy(&q, &p, &inertia);
        assert!((e1 - e0).abs() / e0 < 1e-4);
        assert_relative_eq!(q.norm_sq(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_axes_are_skipped() {
        let inertia = Vec3::new(0.0, 0.0, 1.0);
        let mut q = Quat::identity();
        let mut p = Quat::zero();
        // torque about x has no effect on a body that can only turn about z
        step_one(&mut q, &mut p, &Vec3::new(5.0, 0.0, 0.0), &inertia, 0.1);
        assert_eq!(q, Quat::identity());
        assert_eq!(p, Quat::zero());
    }

    #[test]
    fn test_rotational_dof() {
        let sphere = Vec3::new(1.0, 1.0, 1.0);
        let rod = Vec3::new(0.0, 1.0, 1.0);
        assert_eq!(degrees_of_freedom(&sphere, 3), 3);
        assert_eq!(degrees_of_freedom(&rod, 3), 2);
        assert_eq!(degrees_of_freedom(&sphere, 2), 1);
        assert_eq!(degrees_of_freedom(&Vec3::zeros(), 3), 0);
    }
}
