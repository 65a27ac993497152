//! RATTLE projection onto an implicit manifold.
//!
//! Both stages are bounded fixed-point iterations on a single Lagrange
//! multiplier. They are written as pure functions of the particle's local
//! state so that the host loops and the GPU kernels run the same update.
//!
//! Position stage. The unconstrained half-step velocity is written as a drift
//! `u` plus a constraint coupling `c`, so that the corrected half-step
//! velocity is `u - λ c n0` with `n0 = ∇g(x0)`:
//!
//! | ensemble | drift `u`              | coupling `c` |
//! |----------|------------------------|--------------|
//! | NVE      | `v + Δt/2 a`           | `Δt / 2m`    |
//! | Brownian | `(F + F_R) / γ`        | `1 / γ`      |
//!
//! Each iteration evaluates the residual `r = x0 - x + Δt·v½`, the violation
//! `g(x)` and `n' = ∇g(x)`, then applies
//! `β = (g(x) + n'·r) / (n'·n0)`, `x ← x - β n0 + r`, `λ ← λ + β / (Δt c)`.
//!
//! Velocity stage. With `n` the gradient at the new position, solves for μ
//! such that `v' = v + Δt/2 (a - μ n / m)` is tangent to the manifold.
//!
//! Neither stage reports failure when the iteration cap is hit: the last
//! iterate is returned with `converged == false`.

use phyz_manifold::Manifold;
use phyz_math::{Vec3, sym_outer};

/// Iteration cap shared by every projection.
pub const MAX_ITERATIONS: u32 = 10;

/// Default tolerance η.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Result of a position-stage projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionProjection {
    /// Corrected position x(t+Δt).
    pub position: Vec3,
    /// Corrected half-step velocity; `position == x0 + Δt * half_velocity`.
    pub half_velocity: Vec3,
    /// Lagrange multiplier λ.
    pub lambda: f64,
    /// Gradient at the starting position.
    pub normal: Vec3,
    pub iterations: u32,
    pub converged: bool,
}

impl PositionProjection {
    /// Constraint reaction `-λ n0`.
    pub fn constraint_force(&self) -> Vec3 {
        -self.lambda * self.normal
    }

    /// Virial of the reaction at `x`: `-λ sym(n0 ⊗ x)`.
    pub fn constraint_virial(&self, x: &Vec3) -> [f64; 6] {
        sym_outer(&self.normal, x).map(|w| -self.lambda * w)
    }
}

/// Result of a velocity-stage projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityProjection {
    /// Velocity at t+Δt.
    pub velocity: Vec3,
    /// Lagrange multiplier μ.
    pub mu: f64,
    pub iterations: u32,
    pub converged: bool,
}

#[inline]
fn max_norm(r: &Vec3, resid: f64) -> f64 {
    r.norm().max(resid.abs())
}

/// Position stage starting at `x0` with drift `drift` and coupling
/// `coupling`.
pub fn project_position<M: Manifold>(
    manifold: &M,
    x0: Vec3,
    drift: Vec3,
    coupling: f64,
    dt: f64,
    tolerance: f64,
) -> PositionProjection {
    let n0 = manifold.gradient(&x0);
    let inv_dtc = 1.0 / (dt * coupling);

    let mut x = x0;
    let mut lambda = 0.0;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let half_vel = drift - lambda * coupling * n0;
        let r = x0 - x + dt * half_vel;
        let resid = manifold.implicit_function(&x);
        let next_normal = manifold.gradient(&x);

        let denom = next_normal.dot(&n0);
        if denom == 0.0 {
            break;
        }
        let beta = (resid + next_normal.dot(&r)) / denom;
        x += r - beta * n0;
        lambda += beta * inv_dtc;

        if max_norm(&r, resid) <= tolerance {
            converged = true;
            break;
        }
    }

    PositionProjection {
        position: x,
        half_velocity: drift - lambda * coupling * n0,
        lambda,
        normal: n0,
        iterations,
        converged,
    }
}

/// Velocity stage: advance the half-step velocity `v` by `Δt/2 a` while
/// removing the component along `normal`.
pub fn project_velocity(
    normal: &Vec3,
    v: Vec3,
    accel: Vec3,
    mass: f64,
    dt: f64,
    tolerance: f64,
) -> VelocityProjection {
    let inv_mass = 1.0 / mass;
    let half_dt = 0.5 * dt;
    let ndotn = normal.dot(normal);

    let mut next = v + half_dt * accel;
    let mut mu = 0.0;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS && ndotn > 0.0 {
        iterations += 1;
        let vel_dot = accel - mu * inv_mass * normal;
        let r = v - next + half_dt * vel_dot;
        let resid = normal.dot(&next) * inv_mass;

        let beta = (mass * resid + normal.dot(&r)) / ndotn;
        next += r - beta * normal;
        mu += 2.0 * mass * beta / dt;

        if max_norm(&r, resid) * mass <= tolerance {
            converged = true;
            break;
        }
    }

    VelocityProjection {
        velocity: v + half_dt * (accel - mu * inv_mass * normal),
        mu,
        iterations,
        converged,
    }
}

/// Remove the component of `r` along `normal`.
#[inline]
pub fn tangential(r: &Vec3, normal: &Vec3) -> Vec3 {
    let n2 = normal.norm_squared();
    if n2 == 0.0 {
        return *r;
    }
    r - normal * (r.dot(normal) / n2)
}

/// Convergence bookkeeping for one sub-step of one method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RattleStats {
    pub solves: usize,
    pub unconverged: usize,
    pub max_iterations: u32,
}

impl RattleStats {
    pub fn record(&mut self, iterations: u32, converged: bool) {
        self.solves += 1;
        if !converged {
            self.unconverged += 1;
        }
        self.max_iterations = self.max_iterations.max(iterations);
    }

    pub fn merge(&mut self, other: &RattleStats) {
        self.solves += other.solves;
        self.unconverged += other.unconverged;
        self.max_iterations = self.max_iterations.max(other.max_iterations);
    }

    /// Emit a debug line if any solve hit the cap.
    pub fn log(&self, method: &str, stage: &str, timestep: u64) {
        if self.unconverged > 0 {
            log::debug!(
                "{method}: {stage} at step {timestep}: {}/{} RATTLE solves hit the iteration cap",
                self.unconverged,
                self.solves
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use phyz_manifold::{Plane, Sphere, Tpms, TpmsSurface};
    use phyz_math::BoxDim;

    #[test]
    fn test_plane_removes_normal_drift() {
        let plane = Plane::new(0.0);
        let dt = 0.01;
        let m = 2.0;
        let v = Vec3::new(1.0, 0.5, 0.3);
        let a = Vec3::new(0.0, 0.0, -4.0);
        let p = project_position(&plane, Vec3::zeros(), v + 0.5 * dt * a, dt / (2.0 * m), dt, 1e-10);
        assert!(p.converged);
        assert!(p.position.z.abs() < 1e-10);
        assert_relative_eq!(p.half_velocity.x, 1.0, epsilon = 1e-12);
        assert!(p.half_velocity.z.abs() < 1e-8);
        // reaction absorbs the normal momentum and the normal force
        assert_relative_eq!(
            p.constraint_force().z,
            -(2.0 * m * 0.3 / dt - m * 4.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_position_matches_half_velocity() {
        let s = Sphere::new(1.0, Vec3::zeros());
        let x0 = Vec3::new(1.0, 0.0, 0.0);
        let dt = 0.05;
        let p = project_position(&s, x0, Vec3::new(0.0, 1.0, 0.2), dt / 2.0, dt, 1e-9);
        assert!(p.converged);
        assert!((p.position - (x0 + dt * p.half_velocity)).norm() < 1e-12);
        assert!(s.implicit_function(&p.position).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_stage_tangent() {
        let n = Vec3::new(0.0, 2.0, 0.0);
        let v = Vec3::new(0.5, 0.01, 0.0);
        let a = Vec3::new(0.0, -3.0, 1.0);
        let vp = project_velocity(&n, v, a, 1.5, 0.01, 1e-12);
        assert!(vp.converged);
        assert!(vp.velocity.dot(&n).abs() < 1e-10);
        assert_relative_eq!(vp.velocity.z, 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_unconverged_is_reported_not_fatal() {
        // tangential drift far larger than the sphere: no solution exists
        let s = Sphere::new(1.0, Vec3::zeros());
        let p = project_position(&s, Vec3::x(), Vec3::new(0.0, 50.0, 0.0), 0.5, 1.0, 1e-6);
        assert!(!p.converged);
        assert!(p.iterations >= 1 && p.iterations <= MAX_ITERATIONS);
    }

    #[test]
    fn test_tpms_projection_lands_on_surface() {
        let b = BoxDim::cube(4.0);
        let g = Tpms::new(TpmsSurface::Gyroid, [1, 1, 1], 0.0, &b);
        let dt = 0.005;
        let p = project_position(&g, Vec3::zeros(), Vec3::new(1.0, -0.5, 0.2), dt / 2.0, dt, 1e-8);
        assert!(p.converged);
        assert!(g.implicit_function(&p.position).abs() < 1e-8);
    }

    #[test]
    fn test_virial_is_symmetric_outer() {
        let p = PositionProjection {
            position: Vec3::zeros(),
            half_velocity: Vec3::zeros(),
            lambda: 2.0,
            normal: Vec3::new(1.0, 0.0, 0.0),
            iterations: 1,
            converged: true,
        };
        let w = p.constraint_virial(&Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(w, [-6.0, -4.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_stats() {
        let mut s = RattleStats::default();
        s.record(3, true);
        s.record(10, false);
        assert_eq!(s, RattleStats { solves: 2, unconverged: 1, max_iterations: 10 });
    }
}
