//! WGSL compute kernels for the two-step integration methods.
//!
//! A shader module is assembled per manifold: the common declarations, the
//! manifold's `manifold_value`/`manifold_gradient` snippet, the RATTLE
//! solver and the kernels. Each work item handles one particle of the
//! device's partition.

/// Bindings, record layout, flags, quaternion algebra and random numbers.
pub const COMMON: &str = r#"
struct Particle {
    pos_mass: vec4<f32>,
    vel_gamma: vec4<f32>,
    accel: vec4<f32>,
    force: vec4<f32>,
    torque: vec4<f32>,
    orientation: vec4<f32>,
    angmom: vec4<f32>,
    inertia: vec4<f32>,
    gamma_r: vec4<f32>,
    virial_lo: vec4<f32>,
    virial_hi: vec4<f32>,
    tag: vec4<u32>,
}

struct StepParams {
    n: u32,
    dims: u32,
    seed_lo: u32,
    seed_hi: u32,
    timestep_lo: u32,
    timestep_hi: u32,
    flags: u32,
    _padding: u32,
    dt: f32,
    temperature: f32,
    tolerance: f32,
    limit: f32,
}

struct ManifoldParams {
    a: vec4<f32>,
    b: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: StepParams;
@group(0) @binding(1) var<uniform> manifold: ManifoldParams;
@group(0) @binding(2) var<storage, read_write> particles: array<Particle>;

const FLAG_CONSTRAINED: u32 = 1u;
const FLAG_ANISO: u32 = 2u;
const FLAG_NOISELESS_T: u32 = 4u;
const FLAG_NOISELESS_R: u32 = 8u;
const FLAG_LIMIT: u32 = 16u;
const FLAG_ZERO_FORCE: u32 = 32u;
const FLAG_OVERDAMPED: u32 = 64u;

const STREAM_LANGEVIN: u32 = 0x4c414e47u;
const STREAM_BROWNIAN: u32 = 0x42524f57u;
const STREAM_BROWNIAN_VELOCITY: u32 = 0x4256454cu;
const STREAM_ROTATIONAL: u32 = 0x524f5441u;

const INERTIA_EPSILON: f32 = 1e-6;
const TWO_PI: f32 = 6.283185307;

// Launches wider than 65535 workgroups wrap into rows along y.
fn flat_index(gid: vec3<u32>, groups: vec3<u32>) -> u32 {
    return gid.x + gid.y * groups.x * 64u;
}

fn has_flag(f: u32) -> bool {
    return (params.flags & f) != 0u;
}

fn degenerate(inertia: vec3<f32>, d: u32) -> bool {
    return inertia[d] < INERTIA_EPSILON;
}

// Quaternions are vec4(w, x, y, z).

fn quat_mul(a: vec4<f32>, b: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(
        a.x * b.x - dot(a.yzw, b.yzw),
        a.x * b.yzw + b.x * a.yzw + cross(a.yzw, b.yzw),
    );
}

fn quat_conj(q: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(q.x, -q.yzw);
}

fn quat_rotate(q: vec4<f32>, a: vec3<f32>) -> vec3<f32> {
    let w = q.x;
    let v = q.yzw;
    return (w * w - dot(v, v)) * a + 2.0 * w * cross(v, a) + 2.0 * dot(v, a) * v;
}

fn quat_mul_vec(q: vec4<f32>, t: vec3<f32>) -> vec4<f32> {
    return vec4<f32>(-dot(q.yzw, t), t * q.x + cross(q.yzw, t));
}

fn body_torque(q: vec4<f32>, torque: vec3<f32>, inertia: vec3<f32>) -> vec3<f32> {
    var t = quat_rotate(quat_conj(q), torque);
    for (var d = 0u; d < 3u; d += 1u) {
        if (degenerate(inertia, d)) {
            t[d] = 0.0;
        }
    }
    return t;
}

fn body_angmom(q: vec4<f32>, p: vec4<f32>) -> vec3<f32> {
    return 0.5 * quat_mul(quat_conj(q), p).yzw;
}

fn quat_perm(axis: u32, q: vec4<f32>) -> vec4<f32> {
    if (axis == 0u) {
        return vec4<f32>(-q.y, q.x, q.w, -q.z);
    }
    if (axis == 1u) {
        return vec4<f32>(-q.z, -q.w, q.x, q.y);
    }
    return vec4<f32>(-q.w, q.z, -q.y, q.x);
}

struct Rotor {
    q: vec4<f32>,
    p: vec4<f32>,
}

fn rotate_about(axis: u32, moment: f32, h: f32, r: Rotor) -> Rotor {
    let phi = 0.25 / moment * dot(r.p, quat_perm(axis, r.q));
    let c = cos(h * phi);
    let s = sin(h * phi);
    return Rotor(r.q * c + quat_perm(axis, r.q) * s, r.p * c + quat_perm(axis, r.p) * s);
}

fn free_rotate(start: Rotor, inertia: vec3<f32>, dt: f32) -> Rotor {
    var r = start;
    let half_dt = 0.5 * dt;
    if (!degenerate(inertia, 2u)) {
        r = rotate_about(2u, inertia.z, half_dt, r);
    }
    if (!degenerate(inertia, 1u)) {
        r = rotate_about(1u, inertia.y, half_dt, r);
    }
    if (!degenerate(inertia, 0u)) {
        r = rotate_about(0u, inertia.x, dt, r);
    }
    if (!degenerate(inertia, 1u)) {
        r = rotate_about(1u, inertia.y, half_dt, r);
    }
    if (!degenerate(inertia, 2u)) {
        r = rotate_about(2u, inertia.z, half_dt, r);
    }
    r.q = normalize(r.q);
    return r;
}

// PCG hash keyed by (seed, stream, tag, timestep).

fn pcg(v: u32) -> u32 {
    let state = v * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn rng_seed(stream: u32, tag: u32) -> u32 {
    var h = pcg(params.seed_lo);
    h = pcg(h ^ params.seed_hi);
    h = pcg(h ^ stream);
    h = pcg(h ^ tag);
    h = pcg(h ^ params.timestep_lo);
    return pcg(h ^ params.timestep_hi);
}

fn rng_next(state: ptr<function, u32>) -> u32 {
    *state = pcg(*state);
    return *state;
}

// Uniform in [0, 1).
fn rng_unit(state: ptr<function, u32>) -> f32 {
    return f32(rng_next(state) >> 8u) * (1.0 / 16777216.0);
}

// Uniform in [-1, 1).
fn rng_symmetric(state: ptr<function, u32>) -> f32 {
    return 2.0 * rng_unit(state) - 1.0;
}

fn rng_normal(state: ptr<function, u32>, sigma: f32) -> f32 {
    let u1 = 1.0 - rng_unit(state);
    let u2 = rng_unit(state);
    return sigma * sqrt(-2.0 * log(u1)) * cos(TWO_PI * u2);
}

fn rng_uniform_vec(state: ptr<function, u32>) -> vec3<f32> {
    let x = rng_symmetric(state);
    let y = rng_symmetric(state);
    let z = rng_symmetric(state);
    return vec3<f32>(x, y, select(z, 0.0, params.dims == 2u));
}
"#;

/// Position and velocity stages of RATTLE against the inlined manifold.
pub const RATTLE: &str = r#"
const MAX_ITERATIONS: u32 = 10u;

struct PositionProjection {
    x: vec3<f32>,
    half_vel: vec3<f32>,
    lambda: f32,
    n0: vec3<f32>,
}

fn project_position(x0: vec3<f32>, drift: vec3<f32>, coupling: f32, dt: f32, tol: f32) -> PositionProjection {
    let n0 = manifold_gradient(x0);
    let inv_dtc = 1.0 / (dt * coupling);
    var x = x0;
    var lambda = 0.0;

    for (var it = 0u; it < MAX_ITERATIONS; it += 1u) {
        let half_vel = drift - lambda * coupling * n0;
        let r = x0 - x + dt * half_vel;
        let resid = manifold_value(x);
        let next_normal = manifold_gradient(x);

        let denom = dot(next_normal, n0);
        if (denom == 0.0) {
            break;
        }
        let beta = (resid + dot(next_normal, r)) / denom;
        x += r - beta * n0;
        lambda += beta * inv_dtc;

        if (max(length(r), abs(resid)) <= tol) {
            break;
        }
    }

    return PositionProjection(x, drift - lambda * coupling * n0, lambda, n0);
}

fn project_velocity(normal: vec3<f32>, v: vec3<f32>, accel: vec3<f32>, mass: f32, dt: f32, tol: f32) -> vec3<f32> {
    let inv_mass = 1.0 / mass;
    let half_dt = 0.5 * dt;
    let ndotn = dot(normal, normal);
    var next = v + half_dt * accel;
    var mu = 0.0;

    if (ndotn > 0.0) {
        for (var it = 0u; it < MAX_ITERATIONS; it += 1u) {
            let vel_dot = accel - mu * inv_mass * normal;
            let r = v - next + half_dt * vel_dot;
            let resid = dot(normal, next) * inv_mass;

            let beta = (mass * resid + dot(normal, r)) / ndotn;
            next += r - beta * normal;
            mu += 2.0 * mass * beta / dt;

            if (max(length(r), abs(resid)) * mass <= tol) {
                break;
            }
        }
    }

    return v + half_dt * (accel - mu * inv_mass * normal);
}

fn tangential(r: vec3<f32>, normal: vec3<f32>) -> vec3<f32> {
    let n2 = dot(normal, normal);
    if (n2 == 0.0) {
        return r;
    }
    return r - normal * (dot(r, normal) / n2);
}

// Second velocity half, projected when constrained.
fn finish_velocity(x: vec3<f32>, v: vec3<f32>, accel: vec3<f32>, mass: f32) -> vec3<f32> {
    if (has_flag(FLAG_CONSTRAINED)) {
        return project_velocity(manifold_gradient(x), v, accel, mass, params.dt, params.tolerance);
    }
    return v + 0.5 * params.dt * accel;
}
"#;

/// Kernel entry points.
pub const KERNELS: &str = r#"
@compute @workgroup_size(64)
fn nve_step_one(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let dt = params.dt;
    let m = p.pos_mass.w;
    let x0 = p.pos_mass.xyz;

    if (has_flag(FLAG_ZERO_FORCE)) {
        p.accel = vec4<f32>(0.0);
    }
    let drift = p.vel_gamma.xyz + 0.5 * dt * p.accel.xyz;

    var dx = dt * drift;
    var v = drift;
    if (has_flag(FLAG_CONSTRAINED)) {
        let pr = project_position(x0, drift, 0.5 * dt / m, dt, params.tolerance);
        dx = pr.x - x0;
        v = pr.half_vel;
    }

    if (has_flag(FLAG_LIMIT)) {
        let len = length(dx);
        if (len > params.limit) {
            dx *= params.limit / len;
        }
    }

    p.pos_mass = vec4<f32>(x0 + dx, m);
    p.vel_gamma = vec4<f32>(v, p.vel_gamma.w);
    particles[i] = p;
}

@compute @workgroup_size(64)
fn nve_step_two(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let m = p.pos_mass.w;

    var a = p.force.xyz / m;
    if (has_flag(FLAG_ZERO_FORCE)) {
        a = vec3<f32>(0.0);
    }
    var v = finish_velocity(p.pos_mass.xyz, p.vel_gamma.xyz, a, m);

    if (has_flag(FLAG_LIMIT)) {
        let speed = length(v);
        if (speed * params.dt > params.limit) {
            v *= params.limit / (params.dt * speed);
        }
    }

    p.accel = vec4<f32>(a, 0.0);
    p.vel_gamma = vec4<f32>(v, p.vel_gamma.w);
    particles[i] = p;
}

fn bath_torque(p: Particle, temperature: f32) -> vec3<f32> {
    let gamma_r = p.gamma_r.xyz;
    if (all(gamma_r <= vec3<f32>(0.0))) {
        return vec3<f32>(0.0);
    }
    let q = p.orientation;
    let inertia = p.inertia.xyz;
    let s = body_angmom(q, p.angmom);

    var sigma = vec3<f32>(0.0);
    if (!has_flag(FLAG_NOISELESS_R) && temperature > 0.0) {
        sigma = sqrt(2.0 * gamma_r * temperature / params.dt);
    }

    var rng = rng_seed(STREAM_ROTATIONAL, p.tag.x);
    var t = vec3<f32>(0.0);
    for (var d = 0u; d < 3u; d += 1u) {
        let noise = rng_normal(&rng, sigma[d]);
        if (!degenerate(inertia, d)) {
            t[d] = noise - gamma_r[d] * s[d] / inertia[d];
        }
    }
    return quat_rotate(q, t);
}

@compute @workgroup_size(64)
fn langevin_step_two(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let dt = params.dt;
    let m = p.pos_mass.w;
    let x = p.pos_mass.xyz;
    let gamma = p.vel_gamma.w;
    let temperature = params.temperature;

    var coeff = 0.0;
    var r = vec3<f32>(0.0);
    if (temperature > 0.0) {
        var rng = rng_seed(STREAM_LANGEVIN, p.tag.x);
        r = rng_uniform_vec(&rng);
        if (!has_flag(FLAG_NOISELESS_T)) {
            coeff = sqrt(6.0 * gamma * temperature / dt);
        }
    }
    if (has_flag(FLAG_CONSTRAINED)) {
        r = tangential(r, manifold_gradient(x));
    }

    let bd = r * coeff - gamma * p.vel_gamma.xyz;
    let a = (p.force.xyz + bd) / m;
    let v = finish_velocity(x, p.vel_gamma.xyz, a, m);

    p.accel = vec4<f32>(a, 0.0);
    p.vel_gamma = vec4<f32>(v, gamma);
    p.virial_hi.z = dot(bd, v);

    if (has_flag(FLAG_ANISO)) {
        p.torque = vec4<f32>(p.torque.xyz + bath_torque(p, temperature), 0.0);
    }
    particles[i] = p;
}

fn brownian_rotate(p: ptr<function, Particle>, temperature: f32) {
    let dt = params.dt;
    let q = (*p).orientation;
    let inertia = (*p).inertia.xyz;
    let gamma_r = (*p).gamma_r.xyz;
    let t_body = body_torque(q, (*p).torque.xyz, inertia);

    var sigma = vec3<f32>(0.0);
    if (!has_flag(FLAG_NOISELESS_R) && temperature > 0.0) {
        sigma = sqrt(2.0 * gamma_r * temperature / dt);
    }

    var rng = rng_seed(STREAM_ROTATIONAL, (*p).tag.x);
    var omega = vec3<f32>(0.0);
    for (var d = 0u; d < 3u; d += 1u) {
        let noise = rng_normal(&rng, sigma[d]);
        if (!degenerate(inertia, d) && gamma_r[d] > 0.0) {
            omega[d] = (t_body[d] + noise) / gamma_r[d];
        }
    }

    let r = free_rotate(Rotor(q, 2.0 * quat_mul_vec(q, inertia * omega)), inertia, dt);

    var l_body = vec3<f32>(0.0);
    for (var d = 0u; d < 3u; d += 1u) {
        var s = 0.0;
        if (temperature > 0.0) {
            s = sqrt(inertia[d] * temperature);
        }
        let draw = rng_normal(&rng, s);
        if (!degenerate(inertia, d)) {
            l_body[d] = draw;
        }
    }

    (*p).orientation = r.q;
    (*p).angmom = 2.0 * quat_mul_vec(r.q, l_body);
}

@compute @workgroup_size(64)
fn brownian_step_one(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let dt = params.dt;
    let m = p.pos_mass.w;
    let x0 = p.pos_mass.xyz;
    let gamma = p.vel_gamma.w;
    let temperature = params.temperature;

    var coeff = 0.0;
    if (!has_flag(FLAG_NOISELESS_T) && temperature > 0.0) {
        coeff = sqrt(6.0 * gamma * temperature / dt);
    }

    var rng = rng_seed(STREAM_BROWNIAN, p.tag.x);
    var r = rng_uniform_vec(&rng);
    if (has_flag(FLAG_CONSTRAINED)) {
        r = tangential(r, manifold_gradient(x0));
    }
    let drift = (p.force.xyz + coeff * r) / gamma;

    var x = x0 + dt * drift;
    if (has_flag(FLAG_CONSTRAINED)) {
        x = project_position(x0, drift, 1.0 / gamma, dt, params.tolerance).x;
    }

    var sigma = 0.0;
    if (temperature > 0.0) {
        sigma = sqrt(temperature / m);
    }
    var vel_rng = rng_seed(STREAM_BROWNIAN_VELOCITY, p.tag.x);
    var v = vec3<f32>(
        rng_normal(&vel_rng, sigma),
        rng_normal(&vel_rng, sigma),
        rng_normal(&vel_rng, sigma),
    );
    if (params.dims == 2u) {
        v.z = 0.0;
    }
    if (has_flag(FLAG_CONSTRAINED)) {
        v = tangential(v, manifold_gradient(x));
    }

    p.pos_mass = vec4<f32>(x, m);
    p.vel_gamma = vec4<f32>(v, gamma);

    if (has_flag(FLAG_ANISO)) {
        brownian_rotate(&p, temperature);
    }
    particles[i] = p;
}

@compute @workgroup_size(64)
fn include_constraint_force(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let dt = params.dt;
    let m = p.pos_mass.w;
    let x = p.pos_mass.xyz;

    var drift = p.vel_gamma.xyz + 0.5 * dt * p.accel.xyz;
    var coupling = 0.5 * dt / m;
    if (has_flag(FLAG_OVERDAMPED)) {
        drift = p.force.xyz / p.vel_gamma.w;
        coupling = 1.0 / p.vel_gamma.w;
    }

    let pr = project_position(x, drift, coupling, dt, params.tolerance);
    let n = pr.n0;
    let l = -pr.lambda;

    p.force = vec4<f32>(p.force.xyz + l * n, p.force.w);
    p.virial_lo += l * vec4<f32>(
        n.x * x.x,
        0.5 * (n.x * x.y + n.y * x.x),
        0.5 * (n.x * x.z + n.z * x.x),
        n.y * x.y,
    );
    p.virial_hi += l * vec4<f32>(
        0.5 * (n.y * x.z + n.z * x.y),
        n.z * x.z,
        0.0,
        0.0,
    );
    p.accel = vec4<f32>(p.force.xyz / m, 0.0);
    particles[i] = p;
}

@compute @workgroup_size(64)
fn angular_step_one(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let inertia = p.inertia.xyz;
    let t = body_torque(p.orientation, p.torque.xyz, inertia);
    let kicked = p.angmom + quat_mul_vec(p.orientation, t) * params.dt;
    let r = free_rotate(Rotor(p.orientation, kicked), inertia, params.dt);
    p.orientation = r.q;
    p.angmom = r.p;
    particles[i] = p;
}

@compute @workgroup_size(64)
fn angular_step_two(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = flat_index(gid, groups);
    if (i >= params.n) {
        return;
    }
    var p = particles[i];
    let t = body_torque(p.orientation, p.torque.xyz, p.inertia.xyz);
    p.angmom += quat_mul_vec(p.orientation, t) * params.dt;
    particles[i] = p;
}
"#;

/// Full shader source for a manifold snippet.
pub fn module_source(manifold_src: &str) -> String {
    let mut src = String::with_capacity(COMMON.len() + manifold_src.len() + RATTLE.len() + KERNELS.len());
    src.push_str(COMMON);
    src.push_str(manifold_src);
    src.push_str(RATTLE);
    src.push_str(KERNELS);
    src
}
