//! GPU methods against their CPU counterparts.
//!
//! Every test skips when no adapter is available.

use approx::assert_relative_eq;
use phyz_gpu::{GpuContext, GpuTwoStepBrownian, GpuTwoStepLangevin, GpuTwoStepNve};
use phyz_manifold::{AnyManifold, Plane, Sphere};
use phyz_math::{BoxDim, Quat, Vec3};
use phyz_md::{
    AnisotropicMode, Constraint, ForceCompute, IntegrationMethod, IntegratorTwoStep, NetForce,
    Particle, ParticleData, ParticleGroup, Result, Thermostat, TwoStepBrownian, TwoStepLangevin,
    TwoStepNve,
};

fn gpu(n_devices: usize) -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    match GpuContext::new(n_devices) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

/// Same force on every particle.
struct ConstantForce(Vec3);

impl ForceCompute for ConstantForce {
    fn compute(&mut self, _t: u64, pdata: &ParticleData, out: &mut NetForce) -> Result<()> {
        for i in 0..pdata.n() {
            out.add(i, self.0, 0.0, [0.0; 6]);
        }
        Ok(())
    }
}

fn run(
    pdata: &mut ParticleData,
    method: Box<dyn IntegrationMethod>,
    force: Option<Vec3>,
    aniso: AnisotropicMode,
    steps: u64,
) {
    let mut integrator = IntegratorTwoStep::new(0.01).unwrap();
    integrator.set_anisotropic_mode(aniso);
    if let Some(f) = force {
        integrator.add_force(Box::new(ConstantForce(f)));
    }
    integrator.add_method(method).unwrap();
    integrator.prepare_run(0, pdata).unwrap();
    for t in 0..steps {
        integrator.update(t, pdata).unwrap();
    }
}

fn assert_vecs_close(a: &[Vec3], b: &[Vec3], eps: f64) {
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).norm() < eps, "{x:?} vs {y:?}");
    }
}

fn ring(n: usize, radius: f64) -> ParticleData {
    let mut pdata = ParticleData::new(BoxDim::cube(10.0));
    for k in 0..n {
        let phi = k as f64 * std::f64::consts::TAU / n as f64;
        let x = Vec3::new(radius * phi.cos(), radius * phi.sin(), 0.0);
        let v = Vec3::new(-phi.sin(), phi.cos(), 0.3);
        pdata.add_particle(Particle::new(x, v, 1.0, 0));
    }
    pdata
}

#[test]
fn test_nve_on_sphere_matches_cpu() {
    let Some(ctx) = gpu(1) else { return };
    let sphere = AnyManifold::from(Sphere::new(2.0, Vec3::zeros()));

    let mut cpu = ring(16, 2.0);
    let mut dev = cpu.clone();

    let group = ParticleGroup::all(&cpu);
    let nve = TwoStepNve::with_manifold(group.clone(), Constraint::new(sphere, 1e-6));
    run(&mut cpu, Box::new(nve), None, AnisotropicMode::Isotropic, 20);

    let nve = GpuTwoStepNve::with_manifold(&ctx, group, Constraint::new(sphere, 1e-5)).unwrap();
    run(&mut dev, Box::new(nve), None, AnisotropicMode::Isotropic, 20);

    assert_vecs_close(&cpu.pos, &dev.pos, 1e-3);
    assert_vecs_close(&cpu.vel, &dev.vel, 1e-3);
    for x in &dev.pos {
        assert!((x.norm() - 2.0).abs() < 1e-3);
    }
}

#[test]
fn test_zero_temperature_brownian_drift() {
    let Some(ctx) = gpu(1) else { return };
    let mut cpu = ring(8, 1.0);
    let mut dev = cpu.clone();
    let group = ParticleGroup::all(&cpu);
    let force = Some(Vec3::new(1.0, 0.0, -0.5));

    let bd = TwoStepBrownian::new(group.clone(), Thermostat::new(0.0, 3));
    run(&mut cpu, Box::new(bd), force, AnisotropicMode::Isotropic, 10);

    let bd = GpuTwoStepBrownian::new(&ctx, group, Thermostat::new(0.0, 3)).unwrap();
    run(&mut dev, Box::new(bd), force, AnisotropicMode::Isotropic, 10);

    assert_vecs_close(&cpu.pos, &dev.pos, 1e-5);
    for v in &dev.vel {
        assert_eq!(*v, Vec3::zeros());
    }
}

#[test]
fn test_zero_temperature_langevin_drag() {
    let Some(ctx) = gpu(1) else { return };
    let mut cpu = ring(8, 1.0);
    let mut dev = cpu.clone();
    let group = ParticleGroup::all(&cpu);

    let mut thermostat = Thermostat::new(0.0, 1);
    thermostat.set_gamma(0, 2.0).unwrap();

    let mut ld = TwoStepLangevin::new(group.clone(), thermostat.clone());
    ld.set_tally(true);
    run(&mut cpu, Box::new(ld), None, AnisotropicMode::Isotropic, 5);

    let mut ld = GpuTwoStepLangevin::new(&ctx, group, thermostat).unwrap();
    ld.set_tally(true);
    run(&mut dev, Box::new(ld), None, AnisotropicMode::Isotropic, 5);

    assert_vecs_close(&cpu.vel, &dev.vel, 1e-5);
    assert_vecs_close(&cpu.pos, &dev.pos, 1e-5);
}

#[test]
fn test_plane_constraint_cancels_normal_force() {
    let Some(ctx) = gpu(1) else { return };
    let plane = AnyManifold::from(Plane::new(0.0));
    let mut cpu = ring(8, 1.0);
    for v in cpu.vel.iter_mut() {
        v.z = 0.0;
    }
    let mut dev = cpu.clone();
    let group = ParticleGroup::all(&cpu);
    let force = Some(Vec3::new(1.0, 0.0, 2.0));

    let nve = TwoStepNve::with_manifold(group.clone(), Constraint::new(plane, 1e-6));
    run(&mut cpu, Box::new(nve), force, AnisotropicMode::Isotropic, 0);

    let nve = GpuTwoStepNve::with_manifold(&ctx, group, Constraint::new(plane, 1e-6)).unwrap();
    run(&mut dev, Box::new(nve), force, AnisotropicMode::Isotropic, 0);

    for i in 0..dev.n() {
        assert_relative_eq!(dev.net.force[i].x, 1.0, epsilon = 1e-5);
        assert!(dev.net.force[i].z.abs() < 1e-4);
        assert!((dev.net.force[i] - cpu.net.force[i]).norm() < 1e-4);
        assert!((dev.accel[i] - cpu.accel[i]).norm() < 1e-4);
    }
}

#[test]
fn test_free_rotor_matches_cpu() {
    let Some(ctx) = gpu(1) else { return };
    let mut cpu = ParticleData::new(BoxDim::cube(10.0));
    cpu.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0).with_rotation(
        Quat::identity(),
        Vec3::new(1.0, 2.0, 3.0),
        Vec3::new(0.3, 0.2, 0.1),
    ));
    let mut dev = cpu.clone();
    let group = ParticleGroup::all(&cpu);

    run(
        &mut cpu,
        Box::new(TwoStepNve::new(group.clone())),
        None,
        AnisotropicMode::Anisotropic,
        50,
    );
    let nve = GpuTwoStepNve::new(&ctx, group).unwrap();
    run(&mut dev, Box::new(nve), None, AnisotropicMode::Anisotropic, 50);

    let (a, b) = (cpu.orientation[0], dev.orientation[0]);
    assert!(a.dot(&b).abs() > 1.0 - 1e-5, "{a:?} vs {b:?}");
    let (pa, pb) = (cpu.angmom[0], dev.angmom[0]);
    for (x, y) in pa.to_array().iter().zip(pb.to_array()) {
        assert!((x - y).abs() < 1e-4);
    }
}

#[test]
fn test_results_independent_of_device_count() {
    let (Some(one), Some(two)) = (gpu(1), gpu(2)) else {
        return;
    };
    let start = ring(37, 1.5);
    let group = ParticleGroup::all(&start);
    let mut thermostat = Thermostat::new(1.0, 11);
    thermostat.set_gamma(0, 0.5).unwrap();

    let mut a = start.clone();
    let ld = GpuTwoStepLangevin::new(&one, group.clone(), thermostat.clone()).unwrap();
    run(&mut a, Box::new(ld), None, AnisotropicMode::Isotropic, 10);

    let mut b = start.clone();
    let ld = GpuTwoStepLangevin::new(&two, group, thermostat).unwrap();
    run(&mut b, Box::new(ld), None, AnisotropicMode::Isotropic, 10);

    assert_vecs_close(&a.pos, &b.pos, 1e-5);
    assert_vecs_close(&a.vel, &b.vel, 1e-5);
}
