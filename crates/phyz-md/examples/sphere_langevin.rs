//! Langevin thermostat on particles confined to a sphere.

use phyz_manifold::{AnyManifold, Sphere};
use phyz_math::{BoxDim, Vec3};
use phyz_md::{
    Constraint, IntegratorTwoStep, Particle, ParticleData, ParticleGroup, Thermostat,
    ThermoSnapshot, TwoStepLangevin, Variant,
};

fn main() -> phyz_md::Result<()> {
    env_logger::init();

    let radius = 5.0;
    let n = 200;

    // Fibonacci lattice on the sphere, at rest
    let mut pdata = ParticleData::new(BoxDim::cube(4.0 * radius));
    let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    for i in 0..n {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
        let rho = (1.0 - z * z).sqrt();
        let phi = golden * i as f64;
        let x = Vec3::new(rho * phi.cos(), rho * phi.sin(), z) * radius;
        pdata.add_particle(Particle::new(x, Vec3::zeros(), 1.0, 0));
    }

    // Heat from T = 0.5 to T = 1.5 over the first 5000 steps
    let temperature = Variant::Ramp {
        a: 0.5,
        b: 1.5,
        t_start: 0,
        t_ramp: 5000,
    };
    let sphere = AnyManifold::from(Sphere::new(radius, Vec3::zeros()));
    let mut langevin = TwoStepLangevin::with_manifold(
        ParticleGroup::all(&pdata),
        Constraint::with_default_tolerance(sphere),
        Thermostat::new(temperature, 42),
    );
    langevin.set_tally(true);

    let mut integrator = IntegratorTwoStep::new(0.005)?;
    integrator.add_method(Box::new(langevin))?;
    integrator.prepare_run(0, &mut pdata)?;

    let all = ParticleGroup::all(&pdata);
    println!("{:>8} {:>10} {:>10} {:>12}", "step", "T_kin", "dof", "reservoir");
    for t in 0..10_000u64 {
        integrator.update(t, &mut pdata)?;
        if t % 1000 == 999 {
            let snap = ThermoSnapshot::compute(&pdata, &all, &integrator);
            let reservoir = integrator
                .log_value("langevin_reservoir_energy")
                .unwrap_or(0.0);
            println!(
                "{:>8} {:>10.4} {:>10.1} {:>12.4}",
                t + 1,
                snap.kinetic_temperature,
                snap.translational_dof,
                reservoir
            );
        }
    }

    let max_error = pdata
        .pos
        .iter()
        .map(|x| (x.norm() - radius).abs())
        .fold(0.0, f64::max);
    println!("\nmax distance from surface: {max_error:.2e}");
    Ok(())
}
