//! JSON configuration for the integrator and its methods.
//!
//! ```json
//! {
//!   "dt": 0.005,
//!   "aniso": "auto",
//!   "methods": [
//!     { "method": "nve", "group": { "select": "range", "start": 0, "end": 50 },
//!       "manifold": { "type": "sphere", "radius": 5.0 } },
//!     { "method": "langevin", "group": { "select": "types", "types": [1] },
//!       "temperature": 1.0, "seed": 12, "gamma": [1.0, 2.0], "tally": true }
//!   ]
//! }
//! ```

use crate::integrator::{AnisotropicMode, IntegratorTwoStep};
use crate::method::{
    Constraint, Gamma, IntegrationMethod, Thermostat, TwoStepBrownian, TwoStepLangevin, TwoStepNve,
};
use crate::rattle::DEFAULT_TOLERANCE;
use crate::{MdError, ParticleData, ParticleGroup, Result, Variant};
use phyz_manifold::AnyManifold;
use phyz_math::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level integrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratorConfig {
    pub dt: f64,
    #[serde(default)]
    pub aniso: AnisotropicMode,
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

impl IntegratorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a scheduler with every configured method registered.
    pub fn build(&self, pdata: &ParticleData) -> Result<IntegratorTwoStep> {
        let mut integrator = IntegratorTwoStep::new(self.dt)?;
        integrator.set_anisotropic_mode(self.aniso);
        for method in &self.methods {
            integrator.add_method(method.build(pdata)?)?;
        }
        Ok(integrator)
    }
}

/// Which particles a method integrates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "select", rename_all = "lowercase")]
pub enum GroupFilter {
    #[default]
    All,
    Tags {
        tags: Vec<u32>,
    },
    Types {
        types: Vec<u32>,
    },
    /// Index range `start..end` into the store.
    Range {
        start: usize,
        end: usize,
    },
}

impl GroupFilter {
    pub fn select(&self, pdata: &ParticleData) -> Result<ParticleGroup> {
        match self {
            GroupFilter::All => Ok(ParticleGroup::all(pdata)),
            GroupFilter::Tags { tags } => ParticleGroup::from_tags(pdata, tags),
            GroupFilter::Types { types } => Ok(ParticleGroup::from_types(pdata, types)),
            GroupFilter::Range { start, end } => {
                if start > end || *end > pdata.n() {
                    return Err(MdError::InvalidParameter(format!(
                        "range {start}..{end} outside 0..{}",
                        pdata.n()
                    )));
                }
                Ok(ParticleGroup::range(*start..*end))
            }
        }
    }
}

/// A temperature given either as a plain number or as a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setpoint {
    Scalar(f64),
    Schedule(Variant),
}

impl From<Setpoint> for Variant {
    fn from(s: Setpoint) -> Self {
        match s {
            Setpoint::Scalar(value) => Variant::Constant { value },
            Setpoint::Schedule(v) => v,
        }
    }
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// One integration method, tagged by `"method"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum MethodConfig {
    Nve(NveConfig),
    Langevin(LangevinConfig),
    Brownian(BrownianConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NveConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: GroupFilter,
    #[serde(default)]
    pub manifold: Option<AnyManifold>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Maximum displacement per step.
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub zero_force: bool,
}

/// Heat-bath parameters shared by Langevin and Brownian dynamics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BathConfig {
    pub temperature: Setpoint,
    #[serde(default)]
    pub seed: u64,
    /// γ per type. Types past the end use 1.
    #[serde(default)]
    pub gamma: Vec<f64>,
    /// Diameter scale: γ = λ · diameter. Exclusive with `gamma`.
    #[serde(default)]
    pub lambda: Option<f64>,
    /// Rotational γ per type, one value per body axis.
    #[serde(default)]
    pub gamma_r: Vec<[f64; 3]>,
    #[serde(default)]
    pub noiseless_t: bool,
    #[serde(default)]
    pub noiseless_r: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LangevinConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: GroupFilter,
    #[serde(default)]
    pub manifold: Option<AnyManifold>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(flatten)]
    pub bath: BathConfig,
    /// Track the energy exchanged with the bath.
    #[serde(default)]
    pub tally: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrownianConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: GroupFilter,
    #[serde(default)]
    pub manifold: Option<AnyManifold>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(flatten)]
    pub bath: BathConfig,
}

impl BathConfig {
    fn thermostat(&self, pdata: &ParticleData) -> Result<Thermostat> {
        let mut thermostat = Thermostat::new(self.temperature, self.seed);
        for (t, g) in self.gamma.iter().enumerate() {
            thermostat.set_gamma(t as u32, *g)?;
        }
        if let Some(lambda) = self.lambda {
            if !self.gamma.is_empty() {
                return Err(MdError::InvalidParameter(
                    "set either per-type gamma or lambda, not both".into(),
                ));
            }
            if !(lambda.is_finite() && lambda > 0.0) {
                return Err(MdError::InvalidParameter(format!("lambda must be positive, got {lambda}")));
            }
            thermostat.gamma = Gamma::DiameterScale(lambda);
        }
        for (t, g) in self.gamma_r.iter().enumerate() {
            thermostat.set_gamma_r(t as u32, Vec3::from(*g))?;
        }
        thermostat.noiseless_t = self.noiseless_t;
        thermostat.noiseless_r = self.noiseless_r;
        thermostat.resize(pdata.n_types());
        Ok(thermostat)
    }
}

/// Validate a configured manifold against the current box and pair it with
/// its tolerance.
fn constraint(
    manifold: &Option<AnyManifold>,
    tolerance: f64,
    pdata: &ParticleData,
) -> Result<Option<Constraint<AnyManifold>>> {
    let Some(manifold) = manifold else {
        return Ok(None);
    };
    let mut c = Constraint::new(*manifold, tolerance);
    c.validate()?;
    c.on_box_change(pdata.sim_box())?;
    Ok(Some(c))
}

impl MethodConfig {
    /// Instantiate the method over the particles currently in `pdata`.
    pub fn build(&self, pdata: &ParticleData) -> Result<Box<dyn IntegrationMethod>> {
        match self {
            MethodConfig::Nve(cfg) => {
                let group = cfg.group.select(pdata)?;
                let mut nve = match constraint(&cfg.manifold, cfg.tolerance, pdata)? {
                    Some(c) => TwoStepNve::with_manifold(group, c),
                    None => TwoStepNve::new(group),
                };
                if let Some(limit) = cfg.limit {
                    if !(limit.is_finite() && limit > 0.0) {
                        return Err(MdError::InvalidParameter(format!(
                            "limit must be positive, got {limit}"
                        )));
                    }
                }
                nve.set_limit(cfg.limit);
                nve.set_zero_force(cfg.zero_force);
                if let Some(name) = &cfg.name {
                    nve = nve.named(name.clone());
                }
                Ok(Box::new(nve))
            }
            MethodConfig::Langevin(cfg) => {
                let group = cfg.group.select(pdata)?;
                let thermostat = cfg.bath.thermostat(pdata)?;
                let mut langevin = match constraint(&cfg.manifold, cfg.tolerance, pdata)? {
                    Some(c) => TwoStepLangevin::with_manifold(group, c, thermostat),
                    None => TwoStepLangevin::new(group, thermostat),
                };
                langevin.validate(pdata)?;
                langevin.set_tally(cfg.tally);
                if let Some(name) = &cfg.name {
                    langevin = langevin.named(name.clone());
                }
                Ok(Box::new(langevin))
            }
            MethodConfig::Brownian(cfg) => {
                let group = cfg.group.select(pdata)?;
                let thermostat = cfg.bath.thermostat(pdata)?;
                let mut brownian = match constraint(&cfg.manifold, cfg.tolerance, pdata)? {
                    Some(c) => TwoStepBrownian::with_manifold(group, c, thermostat),
                    None => TwoStepBrownian::new(group, thermostat),
                };
                brownian.validate(pdata)?;
                if let Some(name) = &cfg.name {
                    brownian = brownian.named(name.clone());
                }
                Ok(Box::new(brownian))
            }
        }
    }
}
