//! Time-dependent scalar set points (temperature schedules).

use serde::{Deserialize, Serialize};

/// A scalar that varies with the timestep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Variant {
    Constant {
        value: f64,
    },
    /// Linear ramp from `a` to `b` over `t_ramp` steps starting at `t_start`.
    Ramp {
        a: f64,
        b: f64,
        t_start: u64,
        t_ramp: u64,
    },
    /// Periodic: hold `a` for `t_a`, ramp to `b` over `t_ab`, hold `b` for
    /// `t_b`, ramp back over `t_ba`. Holds `a` before `t_start`.
    Cycle {
        a: f64,
        b: f64,
        t_start: u64,
        t_a: u64,
        t_ab: u64,
        t_b: u64,
        t_ba: u64,
    },
}

impl Variant {
    pub fn value(&self, timestep: u64) -> f64 {
        match *self {
            Variant::Constant { value } => value,
            Variant::Ramp {
                a,
                b,
                t_start,
                t_ramp,
            } => {
                if timestep <= t_start {
                    a
                } else if timestep >= t_start + t_ramp {
                    b
                } else {
                    let s = (timestep - t_start) as f64 / t_ramp as f64;
                    a + s * (b - a)
                }
            }
            Variant::Cycle {
                a,
                b,
                t_start,
                t_a,
                t_ab,
                t_b,
                t_ba,
            } => {
                let period = t_a + t_ab + t_b + t_ba;
                if timestep < t_start || period == 0 {
                    return a;
                }
                let t = (timestep - t_start) % period;
                if t < t_a {
                    a
                } else if t < t_a + t_ab {
                    a + (b - a) * (t - t_a) as f64 / t_ab as f64
                } else if t < t_a + t_ab + t_b {
                    b
                } else {
                    let s = (t - t_a - t_ab - t_b) as f64 / t_ba as f64;
                    b + (a - b) * s
                }
            }
        }
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Constant { value }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Constant { value: 1.0 }
    }
}
