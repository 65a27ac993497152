//! Closed set of surfaces, selectable from configuration.

use crate::{Cylinder, Ellipsoid, GpuManifoldParams, Manifold, Plane, Sphere, Tpms};
use phyz_math::{BoxDim, Vec3};
use serde::{Deserialize, Serialize};

/// Any of the built-in manifolds, tagged by `"type"` in JSON.
///
/// Static dispatch through a `match`; methods that know their surface at
/// compile time can use the concrete type instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnyManifold {
    Plane(Plane),
    Sphere(Sphere),
    Cylinder(Cylinder),
    Ellipsoid(Ellipsoid),
    Tpms(Tpms),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            AnyManifold::Plane($m) => $body,
            AnyManifold::Sphere($m) => $body,
            AnyManifold::Cylinder($m) => $body,
            AnyManifold::Ellipsoid($m) => $body,
            AnyManifold::Tpms($m) => $body,
        }
    };
}

impl Manifold for AnyManifold {
    fn implicit_function(&self, p: &Vec3) -> f64 {
        dispatch!(self, m => m.implicit_function(p))
    }

    fn gradient(&self, p: &Vec3) -> Vec3 {
        dispatch!(self, m => m.gradient(p))
    }

    fn fits_inside_box(&self, sim_box: &BoxDim) -> bool {
        dispatch!(self, m => m.fits_inside_box(sim_box))
    }

    fn adjust_to_box(&mut self, sim_box: &BoxDim) {
        dispatch!(self, m => m.adjust_to_box(sim_box))
    }

    fn wgsl_source(&self) -> &'static str {
        dispatch!(self, m => m.wgsl_source())
    }

    fn gpu_params(&self) -> GpuManifoldParams {
        dispatch!(self, m => m.gpu_params())
    }
}

macro_rules! impl_from {
    ($($t:ident),*) => {
        $(impl From<$t> for AnyManifold {
            fn from(m: $t) -> Self {
                AnyManifold::$t(m)
            }
        })*
    };
}

impl_from!(Plane, Sphere, Cylinder, Ellipsoid, Tpms);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TpmsSurface;

    #[test]
    fn test_from_json() {
        let m: AnyManifold =
            serde_json::from_str(r#"{"type": "sphere", "radius": 2.0}"#).unwrap();
        assert_eq!(m, AnyManifold::Sphere(Sphere::new(2.0, Vec3::zeros())));
        assert_eq!(m.implicit_function(&Vec3::new(0.0, 2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_tpms_from_json_needs_adjust() {
        let mut m: AnyManifold = serde_json::from_str(
            r#"{"type": "tpms", "surface": "G", "cells": [1, 1, 1]}"#,
        )
        .unwrap();
        let b = BoxDim::cube(3.0);
        m.adjust_to_box(&b);
        assert!(m.fits_inside_box(&b));
        match m {
            AnyManifold::Tpms(t) => assert_eq!(t.surface, TpmsSurface::Gyroid),
            other => panic!("unexpected manifold {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_matches_concrete() {
        let plane = Plane::new(0.25);
        let any: AnyManifold = plane.into();
        let p = Vec3::new(1.0, 1.0, 1.0);
        assert_eq!(any.implicit_function(&p), plane.implicit_function(&p));
        assert_eq!(any.wgsl_source(), plane.wgsl_source());
    }
}
