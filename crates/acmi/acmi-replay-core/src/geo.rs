//! Geodetic to local Cartesian conversion.
//!
//! The importer treats this as a pure function of (origin, point). The default converter maps
//! WGS-84 coordinates to a local east/north/up tangent frame anchored at the origin.

use std::fmt;

use nalgebra::{Matrix3, Vector3};

use crate::value::GeoPoint;

const EQUATORIAL_EARTH_RADIUS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const E_EARTH_SQUARED: f64 = FLATTENING * (2.0 - FLATTENING);
const EARTH_RADIUS_RATIO_SQUARED: f64 = 1.0 - E_EARTH_SQUARED;

/// Pluggable geodetic conversion. Implementations must be deterministic.
pub trait GeodeticConverter: fmt::Debug + Send + Sync {
    /// Convert `point` into local Cartesian metres relative to `origin`.
    fn to_local(&self, origin: &GeoPoint, point: &GeoPoint) -> [f64; 3];
}

/// WGS-84 ellipsoid to local ENU (x = east, y = north, z = up).
#[derive(Copy, Clone, Debug, Default)]
pub struct Wgs84Enu;

/// Geodetic (degrees, metres) to earth-centered earth-fixed metres.
pub fn to_ecef(p: &GeoPoint) -> Vector3<f64> {
    let φ = p.lat.to_radians();
    let λ = p.lon.to_radians();
    let h = p.alt;

    let sin_φ = φ.sin();
    let cos_φ = φ.cos();

    let b = EQUATORIAL_EARTH_RADIUS / (1.0 - E_EARTH_SQUARED * (sin_φ * sin_φ)).sqrt();
    let c = (b + h) * cos_φ;

    Vector3::new(
        c * λ.cos(),
        c * λ.sin(),
        (EARTH_RADIUS_RATIO_SQUARED * b + h) * sin_φ,
    )
}

/// Rotation from ECEF deltas into the ENU frame tangent at `origin`.
fn enu_rotation(origin: &GeoPoint) -> Matrix3<f64> {
    let φ = origin.lat.to_radians();
    let λ = origin.lon.to_radians();
    let (sin_φ, cos_φ) = φ.sin_cos();
    let (sin_λ, cos_λ) = λ.sin_cos();

    #[rustfmt::skip]
    let m = Matrix3::new(
        -sin_λ,          cos_λ,          0.0,
        -sin_φ * cos_λ, -sin_φ * sin_λ,  cos_φ,
         cos_φ * cos_λ,  cos_φ * sin_λ,  sin_φ,
    );
    m
}

impl GeodeticConverter for Wgs84Enu {
    fn to_local(&self, origin: &GeoPoint, point: &GeoPoint) -> [f64; 3] {
        let delta = to_ecef(point) - to_ecef(origin);
        let enu = enu_rotation(origin) * delta;
        [enu.x, enu.y, enu.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn origin_maps_to_zero() {
        let o = GeoPoint::new(41.5, 42.1, 1500.0);
        let p = Wgs84Enu.to_local(&o, &o);
        for c in p {
            close(c, 0.0, 1e-6);
        }
    }

    #[test]
    fn axes_point_east_north_up() {
        let o = GeoPoint::new(10.0, 20.0, 0.0);
        let east = Wgs84Enu.to_local(&o, &GeoPoint::new(10.01, 20.0, 0.0));
        assert!(east[0] > 1000.0 && east[1].abs() < 5.0);

        let north = Wgs84Enu.to_local(&o, &GeoPoint::new(10.0, 20.01, 0.0));
        assert!(north[1] > 1000.0 && north[0].abs() < 1e-6);

        let up = Wgs84Enu.to_local(&o, &GeoPoint::new(10.0, 20.0, 1000.0));
        close(up[2], 1000.0, 1e-6);
        close(up[0], 0.0, 1e-6);
    }

    #[test]
    fn one_degree_latitude_is_about_111km() {
        let o = GeoPoint::new(0.0, 0.0, 0.0);
        let p = Wgs84Enu.to_local(&o, &GeoPoint::new(0.0, 1.0, 0.0));
        close(p[1], 110_574.0, 200.0);
    }
}
