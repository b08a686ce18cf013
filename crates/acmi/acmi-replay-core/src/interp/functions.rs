//! Interpolation helpers:
//! - lerp_f64 / lerp_vec3 (component-wise)
//! - lerp_geo (longitude across the antimeridian the short way)
//! - lerp_angle_deg (shortest way round the circle)
//! - slerp_orientation (roll/pitch/yaw through unit quaternions)

use nalgebra::{Quaternion, UnitQuaternion};

use crate::value::{GeoPoint, Orientation};

const SLERP_EPSILON: f64 = 1e-9;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    [
        lerp_f64(a[0], b[0], t),
        lerp_f64(a[1], b[1], t),
        lerp_f64(a[2], b[2], t),
    ]
}

/// Longitude blend along the shorter arc. Result in [-180, 180) when the arc crosses the
/// antimeridian, otherwise a plain lerp.
#[inline]
pub fn lerp_lon_deg(a: f64, b: f64, t: f64) -> f64 {
    if (b - a).abs() <= 180.0 {
        return lerp_f64(a, b, t);
    }
    let mut delta = (b - a).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    (a + delta * t + 180.0).rem_euclid(360.0) - 180.0
}

#[inline]
pub fn lerp_geo(a: &GeoPoint, b: &GeoPoint, t: f64) -> GeoPoint {
    GeoPoint {
        lon: lerp_lon_deg(a.lon, b.lon, t),
        lat: lerp_f64(a.lat, b.lat, t),
        alt: lerp_f64(a.alt, b.alt, t),
    }
}

/// Map an angle in degrees into [0, 360).
#[inline]
pub fn wrap_deg_360(a: f64) -> f64 {
    let m = a.rem_euclid(360.0);
    if m >= 360.0 {
        0.0
    } else {
        m
    }
}

/// Interpolate two headings in degrees along the shorter arc. Result in [0, 360).
#[inline]
pub fn lerp_angle_deg(a: f64, b: f64, t: f64) -> f64 {
    let mut delta = (b - a).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    wrap_deg_360(a + delta * t)
}

fn to_quat(o: &Orientation) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(
        o.roll.to_radians(),
        o.pitch.to_radians(),
        o.yaw.to_radians(),
    )
}

fn from_quat(q: &UnitQuaternion<f64>) -> Orientation {
    let (roll, pitch, yaw) = q.euler_angles();
    Orientation {
        roll: roll.to_degrees(),
        pitch: pitch.to_degrees(),
        yaw: wrap_deg_360(yaw.to_degrees()),
    }
}

/// Quaternion NLERP, used when SLERP is numerically undefined.
fn nlerp(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    let qa = a.quaternion().coords;
    let qb = b.quaternion().coords;
    UnitQuaternion::from_quaternion(Quaternion::from(qa + (qb - qa) * t))
}

/// Spherical interpolation of attitudes.
/// If dot < 0, the second quaternion is negated so the blend follows the shortest arc.
pub fn slerp_orientation(a: &Orientation, b: &Orientation, t: f64) -> Orientation {
    let qa = to_quat(a);
    let mut qb = to_quat(b);
    if qa.coords.dot(&qb.coords) < 0.0 {
        qb = UnitQuaternion::new_unchecked(-qb.into_inner());
    }
    let q = qa
        .try_slerp(&qb, t, SLERP_EPSILON)
        .unwrap_or_else(|| nlerp(&qa, &qb, t));
    from_quat(&q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn lerp_boundaries_exact() {
        assert_eq!(lerp_f64(2.0, 6.0, 0.0), 2.0);
        assert_eq!(lerp_f64(2.0, 6.0, 1.0), 6.0);
        assert_eq!(lerp_vec3([0.0, 2.0, 4.0], [2.0, 4.0, 8.0], 0.5), [1.0, 3.0, 6.0]);
    }

    #[test]
    fn heading_wraps_shortest_way() {
        close(lerp_angle_deg(350.0, 10.0, 0.5), 0.0, 1e-9);
        close(lerp_angle_deg(10.0, 350.0, 0.25), 5.0, 1e-9);
        close(lerp_angle_deg(90.0, 180.0, 0.5), 135.0, 1e-9);
    }

    #[test]
    fn longitude_crosses_antimeridian_on_short_arc() {
        close(lerp_lon_deg(179.0, -179.0, 0.25), 179.5, 1e-9);
        close(lerp_lon_deg(179.0, -179.0, 0.5).abs(), 180.0, 1e-9);
        close(lerp_lon_deg(-179.0, 179.0, 0.25), -179.5, 1e-9);
        close(lerp_lon_deg(10.0, 20.0, 0.5), 15.0, 1e-12);
        let g = lerp_geo(
            &GeoPoint::new(170.0, 10.0, 100.0),
            &GeoPoint::new(-170.0, 20.0, 300.0),
            0.75,
        );
        close(g.lon, -175.0, 1e-9);
        close(g.lat, 17.5, 1e-12);
        close(g.alt, 250.0, 1e-12);
    }

    #[test]
    fn slerp_yaw_crosses_north_on_short_arc() {
        let a = Orientation::new(0.0, 0.0, 350.0);
        let b = Orientation::new(0.0, 0.0, 10.0);
        let mid = slerp_orientation(&a, &b, 0.5);
        close(mid.roll, 0.0, 1e-6);
        close(mid.pitch, 0.0, 1e-6);
        // 0 may come back as 360 - tiny
        let yaw = if mid.yaw > 180.0 { mid.yaw - 360.0 } else { mid.yaw };
        close(yaw, 0.0, 1e-6);
    }

    #[test]
    fn slerp_single_axis_is_angular_midpoint() {
        let a = Orientation::new(0.0, 0.0, 0.0);
        let b = Orientation::new(60.0, 0.0, 0.0);
        let mid = slerp_orientation(&a, &b, 0.5);
        close(mid.roll, 30.0, 1e-6);
        let q = slerp_orientation(&a, &b, 0.25);
        close(q.roll, 15.0, 1e-6);
    }

    #[test]
    fn slerp_identical_inputs() {
        let a = Orientation::new(10.0, -5.0, 45.0);
        let r = slerp_orientation(&a, &a, 0.7);
        close(r.roll, 10.0, 1e-6);
        close(r.pitch, -5.0, 1e-6);
        close(r.yaw, 45.0, 1e-6);
    }
}
