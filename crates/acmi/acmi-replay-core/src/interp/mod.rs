//! Interpolation helpers.
//!
//! Positions and geodetic points blend linearly, with longitude taking the short way across the
//! antimeridian. Attitudes blend by quaternion SLERP with shortest-arc sign correction.

pub mod functions;

pub use functions::{lerp_angle_deg, lerp_f64, lerp_geo, lerp_lon_deg, lerp_vec3, slerp_orientation};
