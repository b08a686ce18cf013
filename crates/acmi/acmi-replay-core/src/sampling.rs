//! Time lookup over an entity's ordered snapshots.
//!
//! Model:
//! - Snapshots are strictly increasing in time, so segment lookup is a binary search.
//! - Between two snapshots, position and geodetic point blend linearly, orientation by SLERP,
//!   heading along the shorter arc. Display attributes hold the left sample.
//! - Outside the recorded range the nearest endpoint is returned unchanged (no extrapolation).

use std::collections::VecDeque;

use crate::interp::{lerp_angle_deg, lerp_geo, lerp_vec3, slerp_orientation};
use crate::store::Snapshot;

/// Where a query time lands relative to the recorded samples.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Segment {
    /// No samples.
    Empty,
    /// Exactly on, or clamped to, the sample at this index.
    At(usize),
    /// Strictly between samples `i` and `i + 1`, with local blend factor in (0, 1).
    Between(usize, f64),
}

/// Locate `t` among `snapshots`. Edge cases:
/// - `t` before the first sample clamps to `At(0)`.
/// - `t` after the last sample clamps to `At(last)`.
/// - `t` equal to a sample time returns `At(i)` so boundary values are reproduced exactly.
pub fn find_segment(snapshots: &VecDeque<Snapshot>, t: f64) -> Segment {
    let n = snapshots.len();
    if n == 0 {
        return Segment::Empty;
    }
    if t.is_nan() || t <= snapshots[0].time {
        return Segment::At(0);
    }
    if t >= snapshots[n - 1].time {
        return Segment::At(n - 1);
    }
    // First index with time >= t; 1..n-1 given the guards above.
    let hi = snapshots.partition_point(|s| s.time < t);
    if snapshots[hi].time == t {
        return Segment::At(hi);
    }
    let lo = hi - 1;
    let t0 = snapshots[lo].time;
    let t1 = snapshots[hi].time;
    let denom = (t1 - t0).max(f64::EPSILON);
    Segment::Between(lo, ((t - t0) / denom).clamp(0.0, 1.0))
}

/// Blend two neighbouring snapshots at local factor `u`, stamping the result with `time`.
pub fn blend(left: &Snapshot, right: &Snapshot, u: f64, time: f64) -> Snapshot {
    let orientation = match (&left.orientation, &right.orientation) {
        (Some(a), Some(b)) => Some(slerp_orientation(a, b, u)),
        (a, _) => *a,
    };
    let heading = match (left.heading, right.heading) {
        (Some(a), Some(b)) => Some(lerp_angle_deg(a, b, u)),
        (a, _) => a,
    };
    Snapshot {
        time,
        position: lerp_vec3(left.position, right.position, u),
        geo: lerp_geo(&left.geo, &right.geo, u),
        orientation,
        heading,
        attrs: left.attrs.clone(),
    }
}

/// Sample the snapshot sequence at time `t`.
pub fn sample(snapshots: &VecDeque<Snapshot>, t: f64) -> Option<Snapshot> {
    match find_segment(snapshots, t) {
        Segment::Empty => None,
        Segment::At(i) => Some(snapshots[i].clone()),
        Segment::Between(i, u) => Some(blend(&snapshots[i], &snapshots[i + 1], u, t)),
    }
}

/// Index range of samples with time in `[t - window, t]`.
pub fn window_range(snapshots: &VecDeque<Snapshot>, t: f64, window: f64) -> std::ops::Range<usize> {
    if snapshots.is_empty() || t.is_nan() || window.is_nan() {
        return 0..0;
    }
    let from = t - window.max(0.0);
    let lo = snapshots.partition_point(|s| s.time < from);
    let hi = snapshots.partition_point(|s| s.time <= t);
    lo..hi.max(lo)
}
