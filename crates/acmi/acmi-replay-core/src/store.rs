//! Temporal store: per-entity ordered snapshot series.
//!
//! Each entity incarnation owns one [`TemporalTrack`]. Appends are amortized O(1) and keep the
//! series strictly increasing in time; a sample at an already-recorded time replaces that slot.
//! Queries are binary searches over the series (see `sampling.rs`).

use std::collections::vec_deque;
use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RetentionPolicy;
use crate::ids::EntityKey;
use crate::sampling::{sample, window_range};
use crate::value::{GeoPoint, Orientation};

/// Display-relevant attributes captured alongside a snapshot.
/// Strings are shared so cloning a snapshot never copies text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayAttrs {
    #[serde(default)]
    pub name: Option<Arc<str>>,
    #[serde(default)]
    pub color: Option<Arc<str>>,
    #[serde(default)]
    pub coalition: Option<Arc<str>>,
    #[serde(default)]
    pub radius: Option<f64>,
}

/// Renderer grey for unknown or missing colors.
pub const DEFAULT_RGB: [f32; 3] = [0.7, 0.7, 0.7];

/// Map an ACMI color name to linear RGB.
pub fn color_rgb(name: &str) -> [f32; 3] {
    match name.trim().to_ascii_lowercase().as_str() {
        "red" => [1.0, 0.0, 0.0],
        "blue" => [0.0, 0.0, 1.0],
        "green" => [0.0, 1.0, 0.0],
        "yellow" => [1.0, 1.0, 0.0],
        "orange" => [1.0, 0.5, 0.0],
        "violet" => [0.5, 0.0, 1.0],
        "cyan" => [0.0, 1.0, 1.0],
        "white" => [1.0, 1.0, 1.0],
        "black" => [0.0, 0.0, 0.0],
        "grey" | "gray" => DEFAULT_RGB,
        _ => DEFAULT_RGB,
    }
}

/// One recorded (or interpolated) instant of an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Seconds since the recording's reference time.
    pub time: f64,
    /// Local east/north/up metres.
    pub position: [f64; 3],
    pub geo: GeoPoint,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub attrs: DisplayAttrs,
}

impl Snapshot {
    pub fn rgb(&self) -> [f32; 3] {
        self.attrs
            .color
            .as_deref()
            .map(color_rgb)
            .unwrap_or(DEFAULT_RGB)
    }
}

/// Result of appending one snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Same timestamp as the last sample; the slot was replaced.
    Overwritten,
    /// Earlier than the last sample; dropped.
    Rejected,
}

/// Ordered snapshot series of one entity incarnation.
#[derive(Clone, Debug, Default)]
pub struct TemporalTrack {
    snapshots: VecDeque<Snapshot>,
    evicted: usize,
}

impl TemporalTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append keeping time strictly increasing, then apply the retention policy.
    pub fn append(&mut self, snapshot: Snapshot, retention: &RetentionPolicy) -> AppendOutcome {
        let outcome = match self.snapshots.back_mut() {
            Some(last) if snapshot.time == last.time => {
                *last = snapshot;
                AppendOutcome::Overwritten
            }
            Some(last) if snapshot.time < last.time => {
                log::debug!(
                    "dropping out-of-order snapshot at {} (last {})",
                    snapshot.time,
                    last.time
                );
                return AppendOutcome::Rejected;
            }
            _ => {
                self.snapshots.push_back(snapshot);
                AppendOutcome::Appended
            }
        };
        self.evict(retention);
        outcome
    }

    /// Replace the display attributes of the sample at `time` when it is the latest one.
    /// Returns whether the slot changed.
    pub fn refresh_attrs_at(&mut self, time: f64, attrs: &DisplayAttrs) -> bool {
        match self.snapshots.back_mut() {
            Some(last) if last.time == time && last.attrs != *attrs => {
                last.attrs = attrs.clone();
                true
            }
            _ => false,
        }
    }

    fn evict(&mut self, retention: &RetentionPolicy) {
        let drop = match *retention {
            RetentionPolicy::Unbounded => 0,
            RetentionPolicy::MaxSnapshots { count } => {
                self.snapshots.len().saturating_sub(count.max(1))
            }
            RetentionPolicy::MaxAge { seconds } => match self.snapshots.back() {
                Some(last) => {
                    let cutoff = last.time - seconds.max(0.0);
                    self.snapshots.partition_point(|s| s.time < cutoff)
                }
                None => 0,
            },
        };
        if drop > 0 {
            self.snapshots.drain(..drop);
            self.evicted += drop;
        }
    }

    /// Interpolated state at `t`, clamped to the recorded range. None when empty.
    pub fn query(&self, t: f64) -> Option<Snapshot> {
        sample(&self.snapshots, t)
    }

    /// Stored samples with time in `[t - trail, t]`, oldest first. Never mutates history.
    pub fn trajectory(&self, t: f64, trail: f64) -> vec_deque::Iter<'_, Snapshot> {
        self.snapshots.range(window_range(&self.snapshots, t, trail))
    }

    #[inline]
    pub fn first_time(&self) -> Option<f64> {
        self.snapshots.front().map(|s| s.time)
    }

    #[inline]
    pub fn last_time(&self) -> Option<f64> {
        self.snapshots.back().map(|s| s.time)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Number of samples dropped by the retention policy.
    #[inline]
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }
}

/// All tracks of a recording, addressed by entity incarnation.
#[derive(Debug, Default)]
pub struct TemporalStore {
    tracks: Vec<TemporalTrack>,
    retention: RetentionPolicy,
}

impl TemporalStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            tracks: Vec::new(),
            retention,
        }
    }

    fn track_mut(&mut self, key: EntityKey) -> &mut TemporalTrack {
        let idx = key.index();
        if idx >= self.tracks.len() {
            self.tracks.resize_with(idx + 1, TemporalTrack::new);
        }
        &mut self.tracks[idx]
    }

    pub fn append(&mut self, key: EntityKey, snapshot: Snapshot) -> AppendOutcome {
        let retention = self.retention;
        self.track_mut(key).append(snapshot, &retention)
    }

    pub fn track(&self, key: EntityKey) -> Option<&TemporalTrack> {
        self.tracks.get(key.index())
    }

    /// See [`TemporalTrack::refresh_attrs_at`]. Unknown keys are left alone.
    pub fn refresh_attrs_at(&mut self, key: EntityKey, time: f64, attrs: &DisplayAttrs) -> bool {
        self.tracks
            .get_mut(key.index())
            .is_some_and(|tr| tr.refresh_attrs_at(time, attrs))
    }

    pub fn query(&self, key: EntityKey, t: f64) -> Option<Snapshot> {
        self.track(key).and_then(|tr| tr.query(t))
    }

    /// Trail samples for `key`; empty for unknown keys.
    pub fn trajectory(&self, key: EntityKey, t: f64, trail: f64) -> Vec<Snapshot> {
        self.track(key)
            .map(|tr| tr.trajectory(t, trail).cloned().collect())
            .unwrap_or_default()
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Total stored samples across all tracks.
    pub fn total_snapshots(&self) -> usize {
        self.tracks.iter().map(TemporalTrack::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(time: f64, x: f64) -> Snapshot {
        Snapshot {
            time,
            position: [x, 0.0, 0.0],
            geo: GeoPoint::default(),
            orientation: None,
            heading: None,
            attrs: DisplayAttrs::default(),
        }
    }

    #[test]
    fn equal_time_overwrites_in_place() {
        let mut tr = TemporalTrack::new();
        let r = RetentionPolicy::Unbounded;
        assert_eq!(tr.append(snap(1.0, 1.0), &r), AppendOutcome::Appended);
        assert_eq!(tr.append(snap(1.0, 5.0), &r), AppendOutcome::Overwritten);
        assert_eq!(tr.len(), 1);
        assert_eq!(tr.get(0).unwrap().position[0], 5.0);
        assert_eq!(tr.append(snap(0.5, 9.0), &r), AppendOutcome::Rejected);
        assert_eq!(tr.len(), 1);
    }

    #[test]
    fn refresh_attrs_only_touches_latest_slot_at_same_time() {
        let mut tr = TemporalTrack::new();
        let r = RetentionPolicy::Unbounded;
        tr.append(snap(1.0, 1.0), &r);
        tr.append(snap(2.0, 2.0), &r);
        let attrs = DisplayAttrs {
            name: Some(Arc::from("Boom")),
            ..DisplayAttrs::default()
        };
        assert!(!tr.refresh_attrs_at(1.0, &attrs));
        assert!(tr.refresh_attrs_at(2.0, &attrs));
        assert!(!tr.refresh_attrs_at(2.0, &attrs));
        assert_eq!(tr.get(0).unwrap().attrs, DisplayAttrs::default());
        assert_eq!(tr.get(1).unwrap().attrs.name.as_deref(), Some("Boom"));
        assert_eq!(tr.get(1).unwrap().position[0], 2.0);
    }

    #[test]
    fn max_snapshots_evicts_oldest() {
        let mut tr = TemporalTrack::new();
        let r = RetentionPolicy::MaxSnapshots { count: 3 };
        for i in 0..6 {
            tr.append(snap(i as f64, i as f64), &r);
        }
        assert_eq!(tr.len(), 3);
        assert_eq!(tr.first_time(), Some(3.0));
        assert_eq!(tr.evicted(), 3);
    }

    #[test]
    fn max_age_evicts_by_time() {
        let mut tr = TemporalTrack::new();
        let r = RetentionPolicy::MaxAge { seconds: 2.0 };
        for i in 0..10 {
            tr.append(snap(i as f64, 0.0), &r);
        }
        assert_eq!(tr.first_time(), Some(7.0));
        assert_eq!(tr.last_time(), Some(9.0));
    }

    #[test]
    fn store_unknown_key_is_empty() {
        let store = TemporalStore::new(RetentionPolicy::Unbounded);
        assert!(store.query(EntityKey(3), 1.0).is_none());
        assert!(store.trajectory(EntityKey(3), 1.0, 10.0).is_empty());
    }

    #[test]
    fn color_names_map_to_rgb() {
        assert_eq!(color_rgb("Red"), [1.0, 0.0, 0.0]);
        assert_eq!(color_rgb("blue"), [0.0, 0.0, 1.0]);
        assert_eq!(color_rgb("Mauve"), DEFAULT_RGB);
        let mut s = snap(0.0, 0.0);
        assert_eq!(s.rgb(), DEFAULT_RGB);
        s.attrs.color = Some(Arc::from("Green"));
        assert_eq!(s.rgb(), [0.0, 1.0, 0.0]);
    }
}
