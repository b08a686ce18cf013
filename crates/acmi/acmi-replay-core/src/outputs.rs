//! Output contracts: frames for the renderer and semantic events for the UI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;
use crate::store::Snapshot;
use crate::value::EntityKind;

/// One visible entity at the frame time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub kind: EntityKind,
    /// Interpolated state at the frame time.
    pub snapshot: Snapshot,
    /// Stored samples within the trail window, oldest first.
    #[serde(default)]
    pub trail: Vec<Snapshot>,
}

/// Everything the renderer needs for one instant, ordered by object id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: f64,
    pub entries: BTreeMap<ObjectId, FrameEntry>,
}

impl Frame {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&FrameEntry> {
        self.entries.get(&id)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entries.values().filter(|e| e.kind == kind).count()
    }
}

/// Discrete state changes reported back to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PlaybackEvent {
    Loaded {
        entities: usize,
        diagnostics: usize,
        start: f64,
        end: f64,
    },
    Started,
    Resumed,
    Paused,
    Stopped,
    Seeked {
        from: f64,
        to: f64,
    },
    Ended {
        time: f64,
    },
    SpeedChanged {
        speed: f64,
    },
    TrailChanged {
        seconds: f64,
    },
    VisibilityChanged {
        kind: EntityKind,
        visible: bool,
    },
}
