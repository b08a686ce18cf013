//! ACMI Replay Core (engine-agnostic)
//!
//! Imports ACMI 2.1 flight recordings into an immutable, time-indexed model of entities and
//! serves playback queries over it. Data flows one way:
//! parser (lines → records) → registry (identity + property merge) → temporal store
//! (per-entity snapshot tracks) → playback controller (cursor → frame).
//! Hosts (CLI, renderers, UIs) drive it through [`Session`] or [`PlaybackController`].

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod importer;
pub mod inputs;
pub mod interp;
pub mod lifespan;
pub mod outputs;
pub mod parser;
pub mod playback;
pub mod recording;
pub mod registry;
pub mod sampling;
pub mod session;
pub mod store;
pub mod value;

// Re-exports for hosts
pub use config::{Config, OriginPolicy, PlaybackDefaults, RetentionPolicy};
pub use error::{Diagnostic, DiagnosticKind, DiagnosticLog, LoadError, PlaybackError, SessionError};
pub use geo::{GeodeticConverter, Wgs84Enu};
pub use ids::{EntityKey, ObjectId};
pub use importer::{load_path, load_str, Importer};
pub use inputs::{PlaybackCommand, SessionCommand};
pub use lifespan::LifespanIndex;
pub use outputs::{Frame, FrameEntry, PlaybackEvent};
pub use parser::{LineRecord, ParseItem, Record, RecordParser};
pub use playback::{PlaybackController, PlaybackState};
pub use recording::{GlobalEvent, HeaderInfo, Recording, RecordingBuilder};
pub use registry::{Entity, EntityRegistry, PropertyState, UpdateOutcome};
pub use session::{LoadTicket, Session};
pub use store::{color_rgb, AppendOutcome, DisplayAttrs, Snapshot, TemporalStore, TemporalTrack};
pub use value::{Coordinates, EntityKind, GeoPoint, Orientation, PropertyKind, PropertyValue};
