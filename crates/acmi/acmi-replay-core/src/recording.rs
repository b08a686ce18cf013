//! Recording: the immutable result of one import.
//!
//! [`RecordingBuilder`] folds parsed records into a private [`EntityRegistry`] in file order and
//! collects diagnostics. [`RecordingBuilder::finish`] validates the header and freezes the result
//! into a [`Recording`], which only offers read access.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Diagnostic, DiagnosticKind, DiagnosticLog, LoadError};
use crate::ids::ObjectId;
use crate::lifespan::LifespanIndex;
use crate::parser::{LineRecord, ParseItem, Record};
use crate::registry::{Entity, EntityRegistry};
use crate::store::Snapshot;
use crate::value::{EntityKind, GeoPoint};

/// Prefix every ACMI `FileType` value starts with.
pub const ACMI_FILE_TYPE_PREFIX: &str = "text/acmi";

/// Header and global-object properties of a recording.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub file_type: Option<String>,
    pub file_version: Option<String>,
    /// Absolute origin of all timeframe offsets. Unix epoch when the file declares none.
    pub reference_time: DateTime<Utc>,
    /// Every other header/global property, last value wins.
    pub properties: BTreeMap<String, String>,
}

impl HeaderInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("Title")
    }

    pub fn author(&self) -> Option<&str> {
        self.get("Author")
    }

    pub fn data_source(&self) -> Option<&str> {
        self.get("DataSource")
    }

    pub fn data_recorder(&self) -> Option<&str> {
        self.get("DataRecorder")
    }

    pub fn comments(&self) -> Option<&str> {
        self.get("Comments")
    }
}

/// A `0,Event=...` line stamped with the cursor time it appeared under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalEvent {
    pub time: f64,
    pub name: String,
    pub ids: Vec<ObjectId>,
    pub text: String,
}

/// Parse an ISO 8601 reference time. Offsets are honored; a missing zone means UTC.
pub fn parse_reference_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Mutable fold state for one import.
#[derive(Debug)]
pub struct RecordingBuilder {
    header: HeaderInfo,
    registry: EntityRegistry,
    events: Vec<GlobalEvent>,
    diagnostics: DiagnosticLog,
    cursor: f64,
    first_marker: Option<f64>,
    file_type_checked: bool,
    records: usize,
}

impl RecordingBuilder {
    pub fn new(cfg: &Config) -> Self {
        Self {
            header: HeaderInfo::default(),
            registry: EntityRegistry::new(cfg.retention),
            events: Vec::new(),
            diagnostics: DiagnosticLog::with_capacity(cfg.max_diagnostics),
            cursor: 0.0,
            first_marker: None,
            file_type_checked: false,
            records: 0,
        }
    }

    /// Current time cursor (seconds since reference time).
    #[inline]
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Fold one parser item. Only an unrecognized file type is fatal.
    pub fn push(&mut self, item: ParseItem) -> Result<(), LoadError> {
        match item {
            Ok(rec) => self.apply(rec),
            Err(diag) => {
                self.diagnostics.push(diag);
                Ok(())
            }
        }
    }

    fn apply(&mut self, rec: LineRecord) -> Result<(), LoadError> {
        let LineRecord { line, raw, record } = rec;
        self.records += 1;
        match record {
            Record::HeaderField { key, value } => self.header_field(line, raw, key, value),
            Record::GlobalEvent { name, ids, text } => {
                self.events.push(GlobalEvent {
                    time: self.cursor,
                    name,
                    ids,
                    text,
                });
            }
            Record::TimeframeMarker { seconds } => {
                self.check_file_type()?;
                self.first_marker.get_or_insert(seconds);
                // The parser already rejects non-advancing markers.
                self.cursor = self.cursor.max(seconds);
            }
            Record::ObjectUpdate { id, deltas } => {
                self.check_file_type()?;
                self.registry.apply_update(id, &deltas, self.cursor);
            }
            Record::ObjectRemoval { id } => {
                self.check_file_type()?;
                if self.registry.apply_removal(id, self.cursor).is_none() {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnknownIdOnRemoval,
                        line,
                        raw,
                        format!("removal of {id}, which is unknown or already removed"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn header_field(&mut self, line: usize, raw: String, key: String, value: String) {
        match key.as_str() {
            "FileType" => self.header.file_type = Some(value.trim().to_string()),
            "FileVersion" => {
                let version = value.trim().to_string();
                if !version.starts_with("2.") {
                    log::warn!("FileVersion {version} is not 2.x; parsing as ACMI 2.1");
                }
                self.header.file_version = Some(version);
            }
            "ReferenceTime" => match parse_reference_time(&value) {
                Some(t) => {
                    log::debug!("reference time {t}");
                    self.header.reference_time = t;
                }
                None => self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedHeader,
                    line,
                    raw,
                    format!("ReferenceTime is not ISO 8601: '{value}'"),
                )),
            },
            _ => {
                self.header.properties.insert(key, value);
            }
        }
    }

    fn check_file_type(&mut self) -> Result<(), LoadError> {
        if self.file_type_checked {
            return Ok(());
        }
        let recognized = self
            .header
            .file_type
            .as_deref()
            .is_some_and(|ft| ft.to_ascii_lowercase().starts_with(ACMI_FILE_TYPE_PREFIX));
        if !recognized {
            return Err(LoadError::UnrecognizedFileType {
                found: self.header.file_type.clone(),
            });
        }
        if self.header.file_version.is_none() {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedHeader,
                0,
                "",
                "header does not declare FileVersion",
            ));
        }
        log::debug!(
            "header parsed: {} {}",
            self.header.file_type.as_deref().unwrap_or_default(),
            self.header.file_version.as_deref().unwrap_or("?")
        );
        self.file_type_checked = true;
        Ok(())
    }

    /// Validate the header and freeze the recording.
    pub fn finish(mut self, origin: Option<GeoPoint>) -> Result<Recording, LoadError> {
        self.check_file_type()?;

        let mut start = self.first_marker;
        let mut end = self.cursor;
        let mut spans = Vec::new();
        for e in self.registry.iter() {
            if let Some(fix) = e.first_fix() {
                spans.push((e.key, fix, e.removed_at()));
                start = Some(start.map_or(fix, |s| s.min(fix)));
            }
            if let Some(last) = self.registry.track(e.key).and_then(|t| t.last_time()) {
                end = end.max(last);
            }
            if let Some(r) = e.removed_at() {
                end = end.max(r);
            }
        }
        let lifespans = LifespanIndex::build(spans);
        let start = start.unwrap_or(0.0);
        let end = end.max(start);

        log::info!(
            "recording loaded: {} entities, {} snapshots, {} events, {} diagnostics, {start}..{end}s",
            self.registry.len(),
            self.registry.store().total_snapshots(),
            self.events.len(),
            self.diagnostics.total()
        );

        Ok(Recording {
            header: self.header,
            registry: self.registry,
            events: self.events,
            diagnostics: self.diagnostics,
            origin,
            start,
            end,
            lifespans,
        })
    }
}

/// A fully imported recording. Immutable once constructed.
#[derive(Debug)]
pub struct Recording {
    header: HeaderInfo,
    registry: EntityRegistry,
    events: Vec<GlobalEvent>,
    diagnostics: DiagnosticLog,
    origin: Option<GeoPoint>,
    start: f64,
    end: f64,
    lifespans: LifespanIndex,
}

impl Recording {
    pub fn header(&self) -> &HeaderInfo {
        &self.header
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.header.reference_time
    }

    /// Local-frame origin, if any coordinate was recorded.
    pub fn origin(&self) -> Option<GeoPoint> {
        self.origin
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// `t` clamped to the recording bounds. NaN maps to the start.
    pub fn clamp_time(&self, t: f64) -> f64 {
        if t.is_nan() {
            self.start
        } else {
            t.clamp(self.start, self.end)
        }
    }

    /// Absolute wall-clock time of an offset. None when it falls outside chrono's range.
    pub fn absolute_time(&self, t: f64) -> Option<DateTime<Utc>> {
        let micros = (t * 1e6).round();
        if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
            return None;
        }
        self.header
            .reference_time
            .checked_add_signed(chrono::Duration::microseconds(micros as i64))
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn entity(&self, id: ObjectId) -> Option<&Entity> {
        self.registry.entity(id)
    }

    pub fn entities_at(&self, t: f64) -> Vec<(ObjectId, EntityKind)> {
        self.registry.entities_at(t)
    }

    /// Interpolated state of `id` at `t`. None for unknown ids and entities without coordinates.
    pub fn query(&self, id: ObjectId, t: f64) -> Option<Snapshot> {
        let entity = self.registry.resolve(id, t)?;
        self.registry.store().query(entity.key, t)
    }

    /// Stored snapshots of `id` within `[t - trail, t]`.
    pub fn trajectory(&self, id: ObjectId, t: f64, trail: f64) -> Vec<Snapshot> {
        self.registry
            .resolve(id, t)
            .map(|e| self.registry.store().trajectory(e.key, t, trail))
            .unwrap_or_default()
    }

    /// Entities holding a position at `t`: first snapshot reached and not yet removed.
    /// Only entities near their lifespan at `t` are examined.
    pub fn visible_at(&self, t: f64) -> impl Iterator<Item = &Entity> {
        self.lifespans
            .candidates(t)
            .filter_map(move |key| self.registry.get(key))
            .filter(move |e| e.visible_at(t))
    }

    pub fn lifespans(&self) -> &LifespanIndex {
        &self.lifespans
    }

    pub fn events(&self) -> &[GlobalEvent] {
        &self.events
    }

    /// Events with time in `(from, to]`.
    pub fn events_between(&self, from: f64, to: f64) -> &[GlobalEvent] {
        let lo = self.events.partition_point(|e| e.time <= from);
        let hi = self.events.partition_point(|e| e.time <= to);
        &self.events[lo..hi.max(lo)]
    }

    /// Events stamped exactly at `t`.
    pub fn events_at(&self, t: f64) -> &[GlobalEvent] {
        let lo = self.events.partition_point(|e| e.time < t);
        let hi = self.events.partition_point(|e| e.time <= t);
        &self.events[lo..hi.max(lo)]
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }
}
