//! ACMI 2.1 record parser.
//!
//! Turns a lazy sequence of text lines into a lazy sequence of typed [`Record`]s. Problems on a
//! single line become [`Diagnostic`] items and the parser moves on to the next line; only an I/O
//! failure of the underlying source stops iteration (see [`RecordParser::take_io_error`]).
//!
//! Line forms handled:
//! - `Key=Value` header lines before the first timeframe
//! - `0,Key=Value,...` global-object properties (including `Event=...`)
//! - `#<seconds>` timeframe markers
//! - `<hexId>,key=value,...` object updates, with `\,` escaping commas inside values
//! - `-<hexId>` removals
//! - `//` comments and blank lines (ignored)
//! - a trailing `\` continues a logical line onto the next physical line

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::config::OriginPolicy;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::geo::{GeodeticConverter, Wgs84Enu};
use crate::ids::ObjectId;
use crate::value::{Coordinates, GeoPoint, Orientation, PropertyDeltas, PropertyValue};

/// Property key carrying the composite coordinate string.
pub const COORDINATES_KEY: &str = "T";

/// Properties that are always kept as text, even when they look numeric.
const TEXT_KEYS: &[&str] = &[
    "Name",
    "Type",
    "Parent",
    "Next",
    "ShortName",
    "LongName",
    "FullName",
    "CallSign",
    "Registration",
    "Squawk",
    "ICAO24",
    "Pilot",
    "Group",
    "Country",
    "Coalition",
    "Color",
    "Shape",
    "Debug",
    "Label",
    "FocusedTarget",
    "LockedTarget",
];

/// Properties that must decode as numbers; anything else on these keys is a malformed update.
const NUMERIC_KEYS: &[&str] = &[
    "Radius",
    "Length",
    "Width",
    "Height",
    "IAS",
    "CAS",
    "TAS",
    "Mach",
    "AOA",
    "AOS",
    "AGL",
    "HDG",
    "HDM",
    "Throttle",
    "Afterburner",
    "AirBrakes",
    "Flaps",
    "LandingGear",
    "Tailhook",
    "Parachute",
    "DragChute",
    "FuelWeight",
    "RadarMode",
    "RadarAzimuth",
    "RadarElevation",
    "RadarRange",
    "LockedTargetMode",
    "LockedTargetAzimuth",
    "LockedTargetElevation",
    "LockedTargetRange",
    "EngagementMode",
    "EngagementRange",
    "VerticalGForce",
    "LongitudinalGForce",
    "LateralGForce",
    "Health",
    "Disabled",
    "Visible",
    "Importance",
    "Slot",
];

/// One typed record.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    /// Header or global-object property.
    HeaderField { key: String, value: String },
    /// `0,Event=Name|id|id|text`.
    GlobalEvent {
        name: String,
        ids: Vec<ObjectId>,
        text: String,
    },
    /// Absolute offset from reference time, in seconds.
    TimeframeMarker { seconds: f64 },
    ObjectUpdate { id: ObjectId, deltas: PropertyDeltas },
    ObjectRemoval { id: ObjectId },
}

/// A record together with where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct LineRecord {
    /// 1-based number of the first physical line.
    pub line: usize,
    pub raw: String,
    pub record: Record,
}

pub type ParseItem = Result<LineRecord, Diagnostic>;

/// Raw `T` slots as written, before reference offsets. Empty slots inherit previous values.
#[derive(Copy, Clone, Debug, Default)]
struct RawCoords {
    lon: Option<f64>,
    lat: Option<f64>,
    alt: Option<f64>,
    roll: Option<f64>,
    pitch: Option<f64>,
    yaw: Option<f64>,
    u: Option<f64>,
    v: Option<f64>,
    heading: Option<f64>,
}

impl RawCoords {
    fn merge(&mut self, newer: &RawCoords) {
        macro_rules! take {
            ($($f:ident),*) => { $( if newer.$f.is_some() { self.$f = newer.$f; } )* };
        }
        take!(lon, lat, alt, roll, pitch, yaw, u, v, heading);
    }
}

/// Stateful line-to-record parser. State: time cursor, reference offsets, local-frame origin and
/// the last raw coordinates of every live object.
pub struct RecordParser<I> {
    lines: I,
    line_no: usize,
    pending: VecDeque<ParseItem>,
    io_error: Option<io::Error>,
    exhausted: bool,
    converter: Arc<dyn GeodeticConverter>,
    origin: Option<GeoPoint>,
    reference_lon: f64,
    reference_lat: f64,
    last_marker: Option<f64>,
    in_data: bool,
    last_coords: HashMap<ObjectId, RawCoords>,
    /// Every id that has carried an update, including removed ones.
    seen: HashSet<ObjectId>,
}

impl<R: BufRead> RecordParser<io::Lines<R>> {
    pub fn from_reader(reader: R) -> Self {
        Self::new(reader.lines())
    }
}

impl<I> RecordParser<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            line_no: 0,
            pending: VecDeque::new(),
            io_error: None,
            exhausted: false,
            converter: Arc::new(Wgs84Enu),
            origin: None,
            reference_lon: 0.0,
            reference_lat: 0.0,
            last_marker: None,
            in_data: false,
            last_coords: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn GeodeticConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        if let OriginPolicy::Fixed { point } = policy {
            self.origin = Some(point);
        }
        self
    }

    /// Local-frame origin, once established.
    pub fn origin(&self) -> Option<GeoPoint> {
        self.origin
    }

    /// Number of physical lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }

    /// The I/O error that ended iteration, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.io_error.take()
    }

    /// Read one logical line (joining `\` continuations). Returns (first line number, text).
    fn next_logical_line(&mut self) -> Option<(usize, String)> {
        let mut acc: Option<(usize, String)> = None;
        loop {
            if self.exhausted {
                return acc;
            }
            let physical = match self.lines.next() {
                Some(Ok(l)) => l,
                Some(Err(e)) => {
                    self.io_error = Some(e);
                    self.exhausted = true;
                    return acc;
                }
                None => {
                    self.exhausted = true;
                    return acc;
                }
            };
            self.line_no += 1;
            let mut text = physical.trim_end_matches(['\r', '\n']).to_string();
            if self.line_no == 1 {
                if let Some(stripped) = text.strip_prefix('\u{feff}') {
                    text = stripped.to_string();
                }
            }
            let continues = ends_with_continuation(&text);
            if continues {
                text.pop();
            }
            match acc.as_mut() {
                Some((_, buf)) => {
                    buf.push('\n');
                    buf.push_str(&text);
                }
                None => acc = Some((self.line_no, text)),
            }
            if !continues {
                return acc;
            }
        }
    }

    fn parse_line(&mut self, line: usize, raw: String) {
        let text = raw.trim();
        if text.is_empty() || text.starts_with("//") {
            return;
        }

        if let Some(rest) = text.strip_prefix('#') {
            self.in_data = true;
            let item = self.parse_timeframe(rest);
            self.push(line, raw, item);
            return;
        }

        if let Some(rest) = text.strip_prefix('-') {
            let item = match ObjectId::parse_hex(rest) {
                Some(id) => {
                    self.last_coords.remove(&id);
                    Ok(Record::ObjectRemoval { id })
                }
                None => Err((
                    DiagnosticKind::MalformedUpdate,
                    format!("invalid object id in removal '{}'", rest.trim()),
                )),
            };
            self.push(line, raw, item);
            return;
        }

        // Bare header line: `Key=Value` before the first frame. The value is taken verbatim.
        if !self.in_data {
            if let Some((k, v)) = text.split_once('=').filter(|(k, _)| !k.contains(',')) {
                let item = match k.trim() {
                    "" => Err((DiagnosticKind::MalformedHeader, "empty header key".into())),
                    key => self.header_field(key, v),
                };
                self.push(line, raw, item);
                return;
            }
        }

        let fields = split_fields(text);
        let Some((first, props)) = fields.split_first() else {
            return;
        };

        let Some(id) = ObjectId::parse_hex(first) else {
            let kind = if self.in_data {
                DiagnosticKind::MalformedUpdate
            } else {
                DiagnosticKind::MalformedHeader
            };
            self.push(line, raw, Err((kind, format!("invalid object id '{first}'"))));
            return;
        };

        if props.is_empty() {
            self.push(
                line,
                raw,
                Err((
                    DiagnosticKind::MalformedUpdate,
                    format!("update for {id} carries no properties"),
                )),
            );
            return;
        }

        if id.is_global() {
            self.parse_global(line, &raw, props);
            return;
        }

        let item = self.parse_update(id, props).map(|deltas| {
            self.seen.insert(id);
            Record::ObjectUpdate { id, deltas }
        });
        self.push(line, raw, item);
    }

    fn push(&mut self, line: usize, raw: String, item: Result<Record, (DiagnosticKind, String)>) {
        let parsed = match item {
            Ok(record) => Ok(LineRecord { line, raw, record }),
            Err((kind, message)) => Err(Diagnostic::new(kind, line, raw, message)),
        };
        self.pending.push_back(parsed);
    }

    fn parse_timeframe(&mut self, rest: &str) -> Result<Record, (DiagnosticKind, String)> {
        let seconds: f64 = rest.trim().parse().map_err(|_| {
            (
                DiagnosticKind::MalformedTimeframe,
                format!("invalid timeframe offset '{}'", rest.trim()),
            )
        })?;
        if !seconds.is_finite() {
            return Err((
                DiagnosticKind::MalformedTimeframe,
                format!("timeframe offset is not finite: {seconds}"),
            ));
        }
        if let Some(prev) = self.last_marker {
            if seconds <= prev {
                return Err((
                    DiagnosticKind::NonMonotonicTime,
                    format!("timeframe {seconds} does not advance past {prev}"),
                ));
            }
        }
        self.last_marker = Some(seconds);
        Ok(Record::TimeframeMarker { seconds })
    }

    /// Validate header keys the parser itself depends on.
    fn header_field(&mut self, key: &str, value: &str) -> Result<Record, (DiagnosticKind, String)> {
        match key {
            "ReferenceLongitude" | "ReferenceLatitude" => {
                let v: f64 = value.trim().parse().ok().filter(|v: &f64| v.is_finite()).ok_or_else(|| {
                    (
                        DiagnosticKind::MalformedHeader,
                        format!("{key} is not a number: '{value}'"),
                    )
                })?;
                if key == "ReferenceLongitude" {
                    self.reference_lon = v;
                } else {
                    self.reference_lat = v;
                }
            }
            _ => {}
        }
        Ok(Record::HeaderField {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn parse_global(&mut self, line: usize, raw: &str, props: &[String]) {
        for prop in props {
            let item = match split_key_value(prop) {
                Some(("Event", value)) => Ok(parse_event(value, &self.seen)),
                Some((k, v)) => self.header_field(k, v),
                None => Err((
                    DiagnosticKind::MalformedHeader,
                    format!("global property without key: '{prop}'"),
                )),
            };
            self.push(line, raw.to_string(), item);
        }
    }

    fn parse_update(
        &mut self,
        id: ObjectId,
        props: &[String],
    ) -> Result<PropertyDeltas, (DiagnosticKind, String)> {
        let mut deltas: PropertyDeltas = Vec::with_capacity(props.len());
        let mut coords: Option<RawCoords> = None;
        for prop in props {
            let (key, value) = split_key_value(prop).ok_or_else(|| {
                (
                    DiagnosticKind::MalformedUpdate,
                    format!("property without key=value: '{prop}'"),
                )
            })?;
            if key == COORDINATES_KEY {
                coords = Some(parse_raw_coords(value)?);
                continue;
            }
            let v = decode_property(key, value)
                .map_err(|msg| (DiagnosticKind::MalformedUpdate, msg))?;
            deltas.push((key.to_string(), v));
        }

        // Resolve coordinates last so a rejected line leaves no trace in parser state.
        if let Some(raw) = coords {
            let mut merged = self.last_coords.get(&id).copied().unwrap_or_default();
            merged.merge(&raw);
            let c = self.resolve_coordinates(id, &merged)?;
            self.last_coords.insert(id, merged);
            deltas.push((COORDINATES_KEY.to_string(), PropertyValue::Coordinates(c)));
        }
        Ok(deltas)
    }

    fn resolve_coordinates(
        &mut self,
        id: ObjectId,
        raw: &RawCoords,
    ) -> Result<Coordinates, (DiagnosticKind, String)> {
        let (Some(lon), Some(lat), Some(alt)) = (raw.lon, raw.lat, raw.alt) else {
            return Err((
                DiagnosticKind::MissingCoordinateOrigin,
                format!("{id} has no prior longitude/latitude/altitude to fill empty T fields"),
            ));
        };
        let geo = GeoPoint::new(lon + self.reference_lon, lat + self.reference_lat, alt);
        let origin = *self.origin.get_or_insert_with(|| {
            log::debug!("local frame origin set to {geo:?} by object {id}");
            geo
        });
        let local = self.converter.to_local(&origin, &geo);
        let orientation = match (raw.roll, raw.pitch, raw.yaw) {
            (Some(r), Some(p), Some(y)) => Some(Orientation::new(r, p, y)),
            _ => None,
        };
        let flat = match (raw.u, raw.v) {
            (Some(u), Some(v)) => Some([u, v]),
            _ => None,
        };
        Ok(Coordinates {
            geo,
            local,
            orientation,
            flat,
            heading: raw.heading,
        })
    }
}

impl<I> Iterator for RecordParser<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = ParseItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let (line, text) = self.next_logical_line()?;
            self.parse_line(line, text);
        }
    }
}

/// True when the line ends in an odd number of backslashes (an unescaped continuation).
fn ends_with_continuation(s: &str) -> bool {
    s.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

/// Split on unescaped commas, unescaping `\,` and `\\`.
pub fn split_fields(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(',') => cur.push(','),
                Some('\\') => cur.push('\\'),
                Some(other) => {
                    cur.push('\\');
                    cur.push(other);
                }
                None => cur.push('\\'),
            },
            ',' => out.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

fn split_key_value(prop: &str) -> Option<(&str, &str)> {
    let (k, v) = prop.split_once('=')?;
    let k = k.trim();
    if k.is_empty() {
        None
    } else {
        Some((k, v))
    }
}

/// Split `Name|id|id|text`. A slot is an id only when it names an object already seen, so
/// words such as `Dead` or `Fade` stay in the text.
fn parse_event(value: &str, seen: &HashSet<ObjectId>) -> Record {
    let mut parts = value.split('|');
    let name = parts.next().unwrap_or_default().trim().to_string();
    let mut ids = Vec::new();
    let mut text_parts = Vec::new();
    for p in parts {
        // Leading id slots, then free text (which may itself contain '|').
        if text_parts.is_empty() {
            if let Some(id) = ObjectId::parse_hex(p).filter(|id| seen.contains(id)) {
                ids.push(id);
                continue;
            }
        }
        text_parts.push(p);
    }
    Record::GlobalEvent {
        name,
        ids,
        text: text_parts.join("|"),
    }
}

fn parse_slot(s: &str, slot: &str) -> Result<Option<f64>, (DiagnosticKind, String)> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| {
            (
                DiagnosticKind::MalformedUpdate,
                format!("T {slot} is not a number: '{s}'"),
            )
        })
}

/// Decode a `T` value. Accepted layouts (by field count):
/// 3 `lon|lat|alt`, 5 `lon|lat|alt|u|v`, 6 `lon|lat|alt|roll|pitch|yaw`,
/// 9 `lon|lat|alt|roll|pitch|yaw|u|v|heading`.
fn parse_raw_coords(value: &str) -> Result<RawCoords, (DiagnosticKind, String)> {
    const NAMES_3: [&str; 3] = ["longitude", "latitude", "altitude"];
    const NAMES_5: [&str; 5] = ["longitude", "latitude", "altitude", "u", "v"];
    const NAMES_6: [&str; 6] = ["longitude", "latitude", "altitude", "roll", "pitch", "yaw"];
    const NAMES_9: [&str; 9] = [
        "longitude", "latitude", "altitude", "roll", "pitch", "yaw", "u", "v", "heading",
    ];

    let fields: Vec<&str> = value.split('|').collect();
    let names: &[&str] = match fields.len() {
        3 => &NAMES_3,
        5 => &NAMES_5,
        6 => &NAMES_6,
        9 => &NAMES_9,
        n => {
            return Err((
                DiagnosticKind::MalformedUpdate,
                format!("T has {n} fields, expected 3, 5, 6 or 9"),
            ))
        }
    };
    let mut raw = RawCoords::default();
    for (field, name) in fields.iter().zip(names.iter()) {
        let v = parse_slot(field, name)?;
        match *name {
            "longitude" => raw.lon = v,
            "latitude" => raw.lat = v,
            "altitude" => raw.alt = v,
            "roll" => raw.roll = v,
            "pitch" => raw.pitch = v,
            "yaw" => raw.yaw = v,
            "u" => raw.u = v,
            "v" => raw.v = v,
            "heading" => raw.heading = v,
            _ => {}
        }
    }
    Ok(raw)
}

/// Decode a non-coordinate property into the tagged value model.
pub fn decode_property(key: &str, value: &str) -> Result<PropertyValue, String> {
    if TEXT_KEYS.contains(&key) {
        return Ok(PropertyValue::Text(value.to_string()));
    }
    let parsed = value.trim().parse::<f64>().ok().filter(|v| v.is_finite());
    if NUMERIC_KEYS.contains(&key) {
        return parsed
            .map(PropertyValue::Number)
            .ok_or_else(|| format!("{key} is not a number: '{value}'"));
    }
    Ok(match parsed {
        Some(n) => PropertyValue::Number(n),
        None => PropertyValue::Text(value.to_string()),
    })
}
