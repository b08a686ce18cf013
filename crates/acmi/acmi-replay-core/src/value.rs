//! Typed property values decoded from ACMI records, plus entity classification.

use serde::{Deserialize, Serialize};

/// Coarse entity classification derived from the `Type` tag list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EntityKind {
    Aircraft,
    Missile,
    Explosion,
    Unknown,
}

/// Name prefixes of air-to-air and air-to-ground missiles, used when no `Type` is present.
const MISSILE_NAME_PREFIXES: [&str; 3] = ["AIM-", "AGM-", "R-"];

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Aircraft,
        EntityKind::Missile,
        EntityKind::Explosion,
        EntityKind::Unknown,
    ];

    /// Classify a `+`-delimited tag list such as `Air+FixedWing` or `Weapon+Missile`.
    /// Best-effort string matching; unknown tag sets classify as Unknown.
    pub fn classify(type_tags: &str) -> Self {
        let mut kind = EntityKind::Unknown;
        for tag in type_tags.split('+').map(str::trim) {
            if tag.eq_ignore_ascii_case("Explosion") {
                // Explosion wins over any other tag on the same object.
                return EntityKind::Explosion;
            }
            if tag.eq_ignore_ascii_case("Missile")
                || tag.eq_ignore_ascii_case("Rocket")
                || tag.eq_ignore_ascii_case("Weapon")
            {
                kind = EntityKind::Missile;
            } else if tag.eq_ignore_ascii_case("Air") && kind == EntityKind::Unknown {
                kind = EntityKind::Aircraft;
            }
        }
        kind
    }

    /// Fallback for objects that never declare a `Type`.
    pub fn from_name_hint(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        MISSILE_NAME_PREFIXES
            .iter()
            .any(|p| upper.starts_with(p))
            .then_some(EntityKind::Missile)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aircraft => "aircraft",
            Self::Missile => "missile",
            Self::Explosion => "explosion",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown entity kind '{s}' (aircraft, missile, explosion, unknown)"))
    }
}

/// Geodetic position: degrees and metres above the ellipsoid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self { lon, lat, alt }
    }
}

/// Attitude in degrees as recorded (roll about the longitudinal axis, pitch, yaw).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// Decoded `T` property. `local` is the east/north/up position relative to the recording's
/// local-frame origin, computed once at ingest.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub geo: GeoPoint,
    pub local: [f64; 3],
    #[serde(default)]
    pub orientation: Option<Orientation>,
    /// Flat-world U/V offsets in metres, when the recorder provides them.
    #[serde(default)]
    pub flat: Option<[f64; 2]>,
    #[serde(default)]
    pub heading: Option<f64>,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Number,
    Coordinates,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Coordinates(Coordinates),
}

impl PropertyValue {
    #[inline]
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Text(_) => PropertyKind::Text,
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Coordinates(_) => PropertyKind::Coordinates,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_coordinates(&self) -> Option<&Coordinates> {
        match self {
            PropertyValue::Coordinates(c) => Some(c),
            _ => None,
        }
    }
}

/// Ordered property deltas of one update record.
pub type PropertyDeltas = Vec<(String, PropertyValue)>;
