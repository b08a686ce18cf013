//! Configuration for import and playback.

use serde::{Deserialize, Serialize};

use crate::value::{EntityKind, GeoPoint};

/// Configuration for ingest retention, coordinate origin and playback defaults.
/// Every field has a default so partial JSON documents are accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Per-entity snapshot retention applied at ingest.
    pub retention: RetentionPolicy,
    /// How the local Cartesian frame is anchored.
    pub origin: OriginPolicy,
    pub playback: PlaybackDefaults,
    /// Diagnostics stored per recording; further ones are only counted.
    pub max_diagnostics: usize,
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetentionPolicy {
    #[default]
    Unbounded,
    MaxSnapshots {
        count: usize,
    },
    MaxAge {
        seconds: f64,
    },
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OriginPolicy {
    /// The first complete coordinate in the file becomes the origin.
    #[default]
    FirstSeen,
    Fixed {
        point: GeoPoint,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackDefaults {
    pub speed: f64,
    /// Trail window in seconds.
    pub trail_duration: f64,
    /// Kinds hidden when a recording is first opened.
    pub hidden_kinds: Vec<EntityKind>,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            speed: 1.0,
            trail_duration: 30.0,
            hidden_kinds: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::Unbounded,
            origin: OriginPolicy::FirstSeen,
            playback: PlaybackDefaults::default(),
            max_diagnostics: 10_000,
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self, String> {
        let cfg: Config = serde_json::from_str(s).map_err(|e| format!("config parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        let pb = &self.playback;
        if !pb.speed.is_finite() || pb.speed < 0.0 {
            return Err(format!("playback.speed must be finite and >= 0, got {}", pb.speed));
        }
        if !pb.trail_duration.is_finite() || pb.trail_duration < 0.0 {
            return Err(format!(
                "playback.trail_duration must be finite and >= 0, got {}",
                pb.trail_duration
            ));
        }
        match self.retention {
            RetentionPolicy::MaxSnapshots { count } if count == 0 => {
                return Err("retention.count must be > 0".into());
            }
            RetentionPolicy::MaxAge { seconds } if !seconds.is_finite() || seconds < 0.0 => {
                return Err(format!("retention.seconds must be finite and >= 0, got {seconds}"));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = Config::from_json_str(r#"{ "playback": { "trail_duration": 12.5 } }"#).unwrap();
        assert_eq!(cfg.playback.trail_duration, 12.5);
        assert_eq!(cfg.playback.speed, 1.0);
        assert_eq!(cfg.retention, RetentionPolicy::Unbounded);
        assert_eq!(cfg.origin, OriginPolicy::FirstSeen);
    }

    #[test]
    fn tagged_policies_parse() {
        let cfg = Config::from_json_str(
            r#"{
                "retention": { "mode": "max_snapshots", "count": 500 },
                "origin": { "mode": "fixed", "point": { "lon": 120.0, "lat": 60.0, "alt": 0.0 } },
                "playback": { "hidden_kinds": ["Explosion"] }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.retention, RetentionPolicy::MaxSnapshots { count: 500 });
        assert_eq!(
            cfg.origin,
            OriginPolicy::Fixed {
                point: GeoPoint::new(120.0, 60.0, 0.0)
            }
        );
        assert_eq!(cfg.playback.hidden_kinds, vec![EntityKind::Explosion]);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(Config::from_json_str(r#"{ "playback": { "speed": -1.0 } }"#).is_err());
        assert!(Config::from_json_str(r#"{ "retention": { "mode": "max_snapshots", "count": 0 } }"#).is_err());
        assert!(Config::from_json_str("not json").is_err());
    }
}
