//! Error types: recoverable parse diagnostics and fatal load/playback errors.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Classes of recoverable input problems. The offending line is skipped.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    MalformedHeader,
    MalformedTimeframe,
    MalformedUpdate,
    UnknownIdOnRemoval,
    NonMonotonicTime,
    MissingCoordinateOrigin,
}

impl DiagnosticKind {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed header",
            Self::MalformedTimeframe => "malformed timeframe",
            Self::MalformedUpdate => "malformed update",
            Self::UnknownIdOnRemoval => "unknown id on removal",
            Self::NonMonotonicTime => "non-monotonic time",
            Self::MissingCoordinateOrigin => "missing coordinate origin",
        }
    }
}

/// One skipped line, kept for display by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("line {line}: {}: {message}", .kind.name())]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// 1-based number of the (first physical) line.
    pub line: usize,
    pub raw: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        line: usize,
        raw: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line,
            raw: raw.into(),
            message: message.into(),
        }
    }
}

/// Ordered diagnostics of one load, capped at a configured size.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
    dropped: usize,
    #[serde(skip)]
    capacity: usize,
}

impl DiagnosticLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            dropped: 0,
            capacity,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        if self.entries.len() < self.capacity {
            self.entries.push(diagnostic);
        } else {
            self.dropped += 1;
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Diagnostics counted but not stored because the log was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn total(&self) -> usize {
        self.entries.len() + self.dropped
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Conditions that prevent a recording from being constructed at all.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error after line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("not an ACMI recording (FileType: {})", .found.as_deref().unwrap_or("missing"))]
    UnrecognizedFileType { found: Option<String> },

    #[error("load cancelled")]
    Cancelled,

    #[error("load superseded by a newer request")]
    Superseded,
}

/// Rejected playback commands. Out-of-range seeks are clamped, not errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("playback speed must be finite and >= 0, got {speed}")]
    InvalidSpeed { speed: f64 },

    #[error("trail duration must be finite and >= 0, got {seconds}")]
    InvalidTrailDuration { seconds: f64 },

    #[error("no recording loaded")]
    NoRecording,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_names_line_and_kind() {
        let d = Diagnostic::new(DiagnosticKind::MalformedUpdate, 12, "7A,T=x|1|2", "bad number");
        assert_eq!(d.to_string(), "line 12: malformed update: bad number");
    }

    #[test]
    fn log_caps_and_counts() {
        let mut log = DiagnosticLog::with_capacity(2);
        for i in 0..5 {
            log.push(Diagnostic::new(DiagnosticKind::MalformedTimeframe, i, "#x", "bad"));
        }
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.dropped(), 3);
        assert_eq!(log.total(), 5);
        assert_eq!(log.count(DiagnosticKind::MalformedTimeframe), 2);
    }

    #[test]
    fn load_error_messages() {
        let e = LoadError::UnrecognizedFileType { found: None };
        assert_eq!(e.to_string(), "not an ACMI recording (FileType: missing)");
        let e = LoadError::UnrecognizedFileType {
            found: Some("text/csv".into()),
        };
        assert!(e.to_string().contains("text/csv"));
    }
}
