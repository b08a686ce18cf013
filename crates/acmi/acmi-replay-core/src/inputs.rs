//! Input contracts: commands a host issues to the playback controller and session.
//!
//! Hosts may call controller methods directly or batch these commands through
//! `PlaybackController::apply` / `Session::apply`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::value::EntityKind;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Stop,
    Seek { time: f64 },
    SetSpeed { speed: f64 },
    SetTrailDuration { seconds: f64 },
    SetVisibility { kind: EntityKind, visible: bool },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Load a recording synchronously, replacing the current one on success.
    Load { path: PathBuf },
    Playback(PlaybackCommand),
}

impl From<PlaybackCommand> for SessionCommand {
    fn from(cmd: PlaybackCommand) -> Self {
        SessionCommand::Playback(cmd)
    }
}
