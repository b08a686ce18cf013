//! Playback controller: cursor state machine and frame assembly over a loaded [`Recording`].
//!
//! The controller has no timers. The host drives it with `tick(dt)` from whatever loop it runs
//! and reads frames with `frame()` / `frame_at(t)`.

use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::config::PlaybackDefaults;
use crate::error::PlaybackError;
use crate::ids::ObjectId;
use crate::inputs::PlaybackCommand;
use crate::outputs::{Frame, FrameEntry, PlaybackEvent};
use crate::recording::Recording;
use crate::value::EntityKind;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug)]
pub struct PlaybackController {
    recording: Arc<Recording>,
    state: PlaybackState,
    cursor: f64,
    speed: f64,
    trail: f64,
    hidden: HashSet<EntityKind>,
    events: Vec<PlaybackEvent>,
}

impl PlaybackController {
    pub fn new(recording: Arc<Recording>, defaults: &PlaybackDefaults) -> Self {
        let speed = if defaults.speed.is_finite() && defaults.speed >= 0.0 {
            defaults.speed
        } else {
            1.0
        };
        let trail = if defaults.trail_duration.is_finite() && defaults.trail_duration >= 0.0 {
            defaults.trail_duration
        } else {
            0.0
        };
        Self {
            cursor: recording.start(),
            recording,
            state: PlaybackState::Stopped,
            speed,
            trail,
            hidden: defaults.hidden_kinds.iter().copied().collect(),
            events: Vec::new(),
        }
    }

    pub fn recording(&self) -> &Arc<Recording> {
        &self.recording
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[inline]
    pub fn trail_duration(&self) -> f64 {
        self.trail
    }

    pub fn is_visible(&self, kind: EntityKind) -> bool {
        !self.hidden.contains(&kind)
    }

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn play(&mut self) {
        if self.state == PlaybackState::Playing {
            return;
        }
        if self.speed == 0.0 {
            self.speed = 1.0;
            self.events.push(PlaybackEvent::SpeedChanged { speed: 1.0 });
        }
        // Playing from the end replays from the start.
        if self.cursor >= self.recording.end() && self.recording.duration() > 0.0 {
            self.move_cursor(self.recording.start());
        }
        let event = match self.state {
            PlaybackState::Stopped => PlaybackEvent::Started,
            _ => PlaybackEvent::Resumed,
        };
        self.state = PlaybackState::Playing;
        self.events.push(event);
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.events.push(PlaybackEvent::Paused);
        }
    }

    pub fn stop(&mut self) {
        self.move_cursor(self.recording.start());
        if self.state != PlaybackState::Stopped {
            self.state = PlaybackState::Stopped;
            self.events.push(PlaybackEvent::Stopped);
        }
    }

    /// Move the cursor, clamped to the recording bounds. State is unchanged.
    pub fn seek(&mut self, t: f64) {
        let to = self.recording.clamp_time(t);
        self.move_cursor(to);
    }

    fn move_cursor(&mut self, to: f64) {
        if to != self.cursor {
            self.events.push(PlaybackEvent::Seeked {
                from: self.cursor,
                to,
            });
            self.cursor = to;
        }
    }

    /// Advance by `dt` wall seconds scaled by speed. Only effective while playing.
    pub fn tick(&mut self, dt: f64) {
        if self.state != PlaybackState::Playing || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let end = self.recording.end();
        self.cursor = (self.cursor + dt * self.speed).min(end);
        if self.cursor >= end {
            self.state = PlaybackState::Paused;
            self.events.push(PlaybackEvent::Ended { time: end });
        }
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), PlaybackError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(PlaybackError::InvalidSpeed { speed });
        }
        if speed != self.speed {
            self.speed = speed;
            self.events.push(PlaybackEvent::SpeedChanged { speed });
        }
        if speed == 0.0 {
            self.pause();
        }
        Ok(())
    }

    pub fn set_trail_duration(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlaybackError::InvalidTrailDuration { seconds });
        }
        if seconds != self.trail {
            self.trail = seconds;
            self.events.push(PlaybackEvent::TrailChanged { seconds });
        }
        Ok(())
    }

    pub fn set_visibility(&mut self, kind: EntityKind, visible: bool) {
        let changed = if visible {
            self.hidden.remove(&kind)
        } else {
            self.hidden.insert(kind)
        };
        if changed {
            self.events.push(PlaybackEvent::VisibilityChanged { kind, visible });
        }
    }

    pub fn execute(&mut self, cmd: PlaybackCommand) -> Result<(), PlaybackError> {
        match cmd {
            PlaybackCommand::Play => self.play(),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Stop => self.stop(),
            PlaybackCommand::Seek { time } => self.seek(time),
            PlaybackCommand::SetSpeed { speed } => self.set_speed(speed)?,
            PlaybackCommand::SetTrailDuration { seconds } => self.set_trail_duration(seconds)?,
            PlaybackCommand::SetVisibility { kind, visible } => self.set_visibility(kind, visible),
        }
        Ok(())
    }

    /// Apply commands in order and return the events they produced. Stops at the first
    /// rejected command; commands before it stay applied and their events stay queued.
    pub fn apply(&mut self, cmds: Vec<PlaybackCommand>) -> Result<Vec<PlaybackEvent>, PlaybackError> {
        for cmd in cmds {
            self.execute(cmd)?;
        }
        Ok(self.take_events())
    }

    /// Frame at the current cursor.
    pub fn frame(&self) -> Frame {
        self.frame_at(self.cursor)
    }

    /// Visible entities with a position at `t` (clamped), each with its trail.
    pub fn frame_at(&self, t: f64) -> Frame {
        let rec = &*self.recording;
        let t = rec.clamp_time(t);
        let store = rec.registry().store();
        let mut frame = Frame {
            time: t,
            ..Frame::default()
        };
        for entity in rec.visible_at(t) {
            if !self.is_visible(entity.kind()) {
                continue;
            }
            let Some(snapshot) = store.query(entity.key, t) else {
                continue;
            };
            let trail = store.trajectory(entity.key, t, self.trail);
            frame.entries.insert(
                entity.id,
                FrameEntry {
                    kind: entity.kind(),
                    snapshot,
                    trail,
                },
            );
        }
        frame
    }

    /// Visible-kind entities alive at the cursor, ordered by id.
    pub fn entity_list(&self) -> Vec<(ObjectId, EntityKind)> {
        self.recording
            .entities_at(self.cursor)
            .into_iter()
            .filter(|(_, kind)| self.is_visible(*kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::importer::load_str;

    const TEXT: &str = "FileType=text/acmi/tacview\nFileVersion=2.1\n#0\n\
        1,T=0|0|0,Type=Air+FixedWing\n2,T=0.01|0|0,Type=Misc+Explosion\n#10\n1,T=0.01|0|0\n";

    fn controller() -> PlaybackController {
        let rec = load_str(TEXT, &Config::default()).unwrap();
        PlaybackController::new(Arc::new(rec), &PlaybackDefaults::default())
    }

    #[test]
    fn play_pause_stop_transitions() {
        let mut pc = controller();
        assert_eq!(pc.state(), PlaybackState::Stopped);
        pc.play();
        assert_eq!(pc.state(), PlaybackState::Playing);
        pc.tick(2.0);
        assert_eq!(pc.cursor(), 2.0);
        pc.pause();
        pc.tick(2.0);
        assert_eq!(pc.cursor(), 2.0);
        pc.play();
        pc.stop();
        assert_eq!(pc.state(), PlaybackState::Stopped);
        assert_eq!(pc.cursor(), 0.0);
        assert_eq!(
            pc.take_events(),
            vec![
                PlaybackEvent::Started,
                PlaybackEvent::Paused,
                PlaybackEvent::Resumed,
                PlaybackEvent::Seeked { from: 2.0, to: 0.0 },
                PlaybackEvent::Stopped,
            ]
        );
    }

    #[test]
    fn tick_clamps_and_pauses_at_end() {
        let mut pc = controller();
        pc.play();
        pc.set_speed(4.0).unwrap();
        pc.tick(5.0);
        assert_eq!(pc.cursor(), 10.0);
        assert_eq!(pc.state(), PlaybackState::Paused);
        assert!(pc.take_events().contains(&PlaybackEvent::Ended { time: 10.0 }));
        pc.seek(3.0);
        pc.play();
        assert_eq!(pc.cursor(), 3.0);
        assert_eq!(pc.state(), PlaybackState::Playing);
    }

    #[test]
    fn zero_speed_pauses_and_play_restores() {
        let mut pc = controller();
        pc.play();
        pc.set_speed(0.0).unwrap();
        assert_eq!(pc.state(), PlaybackState::Paused);
        pc.play();
        assert_eq!(pc.speed(), 1.0);
        assert!(matches!(pc.set_speed(-1.0), Err(PlaybackError::InvalidSpeed { .. })));
        assert!(matches!(pc.set_speed(f64::NAN), Err(PlaybackError::InvalidSpeed { .. })));
        assert!(pc.set_trail_duration(f64::INFINITY).is_err());
    }

    #[test]
    fn seek_clamps_in_every_state() {
        let mut pc = controller();
        pc.seek(-5.0);
        assert_eq!(pc.cursor(), 0.0);
        pc.seek(500.0);
        assert_eq!(pc.cursor(), 10.0);
        assert_eq!(pc.state(), PlaybackState::Stopped);
    }

    #[test]
    fn visibility_filters_frames_and_lists() {
        let mut pc = controller();
        pc.seek(5.0);
        assert_eq!(pc.frame().len(), 2);
        pc.set_visibility(EntityKind::Explosion, false);
        let frame = pc.frame();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.get(ObjectId(1)).unwrap().kind, EntityKind::Aircraft);
        assert_eq!(pc.entity_list(), vec![(ObjectId(1), EntityKind::Aircraft)]);
    }

    #[test]
    fn trail_follows_duration() {
        let mut pc = controller();
        pc.seek(10.0);
        assert_eq!(pc.frame().get(ObjectId(1)).unwrap().trail.len(), 2);
        pc.set_trail_duration(5.0).unwrap();
        assert_eq!(pc.frame().get(ObjectId(1)).unwrap().trail.len(), 1);
    }

    #[test]
    fn apply_batches_commands() {
        let mut pc = controller();
        let events = pc
            .apply(vec![
                PlaybackCommand::SetTrailDuration { seconds: 2.0 },
                PlaybackCommand::Seek { time: 4.0 },
                PlaybackCommand::Play,
            ])
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(pc.trail_duration(), 2.0);
        let err = pc.apply(vec![PlaybackCommand::Pause, PlaybackCommand::SetSpeed { speed: -2.0 }]);
        assert!(err.is_err());
        assert_eq!(pc.state(), PlaybackState::Paused);
        assert_eq!(pc.take_events(), vec![PlaybackEvent::Paused]);
    }
}
