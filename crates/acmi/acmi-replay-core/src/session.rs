//! Session: the current recording, its playback controller and load bookkeeping.
//!
//! Loads are two-phase so they can run off the host thread:
//! `begin_load` hands out a [`LoadTicket`], the ticket's `run*` methods import on any thread, and
//! `finish_load` promotes the result only when the ticket is still the latest one issued. Starting
//! a new load cancels the previous ticket. The current recording is never replaced by a failed,
//! cancelled or stale load.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{LoadError, PlaybackError, SessionError};
use crate::importer::Importer;
use crate::inputs::SessionCommand;
use crate::outputs::{Frame, PlaybackEvent};
use crate::playback::PlaybackController;
use crate::recording::Recording;

/// Handle for one in-flight load.
#[derive(Clone, Debug)]
pub struct LoadTicket {
    generation: u64,
    cancel: Arc<AtomicBool>,
}

impl LoadTicket {
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn run(&self, path: impl AsRef<Path>, cfg: &Config) -> Result<Recording, LoadError> {
        Importer::new(cfg.clone()).load_path(path, Some(&self.cancel))
    }

    pub fn run_reader<R: BufRead>(&self, reader: R, cfg: &Config) -> Result<Recording, LoadError> {
        Importer::new(cfg.clone()).load_reader(reader, Some(&self.cancel))
    }
}

#[derive(Debug, Default)]
pub struct Session {
    cfg: Config,
    generation: u64,
    in_flight: Option<LoadTicket>,
    controller: Option<PlaybackController>,
}

impl Session {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Issue a ticket for a new load, cancelling any load still in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.cancel_load();
        self.generation += 1;
        let ticket = LoadTicket {
            generation: self.generation,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        self.in_flight = Some(ticket.clone());
        ticket
    }

    pub fn cancel_load(&mut self) {
        if let Some(t) = self.in_flight.take() {
            log::debug!("cancelling load #{}", t.generation);
            t.cancel();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Promote a finished load if its ticket is the latest. Returns the `Loaded` event.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Recording, LoadError>,
    ) -> Result<PlaybackEvent, LoadError> {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding load #{} (latest is #{})",
                ticket.generation,
                self.generation
            );
            return Err(LoadError::Superseded);
        }
        self.in_flight = None;
        let recording = result?;
        if ticket.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let event = PlaybackEvent::Loaded {
            entities: recording.registry().len(),
            diagnostics: recording.diagnostics().total(),
            start: recording.start(),
            end: recording.end(),
        };
        self.controller = Some(PlaybackController::new(
            Arc::new(recording),
            &self.cfg.playback,
        ));
        Ok(event)
    }

    /// Synchronous load on the calling thread.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<PlaybackEvent, LoadError> {
        let ticket = self.begin_load();
        let result = ticket.run(path, &self.cfg);
        self.finish_load(&ticket, result)
    }

    pub fn recording(&self) -> Option<&Arc<Recording>> {
        self.controller.as_ref().map(PlaybackController::recording)
    }

    pub fn controller(&self) -> Option<&PlaybackController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Result<&mut PlaybackController, PlaybackError> {
        self.controller.as_mut().ok_or(PlaybackError::NoRecording)
    }

    pub fn tick(&mut self, dt: f64) -> Result<Vec<PlaybackEvent>, PlaybackError> {
        let pc = self.controller_mut()?;
        pc.tick(dt);
        Ok(pc.take_events())
    }

    pub fn frame(&self) -> Result<Frame, PlaybackError> {
        self.controller
            .as_ref()
            .map(PlaybackController::frame)
            .ok_or(PlaybackError::NoRecording)
    }

    /// Apply host commands in order. Stops at the first failure.
    pub fn apply(&mut self, cmds: Vec<SessionCommand>) -> Result<Vec<PlaybackEvent>, SessionError> {
        let mut events = Vec::new();
        for cmd in cmds {
            match cmd {
                SessionCommand::Load { path } => events.push(self.load(&path)?),
                SessionCommand::Playback(cmd) => {
                    let pc = self.controller_mut()?;
                    pc.execute(cmd)?;
                    events.extend(pc.take_events());
                }
            }
        }
        Ok(events)
    }
}
