//! Engine state guarded by the engine lock, and the published snapshot

use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::conduit::FifoConduit;
use crate::ffmpeg::ManagedProcess;

/// What the conduit is currently carrying
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Empty,
    Playing {
        locator: String,
    },
    Crossfading {
        from: String,
        to: String,
    },
}

impl PlaybackState {
    /// The committed locator. During a crossfade this is the incoming source.
    pub fn active_locator(&self) -> Option<&str> {
        match self {
            PlaybackState::Empty => None,
            PlaybackState::Playing { locator } => Some(locator.as_str()),
            PlaybackState::Crossfading { to, .. } => Some(to.as_str()),
        }
    }

    pub fn is_crossfading(&self) -> bool {
        matches!(self, PlaybackState::Crossfading { .. })
    }
}

/// Everything the engine lock protects
#[derive(Debug)]
pub(crate) struct ActiveState {
    pub playback: PlaybackState,
    pub play_started: Option<Instant>,
    pub playing_since: Option<chrono::DateTime<chrono::Local>>,
    pub writer: Option<ManagedProcess>,
    pub output: Option<ManagedProcess>,
    pub conduit: Option<FifoConduit>,
    /// Bumped on every writer spawn; pending crossfade settles compare against it
    pub generation: u64,
    pub resets: u64,
    pub shut_down: bool,
}

impl ActiveState {
    pub fn new(conduit: FifoConduit, output: Option<ManagedProcess>) -> Self {
        Self {
            playback: PlaybackState::Empty,
            play_started: None,
            playing_since: None,
            writer: None,
            output,
            conduit: Some(conduit),
            generation: 0,
            resets: 0,
            shut_down: false,
        }
    }

    pub fn writer_alive(&mut self) -> bool {
        self.writer.as_mut().map(|w| w.is_running()).unwrap_or(false)
    }

    /// Record a committed switch to `playback`
    pub fn commit(&mut self, playback: PlaybackState) {
        self.playback = playback;
        self.play_started = Some(Instant::now());
        self.playing_since = Some(chrono::Local::now());
    }

    pub fn clear(&mut self) {
        self.playback = PlaybackState::Empty;
        self.play_started = None;
        self.playing_since = None;
    }

    pub fn snapshot(&self, fifo_path: &Path) -> EngineStatus {
        let (crossfade_from, is_crossfading) = match &self.playback {
            PlaybackState::Crossfading { from, .. } => (Some(from.clone()), true),
            _ => (None, false),
        };
        EngineStatus {
            active_locator: self.playback.active_locator().map(String::from),
            is_crossfading,
            crossfade_from,
            playing_since: self.playing_since.map(|t| t.to_rfc3339()),
            writer_pid: self.writer.as_ref().and_then(|w| w.pid()),
            output_pid: self.output.as_ref().and_then(|o| o.pid()),
            resets: self.resets,
            fifo_path: fifo_path.to_string_lossy().to_string(),
            shut_down: self.shut_down,
        }
    }
}

/// Point-in-time view of the engine, readable without the engine lock
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub active_locator: Option<String>,
    pub is_crossfading: bool,
    pub crossfade_from: Option<String>,
    pub playing_since: Option<String>,
    pub writer_pid: Option<u32>,
    pub output_pid: Option<u32>,
    pub resets: u64,
    pub fifo_path: String,
    pub shut_down: bool,
}
