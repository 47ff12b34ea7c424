//! Live audio source switcher
//!
//! Keeps a single encoded output stream alive while the audio feeding it is
//! switched between files, network streams and capture devices, either
//! instantly or with a crossfade.

pub mod conduit;
pub mod config;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod http;
pub mod locator;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod tests;

pub use config::{EngineConfig, ServerConfig};
pub use engine::{EngineStatus, PlaybackState, StreamEngine, SwitchOutcome};
pub use error::{EngineError, RegistryError, Result, ServerError};
pub use registry::SourceRegistry;
