//! ffmpeg process module
//!
//! This module handles:
//! - Argument sets for probes, writers, crossfades and the output encoder
//! - Spawning and terminating ffmpeg processes in their own process groups
//! - The rotating log that collects every child's diagnostic output

pub mod args;
pub mod log;
pub mod supervisor;

pub use args::{ArgBuilder, CrossfadePlan};
pub use log::ProcessLog;
pub use supervisor::{ManagedProcess, ProcessRole, ProcessSupervisor, Termination};
