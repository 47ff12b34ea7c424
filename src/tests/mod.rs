//! Integration testing module
//!
//! Scenario tests that run the engine and the HTTP control surface against
//! a stand-in ffmpeg script:
//! - Injection, crossfades and their settle step
//! - Validation refusals and spawn failures
//! - FIFO watchdog resets
//! - Shutdown cleanup
//! - HTTP routes

pub mod http;
