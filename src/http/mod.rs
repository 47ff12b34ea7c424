//! HTTP control surface
//!
//! This module handles HTTP request routing and handling:
//! - Source registration, listing and removal
//! - Immediate and crossfaded switching by source name
//! - Engine status, forced reset and process log retrieval
//! - CORS middleware

pub mod handlers;
pub mod routes;
pub mod sources;

pub use routes::create_router;
