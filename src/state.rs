//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The stream engine
//! - The named source registry
//! - Server configuration

use crate::config::ServerConfig;
use crate::engine::{EngineStatus, StreamEngine};
use crate::registry::SourceRegistry;

/// Application state shared across all handlers
pub struct AppState {
    /// Source switching engine
    pub engine: StreamEngine,

    /// Name -> locator map
    pub registry: SourceRegistry,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(engine: StreamEngine, registry: SourceRegistry, config: ServerConfig) -> Self {
        Self {
            engine,
            registry,
            config,
        }
    }

    /// Engine snapshot plus the registry name of the active locator
    pub fn status(&self) -> (EngineStatus, Option<String>) {
        let status = self.engine.status();
        let name = status
            .active_locator
            .as_deref()
            .and_then(|locator| self.registry.name_of(locator));
        (status, name)
    }

    /// Turn the configured default source into a locator. A registered
    /// name wins; anything else is taken as a locator.
    pub fn default_locator(config: &ServerConfig, registry: &SourceRegistry) -> Option<String> {
        let default = config.default_source.as_deref()?;
        Some(registry.resolve(default).unwrap_or_else(|_| default.to_string()))
    }
}
