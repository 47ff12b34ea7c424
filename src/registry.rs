//! Named sources
//!
//! A persisted name -> locator map. The engine only ever sees resolved
//! locators; names exist for the control surface.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug)]
pub struct SourceRegistry {
    path: PathBuf,
    sources: RwLock<BTreeMap<String, String>>,
}

impl SourceRegistry {
    /// Load the map from `path`, or start empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sources = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        tracing::info!(path = %path.display(), count = sources.len(), "source registry loaded");

        Ok(Self {
            path,
            sources: RwLock::new(sources),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or replace a source. Returns the locator it replaced.
    pub fn add(&self, name: &str, locator: &str) -> Result<Option<String>> {
        validate_name(name)?;
        let mut sources = self.sources.write();
        let replaced = sources.insert(name.to_string(), locator.to_string());
        self.save(&sources)?;
        Ok(replaced)
    }

    /// Remove a source. Returns false if it was not registered.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut sources = self.sources.write();
        if sources.remove(name).is_none() {
            return Ok(false);
        }
        self.save(&sources)?;
        Ok(true)
    }

    pub fn resolve(&self, name: &str) -> Result<String> {
        self.sources
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Reverse lookup, first name in order that maps to `locator`
    pub fn name_of(&self, locator: &str) -> Option<String> {
        self.sources
            .read()
            .iter()
            .find(|(_, l)| l.as_str() == locator)
            .map(|(name, _)| name.clone())
    }

    pub fn list(&self) -> BTreeMap<String, String> {
        self.sources.read().clone()
    }

    fn save(&self, sources: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(sources)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.trim() != name {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
