//! Cache for expensively assembled default configurations.
//!
//! Loading a default configuration may pull in many includes and a full
//! resolve, and the result only changes when the process environment
//! does. The cache is an explicit value the embedder owns and passes
//! around -- there is no global state -- keyed by an environment
//! fingerprint, with an explicit invalidation call.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::config::Config;
use crate::error::ConfigError;

#[derive(Default)]
pub struct ConfigCache {
    entries: HashMap<String, Config>,
}

impl ConfigCache {
    pub fn new() -> ConfigCache {
        ConfigCache::default()
    }

    /// Fetch the cached config for `fingerprint`, or load and cache it.
    /// A load error is returned and nothing is cached.
    pub fn get_or_load(
        &mut self,
        fingerprint: &str,
        load: impl FnOnce() -> Result<Config, ConfigError>,
    ) -> Result<Config, ConfigError> {
        if let Some(hit) = self.entries.get(fingerprint) {
            return Ok(hit.clone());
        }
        let config = load()?;
        self.entries.insert(fingerprint.to_owned(), config.clone());
        Ok(config)
    }

    /// Drop everything; the next load recomputes.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fingerprint of the current process environment; when two snapshots
/// differ, cached configs derived from the environment are stale.
pub fn env_fingerprint() -> String {
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    vars.sort();
    let mut hasher = DefaultHasher::new();
    vars.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
