//! Triage settings, loadable from a TOML file.

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for a triage engine.
///
/// ```
/// use crashbucket::config::TriageConfig;
///
/// let config: TriageConfig = toml::from_str("cache_capacity = 8").unwrap();
/// assert_eq!(config.cache_capacity, 8);
/// assert_eq!(config.max_buckets_scanned, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Short signatures remembered by the triage cache. Zero acts as one.
    pub cache_capacity: usize,

    /// Upper bound on buckets tested during the full scan.
    /// Default: no limit
    pub max_buckets_scanned: Option<usize>,

    /// Only accept aborts raised by the program itself when deriving short
    /// signatures, ignoring sanitizer and libc reports.
    pub program_aborts_only: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self { cache_capacity: DEFAULT_CACHE_CAPACITY, max_buckets_scanned: None, program_aborts_only: false }
    }
}

impl TriageConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
