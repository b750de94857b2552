//! Engine configuration.
//!
//! Everything has a working default, so `Config::default()` is a valid
//! in-memory setup. Partial JSON documents fill the rest from defaults.

use serde::{Deserialize, Serialize};

use crate::search::Heuristic;
use crate::Result;

/// Top-level configuration for a `Wayfinder`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frontier ordering used by the default `AStar` finder.
    pub heuristic: Heuristic,
    pub cache: CacheConfig,
    /// Mirror the route cache into the graph store: seed it on load, flush
    /// snapshots on request, clear it on every graph change.
    pub persist_routes: bool,
}

impl Config {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Route cache settings, applied to every institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Also remember `NoPath` and `DuplicateEndpoints` outcomes.
    pub cache_failures: bool,
    /// Once an institution holds this many entries, new results are returned
    /// but not stored.
    pub max_entries_per_institution: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_failures: true,
            max_entries_per_institution: None,
        }
    }
}
