//! # Route Cache
//!
//! Memoized search outcomes, sharded by institution. Each shard has its own
//! lock, so invalidating one institution never blocks lookups in another.
//!
//! Keys are unordered endpoint pairs: a route is stored once, oriented from
//! the smaller key to the larger, and reversed on the way out when the
//! query runs the other direction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CacheConfig;
use crate::model::{InstitutionId, NodeKey, Route};
use crate::{Error, PathResult};

// ============================================================================
// Entries
// ============================================================================

/// A cached search outcome. Failures are cached explicitly so "computed,
/// unreachable" is distinguishable from "not computed yet" (no entry).
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Route(Arc<Route>),
    NoPath,
    DuplicateEndpoints,
}

impl CacheEntry {
    /// The cacheable form of a search result. Engine defects are not cached.
    pub fn from_result(result: &PathResult) -> Option<Self> {
        match result {
            Ok(route) => Some(CacheEntry::Route(Arc::clone(route))),
            Err(Error::NoPath { .. }) => Some(CacheEntry::NoPath),
            Err(Error::DuplicateEndpoints(_)) => Some(CacheEntry::DuplicateEndpoints),
            Err(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, CacheEntry::Route(_))
    }

    fn to_result(&self, start: NodeKey, end: NodeKey, reversed: bool) -> PathResult {
        match self {
            CacheEntry::Route(route) if reversed => Ok(Arc::new(route.reversed())),
            CacheEntry::Route(route) => Ok(Arc::clone(route)),
            CacheEntry::NoPath => Err(Error::NoPath { from: start, to: end }),
            CacheEntry::DuplicateEndpoints => Err(Error::DuplicateEndpoints(start)),
        }
    }
}

/// Serializable outcome for durable caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Found { route: Route },
    NoPath,
    DuplicateEndpoints,
}

/// One cache entry as handed to (or read back from) the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRouteRecord {
    pub start: NodeKey,
    pub end: NodeKey,
    #[serde(flatten)]
    pub outcome: RouteOutcome,
    pub computed_at: DateTime<Utc>,
}

impl CachedRouteRecord {
    fn into_entry(self) -> CacheEntry {
        match self.outcome {
            RouteOutcome::Found { route } => CacheEntry::Route(Arc::new(route)),
            RouteOutcome::NoPath => CacheEntry::NoPath,
            RouteOutcome::DuplicateEndpoints => CacheEntry::DuplicateEndpoints,
        }
    }
}

/// Per-institution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

// ============================================================================
// RouteCache
// ============================================================================

type PairKey = (NodeKey, NodeKey);

/// Orient a pair; `true` when the query runs against the stored direction.
fn pair(start: NodeKey, end: NodeKey) -> (PairKey, bool) {
    if start <= end { ((start, end), false) } else { ((end, start), true) }
}

struct Slot {
    entry: CacheEntry,
    computed_at: DateTime<Utc>,
}

#[derive(Default)]
struct Shard {
    entries: RwLock<HashMap<PairKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// In-memory route cache for all institutions.
pub struct RouteCache {
    config: CacheConfig,
    shards: RwLock<HashMap<InstitutionId, Arc<Shard>>>,
}

impl RouteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config, shards: RwLock::new(HashMap::new()) }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn shard(&self, institution: &InstitutionId) -> Option<Arc<Shard>> {
        self.shards.read().get(institution).cloned()
    }

    fn shard_or_insert(&self, institution: &InstitutionId) -> Arc<Shard> {
        if let Some(shard) = self.shard(institution) {
            return shard;
        }
        Arc::clone(self.shards.write().entry(institution.clone()).or_default())
    }

    /// Cached outcome for the pair, in the requested direction.
    pub fn get(&self, institution: &InstitutionId, start: NodeKey, end: NodeKey) -> Option<PathResult> {
        if !self.config.enabled {
            return None;
        }
        let shard = self.shard_or_insert(institution);
        let (key, reversed) = pair(start, end);
        let found = shard.entries.read().get(&key).map(|slot| slot.entry.to_result(start, end, reversed));
        let counter = if found.is_some() { &shard.hits } else { &shard.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store a search outcome. Returns whether it was stored.
    ///
    /// The entry is fully built before the shard's write lock is taken, so
    /// readers see either nothing or the finished entry.
    pub fn put(&self, institution: &InstitutionId, start: NodeKey, end: NodeKey, result: &PathResult) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(entry) = CacheEntry::from_result(result) else {
            return false;
        };
        if entry.is_failure() && !self.config.cache_failures {
            return false;
        }
        let (key, reversed) = pair(start, end);
        let entry = match entry {
            CacheEntry::Route(route) if reversed => CacheEntry::Route(Arc::new(route.reversed())),
            other => other,
        };
        self.insert(institution, key, Slot { entry, computed_at: Utc::now() })
    }

    fn insert(&self, institution: &InstitutionId, key: PairKey, slot: Slot) -> bool {
        let shard = self.shard_or_insert(institution);
        let mut entries = shard.entries.write();
        if let Some(cap) = self.config.max_entries_per_institution {
            if entries.len() >= cap && !entries.contains_key(&key) {
                debug!(%institution, cap, "route cache full; result not stored");
                return false;
            }
        }
        entries.insert(key, slot);
        true
    }

    /// Drop every cached outcome for one institution. Returns how many.
    pub fn invalidate(&self, institution: &InstitutionId) -> usize {
        let Some(shard) = self.shard(institution) else {
            return 0;
        };
        let mut entries = shard.entries.write();
        let dropped = entries.len();
        entries.clear();
        debug!(%institution, dropped, "route cache invalidated");
        dropped
    }

    /// Forget an institution entirely, counters included.
    pub fn remove(&self, institution: &InstitutionId) {
        self.shards.write().remove(institution);
    }

    pub fn stats(&self, institution: &InstitutionId) -> CacheStats {
        self.shard(institution)
            .map(|s| CacheStats {
                entries: s.entries.read().len(),
                hits: s.hits.load(Ordering::Relaxed),
                misses: s.misses.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    pub fn len(&self, institution: &InstitutionId) -> usize {
        self.shard(institution).map_or(0, |s| s.entries.read().len())
    }

    /// Copy out every entry for one institution, for a durable store.
    pub fn snapshot(&self, institution: &InstitutionId) -> Vec<CachedRouteRecord> {
        let Some(shard) = self.shard(institution) else {
            return Vec::new();
        };
        let entries = shard.entries.read();
        entries
            .iter()
            .map(|(&(start, end), slot)| CachedRouteRecord {
                start,
                end,
                outcome: match &slot.entry {
                    CacheEntry::Route(route) => RouteOutcome::Found { route: Route::clone(route) },
                    CacheEntry::NoPath => RouteOutcome::NoPath,
                    CacheEntry::DuplicateEndpoints => RouteOutcome::DuplicateEndpoints,
                },
                computed_at: slot.computed_at,
            })
            .collect()
    }

    /// Load records read back from a durable store. Records for which
    /// `accept` returns false are skipped. Returns how many were loaded.
    pub fn seed(
        &self,
        institution: &InstitutionId,
        records: impl IntoIterator<Item = CachedRouteRecord>,
        accept: impl Fn(&CachedRouteRecord) -> bool,
    ) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let mut loaded = 0;
        for record in records {
            if !accept(&record) {
                continue;
            }
            let (key, reversed) = pair(record.start, record.end);
            let computed_at = record.computed_at;
            let entry = match record.into_entry() {
                CacheEntry::Route(route) if reversed => CacheEntry::Route(Arc::new(route.reversed())),
                other => other,
            };
            if entry.is_failure() && !self.config.cache_failures {
                continue;
            }
            if self.insert(institution, key, Slot { entry, computed_at }) {
                loaded += 1;
            }
        }
        loaded
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
