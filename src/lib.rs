//! # wayfinder: Campus Walkway Routing
//!
//! Lowest-cost routes between two points on an institution's walkway graph
//! (building entrances, corridors, paths), with one graph resident in memory
//! per institution and a route cache in front of the search.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract with persistence,
//!    `PathFinder` the contract with the search algorithm
//! 2. **Clean DTOs**: `Coordinate`, `NodeKey`, `Route` cross all boundaries
//! 3. **No I/O in the engine**: `GraphRegistry` is synchronous and pure; only
//!    `Wayfinder` talks to the store
//! 4. **Invalidate, don't patch**: any graph change drops the institution's
//!    cached routes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wayfinder::{Wayfinder, GraphDefinition, InstitutionId, props};
//!
//! # async fn example() -> wayfinder::Result<()> {
//! let finder = Wayfinder::open_memory().await?;
//! let campus = InstitutionId::from("campus");
//!
//! let graph = GraphDefinition::new()
//!     .node([0.0, 0.0], props([("name", "Gate")]))
//!     .node([0.0, 10.0], props([("name", "Library")]))
//!     .edge([0.0, 0.0], [0.0, 10.0]);
//! finder.update_graph(&campus, graph).await?;
//!
//! // Endpoints snap to the nearest nodes.
//! for point in finder.route_between(&campus, 0.1, 0.2, 0.0, 9.5)? {
//!     println!("{point}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | `SpatialGraph` | `graph` | Nodes + symmetric weighted adjacency |
//! | `resolve` | `resolve` | Snap a coordinate to the nearest node |
//! | `AStar` | `search` | Shortest route between two nodes |
//! | `RouteCache` | `cache` | Per-institution memoized outcomes |
//! | `GraphRegistry` | `registry` | One graph + cache shard per institution |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod graph;
pub mod resolve;
pub mod search;
pub mod cache;
pub mod registry;
pub mod storage;
pub mod export;
pub mod config;

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Coordinate, NodeKey, Node, Edge, Route, Value, PropertyMap, InstitutionId, props,
};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use graph::{SpatialGraph, GraphDefinition, NodeDefinition, EdgeDefinition, VertexInsert};
pub use search::{PathFinder, AStar, Heuristic};
pub use cache::{RouteCache, CacheEntry, CacheStats, CachedRouteRecord, RouteOutcome};
pub use registry::{GraphRegistry, GraphMutation, MutationOutcome};
pub use config::{Config, CacheConfig};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, MemoryStore};

/// Outcome of a route query. Routes are shared with the cache.
pub type PathResult = Result<Arc<Route>>;

// ============================================================================
// Top-level Wayfinder handle
// ============================================================================

/// The primary entry point. A `Wayfinder` wraps a graph store and keeps
/// every stored institution graph loaded in a `GraphRegistry`.
///
/// Everything that writes an institution's graph to the store holds that
/// institution's write lock across the store call, so the store and memory
/// see changes in the same order.
pub struct Wayfinder<S: GraphStore, F: PathFinder = AStar> {
    store: S,
    registry: GraphRegistry<F>,
    config: Config,
    writers: Mutex<HashMap<InstitutionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: GraphStore> Wayfinder<S> {
    /// Open with the default `AStar` finder and load every stored graph.
    pub async fn open(store: S, config: Config) -> Result<Self> {
        let registry = GraphRegistry::new(&config);
        Self::assemble(store, config, registry).await
    }
}

/// In-memory store for testing and embedding.
impl Wayfinder<MemoryStore> {
    pub async fn open_memory() -> Result<Self> {
        Self::open(MemoryStore::new(), Config::default()).await
    }
}

impl<S: GraphStore, F: PathFinder> Wayfinder<S, F> {
    /// Open with a custom path finder.
    pub async fn with_finder(store: S, config: Config, finder: F) -> Result<Self> {
        let registry = GraphRegistry::with_finder(config.cache.clone(), finder);
        Self::assemble(store, config, registry).await
    }

    async fn assemble(store: S, config: Config, registry: GraphRegistry<F>) -> Result<Self> {
        let this = Self { store, registry, config, writers: Mutex::new(HashMap::new()) };
        this.reload_all().await?;
        Ok(this)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load every stored graph. An institution whose definition does not
    /// build is skipped with a warning. Returns how many were loaded.
    pub async fn reload_all(&self) -> Result<usize> {
        let mut loaded = 0;
        for (id, definition) in self.store.read_all_graph_definitions().await? {
            let writer = self.writer(&id);
            let _guard = writer.lock().await;
            match self.registry.load(id.clone(), &definition) {
                Ok(()) => {
                    loaded += 1;
                    self.seed_cache(&id).await?;
                }
                Err(e) => warn!(institution = %id, error = %e, "stored graph could not be loaded"),
            }
        }
        info!(institutions = loaded, "graphs loaded from store");
        Ok(loaded)
    }

    /// Reload one institution from the store.
    pub async fn reload(&self, id: &InstitutionId) -> Result<()> {
        let writer = self.writer(id);
        let _guard = writer.lock().await;
        let definition = self
            .store
            .read_graph_definition(id)
            .await?
            .ok_or_else(|| Error::InstitutionNotFound(id.clone()))?;
        self.registry.load(id.clone(), &definition)?;
        self.seed_cache(id).await
    }

    async fn seed_cache(&self, id: &InstitutionId) -> Result<()> {
        if !self.config.persist_routes {
            return Ok(());
        }
        let records = self.store.read_cached_routes(id).await?;
        let loaded = self.registry.with_graph(id, |graph| {
            self.registry
                .cache()
                .seed(id, records, |r| record_fits(graph, r))
        })?;
        info!(institution = %id, routes = loaded, "route cache seeded from store");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Route between two latitude/longitude pairs, as the ordered list of
    /// node coordinates to walk through.
    pub fn route_between(
        &self,
        id: &InstitutionId,
        from_lat: f64,
        from_lng: f64,
        to_lat: f64,
        to_lng: f64,
    ) -> Result<Vec<Coordinate>> {
        let route = self.route(id, Coordinate::new(from_lat, from_lng), Coordinate::new(to_lat, to_lng))?;
        Ok(route.coordinates())
    }

    /// Route between two coordinates, as the full `Route`.
    pub fn route(&self, id: &InstitutionId, from: Coordinate, to: Coordinate) -> PathResult {
        self.registry.route_between(id, from, to)
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Replace an institution's graph. The definition is validated, written
    /// to the store, then installed; cached routes are dropped.
    pub async fn update_graph(&self, id: &InstitutionId, definition: GraphDefinition) -> Result<()> {
        definition.validate()?;
        let writer = self.writer(id);
        let _guard = writer.lock().await;
        self.store.write_graph_definition(id, &definition).await?;
        self.registry.load(id.clone(), &definition)?;
        self.clear_durable_cache(id).await
    }

    /// Apply one edit and write the resulting graph back to the store.
    ///
    /// The edit is made on a copy, which is installed only once the store
    /// has accepted it. A failed write leaves the loaded graph as it was.
    pub async fn mutate(&self, id: &InstitutionId, mutation: GraphMutation) -> Result<MutationOutcome> {
        let writer = self.writer(id);
        let _guard = writer.lock().await;

        let (graph, outcome) = self.registry.preview(id, mutation)?;
        let definition = GraphDefinition::from_graph(&graph);
        self.store.write_graph_definition(id, &definition).await?;
        self.registry.install(id.clone(), graph);
        debug!(institution = %id, ?outcome, "graph edit persisted");

        self.clear_durable_cache(id).await?;
        Ok(outcome)
    }

    /// Delete an institution from the store and from memory.
    pub async fn remove_institution(&self, id: &InstitutionId) -> Result<bool> {
        let writer = self.writer(id);
        let _guard = writer.lock().await;
        let stored = self.store.delete_institution(id).await?;
        let loaded = self.registry.remove(id);
        Ok(stored || loaded)
    }

    /// Write the institution's current cache entries to the store.
    /// Returns how many were written.
    pub async fn persist_cache(&self, id: &InstitutionId) -> Result<usize> {
        let records = self.registry.cache().snapshot(id);
        let count = records.len();
        for record in records {
            self.store.write_cached_route(id, record).await?;
        }
        Ok(count)
    }

    /// The institution's write lock. Entries are never dropped, so every
    /// caller for one id always contends on the same lock.
    fn writer(&self, id: &InstitutionId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.writers.lock().entry(id.clone()).or_default())
    }

    async fn clear_durable_cache(&self, id: &InstitutionId) -> Result<()> {
        if self.config.persist_routes {
            self.store.clear_cached_routes(id).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn registry(&self) -> &GraphRegistry<F> {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// A stored record is only trusted if its endpoints, and every hop of a
/// found route, still exist in the graph it is seeded into.
fn record_fits(graph: &SpatialGraph, record: &CachedRouteRecord) -> bool {
    if !graph.contains(record.start) || !graph.contains(record.end) {
        return false;
    }
    match &record.outcome {
        RouteOutcome::Found { route } => route
            .nodes()
            .windows(2)
            .all(|hop| graph.node(hop[0]).is_some_and(|n| n.weight_to(hop[1]).is_some())),
        RouteOutcome::NoPath | RouteOutcome::DuplicateEndpoints => true,
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Graph has no nodes")]
    EmptyGraph,

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Start and end resolve to the same node {0}")]
    DuplicateEndpoints(NodeKey),

    #[error("No path from {from} to {to}")]
    NoPath { from: NodeKey, to: NodeKey },

    #[error("Institution not found: {0}")]
    InstitutionNotFound(InstitutionId),

    #[error("Invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Invalid graph definition: {0}")]
    InvalidDefinition(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, caller-facing error codes. One per `Error` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NodeNotFound,
    EmptyGraph,
    InvalidEdge,
    DuplicateEndpoints,
    NoPath,
    InstitutionNotFound,
    InvalidCoordinate,
    InvalidDefinition,
    StorageError,
    SerializationError,
    IoError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NodeNotFound => "NODE_NOT_FOUND",
            ErrorCode::EmptyGraph => "EMPTY_GRAPH",
            ErrorCode::InvalidEdge => "INVALID_EDGE",
            ErrorCode::DuplicateEndpoints => "DUPLICATE_ENDPOINTS",
            ErrorCode::NoPath => "NO_PATH",
            ErrorCode::InstitutionNotFound => "INSTITUTION_NOT_FOUND",
            ErrorCode::InvalidCoordinate => "INVALID_COORDINATE",
            ErrorCode::InvalidDefinition => "INVALID_DEFINITION",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::IoError => "IO_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Error::EmptyGraph => ErrorCode::EmptyGraph,
            Error::InvalidEdge(_) => ErrorCode::InvalidEdge,
            Error::DuplicateEndpoints(_) => ErrorCode::DuplicateEndpoints,
            Error::NoPath { .. } => ErrorCode::NoPath,
            Error::InstitutionNotFound(_) => ErrorCode::InstitutionNotFound,
            Error::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            Error::InvalidDefinition(_) => ErrorCode::InvalidDefinition,
            Error::StorageError(_) => ErrorCode::StorageError,
            Error::Serialization(_) => ErrorCode::SerializationError,
            Error::Io(_) => ErrorCode::IoError,
        }
    }

    /// Outcomes caused by caller input or map topology, as opposed to engine
    /// or storage faults. `NodeNotFound` counts as a fault: on the query path
    /// it means a resolved key vanished.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::NoPath { .. }
                | Error::DuplicateEndpoints(_)
                | Error::InstitutionNotFound(_)
                | Error::InvalidCoordinate { .. }
                | Error::InvalidDefinition(_)
                | Error::InvalidEdge(_)
                | Error::EmptyGraph
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
