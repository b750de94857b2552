//! # Graph Registry
//!
//! Keeps one `SpatialGraph` per institution resident in memory, next to the
//! shared `RouteCache`, and is the single place where queries and mutations
//! meet.
//!
//! ## Locking
//!
//! - The institution map is behind a `RwLock` that is only held long enough
//!   to clone the `Arc` of one institution's slot.
//! - Each slot is its own `RwLock`: any number of route queries share it,
//!   `load`/`mutate`/`remove` take it exclusively. Work on institution X never
//!   waits on institution Y.
//! - Queries write their result into the cache while still holding the read
//!   guard, and mutations invalidate the cache before releasing the write
//!   guard, so a result computed on an old topology can never land in the
//!   cache after the topology changed.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cache::RouteCache;
use crate::config::{CacheConfig, Config};
use crate::graph::{GraphDefinition, SpatialGraph, VertexInsert};
use crate::model::*;
use crate::resolve::resolve;
use crate::search::{AStar, PathFinder};
use crate::{Error, PathResult, Result};

/// `None` once the institution has been removed, so late holders of the
/// `Arc` see it as gone.
type Slot = Arc<RwLock<Option<SpatialGraph>>>;

// ============================================================================
// Mutations
// ============================================================================

/// A single graph edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphMutation {
    AddVertex {
        coordinates: Coordinate,
        #[serde(default)]
        properties: PropertyMap,
    },
    UpdateVertexProperties {
        coordinates: Coordinate,
        properties: PropertyMap,
    },
    RemoveVertex {
        coordinates: Coordinate,
    },
    AddEdge {
        from: Coordinate,
        to: Coordinate,
    },
    RemoveEdge {
        from: Coordinate,
        to: Coordinate,
    },
}

impl GraphMutation {
    pub fn apply(self, graph: &mut SpatialGraph) -> Result<MutationOutcome> {
        match self {
            GraphMutation::AddVertex { coordinates, properties } => {
                Ok(match graph.add_vertex(coordinates, properties)? {
                    VertexInsert::Inserted => MutationOutcome::Applied,
                    VertexInsert::Overwritten => MutationOutcome::VertexOverwritten,
                })
            }
            GraphMutation::UpdateVertexProperties { coordinates, properties } => {
                graph.update_vertex_properties(coordinates, properties)?;
                Ok(MutationOutcome::Applied)
            }
            GraphMutation::RemoveVertex { coordinates } => {
                graph.remove_vertex(coordinates)?;
                Ok(MutationOutcome::Applied)
            }
            GraphMutation::AddEdge { from, to } => {
                graph.add_edge(from, to)?;
                Ok(MutationOutcome::Applied)
            }
            GraphMutation::RemoveEdge { from, to } => {
                graph.remove_edge(from, to)?;
                Ok(MutationOutcome::Applied)
            }
        }
    }
}

/// Result of a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MutationOutcome {
    Applied,
    /// `AddVertex` replaced the properties of a node that already existed.
    VertexOverwritten,
}

// ============================================================================
// GraphRegistry
// ============================================================================

/// Per-institution graphs plus their route cache.
pub struct GraphRegistry<F: PathFinder = AStar> {
    graphs: RwLock<HashMap<InstitutionId, Slot>>,
    cache: RouteCache,
    finder: F,
}

impl GraphRegistry<AStar> {
    pub fn new(config: &Config) -> Self {
        Self::with_finder(config.cache.clone(), AStar::new(config.heuristic))
    }
}

impl Default for GraphRegistry<AStar> {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl<F: PathFinder> GraphRegistry<F> {
    pub fn with_finder(cache: CacheConfig, finder: F) -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            cache: RouteCache::new(cache),
            finder,
        }
    }

    pub fn finder(&self) -> &F {
        &self.finder
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    fn slot(&self, id: &InstitutionId) -> Result<Slot> {
        self.graphs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::InstitutionNotFound(id.clone()))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Build a graph from `definition` and install it for `id`, replacing any
    /// previous graph and clearing its cached routes. Nothing is installed if
    /// the build fails.
    pub fn load(&self, id: InstitutionId, definition: &GraphDefinition) -> Result<()> {
        let graph = definition.build()?;
        self.install(id, graph);
        Ok(())
    }

    /// Install a ready-built graph for `id`.
    pub fn install(&self, id: InstitutionId, graph: SpatialGraph) {
        let (nodes, edges) = (graph.node_count(), graph.edge_count());
        let mut graph = graph;
        let replaced = loop {
            let slot = Arc::clone(
                self.graphs
                    .write()
                    .entry(id.clone())
                    .or_insert_with(|| Arc::new(RwLock::new(None))),
            );
            match self.publish(&id, &slot, graph) {
                Ok(replaced) => break replaced,
                // `remove` took the slot out of the map before we locked it.
                Err(returned) => graph = returned,
            }
        };

        if replaced {
            info!(institution = %id, nodes, edges, "graph replaced");
        } else {
            info!(institution = %id, nodes, edges, "graph loaded");
        }
    }

    /// Write `graph` into `slot` if the slot is still the one mapped to `id`.
    /// Hands the graph back when the slot has been orphaned.
    fn publish(&self, id: &InstitutionId, slot: &Slot, graph: SpatialGraph) -> std::result::Result<bool, SpatialGraph> {
        let mut guard = slot.write();
        let live = self.graphs.read().get(id).is_some_and(|s| Arc::ptr_eq(s, slot));
        if !live {
            return Err(graph);
        }
        let replaced = guard.replace(graph).is_some();
        self.cache.invalidate(id);
        Ok(replaced)
    }

    /// Drop an institution's graph and cache. Returns whether it existed.
    pub fn remove(&self, id: &InstitutionId) -> bool {
        let Some(slot) = self.graphs.write().remove(id) else {
            return false;
        };
        let mut guard = slot.write();
        *guard = None;
        self.cache.remove(id);
        info!(institution = %id, "graph removed");
        true
    }

    pub fn contains(&self, id: &InstitutionId) -> bool {
        self.graphs.read().contains_key(id)
    }

    /// Loaded institutions, sorted.
    pub fn institutions(&self) -> Vec<InstitutionId> {
        let mut ids: Vec<_> = self.graphs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Run `f` against the institution's graph under a shared lock.
    pub fn with_graph<R>(&self, id: &InstitutionId, f: impl FnOnce(&SpatialGraph) -> R) -> Result<R> {
        let slot = self.slot(id)?;
        let guard = slot.read();
        let graph = guard.as_ref().ok_or_else(|| Error::InstitutionNotFound(id.clone()))?;
        Ok(f(graph))
    }

    /// The institution's graph in persisted form.
    pub fn definition(&self, id: &InstitutionId) -> Result<GraphDefinition> {
        self.with_graph(id, GraphDefinition::from_graph)
    }

    /// Snap a coordinate onto the institution's graph.
    pub fn resolve(&self, id: &InstitutionId, coord: Coordinate) -> Result<NodeKey> {
        self.with_graph(id, |graph| resolve(coord, graph))?
    }

    /// Lowest-weight route between two arbitrary coordinates.
    ///
    /// Both ends are snapped to their nearest nodes first; the cache is then
    /// consulted by the resolved pair. Misses run the path finder and the
    /// outcome, failures included, is cached.
    pub fn route_between(&self, id: &InstitutionId, from: Coordinate, to: Coordinate) -> PathResult {
        let slot = self.slot(id)?;
        let guard = slot.read();
        let graph = guard.as_ref().ok_or_else(|| Error::InstitutionNotFound(id.clone()))?;

        let start = resolve(from, graph)?;
        let end = resolve(to, graph)?;

        if let Some(hit) = self.cache.get(id, start, end) {
            debug!(institution = %id, %start, %end, "route cache hit");
            return hit;
        }

        let result = self.finder.find_path(graph, start, end).map(Arc::new);
        match &result {
            Ok(route) => debug!(institution = %id, %start, %end, hops = route.len(), weight = route.weight(), "route computed"),
            Err(e) if e.is_expected() => debug!(institution = %id, %start, %end, code = e.code().as_str(), "no route"),
            Err(e) => error!(institution = %id, %start, %end, error = %e, "path search failed on resolved endpoints"),
        }

        self.cache.put(id, start, end, &result);
        drop(guard);
        result
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Apply one edit to a copy of the institution's graph. Nothing is
    /// changed; the edited copy is returned for the caller to persist and
    /// `install`.
    pub fn preview(&self, id: &InstitutionId, mutation: GraphMutation) -> Result<(SpatialGraph, MutationOutcome)> {
        let mut graph = self.with_graph(id, SpatialGraph::clone)?;
        let outcome = mutation.apply(&mut graph)?;
        Ok((graph, outcome))
    }

    /// Apply one edit to the institution's graph and invalidate its cache
    /// before the write lock is released. A failed edit leaves both untouched.
    pub fn mutate(&self, id: &InstitutionId, mutation: GraphMutation) -> Result<MutationOutcome> {
        let slot = self.slot(id)?;
        let mut guard = slot.write();
        let graph = guard.as_mut().ok_or_else(|| Error::InstitutionNotFound(id.clone()))?;

        let outcome = mutation.apply(graph)?;
        self.cache.invalidate(id);
        debug!(institution = %id, ?outcome, nodes = graph.node_count(), edges = graph.edge_count(), "graph mutated");
        Ok(outcome)
    }
}

// ============================================================================
// Tests
// ============================================================================
