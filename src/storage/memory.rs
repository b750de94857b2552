//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`. It keeps each
//! institution's definition and cached routes in a HashMap behind one
//! RwLock, and stamps every write with the time it happened.
//!
//! Use it for:
//! - Tests of the registry and `Wayfinder` without a database
//! - Embedding where graphs are supplied at runtime and need no persistence

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::GraphStore;
use crate::cache::CachedRouteRecord;
use crate::graph::GraphDefinition;
use crate::model::{InstitutionId, NodeKey};
use crate::{Error, Result};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory institution storage. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<InstitutionId, StoredInstitution>>>,
}

struct StoredInstitution {
    graph: GraphDefinition,
    routes: HashMap<(NodeKey, NodeKey), CachedRouteRecord>,
    updated_at: DateTime<Utc>,
}

impl StoredInstitution {
    fn new(graph: GraphDefinition) -> Self {
        Self { graph, routes: HashMap::new(), updated_at: Utc::now() }
    }
}

fn route_key(record: &CachedRouteRecord) -> (NodeKey, NodeKey) {
    if record.start <= record.end { (record.start, record.end) } else { (record.end, record.start) }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the given graphs.
    pub fn with_graphs(graphs: impl IntoIterator<Item = (InstitutionId, GraphDefinition)>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for (id, graph) in graphs {
                inner.insert(id, StoredInstitution::new(graph));
            }
        }
        store
    }

    /// When the institution's graph or cache was last written.
    pub fn updated_at(&self, id: &InstitutionId) -> Option<DateTime<Utc>> {
        self.inner.read().get(id).map(|s| s.updated_at)
    }

    pub fn cached_route_count(&self, id: &InstitutionId) -> usize {
        self.inner.read().get(id).map_or(0, |s| s.routes.len())
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    async fn list_institutions(&self) -> Result<Vec<InstitutionId>> {
        let mut ids: Vec<_> = self.inner.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn read_graph_definition(&self, id: &InstitutionId) -> Result<Option<GraphDefinition>> {
        Ok(self.inner.read().get(id).map(|s| s.graph.clone()))
    }

    async fn write_graph_definition(&self, id: &InstitutionId, definition: &GraphDefinition) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.get_mut(id) {
            Some(stored) => {
                stored.graph = definition.clone();
                stored.updated_at = Utc::now();
            }
            None => {
                inner.insert(id.clone(), StoredInstitution::new(definition.clone()));
            }
        }
        Ok(())
    }

    async fn delete_institution(&self, id: &InstitutionId) -> Result<bool> {
        Ok(self.inner.write().remove(id).is_some())
    }

    async fn read_cached_routes(&self, id: &InstitutionId) -> Result<Vec<CachedRouteRecord>> {
        Ok(self
            .inner
            .read()
            .get(id)
            .map(|s| s.routes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn read_cached_route(
        &self,
        id: &InstitutionId,
        start: NodeKey,
        end: NodeKey,
    ) -> Result<Option<CachedRouteRecord>> {
        let key = if start <= end { (start, end) } else { (end, start) };
        Ok(self.inner.read().get(id).and_then(|s| s.routes.get(&key).cloned()))
    }

    async fn write_cached_route(&self, id: &InstitutionId, record: CachedRouteRecord) -> Result<()> {
        let mut inner = self.inner.write();
        let stored = inner.get_mut(id).ok_or_else(|| Error::InstitutionNotFound(id.clone()))?;
        stored.routes.insert(route_key(&record), record);
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_cached_routes(&self, id: &InstitutionId) -> Result<()> {
        if let Some(stored) = self.inner.write().get_mut(id) {
            stored.routes.clear();
            stored.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
