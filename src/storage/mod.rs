//! # Graph Store Trait
//!
//! The contract between the engine and whatever persists institutions:
//! graph definitions, and optionally the route cache so it survives a
//! restart. The engine itself does no I/O; `Wayfinder` drives the store at
//! startup and on graph updates.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory, for tests and embedding |

pub mod memory;

use async_trait::async_trait;

use crate::cache::CachedRouteRecord;
use crate::graph::GraphDefinition;
use crate::model::{InstitutionId, NodeKey};
use crate::Result;

pub use memory::MemoryStore;

// ============================================================================
// GraphStore Trait
// ============================================================================

/// Persistence collaborator.
///
/// Only the graph-definition methods are required. The route-cache methods
/// default to "nothing stored", which leaves the engine a pure in-memory
/// cache with cold-start misses.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    // ========================================================================
    // Graph definitions
    // ========================================================================

    /// Every institution that has a stored graph.
    async fn list_institutions(&self) -> Result<Vec<InstitutionId>>;

    /// The stored graph for one institution, or None if there is none.
    async fn read_graph_definition(&self, id: &InstitutionId) -> Result<Option<GraphDefinition>>;

    /// Create or replace an institution's stored graph.
    async fn write_graph_definition(&self, id: &InstitutionId, definition: &GraphDefinition) -> Result<()>;

    /// Delete an institution and everything stored for it. Returns true if it existed.
    async fn delete_institution(&self, id: &InstitutionId) -> Result<bool>;

    /// Read all stored graphs in one pass, for startup.
    ///
    /// Default: list, then read each.
    async fn read_all_graph_definitions(&self) -> Result<Vec<(InstitutionId, GraphDefinition)>> {
        let mut out = Vec::new();
        for id in self.list_institutions().await? {
            if let Some(def) = self.read_graph_definition(&id).await? {
                out.push((id, def));
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Durable route cache (optional)
    // ========================================================================

    async fn read_cached_routes(&self, _id: &InstitutionId) -> Result<Vec<CachedRouteRecord>> {
        Ok(Vec::new())
    }

    /// One cached route, matching the endpoints in either order.
    ///
    /// Default: scan `read_cached_routes`.
    async fn read_cached_route(
        &self,
        id: &InstitutionId,
        start: NodeKey,
        end: NodeKey,
    ) -> Result<Option<CachedRouteRecord>> {
        Ok(self
            .read_cached_routes(id)
            .await?
            .into_iter()
            .find(|r| (r.start == start && r.end == end) || (r.start == end && r.end == start)))
    }

    async fn write_cached_route(&self, _id: &InstitutionId, _record: CachedRouteRecord) -> Result<()> {
        Ok(())
    }

    async fn clear_cached_routes(&self, _id: &InstitutionId) -> Result<()> {
        Ok(())
    }
}
