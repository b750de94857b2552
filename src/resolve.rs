//! Nearest-node resolution: snap an arbitrary coordinate onto the graph.

use tracing::trace;

use crate::graph::SpatialGraph;
use crate::model::{Coordinate, NodeKey};
use crate::{Error, Result};

/// How a coordinate was matched to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub key: NodeKey,
    /// The coordinate's canonical key named an existing node.
    pub exact: bool,
    /// Squared distance from the query coordinate to the node.
    pub distance_sq: f64,
}

/// Resolve `coord` to the key of the closest node in `graph`.
///
/// Exact key hits are constant time. Otherwise every node is scanned and the
/// smallest squared distance wins; on ties the node earliest in the graph's
/// insertion order is kept.
pub fn resolve(coord: Coordinate, graph: &SpatialGraph) -> Result<NodeKey> {
    resolve_detailed(coord, graph).map(|r| r.key)
}

pub fn resolve_detailed(coord: Coordinate, graph: &SpatialGraph) -> Result<Resolution> {
    let key = coord.key()?;
    if graph.contains(key) {
        return Ok(Resolution { key, exact: true, distance_sq: 0.0 });
    }

    let mut best: Option<Resolution> = None;
    for node in graph.nodes() {
        let d = node.coordinate().distance_sq(&coord);
        if best.is_none_or(|b| d < b.distance_sq) {
            best = Some(Resolution { key: node.key(), exact: false, distance_sq: d });
        }
    }

    let found = best.ok_or(Error::EmptyGraph)?;
    trace!(query = %coord, node = %found.key, distance_sq = found.distance_sq, "snapped to nearest node");
    Ok(found)
}
