//! Route: an ordered walk through the graph from start to end inclusive.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Coordinate, NodeKey};

/// A computed route: node keys in walking order and the summed edge weight.
///
/// Immutable once produced; the cache shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    nodes: Vec<NodeKey>,
    /// Sum of squared-distance edge weights along the route.
    weight: f64,
}

impl Route {
    pub fn new(nodes: Vec<NodeKey>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of edges walked.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start(&self) -> Option<NodeKey> {
        self.nodes.first().copied()
    }

    pub fn end(&self) -> Option<NodeKey> {
        self.nodes.last().copied()
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.nodes.iter().map(NodeKey::coordinate).collect()
    }

    /// Walking length in coordinate units (square roots of the segment
    /// weights, summed).
    pub fn length(&self) -> f64 {
        self.nodes
            .windows(2)
            .map(|w| w[0].distance_sq(&w[1]).sqrt())
            .sum()
    }

    /// The same walk in the opposite direction. Weight is unchanged since
    /// edges are undirected.
    pub fn reversed(&self) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.reverse();
        Self { nodes, weight: self.weight }
    }

    /// GeoJSON `LineString` geometry for the route.
    pub fn to_geojson(&self) -> serde_json::Value {
        let coordinates: Vec<[f64; 2]> = self.coordinates().into_iter().map(Into::into).collect();
        json!({
            "type": "LineString",
            "coordinates": coordinates,
        })
    }
}
