//! Node in the spatial graph.

use serde::Serialize;
use smallvec::SmallVec;

use super::{Coordinate, NodeKey, PropertyMap, Value};

/// One side of an undirected edge, as stored in a node's adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub to: NodeKey,
    /// Squared Euclidean distance between the endpoints.
    pub weight: f64,
}

/// Walkway nodes rarely have more than a handful of neighbors.
pub type Adjacency = SmallVec<[Edge; 4]>;

/// A node in the spatial graph.
///
/// Adjacency is only reachable mutably from inside the crate so that
/// `SpatialGraph` can keep it symmetric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    key: NodeKey,
    properties: PropertyMap,
    adjacency: Adjacency,
}

impl Node {
    pub fn new(key: NodeKey, properties: PropertyMap) -> Self {
        Self { key, properties, adjacency: Adjacency::new() }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn coordinate(&self) -> Coordinate {
        self.key.coordinate()
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn adjacency(&self) -> &[Edge] {
        &self.adjacency
    }

    pub fn degree(&self) -> usize {
        self.adjacency.len()
    }

    pub fn weight_to(&self, other: NodeKey) -> Option<f64> {
        self.adjacency.iter().find(|e| e.to == other).map(|e| e.weight)
    }

    pub(crate) fn set_properties(&mut self, properties: PropertyMap) -> PropertyMap {
        std::mem::replace(&mut self.properties, properties)
    }

    /// Insert or re-weight the edge to `to`. Adjacency is a set.
    pub(crate) fn link(&mut self, to: NodeKey, weight: f64) {
        match self.adjacency.iter_mut().find(|e| e.to == to) {
            Some(edge) => edge.weight = weight,
            None => self.adjacency.push(Edge { to, weight }),
        }
    }

    pub(crate) fn unlink(&mut self, to: NodeKey) -> bool {
        let before = self.adjacency.len();
        self.adjacency.retain(|e| e.to != to);
        before != self.adjacency.len()
    }

    pub(crate) fn take_adjacency(&mut self) -> Adjacency {
        std::mem::take(&mut self.adjacency)
    }
}
