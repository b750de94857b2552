//! # Spatial Graph
//!
//! One institution's walkway graph: nodes keyed by canonical coordinate,
//! undirected edges weighted by squared Euclidean distance.
//!
//! Every mutating operation keeps adjacency symmetric before it returns.
//! Iteration order is insertion order, which is what nearest-node tie-breaks
//! and export rely on.

pub mod definition;

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::model::*;
use crate::{Error, Result};

pub use definition::{GraphDefinition, NodeDefinition, EdgeDefinition};

// ============================================================================
// SpatialGraph
// ============================================================================

/// Outcome of `add_vertex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInsert {
    Inserted,
    /// A node already lived at this key; its properties were replaced and its
    /// adjacency kept.
    Overwritten,
}

/// In-memory spatial graph for a single institution.
#[derive(Debug, Clone, Default)]
pub struct SpatialGraph {
    nodes: HashMap<NodeKey, Node>,
    /// Insertion order of live keys.
    order: Vec<NodeKey>,
    edge_count: usize,
}

impl SpatialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(nodes),
            order: Vec::with_capacity(nodes),
            edge_count: 0,
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert a node at `coord`, or overwrite the properties of the node
    /// already there. No edges are created.
    pub fn add_vertex(&mut self, coord: Coordinate, properties: PropertyMap) -> Result<VertexInsert> {
        let key = coord.key()?;
        if let Some(node) = self.nodes.get_mut(&key) {
            node.set_properties(properties);
            warn!(node = %key, degree = node.degree(), "node overwritten");
            return Ok(VertexInsert::Overwritten);
        }
        self.nodes.insert(key, Node::new(key, properties));
        self.order.push(key);
        Ok(VertexInsert::Inserted)
    }

    /// Replace the property bag of an existing node, returning the old one.
    pub fn update_vertex_properties(&mut self, coord: Coordinate, properties: PropertyMap) -> Result<PropertyMap> {
        let key = coord.key()?;
        let node = self.nodes.get_mut(&key).ok_or(Error::NodeNotFound(key))?;
        Ok(node.set_properties(properties))
    }

    /// Remove a node and every reverse edge pointing at it.
    pub fn remove_vertex(&mut self, coord: Coordinate) -> Result<Node> {
        let key = coord.key()?;
        let mut node = self.nodes.remove(&key).ok_or(Error::NodeNotFound(key))?;
        self.order.retain(|k| *k != key);

        let adjacency = node.take_adjacency();
        for edge in &adjacency {
            if let Some(neighbor) = self.nodes.get_mut(&edge.to) {
                neighbor.unlink(key);
            }
        }
        self.edge_count -= adjacency.len();
        debug!(node = %key, edges = adjacency.len(), "node removed");
        Ok(node)
    }

    /// Connect two existing nodes. Returns the edge weight.
    pub fn add_edge(&mut self, a: Coordinate, b: Coordinate) -> Result<f64> {
        let (ka, kb) = self.edge_endpoints(a, b)?;
        let weight = ka.distance_sq(&kb);

        let existed = self.nodes.get(&ka).and_then(|n| n.weight_to(kb)).is_some();
        if let Some(node) = self.nodes.get_mut(&ka) {
            node.link(kb, weight);
        }
        if let Some(node) = self.nodes.get_mut(&kb) {
            node.link(ka, weight);
        }
        if !existed {
            self.edge_count += 1;
        }
        Ok(weight)
    }

    /// Disconnect two nodes. Fails with `InvalidEdge` if they were not connected.
    pub fn remove_edge(&mut self, a: Coordinate, b: Coordinate) -> Result<()> {
        let (ka, kb) = self.edge_endpoints(a, b)?;
        let removed = self.nodes.get_mut(&ka).is_some_and(|n| n.unlink(kb));
        if !removed {
            return Err(Error::InvalidEdge(format!("no edge between {ka} and {kb}")));
        }
        if let Some(node) = self.nodes.get_mut(&kb) {
            node.unlink(ka);
        }
        self.edge_count -= 1;
        Ok(())
    }

    fn edge_endpoints(&self, a: Coordinate, b: Coordinate) -> Result<(NodeKey, NodeKey)> {
        let ka = a.key()?;
        let kb = b.key()?;
        if ka == kb {
            return Err(Error::InvalidEdge(format!("self-loop at {ka}")));
        }
        for k in [ka, kb] {
            if !self.nodes.contains_key(&k) {
                return Err(Error::NodeNotFound(k));
            }
        }
        Ok((ka, kb))
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Neighbors of `key` with edge weights. The iterator is `Clone`, so it
    /// can be restarted; order is stable while the graph is unchanged.
    pub fn neighbors(&self, key: NodeKey) -> Result<Neighbors<'_>> {
        let node = self.nodes.get(&key).ok_or(Error::NodeNotFound(key))?;
        Ok(Neighbors { inner: node.adjacency().iter() })
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|k| self.nodes.get(k))
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.order.iter().copied()
    }

    /// Every undirected edge once, as `(a, b, weight)`, following node order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeKey, NodeKey, f64)> + '_ {
        self.nodes().flat_map(|n| {
            let from = n.key();
            n.adjacency()
                .iter()
                .filter(move |e| from < e.to)
                .map(move |e| (from, e.to, e.weight))
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when every adjacency entry has a matching reverse entry of the
    /// same weight and points at a live node.
    pub fn is_symmetric(&self) -> bool {
        self.nodes.values().all(|n| {
            n.adjacency().iter().all(|e| {
                self.nodes
                    .get(&e.to)
                    .and_then(|m| m.weight_to(n.key()))
                    .is_some_and(|w| w == e.weight)
            })
        })
    }
}

/// Lazy `(neighbor, weight)` sequence for one node.
#[derive(Debug, Clone)]
pub struct Neighbors<'g> {
    inner: std::slice::Iter<'g, Edge>,
}

impl Iterator for Neighbors<'_> {
    type Item = (NodeKey, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (e.to, e.weight))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Neighbors<'_> {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    fn k(lat: f64, lng: f64) -> NodeKey {
        c(lat, lng).key().unwrap()
    }

    fn square() -> SpatialGraph {
        let mut g = SpatialGraph::new();
        g.add_vertex(c(0.0, 0.0), props([("name", "A")])).unwrap();
        g.add_vertex(c(0.0, 10.0), props([("name", "B")])).unwrap();
        g.add_vertex(c(10.0, 0.0), props([("name", "C")])).unwrap();
        g.add_vertex(c(10.0, 10.0), props([("name", "D")])).unwrap();
        g.add_edge(c(0.0, 0.0), c(0.0, 10.0)).unwrap();
        g.add_edge(c(0.0, 10.0), c(10.0, 10.0)).unwrap();
        g.add_edge(c(0.0, 0.0), c(10.0, 0.0)).unwrap();
        g
    }

    #[test]
    fn test_add_edge_is_symmetric() {
        let g = square();
        let ab: Vec<_> = g.neighbors(k(0.0, 0.0)).unwrap().collect();
        assert!(ab.contains(&(k(0.0, 10.0), 100.0)));
        let ba: Vec<_> = g.neighbors(k(0.0, 10.0)).unwrap().collect();
        assert!(ba.contains(&(k(0.0, 0.0), 100.0)));
        assert_eq!(g.edge_count(), 3);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_overwrite_keeps_adjacency() {
        let mut g = square();
        let outcome = g.add_vertex(c(0.0, 0.0), props([("name", "A2")])).unwrap();
        assert_eq!(outcome, VertexInsert::Overwritten);
        let a = g.node(k(0.0, 0.0)).unwrap();
        assert_eq!(a.get("name"), Some(&Value::from("A2")));
        assert_eq!(a.degree(), 2);
        assert_eq!(g.node_count(), 4);
        // overwrite keeps the original slot in iteration order
        assert_eq!(g.keys().next(), Some(k(0.0, 0.0)));
    }

    #[test]
    fn test_update_properties() {
        let mut g = square();
        let old = g.update_vertex_properties(c(0.0, 10.0), props([("name", "Library")])).unwrap();
        assert_eq!(old.get("name"), Some(&Value::from("B")));
        assert_eq!(g.node(k(0.0, 10.0)).unwrap().degree(), 2);

        let missing = g.update_vertex_properties(c(5.0, 5.0), PropertyMap::new());
        assert!(matches!(missing, Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_remove_vertex_drops_reverse_edges() {
        let mut g = square();
        g.remove_vertex(c(0.0, 10.0)).unwrap();
        assert!(!g.contains(k(0.0, 10.0)));
        for node in g.nodes() {
            assert!(node.adjacency().iter().all(|e| e.to != k(0.0, 10.0)));
        }
        assert_eq!(g.edge_count(), 1);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_remove_missing_vertex() {
        let mut g = square();
        assert!(matches!(g.remove_vertex(c(3.0, 3.0)), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut g = square();
        assert!(matches!(g.add_edge(c(0.0, 0.0), c(0.0, 0.0)), Err(Error::InvalidEdge(_))));
    }

    #[test]
    fn test_edge_to_missing_node() {
        let mut g = square();
        let err = g.add_edge(c(0.0, 0.0), c(7.0, 7.0)).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(key) if key == k(7.0, 7.0)));
    }

    #[test]
    fn test_duplicate_edge_counts_once() {
        let mut g = square();
        g.add_edge(c(0.0, 10.0), c(0.0, 0.0)).unwrap();
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.edges().count(), 3);
    }

    #[test]
    fn test_remove_edge() {
        let mut g = square();
        g.remove_edge(c(0.0, 0.0), c(10.0, 0.0)).unwrap();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.node(k(10.0, 0.0)).unwrap().degree(), 0);
        assert!(matches!(
            g.remove_edge(c(0.0, 0.0), c(10.0, 0.0)),
            Err(Error::InvalidEdge(_))
        ));
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_neighbors_restartable() {
        let g = square();
        let it = g.neighbors(k(0.0, 0.0)).unwrap();
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
        assert!(matches!(g.neighbors(k(1.0, 1.0)), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_insertion_order() {
        let g = square();
        let keys: Vec<_> = g.keys().collect();
        assert_eq!(keys, vec![k(0.0, 0.0), k(0.0, 10.0), k(10.0, 0.0), k(10.0, 10.0)]);
    }
}
