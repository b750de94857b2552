//! Persisted graph definitions.
//!
//! A `GraphDefinition` is the shape the persistence collaborator reads and
//! writes: a flat list of nodes and a flat list of undirected edges. The
//! engine builds a `SpatialGraph` from it and can turn a graph back into one.
//!
//! `from_legacy_document` also accepts the older keyed-map document, where
//! each node lives under its `"lat,lng"` string and lists its neighbors in
//! `connections`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::SpatialGraph;
use crate::model::*;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub coordinates: Coordinate,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: Coordinate,
    pub to: Coordinate,
}

/// Nodes plus edges, as stored by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

impl GraphDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, coord: impl Into<Coordinate>, properties: PropertyMap) -> Self {
        self.nodes.push(NodeDefinition { coordinates: coord.into(), properties });
        self
    }

    pub fn edge(mut self, from: impl Into<Coordinate>, to: impl Into<Coordinate>) -> Self {
        self.edges.push(EdgeDefinition { from: from.into(), to: to.into() });
        self
    }

    /// Structural validation for incoming graph updates.
    ///
    /// Rejects non-finite coordinates, duplicate nodes, edges whose endpoints
    /// are not defined, and self-loops. The engine itself assumes a
    /// definition has already passed this.
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            let key = node
                .coordinates
                .key()
                .map_err(|_| invalid(format!("node {i} has invalid coordinates {}", node.coordinates)))?;
            if !keys.insert(key) {
                return Err(invalid(format!("duplicate node at {key}")));
            }
        }
        for (i, edge) in self.edges.iter().enumerate() {
            let from = edge.from.key().map_err(|_| invalid(format!("edge {i} has invalid start {}", edge.from)))?;
            let to = edge.to.key().map_err(|_| invalid(format!("edge {i} has invalid end {}", edge.to)))?;
            if from == to {
                return Err(invalid(format!("edge {i} is a self-loop at {from}")));
            }
            for key in [from, to] {
                if !keys.contains(&key) {
                    return Err(invalid(format!("edge {i} references undefined node {key}")));
                }
            }
        }
        Ok(())
    }

    /// Build a graph. Nodes first (in definition order), then edges.
    pub fn build(&self) -> Result<SpatialGraph> {
        let mut graph = SpatialGraph::with_capacity(self.nodes.len());
        for node in &self.nodes {
            graph.add_vertex(node.coordinates, node.properties.clone())?;
        }
        for edge in &self.edges {
            graph.add_edge(edge.from, edge.to)?;
        }
        Ok(graph)
    }

    /// Snapshot a live graph back into its persisted form.
    pub fn from_graph(graph: &SpatialGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|n| NodeDefinition { coordinates: n.coordinate(), properties: n.properties().clone() })
                .collect(),
            edges: graph
                .edges()
                .map(|(a, b, _)| EdgeDefinition { from: a.coordinate(), to: b.coordinate() })
                .collect(),
        }
    }

    /// Parse the keyed-map document format.
    ///
    /// ```json
    /// { "10,0": { "properties": {"letter": "A"}, "connections": {"10,20": 400} } }
    /// ```
    ///
    /// Every entry must carry both `properties` and `connections`. Stored
    /// connection distances are ignored; weights are recomputed on build.
    pub fn from_legacy_document(doc: &serde_json::Value) -> Result<Self> {
        let entries = doc
            .as_object()
            .ok_or_else(|| invalid("graph document must be an object".to_string()))?;

        let mut def = Self::new();
        let mut seen = HashSet::new();
        for (raw_key, entry) in entries {
            let coord: Coordinate = raw_key.parse()?;
            let (Some(properties), Some(connections)) = (entry.get("properties"), entry.get("connections")) else {
                return Err(invalid(format!("node '{raw_key}' is missing properties or connections")));
            };
            let properties = match Value::from(properties.clone()) {
                Value::Map(map) => map,
                other => {
                    return Err(invalid(format!("node '{raw_key}' properties must be an object, not {}", other.kind())));
                }
            };
            let connections = connections
                .as_object()
                .ok_or_else(|| invalid(format!("node '{raw_key}' connections must be an object")))?;

            def.nodes.push(NodeDefinition { coordinates: coord, properties });
            let from = coord.key()?;
            for neighbor in connections.keys() {
                let to_coord: Coordinate = neighbor.parse()?;
                let to = to_coord.key()?;
                let pair = if from < to { (from, to) } else { (to, from) };
                if seen.insert(pair) {
                    def.edges.push(EdgeDefinition { from: coord, to: to_coord });
                }
            }
        }
        Ok(def)
    }
}

impl TryFrom<&GraphDefinition> for SpatialGraph {
    type Error = Error;

    fn try_from(def: &GraphDefinition) -> Result<Self> {
        def.build()
    }
}

fn invalid(msg: String) -> Error {
    Error::InvalidDefinition(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn campus() -> GraphDefinition {
        GraphDefinition::new()
            .node([10.0, 0.0], props([("letter", "A")]))
            .node([10.0, 20.0], props([("letter", "B")]))
            .node([0.0, 0.0], props([("letter", "C")]))
            .edge([10.0, 0.0], [10.0, 20.0])
            .edge([10.0, 0.0], [0.0, 0.0])
    }

    #[test]
    fn test_build() {
        let g = campus().build().unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_round_trip_through_graph() {
        let def = campus();
        let g = def.build().unwrap();
        let back = GraphDefinition::from_graph(&g);
        assert_eq!(back.nodes, def.nodes);
        assert_eq!(back.edges.len(), 2);
        assert_eq!(back.build().unwrap().edge_count(), 2);
    }

    #[test]
    fn test_validate_ok() {
        campus().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_dangling_edge() {
        let def = campus().edge([0.0, 0.0], [5.0, 5.0]);
        assert!(matches!(def.validate(), Err(Error::InvalidDefinition(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_node() {
        let def = campus().node([0.0, 0.0], PropertyMap::new());
        assert!(matches!(def.validate(), Err(Error::InvalidDefinition(_))));
    }

    #[test]
    fn test_validate_rejects_self_loop_and_nan() {
        assert!(campus().edge([0.0, 0.0], [0.0, 0.0]).validate().is_err());
        assert!(campus().node([f64::NAN, 0.0], PropertyMap::new()).validate().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let def: GraphDefinition = serde_json::from_value(json!({
            "nodes": [
                {"coordinates": [0, 0], "properties": {"name": "Gate"}},
                {"coordinates": [0, 5]}
            ],
            "edges": [{"from": [0, 0], "to": [0, 5]}]
        }))
        .unwrap();
        assert_eq!(def.nodes.len(), 2);
        assert!(def.nodes[1].properties.is_empty());
        assert_eq!(def.build().unwrap().edge_count(), 1);
    }

    #[test]
    fn test_legacy_document() {
        let doc = json!({
            "10,0":  {"properties": {"letter": "A"}, "connections": {"10,20": 400, "0,0": 100}},
            "10,20": {"properties": {"letter": "B"}, "connections": {"10,0": 400}},
            "0,0":   {"properties": {"letter": "C"}, "connections": {"10,0": 100}}
        });
        let def = GraphDefinition::from_legacy_document(&doc).unwrap();
        assert_eq!(def.nodes.len(), 3);
        assert_eq!(def.edges.len(), 2);
        def.validate().unwrap();
        let g = def.build().unwrap();
        let a = g.node(Coordinate::new(10.0, 0.0).key().unwrap()).unwrap();
        assert_eq!(a.get("letter"), Some(&Value::from("A")));
        assert_eq!(a.degree(), 2);
    }

    #[test]
    fn test_legacy_document_requires_shape() {
        let doc = json!({ "10,0": {"properties": {}} });
        assert!(matches!(
            GraphDefinition::from_legacy_document(&doc),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(GraphDefinition::from_legacy_document(&json!([1, 2])).is_err());

        let doc = json!({ "10,0": {"properties": "gate", "connections": {}} });
        let err = GraphDefinition::from_legacy_document(&doc).unwrap_err();
        assert!(err.to_string().contains("not string"));
    }
}
