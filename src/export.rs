//! GeoJSON export: serialize a graph for map front-ends.
//!
//! Produces a `FeatureCollection` with one `Point` feature per node (carrying
//! its properties) and one `LineString` feature per undirected edge. Edge
//! features carry their squared-distance `weight`.
//!
//! ```text
//! SpatialGraph → graph_to_geojson() → FeatureCollection
//!   → hand to the map renderer, or write to disk with export_geojson()
//! ```

use std::io::Write;

use serde_json::{json, Value as Json};

use crate::graph::SpatialGraph;
use crate::model::{Coordinate, NodeKey};
use crate::Result;

/// Build the GeoJSON document for a graph. Node features follow the graph's
/// insertion order.
pub fn graph_to_geojson(graph: &SpatialGraph) -> Json {
    let mut features = Vec::with_capacity(graph.node_count() + graph.edge_count());

    for node in graph.nodes() {
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": point(node.coordinate()) },
            "properties": node.properties(),
        }));
    }

    for (a, b, weight) in graph.edges() {
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [point_of(a), point_of(b)] },
            "properties": { "weight": weight },
        }));
    }

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Write a graph as a GeoJSON `FeatureCollection`.
pub fn export_geojson(graph: &SpatialGraph, writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer(&mut *writer, &graph_to_geojson(graph))?;
    writeln!(writer)?;
    Ok(())
}

fn point(c: Coordinate) -> [f64; 2] {
    c.into()
}

fn point_of(k: NodeKey) -> [f64; 2] {
    point(k.coordinate())
}
