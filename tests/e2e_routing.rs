//! End-to-end integration tests for route queries.
//!
//! Each test exercises: resolve both endpoints -> cache lookup -> A* -> cache
//! store, through `Wayfinder::route_between()` against MemoryStore.

use std::sync::atomic::{AtomicUsize, Ordering};

use wayfinder::{
    AStar, Config, Coordinate, Error, GraphDefinition, Heuristic, InstitutionId, MemoryStore,
    NodeKey, PathFinder, PropertyMap, Route, SpatialGraph, Wayfinder, props,
};

// ============================================================================
// Helpers
// ============================================================================

/// A(0,0) B(0,10) C(10,0) D(10,10); edges A-B, B-D, A-C.
fn square() -> GraphDefinition {
    GraphDefinition::new()
        .node([0.0, 0.0], props([("name", "A")]))
        .node([0.0, 10.0], props([("name", "B")]))
        .node([10.0, 0.0], props([("name", "C")]))
        .node([10.0, 10.0], props([("name", "D")]))
        .edge([0.0, 0.0], [0.0, 10.0])
        .edge([0.0, 10.0], [10.0, 10.0])
        .edge([0.0, 0.0], [10.0, 0.0])
}

fn c(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng)
}

fn k(lat: f64, lng: f64) -> NodeKey {
    c(lat, lng).key().unwrap()
}

async fn campus(definition: GraphDefinition) -> (Wayfinder<MemoryStore>, InstitutionId) {
    let finder = Wayfinder::open_memory().await.unwrap();
    let id = InstitutionId::from("campus");
    finder.update_graph(&id, definition).await.unwrap();
    (finder, id)
}

#[derive(Default)]
struct Counting {
    inner: AStar,
    calls: AtomicUsize,
}

impl PathFinder for Counting {
    fn find_path(&self, graph: &SpatialGraph, start: NodeKey, end: NodeKey) -> wayfinder::Result<Route> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_path(graph, start, end)
    }
}

async fn counting_campus() -> (Wayfinder<MemoryStore, Counting>, InstitutionId) {
    let finder = Wayfinder::with_finder(MemoryStore::new(), Config::default(), Counting::default())
        .await
        .unwrap();
    let id = InstitutionId::from("campus");
    finder.update_graph(&id, square()).await.unwrap();
    (finder, id)
}

fn calls(finder: &Wayfinder<MemoryStore, Counting>) -> usize {
    finder.registry().finder().calls.load(Ordering::SeqCst)
}

// ============================================================================
// 1. The square: A -> D goes through B
// ============================================================================

#[tokio::test]
async fn test_square_route() {
    let (finder, id) = campus(square()).await;

    let path = finder.route_between(&id, 0.0, 0.0, 10.0, 10.0).unwrap();
    assert_eq!(path, vec![c(0.0, 0.0), c(0.0, 10.0), c(10.0, 10.0)]);

    let route = finder.route(&id, c(0.0, 0.0), c(10.0, 10.0)).unwrap();
    assert_eq!(route.weight(), 200.0);
    assert_eq!(route.len(), 2);
    assert_eq!(route.length(), 20.0);
}

// ============================================================================
// 2. Endpoints snap to the nearest node
// ============================================================================

#[tokio::test]
async fn test_nearest_node_resolution() {
    let (finder, id) = campus(square()).await;

    assert_eq!(finder.registry().resolve(&id, c(1.0, 1.0)).unwrap(), k(0.0, 0.0));
    assert_eq!(finder.registry().resolve(&id, c(9.0, 11.0)).unwrap(), k(10.0, 10.0));

    let path = finder.route_between(&id, 1.0, 1.0, 9.0, 11.0).unwrap();
    assert_eq!(path.first(), Some(&c(0.0, 0.0)));
    assert_eq!(path.last(), Some(&c(10.0, 10.0)));
}

// ============================================================================
// 3. Reverse query returns the reversed route
// ============================================================================

#[tokio::test]
async fn test_reverse_query() {
    let (finder, id) = campus(square()).await;

    let forward = finder.route_between(&id, 0.0, 0.0, 10.0, 10.0).unwrap();
    let mut backward = finder.route_between(&id, 10.0, 10.0, 0.0, 0.0).unwrap();
    backward.reverse();
    assert_eq!(forward, backward);
}

// ============================================================================
// 4. Repeated queries are served from the cache
// ============================================================================

#[tokio::test]
async fn test_repeat_query_hits_cache() {
    let (finder, id) = counting_campus().await;

    let first = finder.route(&id, c(0.0, 0.0), c(10.0, 10.0)).unwrap();
    let second = finder.route(&id, c(0.2, -0.3), c(10.1, 9.9)).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls(&finder), 1);

    // Reverse direction shares the entry.
    let back = finder.route(&id, c(10.0, 10.0), c(0.0, 0.0)).unwrap();
    assert_eq!(back.nodes(), first.reversed().nodes());
    assert_eq!(calls(&finder), 1);

    let stats = finder.registry().cache().stats(&id);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

// ============================================================================
// 5. Both endpoints snap to the same node
// ============================================================================

#[tokio::test]
async fn test_duplicate_endpoints() {
    let (finder, id) = counting_campus().await;

    let err = finder.route_between(&id, 0.1, 0.1, -0.2, 0.3).unwrap_err();
    assert!(matches!(err, Error::DuplicateEndpoints(key) if key == k(0.0, 0.0)));
    assert_eq!(err.code().as_str(), "DUPLICATE_ENDPOINTS");
    assert!(err.is_expected());

    // Cached like any other outcome.
    let again = finder.route_between(&id, 0.0, 0.0, 0.0, 0.0).unwrap_err();
    assert!(matches!(again, Error::DuplicateEndpoints(_)));
    assert_eq!(calls(&finder), 1);
}

// ============================================================================
// 6. Disconnected components
// ============================================================================

#[tokio::test]
async fn test_no_path_between_components() {
    let graph = square()
        .node([50.0, 50.0], props([("name", "Island")]))
        .node([50.0, 60.0], props([("name", "Pier")]))
        .edge([50.0, 50.0], [50.0, 60.0]);
    let (finder, id) = campus(graph).await;

    let err = finder.route_between(&id, 0.0, 0.0, 50.0, 60.0).unwrap_err();
    match err {
        Error::NoPath { from, to } => {
            assert_eq!(from, k(0.0, 0.0));
            assert_eq!(to, k(50.0, 60.0));
        }
        other => panic!("expected NoPath, got {other:?}"),
    }

    // Inside the island component routing still works.
    let path = finder.route_between(&id, 50.0, 50.0, 50.0, 60.0).unwrap();
    assert_eq!(path.len(), 2);
}

// ============================================================================
// 7. Unknown institution and empty graph
// ============================================================================

#[tokio::test]
async fn test_unknown_institution() {
    let finder = Wayfinder::open_memory().await.unwrap();
    let err = finder.route_between(&"nowhere".into(), 0.0, 0.0, 1.0, 1.0).unwrap_err();
    assert!(matches!(err, Error::InstitutionNotFound(ref id) if id.as_str() == "nowhere"));
    assert_eq!(err.code().as_str(), "INSTITUTION_NOT_FOUND");
}

#[tokio::test]
async fn test_empty_graph() {
    let (finder, id) = campus(GraphDefinition::new()).await;
    let err = finder.route_between(&id, 0.0, 0.0, 1.0, 1.0).unwrap_err();
    assert!(matches!(err, Error::EmptyGraph));
}

#[tokio::test]
async fn test_non_finite_query_coordinate() {
    let (finder, id) = campus(square()).await;
    let err = finder.route_between(&id, f64::NAN, 0.0, 10.0, 10.0).unwrap_err();
    assert!(matches!(err, Error::InvalidCoordinate { .. }));
}

// ============================================================================
// 8. Both frontier orders agree on the square
// ============================================================================

#[tokio::test]
async fn test_heuristics_agree_on_square() {
    for heuristic in [Heuristic::GoalTieBreak, Heuristic::SquaredDistance] {
        let config = Config { heuristic, ..Config::default() };
        let finder = Wayfinder::open(MemoryStore::new(), config).await.unwrap();
        let id = InstitutionId::from("campus");
        finder.update_graph(&id, square()).await.unwrap();

        let route = finder.route(&id, c(0.0, 0.0), c(10.0, 10.0)).unwrap();
        assert_eq!(route.nodes(), &[k(0.0, 0.0), k(0.0, 10.0), k(10.0, 10.0)]);
        assert_eq!(route.weight(), 200.0);
    }
}

// ============================================================================
// 9. Short hops beat one long edge
// ============================================================================

#[tokio::test]
async fn test_prefers_short_hops() {
    // A-M-B weighs 25 + 25 = 50; the direct A-B edge weighs 100.
    let graph = GraphDefinition::new()
        .node([0.0, 0.0], PropertyMap::new())
        .node([0.0, 5.0], PropertyMap::new())
        .node([0.0, 10.0], PropertyMap::new())
        .edge([0.0, 0.0], [0.0, 10.0])
        .edge([0.0, 0.0], [0.0, 5.0])
        .edge([0.0, 5.0], [0.0, 10.0]);
    let (finder, id) = campus(graph).await;

    let route = finder.route(&id, c(0.0, 0.0), c(0.0, 10.0)).unwrap();
    assert_eq!(route.weight(), 50.0);
    assert_eq!(route.nodes(), &[k(0.0, 0.0), k(0.0, 5.0), k(0.0, 10.0)]);
}

// ============================================================================
// 10. GeoJSON rendering of a route
// ============================================================================

#[tokio::test]
async fn test_route_geojson() {
    let (finder, id) = campus(square()).await;
    let route = finder.route(&id, c(0.0, 0.0), c(10.0, 10.0)).unwrap();

    let doc = route.to_geojson();
    assert_eq!(doc["type"], "LineString");
    let points = doc["coordinates"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[1], serde_json::json!([0.0, 10.0]));
}
