//! A* over a `SpatialGraph`.
//!
//! g is the summed squared-distance weight from the start, h the squared
//! straight-line distance to the goal. The open set is a binary heap with
//! lazy deletion: improved nodes are pushed again and stale entries are
//! skipped once their node is closed. Closed nodes are never reopened.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use super::{Heuristic, PathFinder};
use crate::graph::SpatialGraph;
use crate::model::{NodeKey, Route};
use crate::{Error, Result};

/// A* path finder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AStar {
    heuristic: Heuristic,
}

impl AStar {
    pub fn new(heuristic: Heuristic) -> Self {
        Self { heuristic }
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }
}

impl PathFinder for AStar {
    fn find_path(&self, graph: &SpatialGraph, start: NodeKey, end: NodeKey) -> Result<Route> {
        if start == end {
            return Err(Error::DuplicateEndpoints(start));
        }
        for key in [start, end] {
            if !graph.contains(key) {
                return Err(Error::NodeNotFound(key));
            }
        }

        let goal = end.coordinate();
        let h = |k: NodeKey| k.coordinate().distance_sq(&goal);
        let w = self.heuristic.f_weight();

        let mut open = BinaryHeap::new();
        let mut visits: HashMap<NodeKey, Visit> = HashMap::new();
        let mut closed: HashSet<NodeKey> = HashSet::new();
        let mut seq = 0u64;

        let h0 = h(start);
        visits.insert(start, Visit { g: 0.0, parent: None });
        open.push(Frontier { f: w * h0, h: h0, seq, g: 0.0, key: start });

        while let Some(current) = open.pop() {
            if !closed.insert(current.key) {
                continue;
            }
            if current.key == end {
                trace!(%start, %end, expanded = closed.len(), "route found");
                return Ok(reconstruct(&visits, end, current.g));
            }

            for (next, weight) in graph.neighbors(current.key)? {
                if closed.contains(&next) {
                    continue;
                }
                let g = current.g + weight;
                if visits.get(&next).is_some_and(|v| g >= v.g) {
                    continue;
                }
                visits.insert(next, Visit { g, parent: Some(current.key) });
                let hn = h(next);
                seq += 1;
                open.push(Frontier { f: g + w * hn, h: hn, seq, g, key: next });
            }
        }

        trace!(%start, %end, expanded = closed.len(), "frontier exhausted");
        Err(Error::NoPath { from: start, to: end })
    }
}

#[derive(Debug, Clone, Copy)]
struct Visit {
    g: f64,
    parent: Option<NodeKey>,
}

/// Open-set entry. Ordered so the max-heap pops lowest f, then lowest h,
/// then the earliest pushed.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    f: f64,
    h: f64,
    seq: u64,
    g: f64,
    key: NodeKey,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

fn reconstruct(visits: &HashMap<NodeKey, Visit>, end: NodeKey, weight: f64) -> Route {
    let mut nodes = vec![end];
    let mut cursor = visits.get(&end).and_then(|v| v.parent);
    while let Some(key) = cursor {
        nodes.push(key);
        cursor = visits.get(&key).and_then(|v| v.parent);
    }
    nodes.reverse();
    Route::new(nodes, weight)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, PropertyMap};
    use proptest::prelude::*;

    fn k(lat: f64, lng: f64) -> NodeKey {
        Coordinate::new(lat, lng).key().unwrap()
    }

    fn build(points: &[(f64, f64)], edges: &[(usize, usize)]) -> SpatialGraph {
        let mut g = SpatialGraph::new();
        for &(lat, lng) in points {
            g.add_vertex(Coordinate::new(lat, lng), PropertyMap::new()).unwrap();
        }
        for &(a, b) in edges {
            let (pa, pb) = (points[a], points[b]);
            g.add_edge(pa.into(), pb.into()).unwrap();
        }
        g
    }

    /// A(0,0) B(0,10) C(10,0) D(10,10); A-B, B-D, A-C.
    fn square() -> SpatialGraph {
        build(
            &[(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)],
            &[(0, 1), (1, 3), (0, 2)],
        )
    }

    #[test]
    fn test_square_route() {
        for heuristic in [Heuristic::GoalTieBreak, Heuristic::SquaredDistance] {
            let route = AStar::new(heuristic).find_path(&square(), k(0.0, 0.0), k(10.0, 10.0)).unwrap();
            assert_eq!(route.nodes(), &[k(0.0, 0.0), k(0.0, 10.0), k(10.0, 10.0)]);
            assert_eq!(route.weight(), 200.0);
        }
    }

    #[test]
    fn test_prefers_many_short_hops() {
        // Direct A-B weighs 100; via M it weighs 25 + 25.
        let g = build(&[(0.0, 0.0), (0.0, 5.0), (0.0, 10.0)], &[(0, 2), (0, 1), (1, 2)]);
        let route = AStar::default().find_path(&g, k(0.0, 0.0), k(0.0, 10.0)).unwrap();
        assert_eq!(route.weight(), 50.0);
        assert_eq!(route.len(), 2);
    }

    #[test]
    fn test_duplicate_endpoints() {
        let err = AStar::default().find_path(&square(), k(0.0, 0.0), k(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, Error::DuplicateEndpoints(_)));
    }

    #[test]
    fn test_no_path() {
        let g = build(&[(0.0, 0.0), (0.0, 1.0), (5.0, 5.0)], &[(0, 1)]);
        let err = AStar::default().find_path(&g, k(0.0, 0.0), k(5.0, 5.0)).unwrap_err();
        assert!(matches!(err, Error::NoPath { .. }));
    }

    #[test]
    fn test_missing_endpoint() {
        let err = AStar::default().find_path(&square(), k(0.0, 0.0), k(3.0, 3.0)).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(key) if key == k(3.0, 3.0)));
    }

    #[test]
    fn test_frontier_order() {
        let entry = |f, h, seq| Frontier { f, h, seq, g: 0.0, key: k(0.0, 0.0) };
        let mut heap = BinaryHeap::new();
        heap.push(entry(5.0, 1.0, 0));
        heap.push(entry(3.0, 4.0, 1));
        heap.push(entry(3.0, 2.0, 2));
        heap.push(entry(3.0, 2.0, 3));
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop()).map(|e| e.seq).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    /// All-pairs shortest weights by Floyd-Warshall.
    fn brute_force(points: &[(f64, f64)], edges: &[(usize, usize)]) -> Vec<Vec<f64>> {
        let n = points.len();
        let mut d = vec![vec![f64::INFINITY; n]; n];
        for (i, row) in d.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        for &(a, b) in edges {
            let w = Coordinate::from(points[a]).distance_sq(&Coordinate::from(points[b]));
            d[a][b] = d[a][b].min(w);
            d[b][a] = d[b][a].min(w);
        }
        for m in 0..n {
            for i in 0..n {
                for j in 0..n {
                    if d[i][m] + d[m][j] < d[i][j] {
                        d[i][j] = d[i][m] + d[m][j];
                    }
                }
            }
        }
        d
    }

    fn arb_graph() -> impl Strategy<Value = (Vec<(f64, f64)>, Vec<(usize, usize)>)> {
        prop::collection::btree_set((-10i32..10, -10i32..10), 2..9).prop_flat_map(|cells| {
            let points: Vec<(f64, f64)> = cells.into_iter().map(|(a, b)| (a as f64, b as f64)).collect();
            let n = points.len();
            let edges = prop::collection::vec((0..n, 0..n), 0..20)
                .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a != b).collect::<Vec<_>>());
            (Just(points), edges)
        })
    }

    proptest! {
        #[test]
        fn astar_matches_exhaustive_search((points, edges) in arb_graph()) {
            let graph = build(&points, &edges);
            let best = brute_force(&points, &edges);
            let finder = AStar::default();

            for s in 0..points.len() {
                for t in 0..points.len() {
                    if s == t {
                        continue;
                    }
                    let (start, end) = (Coordinate::from(points[s]).key().unwrap(), Coordinate::from(points[t]).key().unwrap());
                    match finder.find_path(&graph, start, end) {
                        Ok(route) => {
                            prop_assert_eq!(route.weight(), best[s][t]);
                            prop_assert_eq!(route.start(), Some(start));
                            prop_assert_eq!(route.end(), Some(end));
                            let walked: f64 = route
                                .nodes()
                                .windows(2)
                                .map(|w| graph.node(w[0]).and_then(|n| n.weight_to(w[1])).unwrap_or(f64::NAN))
                                .sum();
                            prop_assert_eq!(walked, route.weight());
                        }
                        Err(Error::NoPath { .. }) => prop_assert!(best[s][t].is_infinite()),
                        Err(e) => prop_assert!(false, "unexpected error {e}"),
                    }
                }
            }
        }
    }
}
