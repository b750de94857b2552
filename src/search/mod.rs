//! # Path Search
//!
//! `PathFinder` is the seam between the registry and the search algorithm.
//! The registry only ever calls `find_path` with keys it has already resolved
//! against the same graph.
//!
//! | Finder | Module | Description |
//! |--------|--------|-------------|
//! | `AStar` | `astar` | Best-first search with a goal-distance heuristic |

pub mod astar;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::SpatialGraph;
use crate::model::{NodeKey, Route};
use crate::Result;

pub use astar::AStar;

/// How the squared straight-line distance to the goal enters frontier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// f = g; ties in f go to the node closer to the goal. Always returns a
    /// minimum-weight route.
    #[default]
    GoalTieBreak,
    /// f = g + d(n, goal)^2. Expands fewer nodes on open layouts but can
    /// overestimate, since a route of several short hops weighs less than
    /// the square of its straight-line span.
    SquaredDistance,
}

impl Heuristic {
    /// Multiplier applied to h when computing f.
    pub(crate) fn f_weight(self) -> f64 {
        match self {
            Heuristic::GoalTieBreak => 0.0,
            Heuristic::SquaredDistance => 1.0,
        }
    }
}

/// Shortest-route search over a `SpatialGraph`.
///
/// Implementations must fail with `DuplicateEndpoints` when `start == end`,
/// `NodeNotFound` when either key is absent, and `NoPath` when the two keys
/// lie in different components.
pub trait PathFinder: Send + Sync + 'static {
    fn find_path(&self, graph: &SpatialGraph, start: NodeKey, end: NodeKey) -> Result<Route>;
}

impl<F: PathFinder + ?Sized> PathFinder for Arc<F> {
    fn find_path(&self, graph: &SpatialGraph, start: NodeKey, end: NodeKey) -> Result<Route> {
        (**self).find_path(graph, start, end)
    }
}

impl<F: PathFinder + ?Sized> PathFinder for Box<F> {
    fn find_path(&self, graph: &SpatialGraph, start: NodeKey, end: NodeKey) -> Result<Route> {
        (**self).find_path(graph, start, end)
    }
}
