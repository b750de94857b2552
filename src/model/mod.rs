//! # Spatial Graph Model
//!
//! Plain DTOs shared by the graph, search, cache and registry layers.
//! This module is pure data: no I/O, no locks, no async.

pub mod coord;
pub mod node;
pub mod route;
pub mod value;
pub mod property_map;
pub mod institution;

pub use coord::{Coordinate, NodeKey, KEY_SCALE};
pub use node::{Node, Edge, Adjacency};
pub use route::Route;
pub use value::Value;
pub use property_map::{PropertyMap, props};
pub use institution::InstitutionId;
