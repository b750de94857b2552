//! Coordinates and their canonical node keys.
//!
//! A `Coordinate` is what callers hand us (latitude/longitude, or projected
//! x/y; the engine only ever does planar math on it). A `NodeKey` is the
//! canonical identity of a node: the coordinate quantized to a fixed-precision
//! integer pair, so equal coordinate pairs always hash and compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Quantization factor for canonical keys (1e-9 units).
pub const KEY_SCALE: f64 = 1e9;

/// Largest absolute coordinate component a key can represent.
pub const MAX_COMPONENT: f64 = 1e9;

/// A planar coordinate pair. Serialized as `[lat, lng]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Canonical key for this coordinate.
    ///
    /// Fails with `InvalidCoordinate` for NaN, infinities, or components too
    /// large to quantize.
    pub fn key(&self) -> Result<NodeKey> {
        Ok(NodeKey {
            lat: quantize(self.lat).ok_or(Error::InvalidCoordinate { lat: self.lat, lng: self.lng })?,
            lng: quantize(self.lng).ok_or(Error::InvalidCoordinate { lat: self.lat, lng: self.lng })?,
        })
    }

    /// Squared Euclidean distance. Monotonic in true distance; take the
    /// square root at the boundary if real units are needed.
    pub fn distance_sq(&self, other: &Coordinate) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = self.lng - other.lng;
        dlat * dlat + dlng * dlng
    }
}

fn quantize(v: f64) -> Option<i64> {
    if !v.is_finite() || v.abs() > MAX_COMPONENT {
        return None;
    }
    // `as` maps -0.0 to 0, so signed zeros share a key.
    Some((v * KEY_SCALE).round() as i64)
}

impl From<[f64; 2]> for Coordinate {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lat, c.lng]
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Parses the `"lat,lng"` form used as node keys in legacy graph documents.
impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidDefinition(format!("malformed coordinate key '{s}'"));
        let (lat, lng) = s.split_once(',').ok_or_else(bad)?;
        let lat: f64 = lat.trim().parse().map_err(|_| bad())?;
        let lng: f64 = lng.trim().parse().map_err(|_| bad())?;
        Ok(Self { lat, lng })
    }
}

// ============================================================================
// NodeKey
// ============================================================================

/// Canonical, collision-free node identity: the coordinate in 1e-9 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub lat: i64,
    pub lng: i64,
}

impl NodeKey {
    /// The coordinate this key stands for.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat as f64 / KEY_SCALE,
            lng: self.lng as f64 / KEY_SCALE,
        }
    }

    pub fn distance_sq(&self, other: &NodeKey) -> f64 {
        self.coordinate().distance_sq(&other.coordinate())
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coordinate())
    }
}

impl TryFrom<Coordinate> for NodeKey {
    type Error = Error;

    fn try_from(c: Coordinate) -> Result<Self> {
        c.key()
    }
}
