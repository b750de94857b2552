//! PropertyMap: the opaque property bag on a node.

use std::collections::HashMap;

use super::Value;

/// Node properties by name. Passed through untouched by the engine.
pub type PropertyMap = HashMap<String, Value>;

/// Collect `(name, value)` pairs into a PropertyMap.
///
/// ```
/// use wayfinder::{props, Value};
///
/// let p = props([("name", "Library"), ("kind", "entrance")]);
/// assert_eq!(p["kind"], Value::from("entrance"));
/// ```
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
