//! # Configuration Trees
//!
//! Helpers over `serde_json::Value` used as the configuration tree by the
//! precedence engine and the hydrator.
//!
//! ## Merge Semantics
//!
//! [`deep_merge`] folds an overlay into a base on a per-leaf-key basis:
//!
//! - object into object: merged recursively, key by key;
//! - anything else (scalar, array, object over scalar): the overlay value
//!   replaces the base value outright. Arrays are never concatenated.
//!
//! The merge is not associative (an intermediate scalar can erase an object
//! that a later layer would otherwise have merged into), so layers must be
//! folded left to right in precedence order.
//!
//! `serde_json::Map` is ordered by key (the `preserve_order` feature is not
//! enabled), so merge output never depends on insertion order.
//!
//! ## Pointers
//!
//! Paths use RFC 6901 JSON Pointer syntax (`/storage/encrypted`).

use serde_json::{Map, Value};

/// Merge `overlay` into `base` in place.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Return a new tree with `overlay` merged over `base`.
pub fn merged(base: &Value, overlay: &Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay);
    out
}

/// Escape one pointer segment (`~` → `~0`, `/` → `~1`).
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Append an object key to a pointer.
pub fn join_pointer(parent: &str, key: &str) -> String {
    format!("{parent}/{}", escape_pointer_segment(key))
}

/// Split a pointer into unescaped segments. The root pointer `""` has none;
/// empty segments are kept, so `//a` is `["", "a"]`.
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    let Some(rest) = pointer.strip_prefix('/') else {
        return Vec::new();
    };
    rest.split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Write `value` at `pointer`, creating intermediate objects.
///
/// Any non-object encountered on the way is replaced by an object, matching
/// the replace-on-type-mismatch rule of [`deep_merge`].
pub fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    set_segments(root, &pointer_segments(pointer), value);
}

fn set_segments(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_segments(child, rest, value);
    }
}

/// Pointers to every leaf of `value`.
///
/// A leaf is any non-object value or an empty object. Arrays are leaves:
/// merge never descends into them.
pub fn leaf_pointers(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaves(value, String::new(), &mut out);
    out
}

fn collect_leaves(value: &Value, pointer: String, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(child, join_pointer(&pointer, key), out);
            }
        }
        _ => out.push(pointer),
    }
}

/// Render a scalar for textual interpolation: strings without quotes,
/// everything else as compact JSON.
pub fn render_inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
