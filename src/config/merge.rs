//! Deep merge of YAML configuration tiers.
//!
//! Higher tiers override lower tiers field by field. Arrays (such as the
//! status catalog) are replaced as a whole, never concatenated.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// Objects merge recursively, a null overlay keeps the base value, anything
/// else in the overlay replaces the base.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold `deep_merge` over tiers ordered lowest to highest priority.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
