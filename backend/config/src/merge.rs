//! Layered config merging.
//!
//! The base tree defines the schema: only its keys survive a merge, and
//! source values override base values. Object-ness is decided by the
//! `Value::Object` variant; arrays and `null` are leaves.

use serde_json::{Map, Value};

use chatframe_core::ChatError;

use crate::schema::WidgetConfig;

/// Merge `source` over `base`.
///
/// With `deep == false`, object values are merged one level deep and
/// everything else is overwritten. With `deep == true`, object values are
/// merged recursively in both directions so keys unique to either side
/// survive. Keys that only exist in `source` are dropped.
pub fn merge(base: &Value, source: &Value, deep: bool) -> Value {
    let Value::Object(base_map) = base else {
        return base.clone();
    };
    let source_map = source.as_object();

    let merged: Map<String, Value> = base_map
        .iter()
        .map(|(key, base_value)| {
            let value = match source_map.and_then(|s| s.get(key)) {
                None => base_value.clone(),
                Some(source_value) => merge_value(base_value, source_value, deep),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(merged)
}

fn merge_value(base: &Value, source: &Value, deep: bool) -> Value {
    match (base, source) {
        (Value::Object(_), Value::Object(_)) if deep => {
            let mut out = into_map(merge(source, base, true));
            out.extend(into_map(merge(base, source, true)));
            Value::Object(out)
        }
        (Value::Object(base_map), Value::Object(source_map)) => {
            let mut out = base_map.clone();
            out.extend(source_map.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(out)
        }
        // An object slot is never replaced by a scalar.
        (Value::Object(_), _) => base.clone(),
        (_, source) => source.clone(),
    }
}

/// Loader-side merge: empty source values (`null`, `""`, `[]`, `{}`) never
/// override, and objects merge recursively in both directions.
pub fn merge_non_empty(base: &Value, source: &Value) -> Value {
    if is_empty(source) {
        return base.clone();
    }
    let Value::Object(base_map) = base else {
        return base.clone();
    };

    let merged: Map<String, Value> = base_map
        .iter()
        .map(|(key, base_value)| {
            let value = match source.get(key) {
                Some(source_value) if !is_empty(source_value) => match (base_value, source_value) {
                    (Value::Object(_), Value::Object(_)) => {
                        let mut out = into_map(merge_non_empty(source_value, base_value));
                        out.extend(into_map(merge_non_empty(base_value, source_value)));
                        Value::Object(out)
                    }
                    (Value::Object(_), _) => base_value.clone(),
                    (_, source_value) => source_value.clone(),
                },
                _ => base_value.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(merged)
}

/// Merge a JSON source over a typed config.
pub fn merge_typed(config: &WidgetConfig, source: &Value, deep: bool) -> Result<WidgetConfig, ChatError> {
    WidgetConfig::from_value(merge(&config.to_value(), source, deep))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(_) | Value::Number(_) => false,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
