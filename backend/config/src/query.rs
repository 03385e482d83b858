//! Host-page URL as a dynamic config source.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Query parameter carrying a JSON config object.
pub const CONFIG_QUERY_PARAM: &str = "widgetConfig";

/// Parse the query string of `url` into a key/value map.
///
/// Only the segment between the first and the next `?` is considered.
/// A key without `=` maps to `"true"`; values are percent-decoded.
pub fn parse_query_params(url: &str) -> HashMap<String, String> {
    let Some(query) = url.split('?').nth(1) else {
        return HashMap::new();
    };

    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, "true"),
            };
            if key.is_empty() {
                return None;
            }
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((key.to_string(), value))
        })
        .collect()
}

/// Decode the `widgetConfig` parameter into a config tree.
///
/// Malformed JSON yields an empty object. `ui.parentOrigin` is removed:
/// the parent origin is never taken from the URL.
pub fn config_from_query(params: &HashMap<String, String>) -> Value {
    let Some(raw) = params.get(CONFIG_QUERY_PARAM) else {
        return Value::Object(Map::new());
    };

    let mut config = match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            warn!(param = CONFIG_QUERY_PARAM, "Query config is not an object; ignoring");
            return Value::Object(Map::new());
        }
        Err(e) => {
            warn!(param = CONFIG_QUERY_PARAM, error = %e, "Error parsing config from URL");
            return Value::Object(Map::new());
        }
    };

    if let Some(ui) = config.get_mut("ui").and_then(Value::as_object_mut) {
        if ui.remove("parentOrigin").is_some() {
            debug!("Stripped ui.parentOrigin from query config");
        }
    }
    config
}
