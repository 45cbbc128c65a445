use std::path::Path;

use serde_json::{Map, Value};

use crate::{ReloadError, Result};

/// Parses the content of an existing configured file into a top-level JSON
/// object.
///
/// # Errors
/// Returns `ReloadError::JsonParseError` for invalid JSON, including empty
/// content, and `ReloadError::NotAnObject` when the document is not an object.
pub(crate) fn parse_document(path: &Path, content: &[u8]) -> Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_slice(content).map_err(|e| ReloadError::json_parse(e, path))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ReloadError::NotAnObject {
            path: path.to_path_buf(),
            found: json_type_name(&other),
        }),
    }
}

/// Merges parsed documents in the order they are given, later ones on top.
pub(crate) fn merge_documents<I>(documents: I) -> Map<String, Value>
where
    I: IntoIterator<Item = Map<String, Value>>,
{
    let mut accumulated = Value::Object(Map::new());

    for document in documents {
        accumulated = merge_two_json_values(accumulated, Value::Object(document));
    }

    match accumulated {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Deep merges two JSON values with the overlay taking precedence
///
/// Objects merge key by key and arrays are concatenated with the base
/// elements first. For any other combination the overlay replaces the base
/// entirely, including when the two sides have different types.
pub(crate) fn merge_two_json_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    None => overlay_value,
                    Some(base_value) => merge_two_json_values(base_value, overlay_value),
                };
                base_map.insert(key, merged_value);
            }

            Value::Object(base_map)
        }
        (Value::Array(mut base_items), Value::Array(overlay_items)) => {
            base_items.extend(overlay_items);
            Value::Array(base_items)
        }
        (_, overlay) => overlay,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
