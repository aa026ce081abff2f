use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConversionError;

/// Reserved prefix of vendor extension keys.
pub const EXTENSION_PREFIX: &str = "x-";

/// A vendor extension as it is stored on the model side.
///
/// Object and array values are kept as JSON text; scalars are kept as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    #[serde(rename = "extensionPattern")]
    pub key: String,
    #[serde(rename = "extensionValue", default)]
    pub value: Value,
}

impl Extension {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

pub fn is_extension_key(key: &str) -> bool {
    key.starts_with(EXTENSION_PREFIX)
}

/// Collect the extension entries of an ordered key/value sequence.
pub fn collect<'a, I>(entries: I) -> Result<Vec<Extension>, ConversionError>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    entries
        .into_iter()
        .filter(|(key, _)| is_extension_key(key))
        .map(|(key, value)| Ok(Extension::new(key.clone(), stored_value(key, value)?)))
        .collect()
}

/// Split a node into its regular keys and its extensions, keeping encounter order.
pub fn extract(
    map: &Map<String, Value>,
) -> Result<(Map<String, Value>, Vec<Extension>), ConversionError> {
    let mut clean = Map::new();
    let mut extensions = Vec::new();

    for (key, value) in map {
        if is_extension_key(key) {
            extensions.push(Extension::new(key.clone(), stored_value(key, value)?));
        } else {
            clean.insert(key.clone(), value.clone());
        }
    }

    Ok((clean, extensions))
}

/// Spread extensions back onto a node as top-level siblings.
pub fn inject(map: &mut Map<String, Value>, extensions: &[Extension]) {
    for (key, value) in to_fields(extensions) {
        map.insert(key, value);
    }
}

/// Extensions as an ordered field map, ready to be flattened into a typed object.
pub fn to_fields(extensions: &[Extension]) -> IndexMap<String, Value> {
    extensions
        .iter()
        .filter(|extension| {
            let keep = is_extension_key(&extension.key);
            if !keep {
                debug!("Skipping extension without prefix: {}", extension.key);
            }
            keep
        })
        .map(|extension| (extension.key.clone(), emitted_value(&extension.value)))
        .collect()
}

fn stored_value(key: &str, value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value)
            .map(Value::String)
            .map_err(|e| {
                ConversionError::conversion(format!("extension {} cannot be stored: {}", key, e))
            }),
        scalar => Ok(scalar.clone()),
    }
}

fn emitted_value(value: &Value) -> Value {
    if let Value::String(text) = value {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                return parsed;
            }
        }
    }
    value.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_extract_then_inject_round_trip() {
        let node = as_map(json!({ "type": "string", "x-nullable": true }));
        let (mut clean, extensions) = extract(&node).unwrap();

        assert_eq!(clean, as_map(json!({ "type": "string" })));
        assert_eq!(extensions, vec![Extension::new("x-nullable", json!(true))]);

        inject(&mut clean, &extensions);
        assert_eq!(clean, node);
        assert_eq!(serde_json::to_string(&clean).unwrap(), serde_json::to_string(&node).unwrap());
    }

    #[test]
    fn test_extension_order_is_preserved() {
        let node = as_map(json!({
            "x-b": 1,
            "type": "object",
            "x-a": "two",
            "x-c": null
        }));
        let (mut clean, extensions) = extract(&node).unwrap();
        let keys: Vec<&str> = extensions.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["x-b", "x-a", "x-c"]);

        inject(&mut clean, &extensions);
        let keys: Vec<&str> = clean.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "x-b", "x-a", "x-c"]);
    }

    #[test]
    fn test_structured_values_are_stored_as_text() {
        let node = as_map(json!({ "x-meta": { "owner": "team", "tags": [1, 2] } }));
        let (_, extensions) = extract(&node).unwrap();
        assert_eq!(
            extensions[0].value,
            json!("{\"owner\":\"team\",\"tags\":[1,2]}")
        );

        let fields = to_fields(&extensions);
        assert_eq!(fields["x-meta"], json!({ "owner": "team", "tags": [1, 2] }));
    }

    #[test]
    fn test_plain_strings_stay_strings() {
        let extensions = vec![
            Extension::new("x-note", json!("{not json")),
            Extension::new("x-plain", json!("hello")),
        ];
        let fields = to_fields(&extensions);
        assert_eq!(fields["x-note"], json!("{not json"));
        assert_eq!(fields["x-plain"], json!("hello"));
    }

    #[test]
    fn test_keys_without_prefix_are_not_injected() {
        let mut node = Map::new();
        inject(&mut node, &[Extension::new("nullable", json!(true))]);
        assert!(node.is_empty());
    }

    #[test]
    fn test_model_side_shape() {
        let extension: Extension =
            serde_json::from_value(json!({ "extensionPattern": "x-id", "extensionValue": 7 }))
                .unwrap();
        assert_eq!(extension, Extension::new("x-id", json!(7)));
        assert_eq!(
            serde_json::to_value(&extension).unwrap(),
            json!({ "extensionPattern": "x-id", "extensionValue": 7 })
        );
    }
}
