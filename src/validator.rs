//! Structural checks of a Swagger 2.0 document.
//!
//! Only the active subset of a document is meant to be validated; callers
//! strip inactive entries before handing a tree over.

use serde_json::Value;

use crate::entity::{ParameterLocation, OPERATION_METHODS};
use crate::extensions::is_extension_key;

/// One finding: where it is and what is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub label: String,
    pub title: String,
}

impl ValidationMessage {
    fn new(label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            title: title.into(),
        }
    }
}

/// Anything that can inspect a Swagger document and report problems.
pub trait DocumentValidator {
    /// Findings in document order; empty when the document is valid.
    fn validate(&self, document: &Value) -> Vec<ValidationMessage>;
}

/// Checks the required members of the document, its paths, operations,
/// parameters and responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl DocumentValidator for StructuralValidator {
    fn validate(&self, document: &Value) -> Vec<ValidationMessage> {
        let mut messages = Vec::new();

        match document.get("swagger").and_then(Value::as_str) {
            Some("2.0") => {}
            Some(_) => messages.push(ValidationMessage::new("swagger", "must be \"2.0\"")),
            None => messages.push(ValidationMessage::new("swagger", "is required")),
        }

        match document.get("info") {
            Some(Value::Object(info)) => {
                for field in ["title", "version"] {
                    let present = info
                        .get(field)
                        .and_then(Value::as_str)
                        .map_or(false, |text| !text.is_empty());
                    if !present {
                        messages.push(ValidationMessage::new(format!("info.{}", field), "is required"));
                    }
                }
            }
            _ => messages.push(ValidationMessage::new("info", "is required")),
        }

        match document.get("paths") {
            Some(Value::Object(paths)) => {
                for (path, item) in paths {
                    if is_extension_key(path) {
                        continue;
                    }
                    if !path.starts_with('/') {
                        messages.push(ValidationMessage::new(
                            format!("paths.{}", path),
                            "must start with \"/\"",
                        ));
                    }
                    validate_path_item(path, item, &mut messages);
                }
            }
            _ => messages.push(ValidationMessage::new("paths", "is required")),
        }

        messages
    }
}

fn validate_path_item(path: &str, item: &Value, messages: &mut Vec<ValidationMessage>) {
    let Some(item) = item.as_object() else {
        messages.push(ValidationMessage::new(format!("paths.{}", path), "must be an object"));
        return;
    };

    for method in OPERATION_METHODS {
        let Some(operation) = item.get(method) else {
            continue;
        };
        let label = format!("paths.{}.{}", path, method);

        if let Some(parameters) = operation.get("parameters").and_then(Value::as_array) {
            for (index, parameter) in parameters.iter().enumerate() {
                validate_parameter(&format!("{}.parameters[{}]", label, index), parameter, messages);
            }
        }

        match operation.get("responses").and_then(Value::as_object) {
            Some(responses) if !responses.is_empty() => {
                for (code, response) in responses {
                    if is_extension_key(code) {
                        continue;
                    }
                    if !response.get("description").map_or(false, Value::is_string)
                        && response.get("$ref").is_none()
                    {
                        messages.push(ValidationMessage::new(
                            format!("{}.responses.{}.description", label, code),
                            "is required",
                        ));
                    }
                }
            }
            _ => messages.push(ValidationMessage::new(format!("{}.responses", label), "is required")),
        }
    }
}

fn validate_parameter(label: &str, parameter: &Value, messages: &mut Vec<ValidationMessage>) {
    if parameter.get("$ref").is_some() {
        return;
    }
    if !parameter.get("name").map_or(false, Value::is_string) {
        messages.push(ValidationMessage::new(format!("{}.name", label), "is required"));
    }
    match parameter
        .get("in")
        .and_then(Value::as_str)
        .and_then(ParameterLocation::parse)
    {
        Some(ParameterLocation::Body) => {
            if parameter.get("schema").is_none() {
                messages.push(ValidationMessage::new(format!("{}.schema", label), "is required"));
            }
        }
        Some(_) => {
            if parameter.get("type").is_none() {
                messages.push(ValidationMessage::new(format!("{}.type", label), "is required"));
            }
        }
        None => messages.push(ValidationMessage::new(
            format!("{}.in", label),
            "must be one of path, query, header, body, formData",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn labels(document: Value) -> Vec<String> {
        StructuralValidator
            .validate(&document)
            .into_iter()
            .map(|message| message.label)
            .collect()
    }

    #[test]
    fn test_minimal_document_is_valid() {
        let document = json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1.0" },
            "paths": {}
        });
        assert!(StructuralValidator.validate(&document).is_empty());
    }

    #[test]
    fn test_missing_root_members() {
        assert_eq!(
            labels(json!({ "swagger": "3.0", "info": { "title": "Pets" } })),
            vec!["swagger", "info.version", "paths"]
        );
    }

    #[test]
    fn test_operation_findings() {
        let document = json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1.0" },
            "paths": {
                "pets": {
                    "get": {
                        "parameters": [
                            { "name": "id", "in": "path" },
                            { "name": "pet", "in": "body" },
                            { "in": "cookie", "type": "string" },
                            { "$ref": "#/parameters/limit" }
                        ],
                        "responses": { "200": {}, "x-note": "ignored" }
                    },
                    "delete": { "responses": {} }
                },
                "x-paths": true
            }
        });

        assert_eq!(
            labels(document),
            vec![
                "paths.pets",
                "paths.pets.get.parameters[0].type",
                "paths.pets.get.parameters[1].schema",
                "paths.pets.get.parameters[2].name",
                "paths.pets.get.parameters[2].in",
                "paths.pets.get.responses.200.description",
                "paths.pets.delete.responses",
            ]
        );
    }
}
