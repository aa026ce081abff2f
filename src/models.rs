#![allow(non_snake_case)]

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::activation::{ActiveList, ActiveMap};

/// Textual representation of a Swagger document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DocumentFormat {
    Json,
    #[default]
    Yaml,
}

impl DocumentFormat {
    /// Anything that is not `.json` is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Represents a complete Swagger 2.0 document
#[derive(Debug, Serialize, Clone, Default)]
pub struct Swagger {
    pub swagger: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basePath: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    pub paths: ActiveMap<PathItem>,
    #[serde(skip_serializing_if = "ActiveMap::is_empty")]
    pub definitions: ActiveMap<Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub securityDefinitions: IndexMap<String, SecurityScheme>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<IndexMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub externalDocs: Option<ExternalDocs>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Information about the API
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termsOfService: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Contact information for the API
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// License information for the API
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct License {
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// External documentation for the API
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ExternalDocs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Tag information for API operations
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Tag {
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub externalDocs: Option<ExternalDocs>,
}

/// Security scheme (`basic`, `apiKey` or `oauth2`)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SecurityScheme {
    #[serde(rename = "type", default)]
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub in_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizationUrl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenUrl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<IndexMap<String, String>>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// XML representation hints of a schema
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Xml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapped: Option<bool>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// A single path item; operations are keyed by lower-case method name
#[derive(Debug, Serialize, Clone, Default)]
pub struct PathItem {
    #[serde(flatten)]
    pub operations: ActiveMap<Operation>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// An operation (endpoint) of the API
#[derive(Debug, Serialize, Clone, Default)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub externalDocs: Option<ExternalDocs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operationId: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(skip_serializing_if = "ActiveList::is_empty")]
    pub parameters: ActiveList<Parameter>,
    pub responses: ActiveMap<Response>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<IndexMap<String, Vec<String>>>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Operation parameter.
///
/// Body parameters carry `schema`; every other location carries its type
/// fields (`type`, `format`, `items`, constraints) directly in `fields`.
#[derive(Debug, Serialize, Clone, Default)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub in_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A response of an operation
#[derive(Debug, Serialize, Clone, Default)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "ActiveMap::is_empty")]
    pub headers: ActiveMap<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub examples: IndexMap<String, Value>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("api.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("api.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("api.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("api.txt")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("api")), DocumentFormat::Yaml);
    }

    #[test]
    fn test_operation_serialization_order() {
        let mut responses = ActiveMap::new();
        responses.insert(
            "200",
            Response {
                description: "ok".into(),
                ..Default::default()
            },
            Activation::Active,
        );
        let mut parameters = ActiveList::new();
        parameters.push(
            Parameter {
                name: "id".into(),
                in_type: "path".into(),
                required: Some(true),
                fields: json!({ "type": "string" }).as_object().cloned().unwrap(),
                ..Default::default()
            },
            Activation::Active,
        );
        let mut extensions = IndexMap::new();
        extensions.insert("x-internal".to_string(), json!(true));

        let operation = Operation {
            summary: Some("Get pet".into()),
            parameters,
            responses,
            extensions,
            ..Default::default()
        };

        let text = serde_json::to_string(&operation).unwrap();
        assert_eq!(
            text,
            r#"{"summary":"Get pet","parameters":[{"name":"id","in":"path","required":true,"type":"string"}],"responses":{"200":{"description":"ok"}},"x-internal":true}"#
        );
    }

    #[test]
    fn test_path_item_flattens_operations() {
        let mut operations = ActiveMap::new();
        operations.insert("get", Operation::default(), Activation::Active);
        operations.insert("delete", Operation::default(), Activation::Inactive);
        let item = PathItem {
            operations,
            extensions: IndexMap::new(),
        };

        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "get": { "responses": {} },
                "__inactiveStart_1": true,
                "delete": { "responses": {} },
                "__inactiveEnd_1": true
            })
        );
    }

    #[test]
    fn test_security_scheme_reads_extensions() {
        let scheme: SecurityScheme = serde_json::from_value(json!({
            "type": "apiKey",
            "name": "api_key",
            "in": "header",
            "x-vendor": "a"
        }))
        .unwrap();
        assert_eq!(scheme.scheme_type, "apiKey");
        assert_eq!(scheme.in_type.as_deref(), Some("header"));
        assert_eq!(scheme.extensions["x-vendor"], json!("a"));
    }
}
