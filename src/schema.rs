//! Model-side schema tree.
//!
//! A [`SchemaNode`] is what the model stores for every property, parameter
//! bucket and definition. Its model-side JSON shape is produced by
//! [`SchemaNode::to_model`] and read back by [`SchemaNode::from_model`]; the
//! Swagger side lives in [`crate::type_mapper`].

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::activation::Activation;
use crate::extensions::Extension;

/// Parameter-group subtype of request buckets and response headers.
pub const SUBTYPE_NO_FILE: &str = "parameter_noFile";
/// Parameter-group subtype of response bodies.
pub const SUBTYPE_FILE: &str = "parameter_file";

/// Constraint keywords of primitive nodes as (model name, Swagger name).
pub const PRIMITIVE_KEYWORDS: &[(&str, &str)] = &[
    ("exclusiveMinimum", "exclusiveMinimum"),
    ("exclusiveMaximum", "exclusiveMaximum"),
    ("minimum", "minimum"),
    ("maximum", "maximum"),
    ("enum", "enum"),
    ("pattern", "pattern"),
    ("default", "default"),
    ("minLength", "minLength"),
    ("maxLength", "maxLength"),
    ("multipleOf", "multipleOf"),
    ("sample", "example"),
];

pub const ARRAY_KEYWORDS: &[(&str, &str)] = &[
    ("collectionFormat", "collectionFormat"),
    ("minItems", "minItems"),
    ("maxItems", "maxItems"),
    ("uniqueItems", "uniqueItems"),
    ("discriminator", "discriminator"),
    ("readOnly", "readOnly"),
    ("sample", "example"),
];

pub const OBJECT_KEYWORDS: &[(&str, &str)] = &[
    ("minProperties", "minProperties"),
    ("maxProperties", "maxProperties"),
    ("discriminator", "discriminator"),
    ("readOnly", "readOnly"),
    ("sample", "example"),
];

/// Which definition pool a reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    /// `#/...`: definitions of the owning container.
    Internal,
    /// `#model/...`: definitions shared by the whole model.
    ModelLevel,
    /// Anything else: another document.
    External,
}

impl OriginKind {
    pub fn classify(path: &str) -> Self {
        if path.to_ascii_lowercase().starts_with("#model") {
            Self::ModelLevel
        } else if path.starts_with('#') {
            Self::Internal
        } else {
            Self::External
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub target_path: String,
    pub origin: OriginKind,
}

impl Reference {
    pub fn new(target_path: impl Into<String>) -> Self {
        let target_path = target_path.into();
        let origin = OriginKind::classify(&target_path);
        Self {
            target_path,
            origin,
        }
    }

    /// Last path segment, the key definitions are looked up by.
    pub fn definition_name(&self) -> &str {
        self.target_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.target_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Primitive {
        type_name: String,
        format: Option<String>,
        mode: Option<String>,
    },
    Object {
        properties: IndexMap<String, SchemaNode>,
        required: Vec<String>,
        additional_properties: Option<Value>,
    },
    Array {
        items: Option<Box<SchemaNode>>,
    },
    Reference(Reference),
    AllOf(Vec<SchemaNode>),
    /// Top-level bucket of a request (path, query, header, body, formData)
    /// or of a response (headers, body).
    ParameterGroup {
        properties: IndexMap<String, SchemaNode>,
        required: Vec<String>,
        subtype: Option<String>,
    },
}

/// XML hints as the model stores them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XmlHints {
    #[serde(rename = "xmlName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "xmlNamespace", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "xmlPrefix", default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(rename = "xmlAttribute", default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<bool>,
    #[serde(rename = "xmlWrapped", default, skip_serializing_if = "Option::is_none")]
    pub wrapped: Option<bool>,
    #[serde(rename = "scopesExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

/// One schema fragment of the model.
///
/// `keywords` holds the constraint keywords of the node keyed by their
/// Swagger name, in the order of the keyword table of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
    pub keywords: IndexMap<String, Value>,
    pub xml: Option<XmlHints>,
    pub extensions: Vec<Extension>,
    pub activation: Activation,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
            keywords: IndexMap::new(),
            xml: None,
            extensions: Vec::new(),
            activation: Activation::Active,
        }
    }

    pub fn primitive(type_name: impl Into<String>) -> Self {
        Self::new(SchemaKind::Primitive {
            type_name: type_name.into(),
            format: None,
            mode: None,
        })
    }

    pub fn object(properties: IndexMap<String, SchemaNode>) -> Self {
        Self::new(SchemaKind::Object {
            properties,
            required: Vec::new(),
            additional_properties: None,
        })
    }

    pub fn array(items: Option<SchemaNode>) -> Self {
        Self::new(SchemaKind::Array {
            items: items.map(Box::new),
        })
    }

    pub fn reference(target_path: impl Into<String>) -> Self {
        Self::new(SchemaKind::Reference(Reference::new(target_path)))
    }

    pub fn parameter_group(properties: IndexMap<String, SchemaNode>, subtype: &str) -> Self {
        Self::new(SchemaKind::ParameterGroup {
            properties,
            required: Vec::new(),
            subtype: Some(subtype.to_string()),
        })
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Named children of object and parameter-group nodes.
    pub fn properties(&self) -> Option<&IndexMap<String, SchemaNode>> {
        match &self.kind {
            SchemaKind::Object { properties, .. } | SchemaKind::ParameterGroup { properties, .. } => {
                Some(properties)
            }
            _ => None,
        }
    }

    pub fn required(&self) -> &[String] {
        match &self.kind {
            SchemaKind::Object { required, .. } | SchemaKind::ParameterGroup { required, .. } => {
                required
            }
            _ => &[],
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match &self.kind {
            SchemaKind::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Sort object properties by name, recursively.
    pub fn sort_properties(&mut self) {
        match &mut self.kind {
            SchemaKind::Object { properties, .. } | SchemaKind::ParameterGroup { properties, .. } => {
                properties.sort_keys();
                properties.values_mut().for_each(SchemaNode::sort_properties);
            }
            SchemaKind::Array { items: Some(items) } => items.sort_properties(),
            SchemaKind::AllOf(branches) => branches.iter_mut().for_each(SchemaNode::sort_properties),
            _ => {}
        }
    }

    /// Read a node from its model-side JSON shape.
    ///
    /// Anything that is not a JSON object degrades to a plain string node.
    pub fn from_model(value: &Value) -> Self {
        let map = match value {
            Value::Object(map) => map,
            _ => return Self::primitive("string"),
        };

        let kind = if let Some(target) = map.get("$ref").and_then(Value::as_str) {
            SchemaKind::Reference(Reference::new(target))
        } else if let Some(Value::Array(branches)) = map.get("allOf") {
            SchemaKind::AllOf(branches.iter().map(Self::from_model).collect())
        } else {
            match declared_type(map).as_deref() {
                Some("object") => SchemaKind::Object {
                    properties: model_properties(map),
                    required: string_list(map.get("required")),
                    additional_properties: map.get("additionalProperties").cloned(),
                },
                Some("array") => SchemaKind::Array {
                    items: first_item(map.get("items")).map(|items| Box::new(Self::from_model(items))),
                },
                Some("parameter") => SchemaKind::ParameterGroup {
                    properties: model_properties(map),
                    required: string_list(map.get("required")),
                    subtype: string_field(map, "subtype"),
                },
                Some(type_name) => SchemaKind::Primitive {
                    type_name: type_name.to_string(),
                    format: string_field(map, "format"),
                    mode: string_field(map, "mode"),
                },
                None => SchemaKind::Primitive {
                    type_name: "string".to_string(),
                    format: string_field(map, "format"),
                    mode: string_field(map, "mode"),
                },
            }
        };

        let keywords = keyword_table(&kind)
            .iter()
            .filter_map(|(model_name, swagger_name)| {
                map.get(*model_name)
                    .filter(|value| !value.is_null())
                    .map(|value| (swagger_name.to_string(), value.clone()))
            })
            .collect();

        Self {
            kind,
            description: string_field(map, "description"),
            keywords,
            xml: map.get("xml").and_then(|xml| read_or_warn(xml, "xml")),
            extensions: map
                .get("scopesExtensions")
                .and_then(|list| read_or_warn(list, "scopesExtensions"))
                .unwrap_or_default(),
            activation: Activation::from_flag(map.get("isActivated").and_then(Value::as_bool)),
        }
    }

    /// Model-side JSON shape of the node. `isActivated` is always written.
    pub fn to_model(&self) -> Value {
        let mut map = Map::new();

        match &self.kind {
            SchemaKind::Primitive {
                type_name,
                format,
                mode,
            } => {
                map.insert("type".into(), Value::String(type_name.clone()));
                insert_string(&mut map, "format", format);
                insert_string(&mut map, "mode", mode);
            }
            SchemaKind::Object {
                properties,
                required,
                additional_properties,
            } => {
                map.insert("type".into(), Value::String("object".into()));
                map.insert("properties".into(), properties_to_model(properties));
                if !required.is_empty() {
                    map.insert("required".into(), string_values(required));
                }
                if let Some(additional) = additional_properties {
                    map.insert("additionalProperties".into(), additional.clone());
                }
            }
            SchemaKind::Array { items } => {
                map.insert("type".into(), Value::String("array".into()));
                if let Some(items) = items {
                    map.insert("items".into(), items.to_model());
                }
            }
            SchemaKind::Reference(reference) => {
                map.insert("$ref".into(), Value::String(reference.target_path.clone()));
            }
            SchemaKind::AllOf(branches) => {
                map.insert(
                    "allOf".into(),
                    Value::Array(branches.iter().map(Self::to_model).collect()),
                );
            }
            SchemaKind::ParameterGroup {
                properties,
                required,
                subtype,
            } => {
                map.insert("type".into(), Value::String("parameter".into()));
                insert_string(&mut map, "subtype", subtype);
                map.insert("properties".into(), properties_to_model(properties));
                if !required.is_empty() {
                    map.insert("required".into(), string_values(required));
                }
            }
        }

        insert_string(&mut map, "description", &self.description);
        let table = keyword_table(&self.kind);
        for (swagger_name, value) in &self.keywords {
            let model_name = table
                .iter()
                .find(|(_, name)| name == swagger_name)
                .map(|(model_name, _)| *model_name)
                .unwrap_or(swagger_name.as_str());
            map.insert(model_name.to_string(), value.clone());
        }
        if let Some(xml) = &self.xml {
            if let Ok(value) = serde_json::to_value(xml) {
                map.insert("xml".into(), value);
            }
        }
        if !self.extensions.is_empty() {
            map.insert(
                "scopesExtensions".into(),
                Value::Array(self.extensions.iter().map(extension_to_model).collect()),
            );
        }
        map.insert("isActivated".into(), Value::Bool(self.activation.as_flag()));

        Value::Object(map)
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_model().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Self::from_model(&value))
    }
}

/// Keyword table of a node kind; kinds without constraint keywords get an empty table.
pub fn keyword_table(kind: &SchemaKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        SchemaKind::Primitive { .. } => PRIMITIVE_KEYWORDS,
        SchemaKind::Array { .. } => ARRAY_KEYWORDS,
        SchemaKind::Object { .. } => OBJECT_KEYWORDS,
        _ => &[],
    }
}

/// `type` of a node; a list keeps only its first entry. A missing type is
/// inferred from `properties` or `items`.
pub fn declared_type(map: &Map<String, Value>) -> Option<String> {
    let declared = match map.get("type") {
        Some(Value::String(type_name)) => Some(type_name.clone()),
        Some(Value::Array(types)) => types.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    declared.or_else(|| {
        if map.contains_key("properties") {
            Some("object".to_string())
        } else if map.contains_key("items") {
            Some("array".to_string())
        } else {
            None
        }
    })
}

/// Single item schema; a list of item schemas keeps only its first entry.
pub fn first_item(items: Option<&Value>) -> Option<&Value> {
    match items? {
        Value::Array(list) => list.first(),
        Value::Null => None,
        other => Some(other),
    }
}

fn model_properties(map: &Map<String, Value>) -> IndexMap<String, SchemaNode> {
    match map.get("properties") {
        Some(Value::Object(properties)) => properties
            .iter()
            .map(|(name, child)| (name.clone(), SchemaNode::from_model(child)))
            .collect(),
        _ => IndexMap::new(),
    }
}

fn properties_to_model(properties: &IndexMap<String, SchemaNode>) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|(name, child)| (name.clone(), child.to_model()))
            .collect(),
    )
}

fn extension_to_model(extension: &Extension) -> Value {
    let mut map = Map::new();
    map.insert("extensionPattern".into(), Value::String(extension.key.clone()));
    map.insert("extensionValue".into(), extension.value.clone());
    Value::Object(map)
}

fn read_or_warn<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring malformed {} on schema node: {}", field, e);
            None
        }
    }
}

pub(crate) fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn string_values(list: &[String]) -> Value {
    Value::Array(list.iter().cloned().map(Value::String).collect())
}

fn insert_string(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_origin_kind_classification() {
        assert_eq!(OriginKind::classify("#model/definitions/Pet"), OriginKind::ModelLevel);
        assert_eq!(OriginKind::classify("#MODEL/definitions/Pet"), OriginKind::ModelLevel);
        assert_eq!(OriginKind::classify("#/definitions/Pet"), OriginKind::Internal);
        assert_eq!(OriginKind::classify("#/paths/a/get"), OriginKind::Internal);
        assert_eq!(OriginKind::classify("pets.json#/definitions/Pet"), OriginKind::External);
    }

    #[test]
    fn test_definition_name() {
        assert_eq!(Reference::new("#/definitions/Pet").definition_name(), "Pet");
        assert_eq!(Reference::new("Pet").definition_name(), "Pet");
    }

    #[test]
    fn test_model_shape_round_trip() {
        let model = json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Pet name",
                    "minLength": 1,
                    "sample": "Rex",
                    "isActivated": true
                },
                "tags": {
                    "type": "array",
                    "items": { "$ref": "#model/definitions/Tag", "isActivated": true },
                    "uniqueItems": true,
                    "isActivated": false
                },
                "owner": {
                    "allOf": [
                        { "$ref": "#/definitions/Person", "isActivated": true },
                        { "type": "number", "mode": "int", "isActivated": true }
                    ],
                    "isActivated": true
                }
            },
            "required": ["name"],
            "xml": { "xmlName": "pet", "xmlWrapped": true },
            "scopesExtensions": [{ "extensionPattern": "x-kind", "extensionValue": "pet" }],
            "isActivated": true
        });

        let node = SchemaNode::from_model(&model);
        assert_eq!(node.required(), &["name".to_string()]);
        let properties = node.properties().unwrap();
        assert_eq!(properties["tags"].activation, Activation::Inactive);
        assert_eq!(properties["name"].keywords["example"], json!("Rex"));
        assert_eq!(node.xml.as_ref().unwrap().name.as_deref(), Some("pet"));

        assert_eq!(SchemaNode::from_model(&node.to_model()), node);
        assert_eq!(node.to_model()["properties"]["name"]["sample"], json!("Rex"));
    }

    #[test]
    fn test_type_list_keeps_first_entry() {
        let node = SchemaNode::from_model(&json!({ "type": ["integer", "null"] }));
        assert!(matches!(
            node.kind,
            SchemaKind::Primitive { ref type_name, .. } if type_name == "integer"
        ));
    }

    #[test]
    fn test_missing_type_is_inferred() {
        let node = SchemaNode::from_model(&json!({ "properties": { "a": { "type": "string" } } }));
        assert!(matches!(node.kind, SchemaKind::Object { .. }));

        let node = SchemaNode::from_model(&json!({ "items": [{ "type": "string" }, { "type": "integer" }] }));
        match node.kind {
            SchemaKind::Array { items: Some(items) } => {
                assert_eq!(*items, SchemaNode::primitive("string"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_non_object_degrades_to_string() {
        assert_eq!(SchemaNode::from_model(&json!(42)), SchemaNode::primitive("string"));
        assert_eq!(SchemaNode::from_model(&json!({ "type": 7 })), SchemaNode::primitive("string"));
    }

    #[test]
    fn test_sort_properties() {
        let mut node = SchemaNode::from_model(&json!({
            "type": "object",
            "properties": {
                "b": { "type": "object", "properties": { "z": {}, "y": {} } },
                "a": { "type": "string" }
            }
        }));
        node.sort_properties();
        let properties = node.properties().unwrap();
        assert_eq!(properties.keys().collect::<Vec<_>>(), ["a", "b"]);
        let nested = properties["b"].properties().unwrap();
        assert_eq!(nested.keys().collect::<Vec<_>>(), ["y", "z"]);
    }
}
