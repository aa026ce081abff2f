//! Conversion of single schema nodes between the model and Swagger 2.0.
//!
//! Both directions are position independent: where a node sits in the
//! document is the business of the builder and the parser.

use log::debug;
use serde_json::{json, Map, Value};

use crate::activation::{self, Activation};
use crate::error::ConversionError;
use crate::extensions;
use crate::models::Xml;
use crate::schema::{
    declared_type, first_item, keyword_table, Reference, SchemaKind, SchemaNode, XmlHints,
};

/// Swagger form of a node; `None` when the node has nothing to emit.
pub fn to_target(node: &SchemaNode) -> Option<Value> {
    match &node.kind {
        SchemaKind::Reference(reference) => Some(json!({ "$ref": target_reference(&reference.target_path) })),
        SchemaKind::AllOf(branches) => {
            let mut list = Vec::with_capacity(branches.len());
            for branch in branches {
                let value = to_target(branch).unwrap_or_else(|| Value::Object(Map::new()));
                activation::push_element(&mut list, value, branch.activation);
            }
            Some(json!({ "allOf": list }))
        }
        SchemaKind::ParameterGroup { properties, .. } => properties.values().next().and_then(to_target),
        SchemaKind::Object {
            properties,
            required,
            additional_properties,
        } => {
            if properties.is_empty() && additional_properties.is_none() {
                debug!("Dropping empty object schema");
                return None;
            }

            let mut map = Map::new();
            map.insert("type".into(), Value::String("object".into()));
            insert_description(&mut map, node);
            if !required.is_empty() {
                map.insert("required".into(), json!(required));
            }
            if !properties.is_empty() {
                let mut members = Map::new();
                for (name, child) in properties {
                    if let Some(value) = to_target(child) {
                        activation::insert_member(&mut members, name.clone(), value, child.activation);
                    }
                }
                map.insert("properties".into(), Value::Object(members));
            }
            if let Some(additional) = additional_properties {
                map.insert("additionalProperties".into(), additional.clone());
            }
            finish(map, node)
        }
        SchemaKind::Array { items } => {
            let mut map = Map::new();
            map.insert("type".into(), Value::String("array".into()));
            insert_description(&mut map, node);
            let items = items
                .as_deref()
                .and_then(to_target)
                .unwrap_or_else(|| Value::Object(Map::new()));
            map.insert("items".into(), items);
            finish(map, node)
        }
        SchemaKind::Primitive {
            type_name,
            format,
            mode,
        } => {
            let mut map = Map::new();
            map.insert("type".into(), Value::String(type_name.clone()));
            if let Some(format) = format.as_ref().or(mode.as_ref()) {
                map.insert("format".into(), Value::String(format.clone()));
            }
            insert_description(&mut map, node);
            finish(map, node)
        }
    }
}

/// Model form of a Swagger schema node.
///
/// Fails only when an extension value cannot be stored.
pub fn to_source(value: &Value) -> Result<SchemaNode, ConversionError> {
    let map = match value {
        Value::Object(map) => map,
        _ => return Ok(SchemaNode::primitive("string")),
    };
    let (clean, extensions) = extensions::extract(map)?;

    let kind = if let Some(target) = clean.get("$ref").and_then(Value::as_str) {
        SchemaKind::Reference(Reference::new(target))
    } else if let Some(Value::Array(branches)) = clean.get("allOf") {
        SchemaKind::AllOf(
            activation::elements(branches)
                .into_iter()
                .map(|(branch, activation)| to_source(branch).map(|node| node.with_activation(activation)))
                .collect::<Result<_, _>>()?,
        )
    } else {
        match declared_type(&clean).as_deref() {
            Some("object") => SchemaKind::Object {
                properties: source_properties(&clean)?,
                required: crate::schema::string_list(clean.get("required")),
                additional_properties: clean.get("additionalProperties").cloned(),
            },
            Some("array") => SchemaKind::Array {
                items: first_item(clean.get("items"))
                    .map(to_source)
                    .transpose()?
                    .map(Box::new),
            },
            None => SchemaKind::Object {
                properties: Default::default(),
                required: Vec::new(),
                additional_properties: None,
            },
            Some(type_name) => source_primitive(type_name, &clean),
        }
    };

    let keywords = keyword_table(&kind)
        .iter()
        .filter_map(|(_, swagger_name)| {
            clean
                .get(*swagger_name)
                .map(|value| (swagger_name.to_string(), value.clone()))
        })
        .collect();

    let xml = match clean.get("xml") {
        Some(xml) => Some(source_xml(xml)?),
        None => None,
    };

    Ok(SchemaNode {
        kind,
        description: crate::schema::string_field(&clean, "description"),
        keywords,
        xml,
        extensions,
        activation: Activation::Active,
    })
}

/// `#model/` pointers become document-local; a definition name with spaces
/// is renamed the way the definitions section renames it.
pub fn target_reference(path: &str) -> String {
    if !path.starts_with('#') {
        return path.to_string();
    }
    let local = match path.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("#model/") => format!("#/{}", &path[7..]),
        _ => path.to_string(),
    };
    match local.rsplit_once('/') {
        Some((head, name)) => format!("{}/{}", head, definition_key(name)),
        None => local,
    }
}

/// Key a definition name is emitted under.
pub fn definition_key(name: &str) -> String {
    name.replace(' ', "_")
}

fn insert_description(map: &mut Map<String, Value>, node: &SchemaNode) {
    if let Some(description) = &node.description {
        map.insert("description".into(), Value::String(description.clone()));
    }
}

// Keywords, xml and extensions close every non-reference node.
fn finish(mut map: Map<String, Value>, node: &SchemaNode) -> Option<Value> {
    for (name, value) in &node.keywords {
        map.insert(name.clone(), value.clone());
    }
    if let Some(xml) = &node.xml {
        let xml = Xml {
            name: xml.name.clone(),
            namespace: xml.namespace.clone(),
            prefix: xml.prefix.clone(),
            attribute: xml.attribute,
            wrapped: xml.wrapped,
            extensions: extensions::to_fields(&xml.extensions),
        };
        if let Ok(value) = serde_json::to_value(xml) {
            map.insert("xml".into(), value);
        }
    }
    extensions::inject(&mut map, &node.extensions);
    Some(Value::Object(map))
}

fn source_properties(
    map: &Map<String, Value>,
) -> Result<indexmap::IndexMap<String, SchemaNode>, ConversionError> {
    let properties = match map.get("properties") {
        Some(Value::Object(properties)) => properties,
        _ => return Ok(Default::default()),
    };
    activation::members(properties)
        .into_iter()
        .map(|(name, child, activation)| {
            Ok((name.clone(), to_source(child)?.with_activation(activation)))
        })
        .collect()
}

fn source_primitive(type_name: &str, map: &Map<String, Value>) -> SchemaKind {
    let format = crate::schema::string_field(map, "format");
    let mode = crate::schema::string_field(map, "mode");

    match (type_name, mode.as_deref()) {
        ("null", _) => SchemaKind::Primitive {
            type_name: "string".into(),
            format,
            mode,
        },
        ("number", Some("int")) => SchemaKind::Primitive {
            type_name: "integer".into(),
            format,
            mode: None,
        },
        ("number", Some("decimal")) => SchemaKind::Primitive {
            type_name: "number".into(),
            format,
            mode: Some("double".into()),
        },
        _ => SchemaKind::Primitive {
            type_name: type_name.to_string(),
            format,
            mode,
        },
    }
}

fn source_xml(value: &Value) -> Result<XmlHints, ConversionError> {
    let xml: Xml = serde_json::from_value(value.clone())?;
    Ok(XmlHints {
        name: xml.name,
        namespace: xml.namespace,
        prefix: xml.prefix,
        attribute: xml.attribute,
        wrapped: xml.wrapped,
        extensions: extensions::collect(xml.extensions.iter())?,
    })
}
