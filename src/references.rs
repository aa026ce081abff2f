//! Resolution of `$ref` targets against the model's definition pools.
//!
//! Runs over the model entities before the builder sees them, so every
//! reference that can only be expressed on the model side is either inlined
//! or readdressed by the time the Swagger tree is produced.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::entity::{parse_definitions, Entity, ModelInput, ParameterLocation, RequestEntity};
use crate::error::ConversionError;
use crate::reference_path::{self, AddressScheme};
use crate::schema::{OriginKind, Reference, SchemaKind, SchemaNode};

/// Kind of document an external definition was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExternalFileType {
    /// Another model; its schema is inlined.
    HackoladeSchema,
    /// A plain JSON Schema document.
    JsonSchema,
    /// Another Swagger document.
    TargetSchema,
    #[default]
    #[serde(other)]
    Other,
}

/// A definition imported from another document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDefinition {
    pub link: String,
    /// Pointer inside the linked document, starting with `#/`.
    pub relative_path: String,
    pub file_type: ExternalFileType,
    /// Model-side schema of the definition.
    pub schema: Value,
}

impl ExternalDefinition {
    fn from_record(record: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let file_type = record
            .get("fileType")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        let schema = record
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "link" | "fieldRelativePath" | "fileType" | "$ref"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            link: text("link"),
            relative_path: text("fieldRelativePath"),
            file_type,
            schema: Value::Object(schema),
        }
    }
}

/// The three scopes a reference can resolve against.
#[derive(Debug, Clone, Default)]
pub struct DefinitionPools {
    /// Internal definitions per entity id.
    pub internal: IndexMap<String, IndexMap<String, SchemaNode>>,
    pub model_level: IndexMap<String, SchemaNode>,
    pub external: IndexMap<String, ExternalDefinition>,
}

impl DefinitionPools {
    pub fn from_input(input: &ModelInput) -> Result<Self, ConversionError> {
        let mut internal = IndexMap::new();
        for container in &input.containers {
            for id in container.internal_definitions.keys() {
                internal.insert(id.clone(), container.internal_definitions(id)?);
            }
        }

        Ok(Self {
            internal,
            model_level: parse_definitions(&input.model_definitions)?,
            external: parse_external(&input.external_definitions)?,
        })
    }

    /// Definition a reference names, taken from the pool its origin selects.
    pub fn lookup(&self, reference: &Reference, entity_id: &str) -> Option<SchemaNode> {
        let path = reference.target_path.as_str();
        match reference.origin {
            OriginKind::ModelLevel => {
                let name = strip_prefix_ignore_case(path, "#model/definitions/")?;
                self.model_level.get(name).cloned()
            }
            OriginKind::Internal => {
                let name = path.strip_prefix("#/definitions/")?;
                self.internal.get(entity_id)?.get(name).cloned()
            }
            OriginKind::External => self
                .external
                .get(reference.definition_name())
                .map(|definition| SchemaNode::from_model(&definition.schema)),
        }
    }

    /// External record imported from `link` at `relative_path`.
    pub fn find_external(&self, link: &str, relative_path: &str) -> Option<&ExternalDefinition> {
        self.external
            .values()
            .find(|definition| definition.link == link && definition.relative_path == relative_path)
    }
}

/// Apply every rewrite an entity needs before it is built.
pub fn rewrite_entity(entity: &Entity, pools: &DefinitionPools) -> Entity {
    match entity {
        Entity::Request(request) => {
            let mut request = inline_parameter_references(request, pools);
            rewrite_buckets(&mut request.properties, pools);
            Entity::Request(request)
        }
        Entity::Response(response) => {
            let mut response = response.clone();
            rewrite_buckets(&mut response.properties, pools);
            Entity::Response(response)
        }
    }
}

/// Replace references inside non-body parameter buckets by the definitions
/// they name; Swagger only allows `$ref` under a body schema.
pub fn inline_parameter_references(request: &RequestEntity, pools: &DefinitionPools) -> RequestEntity {
    let mut request = request.clone();
    let body = ParameterLocation::Body.as_str();

    for (bucket_name, bucket) in request.properties.iter_mut() {
        if bucket_name == body {
            continue;
        }
        let properties = match &mut bucket.kind {
            SchemaKind::ParameterGroup { properties, .. } | SchemaKind::Object { properties, .. } => properties,
            _ => continue,
        };
        for (name, property) in properties.iter_mut() {
            let Some(reference) = property.as_reference() else {
                continue;
            };
            match pools.lookup(reference, &request.id) {
                Some(definition) => {
                    debug!("Inlining {} into {} parameter {}", reference.target_path, bucket_name, name);
                    *property = SchemaNode {
                        description: property.description.take().or(definition.description.clone()),
                        activation: property.activation,
                        ..definition
                    };
                }
                None => warn!("Parameter {} references unknown definition {}", name, reference.target_path),
            }
        }
    }

    request
}

/// Rewrite external references of a tree, depth first.
pub fn rewrite_external(node: &SchemaNode, pools: &DefinitionPools) -> SchemaNode {
    rewrite_node(node, pools, &mut Vec::new())
}

fn rewrite_buckets(buckets: &mut IndexMap<String, SchemaNode>, pools: &DefinitionPools) {
    for bucket in buckets.values_mut() {
        *bucket = rewrite_external(bucket, pools);
    }
}

fn rewrite_node(node: &SchemaNode, pools: &DefinitionPools, visiting: &mut Vec<String>) -> SchemaNode {
    let kind = match &node.kind {
        SchemaKind::Reference(reference) if reference.origin == OriginKind::External => {
            return rewrite_reference(node, reference, pools, visiting);
        }
        SchemaKind::Object {
            properties,
            required,
            additional_properties,
        } => SchemaKind::Object {
            properties: rewrite_properties(properties, pools, visiting),
            required: required.clone(),
            additional_properties: additional_properties.clone(),
        },
        SchemaKind::ParameterGroup {
            properties,
            required,
            subtype,
        } => SchemaKind::ParameterGroup {
            properties: rewrite_properties(properties, pools, visiting),
            required: required.clone(),
            subtype: subtype.clone(),
        },
        SchemaKind::Array { items } => SchemaKind::Array {
            items: items
                .as_deref()
                .map(|items| Box::new(rewrite_node(items, pools, visiting))),
        },
        SchemaKind::AllOf(branches) => SchemaKind::AllOf(
            branches
                .iter()
                .map(|branch| rewrite_node(branch, pools, visiting))
                .collect(),
        ),
        other => other.clone(),
    };

    SchemaNode {
        kind,
        ..node.clone()
    }
}

fn rewrite_properties(
    properties: &IndexMap<String, SchemaNode>,
    pools: &DefinitionPools,
    visiting: &mut Vec<String>,
) -> IndexMap<String, SchemaNode> {
    properties
        .iter()
        .map(|(name, child)| (name.clone(), rewrite_node(child, pools, visiting)))
        .collect()
}

fn rewrite_reference(
    node: &SchemaNode,
    reference: &Reference,
    pools: &DefinitionPools,
    visiting: &mut Vec<String>,
) -> SchemaNode {
    let Some((locator, relative)) = reference.target_path.split_once("#/") else {
        return node.clone();
    };
    let link = normalize_locator(locator);
    let relative_path = format!("#/{}", relative);
    let Some(definition) = pools.find_external(&link, &relative_path) else {
        debug!("No external definition for {}", reference.target_path);
        return node.clone();
    };

    let target = match definition.file_type {
        ExternalFileType::HackoladeSchema => {
            let key = format!("{}{}", link, relative_path);
            if visiting.contains(&key) {
                warn!("Circular external reference {} left as pointer", reference.target_path);
                return node.clone();
            }
            visiting.push(key);
            let inlined = rewrite_node(&SchemaNode::from_model(&definition.schema), pools, visiting);
            visiting.pop();
            return SchemaNode {
                activation: node.activation,
                ..inlined
            };
        }
        ExternalFileType::JsonSchema => {
            format!("{}#/{}", locator, reference_path::json_schema_pointer(relative))
        }
        ExternalFileType::TargetSchema => reference_path::resolve(
            &reference.target_path,
            OriginKind::External,
            AddressScheme::Swagger,
        ),
        ExternalFileType::Other => return node.clone(),
    };

    SchemaNode {
        kind: SchemaKind::Reference(Reference::new(target)),
        ..node.clone()
    }
}

// `file://` locators are matched by their plain path.
fn normalize_locator(locator: &str) -> String {
    match Url::parse(locator) {
        Ok(url) if url.scheme() == "file" => {
            format!("{}{}", url.host_str().unwrap_or_default(), url.path())
        }
        _ => locator.to_string(),
    }
}

fn parse_external(text: &str) -> Result<IndexMap<String, ExternalDefinition>, ConversionError> {
    if text.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    let value: Value = serde_json::from_str(text)?;
    let records = value
        .get("properties")
        .and_then(Value::as_object)
        .or_else(|| value.as_object());

    Ok(records
        .map(|records| {
            records
                .iter()
                .filter_map(|(name, record)| {
                    record
                        .as_object()
                        .map(|record| (name.clone(), ExternalDefinition::from_record(record)))
                })
                .collect()
        })
        .unwrap_or_default())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}
