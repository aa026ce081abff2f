//! Model-side records: entities, containers and model metadata.
//!
//! Field names follow the model's storage format through serde renames so
//! the same types are read by the forward pass and written by the reverse one.

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activation::Activation;
use crate::error::ConversionError;
use crate::extensions::Extension;
use crate::schema::SchemaNode;

/// Parameter locations in the order operations list them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

impl ParameterLocation {
    pub const ALL: [ParameterLocation; 5] = [
        ParameterLocation::Path,
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Body,
        ParameterLocation::FormData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
            Self::FormData => "formData",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|location| location.as_str() == value)
    }
}

/// Methods a path item may carry, in emission order.
pub const OPERATION_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

fn object_type() -> String {
    "object".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "lowercase")]
pub enum Entity {
    Request(RequestEntity),
    Response(ResponseEntity),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Self::Request(request) => &request.id,
            Self::Response(response) => &response.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Request(request) => &request.method,
            Self::Response(response) => &response.code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagRef {
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsumesRef {
    #[serde(rename = "consumesMimeTypeDef", default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProducesRef {
    #[serde(rename = "producesMimeTypeDef", default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalDocsRecord {
    #[serde(rename = "externalDocsDescription", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "externalDocsUrl", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "scopesExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecurityRequirementRecord {
    #[serde(rename = "securityRequirementName", default)]
    pub name: Option<String>,
    #[serde(rename = "securityRequirementOperation", default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExampleRecord {
    #[serde(rename = "examplesMimeType", default)]
    pub mime_type: String,
    /// Example body as JSON text.
    #[serde(rename = "examplesValue", default)]
    pub value: String,
}

/// An operation of a container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestEntity {
    #[serde(rename = "GUID", default)]
    pub id: String,
    #[serde(rename = "type", default = "object_type")]
    pub node_type: String,
    /// Lower-case HTTP method.
    #[serde(rename = "collectionName", default)]
    pub method: String,
    #[serde(rename = "isActivated", default)]
    pub activation: Activation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "externalDocs", default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocsRecord>,
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<ConsumesRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<ProducesRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirementRecord>,
    #[serde(rename = "operationExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
    /// Parameter buckets keyed by location name.
    #[serde(default)]
    pub properties: IndexMap<String, SchemaNode>,
}

impl RequestEntity {
    /// Request with the id the reverse pass derives from its position.
    pub fn new(container: &str, method: &str) -> Self {
        Self {
            id: format!("{}/{}", container, method),
            node_type: object_type(),
            method: method.to_string(),
            ..Default::default()
        }
    }

    pub fn bucket(&self, location: ParameterLocation) -> Option<&SchemaNode> {
        self.properties.get(location.as_str())
    }
}

/// A response of a request, linked to it by `parent_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseEntity {
    #[serde(rename = "GUID", default)]
    pub id: String,
    #[serde(rename = "type", default = "object_type")]
    pub node_type: String,
    /// Status code, or `default`.
    #[serde(rename = "collectionName", default)]
    pub code: String,
    #[serde(rename = "parentCollection", default)]
    pub parent_id: String,
    #[serde(rename = "isActivated", default)]
    pub activation: Activation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ExampleRecord>,
    #[serde(rename = "operationExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
    /// `headers` and `body` parameter groups.
    #[serde(default)]
    pub properties: IndexMap<String, SchemaNode>,
}

impl ResponseEntity {
    pub fn new(request_id: &str, code: &str) -> Self {
        Self {
            id: format!("{}/{}", request_id, code),
            node_type: object_type(),
            code: code.to_string(),
            parent_id: request_id.to_string(),
            ..Default::default()
        }
    }

    pub fn headers(&self) -> Option<&SchemaNode> {
        self.properties.get("headers")
    }

    pub fn body(&self) -> Option<&SchemaNode> {
        self.properties.get("body")
    }
}

/// Per-container metadata; the first entry names the Swagger path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerData {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "isActivated", default)]
    pub activation: Activation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

/// One container of the forward input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelContainer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<String>,
    /// Serialized entity per entity id.
    #[serde(rename = "jsonSchema", default)]
    pub json_schema: IndexMap<String, String>,
    /// Serialized sample data per entity id.
    #[serde(rename = "jsonData", default)]
    pub json_data: IndexMap<String, String>,
    #[serde(rename = "containerData", default)]
    pub container_data: Vec<ContainerData>,
    /// Serialized definition set per entity id.
    #[serde(rename = "internalDefinitions", default)]
    pub internal_definitions: IndexMap<String, String>,
}

impl ModelContainer {
    /// Swagger path of the container.
    pub fn path_name(&self) -> &str {
        self.container_data
            .first()
            .map(|data| data.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn activation(&self) -> Activation {
        self.container_data
            .first()
            .map(|data| data.activation)
            .unwrap_or_default()
    }

    pub fn extensions(&self) -> &[Extension] {
        self.container_data
            .first()
            .map(|data| data.extensions.as_slice())
            .unwrap_or(&[])
    }

    /// Entities in declaration order. Ids without a stored schema are skipped.
    pub fn entities(&self) -> Result<Vec<Entity>, ConversionError> {
        let mut entities = Vec::with_capacity(self.entities.len());
        for id in &self.entities {
            let Some(text) = self.json_schema.get(id) else {
                warn!("Container {} lists entity {} without a schema", self.path_name(), id);
                continue;
            };
            let mut entity: Entity = serde_json::from_str(text).map_err(|e| {
                ConversionError::conversion(format!("entity {} of {}: {}", id, self.path_name(), e))
            })?;
            match &mut entity {
                Entity::Request(request) if request.id.is_empty() => request.id = id.clone(),
                Entity::Response(response) if response.id.is_empty() => response.id = id.clone(),
                _ => {}
            }
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Non-empty `body` of the sample data stored for an entity.
    pub fn sample_body(&self, id: &str) -> Option<Value> {
        let data: Value = serde_json::from_str(self.json_data.get(id)?).ok()?;
        match data.get("body")? {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            body => Some(body.clone()),
        }
    }

    pub fn internal_definitions(&self, id: &str) -> Result<IndexMap<String, SchemaNode>, ConversionError> {
        match self.internal_definitions.get(id) {
            Some(text) => parse_definitions(text),
            None => Ok(IndexMap::new()),
        }
    }
}

/// Read a serialized definition set.
///
/// Both the `{ "properties": ... }` shape the model stores and the
/// `{ "definitions": ... }` shape the reverse pass writes are accepted.
pub fn parse_definitions(text: &str) -> Result<IndexMap<String, SchemaNode>, ConversionError> {
    if text.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    let value: Value = serde_json::from_str(text)?;
    let members = value
        .get("properties")
        .or_else(|| value.get("definitions"))
        .and_then(Value::as_object);

    Ok(members
        .map(|members| {
            members
                .iter()
                .map(|(name, node)| (name.clone(), SchemaNode::from_model(node)))
                .collect()
        })
        .unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(rename = "contactName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "contactURL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "contactemail", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "contactExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LicenseRecord {
    #[serde(rename = "licenseName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "licenseURL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "licenseExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagExternalDocsRecord {
    #[serde(rename = "tagExternalDocsDescription", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "tagExternalDocsUrl", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(rename = "tagName", default)]
    pub name: String,
    #[serde(rename = "tagDescription", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "externalDocs", default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<TagExternalDocsRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopeRecord {
    #[serde(rename = "securitySchemeScopesName", default)]
    pub name: String,
    #[serde(rename = "securitySchemeScopesDescription", default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecurityDefinitionRecord {
    #[serde(rename = "securityDefinitionsName", default)]
    pub name: String,
    #[serde(rename = "securitySchemeType", default)]
    pub scheme_type: String,
    #[serde(rename = "securitySchemeDescription", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "securitySchemeName", default, skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    #[serde(rename = "securitySchemeIn", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "securitySchemeFlow", default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(rename = "securitySchemeAuthorizationUrl", default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(rename = "securitySchemeTokenUrl", default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(rename = "securitySchemeScopes", default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<ScopeRecord>,
    #[serde(rename = "scopesExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

/// Document-level metadata of the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelData {
    #[serde(rename = "modelName", default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(rename = "dbVersion", default, skip_serializing_if = "Option::is_none")]
    pub db_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "termsOfService", default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(rename = "modelVersion", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseRecord>,
    #[serde(rename = "infoExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub info_extensions: Vec<Extension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "basePath", default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<ConsumesRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<ProducesRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirementRecord>,
    #[serde(rename = "securityDefinitions", default, skip_serializing_if = "Vec::is_empty")]
    pub security_definitions: Vec<SecurityDefinitionRecord>,
    #[serde(rename = "externalDocs", default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocsRecord>,
    #[serde(rename = "scopesExtensions", default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

/// Forward input: the whole model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelInput {
    #[serde(default)]
    pub containers: Vec<ModelContainer>,
    /// Serialized model-level definition set.
    #[serde(rename = "modelDefinitions", default)]
    pub model_definitions: String,
    /// Serialized external definition records.
    #[serde(rename = "externalDefinitions", default)]
    pub external_definitions: String,
    #[serde(rename = "modelData", default)]
    pub model_data: ModelData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectNames {
    #[serde(rename = "collectionName")]
    pub collection_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageDoc {
    #[serde(rename = "dbName")]
    pub db_name: String,
    #[serde(rename = "collectionName")]
    pub collection_name: String,
    #[serde(rename = "modelDefinitions")]
    pub model_definitions: String,
    #[serde(rename = "bucketInfo")]
    pub bucket_info: ContainerData,
}

/// Reverse output record of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPackage {
    #[serde(rename = "objectNames")]
    pub object_names: ObjectNames,
    pub doc: PackageDoc,
    #[serde(rename = "jsonSchema")]
    pub json_schema: Entity,
}

/// Everything the reverse pass produces for one document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReverseOutput {
    pub packages: Vec<EntityPackage>,
    #[serde(rename = "modelData")]
    pub model_data: ModelData,
}

impl ReverseOutput {
    /// Regroup the packages into forward input, one container per `dbName`.
    pub fn into_model_input(self) -> Result<ModelInput, ConversionError> {
        let model_definitions = self
            .packages
            .first()
            .map(|package| package.doc.model_definitions.clone())
            .unwrap_or_default();
        let mut containers: IndexMap<String, ModelContainer> = IndexMap::new();

        for package in self.packages {
            let container = containers
                .entry(package.doc.db_name.clone())
                .or_insert_with(|| ModelContainer {
                    name: package.doc.db_name.clone(),
                    container_data: vec![package.doc.bucket_info.clone()],
                    ..Default::default()
                });
            let id = package.json_schema.id().to_string();
            container.entities.push(id.clone());
            container
                .json_schema
                .insert(id, serde_json::to_string(&package.json_schema)?);
        }

        Ok(ModelInput {
            containers: containers.into_values().collect(),
            model_definitions,
            external_definitions: String::new(),
            model_data: self.model_data,
        })
    }
}
