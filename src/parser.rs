use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::{fs, path::Path};

use crate::activation;
use crate::entity::{
    ConsumesRef, ContactRecord, ContainerData, Entity, EntityPackage, ExampleRecord, ExternalDocsRecord,
    LicenseRecord, ModelData, ObjectNames, PackageDoc, ParameterLocation, ProducesRef, RequestEntity,
    ResponseEntity, ReverseOutput, ScopeRecord, SecurityDefinitionRecord, SecurityRequirementRecord,
    TagExternalDocsRecord, TagRecord, TagRef, OPERATION_METHODS,
};
use crate::error::ConversionError;
use crate::extensions::{self, is_extension_key};
use crate::models::{DocumentFormat, ExternalDocs, Info, SecurityScheme, Tag};
use crate::schema::{string_field, string_list, SchemaKind, SchemaNode, SUBTYPE_FILE, SUBTYPE_NO_FILE};
use crate::sentinel;
use crate::type_mapper;
use crate::validator::StructuralValidator;

const SWAGGER_VERSION: &str = "2.0";

// Comment lines left in JSON text once the sentinel spans are decoded.
static COMMENT_LINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#\s+").unwrap());

/// Order of schema properties in the produced model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FieldOrder {
    /// Keep the order of the source document
    #[default]
    Field,
    Alphabetical,
}

/// Options of the reverse pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseOptions {
    pub field_order: FieldOrder,
}

/// Reads Swagger 2.0 documents into model entities
pub struct SwaggerParser {
    options: ReverseOptions,
}

impl SwaggerParser {
    /// Create a new SwaggerParser instance
    pub fn new(options: ReverseOptions) -> Self {
        Self { options }
    }

    /// Parse a document file; `.json` files are read as JSON, anything else as YAML
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ReverseOutput, ConversionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConversionError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Read {} bytes from {:?}", text.len(), path);

        let mut output = self.parse_str(&text, DocumentFormat::from_path(path))?;
        output.model_data.model_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string());
        Ok(output)
    }

    pub fn parse_str(&self, text: &str, format: DocumentFormat) -> Result<ReverseOutput, ConversionError> {
        let document = load_document(text, format)?;
        self.convert(&document)
    }

    /// Convert a parsed document.
    ///
    /// Failures while walking the tree carry the active part of the document
    /// and are refined by the structural validator when it can explain them.
    pub fn convert(&self, document: &Value) -> Result<ReverseOutput, ConversionError> {
        check_version(document)?;
        info!("Converting Swagger 2.0 document");

        self.convert_document(document).map_err(|error| {
            error
                .with_document(&activation::strip_inactive(document))
                .refine(&StructuralValidator)
        })
    }

    fn convert_document(&self, document: &Value) -> Result<ReverseOutput, ConversionError> {
        let model_data = parse_model_data(document)?;
        let definitions = self.definitions(document)?;
        let mut packages = Vec::new();

        let Some(paths) = document.get("paths").and_then(Value::as_object) else {
            warn!("Document has no paths");
            return Ok(ReverseOutput { packages, model_data });
        };

        for (path, item, path_activation) in activation::members(paths) {
            if is_extension_key(path) {
                continue;
            }
            let Some(item) = item.as_object() else {
                warn!("Path {} is not an object", path);
                continue;
            };
            debug!("Processing path {}", path);

            let bucket_info = ContainerData {
                name: path.clone(),
                activation: path_activation,
                extensions: extensions::collect(item.iter())?,
            };
            let shared: Vec<Value> = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for (method, operation, operation_activation) in activation::members(item) {
                if !OPERATION_METHODS.contains(&method.as_str()) {
                    if method != "parameters" && !is_extension_key(method) {
                        debug!("Skipping {} of {}", method, path);
                    }
                    continue;
                }

                let operation = prepare_operation(document, operation, &shared);
                let (mut request, responses) = self.parse_operation(&operation, path, method)?;
                request.activation = operation_activation;

                packages.push(package(path, &definitions, &bucket_info, Entity::Request(request)));
                for response in responses {
                    packages.push(package(path, &definitions, &bucket_info, Entity::Response(response)));
                }
            }
        }

        info!("Converted {} entities", packages.len());
        Ok(ReverseOutput { packages, model_data })
    }

    /// Request entity of one operation and one response entity per status code
    pub fn parse_operation(
        &self,
        operation: &Value,
        container: &str,
        method: &str,
    ) -> Result<(RequestEntity, Vec<ResponseEntity>), ConversionError> {
        let map = operation.as_object().ok_or_else(|| {
            ConversionError::conversion(format!("operation {} of {} is not an object", method, container))
        })?;
        let mut request = RequestEntity::new(container, method);

        request.tags = string_list(map.get("tags"))
            .into_iter()
            .map(|tag| TagRef { tag })
            .collect();
        request.summary = string_field(map, "summary");
        request.description = string_field(map, "description");
        request.external_docs = typed::<ExternalDocs>(map.get("externalDocs"))?
            .map(external_docs_record)
            .transpose()?;
        request.operation_id = string_field(map, "operationId");
        request.consumes = string_list(map.get("consumes"))
            .into_iter()
            .map(|mime_type| ConsumesRef { mime_type })
            .collect();
        request.produces = string_list(map.get("produces"))
            .into_iter()
            .map(|mime_type| ProducesRef { mime_type })
            .collect();
        request.schemes = string_list(map.get("schemes"));
        request.deprecated = map.get("deprecated").and_then(Value::as_bool);
        request.security = security_records(map.get("security"))?;
        request.extensions = extensions::collect(map.iter())?;
        request.properties = self.parameter_buckets(map.get("parameters"), &request.id)?;

        let mut responses = Vec::new();
        match map.get("responses").and_then(Value::as_object) {
            Some(entries) => {
                for (code, response, activation) in activation::members(entries) {
                    if is_extension_key(code) {
                        continue;
                    }
                    let mut entity = self.parse_response(response, &request.id, code)?;
                    entity.activation = activation;
                    responses.push(entity);
                }
            }
            None => warn!("Operation {} of {} has no responses", method, container),
        }

        Ok((request, responses))
    }

    // All five buckets are always present, empty or not.
    fn parameter_buckets(
        &self,
        parameters: Option<&Value>,
        request_id: &str,
    ) -> Result<IndexMap<String, SchemaNode>, ConversionError> {
        let mut buckets: IndexMap<ParameterLocation, (IndexMap<String, SchemaNode>, Vec<String>)> =
            ParameterLocation::ALL
                .into_iter()
                .map(|location| (location, Default::default()))
                .collect();

        let list = parameters.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        for (parameter, activation) in activation::elements(list) {
            let Some(map) = parameter.as_object() else {
                warn!("Skipping malformed parameter of {}", request_id);
                continue;
            };
            let Some(name) = string_field(map, "name") else {
                warn!("Skipping parameter without a name in {}", request_id);
                continue;
            };
            let Some(location) = map
                .get("in")
                .and_then(Value::as_str)
                .and_then(ParameterLocation::parse)
            else {
                warn!("Parameter {} of {} has no valid location", name, request_id);
                continue;
            };

            let node = if location == ParameterLocation::Body {
                match map.get("schema") {
                    Some(schema) => {
                        let mut node = self.schema_node(schema)?;
                        if let Some(description) = string_field(map, "description") {
                            node.description = Some(description);
                        }
                        node
                    }
                    None => {
                        warn!("Body parameter {} of {} has no schema", name, request_id);
                        SchemaNode::object(IndexMap::new())
                    }
                }
            } else {
                self.schema_node(parameter)?
            };

            if let Some((properties, required)) = buckets.get_mut(&location) {
                if map.get("required").and_then(Value::as_bool) == Some(true) {
                    required.push(name.clone());
                }
                properties.insert(name, node.with_activation(activation));
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(location, (properties, required))| {
                let group = SchemaNode::new(SchemaKind::ParameterGroup {
                    properties,
                    required,
                    subtype: Some(SUBTYPE_NO_FILE.to_string()),
                });
                (location.as_str().to_string(), group)
            })
            .collect())
    }

    fn parse_response(
        &self,
        response: &Value,
        request_id: &str,
        code: &str,
    ) -> Result<ResponseEntity, ConversionError> {
        let mut entity = ResponseEntity::new(request_id, code);
        let Some(map) = response.as_object() else {
            warn!("Response {} of {} is not an object", code, request_id);
            return Ok(entity);
        };

        entity.description = string_field(map, "description");
        if let Some(examples) = map.get("examples").and_then(Value::as_object) {
            for (mime_type, value) in examples {
                entity.examples.push(ExampleRecord {
                    mime_type: mime_type.clone(),
                    value: serde_json::to_string(value)?,
                });
            }
        }
        entity.extensions = extensions::collect(map.iter())?;

        let mut headers = IndexMap::new();
        if let Some(entries) = map.get("headers").and_then(Value::as_object) {
            for (name, header, activation) in activation::members(entries) {
                headers.insert(name.clone(), self.schema_node(header)?.with_activation(activation));
            }
        }
        let mut body = IndexMap::new();
        if let Some(schema) = map.get("schema") {
            body.insert("schema".to_string(), self.schema_node(schema)?);
        }

        entity
            .properties
            .insert("headers".to_string(), SchemaNode::parameter_group(headers, SUBTYPE_NO_FILE));
        entity
            .properties
            .insert("body".to_string(), SchemaNode::parameter_group(body, SUBTYPE_FILE));
        Ok(entity)
    }

    /// Model definitions as the serialized `{ "definitions": ... }` set
    fn definitions(&self, document: &Value) -> Result<String, ConversionError> {
        let mut definitions = Map::new();
        if let Some(entries) = document.get("definitions").and_then(Value::as_object) {
            for (name, schema, activation) in activation::members(entries) {
                let node = self.schema_node(schema)?.with_activation(activation);
                definitions.insert(name.clone(), node.to_model());
            }
        }
        debug!("Converted {} definitions", definitions.len());
        Ok(serde_json::to_string(&json!({ "definitions": definitions }))?)
    }

    fn schema_node(&self, schema: &Value) -> Result<SchemaNode, ConversionError> {
        let mut node = type_mapper::to_source(schema)?;
        if self.options.field_order == FieldOrder::Alphabetical {
            node.sort_properties();
        }
        Ok(node)
    }
}

/// Turn document text into a JSON tree.
///
/// Sentinel spans of an editable document are decoded back into inactive
/// markers first; remaining comment lines of JSON text are dropped.
pub fn load_document(text: &str, format: DocumentFormat) -> Result<Value, ConversionError> {
    let decoded = sentinel::decode(text, format);

    match format {
        DocumentFormat::Json => {
            let cleaned = decoded
                .lines()
                .filter(|line| !COMMENT_LINE_REGEX.is_match(line))
                .collect::<Vec<_>>()
                .join("\n");
            let cleaned = sentinel::collapse_trailing_commas(&cleaned);
            serde_json::from_str(&cleaned).map_err(|e| ConversionError::Parse(e.to_string()))
        }
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&decoded).map_err(|e| ConversionError::Parse(e.to_string()))?;
            serde_json::to_value(yaml).map_err(|e| ConversionError::Parse(e.to_string()))
        }
    }
}

// An unquoted YAML `swagger: 2.0` arrives as a number.
fn check_version(document: &Value) -> Result<(), ConversionError> {
    match document.get("swagger") {
        Some(Value::String(version)) if version == SWAGGER_VERSION => Ok(()),
        Some(Value::Number(version)) if version.as_f64() == Some(2.0) => Ok(()),
        found => Err(ConversionError::SchemaVersion {
            found: found.map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            }),
        }),
    }
}

/// Operation with shared parameters and responses resolved and path-level
/// parameters merged in; operation-level ones win on equal name and location.
fn prepare_operation(document: &Value, operation: &Value, shared: &[Value]) -> Value {
    let mut operation = operation.clone();
    let Some(map) = operation.as_object_mut() else {
        return operation;
    };

    let own: Vec<Value> = map
        .get("parameters")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(|p| resolve_shared(document, p, "parameters")).collect())
        .unwrap_or_default();
    let mut parameters: Vec<Value> = shared
        .iter()
        .map(|p| resolve_shared(document, p, "parameters"))
        .filter(|inherited| !own.iter().any(|p| same_parameter(p, inherited)))
        .collect();
    parameters.extend(own);
    if !parameters.is_empty() {
        map.insert("parameters".into(), Value::Array(parameters));
    }

    if let Some(Value::Object(responses)) = map.get_mut("responses") {
        for response in responses.values_mut() {
            *response = resolve_shared(document, response, "responses");
        }
    }

    operation
}

// `#/parameters/N` and `#/responses/N` point into the document root.
fn resolve_shared(document: &Value, value: &Value, section: &str) -> Value {
    let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
        return value.clone();
    };
    let prefix = format!("#/{}/", section);
    let Some(name) = reference.strip_prefix(&prefix) else {
        return value.clone();
    };
    let name = name.replace("~1", "/").replace("~0", "~");

    match document.get(section).and_then(|entries| entries.get(&name)) {
        Some(target) => target.clone(),
        None => {
            warn!("Unresolved reference {}", reference);
            value.clone()
        }
    }
}

fn same_parameter(left: &Value, right: &Value) -> bool {
    let key = |value: &Value| {
        (
            value.get("name").and_then(Value::as_str).map(str::to_string),
            value.get("in").and_then(Value::as_str).map(str::to_string),
        )
    };
    let (name, location) = key(left);
    name.is_some() && location.is_some() && (name, location) == key(right)
}

fn package(container: &str, definitions: &str, bucket_info: &ContainerData, entity: Entity) -> EntityPackage {
    let name = entity.name().to_string();
    EntityPackage {
        object_names: ObjectNames {
            collection_name: name.clone(),
        },
        doc: PackageDoc {
            db_name: container.to_string(),
            collection_name: name,
            model_definitions: definitions.to_string(),
            bucket_info: bucket_info.clone(),
        },
        json_schema: entity,
    }
}

fn typed<T: DeserializeOwned>(value: Option<&Value>) -> Result<Option<T>, ConversionError> {
    value
        .filter(|value| !value.is_null())
        .map(|value| serde_json::from_value(value.clone()))
        .transpose()
        .map_err(ConversionError::from)
}

fn external_docs_record(docs: ExternalDocs) -> Result<ExternalDocsRecord, ConversionError> {
    Ok(ExternalDocsRecord {
        description: docs.description,
        url: Some(docs.url).filter(|url| !url.is_empty()),
        extensions: extensions::collect(docs.extensions.iter())?,
    })
}

fn security_records(value: Option<&Value>) -> Result<Vec<SecurityRequirementRecord>, ConversionError> {
    let requirements: Vec<IndexMap<String, Vec<String>>> = typed(value)?.unwrap_or_default();
    Ok(requirements
        .into_iter()
        .flat_map(|requirement| requirement.into_iter())
        .map(|(name, scopes)| SecurityRequirementRecord {
            name: Some(name),
            scopes,
        })
        .collect())
}

/// Document-level metadata of the model
pub fn parse_model_data(document: &Value) -> Result<ModelData, ConversionError> {
    let Some(root) = document.as_object() else {
        return Ok(ModelData::default());
    };
    let info: Info = typed(root.get("info"))?.unwrap_or_default();

    let contact = match info.contact {
        Some(contact) => Some(ContactRecord {
            extensions: extensions::collect(contact.extensions.iter())?,
            name: contact.name,
            url: contact.url,
            email: contact.email,
        }),
        None => None,
    };
    let license = match info.license {
        Some(license) => Some(LicenseRecord {
            extensions: extensions::collect(license.extensions.iter())?,
            name: Some(license.name).filter(|name| !name.is_empty()),
            url: license.url,
        }),
        None => None,
    };

    let tags: Vec<Tag> = typed(root.get("tags"))?.unwrap_or_default();
    let security_definitions: IndexMap<String, SecurityScheme> =
        typed(root.get("securityDefinitions"))?.unwrap_or_default();

    Ok(ModelData {
        model_name: None,
        db_version: Some(format!("Swagger {}", SWAGGER_VERSION)),
        title: Some(info.title).filter(|title| !title.is_empty()),
        description: info.description,
        terms_of_service: info.termsOfService,
        version: Some(info.version).filter(|version| !version.is_empty()),
        contact,
        license,
        info_extensions: extensions::collect(info.extensions.iter())?,
        host: string_field(root, "host"),
        base_path: string_field(root, "basePath"),
        schemes: string_list(root.get("schemes")),
        consumes: string_list(root.get("consumes"))
            .into_iter()
            .map(|mime_type| ConsumesRef { mime_type })
            .collect(),
        produces: string_list(root.get("produces"))
            .into_iter()
            .map(|mime_type| ProducesRef { mime_type })
            .collect(),
        tags: tags
            .into_iter()
            .map(|tag| TagRecord {
                name: tag.name,
                description: tag.description,
                external_docs: tag.externalDocs.map(|docs| TagExternalDocsRecord {
                    description: docs.description,
                    url: Some(docs.url).filter(|url| !url.is_empty()),
                }),
            })
            .collect(),
        security: security_records(root.get("security"))?,
        security_definitions: security_definitions
            .into_iter()
            .map(|(name, scheme)| security_definition_record(name, scheme))
            .collect::<Result<_, _>>()?,
        external_docs: typed::<ExternalDocs>(root.get("externalDocs"))?
            .map(external_docs_record)
            .transpose()?,
        extensions: extensions::collect(root.iter())?,
    })
}

fn security_definition_record(
    name: String,
    scheme: SecurityScheme,
) -> Result<SecurityDefinitionRecord, ConversionError> {
    Ok(SecurityDefinitionRecord {
        name,
        scheme_type: scheme.scheme_type,
        description: scheme.description,
        parameter_name: scheme.name,
        location: scheme.in_type,
        flow: scheme.flow,
        authorization_url: scheme.authorizationUrl,
        token_url: scheme.tokenUrl,
        scopes: scheme
            .scopes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, description)| ScopeRecord { name, description })
            .collect(),
        extensions: extensions::collect(scheme.extensions.iter())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use pretty_assertions::assert_eq;

    fn parser() -> SwaggerParser {
        SwaggerParser::new(ReverseOptions::default())
    }

    fn petstore() -> Value {
        json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1.0", "x-audience": "public" },
            "host": "pets.example.com",
            "parameters": {
                "limit": { "name": "limit", "in": "query", "type": "integer", "maximum": 100 }
            },
            "responses": {
                "NotFound": { "description": "Not found" }
            },
            "paths": {
                "/pets/{id}": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "type": "string" },
                        { "name": "trace", "in": "header", "type": "string" }
                    ],
                    "get": {
                        "tags": ["pets"],
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "type": "integer", "format": "int64" },
                            { "$ref": "#/parameters/limit" },
                            { "name": "pet", "in": "body", "description": "Filter", "schema": { "$ref": "#/definitions/Pet" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "headers": { "X-Rate-Limit": { "type": "integer" } },
                                "schema": { "$ref": "#/definitions/Pet" },
                                "examples": { "application/json": { "id": 1 } },
                                "x-cache": true
                            },
                            "404": { "$ref": "#/responses/NotFound" }
                        },
                        "security": [{ "auth": ["read"] }]
                    },
                    "x-owner": "team"
                }
            },
            "definitions": {
                "Pet": { "properties": { "name": { "type": "string", "example": "Rex" } } }
            }
        })
    }

    fn request(output: &ReverseOutput) -> &RequestEntity {
        match &output.packages[0].json_schema {
            Entity::Request(request) => request,
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_version_is_checked_first() {
        let error = parser().convert(&json!({ "swagger": "3.0", "paths": {} })).unwrap_err();
        assert!(matches!(error, ConversionError::SchemaVersion { found: Some(ref v) } if v == "3.0"));
        assert!(parser().convert(&json!({ "swagger": 2.0, "paths": {} })).is_ok());
    }

    #[test]
    fn test_packages_per_entity() {
        let output = parser().convert(&petstore()).unwrap();
        let names: Vec<(&str, &str)> = output
            .packages
            .iter()
            .map(|package| (package.doc.db_name.as_str(), package.object_names.collection_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("/pets/{id}", "get"), ("/pets/{id}", "200"), ("/pets/{id}", "404")]
        );

        let bucket_info = &output.packages[0].doc.bucket_info;
        assert_eq!(bucket_info.extensions[0].key, "x-owner");
        assert_eq!(output.packages[1].json_schema.id(), "/pets/{id}/get/200");
    }

    #[test]
    fn test_parameters_are_bucketed() {
        let output = parser().convert(&petstore()).unwrap();
        let request = request(&output);

        let buckets: Vec<&str> = request.properties.keys().map(String::as_str).collect();
        assert_eq!(buckets, vec!["path", "query", "header", "body", "formData"]);

        let path = &request.properties["path"];
        assert_eq!(path.required(), &["id".to_string()]);
        assert_eq!(
            path.properties().unwrap()["id"].kind,
            SchemaKind::Primitive {
                type_name: "integer".into(),
                format: Some("int64".into()),
                mode: None
            }
        );
        assert_eq!(
            request.properties["query"].properties().unwrap()["limit"].keywords["maximum"],
            json!(100)
        );
        assert!(request.properties["header"].properties().unwrap().contains_key("trace"));

        let body = &request.properties["body"].properties().unwrap()["pet"];
        assert_eq!(body.as_reference().unwrap().target_path, "#/definitions/Pet");
        assert_eq!(body.description.as_deref(), Some("Filter"));
        assert_eq!(request.security[0].name.as_deref(), Some("auth"));
        assert_eq!(request.tags[0].tag, "pets");
    }

    #[test]
    fn test_responses_carry_headers_body_and_examples() {
        let output = parser().convert(&petstore()).unwrap();
        let ok = match &output.packages[1].json_schema {
            Entity::Response(response) => response,
            other => panic!("expected response, got {:?}", other),
        };

        assert_eq!(ok.parent_id, "/pets/{id}/get");
        assert_eq!(ok.description.as_deref(), Some("ok"));
        assert!(ok.headers().unwrap().properties().unwrap().contains_key("X-Rate-Limit"));
        assert!(ok.body().unwrap().properties().unwrap()["schema"].as_reference().is_some());
        assert_eq!(ok.examples[0].mime_type, "application/json");
        assert_eq!(ok.examples[0].value, r#"{"id":1}"#);
        assert_eq!(ok.extensions[0].key, "x-cache");

        match &output.packages[2].json_schema {
            Entity::Response(response) => assert_eq!(response.description.as_deref(), Some("Not found")),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_model_data_and_definitions() {
        let output = parser().convert(&petstore()).unwrap();
        assert_eq!(output.model_data.title.as_deref(), Some("Pets"));
        assert_eq!(output.model_data.version.as_deref(), Some("1.0"));
        assert_eq!(output.model_data.host.as_deref(), Some("pets.example.com"));
        assert_eq!(output.model_data.info_extensions[0].key, "x-audience");

        let definitions: Value = serde_json::from_str(&output.packages[0].doc.model_definitions).unwrap();
        assert_eq!(
            definitions["definitions"]["Pet"]["properties"]["name"],
            json!({ "type": "string", "sample": "Rex", "isActivated": true })
        );
        assert_eq!(definitions["definitions"]["Pet"]["type"], json!("object"));
    }

    #[test]
    fn test_alphabetical_field_order() {
        let parser = SwaggerParser::new(ReverseOptions {
            field_order: FieldOrder::Alphabetical,
        });
        let document = json!({
            "swagger": "2.0",
            "paths": {},
            "definitions": {
                "Pet": { "type": "object", "properties": { "b": { "type": "string" }, "a": { "type": "string" } } }
            }
        });
        let output = parser.convert(&document).unwrap();
        assert!(output.packages.is_empty());

        let node = parser.schema_node(&document["definitions"]["Pet"]).unwrap();
        let names: Vec<&str> = node.properties().unwrap().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_inactive_markers_become_flags() {
        let document = json!({
            "swagger": "2.0",
            "paths": {
                "/pets": {
                    "get": {
                        "parameters": [
                            "__inactiveStart_0",
                            { "name": "q", "in": "query", "type": "string" },
                            "__inactiveEnd_0"
                        ],
                        "responses": { "200": { "description": "ok" } }
                    },
                    "__inactiveStart_1": true,
                    "delete": { "responses": { "204": { "description": "gone" } } },
                    "__inactiveEnd_1": true
                }
            }
        });
        let output = parser().convert(&document).unwrap();
        let activations: Vec<(&str, Activation)> = output
            .packages
            .iter()
            .filter_map(|package| match &package.json_schema {
                Entity::Request(request) => Some((request.method.as_str(), request.activation)),
                _ => None,
            })
            .collect();
        assert_eq!(
            activations,
            vec![("get", Activation::Active), ("delete", Activation::Inactive)]
        );

        let query = &request(&output).properties["query"].properties().unwrap()["q"];
        assert_eq!(query.activation, Activation::Inactive);
    }

    #[test]
    fn test_json_comment_lines_are_dropped() {
        let text = "{\n  \"swagger\": \"2.0\",\n  # a stray note\n  \"paths\": {}\n}\n";
        let value = load_document(text, DocumentFormat::Json).unwrap();
        assert_eq!(value, json!({ "swagger": "2.0", "paths": {} }));
    }

    #[test]
    fn test_unparsable_text_is_a_parse_error() {
        assert!(matches!(
            load_document("{ \"swagger\": ", DocumentFormat::Json),
            Err(ConversionError::Parse(_))
        ));
        assert!(matches!(
            load_document("swagger: [", DocumentFormat::Yaml),
            Err(ConversionError::Parse(_))
        ));
    }

    #[test]
    fn test_yaml_numeric_keys_become_strings() {
        let value = load_document("responses:\n  200:\n    description: ok\n", DocumentFormat::Yaml).unwrap();
        assert_eq!(value, json!({ "responses": { "200": { "description": "ok" } } }));
    }

    #[test]
    fn test_malformed_operation_is_refined() {
        let document = json!({
            "swagger": "2.0",
            "info": { "version": "1" },
            "paths": { "/pets": { "get": "nope" } }
        });
        match parser().convert(&document) {
            Err(ConversionError::Validation { label, .. }) => assert_eq!(label, "info.title"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_refinement_ignores_inactive_markers() {
        let document = json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1" },
            "paths": {
                "__inactiveStart_0": true,
                "/legacy": { "get": { "responses": { "200": { "description": "ok" } } } },
                "__inactiveEnd_0": true,
                "/pets": { "get": "nope" }
            }
        });
        match parser().convert(&document) {
            Err(ConversionError::Validation { label, title }) => {
                assert_eq!(label, "paths./pets.get.responses");
                assert_eq!(title, "is required");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
