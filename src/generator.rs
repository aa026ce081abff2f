use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::Value;
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::activation::{strip_inactive, ActiveMap};
use crate::builder::{self, build_path_item};
use crate::entity::{ModelData, ModelInput, SecurityDefinitionRecord, TagRecord};
use crate::error::ConversionError;
use crate::extensions;
use crate::models::{Contact, DocumentFormat, ExternalDocs, Info, License, SecurityScheme, Swagger, Tag};
use crate::references::{self, DefinitionPools};
use crate::sentinel;
use crate::type_mapper::{self, definition_key};
use crate::validator::{DocumentValidator, StructuralValidator};

const SWAGGER_VERSION: &str = "2.0";
const OUTPUT_FILE_STEM: &str = "swagger";

/// Options of the forward pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardOptions {
    pub format: DocumentFormat,
    /// Keep inactive entries as commented sentinel spans
    pub editable: bool,
    /// Run the structural validator over the active document
    pub validate: bool,
}

/// Generates a Swagger 2.0 document from a model
pub struct Generator {
    input: ModelInput,
    options: ForwardOptions,
}

impl Generator {
    /// Create a new Generator instance
    pub fn new(input: ModelInput, options: ForwardOptions) -> Self {
        Self { input, options }
    }

    /// Create a Generator from a model file on disk
    pub fn from_file(path: impl AsRef<Path>, options: ForwardOptions) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .context(format!("Failed to read model file: {:?}", path))?;
        let input: ModelInput = serde_json::from_str(&text)
            .context(format!("Failed to parse model file: {:?}", path))?;
        Ok(Self::new(input, options))
    }

    /// Build the typed Swagger document
    pub fn build_document(&self) -> Result<Swagger, ConversionError> {
        let pools = DefinitionPools::from_input(&self.input)?;
        let model = &self.input.model_data;

        let mut paths = ActiveMap::new();
        for container in &self.input.containers {
            debug!("Processing container {}", container.path_name());
            let entities: Vec<_> = container
                .entities()?
                .iter()
                .map(|entity| references::rewrite_entity(entity, &pools))
                .collect();
            paths.insert(
                container.path_name(),
                build_path_item(container, &entities),
                container.activation(),
            );
        }

        Ok(Swagger {
            swagger: SWAGGER_VERSION.to_string(),
            info: build_info(model),
            host: model.host.clone(),
            basePath: model.base_path.clone(),
            schemes: model.schemes.clone(),
            consumes: model
                .consumes
                .iter()
                .map(|item| item.mime_type.clone())
                .filter(|mime_type| !mime_type.is_empty())
                .collect(),
            produces: model
                .produces
                .iter()
                .map(|item| item.mime_type.clone())
                .filter(|mime_type| !mime_type.is_empty())
                .collect(),
            paths,
            definitions: build_definitions(&pools),
            securityDefinitions: build_security_definitions(&model.security_definitions),
            security: builder::security_requirements(&model.security),
            tags: build_tags(&model.tags),
            externalDocs: model.external_docs.as_ref().map(builder::external_docs),
            extensions: extensions::to_fields(&model.extensions),
        })
    }

    /// Serialize the document in the configured format
    pub fn generate(&self) -> Result<String, ConversionError> {
        info!("Generating Swagger 2.0 document");
        let document = self.build_document()?;
        let value = serde_json::to_value(&document)
            .map_err(|e| ConversionError::Serialization(e.to_string()))?;

        if self.options.validate {
            self.validate(&value)?;
        }

        let text = render(&value, self.options.format)?;
        let text = sentinel::encode(&text);
        if self.options.editable {
            Ok(text)
        } else {
            Ok(sentinel::strip(&text, self.options.format))
        }
    }

    /// Generate the document and write it into `output_dir`
    pub fn write(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();

        fs::create_dir_all(output_dir)
            .context(format!("Failed to create output directory: {:?}", output_dir))?;

        let text = self.generate().map_err(|error| {
            let title = error.title();
            anyhow::Error::new(error).context(title)
        })?;

        let file_path = output_dir.join(format!("{}.{}", OUTPUT_FILE_STEM, self.options.format.extension()));
        let mut file = File::create(&file_path)
            .context(format!("Failed to create file: {:?}", file_path))?;
        file.write_all(text.as_bytes())
            .context(format!("Failed to write file: {:?}", file_path))?;

        info!("Generated file: {:?}", file_path);
        Ok(file_path)
    }

    fn validate(&self, value: &Value) -> Result<(), ConversionError> {
        let active = strip_inactive(value);
        match StructuralValidator.validate(&active).into_iter().next() {
            Some(message) => Err(ConversionError::Validation {
                label: message.label,
                title: message.title,
            }),
            None => Ok(()),
        }
    }
}

/// Pretty JSON (2-space indent) or YAML text of a document tree
pub fn render(value: &Value, format: DocumentFormat) -> Result<String, ConversionError> {
    let text = match format {
        DocumentFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| ConversionError::Serialization(e.to_string()))?,
        DocumentFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| ConversionError::Serialization(e.to_string()))?,
    };
    Ok(text)
}

fn build_info(model: &ModelData) -> Info {
    let contact = model.contact.as_ref().and_then(|record| {
        if record.name.is_none() && record.url.is_none() && record.email.is_none() && record.extensions.is_empty() {
            return None;
        }
        Some(Contact {
            name: record.name.clone(),
            url: record.url.clone(),
            email: record.email.clone(),
            extensions: extensions::to_fields(&record.extensions),
        })
    });

    let license = model.license.as_ref().and_then(|record| {
        if record.name.is_none() && record.url.is_none() {
            return None;
        }
        Some(License {
            name: record.name.clone().unwrap_or_default(),
            url: record.url.clone(),
            extensions: extensions::to_fields(&record.extensions),
        })
    });

    Info {
        title: model.title.clone().unwrap_or_default(),
        description: model.description.clone(),
        termsOfService: model.terms_of_service.clone(),
        contact,
        license,
        version: model.version.clone().unwrap_or_default(),
        extensions: extensions::to_fields(&model.info_extensions),
    }
}

// Internal definitions of every entity first, model-level ones win on equal names.
fn build_definitions(pools: &DefinitionPools) -> ActiveMap<Value> {
    let mut definitions = ActiveMap::new();

    let all = pools
        .internal
        .values()
        .flat_map(|set| set.iter())
        .chain(pools.model_level.iter());

    for (name, node) in all {
        let node = references::rewrite_external(node, pools);
        match type_mapper::to_target(&node) {
            Some(value) => definitions.insert(definition_key(name), value, node.activation),
            None => debug!("Definition {} has nothing to emit", name),
        }
    }

    definitions
}

fn build_security_definitions(records: &[SecurityDefinitionRecord]) -> IndexMap<String, SecurityScheme> {
    let mut schemes = IndexMap::new();

    for record in records {
        if record.name.is_empty() {
            warn!("Skipping security definition without a name");
            continue;
        }

        let mut scheme = SecurityScheme {
            scheme_type: record.scheme_type.clone(),
            description: record.description.clone(),
            extensions: extensions::to_fields(&record.extensions),
            ..Default::default()
        };

        match record.scheme_type.as_str() {
            "basic" => {}
            "apiKey" => {
                scheme.name = Some(record.parameter_name.clone().unwrap_or_default());
                scheme.in_type = record.location.clone();
            }
            "oauth2" => {
                scheme.flow = record.flow.clone();
                scheme.scopes = Some(
                    record
                        .scopes
                        .iter()
                        .filter(|scope| !scope.name.is_empty())
                        .map(|scope| (scope.name.clone(), scope.description.clone()))
                        .collect(),
                );
                match record.flow.as_deref() {
                    Some("implicit") => scheme.authorizationUrl = record.authorization_url.clone(),
                    Some("password") | Some("application") => scheme.tokenUrl = record.token_url.clone(),
                    Some("accessCode") => {
                        scheme.authorizationUrl = record.authorization_url.clone();
                        scheme.tokenUrl = record.token_url.clone();
                    }
                    _ => debug!("Security definition {} has no known flow", record.name),
                }
            }
            other => warn!("Unknown security scheme type {} of {}", other, record.name),
        }

        schemes.insert(record.name.clone(), scheme);
    }

    schemes
}

fn build_tags(records: &[TagRecord]) -> Vec<Tag> {
    records
        .iter()
        .filter(|record| !record.name.is_empty())
        .map(|record| Tag {
            name: record.name.clone(),
            description: record.description.clone(),
            externalDocs: record.external_docs.as_ref().map(|docs| ExternalDocs {
                description: docs.description.clone(),
                url: docs.url.clone().unwrap_or_default(),
                extensions: IndexMap::new(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ModelContainer;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn container(name: &str, active: bool, entities: Vec<Value>) -> ModelContainer {
        let ids: Vec<String> = entities
            .iter()
            .map(|entity| entity["GUID"].as_str().unwrap().to_string())
            .collect();
        ModelContainer {
            name: name.to_string(),
            entities: ids.clone(),
            json_schema: ids
                .iter()
                .cloned()
                .zip(entities.iter().map(Value::to_string))
                .collect(),
            container_data: vec![serde_json::from_value(json!({ "name": name, "isActivated": active })).unwrap()],
            ..Default::default()
        }
    }

    fn input() -> ModelInput {
        ModelInput {
            containers: vec![
                container(
                    "/pets",
                    true,
                    vec![
                        json!({ "entityType": "request", "GUID": "q1", "collectionName": "get" }),
                        json!({ "entityType": "response", "GUID": "r1", "collectionName": "200", "parentCollection": "q1", "description": "ok" }),
                        json!({ "entityType": "request", "GUID": "q2", "collectionName": "delete", "isActivated": false }),
                        json!({ "entityType": "response", "GUID": "r2", "collectionName": "204", "parentCollection": "q2", "description": "gone" }),
                    ],
                ),
                container(
                    "/legacy",
                    false,
                    vec![
                        json!({ "entityType": "request", "GUID": "q3", "collectionName": "get" }),
                        json!({ "entityType": "response", "GUID": "r3", "collectionName": "200", "parentCollection": "q3", "description": "ok" }),
                    ],
                ),
            ],
            model_definitions: json!({
                "properties": { "Pet Owner": { "type": "string", "isActivated": true } }
            })
            .to_string(),
            model_data: serde_json::from_value(json!({
                "title": "Pets",
                "modelVersion": "1.0",
                "host": "pets.example.com",
                "consumes": [{ "consumesMimeTypeDef": "application/json" }, { "consumesMimeTypeDef": "" }],
                "contact": { "contactName": "Team" },
                "license": {},
                "tags": [{ "tagName": "pets", "externalDocs": { "tagExternalDocsUrl": "https://docs" } }, { "tagName": "" }],
                "securityDefinitions": [
                    { "securityDefinitionsName": "basicAuth", "securitySchemeType": "basic" },
                    { "securityDefinitionsName": "key", "securitySchemeType": "apiKey", "securitySchemeIn": "header" },
                    {
                        "securityDefinitionsName": "oauth",
                        "securitySchemeType": "oauth2",
                        "securitySchemeFlow": "accessCode",
                        "securitySchemeAuthorizationUrl": "https://auth",
                        "securitySchemeTokenUrl": "https://token",
                        "securitySchemeScopes": [{ "securitySchemeScopesName": "read", "securitySchemeScopesDescription": "Read" }]
                    }
                ],
                "scopesExtensions": [{ "extensionPattern": "x-owner", "extensionValue": "team" }]
            }))
            .unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_document_root() {
        let generator = Generator::new(input(), ForwardOptions::default());
        let value = serde_json::to_value(generator.build_document().unwrap()).unwrap();

        assert_eq!(value["swagger"], json!("2.0"));
        assert_eq!(value["info"], json!({ "title": "Pets", "contact": { "name": "Team" }, "version": "1.0" }));
        assert_eq!(value["consumes"], json!(["application/json"]));
        assert_eq!(value["definitions"], json!({ "Pet_Owner": { "type": "string" } }));
        assert_eq!(
            value["tags"],
            json!([{ "name": "pets", "externalDocs": { "url": "https://docs" } }])
        );
        assert_eq!(
            value["securityDefinitions"],
            json!({
                "basicAuth": { "type": "basic" },
                "key": { "type": "apiKey", "name": "", "in": "header" },
                "oauth": {
                    "type": "oauth2",
                    "flow": "accessCode",
                    "authorizationUrl": "https://auth",
                    "tokenUrl": "https://token",
                    "scopes": { "read": "Read" }
                }
            })
        );
        assert_eq!(value["x-owner"], json!("team"));

        let paths: Vec<&str> = value["paths"].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["/pets", "__inactiveStart_1", "/legacy", "__inactiveEnd_1"]
        );
        assert_eq!(value["paths"]["/pets"]["get"]["responses"]["200"]["description"], json!("ok"));
        assert_eq!(value["paths"]["/pets"]["__inactiveStart_1"], json!(true));
    }

    #[test]
    fn test_generate_strips_inactive_entries() {
        let options = ForwardOptions {
            format: DocumentFormat::Json,
            ..Default::default()
        };
        let text = Generator::new(input(), options).generate().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert!(!text.contains("inactive"));
        assert_eq!(
            value["paths"],
            json!({ "/pets": { "get": { "responses": { "200": { "description": "ok" } } } } })
        );
    }

    #[test]
    fn test_yaml_output_keeps_maps_emptied_by_inactive_entries() {
        let input = ModelInput {
            containers: vec![
                container(
                    "/pets",
                    true,
                    vec![
                        json!({ "entityType": "request", "GUID": "q1", "collectionName": "get" }),
                        json!({
                            "entityType": "response",
                            "GUID": "r1",
                            "collectionName": "200",
                            "parentCollection": "q1",
                            "description": "ok",
                            "properties": {
                                "headers": {
                                    "type": "parameter",
                                    "properties": { "X-Rate": { "type": "integer", "isActivated": false } }
                                }
                            }
                        }),
                    ],
                ),
                container(
                    "/old",
                    true,
                    vec![
                        json!({ "entityType": "request", "GUID": "q2", "collectionName": "get", "isActivated": false }),
                        json!({ "entityType": "response", "GUID": "r2", "collectionName": "200", "parentCollection": "q2", "description": "ok" }),
                    ],
                ),
            ],
            model_data: serde_json::from_value(json!({ "title": "Pets", "modelVersion": "1.0" })).unwrap(),
            ..Default::default()
        };

        let text = Generator::new(input, ForwardOptions::default()).generate().unwrap();
        let value: Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(
            value["paths"],
            json!({
                "/pets": { "get": { "responses": { "200": { "description": "ok", "headers": {} } } } },
                "/old": {}
            })
        );
    }

    #[test]
    fn test_generate_editable_keeps_sentinels() {
        let options = ForwardOptions {
            format: DocumentFormat::Yaml,
            editable: true,
            validate: true,
        };
        let text = Generator::new(input(), options).generate().unwrap();

        assert!(text.contains("# inactiveStart"));
        assert!(text.contains("# inactiveEnd"));
        assert!(text.contains("# delete:"));
        assert!(!text.contains("__inactive"));
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let mut model = input();
        model.model_data.title = None;
        let options = ForwardOptions {
            validate: true,
            ..Default::default()
        };

        match Generator::new(model, options).generate() {
            Err(ConversionError::Validation { label, title }) => {
                assert_eq!(label, "info.title");
                assert_eq!(title, "is required");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_uses_format_extension() {
        let dir = tempdir().unwrap();
        let options = ForwardOptions {
            format: DocumentFormat::Json,
            ..Default::default()
        };
        let path = Generator::new(input(), options).write(dir.path()).unwrap();

        assert_eq!(path, dir.path().join("swagger.json"));
        let written = fs::read_to_string(path).unwrap();
        assert!(written.starts_with("{\n  \"swagger\": \"2.0\""));
    }
}
