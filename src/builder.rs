//! Forward construction of path items and operations from model entities.

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::activation::{ActiveList, ActiveMap};
use crate::entity::{
    Entity, ExternalDocsRecord, ModelContainer, ParameterLocation, RequestEntity, ResponseEntity,
    SecurityRequirementRecord,
};
use crate::extensions;
use crate::models::{ExternalDocs, Operation, Parameter, PathItem, Response};
use crate::schema::SchemaNode;
use crate::type_mapper;

const JSON_MIME_TYPE: &str = "application/json";

/// Path item of a container: one operation per request entity.
pub fn build_path_item(container: &ModelContainer, entities: &[Entity]) -> PathItem {
    let responses: Vec<&ResponseEntity> = entities
        .iter()
        .filter_map(|entity| match entity {
            Entity::Response(response) => Some(response),
            _ => None,
        })
        .collect();

    let mut operations = ActiveMap::new();
    for entity in entities {
        if let Entity::Request(request) = entity {
            debug!("Building operation {} {}", request.method, container.path_name());
            operations.insert(
                request.method.clone(),
                build_operation(request, &responses, container),
                request.activation,
            );
        }
    }

    PathItem {
        operations,
        extensions: extensions::to_fields(container.extensions()),
    }
}

/// Operation of one request; `responses` may hold responses of other
/// requests, only those pointing back at `request` are used.
pub fn build_operation(
    request: &RequestEntity,
    responses: &[&ResponseEntity],
    container: &ModelContainer,
) -> Operation {
    let mut operation_responses = ActiveMap::new();
    for response in responses.iter().filter(|response| response.parent_id == request.id) {
        operation_responses.insert(
            response.code.clone(),
            build_response(response, container),
            response.activation,
        );
    }

    Operation {
        tags: request
            .tags
            .iter()
            .map(|tag| tag.tag.clone())
            .filter(|tag| !tag.is_empty())
            .collect(),
        summary: request.summary.clone(),
        description: request.description.clone(),
        externalDocs: request.external_docs.as_ref().map(external_docs),
        operationId: request.operation_id.clone(),
        consumes: request.consumes.iter().map(|item| item.mime_type.clone()).collect(),
        produces: request.produces.iter().map(|item| item.mime_type.clone()).collect(),
        schemes: request.schemes.clone(),
        deprecated: request.deprecated,
        parameters: build_parameters(request, container),
        responses: operation_responses,
        security: security_requirements(&request.security),
        extensions: extensions::to_fields(&request.extensions),
    }
}

/// Parameters of every bucket, buckets in fixed location order.
pub fn build_parameters(request: &RequestEntity, container: &ModelContainer) -> ActiveList<Parameter> {
    let mut parameters = ActiveList::new();

    for location in ParameterLocation::ALL {
        let Some(bucket) = request.bucket(location) else {
            continue;
        };
        let Some(properties) = bucket.properties() else {
            warn!("Bucket {} of {} is not a parameter group", location.as_str(), request.id);
            continue;
        };
        let required = bucket.required();

        for (name, property) in properties {
            let parameter = build_parameter(name, property, location, required, request, container);
            parameters.push(parameter, property.activation);
        }
    }

    parameters
}

fn build_parameter(
    name: &str,
    property: &SchemaNode,
    location: ParameterLocation,
    required: &[String],
    request: &RequestEntity,
    container: &ModelContainer,
) -> Parameter {
    let mut parameter = Parameter {
        name: name.to_string(),
        in_type: location.as_str().to_string(),
        description: property.description.clone(),
        required: required.iter().any(|item| item == name).then_some(true),
        ..Default::default()
    };

    let Some(type_props) = type_mapper::to_target(property) else {
        warn!("Parameter {} of {} has no schema", name, request.id);
        return parameter;
    };

    if location == ParameterLocation::Body {
        let mut schema = type_props;
        if let Value::Object(map) = &mut schema {
            if !map.contains_key("$ref") {
                if let Some(example) = container.sample_body(&request.id) {
                    map.insert("example".into(), example);
                }
            }
        }
        parameter.schema = Some(schema);
    } else if let Value::Object(mut fields) = type_props {
        fields.remove("description");
        parameter.fields = fields;
    }

    parameter
}

/// Response object; a missing body or header shape only drops that field.
pub fn build_response(response: &ResponseEntity, container: &ModelContainer) -> Response {
    let mut headers = ActiveMap::new();
    if let Some(properties) = response.headers().and_then(SchemaNode::properties) {
        for (name, property) in properties {
            let mut header = match type_mapper::to_target(property) {
                Some(Value::Object(map)) => map,
                _ => {
                    warn!("Header {} of response {} has no schema", name, response.id);
                    Map::new()
                }
            };
            if let Some(description) = &property.description {
                header
                    .entry("description")
                    .or_insert_with(|| Value::String(description.clone()));
            }
            headers.insert(name.clone(), Value::Object(header), property.activation);
        }
    }

    Response {
        description: response.description.clone().unwrap_or_default(),
        headers,
        schema: response.body().and_then(type_mapper::to_target),
        examples: response_examples(response, container),
        extensions: extensions::to_fields(&response.extensions),
    }
}

fn response_examples(response: &ResponseEntity, container: &ModelContainer) -> IndexMap<String, Value> {
    if !response.examples.is_empty() {
        return response
            .examples
            .iter()
            .filter(|example| !example.mime_type.is_empty())
            .map(|example| {
                let value = serde_json::from_str(&example.value)
                    .unwrap_or_else(|_| Value::String(example.value.clone()));
                (example.mime_type.clone(), value)
            })
            .collect();
    }

    container
        .sample_body(&response.id)
        .map(|body| IndexMap::from([(JSON_MIME_TYPE.to_string(), body)]))
        .unwrap_or_default()
}

pub(crate) fn external_docs(record: &ExternalDocsRecord) -> ExternalDocs {
    ExternalDocs {
        description: record.description.clone(),
        url: record.url.clone().unwrap_or_default(),
        extensions: extensions::to_fields(&record.extensions),
    }
}

/// Security requirements; records without a scheme name are dropped.
pub(crate) fn security_requirements(records: &[SecurityRequirementRecord]) -> Vec<IndexMap<String, Vec<String>>> {
    records
        .iter()
        .filter_map(|record| {
            let name = record.name.as_ref().filter(|name| !name.is_empty())?;
            Some(IndexMap::from([(name.clone(), record.scopes.clone())]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{elements, Activation};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request() -> RequestEntity {
        serde_json::from_value(json!({
            "GUID": "req",
            "collectionName": "post",
            "summary": "Add pet",
            "tags": [{ "tag": "pets" }, { "tag": "" }],
            "security": [{ "securityRequirementName": "auth", "securityRequirementOperation": ["write"] }, {}],
            "operationExtensions": [{ "extensionPattern": "x-rate", "extensionValue": 5 }],
            "properties": {
                "formData": {
                    "type": "parameter",
                    "properties": { "note": { "type": "string" } }
                },
                "body": {
                    "type": "parameter",
                    "required": ["pet"],
                    "properties": {
                        "pet": { "type": "object", "properties": { "name": { "type": "string" } } }
                    }
                },
                "path": {
                    "type": "parameter",
                    "required": ["id"],
                    "properties": {
                        "id": { "type": "string", "description": "Pet id", "format": "uuid" },
                        "old": { "type": "integer", "isActivated": false }
                    }
                },
                "header": {
                    "type": "parameter",
                    "properties": { "meta": { "type": "object" } }
                }
            }
        }))
        .unwrap()
    }

    fn response(id: &str, parent: &str, code: &str) -> ResponseEntity {
        serde_json::from_value(json!({
            "GUID": id,
            "collectionName": code,
            "parentCollection": parent,
            "description": "Created",
            "properties": {
                "headers": {
                    "type": "parameter",
                    "properties": {
                        "X-Rate-Limit": { "type": "integer", "description": "Calls left" }
                    }
                },
                "body": {
                    "type": "parameter",
                    "subtype": "parameter_file",
                    "properties": { "schema": { "$ref": "#/definitions/Pet" } }
                }
            }
        }))
        .unwrap()
    }

    fn container() -> ModelContainer {
        ModelContainer {
            name: "/pets".into(),
            json_data: [
                ("req".to_string(), json!({ "body": { "name": "Rex" } }).to_string()),
                ("res".to_string(), json!({ "body": { "id": 1 } }).to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parameters_follow_location_order() {
        let value = serde_json::to_value(build_parameters(&request(), &container())).unwrap();
        let restored: Vec<(&str, &str, Activation)> = elements(value.as_array().unwrap())
            .into_iter()
            .map(|(parameter, activation)| {
                (
                    parameter["name"].as_str().unwrap(),
                    parameter["in"].as_str().unwrap(),
                    activation,
                )
            })
            .collect();
        assert_eq!(
            restored,
            vec![
                ("id", "path", Activation::Active),
                ("old", "path", Activation::Inactive),
                ("meta", "header", Activation::Active),
                ("pet", "body", Activation::Active),
                ("note", "formData", Activation::Active),
            ]
        );
    }

    #[test]
    fn test_parameter_shapes() {
        let parameters = build_parameters(&request(), &container());
        let value = serde_json::to_value(&parameters).unwrap();

        assert_eq!(
            value[0],
            json!({ "name": "id", "in": "path", "description": "Pet id", "required": true, "type": "string", "format": "uuid" })
        );
        assert_eq!(value[4], json!({ "name": "meta", "in": "header" }));
        assert_eq!(
            value[5],
            json!({
                "name": "pet",
                "in": "body",
                "required": true,
                "schema": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "example": { "name": "Rex" }
                }
            })
        );
    }

    #[test]
    fn test_operation_collects_own_responses() {
        let own = response("res", "req", "201");
        let foreign = response("other", "elsewhere", "404");
        let operation = build_operation(&request(), &[&own, &foreign], &container());

        assert_eq!(operation.tags, vec!["pets".to_string()]);

        let value = serde_json::to_value(&operation).unwrap();
        assert_eq!(
            value["responses"],
            json!({
                "201": {
                    "description": "Created",
                    "headers": { "X-Rate-Limit": { "type": "integer", "description": "Calls left" } },
                    "schema": { "$ref": "#/definitions/Pet" },
                    "examples": { "application/json": { "id": 1 } }
                }
            })
        );
        assert_eq!(value["security"], json!([{ "auth": ["write"] }]));
        assert_eq!(value["x-rate"], json!(5));
    }

    #[test]
    fn test_missing_shapes_degrade() {
        let response: ResponseEntity = serde_json::from_value(json!({
            "GUID": "r",
            "collectionName": "204",
            "parentCollection": "req",
            "examples": [{ "examplesMimeType": "text/plain", "examplesValue": "done" }]
        }))
        .unwrap();
        let built = build_response(&response, &ModelContainer::default());
        assert_eq!(
            serde_json::to_value(&built).unwrap(),
            json!({ "description": "", "examples": { "text/plain": "done" } })
        );
    }
}
