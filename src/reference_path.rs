//! Path algebra between model addresses and Swagger pointers.
//!
//! The model addresses a node by the flat chain of names leading to it
//! (`Pets/get/properties/body/properties/schema/...`), while Swagger splits the
//! same tree into `definitions`, `parameters` and `responses` branches. A
//! [`ReferenceAddress`] is the common form both sides are parsed into.

use serde_json::Value;

use crate::entity::ParameterLocation;
use crate::schema::OriginKind;

const PROPERTIES: &str = "properties";

/// Addressing scheme a reference is resolved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AddressScheme {
    Swagger,
    Model,
}

/// Swagger branch a reference points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    Definitions,
    /// `paths/{container}/{operation}/parameters/{index}/...`; `bucket` is the
    /// parameter location when it is known.
    Parameter {
        container: String,
        operation: String,
        index: usize,
        bucket: Option<String>,
    },
    /// `paths/{container}/{operation}/responses/{code}/headers/...`
    ResponseHeader {
        container: String,
        operation: String,
        code: String,
    },
    /// `paths/{container}/{operation}/responses/{code}/schema/...`
    ResponseSchema {
        container: String,
        operation: String,
        code: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAddress {
    /// Document the pointer lives in; `None` for local pointers.
    pub locator: Option<String>,
    pub branch: Branch,
    /// Segments below the branch root.
    pub segments: Vec<String>,
}

impl ReferenceAddress {
    /// Parse a model fragment (the part after `#/`).
    ///
    /// Request references address the single body parameter, so the
    /// parameter index is always 0. A fragment whose request bucket is
    /// `headers` cannot be told apart from a response header and is rejected.
    pub fn from_model_fragment(locator: Option<&str>, fragment: &str) -> Option<Self> {
        let segments = split(fragment);

        if segments.first().map(String::as_str) == Some("definitions") {
            let mut rest: Vec<String> = segments[1..].to_vec();
            if rest.first().map(String::as_str) == Some(PROPERTIES) {
                rest.remove(0);
            }
            return Some(Self::new(locator, Branch::Definitions, rest));
        }

        if segments.len() < 3 {
            return None;
        }

        let schema_index = segments.iter().position(|segment| segment == "schema");
        let (head_segments, tail) = match schema_index {
            Some(index) => segments.split_at(index),
            None => (segments.as_slice(), &[][..]),
        };
        let head: Vec<&String> = head_segments
            .iter()
            .filter(|segment| segment.as_str() != PROPERTIES)
            .collect();
        if head.len() < 3 {
            return None;
        }
        let container = head[0].clone();
        let operation = head[1].clone();
        let below = |from: usize| -> Vec<String> {
            head.iter()
                .skip(from)
                .map(|segment| segment.to_string())
                .collect()
        };

        if segments[2] == PROPERTIES {
            let bucket = head[2].clone();
            if bucket == "headers" {
                return None;
            }
            let mut residual = below(4);
            residual.extend(tail.iter().cloned());
            return Some(Self::new(
                locator,
                Branch::Parameter {
                    container,
                    operation,
                    index: 0,
                    bucket: Some(bucket),
                },
                residual,
            ));
        }

        let code = head[2].clone();
        if head.get(3).map(|segment| segment.as_str()) == Some("headers") {
            let mut residual = below(4);
            residual.extend(tail.iter().cloned());
            return Some(Self::new(
                locator,
                Branch::ResponseHeader {
                    container,
                    operation,
                    code,
                },
                residual,
            ));
        }

        let mut residual = below(4);
        residual.extend(tail.iter().skip(1).cloned());
        Some(Self::new(
            locator,
            Branch::ResponseSchema {
                container,
                operation,
                code,
            },
            residual,
        ))
    }

    /// Parse a Swagger fragment (the part after `#/`).
    pub fn from_swagger_fragment(locator: Option<&str>, fragment: &str) -> Option<Self> {
        let segments = split(fragment);

        match segments.first().map(String::as_str) {
            Some("definitions") => {
                return Some(Self::new(locator, Branch::Definitions, segments[1..].to_vec()))
            }
            Some("paths") if segments.len() >= 5 => {}
            _ => return None,
        }

        let container = segments[1].clone();
        let operation = segments[2].clone();
        match segments[3].as_str() {
            "parameters" => {
                let index = segments[4].parse().ok()?;
                Some(Self::new(
                    locator,
                    Branch::Parameter {
                        container,
                        operation,
                        index,
                        bucket: None,
                    },
                    segments[5..].to_vec(),
                ))
            }
            "responses" => {
                let code = segments[4].clone();
                let branch = match segments.get(5).map(String::as_str) {
                    Some("headers") => Branch::ResponseHeader {
                        container,
                        operation,
                        code,
                    },
                    Some("schema") => Branch::ResponseSchema {
                        container,
                        operation,
                        code,
                    },
                    _ => return None,
                };
                Some(Self::new(locator, branch, segments[6..].to_vec()))
            }
            _ => None,
        }
    }

    /// Slash-delimited Swagger path, without locator.
    pub fn to_swagger_path(&self) -> String {
        let mut path = match &self.branch {
            Branch::Definitions => vec!["definitions".to_string()],
            Branch::Parameter {
                container,
                operation,
                index,
                ..
            } => vec![
                "paths".to_string(),
                container.clone(),
                operation.clone(),
                "parameters".to_string(),
                index.to_string(),
            ],
            Branch::ResponseHeader {
                container,
                operation,
                code,
            } => vec![
                "paths".to_string(),
                container.clone(),
                operation.clone(),
                "responses".to_string(),
                code.clone(),
                "headers".to_string(),
            ],
            Branch::ResponseSchema {
                container,
                operation,
                code,
            } => vec![
                "paths".to_string(),
                container.clone(),
                operation.clone(),
                "responses".to_string(),
                code.clone(),
                "schema".to_string(),
            ],
        };
        path.extend(self.segments.iter().cloned());
        path.join("/")
    }

    /// Slash-delimited model path, without locator.
    ///
    /// Response headers are addressed through the operation's `headers`
    /// bucket; the status code is not part of the model path.
    pub fn to_model_path(&self) -> String {
        let mut path = match &self.branch {
            Branch::Definitions => vec!["definitions".to_string()],
            Branch::Parameter {
                container,
                operation,
                bucket,
                ..
            } => vec![
                container.clone(),
                operation.clone(),
                PROPERTIES.to_string(),
                bucket.clone().unwrap_or_else(|| "body".to_string()),
                PROPERTIES.to_string(),
            ],
            Branch::ResponseHeader {
                container,
                operation,
                ..
            } => vec![
                container.clone(),
                operation.clone(),
                PROPERTIES.to_string(),
                "headers".to_string(),
                PROPERTIES.to_string(),
            ],
            Branch::ResponseSchema {
                container,
                operation,
                code,
            } => vec![
                container.clone(),
                operation.clone(),
                code.clone(),
                PROPERTIES.to_string(),
                "body".to_string(),
                PROPERTIES.to_string(),
                "schema".to_string(),
            ],
        };
        path.extend(self.segments.iter().cloned());
        path.join("/")
    }

    fn new(locator: Option<&str>, branch: Branch, segments: Vec<String>) -> Self {
        Self {
            locator: locator.map(str::to_string),
            branch,
            segments,
        }
    }

    fn render(&self, path: String) -> String {
        match &self.locator {
            Some(locator) => format!("{}#/{}", locator, path),
            None => path,
        }
    }
}

/// Resolve `reference` into the `target` addressing scheme.
///
/// Local references come back as bare paths, external ones as
/// `locator#/path`. Anything that does not fit one of the branches is
/// returned unchanged.
pub fn resolve(reference: &str, origin: OriginKind, target: AddressScheme) -> String {
    let Some((locator, fragment)) = split_reference(reference, origin) else {
        return reference.to_string();
    };

    let address = match target {
        AddressScheme::Swagger => ReferenceAddress::from_model_fragment(locator, fragment),
        AddressScheme::Model => ReferenceAddress::from_swagger_fragment(locator, fragment),
    };

    match address {
        Some(address) => {
            let path = match target {
                AddressScheme::Swagger => address.to_swagger_path(),
                AddressScheme::Model => address.to_model_path(),
            };
            address.render(path)
        }
        None => reference.to_string(),
    }
}

/// Swagger pointer to a model path, using `document` to find the referenced
/// parameter.
///
/// A parameter found in the document is addressed by its name inside the
/// bucket of its location (`path` when the location is missing); the body
/// parameter's node is its schema, so a leading `schema` segment is dropped.
/// Parameters the document does not hold fall back to the body bucket.
pub fn resolve_in_document(reference: &str, document: &Value) -> String {
    let origin = OriginKind::classify(reference);
    let Some((locator, fragment)) = split_reference(reference, origin) else {
        return reference.to_string();
    };
    let Some(mut address) = ReferenceAddress::from_swagger_fragment(locator, fragment) else {
        return reference.to_string();
    };

    if let Branch::Parameter {
        container,
        operation,
        index,
        bucket,
    } = &mut address.branch
    {
        let parameter = document
            .get("paths")
            .and_then(|paths| paths.get(decode_token(container)))
            .and_then(|item| item.get(decode_token(operation)))
            .and_then(|operation| operation.get("parameters"))
            .and_then(|parameters| parameters.get(*index));

        if let Some(parameter) = parameter {
            let location = parameter
                .get("in")
                .and_then(Value::as_str)
                .unwrap_or(ParameterLocation::Path.as_str());
            if location == ParameterLocation::Body.as_str()
                && address.segments.first().map(String::as_str) == Some("schema")
            {
                address.segments.remove(0);
            }
            if let Some(name) = parameter.get("name").and_then(Value::as_str) {
                address.segments.insert(0, name.to_string());
            }
            *bucket = Some(location.to_string());
        }
    }

    let path = address.to_model_path();
    address.render(path)
}

/// Pointer inside a plain JSON Schema document.
///
/// Only model definitions differ: `definitions/properties/X` addresses
/// `definitions/X`.
pub fn json_schema_pointer(relative: &str) -> String {
    let segments = split(relative);
    if segments.len() >= 2 && segments[0] == "definitions" && segments[1] == PROPERTIES {
        let mut rest = vec![segments[0].clone()];
        rest.extend(segments[2..].iter().cloned());
        return rest.join("/");
    }
    segments.join("/")
}

// Split a reference into its locator and the fragment after `#/`, dropping a
// `#model/` scope prefix.
fn split_reference(reference: &str, origin: OriginKind) -> Option<(Option<&str>, &str)> {
    match origin {
        OriginKind::ModelLevel | OriginKind::Internal => {
            match reference.get(..7).zip(reference.get(7..)) {
                Some((prefix, rest)) if prefix.eq_ignore_ascii_case("#model/") => Some((None, rest)),
                _ => reference.strip_prefix("#/").map(|rest| (None, rest)),
            }
        }
        OriginKind::External => {
            let (locator, fragment) = reference.split_once("#/")?;
            Some((Some(locator).filter(|locator| !locator.is_empty()), fragment))
        }
    }
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

// JSON pointer token; `%2F` is how the model spells slashes in container names.
fn decode_token(token: &str) -> String {
    token.replace("~1", "/").replace("%2F", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn to_model(reference: &str) -> String {
        resolve(reference, OriginKind::classify(reference), AddressScheme::Model)
    }

    fn to_swagger(reference: &str) -> String {
        resolve(reference, OriginKind::classify(reference), AddressScheme::Swagger)
    }

    #[test]
    fn test_definitions_resolve_regardless_of_origin() {
        for origin in [OriginKind::Internal, OriginKind::ModelLevel, OriginKind::External] {
            assert_eq!(
                resolve("#/definitions/Foo/bar", origin, AddressScheme::Model),
                "definitions/Foo/bar"
            );
        }
        assert_eq!(to_model("#/definitions/Foo/bar"), "definitions/Foo/bar");
        assert_eq!(to_model("#model/definitions/Foo/bar"), "definitions/Foo/bar");
    }

    #[test]
    fn test_response_header_to_model() {
        assert_eq!(
            to_model("#/paths/Pets/get/responses/200/headers/X-Rate-Limit"),
            "Pets/get/properties/headers/properties/X-Rate-Limit"
        );
    }

    #[test]
    fn test_body_parameter_to_model() {
        assert_eq!(
            to_model("#/paths/Pets/get/parameters/0/schema/properties/name"),
            "Pets/get/properties/body/properties/schema/properties/name"
        );
    }

    #[test]
    fn test_response_schema_to_model() {
        assert_eq!(
            to_model("#/paths/Pets/get/responses/200/schema/properties/id"),
            "Pets/get/200/properties/body/properties/schema/properties/id"
        );
    }

    #[test]
    fn test_request_to_swagger() {
        assert_eq!(
            to_swagger("#/Pets/get/properties/body/properties/schema/properties/name"),
            "paths/Pets/get/parameters/0/schema/properties/name"
        );
        assert_eq!(
            to_swagger("#model/Pets/post/properties/query/properties/limit"),
            "paths/Pets/post/parameters/0"
        );
    }

    #[test]
    fn test_response_to_swagger() {
        assert_eq!(
            to_swagger("#/Pets/get/200/properties/body/properties/schema/properties/id"),
            "paths/Pets/get/responses/200/schema/properties/id"
        );
        assert_eq!(
            to_swagger("#/Pets/get/200/properties/headers/properties/X-Rate-Limit"),
            "paths/Pets/get/responses/200/headers/X-Rate-Limit"
        );
    }

    #[test]
    fn test_definitions_to_swagger() {
        assert_eq!(to_swagger("#/definitions/properties/Pet"), "definitions/Pet");
        assert_eq!(to_swagger("#/definitions/Pet/properties/id"), "definitions/Pet/properties/id");
    }

    #[test]
    fn test_external_locator_is_kept() {
        assert_eq!(
            to_swagger("file://specs/pets.yaml#/Pets/get/200/properties/body/properties/schema"),
            "file://specs/pets.yaml#/paths/Pets/get/responses/200/schema"
        );
        assert_eq!(
            to_model("pets.json#/paths/Pets/get/responses/200/headers/X-Id"),
            "pets.json#/Pets/get/properties/headers/properties/X-Id"
        );
    }

    #[test]
    fn test_unresolvable_references_are_unchanged() {
        assert_eq!(to_model("#/parameters/limit"), "#/parameters/limit");
        assert_eq!(to_model("#/paths/Pets/get/responses/200/examples"), "#/paths/Pets/get/responses/200/examples");
        assert_eq!(to_model("pets.json"), "pets.json");
        assert_eq!(to_swagger("#/Pets"), "#/Pets");
        assert_eq!(
            to_swagger("#/Pets/get/properties/headers/properties/X-Rate-Limit"),
            "#/Pets/get/properties/headers/properties/X-Rate-Limit"
        );
    }

    #[test]
    fn test_swagger_model_swagger_for_body_schema() {
        let swagger = "#/paths/Pets/get/parameters/0/schema/properties/name";
        let model = format!("#/{}", to_model(swagger));
        assert_eq!(format!("#/{}", to_swagger(&model)), swagger);

        let swagger = "#/paths/Pets/get/responses/201/schema/items";
        let model = format!("#/{}", to_model(swagger));
        assert_eq!(format!("#/{}", to_swagger(&model)), swagger);
    }

    #[test]
    fn test_resolve_in_document_uses_parameter_location() {
        let document = json!({
            "paths": {
                "/pets": {
                    "get": {
                        "parameters": [
                            { "name": "limit", "in": "query", "type": "integer" },
                            { "name": "pet", "in": "body", "schema": { "type": "object" } },
                            { "name": "id", "type": "string" }
                        ]
                    }
                }
            }
        });
        assert_eq!(
            resolve_in_document("#/paths/~1pets/get/parameters/0", &document),
            "~1pets/get/properties/query/properties/limit"
        );
        assert_eq!(
            resolve_in_document("#/paths/~1pets/get/parameters/0/items", &document),
            "~1pets/get/properties/query/properties/limit/items"
        );
        assert_eq!(
            resolve_in_document("#/paths/~1pets/get/parameters/1/schema/properties/name", &document),
            "~1pets/get/properties/body/properties/pet/properties/name"
        );
        assert_eq!(
            resolve_in_document("#/paths/~1pets/get/parameters/2", &document),
            "~1pets/get/properties/path/properties/id"
        );
        assert_eq!(
            resolve_in_document("#/paths/~1pets/get/parameters/7/schema", &document),
            "~1pets/get/properties/body/properties/schema"
        );
    }

    #[test]
    fn test_json_schema_pointer() {
        assert_eq!(json_schema_pointer("definitions/properties/Pet"), "definitions/Pet");
        assert_eq!(json_schema_pointer("properties/id/items"), "properties/id/items");
    }
}
