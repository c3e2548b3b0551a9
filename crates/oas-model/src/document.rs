//! Root document, paths, operations, and content model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::security::{SecurityRequirement, SecurityScheme};
use crate::{Any, RefOr, Schema};

/// The root object of an OpenAPI 3.0 document.
///
/// Unknown root keys (`servers`, `externalDocs`, vendor `x-…` extensions)
/// are captured in `extensions` and round-trip untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// OpenAPI specification version, e.g. `3.0.1`.
    #[serde(default)]
    pub openapi: String,
    /// API metadata.
    #[serde(default)]
    pub info: Info,
    /// Path templates and their operations, in document order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub paths: IndexMap<String, PathItem>,
    /// Reusable components.
    pub components: Option<Components>,
    /// Document-level security requirements.
    pub security: Option<Vec<SecurityRequirement>>,
    /// Tag metadata.
    pub tags: Option<Vec<Tag>>,
    /// Every root key the model does not represent structurally.
    #[serde(flatten, skip_serializing_if = "IndexMap::is_empty", default)]
    pub extensions: IndexMap<String, Any>,
}

impl Document {
    /// The components block, created on first use.
    pub fn components_mut(&mut self) -> &mut Components {
        self.components.get_or_insert_with(Components::default)
    }

    /// The component schema map, if the document has one.
    pub fn schemas(&self) -> Option<&IndexMap<String, RefOr<Schema>>> {
        self.components.as_ref().map(|components| &components.schemas)
    }

    /// The component schema map, created on first use.
    pub fn schemas_mut(&mut self) -> &mut IndexMap<String, RefOr<Schema>> {
        &mut self.components_mut().schemas
    }

    /// Names currently taken in `components.schemas`.
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas()
            .map(|schemas| schemas.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every operation in the document, with its path and method.
    pub fn operations(&self) -> impl Iterator<Item = (&str, Method, &Operation)> + '_ {
        self.paths.iter().flat_map(|(path, item)| {
            item.operations()
                .map(move |(method, operation)| (path.as_str(), method, operation))
        })
    }
}

/// API metadata (`info`).
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title.
    #[serde(default)]
    pub title: String,
    /// API description.
    pub description: Option<String>,
    /// Document version string.
    #[serde(default)]
    pub version: String,
    /// Remaining `info` keys (contact, license, terms of service, `x-…`).
    #[serde(flatten, skip_serializing_if = "IndexMap::is_empty", default)]
    pub extensions: IndexMap<String, Any>,
}

/// Reusable component maps. All maps keep document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Named schemas.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, RefOr<Schema>>,
    /// Named responses.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub responses: IndexMap<String, RefOr<Response>>,
    /// Named parameters.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, RefOr<Parameter>>,
    /// Named examples.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub examples: IndexMap<String, Any>,
    /// Named request bodies.
    #[serde(
        rename = "requestBodies",
        default,
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub request_bodies: IndexMap<String, RefOr<RequestBody>>,
    /// Named headers.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, RefOr<Header>>,
    /// Named security schemes.
    #[serde(
        rename = "securitySchemes",
        default,
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub security_schemes: IndexMap<String, RefOr<SecurityScheme>>,
}

/// An HTTP method key of a path item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `get`
    Get,
    /// `post`
    Post,
    /// `put`
    Put,
    /// `patch`
    Patch,
    /// `delete`
    Delete,
    /// `head`
    Head,
    /// `options`
    Options,
    /// `trace`
    Trace,
}

impl Method {
    /// Every method, in the order operations are visited.
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
        Self::Trace,
    ];

    /// The lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
            Self::Trace => "trace",
        }
    }
}

/// Operations and shared metadata of a single path template.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    /// Summary applying to all operations on the path.
    pub summary: Option<String>,
    /// Description applying to all operations on the path.
    pub description: Option<String>,
    /// Parameters shared by every operation on the path.
    pub parameters: Option<Vec<RefOr<Parameter>>>,
    /// GET operation.
    pub get: Option<Operation>,
    /// POST operation.
    pub post: Option<Operation>,
    /// PUT operation.
    pub put: Option<Operation>,
    /// PATCH operation.
    pub patch: Option<Operation>,
    /// DELETE operation.
    pub delete: Option<Operation>,
    /// HEAD operation.
    pub head: Option<Operation>,
    /// OPTIONS operation.
    pub options: Option<Operation>,
    /// TRACE operation.
    pub trace: Option<Operation>,
}

impl PathItem {
    /// The operation for `method`, if defined.
    pub const fn operation(&self, method: Method) -> Option<&Operation> {
        match method {
            Method::Get => self.get.as_ref(),
            Method::Post => self.post.as_ref(),
            Method::Put => self.put.as_ref(),
            Method::Patch => self.patch.as_ref(),
            Method::Delete => self.delete.as_ref(),
            Method::Head => self.head.as_ref(),
            Method::Options => self.options.as_ref(),
            Method::Trace => self.trace.as_ref(),
        }
    }

    /// Mutable access to the operation for `method`, if defined.
    pub fn operation_mut(&mut self, method: Method) -> Option<&mut Operation> {
        match method {
            Method::Get => self.get.as_mut(),
            Method::Post => self.post.as_mut(),
            Method::Put => self.put.as_mut(),
            Method::Patch => self.patch.as_mut(),
            Method::Delete => self.delete.as_mut(),
            Method::Head => self.head.as_mut(),
            Method::Options => self.options.as_mut(),
            Method::Trace => self.trace.as_mut(),
        }
    }

    /// Defined operations, in [`Method::ALL`] order.
    pub fn operations(&self) -> impl Iterator<Item = (Method, &Operation)> + '_ {
        Method::ALL
            .into_iter()
            .filter_map(|method| self.operation(method).map(|operation| (method, operation)))
    }

    /// Defined operations, mutable, in [`Method::ALL`] order.
    pub fn operations_mut(&mut self) -> impl Iterator<Item = (Method, &mut Operation)> + '_ {
        [
            (Method::Get, self.get.as_mut()),
            (Method::Post, self.post.as_mut()),
            (Method::Put, self.put.as_mut()),
            (Method::Patch, self.patch.as_mut()),
            (Method::Delete, self.delete.as_mut()),
            (Method::Head, self.head.as_mut()),
            (Method::Options, self.options.as_mut()),
            (Method::Trace, self.trace.as_mut()),
        ]
        .into_iter()
        .filter_map(|(method, operation)| operation.map(|operation| (method, operation)))
    }
}

/// A single API operation.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Tags for documentation grouping.
    pub tags: Option<Vec<String>>,
    /// Short summary.
    pub summary: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Unique operation identifier.
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
    /// Operation parameters.
    pub parameters: Option<Vec<RefOr<Parameter>>>,
    /// Request body.
    #[serde(rename = "requestBody")]
    pub request_body: Option<RefOr<RequestBody>>,
    /// Responses by status code.
    #[serde(default, skip_serializing_if = "Responses::is_empty")]
    pub responses: Responses,
    /// Deprecation flag.
    pub deprecated: Option<bool>,
    /// Operation-level security requirements.
    pub security: Option<Vec<SecurityRequirement>>,
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path template variable.
    Path,
    /// Query string.
    Query,
    /// HTTP header.
    Header,
    /// Cookie.
    Cookie,
}

/// A single operation parameter.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter location.
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Parameter description.
    pub description: Option<String>,
    /// Whether the parameter must be supplied.
    pub required: Option<bool>,
    /// Value schema.
    pub schema: Option<RefOr<Schema>>,
    /// Media-type keyed content, mutually exclusive with `schema`.
    pub content: Option<IndexMap<String, MediaType>>,
    /// Example value.
    pub example: Option<Any>,
}

impl Parameter {
    /// A required string path parameter.
    pub fn path(name: &str) -> Self {
        Self {
            name: name.to_string(),
            location: ParameterLocation::Path,
            description: None,
            required: Some(true),
            schema: Some(RefOr::Item(Schema::string())),
            content: None,
            example: None,
        }
    }
}

/// A request payload.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Request body description.
    pub description: Option<String>,
    /// Whether a body must be supplied.
    pub required: Option<bool>,
    /// Payload variants keyed by media type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// The response map of an operation.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Responses {
    /// Catch-all response.
    pub default: Option<RefOr<Response>>,
    /// Responses keyed by status code or range alias (`200`, `4XX`).
    #[serde(flatten, default, skip_serializing_if = "IndexMap::is_empty")]
    pub statuses: IndexMap<String, RefOr<Response>>,
}

impl Responses {
    /// Whether no response is declared at all.
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.statuses.is_empty()
    }

    /// Every declared response slot, mutable: the `default` entry first,
    /// then statuses in document order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut RefOr<Response>)> + '_ {
        self.default
            .as_mut()
            .map(|response| ("default", response))
            .into_iter()
            .chain(
                self.statuses
                    .iter_mut()
                    .map(|(status, response)| (status.as_str(), response)),
            )
    }
}

/// A single response.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response description; required by the specification.
    #[serde(default)]
    pub description: String,
    /// Response headers.
    pub headers: Option<IndexMap<String, RefOr<Header>>>,
    /// Payload variants keyed by media type.
    pub content: Option<IndexMap<String, MediaType>>,
}

/// Schema and examples for one media type.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    /// Payload schema.
    pub schema: Option<RefOr<Schema>>,
    /// Example payload.
    pub example: Option<Any>,
    /// Named example payloads.
    pub examples: Option<IndexMap<String, Any>>,
}

/// A response header.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Header description.
    pub description: Option<String>,
    /// Whether the header is always present.
    pub required: Option<bool>,
    /// Value schema.
    pub schema: Option<RefOr<Schema>>,
}

/// Tag metadata referenced by operations.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Tag description.
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_doc() -> Document {
        serde_yaml_ng::from_str(
            r"
openapi: 3.0.1
info:
  title: Pets
  version: 1.0.0
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        '200':
          description: OK
    post:
      operationId: createPet
      responses:
        '201':
          description: Created
components:
  schemas:
    Pet:
      type: object
      properties:
        name:
          type: string
",
        )
        .unwrap()
    }

    #[test]
    fn operations_iterate_in_method_order() {
        let doc = sample_doc();
        let ids: Vec<&str> = doc
            .operations()
            .filter_map(|(_, _, op)| op.operation_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["listPets", "createPet"]);
    }

    #[test]
    fn unknown_root_keys_round_trip_through_extensions() {
        let doc: Document = serde_yaml_ng::from_str(
            r"
openapi: 3.0.1
info:
  title: T
  version: '1'
servers:
  - url: https://api.example.com
x-internal: true
",
        )
        .unwrap();
        assert!(doc.extensions.contains_key("servers"));
        assert!(doc.extensions.contains_key("x-internal"));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["servers"][0]["url"], "https://api.example.com");
    }

    #[test]
    fn missing_response_description_defaults_to_empty() {
        let response: Response = serde_yaml_ng::from_str("content: {}").unwrap();
        assert_eq!(response.description, "");
    }

    #[test]
    fn responses_flatten_keeps_status_order() {
        let responses: Responses = serde_yaml_ng::from_str(
            r"
'404':
  description: Not Found
'200':
  description: OK
",
        )
        .unwrap();
        let statuses: Vec<&str> = responses.statuses.keys().map(String::as_str).collect();
        assert_eq!(statuses, vec!["404", "200"]);
    }
}
