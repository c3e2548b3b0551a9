//! Security schemes and requirements.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A reusable security scheme under `components.securitySchemes`.
///
/// Modeled loosely: the normalizer only ever injects an HTTP bearer scheme
/// and otherwise carries schemes through untouched, so the variant-specific
/// fields are plain options rather than a tagged enum.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    /// `http`, `apiKey`, `oauth2`, or `openIdConnect`.
    #[serde(rename = "type", default)]
    pub scheme_type: String,
    /// HTTP authorization scheme name (`bearer`, `basic`).
    pub scheme: Option<String>,
    /// Bearer token format hint.
    #[serde(rename = "bearerFormat")]
    pub bearer_format: Option<String>,
    /// Scheme description.
    pub description: Option<String>,
    /// Header / query / cookie name for `apiKey` schemes.
    pub name: Option<String>,
    /// Location for `apiKey` schemes.
    #[serde(rename = "in")]
    pub location: Option<String>,
    /// Remaining scheme keys (OAuth flows, OpenID Connect URL).
    #[serde(flatten, skip_serializing_if = "IndexMap::is_empty", default)]
    pub extensions: IndexMap<String, serde_json::Value>,
}

impl SecurityScheme {
    /// An `http` bearer scheme.
    pub fn bearer() -> Self {
        Self {
            scheme_type: "http".to_string(),
            scheme: Some("bearer".to_string()),
            bearer_format: Some("JWT".to_string()),
            ..Self::default()
        }
    }
}

/// A security requirement: scheme name to required scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityRequirement {
    /// Scheme names mapped to their scope lists.
    pub schemes: IndexMap<String, Vec<String>>,
}

impl SecurityRequirement {
    /// A requirement on a single scheme with no scopes.
    pub fn scheme(name: &str) -> Self {
        Self {
            schemes: IndexMap::from([(name.to_string(), Vec::new())]),
        }
    }
}
