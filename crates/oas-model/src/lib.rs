//! Typed OpenAPI 3.0 document graph for the oas-normalizer ecosystem.
//!
//! This crate owns the in-memory representation that the rewrite passes in
//! `oas-normalizer` mutate: the root [`Document`], the [`Schema`] tree with
//! its [`RefOr`] reference-or-inline wrapper, and the path/operation model.
//! It deliberately contains no rewriting logic — only the types, their serde
//! mappings, and cheap structural predicates the passes share.
//!
//! Maps are [`indexmap::IndexMap`] throughout, so iteration order is the
//! insertion order captured at load time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod document;
mod schema;
mod security;

pub use document::{
    Components, Document, Header, Info, MediaType, Method, Operation, Parameter,
    ParameterLocation, PathItem, RequestBody, Response, Responses, Tag,
};
pub use schema::{
    AdditionalProperties, Discriminator, RefOr, Reference, Schema, SCHEMA_REF_PREFIX,
};
pub use security::{SecurityRequirement, SecurityScheme};

/// Type alias for arbitrary JSON values carried by defaults, examples, and enums.
pub type Any = serde_json::Value;
