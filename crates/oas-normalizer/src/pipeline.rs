//! The fixed-order normalization pipeline.
//!
//! Stages are sequenced so later passes can rely on earlier invariants:
//!
//! - **Stage 0** (load): parse the source; salvage node-by-node when the
//!   document does not deserialize cleanly.
//! - **Stage 1** (identifiers): security schemes, conflicting paths,
//!   component names, schema/operation-id collisions, operation ids.
//!   Everything after this stage may assume valid, unique identifiers.
//! - **Stage 2** (references): retarget `#/paths/…` refs, then scrub.
//! - **Stage 3** (structural): primitive inlining, inline-schema
//!   promotion, discriminator synthesis, `allOf` override repairs. The
//!   scrub re-runs afterwards because promotion mints new references.
//! - **Stage 4** (deep normalization): the umbrella normalizations, value
//!   cleaning, default coercion, value-enum extraction, enum-branch
//!   promotion, and a final scrub.
//! - **Stage 5** (final): empty-subtree removal and the object-default
//!   stripper.
//! - **Stage 6** (serialize): string hygiene, JSON emission, the boolean
//!   post-fix, and a re-parse for diagnostics.

use std::path::Path;

use indexmap::IndexMap;
use oas_model::{Document, Info, PathItem};
use regex::Regex;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::passes::normalize::{apply_schema_normalizations, clean_document_for_serialization};
use crate::passes::{cleanup, defaults, extract, identifiers, polymorphism, primitives};
use crate::refs;

/// Read `source_path`, run the pipeline, and write the normalized JSON
/// document to `target_path`.
///
/// The source file is never modified; the target is written only when
/// serialization succeeds. Cancellation unwinds without writing.
///
/// # Errors
///
/// Returns [`Error::Io`] when either path cannot be read or written,
/// [`Error::Parse`] when the source yields no usable graph at all, and
/// [`Error::Cancelled`] on cooperative cancellation.
pub fn fix(source_path: &Path, target_path: &Path, cancel: &CancellationToken) -> Result<()> {
    let text = std::fs::read_to_string(source_path)?;
    let mut doc = parse_document(&text)?;
    normalize(&mut doc, cancel)?;
    let json = serialize(&mut doc)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    std::fs::write(target_path, json)?;
    Ok(())
}

/// Parse a YAML or JSON OpenAPI document.
///
/// A document that fails to deserialize as a whole is salvaged node by
/// node: unparseable paths and components are logged and skipped so the
/// pipeline can proceed with the partial graph.
pub fn parse_document(text: &str) -> Result<Document> {
    let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(text)?;
    match serde_yaml_ng::from_value::<Document>(value.clone()) {
        Ok(doc) => Ok(doc),
        Err(error) => {
            tracing::warn!(%error, "document did not deserialize cleanly; salvaging node by node");
            Ok(salvage_document(value))
        }
    }
}

/// Best-effort per-node conversion of a YAML value into the document graph.
fn salvage_document(value: serde_yaml_ng::Value) -> Document {
    let mut doc = Document::default();
    let serde_yaml_ng::Value::Mapping(mut root) = value else {
        tracing::warn!("document root is not a mapping; starting from an empty graph");
        return doc;
    };

    if let Some(openapi) = root.remove("openapi").as_ref().and_then(serde_yaml_ng::Value::as_str) {
        doc.openapi = openapi.to_string();
    }
    if let Some(info) = root.remove("info") {
        doc.info = convert(info, "info").unwrap_or_else(Info::default);
    }

    if let Some(serde_yaml_ng::Value::Mapping(paths)) = root.remove("paths") {
        for (key, item) in paths {
            let Some(path) = key.as_str().map(str::to_string) else {
                continue;
            };
            match convert::<PathItem>(item, &path) {
                Some(item) => {
                    doc.paths.insert(path, item);
                }
                None => tracing::warn!(%path, "skipped unparseable path item"),
            }
        }
    }

    if let Some(serde_yaml_ng::Value::Mapping(mut components)) = root.remove("components") {
        let target = doc.components_mut();
        target.schemas = salvage_map(components.remove("schemas"), "components.schemas");
        target.responses = salvage_map(components.remove("responses"), "components.responses");
        target.parameters = salvage_map(components.remove("parameters"), "components.parameters");
        target.examples = salvage_map(components.remove("examples"), "components.examples");
        target.request_bodies =
            salvage_map(components.remove("requestBodies"), "components.requestBodies");
        target.headers = salvage_map(components.remove("headers"), "components.headers");
        target.security_schemes =
            salvage_map(components.remove("securitySchemes"), "components.securitySchemes");
    }

    if let Some(security) = root.remove("security") {
        doc.security = convert(security, "security");
    }
    if let Some(tags) = root.remove("tags") {
        doc.tags = convert(tags, "tags");
    }
    for (key, value) in root {
        let Some(key) = key.as_str().map(str::to_string) else {
            continue;
        };
        if let Ok(value) = serde_json::to_value(&value) {
            doc.extensions.insert(key, value);
        }
    }

    doc
}

fn convert<T: DeserializeOwned>(value: serde_yaml_ng::Value, what: &str) -> Option<T> {
    match serde_yaml_ng::from_value(value) {
        Ok(converted) => Some(converted),
        Err(error) => {
            tracing::warn!(%what, %error, "skipped unparseable node");
            None
        }
    }
}

fn salvage_map<T: DeserializeOwned>(
    value: Option<serde_yaml_ng::Value>,
    what: &str,
) -> IndexMap<String, T> {
    let mut map = IndexMap::new();
    let Some(serde_yaml_ng::Value::Mapping(entries)) = value else {
        return map;
    };
    for (key, entry) in entries {
        let Some(name) = key.as_str().map(str::to_string) else {
            continue;
        };
        if let Some(entry) = convert(entry, &format!("{what}.{name}")) {
            map.insert(name, entry);
        }
    }
    map
}

/// Run the in-memory pipeline: stages 1–5 of the fixed sequence.
///
/// # Errors
///
/// Only [`Error::Cancelled`] — every pass is total.
pub fn normalize(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    // Stage 1: identifiers
    ensure_active(cancel)?;
    identifiers::ensure_security_schemes(doc);
    identifiers::rename_conflicting_paths(doc);
    identifiers::rename_invalid_component_schemas(doc, cancel)?;
    identifiers::resolve_schema_operation_name_collisions(doc, cancel)?;
    identifiers::ensure_unique_operation_ids(doc);

    // Stage 2: references
    refs::retarget_path_example_refs(doc, cancel)?;
    let broken = refs::scrub_all(doc, cancel)?;
    if broken > 0 {
        tracing::warn!(broken, "broken references before structural rewriting");
    }

    // Stage 3: structural rewriting. Multi-content disambiguation and
    // wrapper-collision fixes run before general extraction so their name
    // choices are not stolen by promoted schemas.
    primitives::inline_primitive_components(doc, cancel)?;
    extract::disambiguate_multi_content_request_schemas(doc, cancel)?;
    extract::fix_content_type_wrapper_collisions(doc, cancel)?;
    extract::extract_inline_array_item_schemas(doc, cancel)?;
    extract::extract_inline_schemas(doc, cancel)?;
    polymorphism::ensure_discriminator_for_oneof(doc, cancel)?;
    polymorphism::remove_shadowing_untyped_properties(doc, cancel)?;
    polymorphism::remove_redundant_derived_value(doc, cancel)?;
    refs::scrub_all(doc, cancel)?;

    // Stage 4: deep schema normalization
    apply_schema_normalizations(doc, cancel)?;
    defaults::deep_clean_schema(doc, cancel)?;
    cleanup::dedup_composition_branches(doc, cancel)?;
    cleanup::strip_empty_enum_branches(doc, cancel)?;
    defaults::fix_invalid_defaults(doc, cancel)?;
    polymorphism::fix_all_inline_value_enums(doc, cancel)?;
    polymorphism::promote_enum_branches_under_discriminator(doc, cancel)?;
    refs::scrub_all(doc, cancel)?;

    // Stage 5: final cleanup
    cleanup::remove_empty_inline_schemas(doc, cancel)?;
    defaults::remove_invalid_defaults(doc, cancel)?;

    Ok(())
}

/// Stage 6: string hygiene, JSON emission, boolean post-fix, and a
/// diagnostic re-parse of the output.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when the graph cannot be emitted as JSON.
pub fn serialize(doc: &mut Document) -> Result<String> {
    clean_document_for_serialization(doc);
    let json = serde_json::to_string_pretty(doc)?;
    let json = fix_serialized_booleans(&json);
    if let Err(error) = serde_json::from_str::<Document>(&json) {
        tracing::warn!(%error, "normalized output did not re-parse cleanly");
    }
    Ok(json)
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Lowercase whole-word `True`/`False` in JSON value positions — after `:`,
/// `,`, or `[`, and before `,`, `]`, or `}`.
///
/// Compensates for an upstream serializer that leaks Python-style booleans.
/// Adjacent matches share their boundary character, so the replacement
/// iterates to a fixpoint.
fn fix_serialized_booleans(json: &str) -> String {
    let pattern = Regex::new(r"([:,\[][ \t\r\n]*)(True|False)([ \t\r\n]*[,\]\}])")
        .expect("static pattern must compile");
    let mut current = json.to_string();
    loop {
        let replaced = pattern
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                format!("{}{}{}", &caps[1], caps[2].to_lowercase(), &caps[3])
            })
            .into_owned();
        if replaced == current {
            return current;
        }
        current = replaced;
    }
}
