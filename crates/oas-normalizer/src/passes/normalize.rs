//! Deep schema normalization: the pile of small, idempotent repairs applied
//! after structural rewriting — titles, formats, status aliases, media
//! types, response descriptions, enum typing, and discriminator hygiene —
//! plus YAML-unsafe description quoting and the pre-serialization string
//! scrub.

use std::collections::HashSet;

use indexmap::IndexMap;
use oas_model::{
    Any, Document, MediaType, RefOr, Responses, Schema, SCHEMA_REF_PREFIX,
};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::walk;

/// Run the whole stage-4 normalization family in a fixed order.
pub fn apply_schema_normalizations(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    default_component_titles(doc, cancel)?;
    canonicalize_formats(doc, cancel)?;
    inject_object_type_for_untyped(doc, cancel)?;
    ensure_discriminator_property(doc, cancel)?;
    alias_response_statuses(doc, cancel)?;
    ensure_response_descriptions(doc, cancel)?;
    canonicalize_media_types(doc, cancel)?;
    normalize_empty_components(doc, cancel)?;
    infer_enum_types(doc, cancel)?;
    validate_discriminators(doc, cancel)?;
    quote_yaml_unsafe_descriptions(doc, cancel)
}

/// Give untitled component schemas their component key as a title.
fn default_component_titles(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let Some(components) = doc.components.as_mut() else {
        return Ok(());
    };
    for (name, slot) in &mut components.schemas {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let RefOr::Item(schema) = slot {
            if schema.title.is_none() {
                schema.title = Some(name.clone());
            }
        }
    }
    Ok(())
}

/// Repair format spellings generators reject: `datetime` → `date-time`,
/// `uuid4` → `uuid`.
fn canonicalize_formats(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        match schema.format.as_deref() {
            Some("datetime") => schema.format = Some("date-time".to_string()),
            Some("uuid4") => schema.format = Some("uuid".to_string()),
            _ => {}
        }
        Ok(())
    })
}

/// Set `type: object` on typeless schemas that are clearly object-shaped:
/// they declare properties, additional properties, an `allOf`, or an inline
/// object composition branch. Enum-bearing schemas are typed by their enum
/// and stay untouched.
fn inject_object_type_for_untyped(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        if schema.schema_type.is_some() || schema.has_enum() {
            return Ok(());
        }
        let composed = schema
            .all_of
            .as_ref()
            .is_some_and(|all_of| !all_of.is_empty());
        if composed || schema.looks_object_like() {
            schema.schema_type = Some("object".to_string());
        }
        Ok(())
    })
}

/// Every schema with a discriminator carries the discriminator property in
/// `properties` and `required`.
fn ensure_discriminator_property(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        let Some(property_name) = schema
            .discriminator
            .as_ref()
            .map(|discriminator| discriminator.property_name.clone())
        else {
            return Ok(());
        };
        schema
            .properties
            .get_or_insert_with(IndexMap::new)
            .entry(property_name.clone())
            .or_insert_with(|| RefOr::Item(Schema::string()));
        schema.require(&property_name);
        Ok(())
    })
}

/// Uppercase lowercase status range aliases: `4xx` → `4XX`.
fn alias_response_statuses(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    for (_, item) in &mut doc.paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for (_, operation) in item.operations_mut() {
            alias_statuses(&mut operation.responses);
        }
    }
    Ok(())
}

fn alias_statuses(responses: &mut Responses) {
    let needs_alias = responses
        .statuses
        .keys()
        .any(|status| is_lowercase_range(status));
    if !needs_alias {
        return;
    }
    let statuses = std::mem::take(&mut responses.statuses);
    for (status, response) in statuses {
        let key = if is_lowercase_range(&status) {
            status.to_uppercase()
        } else {
            status
        };
        if responses.statuses.contains_key(&key) {
            tracing::warn!(%key, "duplicate response status after range aliasing; keeping first");
            continue;
        }
        responses.statuses.insert(key, response);
    }
}

/// `4xx`, `4xX`, … — a digit 1-5 followed by two `x`s, not already uppercase.
fn is_lowercase_range(status: &str) -> bool {
    let bytes = status.as_bytes();
    bytes.len() == 3
        && (b'1'..=b'5').contains(&bytes[0])
        && bytes[1].eq_ignore_ascii_case(&b'x')
        && bytes[2].eq_ignore_ascii_case(&b'x')
        && status != format!("{}XX", &status[..1])
}

/// Fill empty response descriptions with a status-derived phrase.
fn ensure_response_descriptions(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    if let Some(components) = doc.components.as_mut() {
        for (name, response) in &mut components.responses {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let RefOr::Item(response) = response {
                if response.description.trim().is_empty() {
                    response.description = format!("{name} response");
                }
            }
        }
    }
    for (_, item) in &mut doc.paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for (_, operation) in item.operations_mut() {
            for (status, response) in operation.responses.iter_mut() {
                if let RefOr::Item(response) = response {
                    if response.description.trim().is_empty() {
                        response.description = status_phrase(status).to_string();
                    }
                }
            }
        }
    }
    Ok(())
}

/// A human-readable phrase for a status code key.
fn status_phrase(status: &str) -> &'static str {
    match status {
        "200" => "OK",
        "201" => "Created",
        "202" => "Accepted",
        "204" => "No Content",
        "400" => "Bad Request",
        "401" => "Unauthorized",
        "403" => "Forbidden",
        "404" => "Not Found",
        "409" => "Conflict",
        "500" => "Internal Server Error",
        "default" => "Default response",
        _ => "Response",
    }
}

/// Lowercase media type keys and strip parameters (`; charset=…`).
/// Collisions keep the first occurrence.
fn canonicalize_media_types(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    if let Some(components) = doc.components.as_mut() {
        for body in components.request_bodies.values_mut() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let RefOr::Item(body) = body {
                canonicalize_content(&mut body.content);
            }
        }
        for response in components.responses.values_mut() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let RefOr::Item(response) = response {
                if let Some(content) = response.content.as_mut() {
                    canonicalize_content(content);
                }
            }
        }
    }
    for (_, item) in &mut doc.paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for (_, operation) in item.operations_mut() {
            if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                canonicalize_content(&mut body.content);
            }
            for (_, response) in operation.responses.iter_mut() {
                if let RefOr::Item(response) = response {
                    if let Some(content) = response.content.as_mut() {
                        canonicalize_content(content);
                    }
                }
            }
        }
    }
    Ok(())
}

fn canonicalize_content(content: &mut IndexMap<String, MediaType>) {
    let needs_work = content.keys().any(|media| canonical_media(media) != *media);
    if !needs_work {
        return;
    }
    let entries = std::mem::take(content);
    for (media, media_type) in entries {
        let canonical = canonical_media(&media);
        if content.contains_key(&canonical) {
            tracing::warn!(%media, %canonical, "duplicate media type after canonicalization; keeping first");
            continue;
        }
        content.insert(canonical, media_type);
    }
}

fn canonical_media(media: &str) -> String {
    media
        .split(';')
        .next()
        .unwrap_or(media)
        .trim()
        .to_lowercase()
}

/// Empty component schemas serialize as `{}`, which generators refuse;
/// make them explicit objects.
fn normalize_empty_components(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let Some(components) = doc.components.as_mut() else {
        return Ok(());
    };
    for slot in components.schemas.values_mut() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let RefOr::Item(schema) = slot {
            if schema.is_empty() && schema.schema_type.is_none() {
                schema.schema_type = Some("object".to_string());
            }
        }
    }
    Ok(())
}

/// Type enum-bearing schemas from their element kinds when homogeneous.
fn infer_enum_types(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        if schema.schema_type.is_some() || !schema.has_enum() {
            return Ok(());
        }
        let Some(enum_values) = schema.enum_values.as_ref() else {
            return Ok(());
        };
        let inferred = infer_kind(enum_values);
        if let Some(inferred) = inferred {
            schema.schema_type = Some(inferred.to_string());
        }
        Ok(())
    })
}

/// The schema type implied by homogeneous enum element kinds, if any.
pub(crate) fn infer_kind(values: &[Any]) -> Option<&'static str> {
    let mut inferred: Option<&'static str> = None;
    for value in values {
        let kind = match value {
            Any::Null => continue,
            Any::String(_) => "string",
            Any::Bool(_) => "boolean",
            Any::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Any::Number(_) => "number",
            _ => return None,
        };
        inferred = match (inferred, kind) {
            (None, kind) => Some(kind),
            (Some(seen), kind) if seen == kind => Some(seen),
            // Mixed integer/number enums are still numeric.
            (Some("integer"), "number") | (Some("number"), "integer") => Some("number"),
            _ => return None,
        };
    }
    inferred
}

/// Drop discriminator mapping entries whose target does not resolve.
fn validate_discriminators(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let known: HashSet<String> = doc
        .schema_names()
        .into_iter()
        .collect();

    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        let Some(mapping) = schema
            .discriminator
            .as_mut()
            .and_then(|discriminator| discriminator.mapping.as_mut())
        else {
            return Ok(());
        };
        mapping.retain(|key, target| {
            let valid = target
                .strip_prefix(SCHEMA_REF_PREFIX)
                .is_some_and(|name| known.contains(name));
            if !valid {
                tracing::warn!(%location, %key, %target, "dropped discriminator mapping entry with unresolved target");
            }
            valid
        });
        Ok(())
    })
}

/// Wrap colon-hazardous descriptions and summaries in double quotes so the
/// emitted document survives a YAML round-trip.
pub fn quote_yaml_unsafe_descriptions(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    quote_unsafe(&mut doc.info.description);
    quote_unsafe_string(&mut doc.info.title);

    if let Some(components) = doc.components.as_mut() {
        for parameter in components.parameters.values_mut() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let RefOr::Item(parameter) = parameter {
                quote_unsafe(&mut parameter.description);
            }
        }
        for body in components.request_bodies.values_mut() {
            if let RefOr::Item(body) = body {
                quote_unsafe(&mut body.description);
            }
        }
        for response in components.responses.values_mut() {
            if let RefOr::Item(response) = response {
                quote_unsafe_string(&mut response.description);
            }
        }
    }

    for (_, item) in &mut doc.paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        quote_unsafe(&mut item.summary);
        quote_unsafe(&mut item.description);
        for (_, operation) in item.operations_mut() {
            quote_unsafe(&mut operation.summary);
            quote_unsafe(&mut operation.description);
            if let Some(parameters) = operation.parameters.as_mut() {
                for parameter in parameters.iter_mut() {
                    if let RefOr::Item(parameter) = parameter {
                        quote_unsafe(&mut parameter.description);
                    }
                }
            }
            if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                quote_unsafe(&mut body.description);
            }
            for (_, response) in operation.responses.iter_mut() {
                if let RefOr::Item(response) = response {
                    quote_unsafe_string(&mut response.description);
                }
            }
        }
    }

    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(schema) = slot.as_item_mut() {
            quote_unsafe(&mut schema.description);
        }
        Ok(())
    })
}

fn quote_unsafe(value: &mut Option<String>) {
    if let Some(value) = value.as_mut() {
        quote_unsafe_string(value);
    }
}

fn quote_unsafe_string(value: &mut String) {
    if !needs_quoting(value) {
        return;
    }
    *value = format!("\"{}\"", value.replace('"', "\\\""));
}

fn needs_quoting(value: &str) -> bool {
    let already_quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if already_quoted || value.is_empty() {
        return false;
    }
    value.contains(": ") || value.starts_with(':') || value.ends_with(':')
}

/// Strip control characters (other than `\n`, `\r`, `\t`) from every string
/// the serializer will emit.
pub fn clean_document_for_serialization(doc: &mut Document) {
    clean_opt(&mut doc.info.description);
    clean_string(&mut doc.info.title);
    clean_string(&mut doc.info.version);
    if let Some(tags) = doc.tags.as_mut() {
        for tag in tags.iter_mut() {
            clean_string(&mut tag.name);
            clean_opt(&mut tag.description);
        }
    }

    if let Some(components) = doc.components.as_mut() {
        for parameter in components.parameters.values_mut() {
            if let RefOr::Item(parameter) = parameter {
                clean_opt(&mut parameter.description);
            }
        }
        for body in components.request_bodies.values_mut() {
            if let RefOr::Item(body) = body {
                clean_opt(&mut body.description);
            }
        }
        for response in components.responses.values_mut() {
            if let RefOr::Item(response) = response {
                clean_string(&mut response.description);
            }
        }
    }

    for (_, item) in &mut doc.paths {
        clean_opt(&mut item.summary);
        clean_opt(&mut item.description);
        for (_, operation) in item.operations_mut() {
            clean_opt(&mut operation.summary);
            clean_opt(&mut operation.description);
            if let Some(parameters) = operation.parameters.as_mut() {
                for parameter in parameters.iter_mut() {
                    if let RefOr::Item(parameter) = parameter {
                        clean_opt(&mut parameter.description);
                        if let Some(example) = parameter.example.as_mut() {
                            clean_value(example);
                        }
                    }
                }
            }
            if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                clean_opt(&mut body.description);
            }
            for (_, response) in operation.responses.iter_mut() {
                if let RefOr::Item(response) = response {
                    clean_string(&mut response.description);
                }
            }
        }
    }

    walk::for_each_schema_slot(doc, |_, slot| {
        let Some(schema) = slot.as_item_mut() else {
            return;
        };
        clean_opt(&mut schema.title);
        clean_opt(&mut schema.description);
        if let Some(default) = schema.default.as_mut() {
            clean_value(default);
        }
        if let Some(example) = schema.example.as_mut() {
            clean_value(example);
        }
        if let Some(enum_values) = schema.enum_values.as_mut() {
            for element in enum_values.iter_mut() {
                clean_value(element);
            }
        }
    });
}

fn clean_opt(value: &mut Option<String>) {
    if let Some(value) = value.as_mut() {
        clean_string(value);
    }
}

fn clean_string(value: &mut String) {
    if value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        *value = value
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
            .collect();
    }
}

/// Recursively strip control characters inside arbitrary JSON values.
fn clean_value(value: &mut Any) {
    match value {
        Any::String(s) => {
            if s.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t')) {
                *s = s
                    .chars()
                    .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
                    .collect();
            }
        }
        Any::Array(items) => {
            for item in items {
                clean_value(item);
            }
        }
        Any::Object(map) => {
            for (_, item) in map.iter_mut() {
                clean_value(item);
            }
        }
        _ => {}
    }
}
