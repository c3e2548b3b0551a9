//! Inline-schema promotion and the naming collisions it creates.
//!
//! - anonymous request/response media-type schemas become named components
//! - inline array `items` objects under components are promoted
//! - single-media parameter `content` collapses to a plain `schema`
//! - promoted names that collide with operation ids or generator-reserved
//!   wrapper names are renamed with references rewritten

use std::collections::HashSet;

use indexmap::IndexMap;
use oas_model::{Document, Parameter, RefOr, Schema};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::{naming, refs};

/// Promote component array-item schemas that are inline objects with
/// properties to `<parent>_item` components.
pub fn extract_inline_array_item_schemas(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(schemas) = doc.schemas() else {
        return Ok(());
    };

    let mut taken: HashSet<String> = schemas.keys().map(|name| name.to_lowercase()).collect();
    let mut promotions: Vec<(String, String, Schema)> = Vec::new();
    for (name, slot) in schemas {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item() else {
            continue;
        };
        if !schema.is_type("array") {
            continue;
        }
        let Some(items) = schema.items.as_deref().and_then(RefOr::as_item) else {
            continue;
        };
        if !items.has_properties() {
            continue;
        }
        let candidate = format!("{name}_item");
        let unique = naming::unique_name(&candidate, |c| taken.contains(&c.to_lowercase()));
        taken.insert(unique.to_lowercase());
        promotions.push((name.clone(), unique, items.clone()));
    }

    let schemas = doc.schemas_mut();
    for (parent, item_name, item_schema) in promotions {
        if let Some(parent_schema) = schemas.get_mut(&parent).and_then(RefOr::as_item_mut) {
            parent_schema.items = Some(Box::new(RefOr::schema_ref(&item_name)));
        }
        tracing::debug!(%parent, item = %item_name, "promoted inline array item schema");
        schemas.insert(item_name, RefOr::Item(item_schema));
    }
    Ok(())
}

/// Promote anonymous request and response schemas into named components and
/// collapse single-media parameter `content` into `schema`.
///
/// Request bodies promote as `<operationId><MediaSuffix>` (falling back to
/// `<operationId>RequestBody_<media>` and numeric suffixes on collision);
/// responses as `<operationId>_<status>_Response_<media>`. Simple envelopes
/// (a single `data` property referencing a component) stay inline.
pub fn extract_inline_schemas(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let mut taken: HashSet<String> = doc
        .schema_names()
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    // Promoted names must not collide with operation ids either.
    taken.extend(
        doc.operations()
            .filter_map(|(_, _, operation)| operation.operation_id.as_deref())
            .map(str::to_lowercase),
    );
    let mut promotions: Vec<(String, Schema)> = Vec::new();

    for (path, item) in &mut doc.paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Some(parameters) = item.parameters.as_mut() {
            for parameter in parameters.iter_mut() {
                if let RefOr::Item(parameter) = parameter {
                    collapse_parameter_content(parameter);
                }
            }
        }

        for (method, operation) in item.operations_mut() {
            let op_id = operation
                .operation_id
                .clone()
                .unwrap_or_else(|| format!("{}_{path}", method.as_str()));

            if let Some(parameters) = operation.parameters.as_mut() {
                for parameter in parameters.iter_mut() {
                    if let RefOr::Item(parameter) = parameter {
                        collapse_parameter_content(parameter);
                    }
                }
            }

            if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                for (media, media_type) in &mut body.content {
                    let Some(slot) = media_type.schema.as_mut() else {
                        continue;
                    };
                    let Some(schema) = slot.as_item() else {
                        continue;
                    };
                    if !promotable(schema) || is_simple_envelope(schema) {
                        continue;
                    }
                    let candidate =
                        naming::validate_component(&format!("{op_id}{}", media_suffix(media)));
                    let fallback = naming::validate_component(&format!(
                        "{op_id}RequestBody_{}",
                        media_underscored(media)
                    ));
                    let name = promote(slot, candidate, Some(fallback), &mut taken, &mut promotions);
                    tracing::debug!(operation = %op_id, %media, component = %name, "promoted inline request schema");
                }
            }

            for (status, response) in operation.responses.iter_mut() {
                let Some(response) = response.as_item_mut() else {
                    continue;
                };
                let Some(content) = response.content.as_mut() else {
                    continue;
                };
                for (media, media_type) in content {
                    let Some(slot) = media_type.schema.as_mut() else {
                        continue;
                    };
                    let Some(schema) = slot.as_item() else {
                        continue;
                    };
                    if !promotable(schema) || is_simple_envelope(schema) {
                        continue;
                    }
                    let candidate = naming::validate_component(&format!(
                        "{op_id}_{status}_Response_{}",
                        media_underscored(media)
                    ));
                    let name = promote(slot, candidate, None, &mut taken, &mut promotions);
                    tracing::debug!(operation = %op_id, %status, component = %name, "promoted inline response schema");
                }
            }
        }
    }

    if let Some(components) = doc.components.as_mut() {
        for parameter in components.parameters.values_mut() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let RefOr::Item(parameter) = parameter {
                collapse_parameter_content(parameter);
            }
        }
    }

    let schemas = doc.schemas_mut();
    for (name, schema) in promotions {
        schemas.insert(name, RefOr::Item(schema));
    }
    Ok(())
}

/// Promote the inline schema in `slot` under the first free name, rewriting
/// the slot to a reference. Returns the chosen name.
fn promote(
    slot: &mut RefOr<Schema>,
    candidate: String,
    fallback: Option<String>,
    taken: &mut HashSet<String>,
    promotions: &mut Vec<(String, Schema)>,
) -> String {
    let name = if !taken.contains(&candidate.to_lowercase()) {
        candidate
    } else if let Some(fallback) = fallback {
        naming::unique_name(&fallback, |c| taken.contains(&c.to_lowercase()))
    } else {
        naming::unique_name(&candidate, |c| taken.contains(&c.to_lowercase()))
    };
    taken.insert(name.to_lowercase());

    match std::mem::replace(slot, RefOr::schema_ref(&name)) {
        RefOr::Item(schema) => promotions.push((name.clone(), schema)),
        // Callers only promote inline slots; restore rather than panic.
        RefOr::Ref(original) => *slot = RefOr::Ref(original),
    }
    name
}

/// Whether an inline schema is worth naming: object-shaped or composed.
/// Scalars stay inline — the primitive-inlining pass just removed those.
fn promotable(schema: &Schema) -> bool {
    schema.has_properties()
        || schema.has_composition()
        || (schema.is_type("object") && schema.additional_properties.is_some())
}

/// A simple envelope: one property `data` referencing a component, with at
/// most one required field. Generators handle these inline.
fn is_simple_envelope(schema: &Schema) -> bool {
    let Some(properties) = schema.properties.as_ref() else {
        return false;
    };
    properties.len() == 1
        && properties
            .get("data")
            .is_some_and(RefOr::is_reference)
        && schema.required.as_ref().is_none_or(|required| required.len() <= 1)
}

/// Collapse parameter `content` with exactly one media type into `schema`.
fn collapse_parameter_content(parameter: &mut Parameter) {
    let collapse = parameter.schema.is_none()
        && parameter
            .content
            .as_ref()
            .is_some_and(|content| content.len() == 1);
    if !collapse {
        return;
    }
    if let Some(mut content) = parameter.content.take() {
        if let Some((_, media_type)) = content.pop() {
            parameter.schema = media_type.schema;
        }
    }
}

/// Promote inline schemas of multi-content request bodies; a promoted name
/// equal to the operation id (case-insensitively) is renamed to `<name>Body`,
/// then `<name>Dto`, then numbered.
pub fn disambiguate_multi_content_request_schemas(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut taken: HashSet<String> = doc
        .schema_names()
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    taken.extend(
        doc.operations()
            .filter_map(|(_, _, operation)| operation.operation_id.as_deref())
            .map(str::to_lowercase),
    );
    let mut promotions: Vec<(String, Schema)> = Vec::new();

    for (_, item) in &mut doc.paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for (_, operation) in item.operations_mut() {
            let Some(op_id) = operation.operation_id.clone() else {
                continue;
            };
            let Some(RefOr::Item(body)) = operation.request_body.as_mut() else {
                continue;
            };
            if body.content.len() <= 1 {
                continue;
            }
            for (media, media_type) in &mut body.content {
                let Some(slot) = media_type.schema.as_mut() else {
                    continue;
                };
                let Some(schema) = slot.as_item() else {
                    continue;
                };
                if !promotable(schema) {
                    continue;
                }

                let mut candidate =
                    naming::validate_component(&format!("{op_id}{}", media_suffix(media)));
                if candidate.eq_ignore_ascii_case(&op_id) {
                    let body_name = format!("{candidate}Body");
                    candidate = if taken.contains(&body_name.to_lowercase()) {
                        let dto_name = format!("{candidate}Dto");
                        if taken.contains(&dto_name.to_lowercase()) {
                            naming::unique_name(&body_name, |c| taken.contains(&c.to_lowercase()))
                        } else {
                            dto_name
                        }
                    } else {
                        body_name
                    };
                }
                promote(slot, candidate, None, &mut taken, &mut promotions);
            }
        }
    }

    let schemas = doc.schemas_mut();
    for (name, schema) in promotions {
        schemas.insert(name, RefOr::Item(schema));
    }
    Ok(())
}

/// Rename components occupying the `<operationId><media_with_underscores>`
/// name pattern, which downstream generators reserve for synthesized
/// content-type wrappers.
pub fn fix_content_type_wrapper_collisions(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut reserved: Vec<String> = Vec::new();
    for (_, _, operation) in doc.operations() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(op_id) = operation.operation_id.as_deref() else {
            continue;
        };
        if let Some(RefOr::Item(body)) = operation.request_body.as_ref() {
            for media in body.content.keys() {
                reserved.push(format!("{op_id}{}", media.replace('/', "_")));
            }
        }
    }

    let Some(schemas) = doc.schemas() else {
        return Ok(());
    };
    let mut taken: HashSet<String> = schemas.keys().map(|name| name.to_lowercase()).collect();
    let mut mapping = IndexMap::new();
    for name in reserved {
        if !schemas.contains_key(&name) {
            continue;
        }
        let candidate = format!("{name}Body");
        let unique = naming::unique_name(&candidate, |c| taken.contains(&c.to_lowercase()));
        taken.insert(unique.to_lowercase());
        tracing::warn!(component = %name, renamed = %unique, "component occupies a reserved wrapper name");
        mapping.insert(name, unique);
    }

    refs::rename(doc, &mapping, cancel)
}

/// `application/json` → `Json`, `multipart/form-data` → `FormData`.
fn media_suffix(media: &str) -> String {
    let subtype = media
        .split(';')
        .next()
        .unwrap_or(media)
        .rsplit('/')
        .next()
        .unwrap_or(media);
    subtype
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `application/json` → `application_json`.
fn media_underscored(media: &str) -> String {
    naming::sanitize(media.split(';').next().unwrap_or(media).trim())
}
