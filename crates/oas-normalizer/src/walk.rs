//! The schema slot catalogue.
//!
//! Every place a schema can appear in a document — component maps, nested
//! compositions, parameters, request and response content, headers — is
//! encoded once here as a callback-driven traversal. Passes that rewrite or
//! inspect references consume this instead of hand-writing their own walks.
//!
//! Inline subtrees are trees: cycles exist only through `$ref`, which the
//! walk does not follow, so traversal terminates without a visited-set.
//! Ref-following helpers live in [`crate::refs`] and carry their own
//! visited-set.

use oas_model::{AdditionalProperties, Document, Parameter, RefOr, RequestBody, Response, Schema};

use crate::error::Result;

/// Visit every schema slot in the document, including nested subtrees.
///
/// Slots are visited pre-order: the callback sees a slot before its children,
/// and children are read back from the slot after the callback returns, so a
/// callback that replaces an inline schema with a reference prunes the
/// subtree it replaced.
pub fn for_each_schema_slot<F>(doc: &mut Document, mut f: F)
where
    F: FnMut(&str, &mut RefOr<Schema>),
{
    let never: Result<()> = try_for_each_schema_slot(doc, |location, slot| {
        f(location, slot);
        Ok(())
    });
    debug_assert!(never.is_ok());
}

/// Fallible variant of [`for_each_schema_slot`]; short-circuits on error.
///
/// Cancellable passes check their token at the top of the callback and
/// return [`crate::Error::Cancelled`] to unwind.
pub fn try_for_each_schema_slot<F>(doc: &mut Document, mut f: F) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    walk_document(doc, &mut f, true)
}

/// Visit only owner-level slots, without recursing into nested subtrees.
///
/// For passes that run their own bottom-up recursion (e.g. empty-subtree
/// removal), the recursive walk would revisit every nested slot redundantly.
pub fn for_each_top_schema_slot<F>(doc: &mut Document, mut f: F)
where
    F: FnMut(&str, &mut RefOr<Schema>),
{
    let never: Result<()> = walk_document(
        doc,
        &mut |location, slot| {
            f(location, slot);
            Ok(())
        },
        false,
    );
    debug_assert!(never.is_ok());
}

/// Fallible variant of [`for_each_top_schema_slot`]; short-circuits on error.
pub fn try_for_each_top_schema_slot<F>(doc: &mut Document, mut f: F) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    walk_document(doc, &mut f, false)
}

fn walk_document<F>(doc: &mut Document, f: &mut F, recurse: bool) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    if let Some(components) = doc.components.as_mut() {
        for (name, slot) in &mut components.schemas {
            visit_slot(&format!("components.schemas.{name}"), slot, f, recurse)?;
        }
        for (name, parameter) in &mut components.parameters {
            if let RefOr::Item(parameter) = parameter {
                visit_parameter(
                    &format!("components.parameters.{name}"),
                    parameter,
                    f,
                    recurse,
                )?;
            }
        }
        for (name, body) in &mut components.request_bodies {
            if let RefOr::Item(body) = body {
                visit_request_body(
                    &format!("components.requestBodies.{name}"),
                    body,
                    f,
                    recurse,
                )?;
            }
        }
        for (name, response) in &mut components.responses {
            if let RefOr::Item(response) = response {
                visit_response(&format!("components.responses.{name}"), response, f, recurse)?;
            }
        }
        for (name, header) in &mut components.headers {
            if let RefOr::Item(header) = header {
                if let Some(slot) = header.schema.as_mut() {
                    visit_slot(
                        &format!("components.headers.{name}.schema"),
                        slot,
                        f,
                        recurse,
                    )?;
                }
            }
        }
    }

    for (path, item) in &mut doc.paths {
        let base = format!("paths.{path}");
        if let Some(parameters) = item.parameters.as_mut() {
            for parameter in parameters.iter_mut() {
                if let RefOr::Item(parameter) = parameter {
                    let location = format!("{base}.parameters.{}", parameter.name);
                    visit_parameter(&location, parameter, f, recurse)?;
                }
            }
        }
        for (method, operation) in item.operations_mut() {
            let op_base = format!("{base}.{}", method.as_str());
            if let Some(parameters) = operation.parameters.as_mut() {
                for parameter in parameters.iter_mut() {
                    if let RefOr::Item(parameter) = parameter {
                        let location = format!("{op_base}.parameters.{}", parameter.name);
                        visit_parameter(&location, parameter, f, recurse)?;
                    }
                }
            }
            if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                visit_request_body(&format!("{op_base}.requestBody"), body, f, recurse)?;
            }
            for (status, response) in operation.responses.iter_mut() {
                if let RefOr::Item(response) = response {
                    let location = format!("{op_base}.responses.{status}");
                    visit_response(&location, response, f, recurse)?;
                }
            }
        }
    }

    Ok(())
}

fn visit_parameter<F>(
    location: &str,
    parameter: &mut Parameter,
    f: &mut F,
    recurse: bool,
) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    if let Some(slot) = parameter.schema.as_mut() {
        visit_slot(&format!("{location}.schema"), slot, f, recurse)?;
    }
    if let Some(content) = parameter.content.as_mut() {
        for (media, media_type) in content {
            if let Some(slot) = media_type.schema.as_mut() {
                visit_slot(&format!("{location}.content.{media}.schema"), slot, f, recurse)?;
            }
        }
    }
    Ok(())
}

fn visit_request_body<F>(
    location: &str,
    body: &mut RequestBody,
    f: &mut F,
    recurse: bool,
) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    for (media, media_type) in &mut body.content {
        if let Some(slot) = media_type.schema.as_mut() {
            visit_slot(&format!("{location}.content.{media}.schema"), slot, f, recurse)?;
        }
    }
    Ok(())
}

fn visit_response<F>(
    location: &str,
    response: &mut Response,
    f: &mut F,
    recurse: bool,
) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    if let Some(content) = response.content.as_mut() {
        for (media, media_type) in content {
            if let Some(slot) = media_type.schema.as_mut() {
                visit_slot(&format!("{location}.content.{media}.schema"), slot, f, recurse)?;
            }
        }
    }
    if let Some(headers) = response.headers.as_mut() {
        for (name, header) in headers {
            if let RefOr::Item(header) = header {
                if let Some(slot) = header.schema.as_mut() {
                    visit_slot(&format!("{location}.headers.{name}.schema"), slot, f, recurse)?;
                }
            }
        }
    }
    Ok(())
}

fn visit_slot<F>(location: &str, slot: &mut RefOr<Schema>, f: &mut F, recurse: bool) -> Result<()>
where
    F: FnMut(&str, &mut RefOr<Schema>) -> Result<()>,
{
    f(location, slot)?;
    if !recurse {
        return Ok(());
    }

    if let RefOr::Item(schema) = slot {
        if let Some(properties) = schema.properties.as_mut() {
            for (name, child) in properties {
                visit_slot(&format!("{location}.properties.{name}"), child, f, recurse)?;
            }
        }
        if let Some(items) = schema.items.as_mut() {
            visit_slot(&format!("{location}.items"), items, f, recurse)?;
        }
        if let Some(AdditionalProperties::Schema(child)) = schema.additional_properties.as_mut() {
            visit_slot(&format!("{location}.additionalProperties"), child, f, recurse)?;
        }
        for (keyword, list) in [
            ("allOf", schema.all_of.as_mut()),
            ("oneOf", schema.one_of.as_mut()),
            ("anyOf", schema.any_of.as_mut()),
        ] {
            if let Some(list) = list {
                for (index, child) in list.iter_mut().enumerate() {
                    visit_slot(&format!("{location}.{keyword}[{index}]"), child, f, recurse)?;
                }
            }
        }
    }
    Ok(())
}
