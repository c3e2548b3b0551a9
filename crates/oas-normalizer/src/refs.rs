//! The reference engine: resolve, validate, rename, and rewrite `$ref`
//! targets everywhere they may appear.
//!
//! All rewrites go through the slot catalogue in [`crate::walk`], so
//! dispatch is exhaustive over every location a schema reference can hide:
//! component schemas (recursively through properties, items,
//! `additionalProperties`, and compositions), operation-level parameters and
//! request/response content, and component-level parameters, request bodies,
//! responses, and headers. Discriminator mappings carry raw reference
//! strings and are rewritten alongside.

use std::collections::HashSet;

use indexmap::IndexMap;
use oas_model::{Document, RefOr, Reference, Schema, SCHEMA_REF_PREFIX};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::walk;

/// Name of the synthetic component substituted for `#/paths/…` references.
pub const EXAMPLE_PAYLOAD: &str = "ExamplePayload";

/// Resolve a reference to its inline component schema.
///
/// Follows reference-to-reference chains with a visited-set, so cyclic
/// chains terminate with `None`.
pub fn resolve<'a>(doc: &'a Document, reference: &Reference) -> Option<&'a Schema> {
    resolve_name(doc, reference.schema_name()?)
}

/// Resolve a component schema name to its inline schema.
pub fn resolve_name<'a>(doc: &'a Document, name: &str) -> Option<&'a Schema> {
    let schemas = doc.schemas()?;
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = name;
    loop {
        if !visited.insert(current) {
            return None;
        }
        match schemas.get(current)? {
            RefOr::Item(schema) => return Some(schema),
            RefOr::Ref(next) => current = next.schema_name()?,
        }
    }
}

/// Whether the reference target exists in `components.schemas`.
pub fn is_valid(doc: &Document, reference: &Reference) -> bool {
    match reference.schema_name() {
        Some(name) => doc.schemas().is_some_and(|schemas| schemas.contains_key(name)),
        None => false,
    }
}

/// Rewrite every slot holding `Reference(old_id)` to `Reference(new_id)`,
/// including discriminator mapping values.
pub fn replace_all(doc: &mut Document, old_id: &str, new_id: &str) {
    let old_ref = format!("{SCHEMA_REF_PREFIX}{old_id}");
    let new_ref = format!("{SCHEMA_REF_PREFIX}{new_id}");
    walk::for_each_schema_slot(doc, |_, slot| match slot {
        RefOr::Ref(reference) if reference.reference == old_ref => {
            reference.reference.clone_from(&new_ref);
        }
        RefOr::Item(schema) => {
            if let Some(mapping) = schema
                .discriminator
                .as_mut()
                .and_then(|discriminator| discriminator.mapping.as_mut())
            {
                for target in mapping.values_mut() {
                    if *target == old_ref {
                        target.clone_from(&new_ref);
                    }
                }
            }
        }
        RefOr::Ref(_) => {}
    });
}

/// Apply a rename mapping atomically: every pair through [`replace_all`] in
/// mapping insertion order, then the `components.schemas` keys themselves.
///
/// A pair whose source key is missing, or whose target key is already taken,
/// is an internal inconsistency: it is logged at `warn` and skipped, leaving
/// that entry under its old name. Cancellation is checked per pair; an
/// interrupted rename leaves a partially rewritten graph, which is fine
/// because a cancelled run never writes output.
pub fn rename(
    doc: &mut Document,
    mapping: &IndexMap<String, String>,
    cancel: &CancellationToken,
) -> Result<()> {
    if mapping.is_empty() {
        return Ok(());
    }

    for (old_id, new_id) in mapping {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        replace_all(doc, old_id, new_id);
    }

    let schemas = doc.schemas_mut();
    let taken: HashSet<String> = schemas
        .keys()
        .filter(|key| !mapping.contains_key(*key))
        .cloned()
        .collect();

    let entries = std::mem::take(schemas);
    for (name, schema) in entries {
        let renamed = match mapping.get(&name) {
            Some(new_id) if taken.contains(new_id) || schemas.contains_key(new_id) => {
                tracing::warn!(old = %name, new = %new_id, "rename target already taken; keeping old name");
                name
            }
            Some(new_id) => new_id.clone(),
            None => name,
        };
        schemas.insert(renamed, schema);
    }

    for (old_id, new_id) in mapping {
        if !doc.schemas().is_some_and(|schemas| schemas.contains_key(new_id)) {
            tracing::warn!(old = %old_id, new = %new_id, "rename source missing; partial rewrite abandoned");
        }
    }
    Ok(())
}

/// Log every reference whose target is missing; never remove them.
///
/// Upstream schemas routinely carry stale refs that become valid after later
/// stages, so removal is deferred to the structural rewriter. Returns the
/// number of broken references for driver diagnostics.
pub fn scrub_all(doc: &mut Document, cancel: &CancellationToken) -> Result<usize> {
    let known: HashSet<String> = doc
        .schemas()
        .map(|schemas| schemas.keys().cloned().collect())
        .unwrap_or_default();

    let mut broken = 0usize;
    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let RefOr::Ref(reference) = slot {
            let resolves = match reference.schema_name() {
                Some(name) => known.contains(name),
                // Non-schema refs (components.parameters etc.) are outside
                // this scrub's jurisdiction.
                None => !reference.reference.starts_with(SCHEMA_REF_PREFIX),
            };
            if !resolves {
                broken += 1;
                tracing::warn!(%location, reference = %reference.reference, "unresolved schema reference");
            }
        }
        Ok(())
    })?;
    Ok(broken)
}

/// Rewrite `#/paths/…` references to a synthetic `ExamplePayload` component.
///
/// Such references arise from examples leaked into the path model and are
/// always incorrect for generators. The component (`type: object`) is
/// created on demand.
pub fn retarget_path_example_refs(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let mut retargeted = 0usize;
    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let RefOr::Ref(reference) = slot {
            if reference.is_path_ref() {
                tracing::warn!(%location, reference = %reference.reference, "retargeting path-model reference to ExamplePayload");
                *slot = RefOr::schema_ref(EXAMPLE_PAYLOAD);
                retargeted += 1;
            }
        }
        Ok(())
    })?;

    if retargeted > 0 {
        doc.schemas_mut()
            .entry(EXAMPLE_PAYLOAD.to_string())
            .or_insert_with(|| RefOr::Item(Schema::object()));
    }
    Ok(())
}
