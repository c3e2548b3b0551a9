//! Inline pure-primitive components.
//!
//! Generators emit a useless named type (or refuse outright) for a
//! component that is just `type: string` plus facets. This pass removes
//! such components and pastes an inline copy into every referencing slot.

use indexmap::IndexMap;
use oas_model::{Document, RefOr, Schema};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::walk;

/// Remove every pure-primitive component schema and inline a copy of it at
/// each reference site.
///
/// The inline copy carries `type`, `format`, `description`, and the
/// string/numeric facets; titles, defaults, and examples stay behind with
/// the removed component.
pub fn inline_primitive_components(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let mut copies: IndexMap<String, Schema> = IndexMap::new();
    if let Some(schemas) = doc.schemas() {
        for (name, slot) in schemas {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let RefOr::Item(schema) = slot {
                if schema.is_pure_primitive() {
                    copies.insert(name.clone(), primitive_copy(schema));
                }
            }
        }
    }
    if copies.is_empty() {
        return Ok(());
    }

    let schemas = doc.schemas_mut();
    for name in copies.keys() {
        schemas.shift_remove(name);
        tracing::debug!(component = %name, "inlined pure-primitive component");
    }

    walk::for_each_schema_slot(doc, |_, slot| {
        if let Some(copy) = slot
            .referenced_schema()
            .and_then(|name| copies.get(name))
        {
            *slot = RefOr::Item(copy.clone());
        }
    });

    Ok(())
}

/// The subset of a primitive schema worth carrying to reference sites.
fn primitive_copy(schema: &Schema) -> Schema {
    Schema {
        schema_type: schema.schema_type.clone(),
        format: schema.format.clone(),
        description: schema.description.clone(),
        min_length: schema.min_length,
        max_length: schema.max_length,
        pattern: schema.pattern.clone(),
        minimum: schema.minimum,
        maximum: schema.maximum,
        ..Schema::default()
    }
}
