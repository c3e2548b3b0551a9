//! Composition hygiene: empty-subtree removal, duplicate-branch
//! de-duplication, and empty-enum-branch stripping.

use std::collections::HashSet;

use oas_model::{AdditionalProperties, Document, RefOr, Schema};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::walk;

/// The Clean pass: recursively filter `allOf`/`oneOf`/`anyOf` lists,
/// keeping only children that are references or non-empty, and drop
/// composition lists that end up empty.
///
/// Children are cleaned before their parent filters them, so a branch that
/// only contained an empty composition is itself removed.
pub fn remove_empty_inline_schemas(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_top_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let RefOr::Item(schema) = slot {
            clean_schema(schema);
        }
        Ok(())
    })
}

fn clean_schema(schema: &mut Schema) {
    if let Some(properties) = schema.properties.as_mut() {
        for child in properties.values_mut() {
            if let RefOr::Item(child) = child {
                clean_schema(child);
            }
        }
    }
    if let Some(RefOr::Item(items)) = schema.items.as_deref_mut() {
        clean_schema(items);
    }
    if let Some(AdditionalProperties::Schema(child)) = schema.additional_properties.as_mut() {
        if let RefOr::Item(child) = child.as_mut() {
            clean_schema(child);
        }
    }

    for list_slot in [
        &mut schema.all_of,
        &mut schema.one_of,
        &mut schema.any_of,
    ] {
        let Some(list) = list_slot.as_mut() else {
            continue;
        };
        for branch in list.iter_mut() {
            if let RefOr::Item(branch) = branch {
                clean_schema(branch);
            }
        }
        list.retain(|branch| match branch {
            RefOr::Ref(_) => true,
            RefOr::Item(branch) => !branch.is_empty(),
        });
        if list.is_empty() {
            *list_slot = None;
        }
    }
}

/// Remove duplicate `$ref` branches from compositions of two or more
/// entries, keeping the first occurrence. Inline branches are never
/// treated as duplicates.
pub fn dedup_composition_branches(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        for list in schema.compositions_mut() {
            if list.len() < 2 {
                continue;
            }
            let mut seen: HashSet<String> = HashSet::new();
            let before = list.len();
            list.retain(|branch| match branch.as_reference() {
                Some(reference) => seen.insert(reference.reference.clone()),
                None => true,
            });
            if list.len() < before {
                tracing::debug!(%location, removed = before - list.len(), "removed duplicate composition branches");
            }
        }
        Ok(())
    })
}

/// Remove composition branches that declare an empty enum and nothing else.
pub fn strip_empty_enum_branches(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        for list in schema.compositions_mut() {
            let before = list.len();
            list.retain(|branch| {
                !branch.as_item().is_some_and(|branch| {
                    branch.enum_values.as_ref().is_some_and(Vec::is_empty)
                        && !branch.has_properties()
                        && !branch.has_composition()
                        && branch.items.is_none()
                })
            });
            if list.len() < before {
                tracing::debug!(%location, "stripped empty enum branches");
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn doc(yaml: &str) -> Document {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn empty_branches_removed_recursively() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Holder:
      type: object
      anyOf:
        - {}
        - description: only a description
        - $ref: '#/components/schemas/Real'
        - type: string
    Nested:
      type: object
      allOf:
        - anyOf:
            - {}
    Real:
      type: object
");
        remove_empty_inline_schemas(&mut doc, &CancellationToken::new()).unwrap();

        let schemas = doc.schemas().unwrap();
        let holder = schemas["Holder"].as_item().unwrap();
        let any_of = holder.any_of.as_ref().unwrap();
        assert_eq!(any_of.len(), 2, "reference and typed branch survive");
        assert!(any_of[0].is_reference());

        // The inner anyOf emptied out, making its holder empty, which the
        // outer allOf then dropped entirely.
        let nested = schemas["Nested"].as_item().unwrap();
        assert!(nested.all_of.is_none());
    }

    #[test]
    fn duplicate_ref_branches_deduplicated() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Combined:
      oneOf:
        - $ref: '#/components/schemas/A'
        - $ref: '#/components/schemas/A'
        - $ref: '#/components/schemas/B'
        - type: object
        - type: object
    A: {type: object}
    B: {type: object}
");
        dedup_composition_branches(&mut doc, &CancellationToken::new()).unwrap();

        let combined = doc.schemas().unwrap()["Combined"].as_item().unwrap();
        let one_of = combined.one_of.as_ref().unwrap();
        assert_eq!(one_of.len(), 4, "one duplicate ref removed, inline branches kept");
    }

    #[test]
    fn empty_enum_branches_stripped() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Choice:
      oneOf:
        - type: string
          enum: []
        - type: string
          enum: [a]
");
        strip_empty_enum_branches(&mut doc, &CancellationToken::new()).unwrap();

        let choice = doc.schemas().unwrap()["Choice"].as_item().unwrap();
        assert_eq!(choice.one_of.as_ref().unwrap().len(), 1);
    }
}
