//! Polymorphism disambiguation: discriminator synthesis, enum-branch
//! promotion, and `allOf` override repairs.
//!
//! Passes that need to look through `$ref` branches read from a snapshot of
//! `components.schemas` taken before mutation, so resolution and rewriting
//! never alias.

use std::collections::HashSet;

use indexmap::IndexMap;
use oas_model::{Discriminator, Document, RefOr, Schema, SCHEMA_REF_PREFIX};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::{naming, refs, walk};

/// Property injected when a polymorphic schema has no discriminator.
const DISCRIMINATOR_PROPERTY: &str = "type";

/// Resolved inline clones of every component schema, aliases included.
fn schema_snapshot(doc: &Document) -> IndexMap<String, Schema> {
    doc.schemas()
        .map(|schemas| {
            schemas
                .keys()
                .filter_map(|name| {
                    refs::resolve_name(doc, name).map(|schema| (name.clone(), schema.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Give every `oneOf`/`anyOf` with two or more branches and no
/// discriminator a synthesized one.
///
/// Sets `discriminator: { propertyName: "type" }`, injects a string `type`
/// property, marks it required, and builds a mapping entry per referenced
/// branch: the branch's own `type` enum value when it has one, otherwise
/// the branch component id. Inline branches cannot be mapped and are
/// skipped with a debug log.
pub fn ensure_discriminator_for_oneof(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    let snapshot = schema_snapshot(doc);

    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        if schema.discriminator.is_some() {
            return Ok(());
        }
        let branches = match (&schema.one_of, &schema.any_of) {
            (Some(one_of), _) if one_of.len() >= 2 => one_of.clone(),
            (_, Some(any_of)) if any_of.len() >= 2 => any_of.clone(),
            _ => return Ok(()),
        };

        let parent = component_hint(location);
        let mut mapping = IndexMap::new();
        for (index, branch) in branches.iter().enumerate() {
            let Some(branch_id) = branch.referenced_schema() else {
                tracing::debug!(%location, index, "inline polymorphic branch has no reference to map");
                continue;
            };
            let key = snapshot
                .get(branch_id)
                .and_then(branch_type_enum_value)
                .unwrap_or_else(|| {
                    if branch_id.is_empty() {
                        format!("{parent}_{}", index + 1)
                    } else {
                        branch_id.to_string()
                    }
                });
            mapping
                .entry(key)
                .or_insert_with(|| format!("{SCHEMA_REF_PREFIX}{branch_id}"));
        }

        schema.discriminator = Some(Discriminator {
            property_name: DISCRIMINATOR_PROPERTY.to_string(),
            mapping: Some(mapping),
        });
        schema
            .properties
            .get_or_insert_with(IndexMap::new)
            .entry(DISCRIMINATOR_PROPERTY.to_string())
            .or_insert_with(|| RefOr::Item(Schema::string()));
        schema.require(DISCRIMINATOR_PROPERTY);
        tracing::debug!(%location, "synthesized discriminator for polymorphic schema");
        Ok(())
    })
}

/// The first `type` enum value a branch schema declares, if any.
fn branch_type_enum_value(schema: &Schema) -> Option<String> {
    schema
        .properties
        .as_ref()?
        .get(DISCRIMINATOR_PROPERTY)?
        .as_item()?
        .enum_values
        .as_ref()?
        .first()?
        .as_str()
        .map(str::to_string)
}

/// The component name a location belongs to, for synthesized mapping keys.
fn component_hint(location: &str) -> String {
    location
        .strip_prefix("components.schemas.")
        .and_then(|rest| rest.split('.').next())
        .unwrap_or("branch")
        .to_string()
}

/// Wrap enum-only branches of discriminated `oneOf`/`anyOf` lists.
///
/// An enum has no room for the discriminator property, which breaks
/// generators that insert one. Each such branch `B` is wrapped in a
/// `<B>_setting` component — `{ value: $ref B, <discriminator>: string }`,
/// `required: [value]` — and the branch list and discriminator mapping are
/// re-pointed at the wrapper. Wrappers are shared across parents using the
/// same discriminator property.
pub fn promote_enum_branches_under_discriminator(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let snapshot = schema_snapshot(doc);
    let mut taken: HashSet<String> = doc
        .schema_names()
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    let mut wrappers: IndexMap<(String, String), String> = IndexMap::new();
    let mut additions: Vec<(String, Schema)> = Vec::new();

    walk::try_for_each_schema_slot(doc, |location, slot| {
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

        let mut rewired: Vec<(String, String)> = Vec::new();
        for list in [&mut schema.one_of, &mut schema.any_of].into_iter().flatten() {
            for branch in list.iter_mut() {
                let Some(branch_id) = branch.referenced_schema().map(str::to_string) else {
                    continue;
                };
                if !snapshot.get(&branch_id).is_some_and(Schema::is_enum_only) {
                    continue;
                }
                let key = (branch_id.clone(), property_name.clone());
                let wrapper = match wrappers.get(&key) {
                    Some(existing) => existing.clone(),
                    None => {
                        let name = naming::unique_name(&format!("{branch_id}_setting"), |c| {
                            taken.contains(&c.to_lowercase())
                        });
                        taken.insert(name.to_lowercase());
                        additions.push((
                            name.clone(),
                            enum_wrapper(&name, &branch_id, &property_name),
                        ));
                        wrappers.insert(key, name.clone());
                        name
                    }
                };
                tracing::debug!(%location, branch = %branch_id, %wrapper, "wrapped enum branch under discriminator");
                *branch = RefOr::schema_ref(&wrapper);
                rewired.push((branch_id.clone(), wrapper));
            }
        }

        if let Some(mapping) = schema
            .discriminator
            .as_mut()
            .and_then(|discriminator| discriminator.mapping.as_mut())
        {
            for (branch_id, wrapper) in &rewired {
                let old_ref = format!("{SCHEMA_REF_PREFIX}{branch_id}");
                let new_ref = format!("{SCHEMA_REF_PREFIX}{wrapper}");
                for target in mapping.values_mut() {
                    if *target == old_ref {
                        target.clone_from(&new_ref);
                    }
                }
            }
        }
        Ok(())
    })?;

    let schemas = doc.schemas_mut();
    for (name, schema) in additions {
        schemas.insert(name, RefOr::Item(schema));
    }
    Ok(())
}

/// The wrapper component carrying an enum branch and a discriminator slot.
///
/// Born fully normalized (title included) so a second pipeline run leaves
/// it untouched.
fn enum_wrapper(name: &str, branch_id: &str, property_name: &str) -> Schema {
    let mut wrapper = Schema::object();
    wrapper.title = Some(name.to_string());
    wrapper.properties = Some(IndexMap::from([
        ("value".to_string(), RefOr::schema_ref(branch_id)),
        (property_name.to_string(), RefOr::Item(Schema::string())),
    ]));
    wrapper.required = Some(vec!["value".to_string()]);
    wrapper
}

/// Remove base-fragment properties that an `allOf` override re-declares
/// with a type while the base leaves them untyped.
///
/// Generators cannot tell which declaration wins; dropping the untyped one
/// from the referenced base resolves the ambiguity.
pub fn remove_shadowing_untyped_properties(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let snapshot = schema_snapshot(doc);
    let mut removals: Vec<(String, String)> = Vec::new();

    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item() else {
            return Ok(());
        };
        let Some(all_of) = schema.all_of.as_ref() else {
            return Ok(());
        };

        let base_ids: Vec<&str> = all_of
            .iter()
            .filter_map(RefOr::referenced_schema)
            .collect();
        if base_ids.is_empty() {
            return Ok(());
        }

        let typed_overrides: Vec<&str> = all_of
            .iter()
            .filter_map(RefOr::as_item)
            .filter_map(|fragment| fragment.properties.as_ref())
            .flatten()
            .filter(|(_, prop)| !is_untyped(prop))
            .map(|(name, _)| name.as_str())
            .collect();

        for base_id in base_ids {
            let Some(base) = snapshot.get(base_id) else {
                continue;
            };
            for property in &typed_overrides {
                let shadowed = base
                    .properties
                    .as_ref()
                    .and_then(|properties| properties.get(*property))
                    .is_some_and(is_untyped);
                if shadowed {
                    removals.push((base_id.to_string(), (*property).to_string()));
                }
            }
        }
        Ok(())
    })?;

    let schemas = doc.schemas_mut();
    for (base_id, property) in removals {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(base) = schemas.get_mut(&base_id).and_then(RefOr::as_item_mut) else {
            continue;
        };
        if let Some(properties) = base.properties.as_mut() {
            if properties.shift_remove(&property).is_some() {
                tracing::debug!(base = %base_id, %property, "removed untyped property shadowed by typed override");
            }
        }
        if let Some(required) = base.required.as_mut() {
            required.retain(|name| *name != property);
        }
    }
    Ok(())
}

/// An untyped property slot: inline, with no type, composition, items, or enum.
fn is_untyped(slot: &RefOr<Schema>) -> bool {
    slot.as_item().is_some_and(|schema| {
        schema.schema_type.is_none()
            && !schema.has_composition()
            && schema.items.is_none()
            && !schema.has_enum()
    })
}

/// Keep only the first well-defined `value` property in an `allOf` chain;
/// later inline fragments drop their redundant override.
pub fn remove_redundant_derived_value(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let snapshot = schema_snapshot(doc);

    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        let Some(all_of) = schema.all_of.as_mut() else {
            return Ok(());
        };
        if all_of.len() < 2 {
            return Ok(());
        }

        let first_definer = all_of
            .iter()
            .position(|fragment| defines_value(fragment, &snapshot));
        let Some(first_definer) = first_definer else {
            return Ok(());
        };

        for fragment in all_of.iter_mut().skip(first_definer + 1) {
            let Some(fragment) = fragment.as_item_mut() else {
                continue;
            };
            let removed = fragment
                .properties
                .as_mut()
                .is_some_and(|properties| properties.shift_remove("value").is_some());
            if removed {
                tracing::debug!(%location, "removed redundant derived `value` override");
                if let Some(required) = fragment.required.as_mut() {
                    required.retain(|name| name != "value");
                }
            }
        }
        Ok(())
    })
}

/// Whether an `allOf` fragment declares a well-defined `value` property.
fn defines_value(fragment: &RefOr<Schema>, snapshot: &IndexMap<String, Schema>) -> bool {
    let schema = match fragment {
        RefOr::Item(schema) => schema,
        RefOr::Ref(reference) => {
            let Some(schema) = reference.schema_name().and_then(|name| snapshot.get(name)) else {
                return false;
            };
            schema
        }
    };
    schema
        .properties
        .as_ref()
        .and_then(|properties| properties.get("value"))
        .is_some_and(|value| !is_untyped(value))
}

/// Extract inline enums declared on a property named `value` — directly on
/// a component or on its single-override `allOf[1]` — into `<key>_value`
/// components.
pub fn fix_all_inline_value_enums(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    enum Spot {
        Direct,
        Override,
    }

    let Some(schemas) = doc.schemas() else {
        return Ok(());
    };
    let mut taken: HashSet<String> = schemas.keys().map(|name| name.to_lowercase()).collect();

    let mut extractions: Vec<(String, Spot, String, Schema)> = Vec::new();
    for (name, slot) in schemas {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item() else {
            continue;
        };
        let spot = if value_enum(schema).is_some() {
            Some(Spot::Direct)
        } else if single_override(schema).and_then(value_enum).is_some() {
            Some(Spot::Override)
        } else {
            None
        };
        let Some(spot) = spot else {
            continue;
        };
        let extracted = match spot {
            Spot::Direct => value_enum(schema),
            Spot::Override => single_override(schema).and_then(value_enum),
        };
        let Some(extracted) = extracted else {
            continue;
        };
        let new_name = naming::unique_name(&format!("{name}_value"), |c| {
            taken.contains(&c.to_lowercase())
        });
        taken.insert(new_name.to_lowercase());

        // Extracted components must come out fully normalized: the
        // stage-4 title and enum-typing passes have already run.
        let mut extracted = extracted.clone();
        if extracted.title.is_none() {
            extracted.title = Some(new_name.clone());
        }
        if extracted.schema_type.is_none() {
            if let Some(kind) = extracted
                .enum_values
                .as_deref()
                .and_then(crate::passes::normalize::infer_kind)
            {
                extracted.schema_type = Some(kind.to_string());
            }
        }
        extractions.push((name.clone(), spot, new_name, extracted));
    }

    let schemas = doc.schemas_mut();
    for (owner, spot, new_name, extracted) in extractions {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(owner_schema) = schemas.get_mut(&owner).and_then(RefOr::as_item_mut) else {
            continue;
        };
        let properties = match spot {
            Spot::Direct => owner_schema.properties.as_mut(),
            Spot::Override => owner_schema
                .all_of
                .as_mut()
                .and_then(|all_of| all_of.get_mut(1))
                .and_then(RefOr::as_item_mut)
                .and_then(|fragment| fragment.properties.as_mut()),
        };
        let Some(properties) = properties else {
            continue;
        };
        if let Some(value_slot) = properties.get_mut("value") {
            tracing::debug!(component = %owner, extracted = %new_name, "extracted inline value enum");
            *value_slot = RefOr::schema_ref(&new_name);
            schemas.insert(new_name, RefOr::Item(extracted));
        }
    }
    Ok(())
}

/// The inline enum schema under a `value` property, if non-empty.
fn value_enum(schema: &Schema) -> Option<&Schema> {
    let value = schema.properties.as_ref()?.get("value")?.as_item()?;
    value.has_enum().then_some(value)
}

/// The single override fragment of `allOf: [base, override]`.
fn single_override(schema: &Schema) -> Option<&Schema> {
    let all_of = schema.all_of.as_ref()?;
    if all_of.len() != 2 {
        return None;
    }
    all_of[1].as_item()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn doc(yaml: &str) -> Document {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn discriminator_synthesized_with_mapping() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Pet:
      oneOf:
        - $ref: '#/components/schemas/Cat'
        - $ref: '#/components/schemas/Dog'
    Cat:
      type: object
      properties:
        meow:
          type: boolean
    Dog:
      type: object
      properties:
        bark:
          type: boolean
");
        let cancel = CancellationToken::new();
        ensure_discriminator_for_oneof(&mut doc, &cancel).unwrap();

        let pet = doc.schemas().unwrap()["Pet"].as_item().unwrap();
        let discriminator = pet.discriminator.as_ref().unwrap();
        assert_eq!(discriminator.property_name, "type");
        let mapping = discriminator.mapping.as_ref().unwrap();
        assert_eq!(mapping["Cat"], "#/components/schemas/Cat");
        assert_eq!(mapping["Dog"], "#/components/schemas/Dog");

        let type_prop = pet.properties.as_ref().unwrap()["type"].as_item().unwrap();
        assert!(type_prop.is_type("string"));
        assert!(pet.required.as_ref().unwrap().contains(&"type".to_string()));
    }

    #[test]
    fn branch_type_enum_value_preferred_as_mapping_key() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Event:
      anyOf:
        - $ref: '#/components/schemas/Created'
        - $ref: '#/components/schemas/Deleted'
    Created:
      type: object
      properties:
        type:
          type: string
          enum: [created]
    Deleted:
      type: object
      properties:
        type:
          type: string
          enum: [deleted]
");
        let cancel = CancellationToken::new();
        ensure_discriminator_for_oneof(&mut doc, &cancel).unwrap();

        let event = doc.schemas().unwrap()["Event"].as_item().unwrap();
        let mapping = event.discriminator.as_ref().unwrap().mapping.as_ref().unwrap();
        assert_eq!(mapping["created"], "#/components/schemas/Created");
        assert_eq!(mapping["deleted"], "#/components/schemas/Deleted");
    }

    #[test]
    fn existing_discriminator_untouched() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Pet:
      oneOf:
        - $ref: '#/components/schemas/Cat'
        - $ref: '#/components/schemas/Dog'
      discriminator:
        propertyName: kind
      properties:
        kind:
          type: string
      required: [kind]
    Cat: {type: object}
    Dog: {type: object}
");
        let cancel = CancellationToken::new();
        ensure_discriminator_for_oneof(&mut doc, &cancel).unwrap();

        let pet = doc.schemas().unwrap()["Pet"].as_item().unwrap();
        assert_eq!(pet.discriminator.as_ref().unwrap().property_name, "kind");
    }

    #[test]
    fn enum_branch_wrapped_in_setting_component() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Config:
      oneOf:
        - $ref: '#/components/schemas/Mode'
      discriminator:
        propertyName: kind
        mapping:
          mode: '#/components/schemas/Mode'
    Mode:
      type: string
      enum: [a, b]
");
        promote_enum_branches_under_discriminator(&mut doc, &CancellationToken::new()).unwrap();

        let schemas = doc.schemas().unwrap();
        let wrapper = schemas["Mode_setting"].as_item().unwrap();
        assert!(wrapper.is_type("object"));
        let properties = wrapper.properties.as_ref().unwrap();
        assert_eq!(properties["value"].referenced_schema(), Some("Mode"));
        assert!(properties["kind"].as_item().unwrap().is_type("string"));
        assert_eq!(wrapper.required.as_deref(), Some(&["value".to_string()][..]));

        let config = schemas["Config"].as_item().unwrap();
        let branch = &config.one_of.as_ref().unwrap()[0];
        assert_eq!(branch.referenced_schema(), Some("Mode_setting"));
        let mapping = config.discriminator.as_ref().unwrap().mapping.as_ref().unwrap();
        assert_eq!(mapping["mode"], "#/components/schemas/Mode_setting");
    }

    #[test]
    fn shadowed_untyped_property_removed_from_base() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Base:
      type: object
      properties:
        result:
          description: untyped placeholder
        id:
          type: string
    Derived:
      allOf:
        - $ref: '#/components/schemas/Base'
        - type: object
          properties:
            result:
              type: object
              properties:
                ok:
                  type: boolean
");
        remove_shadowing_untyped_properties(&mut doc, &CancellationToken::new()).unwrap();

        let base = doc.schemas().unwrap()["Base"].as_item().unwrap();
        let properties = base.properties.as_ref().unwrap();
        assert!(!properties.contains_key("result"), "untyped shadowed property removed");
        assert!(properties.contains_key("id"), "typed property kept");
    }

    #[test]
    fn later_value_overrides_removed() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Setting:
      allOf:
        - type: object
          properties:
            value:
              type: string
          required: [value]
        - type: object
          properties:
            value:
              type: string
            note:
              type: string
          required: [value, note]
");
        remove_redundant_derived_value(&mut doc, &CancellationToken::new()).unwrap();

        let setting = doc.schemas().unwrap()["Setting"].as_item().unwrap();
        let all_of = setting.all_of.as_ref().unwrap();

        let first = all_of[0].as_item().unwrap();
        assert!(first.properties.as_ref().unwrap().contains_key("value"));

        let second = all_of[1].as_item().unwrap();
        assert!(!second.properties.as_ref().unwrap().contains_key("value"));
        assert_eq!(second.required.as_deref(), Some(&["note".to_string()][..]));
    }

    #[test]
    fn inline_value_enum_extracted() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    TlsSetting:
      type: object
      properties:
        value:
          type: string
          enum: ['1.0', '1.1', '1.2']
");
        fix_all_inline_value_enums(&mut doc, &CancellationToken::new()).unwrap();

        let schemas = doc.schemas().unwrap();
        let extracted = schemas["TlsSetting_value"].as_item().unwrap();
        assert!(extracted.is_type("string"));
        assert_eq!(extracted.enum_values.as_ref().unwrap().len(), 3);

        let owner = schemas["TlsSetting"].as_item().unwrap();
        assert_eq!(
            owner.properties.as_ref().unwrap()["value"].referenced_schema(),
            Some("TlsSetting_value")
        );
    }

    #[test]
    fn override_value_enum_extracted() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    MinTls:
      allOf:
        - $ref: '#/components/schemas/Base'
        - type: object
          properties:
            value:
              type: string
              enum: [on, off]
    Base:
      type: object
");
        fix_all_inline_value_enums(&mut doc, &CancellationToken::new()).unwrap();

        let schemas = doc.schemas().unwrap();
        assert!(schemas.contains_key("MinTls_value"));
        let owner = schemas["MinTls"].as_item().unwrap();
        let override_fragment = owner.all_of.as_ref().unwrap()[1].as_item().unwrap();
        assert_eq!(
            override_fragment.properties.as_ref().unwrap()["value"].referenced_schema(),
            Some("MinTls_value")
        );
    }
}
