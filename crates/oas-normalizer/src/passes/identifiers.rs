//! Identifier-stage passes: security scheme injection, conflicting-path
//! renames, component renames, and operation-id uniqueness.
//!
//! Ordering is significant and fixed by the driver:
//! `rename_invalid_component_schemas` →
//! `resolve_schema_operation_name_collisions` →
//! `ensure_unique_operation_ids`.

use std::collections::HashSet;

use indexmap::IndexMap;
use oas_model::{
    Document, Parameter, ParameterLocation, PathItem, RefOr, SecurityRequirement, SecurityScheme,
};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::{naming, refs};

/// Scheme key injected into `components.securitySchemes`.
const BEARER_SCHEME: &str = "bearerAuth";

/// Inject a bearer security scheme and relocate header `Authorization`
/// parameters into per-operation security requirements.
///
/// The scheme definition is merged into existing `securitySchemes` rather
/// than replacing them. Operations only gain a `security` entry when an
/// `Authorization` header parameter was actually removed from them, so no
/// new security behavior is introduced.
pub fn ensure_security_schemes(doc: &mut Document) {
    for (path, item) in &mut doc.paths {
        let path_had_auth = strip_authorization_params(&mut item.parameters);
        if path_had_auth {
            tracing::debug!(%path, "relocated path-level Authorization header to security requirement");
        }

        for (_, operation) in item.operations_mut() {
            let op_had_auth = strip_authorization_params(&mut operation.parameters);
            if (op_had_auth || path_had_auth) && operation.security.is_none() {
                operation.security = Some(vec![SecurityRequirement::scheme(BEARER_SCHEME)]);
            }
        }
    }

    doc.components_mut()
        .security_schemes
        .entry(BEARER_SCHEME.to_string())
        .or_insert_with(|| RefOr::Item(SecurityScheme::bearer()));
}

/// Remove `Authorization` header parameters; returns whether any were removed.
fn strip_authorization_params(parameters: &mut Option<Vec<RefOr<Parameter>>>) -> bool {
    let Some(list) = parameters.as_mut() else {
        return false;
    };
    let before = list.len();
    list.retain(|parameter| {
        parameter.as_item().is_none_or(|parameter| {
            parameter.location != ParameterLocation::Header
                || !parameter.name.eq_ignore_ascii_case("authorization")
        })
    });
    let removed = list.len() < before;
    if list.is_empty() {
        *parameters = None;
    }
    removed
}

/// Rename paths that collide in ways known to break generators.
///
/// Two deterministic heuristics:
/// - a template using the same parameter name twice gets positional
///   suffixes (`{id}` → `{id_2}`), with a matching path parameter entry
///   renamed or synthesized (`type: string`, `maxLength: 32`);
/// - a `…/item` path coexisting with `…/item/{id}` is renamed to `…/items`
///   (falling back to `…/item_list` when taken), so the two do not share a
///   generated wrapper name.
pub fn rename_conflicting_paths(doc: &mut Document) {
    let keys: Vec<String> = doc.paths.keys().cloned().collect();
    let existing: HashSet<String> = keys.iter().cloned().collect();

    let mut mapping: IndexMap<String, (String, Vec<(String, String)>)> = IndexMap::new();
    for key in &keys {
        let (deduped, renames) = dedupe_template_params(key);
        if deduped != *key {
            tracing::warn!(path = %key, renamed = %deduped, "duplicate path parameter names");
            mapping.insert(key.clone(), (deduped, renames));
            continue;
        }
        if key.ends_with("/item") && existing.contains(&format!("{key}/{{id}}")) {
            let plural = format!("{key}s");
            let target = if existing.contains(&plural) {
                format!("{key}_list")
            } else {
                plural
            };
            tracing::warn!(path = %key, renamed = %target, "path collides with its parameterized sibling");
            mapping.insert(key.clone(), (target, Vec::new()));
        }
    }

    if mapping.is_empty() {
        return;
    }

    let paths = std::mem::take(&mut doc.paths);
    for (key, mut item) in paths {
        match mapping.get(&key) {
            Some((new_key, renames)) => {
                apply_param_renames(&mut item, renames);
                doc.paths.insert(new_key.clone(), item);
            }
            None => {
                doc.paths.insert(key, item);
            }
        }
    }
}

/// Suffix repeated template parameter names; returns the rewritten template
/// and the `(old, new)` parameter renames it implies.
fn dedupe_template_params(path: &str) -> (String, Vec<(String, String)>) {
    let mut seen: IndexMap<String, usize> = IndexMap::new();
    let mut renames = Vec::new();
    let rewritten = path
        .split('/')
        .map(|segment| {
            let Some(name) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            else {
                return segment.to_string();
            };
            let count = seen.entry(name.to_string()).or_insert(0);
            *count += 1;
            if *count == 1 {
                segment.to_string()
            } else {
                let renamed = format!("{name}_{count}");
                renames.push((name.to_string(), renamed.clone()));
                format!("{{{renamed}}}")
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    (rewritten, renames)
}

/// Rename or synthesize path parameter entries to match renamed template
/// variables. The first entry under the old name stays; each extra rename
/// consumes the next duplicate entry, and a fresh entry is synthesized when
/// none is left.
fn apply_param_renames(item: &mut PathItem, renames: &[(String, String)]) {
    for (old, new) in renames {
        let mut remaining = 1usize; // skip the entry that keeps the old name
        let renamed = item
            .parameters
            .as_mut()
            .is_some_and(|parameters| rename_nth_param(parameters, old, new, &mut remaining));
        if !renamed {
            item.parameters
                .get_or_insert_with(Vec::new)
                .push(RefOr::Item(synthesized_path_param(new)));
        }
    }
}

fn rename_nth_param(
    parameters: &mut [RefOr<Parameter>],
    old: &str,
    new: &str,
    remaining: &mut usize,
) -> bool {
    for parameter in parameters.iter_mut() {
        let Some(parameter) = parameter.as_item_mut() else {
            continue;
        };
        if parameter.location == ParameterLocation::Path && parameter.name == old {
            if *remaining == 0 {
                parameter.name = new.to_string();
                return true;
            }
            *remaining -= 1;
        }
    }
    false
}

/// The parameter entry synthesized for an added template variable.
fn synthesized_path_param(name: &str) -> Parameter {
    let mut parameter = Parameter::path(name);
    if let Some(RefOr::Item(schema)) = parameter.schema.as_mut() {
        schema.max_length = Some(32);
    }
    parameter
}

/// Rename every component schema whose name fails the strict
/// `^[A-Za-z][A-Za-z0-9_]*$` rule, updating all references in lockstep.
pub fn rename_invalid_component_schemas(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(schemas) = doc.schemas() else {
        return Ok(());
    };

    let mut taken: HashSet<String> = schemas.keys().map(|name| name.to_lowercase()).collect();
    let mut mapping = IndexMap::new();
    for name in schemas.keys() {
        if naming::is_strict_identifier(name) {
            continue;
        }
        let candidate = naming::validate_component(name);
        let unique = naming::unique_name(&candidate, |c| taken.contains(&c.to_lowercase()));
        taken.insert(unique.to_lowercase());
        mapping.insert(name.clone(), unique);
    }

    refs::rename(doc, &mapping, cancel)
}

/// Rename component schemas whose name collides (case-insensitively) with
/// an operation id, appending `Body` and numeric suffixes as needed.
pub fn resolve_schema_operation_name_collisions(
    doc: &mut Document,
    cancel: &CancellationToken,
) -> Result<()> {
    let op_ids: HashSet<String> = doc
        .operations()
        .filter_map(|(_, _, operation)| operation.operation_id.as_deref())
        .map(str::to_lowercase)
        .collect();

    let Some(schemas) = doc.schemas() else {
        return Ok(());
    };

    let mut taken: HashSet<String> = schemas.keys().map(|name| name.to_lowercase()).collect();
    taken.extend(op_ids.iter().cloned());

    let mut mapping = IndexMap::new();
    for name in schemas.keys() {
        if !op_ids.contains(&name.to_lowercase()) {
            continue;
        }
        let candidate = format!("{name}Body");
        let unique = naming::unique_name(&candidate, |c| taken.contains(&c.to_lowercase()));
        taken.insert(unique.to_lowercase());
        mapping.insert(name.clone(), unique);
    }

    refs::rename(doc, &mapping, cancel)
}

/// Assign deterministic ids to operations that lack one, repair invalid
/// ids, and disambiguate case-insensitive duplicates with `_n` suffixes.
pub fn ensure_unique_operation_ids(doc: &mut Document) {
    // Pass 1: synthesize missing ids and repair invalid ones.
    for (path, item) in &mut doc.paths {
        let stripped: String = path
            .chars()
            .filter(|c| !matches!(c, '/' | '{' | '}'))
            .collect();
        for (method, operation) in item.operations_mut() {
            match operation.operation_id.as_deref() {
                None => {
                    operation.operation_id = Some(format!("{}_{stripped}", method.as_str()));
                }
                Some(id) if !naming::is_valid_identifier(id) => {
                    let normalized = naming::normalize_op_id(id);
                    tracing::debug!(old = %id, new = %normalized, "normalized invalid operation id");
                    operation.operation_id = Some(normalized);
                }
                Some(_) => {}
            }
        }
    }

    // Pass 2: case-insensitive de-duplication in document order.
    let mut seen: HashSet<String> = HashSet::new();
    for (_, item) in &mut doc.paths {
        for (_, operation) in item.operations_mut() {
            let Some(id) = operation.operation_id.clone() else {
                continue;
            };
            let unique = naming::unique_name(&id, |c| seen.contains(&c.to_lowercase()));
            seen.insert(unique.to_lowercase());
            if unique != id {
                operation.operation_id = Some(unique);
            }
        }
    }
}
