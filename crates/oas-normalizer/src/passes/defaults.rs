//! Default-value repair: coerce `default` to the schema's type, align it
//! with `enum` values, and strip defaults that cannot be made valid.

use oas_model::{Any, Document, Schema};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::walk;

/// Repair invalid `default` values on every schema in the document.
///
/// Enum-bearing schemas match their default against the enum by string form
/// (case-insensitively), replacing it with the matching element or the
/// first element. Typed schemas coerce by type; hopeless defaults clear.
pub fn fix_invalid_defaults(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(schema) = slot.as_item_mut() {
            fix_schema_default(location, schema);
        }
        Ok(())
    })
}

fn fix_schema_default(location: &str, schema: &mut Schema) {
    if schema.has_enum() {
        align_default_with_enum(schema);
        return;
    }
    let Some(default) = schema.default.as_ref() else {
        return;
    };

    match schema.schema_type.as_deref() {
        Some("boolean") => {
            schema.default = Some(Any::Bool(coerce_boolean(default)));
        }
        Some("array") => {
            if !default.is_array() {
                tracing::debug!(%location, "replaced non-array default with empty array");
                schema.default = Some(Any::Array(Vec::new()));
            }
        }
        Some("integer") => {
            schema.default = coerce_integer(default).or_else(|| {
                tracing::debug!(%location, "cleared non-integer default");
                None
            });
        }
        Some("number") => {
            schema.default = coerce_number(default).or_else(|| {
                tracing::debug!(%location, "cleared non-numeric default");
                None
            });
        }
        Some("string") if schema.format.as_deref() == Some("date-time") => {
            let valid = default
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok());
            if !valid {
                tracing::debug!(%location, "cleared unparseable date-time default");
                schema.default = None;
            }
        }
        Some("object") => {
            if !default.is_object() {
                tracing::debug!(%location, "cleared non-object default on object schema");
                schema.default = None;
            }
        }
        // A string default on a typeless composed schema is almost
        // certainly a documentation leftover; always cleared.
        None if default.is_string() && schema.has_composition() => {
            tracing::debug!(%location, "cleared string default on typeless composed schema");
            schema.default = None;
        }
        _ => {}
    }
}

/// Replace the default with the enum element matching its string form
/// (case-insensitively), or with the first element when nothing matches.
fn align_default_with_enum(schema: &mut Schema) {
    let Some(enum_values) = schema.enum_values.as_ref() else {
        return;
    };
    let Some(default) = schema.default.as_ref() else {
        return;
    };

    let wanted = string_form(default);
    let matched = wanted.as_ref().and_then(|wanted| {
        enum_values.iter().find(|element| {
            string_form(element).is_some_and(|form| form.eq_ignore_ascii_case(wanted))
        })
    });
    let replacement = matched.or_else(|| enum_values.first()).cloned();

    if schema.default != replacement {
        schema.default = replacement;
    }
}

/// The invariant string form used for enum comparison: strings as-is,
/// numbers and booleans via their canonical rendering.
fn string_form(value: &Any) -> Option<String> {
    match value {
        Any::String(s) => Some(s.clone()),
        Any::Number(n) => Some(n.to_string()),
        Any::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `true`/`false`, the strings `"true"`/`"false"`, and the integers 0/1;
/// everything else is `false`.
fn coerce_boolean(value: &Any) -> bool {
    match value {
        Any::Bool(b) => *b,
        Any::String(s) => s.eq_ignore_ascii_case("true"),
        Any::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn coerce_integer(value: &Any) -> Option<Any> {
    match value {
        Any::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Any::String(s) => s.trim().parse::<i64>().ok().map(Any::from),
        _ => None,
    }
}

fn coerce_number(value: &Any) -> Option<Any> {
    match value {
        Any::Number(_) => Some(value.clone()),
        Any::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Any::Number),
        _ => None,
    }
}

/// Drop empty-string defaults and examples and `null` enum elements.
pub fn deep_clean_schema(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |_, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        if schema.default.as_ref().and_then(Any::as_str) == Some("") {
            schema.default = None;
        }
        if schema.example.as_ref().and_then(Any::as_str) == Some("") {
            schema.example = None;
        }
        if let Some(enum_values) = schema.enum_values.as_mut() {
            enum_values.retain(|element| !element.is_null());
            if enum_values.is_empty() {
                schema.enum_values = None;
            }
        }
        Ok(())
    })
}

/// Final object-default stripper: object schemas keep only object defaults.
pub fn remove_invalid_defaults(doc: &mut Document, cancel: &CancellationToken) -> Result<()> {
    walk::try_for_each_schema_slot(doc, |location, slot| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(schema) = slot.as_item_mut() else {
            return Ok(());
        };
        let invalid = schema.is_type("object")
            && schema.default.as_ref().is_some_and(|default| !default.is_object());
        if invalid {
            tracing::debug!(%location, "stripped non-object default from object schema");
            schema.default = None;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn doc(yaml: &str) -> Document {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn default_of(doc: &Document, name: &str) -> Option<Any> {
        doc.schemas().unwrap()[name].as_item().unwrap().default.clone()
    }

    #[test]
    fn enum_default_matched_case_insensitively() {
        let mut doc = doc(r#"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Level:
      type: string
      enum: [a, b]
      default: A
    Fallback:
      type: string
      enum: [x, y]
      default: z
    Numeric:
      type: integer
      enum: [1, 2]
      default: "2"
"#);
        let cancel = CancellationToken::new();
        fix_invalid_defaults(&mut doc, &cancel).unwrap();

        assert_eq!(default_of(&doc, "Level"), Some(json!("a")));
        assert_eq!(default_of(&doc, "Fallback"), Some(json!("x")));
        // String "2" matches the integer element 2 and keeps its JSON kind.
        assert_eq!(default_of(&doc, "Numeric"), Some(json!(2)));
    }

    #[test]
    fn typed_defaults_coerced() {
        let mut doc = doc(r#"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    FlagTrue:
      type: boolean
      default: "true"
    FlagOne:
      type: boolean
      default: 1
    FlagJunk:
      type: boolean
      default: maybe
    List:
      type: array
      items: {type: string}
      default: nope
    Count:
      type: integer
      default: "42"
    CountJunk:
      type: integer
      default: forty-two
    Ratio:
      type: number
      default: "1.5"
    Stamp:
      type: string
      format: date-time
      default: not-a-date
    StampOk:
      type: string
      format: date-time
      default: "2023-01-15T09:30:00Z"
"#);
        let cancel = CancellationToken::new();
        fix_invalid_defaults(&mut doc, &cancel).unwrap();

        assert_eq!(default_of(&doc, "FlagTrue"), Some(json!(true)));
        assert_eq!(default_of(&doc, "FlagOne"), Some(json!(true)));
        assert_eq!(default_of(&doc, "FlagJunk"), Some(json!(false)));
        assert_eq!(default_of(&doc, "List"), Some(json!([])));
        assert_eq!(default_of(&doc, "Count"), Some(json!(42)));
        assert_eq!(default_of(&doc, "CountJunk"), None);
        assert_eq!(default_of(&doc, "Ratio"), Some(json!(1.5)));
        assert_eq!(default_of(&doc, "Stamp"), None);
        assert_eq!(
            default_of(&doc, "StampOk"),
            Some(json!("2023-01-15T09:30:00Z"))
        );
    }

    #[test]
    fn typeless_composed_string_default_cleared() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Composed:
      allOf:
        - $ref: '#/components/schemas/Base'
      default: leftover text
    Base:
      type: object
");
        let cancel = CancellationToken::new();
        fix_invalid_defaults(&mut doc, &cancel).unwrap();
        assert_eq!(default_of(&doc, "Composed"), None);
    }

    #[test]
    fn object_schema_with_scalar_default_cleared() {
        let mut doc = doc(r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Settings:
      type: object
      default: on
");
        let cancel = CancellationToken::new();
        fix_invalid_defaults(&mut doc, &cancel).unwrap();
        assert_eq!(default_of(&doc, "Settings"), None);
    }

    #[test]
    fn deep_clean_drops_empty_strings_and_null_enum_elements() {
        let mut doc = doc(r#"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Noisy:
      type: string
      default: ""
      example: ""
      enum: [a, null, b]
"#);
        deep_clean_schema(&mut doc, &CancellationToken::new()).unwrap();

        let noisy = doc.schemas().unwrap()["Noisy"].as_item().unwrap();
        assert_eq!(noisy.default, None);
        assert_eq!(noisy.example, None);
        assert_eq!(
            noisy.enum_values,
            Some(vec![json!("a"), json!("b")])
        );
    }

    #[test]
    fn final_stripper_removes_scalar_object_defaults() {
        let mut doc = doc(r#"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Conf:
      type: object
      default: "{}"
    Good:
      type: object
      default: {}
"#);
        remove_invalid_defaults(&mut doc, &CancellationToken::new()).unwrap();
        assert_eq!(default_of(&doc, "Conf"), None);
        assert_eq!(default_of(&doc, "Good"), Some(json!({})));
    }
}
