//! Identifier sanitization and uniqueness helpers.
//!
//! Pure string functions only; the document-level renaming passes that use
//! them live in [`crate::passes::identifiers`].

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Produce a component name acceptable to code generators.
///
/// Sanitizes, prepends `C` when the first character is not a letter, and
/// falls back to `UnnamedComponent` for empty input.
pub fn validate_component(input: &str) -> String {
    if input.is_empty() {
        return "UnnamedComponent".to_string();
    }
    let sanitized = sanitize(input);
    if sanitized.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        sanitized
    } else {
        format!("C{sanitized}")
    }
}

/// Normalize an operation id into dash-separated form.
///
/// Strips parentheses, replaces runs of non-alphanumerics with a single `-`,
/// trims dashes, prepends `op-` when the first character is not a letter,
/// and falls back to `unnamed` for empty results.
pub fn normalize_op_id(input: &str) -> String {
    let mut normalized = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '(' || c == ')' {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            normalized.push(c);
        } else if !normalized.ends_with('-') {
            normalized.push('-');
        }
    }
    let trimmed = normalized.trim_matches('-');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }
    if trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        trimmed.to_string()
    } else {
        format!("op-{trimmed}")
    }
}

/// Loose identifier rule: non-empty, every character in `[A-Za-z0-9_\-.]`.
pub fn is_valid_identifier(input: &str) -> bool {
    !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Strict rule for generator-facing component names:
/// `^[A-Za-z][A-Za-z0-9_]*$`.
pub fn is_strict_identifier(input: &str) -> bool {
    let mut chars = input.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Disambiguate `candidate` against `is_taken` by appending `_1`, `_2`, ….
///
/// Callers decide the comparison universe; every renaming pass compares
/// case-insensitively, so `is_taken` should too.
pub fn unique_name(candidate: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(candidate) {
        return candidate.to_string();
    }
    let mut counter = 1usize;
    loop {
        let numbered = format!("{candidate}_{counter}");
        if !is_taken(&numbered) {
            return numbered;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sanitize_replaces_punctuation() {
        assert_eq!(sanitize("user.name-v2"), "user_name_v2");
        assert_eq!(sanitize("已支付"), "___");
    }

    #[test]
    fn validate_component_covers_edge_cases() {
        assert_eq!(validate_component("User"), "User");
        assert_eq!(validate_component("user name"), "user_name");
        assert_eq!(validate_component("4xxError"), "C4xxError");
        assert_eq!(validate_component("_private"), "C_private");
        assert_eq!(validate_component(""), "UnnamedComponent");
    }

    #[test]
    fn normalize_op_id_strips_and_collapses() {
        assert_eq!(normalize_op_id("get /pets/{id}"), "get-pets-id");
        assert_eq!(normalize_op_id("list(All)Pets"), "listAllPets");
        assert_eq!(normalize_op_id("--weird--"), "weird");
        assert_eq!(normalize_op_id("42nd"), "op-42nd");
        assert_eq!(normalize_op_id("()"), "unnamed");
        assert_eq!(normalize_op_id(""), "unnamed");
    }

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("get-pets.v1_all"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("has space"));

        assert!(is_strict_identifier("Pet_2"));
        assert!(!is_strict_identifier("2Pet"));
        assert!(!is_strict_identifier("Pet-2"));
        assert!(!is_strict_identifier(""));
    }

    #[test]
    fn unique_name_appends_numeric_suffixes() {
        let taken = ["pet", "pet_1"];
        let is_taken = |candidate: &str| {
            taken
                .iter()
                .any(|name| name.eq_ignore_ascii_case(candidate))
        };
        assert_eq!(unique_name("Dog", is_taken), "Dog");
        assert_eq!(unique_name("Pet", is_taken), "Pet_2");
    }
}
