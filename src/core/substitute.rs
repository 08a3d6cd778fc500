// src/core/substitute.rs

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap();
}

/// Replaces every `{{name}}` token in `template` with its value from `values`.
///
/// Tokens without a matching value are left verbatim; this is not an error,
/// so a template can carry literal braces past the engine untouched. Repeated
/// occurrences of the same token are all substituted.
pub fn substitute(template: &str, values: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            match values.get(name) {
                Some(value) => value.clone(),
                // Keep the original token text, including its spacing.
                None => caps.get(0).map_or("", |m| m.as_str()).to_string(),
            }
        })
        .into_owned()
}

/// Substitutes placeholders in every value of an environment-binding list,
/// preserving binding order.
pub fn substitute_env(
    bindings: &[(String, String)],
    values: &HashMap<String, String>,
) -> HashMap<String, String> {
    bindings
        .iter()
        .map(|(key, template)| (key.clone(), substitute(template, values)))
        .collect()
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_token() {
        let vals = values(&[("x", "hi")]);
        assert_eq!(substitute("echo {{x}}", &vals), "echo hi");
    }

    #[test]
    fn test_unresolved_token_left_verbatim() {
        let vals = values(&[]);
        assert_eq!(substitute("echo {{y}}", &vals), "echo {{y}}");
    }

    #[test]
    fn test_repeated_token_all_substituted() {
        let vals = values(&[("name", "dev")]);
        assert_eq!(
            substitute("deploy {{name}} && tag {{name}}", &vals),
            "deploy dev && tag dev"
        );
    }

    #[test]
    fn test_mixed_resolved_and_unresolved() {
        let vals = values(&[("a", "1")]);
        assert_eq!(substitute("{{a}} {{b}} {{a}}", &vals), "1 {{b}} 1");
    }

    #[test]
    fn test_whitespace_inside_token_tolerated() {
        let vals = values(&[("input", "X")]);
        assert_eq!(substitute("echo {{ input }}", &vals), "echo X");
    }

    #[test]
    fn test_env_bindings_substituted_per_value() {
        let vals = values(&[("target", "prod")]);
        let bindings = vec![
            ("DEPLOY_TARGET".to_string(), "{{target}}".to_string()),
            ("STATIC".to_string(), "fixed".to_string()),
        ];
        let env = substitute_env(&bindings, &vals);
        assert_eq!(env.get("DEPLOY_TARGET").map(String::as_str), Some("prod"));
        assert_eq!(env.get("STATIC").map(String::as_str), Some("fixed"));
    }
}
