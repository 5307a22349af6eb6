//! Token substitution for unit-file templates.
//!
//! Placeholders look like `%%NAME%%`. Every key present in the map is
//! replaced wherever it occurs; a placeholder with no matching key stays in
//! the output verbatim, never silently dropped.

use std::collections::BTreeMap;

/// Wrap a token name in its placeholder delimiters.
pub fn placeholder(name: &str) -> String {
    format!("%%{name}%%")
}

/// Replace every known placeholder in `template` with its mapped value.
pub fn expand_tokens(template: &str, tokens: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in tokens {
        out = out.replace(&placeholder(name), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let out = expand_tokens(
            "start %%NAME%%, stop %%NAME%%",
            &tokens(&[("NAME", "server1")]),
        );
        assert_eq!(out, "start server1, stop server1");
    }

    #[test]
    fn test_unknown_placeholder_passes_through() {
        let out = expand_tokens("User=%%WHO%%", &tokens(&[("NAME", "server1")]));
        assert_eq!(out, "User=%%WHO%%");
    }

    #[test]
    fn test_empty_value_erases_placeholder_only() {
        let out = expand_tokens("a %%GONE%% b", &tokens(&[("GONE", "")]));
        assert_eq!(out, "a  b");
    }
}
