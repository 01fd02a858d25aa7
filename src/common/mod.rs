//! Common utilities shared across scout

pub mod error;
pub mod logging;
pub mod paths;
pub mod settings;

pub use error::{Error, Result};
pub use settings::Settings;

/// Humanize an identifier and capitalize every word
///
/// `api_smoke` and `apiSmoke` both become `Api Smoke`; a trailing `_id` is
/// dropped and hyphens are treated like underscores.
pub fn titleize(name: &str) -> String {
    let trimmed = name.strip_suffix("_id").unwrap_or(name);
    trimmed
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .flat_map(split_camel_case)
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split at lowercase-or-digit to uppercase boundaries
fn split_camel_case(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (i, c) in word.char_indices() {
        if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            parts.push(&word[start..i]);
            start = i;
        }
        prev = Some(c);
    }
    parts.push(&word[start..]);
    parts
}

/// Uppercase the first character and lowercase the rest
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titleize() {
        assert_eq!(titleize("smoke"), "Smoke");
        assert_eq!(titleize("api_smoke"), "Api Smoke");
        assert_eq!(titleize("user-login_flow"), "User Login Flow");
        assert_eq!(titleize("account_id"), "Account");
    }

    #[test]
    fn test_titleize_splits_camel_case() {
        assert_eq!(titleize("apiSmoke"), "Api Smoke");
        assert_eq!(titleize("checkoutFlow_v2Beta"), "Checkout Flow V2 Beta");
        assert_eq!(titleize("API"), "Api");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("staging"), "Staging");
        assert_eq!(capitalize("PROD"), "Prod");
        assert_eq!(capitalize(""), "");
    }
}
