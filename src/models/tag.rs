//! Tag model

use serde::{Deserialize, Serialize};

/// Maximum length of a tag
pub const MAX_TAG_LENGTH: usize = 30;

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub tag: String,
}

/// Split a comma-separated tag string into trimmed, deduplicated tags.
///
/// Matching is case-insensitive; the first spelling wins. Empty entries are dropped.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(
            parse_tag_list("rust, web ,, Rust,api"),
            vec!["rust".to_string(), "web".to_string(), "api".to_string()]
        );
        assert!(parse_tag_list(" , ").is_empty());
    }
}
