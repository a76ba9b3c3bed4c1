//! Tag name normalization and validation
//!
//! Tags are stored lowercase with inner whitespace collapsed to `-`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Maximum length for a single tag
const MAX_TAG_LEN: usize = 32;

/// Maximum number of tags on one snippet
pub const MAX_TAGS: usize = 5;

/// Tag pattern: starts with alphanumeric, allows a few symbols seen in
/// language names (`c++`, `c#`, `node.js`).
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9+#._-]*$").expect("invalid tag regex"));

/// Validated, normalized tag name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagName(String);

impl TagName {
    /// Normalize and validate a tag.
    ///
    /// # Example
    /// ```
    /// use snipbox_server::models::TagName;
    ///
    /// assert_eq!(TagName::new("  Vim Script ").unwrap().as_str(), "vim-script");
    /// assert!(TagName::new("").is_err());
    /// assert!(TagName::new("-dash").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = normalize(s);

        if normalized.is_empty() {
            return Err(ValidationError::Empty { field: "tags" });
        }

        if normalized.chars().count() > MAX_TAG_LEN {
            return Err(ValidationError::TooLong {
                field: "tags",
                max: MAX_TAG_LEN,
            });
        }

        if !TAG_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat {
                field: "tags",
                reason: "tags must start with a letter or digit and use only letters, digits, '+', '#', '.', '_' or '-'",
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Ordered, duplicate-free set of tags for one snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<TagName>);

impl TagSet {
    /// Build a tag set from raw names, keeping first occurrences.
    ///
    /// Every invalid tag is reported; the count limit applies after
    /// duplicates are dropped.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, Vec<ValidationError>> {
        let mut tags: Vec<TagName> = Vec::with_capacity(raw.len());
        let mut errors = Vec::new();

        for name in raw {
            match TagName::new(name.as_ref()) {
                Ok(tag) if !tags.contains(&tag) => tags.push(tag),
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }

        if tags.len() > MAX_TAGS {
            errors.push(ValidationError::TooMany {
                field: "tags",
                max: MAX_TAGS,
            });
        }

        if errors.is_empty() {
            Ok(Self(tags))
        } else {
            Err(errors)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names as plain strings, in submission order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|t| t.as_str().to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(TagName::new("Regex").unwrap().as_str(), "regex");
        assert_eq!(TagName::new(" key  maps ").unwrap().as_str(), "key-maps");
    }

    #[test]
    fn accepts_language_names() {
        assert!(TagName::new("c++").is_ok());
        assert!(TagName::new("c#").is_ok());
        assert!(TagName::new("node.js").is_ok());
    }

    #[test]
    fn rejects_bad_format() {
        let err = TagName::new("vim!").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn max_length() {
        assert!(TagName::new(&"a".repeat(32)).is_ok());
        let err = TagName::new(&"a".repeat(33)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 32, .. }));
    }

    #[test]
    fn set_drops_duplicates_after_normalization() {
        let set = TagSet::parse(&["vim", "Vim", "regex", " VIM "]).unwrap();
        assert_eq!(set.names(), vec!["vim", "regex"]);
    }

    #[test]
    fn set_limits_count() {
        let errs = TagSet::parse(&["a", "b", "c", "d", "e", "f"]).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ValidationError::TooMany { max: 5, .. })));
    }

    #[test]
    fn set_reports_every_bad_tag() {
        let errs = TagSet::parse(&["ok", "", "bad!"]).unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn empty_input_is_empty_set() {
        let set = TagSet::parse::<&str>(&[]).unwrap();
        assert!(set.is_empty());
    }
}
