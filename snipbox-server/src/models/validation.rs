//! Validation error types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Validation error for a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Collection field holds more entries than allowed
    TooMany { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., tag slug)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::TooMany { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidVariant { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::TooMany { field, max } => {
                write!(f, "{} accepts at most {} entries", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// All field problems found in one submission.
///
/// Serializes as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether any error was recorded against `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field() == field)
    }

    /// Group messages by field name.
    pub fn to_map(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.field()).or_default().push(error.to_string());
        }
        map
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "title",
            max: 120,
        };
        assert_eq!(
            err.to_string(),
            "title exceeds maximum length of 120 characters"
        );
    }

    #[test]
    fn groups_messages_by_field() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::Empty { field: "title" });
        errors.push(ValidationError::TooMany { field: "tags", max: 5 });
        errors.push(ValidationError::InvalidFormat {
            field: "tags",
            reason: "bad tag",
        });

        let map = errors.to_map();
        assert_eq!(map["title"], vec!["title cannot be empty".to_string()]);
        assert_eq!(map["tags"].len(), 2);
        assert!(errors.contains("tags"));
        assert!(!errors.contains("body"));
    }

    #[test]
    fn serializes_as_field_map() {
        let errors = ValidationErrors::from(ValidationError::Empty { field: "body" });
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "body": ["body cannot be empty"] }));
    }
}
