//! Snippet input validation
//!
//! `SnippetInput` is what a client submits; `ValidSnippet` is the only
//! thing the stores accept for create and update.

use serde::{Deserialize, Serialize};

use super::{TagSet, ValidationError, ValidationErrors};

/// Maximum length for snippet titles
const MAX_TITLE_LEN: usize = 120;

/// Maximum length for snippet bodies
const MAX_BODY_LEN: usize = 20_000;

/// Maximum length for snippet descriptions
const MAX_DESCRIPTION_LEN: usize = 2_000;

fn check_text(
    s: &str,
    field: &'static str,
    max: usize,
) -> Result<(), ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if s.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Validated snippet title (trimmed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetTitle(String);

impl SnippetTitle {
    /// # Example
    /// ```
    /// use snipbox_server::models::SnippetTitle;
    ///
    /// assert_eq!(SnippetTitle::new("  Jump to tag ").unwrap().as_str(), "Jump to tag");
    /// assert!(SnippetTitle::new("   ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        check_text(trimmed, "title", MAX_TITLE_LEN)?;
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated snippet body. Kept verbatim: leading indentation is code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetBody(String);

impl SnippetBody {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        check_text(s, "body", MAX_BODY_LEN)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated snippet description (trimmed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetDescription(String);

impl SnippetDescription {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        check_text(trimmed, "description", MAX_DESCRIPTION_LEN)?;
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw create/update submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnippetInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Submission that passed every field check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSnippet {
    pub title: SnippetTitle,
    pub body: SnippetBody,
    pub description: SnippetDescription,
    pub tags: TagSet,
}

impl SnippetInput {
    /// Check every field and collect all problems before failing.
    pub fn validate(&self) -> Result<ValidSnippet, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = SnippetTitle::new(&self.title)
            .map_err(|e| errors.push(e))
            .ok();
        let body = SnippetBody::new(&self.body).map_err(|e| errors.push(e)).ok();
        let description = SnippetDescription::new(&self.description)
            .map_err(|e| errors.push(e))
            .ok();
        let tags = match TagSet::parse(&self.tags) {
            Ok(tags) => Some(tags),
            Err(tag_errors) => {
                tag_errors.into_iter().for_each(|e| errors.push(e));
                None
            }
        };

        match (title, body, description, tags) {
            (Some(title), Some(body), Some(description), Some(tags)) if errors.is_empty() => {
                Ok(ValidSnippet {
                    title,
                    body,
                    description,
                    tags,
                })
            }
            _ => Err(errors),
        }
    }
}
