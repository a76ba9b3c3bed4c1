//! Closed set of aggregate orderings and counted entities

use serde::{Deserialize, Serialize};

/// Aggregate used to order snippets.
///
/// Each variant maps to one left-outer aggregation over a related table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// `SUM(votes.score)`
    ByScore,
    /// `COUNT(comments.id)`
    ByCommentCount,
}

impl Ranking {
    /// Fixed key under which the top snippet for this ranking is remembered.
    pub fn top_cache_key(&self) -> &'static str {
        match self {
            Self::ByScore => "topSnippetByScore",
            Self::ByCommentCount => "topCommentedSnippet",
        }
    }

    /// Heading shown above a ranked listing.
    pub fn title(&self) -> &'static str {
        match self {
            Self::ByScore => "Top Voted Snippets",
            Self::ByCommentCount => "Most Commented Snippets",
        }
    }
}

/// Entities counted for the site statistics panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Snippets,
    Comments,
    Users,
}

impl Entity {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Snippets => "snippets",
            Self::Comments => "comments",
            Self::Users => "users",
        }
    }

    pub fn count_cache_key(&self) -> &'static str {
        match self {
            Self::Snippets => "count:snippets",
            Self::Comments => "count:comments",
            Self::Users => "count:users",
        }
    }
}
