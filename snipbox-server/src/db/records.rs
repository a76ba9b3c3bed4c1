//! Records returned by snippet stores

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Snippet record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Snippet {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile of a snippet owner or commenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
}

/// Comment record (read-only here)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub snippet_id: i64,
    pub user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Snippet with author, comments, score and tags loaded eagerly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetDetail {
    #[serde(flatten)]
    pub snippet: Snippet,
    pub author: User,
    pub comments: Vec<Comment>,
    pub score: i64,
    pub tags: Vec<String>,
}

impl SnippetDetail {
    pub fn id(&self) -> i64 {
        self.snippet.id
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

/// Snippet with its author only (feed entries)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetWithAuthor {
    #[serde(flatten)]
    pub snippet: Snippet,
    pub author: User,
}

/// Winner of a top-N aggregate query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize, FromRow)]
pub struct TopSnippet {
    pub id: i64,
    pub title: String,
    /// Vote sum or comment count, depending on the ranking
    pub total: i64,
}
