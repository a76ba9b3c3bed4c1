//! Data store seam consumed by the snippet repository
//!
//! `PgSnippetStore` backs production; `MemoryStore` backs tests and
//! `serve --in-memory`. Both implement the same ordering and
//! atomicity rules.

use async_trait::async_trait;

use super::records::{Snippet, SnippetDetail, SnippetWithAuthor, TopSnippet};
use crate::models::{Entity, Pagination, Ranking, UserId, ValidSnippet, VoteValue};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// Commit was sent but its outcome is unknown; the rows may or may
    /// not exist.
    #[error("write outcome unknown for {resource}: {source}")]
    InconsistentWrite {
        resource: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Snippets by id descending, with comments and author.
    async fn recent(&self, page: Pagination) -> Result<Vec<SnippetDetail>, DbError>;

    /// Most recent snippets with author only.
    async fn recent_with_authors(&self, limit: u32) -> Result<Vec<SnippetWithAuthor>, DbError>;

    /// Snippets ordered by aggregate descending, then id ascending.
    ///
    /// Snippets without votes/comments are included with aggregate 0.
    async fn ranked(
        &self,
        ranking: Ranking,
        page: Pagination,
    ) -> Result<Vec<SnippetDetail>, DbError>;

    /// Highest aggregate among snippets that have at least one related
    /// row; ties go to the highest id.
    async fn top(&self, ranking: Ranking) -> Result<Option<TopSnippet>, DbError>;

    /// Full-text matches ordered by title relevance, then combined
    /// relevance, then id descending.
    async fn search(&self, query: &str, page: Pagination) -> Result<Vec<SnippetDetail>, DbError>;

    /// Number of snippets matched by the same predicate as `search`.
    async fn search_count(&self, query: &str) -> Result<i64, DbError>;

    async fn count(&self, entity: Entity) -> Result<i64, DbError>;

    async fn find(&self, id: i64) -> Result<Option<SnippetDetail>, DbError>;

    /// Insert a snippet, its tags and the owner's +1 vote as one unit.
    async fn insert(&self, owner: UserId, snippet: &ValidSnippet) -> Result<Snippet, DbError>;

    /// Overwrite title/body/description and replace tags as one unit.
    async fn update(&self, id: i64, snippet: &ValidSnippet) -> Result<Snippet, DbError>;

    /// Upsert `user`'s vote on a snippet; returns the new score.
    async fn cast_vote(
        &self,
        snippet_id: i64,
        user: UserId,
        vote: VoteValue,
    ) -> Result<i64, DbError>;
}
