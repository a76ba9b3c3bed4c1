//! PostgreSQL snippet store
//!
//! Listing queries load author, score and tags in one statement and
//! comments in a second `ANY($1)` statement per page (no N+1).
//! Writes that span tables run in one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;

use crate::db::records::{Comment, Snippet, SnippetDetail, SnippetWithAuthor, TopSnippet, User};
use crate::db::store::{DbError, SnippetStore};
use crate::models::{Entity, Pagination, Ranking, UserId, ValidSnippet, VoteValue};
use super::{tags, votes};

/// Columns of a snippet row with author, score and tags.
const SNIPPET_COLUMNS: &str = r#"
    s.id, s.user_id, s.title, s.body, s.description, s.created_at, s.updated_at,
    u.name AS author_name,
    u.avatar_url AS author_avatar_url,
    u.profile_url AS author_profile_url,
    COALESCE((SELECT SUM(v.score) FROM votes v WHERE v.snippet_id = s.id), 0)::BIGINT AS score,
    COALESCE(
        (SELECT ARRAY_AGG(t.name ORDER BY t.name)
         FROM snippet_tags st
         JOIN tags t ON t.id = st.tag_id
         WHERE st.snippet_id = s.id),
        '{}'::TEXT[]
    ) AS tags
"#;

const SNIPPET_RETURNING: &str = "id, user_id, title, body, description, created_at, updated_at";

/// Full-text document over title, description and body. Must match the
/// expression of `idx_snippets_fulltext`.
const SEARCH_DOCUMENT: &str =
    "to_tsvector('english', s.title || ' ' || s.description || ' ' || s.body)";

/// `websearch_to_tsquery` accepts quoted phrases, `or` and `-term` and
/// never raises a syntax error on malformed input.
const SEARCH_QUERY: &str = "websearch_to_tsquery('english', $1)";

/// Per-snippet aggregate for ranked listings (left outer: missing = 0).
fn ranked_aggregate(ranking: Ranking) -> &'static str {
    match ranking {
        Ranking::ByScore => {
            r#"
            SELECT s.id, COALESCE(SUM(v.score), 0)::BIGINT AS total
            FROM snippets s
            LEFT JOIN votes v ON v.snippet_id = s.id
            GROUP BY s.id
            "#
        }
        Ranking::ByCommentCount => {
            r#"
            SELECT s.id, COUNT(c.id)::BIGINT AS total
            FROM snippets s
            LEFT JOIN comments c ON c.snippet_id = s.id
            GROUP BY s.id
            "#
        }
    }
}

/// Single winner for the top widgets (inner join: needs at least one row).
fn top_query(ranking: Ranking) -> &'static str {
    match ranking {
        Ranking::ByScore => {
            r#"
            SELECT s.id, s.title, SUM(v.score)::BIGINT AS total
            FROM snippets s
            JOIN votes v ON v.snippet_id = s.id
            GROUP BY s.id, s.title
            ORDER BY total DESC, s.id DESC
            LIMIT 1
            "#
        }
        Ranking::ByCommentCount => {
            r#"
            SELECT s.id, s.title, COUNT(c.id)::BIGINT AS total
            FROM snippets s
            JOIN comments c ON c.snippet_id = s.id
            GROUP BY s.id, s.title
            ORDER BY total DESC, s.id DESC
            LIMIT 1
            "#
        }
    }
}

#[derive(Debug, FromRow)]
struct SnippetRow {
    id: i64,
    user_id: i64,
    title: String,
    body: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_name: String,
    author_avatar_url: Option<String>,
    author_profile_url: Option<String>,
    score: i64,
    tags: Vec<String>,
}

impl SnippetRow {
    fn into_detail(self, comments: Vec<Comment>) -> SnippetDetail {
        SnippetDetail {
            author: User {
                id: self.user_id,
                name: self.author_name,
                avatar_url: self.author_avatar_url,
                profile_url: self.author_profile_url,
            },
            snippet: Snippet {
                id: self.id,
                user_id: self.user_id,
                title: self.title,
                body: self.body,
                description: self.description,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            comments,
            score: self.score,
            tags: self.tags,
        }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_foreign_key_violation())
        .unwrap_or(false)
}

async fn commit(tx: Transaction<'_, Postgres>, resource: &'static str) -> Result<(), DbError> {
    tx.commit()
        .await
        .map_err(|source| DbError::InconsistentWrite { resource, source })
}

/// Snippet store backed by PostgreSQL
#[derive(Clone)]
pub struct PgSnippetStore {
    pool: PgPool,
}

impl PgSnippetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach comments to a page of rows, keeping row order.
    async fn with_comments(&self, rows: Vec<SnippetRow>) -> Result<Vec<SnippetDetail>, DbError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let comments: Vec<Comment> = sqlx::query_as(
            r#"
            SELECT id, snippet_id, user_id, body, created_at
            FROM comments
            WHERE snippet_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_snippet: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in comments {
            by_snippet.entry(comment.snippet_id).or_default().push(comment);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let comments = by_snippet.remove(&row.id).unwrap_or_default();
                row.into_detail(comments)
            })
            .collect())
    }
}

#[async_trait]
impl SnippetStore for PgSnippetStore {
    #[instrument(skip(self))]
    async fn recent(&self, page: Pagination) -> Result<Vec<SnippetDetail>, DbError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM snippets s
            JOIN users u ON u.id = s.user_id
            ORDER BY s.id DESC
            LIMIT $1 OFFSET $2
            "#,
            SNIPPET_COLUMNS
        );

        let rows: Vec<SnippetRow> = sqlx::query_as(&sql)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        self.with_comments(rows).await
    }

    #[instrument(skip(self))]
    async fn recent_with_authors(&self, limit: u32) -> Result<Vec<SnippetWithAuthor>, DbError> {
        let rows: Vec<SnippetRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM snippets s
            JOIN users u ON u.id = s.user_id
            ORDER BY s.id DESC
            LIMIT $1
            "#,
            SNIPPET_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let detail = row.into_detail(Vec::new());
                SnippetWithAuthor {
                    snippet: detail.snippet,
                    author: detail.author,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn ranked(
        &self,
        ranking: Ranking,
        page: Pagination,
    ) -> Result<Vec<SnippetDetail>, DbError> {
        // Both fragments are static SQL selected by enum
        let sql = format!(
            r#"
            WITH ranked AS ({}),
            page AS (
                SELECT id, total FROM ranked
                ORDER BY total DESC, id ASC
                LIMIT $1 OFFSET $2
            )
            SELECT {}
            FROM page p
            JOIN snippets s ON s.id = p.id
            JOIN users u ON u.id = s.user_id
            ORDER BY p.total DESC, s.id ASC
            "#,
            ranked_aggregate(ranking),
            SNIPPET_COLUMNS
        );

        let rows: Vec<SnippetRow> = sqlx::query_as(&sql)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        self.with_comments(rows).await
    }

    #[instrument(skip(self))]
    async fn top(&self, ranking: Ranking) -> Result<Option<TopSnippet>, DbError> {
        let top: Option<TopSnippet> = sqlx::query_as(top_query(ranking))
            .fetch_optional(&self.pool)
            .await?;
        Ok(top)
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, page: Pagination) -> Result<Vec<SnippetDetail>, DbError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM snippets s
            JOIN users u ON u.id = s.user_id
            WHERE {} @@ {}
            ORDER BY
                ts_rank(to_tsvector('english', s.title), {}) DESC,
                ts_rank({}, {}) DESC,
                s.id DESC
            LIMIT $2 OFFSET $3
            "#,
            SNIPPET_COLUMNS, SEARCH_DOCUMENT, SEARCH_QUERY, SEARCH_QUERY, SEARCH_DOCUMENT, SEARCH_QUERY
        );

        let rows: Vec<SnippetRow> = sqlx::query_as(&sql)
            .bind(query)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        self.with_comments(rows).await
    }

    #[instrument(skip(self))]
    async fn search_count(&self, query: &str) -> Result<i64, DbError> {
        let sql = format!(
            "SELECT COUNT(*) FROM snippets s WHERE {} @@ {}",
            SEARCH_DOCUMENT, SEARCH_QUERY
        );

        let total: i64 = sqlx::query_scalar(&sql)
            .bind(query)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn count(&self, entity: Entity) -> Result<i64, DbError> {
        // Table name comes from a closed enum
        let sql = format!("SELECT COUNT(*) FROM {}", entity.table());
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(total)
    }

    #[instrument(skip(self))]
    async fn find(&self, id: i64) -> Result<Option<SnippetDetail>, DbError> {
        let row: Option<SnippetRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM snippets s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
            SNIPPET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_comments(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, snippet), fields(owner = %owner))]
    async fn insert(&self, owner: UserId, snippet: &ValidSnippet) -> Result<Snippet, DbError> {
        let mut tx = self.pool.begin().await?;

        let created: Snippet = sqlx::query_as(&format!(
            r#"
            INSERT INTO snippets (user_id, title, body, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SNIPPET_RETURNING
        ))
        .bind(owner.get())
        .bind(snippet.title.as_str())
        .bind(snippet.body.as_str())
        .bind(snippet.description.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DbError::not_found("user", owner)
            } else {
                DbError::from(e)
            }
        })?;

        tags::replace_tags(&mut tx, created.id, &snippet.tags).await?;
        votes::upsert_vote(&mut tx, created.id, owner, VoteValue::Up).await?;

        commit(tx, "snippet").await?;
        tracing::info!(snippet_id = created.id, "snippet created");
        Ok(created)
    }

    #[instrument(skip(self, snippet))]
    async fn update(&self, id: i64, snippet: &ValidSnippet) -> Result<Snippet, DbError> {
        let mut tx = self.pool.begin().await?;

        let updated: Snippet = sqlx::query_as(&format!(
            r#"
            UPDATE snippets
            SET title = $2, body = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SNIPPET_RETURNING
        ))
        .bind(id)
        .bind(snippet.title.as_str())
        .bind(snippet.body.as_str())
        .bind(snippet.description.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("snippet", id))?;

        tags::replace_tags(&mut tx, id, &snippet.tags).await?;

        commit(tx, "snippet").await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn cast_vote(
        &self,
        snippet_id: i64,
        user: UserId,
        vote: VoteValue,
    ) -> Result<i64, DbError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM snippets WHERE id = $1)")
            .bind(snippet_id)
            .fetch_one(&mut *tx)
            .await?;

        if !exists {
            return Err(DbError::not_found("snippet", snippet_id));
        }

        votes::upsert_vote(&mut tx, snippet_id, user, vote)
            .await
            .map_err(|e| match e {
                DbError::Sqlx(ref inner) if is_foreign_key_violation(inner) => {
                    DbError::not_found("user", user)
                }
                other => other,
            })?;
        let score = votes::score_of(&mut tx, snippet_id).await?;

        commit(tx, "vote").await?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrations, create_pool};
    use crate::models::SnippetInput;

    // Integration tests - run with DATABASE_URL set
    // cargo test -p snipbox-server -- --ignored

    async fn store() -> PgSnippetStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.expect("pool creation failed");
        migrations::run(&pool).await.expect("migrations failed");
        PgSnippetStore::new(pool)
    }

    async fn user(store: &PgSnippetStore, name: &str) -> UserId {
        let id: i64 = sqlx::query_scalar("INSERT INTO users (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(store.pool())
            .await
            .expect("user insert failed");
        UserId(id)
    }

    fn input(title: &str, tags: &[&str]) -> ValidSnippet {
        SnippetInput {
            title: title.into(),
            body: "nnoremap <leader>w :w<CR>".into(),
            description: "save quickly".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
        .validate()
        .expect("valid input")
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn insert_seeds_owner_vote_and_tags() {
        let store = store().await;
        let owner = user(&store, "pg-owner").await;

        let snippet = store
            .insert(owner, &input("Quick save", &["vim", "Regex"]))
            .await
            .expect("insert failed");

        let detail = store.find(snippet.id).await.unwrap().expect("snippet exists");
        assert_eq!(detail.score, 1);
        assert_eq!(detail.tags, vec!["regex", "vim"]);
        assert_eq!(detail.author.id, owner.get());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn update_replaces_tag_set() {
        let store = store().await;
        let owner = user(&store, "pg-tagger").await;
        let snippet = store
            .insert(owner, &input("Tagged", &["vim", "regex"]))
            .await
            .unwrap();

        store.update(snippet.id, &input("Tagged", &["vim"])).await.unwrap();
        store.update(snippet.id, &input("Tagged", &["vim"])).await.unwrap();

        let tags = tags::tags_for(store.pool(), snippet.id).await.unwrap();
        assert_eq!(tags, vec!["vim"]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn insert_for_unknown_user_is_not_found_and_writes_nothing() {
        let store = store().await;
        let before = store.count(Entity::Snippets).await.unwrap();

        let err = store
            .insert(UserId(i64::MAX), &input("Orphan", &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { resource: "user", .. }));
        assert_eq!(store.count(Entity::Snippets).await.unwrap(), before);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn repeated_votes_keep_one_row_per_user() {
        let store = store().await;
        let owner = user(&store, "pg-voter-owner").await;
        let voter = user(&store, "pg-voter").await;
        let snippet = store.insert(owner, &input("Votes", &[])).await.unwrap();

        store.cast_vote(snippet.id, voter, VoteValue::Up).await.unwrap();
        let score = store.cast_vote(snippet.id, voter, VoteValue::Down).await.unwrap();

        assert_eq!(score, 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn malformed_search_syntax_does_not_error() {
        let store = store().await;
        let page = Pagination::first();
        assert!(store.search("\"unbalanced -(( or", page).await.is_ok());
        assert!(store.search_count("+++ --- \"").await.is_ok());
    }
}
