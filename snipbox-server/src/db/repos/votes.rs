//! Vote repository
//!
//! One vote per (snippet, user), enforced by the `votes_snippet_user_key`
//! unique constraint and written with an upsert.

use sqlx::PgConnection;

use crate::models::{UserId, VoteValue};
use super::DbError;

/// Insert or replace `user`'s vote on a snippet.
pub async fn upsert_vote(
    conn: &mut PgConnection,
    snippet_id: i64,
    user: UserId,
    vote: VoteValue,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO votes (snippet_id, user_id, score)
        VALUES ($1, $2, $3)
        ON CONFLICT (snippet_id, user_id) DO UPDATE SET score = EXCLUDED.score
        "#,
    )
    .bind(snippet_id)
    .bind(user.get())
    .bind(vote.score())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Sum of all votes on a snippet (0 when none).
pub async fn score_of(conn: &mut PgConnection, snippet_id: i64) -> Result<i64, DbError> {
    let score: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(score), 0)::BIGINT FROM votes WHERE snippet_id = $1",
    )
    .bind(snippet_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(score)
}
