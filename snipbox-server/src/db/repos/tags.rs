//! Tag repository
//!
//! Replace-semantics only: the stored set always equals the last set
//! written. Runs on the caller's connection so it joins their
//! transaction.

use sqlx::{PgConnection, PgPool};

use crate::models::TagSet;
use super::DbError;

/// Replace every tag association of `snippet_id` with `tags`.
///
/// Unknown tags are created; `ON CONFLICT` keeps this free of
/// check-then-insert races.
pub async fn replace_tags(
    conn: &mut PgConnection,
    snippet_id: i64,
    tags: &TagSet,
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM snippet_tags WHERE snippet_id = $1")
        .bind(snippet_id)
        .execute(&mut *conn)
        .await?;

    if tags.is_empty() {
        return Ok(());
    }

    let names = tags.names();

    sqlx::query(
        r#"
        INSERT INTO tags (name)
        SELECT UNNEST($1::TEXT[])
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(&names)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO snippet_tags (snippet_id, tag_id)
        SELECT $1, t.id FROM tags t WHERE t.name = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(snippet_id)
    .bind(&names)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Tag names of one snippet, alphabetical.
pub async fn tags_for(pool: &PgPool, snippet_id: i64) -> Result<Vec<String>, DbError> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT t.name
        FROM snippet_tags st
        JOIN tags t ON t.id = st.tag_id
        WHERE st.snippet_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(snippet_id)
    .fetch_all(pool)
    .await?;

    Ok(names)
}
