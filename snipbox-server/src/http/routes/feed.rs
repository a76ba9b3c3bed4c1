//! Syndication feed

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::SnippetWithAuthor;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// One feed item
#[derive(Serialize)]
pub struct FeedEntry {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub link: String,
    pub published: String,
}

impl From<SnippetWithAuthor> for FeedEntry {
    fn from(s: SnippetWithAuthor) -> Self {
        Self {
            id: s.snippet.id,
            link: format!("/snippets/{}", s.snippet.id),
            title: s.snippet.title,
            description: s.snippet.description,
            author: s.author.name,
            published: s.snippet.created_at.to_rfc3339(),
        }
    }
}

/// GET /feed - newest snippets with their authors
async fn feed(State(state): State<Arc<AppState>>) -> Result<Json<Vec<FeedEntry>>, ApiError> {
    let entries = state.repo.list_for_feed().await?;
    Ok(Json(entries.into_iter().map(FeedEntry::from).collect()))
}

/// Feed routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/feed", get(feed))
}
