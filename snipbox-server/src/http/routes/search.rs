//! Full-text search endpoint

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::views::SnippetSummary;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams};

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Paginated<SnippetSummary>,
}

/// GET /search?q=&page=
#[instrument(skip(state))]
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let page = Pagination::from(PaginationParams {
        page: params.page,
        per_page: params.per_page,
    });
    let results = state.repo.search(&params.q, page).await?;

    Ok(Json(SearchResponse {
        query: params.q,
        results: results.map(SnippetSummary::from),
    }))
}

/// Search routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search))
}
