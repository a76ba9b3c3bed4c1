//! Ranked listings and sidebar widgets

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::views::{ListingResponse, SnippetSummary};
use crate::db::TopSnippet;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{Pagination, PaginationParams, Ranking};

/// Winners of both rankings
#[derive(Serialize)]
pub struct TopResponse {
    pub by_score: Option<TopSnippet>,
    pub by_comments: Option<TopSnippet>,
}

async fn ranked_listing(
    state: &AppState,
    ranking: Ranking,
    params: PaginationParams,
) -> Result<ListingResponse, ApiError> {
    let page = Pagination::from(params);
    let snippets = state.repo.list_ranked(ranking, page).await?;
    let stats = state.repo.site_stats().await?;

    let mut listing = ListingResponse::new(snippets, stats);
    listing.title = Some(ranking.title());
    if ranking == Ranking::ByCommentCount {
        listing.top_commented = state.repo.top_snippet(Ranking::ByCommentCount).await?;
    }
    Ok(listing)
}

/// GET /snippets/points
async fn by_points(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ListingResponse>, ApiError> {
    Ok(Json(ranked_listing(&state, Ranking::ByScore, params).await?))
}

/// GET /snippets/comments
async fn by_comments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ListingResponse>, ApiError> {
    Ok(Json(ranked_listing(&state, Ranking::ByCommentCount, params).await?))
}

/// GET /snippets/top
async fn top(State(state): State<Arc<AppState>>) -> Result<Json<TopResponse>, ApiError> {
    Ok(Json(TopResponse {
        by_score: state.repo.top_snippet(Ranking::ByScore).await?,
        by_comments: state.repo.top_snippet(Ranking::ByCommentCount).await?,
    }))
}

/// GET /snippets/newest
async fn newest(State(state): State<Arc<AppState>>) -> Result<Json<Vec<SnippetSummary>>, ApiError> {
    let snippets = state.repo.list_newest().await?;
    Ok(Json(snippets.into_iter().map(SnippetSummary::from).collect()))
}

/// Listing routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/snippets/points", get(by_points))
        .route("/snippets/comments", get(by_comments))
        .route("/snippets/top", get(top))
        .route("/snippets/newest", get(newest))
}
