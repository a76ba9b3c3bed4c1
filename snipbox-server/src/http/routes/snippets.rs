//! Snippet endpoints: index, show, create, edit, update, vote

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::views::ListingResponse;
use crate::db::SnippetDetail;
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, OptionalUser, SnippetId};
use crate::http::server::AppState;
use crate::models::{Pagination, PaginationParams, SnippetInput, VoteValue};
use crate::repository::RepoError;

/// Form payload for the create and edit pages
#[derive(Serialize)]
pub struct FormResponse {
    pub action: String,
    pub snippet: SnippetInput,
}

/// Single snippet with everything the show page needs
#[derive(Serialize)]
pub struct SnippetView {
    #[serde(flatten)]
    pub detail: SnippetDetail,
    pub comment_count: usize,
    pub can_edit: bool,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub score: i32,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub snippet_id: i64,
    pub score: i64,
}

fn snippet_path(id: i64) -> String {
    format!("/snippets/{}", id)
}

/// GET /snippets - newest first, with site counters
async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ListingResponse>, ApiError> {
    let page = Pagination::from(params);
    let snippets = state.repo.list_recent(page).await?;
    let stats = state.repo.site_stats().await?;

    Ok(Json(ListingResponse::new(snippets, stats)))
}

/// GET /snippets/new - empty create form
async fn new_form(CurrentUser(_user): CurrentUser) -> Json<FormResponse> {
    Json(FormResponse {
        action: "/snippets".to_string(),
        snippet: SnippetInput::default(),
    })
}

/// POST /snippets - create a snippet owned by the caller
#[instrument(skip_all, fields(user = %user))]
async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<SnippetInput>,
) -> Result<Response, ApiError> {
    let snippet = state.repo.create(user, &input).await?;

    let location = snippet_path(snippet.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(snippet),
    )
        .into_response())
}

/// GET /snippets/{id} - one snippet with comments, score and tags
async fn show(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    SnippetId(id): SnippetId,
) -> Result<Json<SnippetView>, ApiError> {
    let detail = state.repo.find(id).await?;
    let can_edit = user.is_some_and(|u| u.get() == detail.snippet.user_id);

    Ok(Json(SnippetView {
        comment_count: detail.comment_count(),
        detail,
        can_edit,
    }))
}

/// GET /snippets/{id}/edit - prefilled form, owner only
async fn edit_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    SnippetId(id): SnippetId,
) -> Result<Response, ApiError> {
    let detail = match state.repo.find_owned(user, id).await {
        Ok(detail) => detail,
        Err(RepoError::Forbidden { .. }) => return Ok(Redirect::to("/").into_response()),
        Err(e) => return Err(e.into()),
    };

    let form = FormResponse {
        action: snippet_path(id),
        snippet: SnippetInput {
            title: detail.snippet.title,
            body: detail.snippet.body,
            description: detail.snippet.description,
            tags: detail.tags,
        },
    };
    Ok(Json(form).into_response())
}

/// PUT|POST /snippets/{id} - overwrite fields and tags, owner only
#[instrument(skip_all, fields(user = %user))]
async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    SnippetId(id): SnippetId,
    Json(input): Json<SnippetInput>,
) -> Result<Response, ApiError> {
    match state.repo.update(user, id, &input).await {
        Ok(updated) => Ok(Json(updated).into_response()),
        Err(RepoError::Forbidden { .. }) => {
            tracing::debug!(snippet_id = id, "edit by non-owner refused");
            Ok(Redirect::to("/").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /snippets/{id}/vote - record the caller's +1 or -1
async fn vote(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    SnippetId(id): SnippetId,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let value = VoteValue::try_from(req.score)?;
    let score = state.repo.vote(id, user, value).await?;

    Ok(Json(VoteResponse {
        snippet_id: id,
        score,
    }))
}

/// Snippet routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/snippets", get(index).post(create))
        .route("/snippets/new", get(new_form))
        .route("/snippets/{id}", get(show).put(update).post(update))
        .route("/snippets/{id}/edit", get(edit_form))
        .route("/snippets/{id}/vote", post(vote))
}
