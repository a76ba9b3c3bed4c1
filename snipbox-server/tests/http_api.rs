//! Request handling through the full router

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use snipbox_server::db::MemoryStore;
use snipbox_server::http::DEFAULT_USER_HEADER;
use snipbox_server::{build_router, AppState};
use tower::ServiceExt;

struct TestApp {
    store: Arc<MemoryStore>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_store(store.clone(), Duration::from_secs(60));
        let router = build_router(Arc::new(state), false);
        Self { store, router }
    }

    async fn user(&self, name: &str) -> i64 {
        self.store.add_user(name).await.id
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, user: Option<i64>) -> axum::response::Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = user {
            builder = builder.header(DEFAULT_USER_HEADER, id.to_string());
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn send_json(
        &self,
        method: Method,
        uri: &str,
        user: Option<i64>,
        body: Value,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = user {
            builder = builder.header(DEFAULT_USER_HEADER, id.to_string());
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn create(&self, owner: i64, title: &str, tags: &[&str]) -> i64 {
        let response = self
            .send_json(Method::POST, "/snippets", Some(owner), snippet_body(title, tags))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"].as_i64().unwrap()
    }
}

fn snippet_body(title: &str, tags: &[&str]) -> Value {
    json!({
        "title": title,
        "body": "set hlsearch\nset incsearch",
        "description": "search as you type",
        "tags": tags,
    })
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn create_returns_location() {
    let app = TestApp::new();
    let owner = app.user("owner").await;

    let response = app
        .send_json(Method::POST, "/snippets", Some(owner), snippet_body("Search", &["vim"]))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_owned();
    let body = json_body(response).await;
    assert_eq!(location, format!("/snippets/{}", body["id"]));
}

#[tokio::test]
async fn create_requires_identity() {
    let app = TestApp::new();

    let response = app
        .send_json(Method::POST, "/snippets", None, snippet_body("Search", &[]))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/snippets/new", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_rejects_invalid_fields() {
    let app = TestApp::new();
    let owner = app.user("owner").await;

    let response = app
        .send_json(
            Method::POST,
            "/snippets",
            Some(owner),
            json!({ "title": "", "body": "set nu", "description": "numbers" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(body["fields"]["title"].is_array());

    let listing = json_body(app.get("/snippets", None).await).await;
    assert_eq!(listing["stats"]["snippets"], 0);
}

#[tokio::test]
async fn show_missing_is_404() {
    let app = TestApp::new();
    let response = app.get("/snippets/999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn show_flags_owner() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    let other = app.user("other").await;
    let id = app.create(owner, "Search", &["vim"]).await;

    let uri = format!("/snippets/{}", id);
    let as_owner = json_body(app.get(&uri, Some(owner)).await).await;
    let as_other = json_body(app.get(&uri, Some(other)).await).await;
    let anonymous = json_body(app.get(&uri, None).await).await;

    assert_eq!(as_owner["can_edit"], true);
    assert_eq!(as_other["can_edit"], false);
    assert_eq!(anonymous["can_edit"], false);
    assert_eq!(as_owner["score"], 1);
    assert_eq!(as_owner["author"]["name"], "owner");
}

#[tokio::test]
async fn non_owner_is_redirected_home() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    let other = app.user("other").await;
    let id = app.create(owner, "Search", &[]).await;
    let uri = format!("/snippets/{}", id);

    let edit = app.get(&format!("{}/edit", uri), Some(other)).await;
    assert_eq!(edit.status(), StatusCode::SEE_OTHER);
    assert_eq!(edit.headers()[header::LOCATION], "/");

    let update = app
        .send_json(Method::PUT, &uri, Some(other), snippet_body("Hijacked", &[]))
        .await;
    assert_eq!(update.status(), StatusCode::SEE_OTHER);

    let shown = json_body(app.get(&uri, None).await).await;
    assert_eq!(shown["title"], "Search");
}

#[tokio::test]
async fn owner_updates_fields_and_tags() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    let id = app.create(owner, "Search", &["vim", "regex"]).await;
    let uri = format!("/snippets/{}", id);

    let form = json_body(app.get(&format!("{}/edit", uri), Some(owner)).await).await;
    assert_eq!(form["snippet"]["title"], "Search");
    assert_eq!(form["snippet"]["tags"], json!(["regex", "vim"]));

    let response = app
        .send_json(Method::POST, &uri, Some(owner), snippet_body("Better search", &["vim"]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let shown = json_body(app.get(&uri, None).await).await;
    assert_eq!(shown["title"], "Better search");
    assert_eq!(shown["tags"], json!(["vim"]));
}

#[tokio::test]
async fn voting_updates_score() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    let voter = app.user("voter").await;
    let id = app.create(owner, "Search", &[]).await;
    let uri = format!("/snippets/{}/vote", id);

    let response = app
        .send_json(Method::POST, &uri, Some(voter), json!({ "score": 1 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["score"], 2);

    // Changing a vote replaces it
    let response = app
        .send_json(Method::POST, &uri, Some(voter), json!({ "score": -1 }))
        .await;
    assert_eq!(json_body(response).await["score"], 0);

    let response = app
        .send_json(Method::POST, &uri, Some(voter), json!({ "score": 3 }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ranked_listing_has_title_and_stats() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    let a = app.create(owner, "A", &[]).await;
    let b = app.create(owner, "B", &[]).await;
    app.store
        .add_comment(b, snipbox_server::models::UserId(owner), "nice")
        .await
        .unwrap();

    let points = json_body(app.get("/snippets/points", None).await).await;
    assert_eq!(points["title"], "Top Voted Snippets");
    assert_eq!(points["snippets"]["total"], 2);
    assert_eq!(points["stats"]["users"], 1);

    let comments = json_body(app.get("/snippets/comments", None).await).await;
    assert_eq!(comments["title"], "Most Commented Snippets");
    assert_eq!(comments["snippets"]["items"][0]["id"], b);
    assert_eq!(comments["snippets"]["items"][1]["id"], a);
    assert_eq!(comments["top_commented"]["id"], b);

    let top = json_body(app.get("/snippets/top", None).await).await;
    assert_eq!(top["by_comments"]["total"], 1);
}

#[tokio::test]
async fn search_and_feed() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    app.create(owner, "Folding", &[]).await;
    let hl = app.create(owner, "Highlight", &[]).await;

    let found = json_body(app.get("/search?q=highlight", None).await).await;
    assert_eq!(found["results"]["total"], 1);
    assert_eq!(found["results"]["items"][0]["id"], hl);

    let blank = json_body(app.get("/search?q=%20%20", None).await).await;
    assert_eq!(blank["results"]["total"], 0);

    let feed = json_body(app.get("/feed", None).await).await;
    assert_eq!(feed.as_array().unwrap().len(), 2);
    assert_eq!(feed[0]["link"], format!("/snippets/{}", hl));
}
