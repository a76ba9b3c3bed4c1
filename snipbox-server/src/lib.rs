//! snipbox-server: snippet sharing over HTTP
//!
//! Snippets are listed by recency, vote score or comment count, searched
//! by full text, and created or edited by their owners. Storage sits
//! behind [`db::SnippetStore`] with PostgreSQL and in-memory backends.

pub mod cache;
pub mod db;
pub mod http;
pub mod models;
pub mod repository;

pub use cache::{remember, MokaCache, RememberCache};
pub use db::{create_pool, DbError, MemoryStore, PgSnippetStore, SnippetStore};
pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
pub use repository::{RepoError, SiteStats, SnippetRepository, DEFAULT_CACHE_TTL};
