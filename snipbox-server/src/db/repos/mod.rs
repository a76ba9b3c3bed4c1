//! PostgreSQL repositories
//!
//! Each repository follows these patterns:
//! - Loads related rows in bulk (no N+1)
//! - Handles conflicts via ON CONFLICT (no check-then-insert)
//! - Uses transactions for multi-step operations

pub mod snippets;
pub mod tags;
pub mod votes;

pub use snippets::PgSnippetStore;

pub(crate) use super::store::DbError;
