//! Database layer - store seam, connection pool and repositories
//!
//! # Design Principles
//!
//! - Connection pool with explicit limits - no Arc<Mutex<Connection>>
//! - All list operations load relations in bulk - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations

pub mod pool;
pub mod migrations;
pub mod records;
pub mod store;
pub mod memory;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options};
pub use records::{Comment, Snippet, SnippetDetail, SnippetWithAuthor, TopSnippet, User};
pub use store::{DbError, SnippetStore};
pub use memory::MemoryStore;
pub use repos::PgSnippetStore;
