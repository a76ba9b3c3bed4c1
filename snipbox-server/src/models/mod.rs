//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod tag;
pub mod snippet;
pub mod vote;
pub mod user;
pub mod ranking;
pub mod pagination;

pub use validation::{ValidationError, ValidationErrors};
pub use tag::{TagName, TagSet};
pub use snippet::{SnippetBody, SnippetDescription, SnippetInput, SnippetTitle, ValidSnippet};
pub use vote::VoteValue;
pub use user::UserId;
pub use ranking::{Entity, Ranking};
pub use pagination::{Pagination, Paginated, PaginationParams, DEFAULT_PER_PAGE};
