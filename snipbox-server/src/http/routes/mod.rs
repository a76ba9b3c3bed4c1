//! Route handlers organized by resource

pub mod health;
pub mod snippets;
pub mod listings;
pub mod search;
pub mod feed;
pub mod views;
