//! Response shapes shared by several routes

use serde::Serialize;

use crate::db::{SnippetDetail, TopSnippet, User};
use crate::models::Paginated;
use crate::repository::SiteStats;

/// Snippet as shown in listings and search results
#[derive(Debug, Serialize)]
pub struct SnippetSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author: User,
    pub score: i64,
    pub comment_count: usize,
    pub tags: Vec<String>,
    pub created_at: String,
}

impl From<SnippetDetail> for SnippetSummary {
    fn from(d: SnippetDetail) -> Self {
        let comment_count = d.comment_count();
        Self {
            id: d.snippet.id,
            title: d.snippet.title,
            description: d.snippet.description,
            body: d.snippet.body,
            author: d.author,
            score: d.score,
            comment_count,
            tags: d.tags,
            created_at: d.snippet.created_at.to_rfc3339(),
        }
    }
}

/// A page of snippets with the site counters beside it
#[derive(Debug, Serialize)]
pub struct ListingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'static str>,
    pub snippets: Paginated<SnippetSummary>,
    pub stats: SiteStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_commented: Option<TopSnippet>,
}

impl ListingResponse {
    pub fn new(snippets: Paginated<SnippetDetail>, stats: SiteStats) -> Self {
        Self {
            title: None,
            snippets: snippets.map(SnippetSummary::from),
            stats,
            top_commented: None,
        }
    }
}
