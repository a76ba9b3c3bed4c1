//! In-process snippet store
//!
//! Mirrors `PgSnippetStore` ordering rules over plain collections. A
//! single `RwLock` makes every write (snippet + tags + seed vote) land
//! as one unit.
//!
//! Search only approximates `websearch_to_tsquery('english', ..)`: words
//! match by lowercase prefix with no stemming or stop words, and quoted
//! phrases are split into plain ANDed words. Result sets and ranks can
//! differ from PostgreSQL, e.g. `marker` here matches `markers` by prefix
//! while `markers` does not match `marker`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::records::{Comment, Snippet, SnippetDetail, SnippetWithAuthor, TopSnippet, User};
use super::store::{DbError, SnippetStore};
use crate::models::{Entity, Pagination, Ranking, TagSet, UserId, ValidSnippet, VoteValue};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    snippets: BTreeMap<i64, Snippet>,
    /// (snippet id, user id) -> score
    votes: HashMap<(i64, i64), i32>,
    comments: Vec<Comment>,
    tags: HashMap<i64, Vec<String>>,
    next_user_id: i64,
    next_snippet_id: i64,
    next_comment_id: i64,
}

impl Inner {
    fn score(&self, snippet_id: i64) -> i64 {
        self.votes
            .iter()
            .filter(|((sid, _), _)| *sid == snippet_id)
            .map(|(_, score)| i64::from(*score))
            .sum()
    }

    fn vote_count(&self, snippet_id: i64) -> usize {
        self.votes.keys().filter(|(sid, _)| *sid == snippet_id).count()
    }

    fn comment_count(&self, snippet_id: i64) -> i64 {
        self.comments
            .iter()
            .filter(|c| c.snippet_id == snippet_id)
            .count() as i64
    }

    fn aggregate(&self, ranking: Ranking, snippet_id: i64) -> i64 {
        match ranking {
            Ranking::ByScore => self.score(snippet_id),
            Ranking::ByCommentCount => self.comment_count(snippet_id),
        }
    }

    /// Whether the snippet has at least one row in the ranking's table.
    fn has_related(&self, ranking: Ranking, snippet_id: i64) -> bool {
        match ranking {
            Ranking::ByScore => self.vote_count(snippet_id) > 0,
            Ranking::ByCommentCount => self.comment_count(snippet_id) > 0,
        }
    }

    fn tags_of(&self, snippet_id: i64) -> Vec<String> {
        let mut tags = self.tags.get(&snippet_id).cloned().unwrap_or_default();
        tags.sort();
        tags
    }

    fn author(&self, snippet: &Snippet) -> Option<User> {
        self.users.get(&snippet.user_id).cloned()
    }

    fn detail(&self, snippet: &Snippet) -> Option<SnippetDetail> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.snippet_id == snippet.id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Some(SnippetDetail {
            author: self.author(snippet)?,
            snippet: snippet.clone(),
            comments,
            score: self.score(snippet.id),
            tags: self.tags_of(snippet.id),
        })
    }

    fn details<'a>(
        &self,
        snippets: impl Iterator<Item = &'a Snippet>,
        page: Pagination,
    ) -> Vec<SnippetDetail> {
        snippets
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .filter_map(|s| self.detail(s))
            .collect()
    }

    fn replace_tags(&mut self, snippet_id: i64, tags: &TagSet) {
        self.tags.insert(snippet_id, tags.names());
    }
}

/// Simplified web-search syntax: words are ANDed, `or` separates
/// alternatives, a leading `-` excludes a word. Words match by prefix,
/// case-insensitively. Never fails to parse.
#[derive(Debug, Default)]
struct TextQuery {
    groups: Vec<Vec<String>>,
    excluded: Vec<String>,
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl TextQuery {
    fn parse(raw: &str) -> Self {
        let mut groups: Vec<Vec<String>> = vec![Vec::new()];
        let mut excluded = Vec::new();

        for token in raw.split_whitespace() {
            if token.eq_ignore_ascii_case("or") {
                groups.push(Vec::new());
                continue;
            }
            let (negated, token) = match token.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            for term in words(token) {
                if negated {
                    excluded.push(term);
                } else if let Some(group) = groups.last_mut() {
                    group.push(term);
                }
            }
        }

        groups.retain(|g| !g.is_empty());
        Self { groups, excluded }
    }

    fn hits(doc: &[String], term: &str) -> usize {
        doc.iter().filter(|w| w.starts_with(term)).count()
    }

    fn matches(&self, doc: &[String]) -> bool {
        !self.groups.is_empty()
            && self
                .groups
                .iter()
                .any(|g| g.iter().all(|t| Self::hits(doc, t) > 0))
            && self.excluded.iter().all(|t| Self::hits(doc, t) == 0)
    }

    fn relevance(&self, doc: &[String]) -> usize {
        self.groups
            .iter()
            .flatten()
            .map(|t| Self::hits(doc, t))
            .sum()
    }
}

fn document(snippet: &Snippet) -> Vec<String> {
    words(&format!(
        "{} {} {}",
        snippet.title, snippet.description, snippet.body
    ))
}

/// Snippet store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user (users are managed outside the snippet core).
    pub async fn add_user(&self, name: &str) -> User {
        let mut inner = self.inner.write().await;
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            name: name.to_owned(),
            avatar_url: None,
            profile_url: None,
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    /// Attach a comment (comments are managed outside the snippet core).
    pub async fn add_comment(
        &self,
        snippet_id: i64,
        user: UserId,
        body: &str,
    ) -> Result<Comment, DbError> {
        let mut inner = self.inner.write().await;
        if !inner.snippets.contains_key(&snippet_id) {
            return Err(DbError::not_found("snippet", snippet_id));
        }
        if !inner.users.contains_key(&user.get()) {
            return Err(DbError::not_found("user", user));
        }

        inner.next_comment_id += 1;
        let comment = Comment {
            id: inner.next_comment_id,
            snippet_id,
            user_id: user.get(),
            body: body.to_owned(),
            created_at: Utc::now(),
        };
        inner.comments.push(comment.clone());
        Ok(comment)
    }

    /// Number of stored vote rows for a snippet.
    pub async fn vote_rows(&self, snippet_id: i64) -> usize {
        self.inner.read().await.vote_count(snippet_id)
    }
}

#[async_trait]
impl SnippetStore for MemoryStore {
    async fn recent(&self, page: Pagination) -> Result<Vec<SnippetDetail>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.details(inner.snippets.values().rev(), page))
    }

    async fn recent_with_authors(&self, limit: u32) -> Result<Vec<SnippetWithAuthor>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snippets
            .values()
            .rev()
            .take(limit as usize)
            .filter_map(|s| {
                inner.author(s).map(|author| SnippetWithAuthor {
                    snippet: s.clone(),
                    author,
                })
            })
            .collect())
    }

    async fn ranked(
        &self,
        ranking: Ranking,
        page: Pagination,
    ) -> Result<Vec<SnippetDetail>, DbError> {
        let inner = self.inner.read().await;

        let mut ranked: Vec<(i64, &Snippet)> = inner
            .snippets
            .values()
            .map(|s| (inner.aggregate(ranking, s.id), s))
            .collect();
        ranked.sort_by(|(a_total, a), (b_total, b)| b_total.cmp(a_total).then(a.id.cmp(&b.id)));

        Ok(inner.details(ranked.into_iter().map(|(_, s)| s), page))
    }

    async fn top(&self, ranking: Ranking) -> Result<Option<TopSnippet>, DbError> {
        let inner = self.inner.read().await;

        Ok(inner
            .snippets
            .values()
            .filter(|s| inner.has_related(ranking, s.id))
            .map(|s| TopSnippet {
                id: s.id,
                title: s.title.clone(),
                total: inner.aggregate(ranking, s.id),
            })
            .max_by(|a, b| a.total.cmp(&b.total).then(a.id.cmp(&b.id))))
    }

    async fn search(&self, query: &str, page: Pagination) -> Result<Vec<SnippetDetail>, DbError> {
        let inner = self.inner.read().await;
        let query = TextQuery::parse(query);

        let mut matches: Vec<(usize, usize, &Snippet)> = inner
            .snippets
            .values()
            .filter_map(|s| {
                let doc = document(s);
                query.matches(&doc).then(|| {
                    (query.relevance(&words(&s.title)), query.relevance(&doc), s)
                })
            })
            .collect();
        matches.sort_by(|(at, ar, a), (bt, br, b)| {
            bt.cmp(at).then(br.cmp(ar)).then(b.id.cmp(&a.id))
        });

        Ok(inner.details(matches.into_iter().map(|(_, _, s)| s), page))
    }

    async fn search_count(&self, query: &str) -> Result<i64, DbError> {
        let inner = self.inner.read().await;
        let query = TextQuery::parse(query);
        Ok(inner
            .snippets
            .values()
            .filter(|s| query.matches(&document(s)))
            .count() as i64)
    }

    async fn count(&self, entity: Entity) -> Result<i64, DbError> {
        let inner = self.inner.read().await;
        let total = match entity {
            Entity::Snippets => inner.snippets.len(),
            Entity::Comments => inner.comments.len(),
            Entity::Users => inner.users.len(),
        };
        Ok(total as i64)
    }

    async fn find(&self, id: i64) -> Result<Option<SnippetDetail>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.snippets.get(&id).and_then(|s| inner.detail(s)))
    }

    async fn insert(&self, owner: UserId, snippet: &ValidSnippet) -> Result<Snippet, DbError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&owner.get()) {
            return Err(DbError::not_found("user", owner));
        }

        inner.next_snippet_id += 1;
        let now = Utc::now();
        let created = Snippet {
            id: inner.next_snippet_id,
            user_id: owner.get(),
            title: snippet.title.as_str().to_owned(),
            body: snippet.body.as_str().to_owned(),
            description: snippet.description.as_str().to_owned(),
            created_at: now,
            updated_at: now,
        };

        inner.snippets.insert(created.id, created.clone());
        inner.replace_tags(created.id, &snippet.tags);
        inner
            .votes
            .insert((created.id, owner.get()), VoteValue::Up.score());

        tracing::info!(snippet_id = created.id, "snippet created");
        Ok(created)
    }

    async fn update(&self, id: i64, snippet: &ValidSnippet) -> Result<Snippet, DbError> {
        let mut inner = self.inner.write().await;

        let updated = {
            let stored = inner
                .snippets
                .get_mut(&id)
                .ok_or_else(|| DbError::not_found("snippet", id))?;
            stored.title = snippet.title.as_str().to_owned();
            stored.body = snippet.body.as_str().to_owned();
            stored.description = snippet.description.as_str().to_owned();
            stored.updated_at = Utc::now();
            stored.clone()
        };

        inner.replace_tags(id, &snippet.tags);
        Ok(updated)
    }

    async fn cast_vote(
        &self,
        snippet_id: i64,
        user: UserId,
        vote: VoteValue,
    ) -> Result<i64, DbError> {
        let mut inner = self.inner.write().await;
        if !inner.snippets.contains_key(&snippet_id) {
            return Err(DbError::not_found("snippet", snippet_id));
        }
        if !inner.users.contains_key(&user.get()) {
            return Err(DbError::not_found("user", user));
        }

        inner.votes.insert((snippet_id, user.get()), vote.score());
        Ok(inner.score(snippet_id))
    }
}
