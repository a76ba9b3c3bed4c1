//! Snippet repository - listing, ranking, search and mutation
//!
//! Stateless façade over a [`SnippetStore`]. Validation happens here,
//! before any write reaches the store. Top-snippet lookups and site
//! counters go through the remember cache.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use crate::cache::{remember, RememberCache};
use crate::db::{DbError, Snippet, SnippetDetail, SnippetStore, SnippetWithAuthor, TopSnippet};
use crate::models::{
    Entity, Paginated, Pagination, Ranking, SnippetInput, UserId, ValidationErrors, VoteValue,
};

/// Entries in the syndication feed
pub const FEED_LIMIT: u32 = 20;

/// Entries in the "newest" widget
pub const NEWEST_LIMIT: u32 = 5;

/// Default lifetime of remembered values
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("snippet {snippet_id} belongs to another user")]
    Forbidden { snippet_id: i64 },
}

/// Site-wide counters shown beside listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    pub snippets: i64,
    pub comments: i64,
    pub users: i64,
}

pub struct SnippetRepository {
    store: Arc<dyn SnippetStore>,
    cache: Arc<dyn RememberCache>,
    cache_ttl: Duration,
}

impl SnippetRepository {
    pub fn new(
        store: Arc<dyn SnippetStore>,
        cache: Arc<dyn RememberCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            cache_ttl,
        }
    }

    /// Newest first, with comments and authors.
    pub async fn list_recent(&self, page: Pagination) -> Result<Paginated<SnippetDetail>, DbError> {
        let items = self.store.recent(page).await?;
        let total = self.store.count(Entity::Snippets).await?;
        Ok(page.wrap(items, total))
    }

    pub async fn list_for_feed(&self) -> Result<Vec<SnippetWithAuthor>, DbError> {
        self.store.recent_with_authors(FEED_LIMIT).await
    }

    pub async fn list_newest(&self) -> Result<Vec<SnippetDetail>, DbError> {
        self.store.recent(Pagination::new(1, NEWEST_LIMIT)).await
    }

    /// One page of snippets ordered by `ranking`.
    ///
    /// `total` is the size of the ranked set. The aggregation is a left
    /// outer join, so that is every snippet.
    #[instrument(skip(self))]
    pub async fn list_ranked(
        &self,
        ranking: Ranking,
        page: Pagination,
    ) -> Result<Paginated<SnippetDetail>, DbError> {
        let items = self.store.ranked(ranking, page).await?;
        let total = self.store.count(Entity::Snippets).await?;
        Ok(page.wrap(items, total))
    }

    /// Remembered winner of `ranking`; `None` when nothing qualifies.
    pub async fn top_snippet(&self, ranking: Ranking) -> Result<Option<TopSnippet>, DbError> {
        remember(
            self.cache.as_ref(),
            ranking.top_cache_key(),
            self.cache_ttl,
            || self.store.top(ranking),
        )
        .await
    }

    pub async fn site_stats(&self) -> Result<SiteStats, DbError> {
        Ok(SiteStats {
            snippets: self.remembered_count(Entity::Snippets).await?,
            comments: self.remembered_count(Entity::Comments).await?,
            users: self.remembered_count(Entity::Users).await?,
        })
    }

    async fn remembered_count(&self, entity: Entity) -> Result<i64, DbError> {
        remember(
            self.cache.as_ref(),
            entity.count_cache_key(),
            self.cache_ttl,
            || self.store.count(entity),
        )
        .await
    }

    pub async fn find(&self, id: i64) -> Result<SnippetDetail, DbError> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| DbError::not_found("snippet", id))
    }

    /// Validate, then store the snippet with its tags and the owner's
    /// own +1 vote.
    #[instrument(skip(self, input), fields(owner = %owner))]
    pub async fn create(&self, owner: UserId, input: &SnippetInput) -> Result<Snippet, RepoError> {
        let valid = input.validate()?;
        Ok(self.store.insert(owner, &valid).await?)
    }

    /// Snippet `id` if `owner` owns it; `Forbidden` otherwise.
    pub async fn find_owned(&self, owner: UserId, id: i64) -> Result<SnippetDetail, RepoError> {
        let detail = self.find(id).await?;
        if detail.snippet.user_id != owner.get() {
            return Err(RepoError::Forbidden { snippet_id: id });
        }
        Ok(detail)
    }

    /// Check ownership, validate, then overwrite title/body/description
    /// and the tag set.
    #[instrument(skip(self, input), fields(owner = %owner))]
    pub async fn update(
        &self,
        owner: UserId,
        snippet_id: i64,
        input: &SnippetInput,
    ) -> Result<Snippet, RepoError> {
        self.find_owned(owner, snippet_id).await?;
        let valid = input.validate()?;
        Ok(self.store.update(snippet_id, &valid).await?)
    }

    /// Full-text search; a blank query matches nothing.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, page: Pagination) -> Result<Paginated<SnippetDetail>, DbError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(page.wrap(Vec::new(), 0));
        }

        let items = self.store.search(query, page).await?;
        let total = self.store.search_count(query).await?;
        Ok(page.wrap(items, total))
    }

    pub async fn vote(&self, snippet_id: i64, user: UserId, vote: VoteValue) -> Result<i64, DbError> {
        self.store.cast_vote(snippet_id, user, vote).await
    }

    /// Uncached round trip to the store.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.store.count(Entity::Users).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MokaCache;
    use crate::db::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        repo: SnippetRepository,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let repo = SnippetRepository::new(
            store.clone(),
            Arc::new(MokaCache::default()),
            Duration::from_secs(60),
        );
        Fixture { store, repo }
    }

    fn input(title: &str) -> SnippetInput {
        SnippetInput {
            title: title.into(),
            body: "set hlsearch".into(),
            description: "highlight matches".into(),
            tags: vec!["search".into()],
        }
    }

    #[tokio::test]
    async fn create_validates_before_writing() {
        let f = fixture();
        let owner = f.store.add_user("owner").await;

        let err = f
            .repo
            .create(UserId(owner.id), &SnippetInput::default())
            .await
            .unwrap_err();

        match err {
            RepoError::Validation(errors) => assert!(errors.contains("title")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(f.store.count(Entity::Snippets).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn top_snippet_is_remembered() {
        let f = fixture();
        let owner = f.store.add_user("owner").await;
        let first = f.repo.create(UserId(owner.id), &input("first")).await.unwrap();

        let top = f.repo.top_snippet(Ranking::ByScore).await.unwrap().unwrap();
        assert_eq!(top.id, first.id);

        // A better snippet appears, but the remembered winner stands until expiry
        let voter = f.store.add_user("voter").await;
        let second = f.repo.create(UserId(owner.id), &input("second")).await.unwrap();
        f.repo.vote(second.id, UserId(voter.id), VoteValue::Up).await.unwrap();

        let cached = f.repo.top_snippet(Ranking::ByScore).await.unwrap().unwrap();
        assert_eq!(cached.id, first.id);
    }

    #[tokio::test]
    async fn blank_search_skips_store() {
        let f = fixture();
        let owner = f.store.add_user("owner").await;
        f.repo.create(UserId(owner.id), &input("hlsearch")).await.unwrap();

        let result = f.repo.search("   ", Pagination::first()).await.unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn find_missing_is_not_found() {
        let f = fixture();
        let err = f.repo.find(404).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { resource: "snippet", .. }));
    }

    #[tokio::test]
    async fn site_stats_count_each_entity() {
        let f = fixture();
        let owner = f.store.add_user("owner").await;
        f.store.add_user("lurker").await;
        let snippet = f.repo.create(UserId(owner.id), &input("one")).await.unwrap();
        f.store
            .add_comment(snippet.id, UserId(owner.id), "nice")
            .await
            .unwrap();

        let stats = f.repo.site_stats().await.unwrap();
        assert_eq!(
            stats,
            SiteStats {
                snippets: 1,
                comments: 1,
                users: 2
            }
        );
    }
}
