//! Content feeds for the site author.
//!
//! Every feed runs the same pipeline: fetch through the pool, drop malformed
//! records, keep the newest version per identity, apply the author's
//! deletions, then parse and sort for display.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::QueryCache;
use crate::constants::{
    kinds, ARTICLE_PAGE_SIZE, DEFAULT_QUERY_TIMEOUT, LONG_STALE_TIME, PAGED_QUERY_TIMEOUT,
    SHORT_STALE_TIME,
};
use crate::models::article::{is_topical, sort_by_published};
use crate::models::calendar::sort_events;
use crate::models::tag_utils::has_tag;
use crate::models::{
    Application, Article, CalendarEvent, Photo, Profile, QueryFilter, Record, Repository,
};
use crate::nostr::{PoolError, QueryOptions, RelayPool};
use crate::reconcile::reconcile;
use crate::validation::is_well_formed;

/// One page of the paginated article feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    /// Pass as `until` to fetch the next page
    pub next_cursor: Option<u64>,
    pub has_more: bool,
    /// Well-formed records behind this page, before reconciliation
    #[serde(skip)]
    pub records: Vec<Record>,
    #[serde(skip)]
    pub deletions: Vec<Record>,
}

/// Articles from every loaded page, one per slug.
///
/// An edited article can have its old version on a later page, so the pages
/// are reconciled together rather than concatenated.
pub fn merge_article_pages(pages: &[ArticlePage]) -> Vec<Article> {
    let records = pages.iter().flat_map(|page| page.records.iter().cloned());
    let deletions: Vec<Record> = pages
        .iter()
        .flat_map(|page| page.deletions.iter().cloned())
        .collect();

    let mut live = reconcile(records, &deletions);
    sort_by_published(&mut live);
    live.iter().filter_map(Article::from_record).collect()
}

/// How a feed fetches: cache key, filter, deadline and stale window
struct FeedQuery {
    key: String,
    filter: QueryFilter,
    timeout: Duration,
    stale_after: Duration,
}

impl FeedQuery {
    fn new(key: impl Into<String>, filter: QueryFilter) -> Self {
        Self {
            key: key.into(),
            filter,
            timeout: DEFAULT_QUERY_TIMEOUT,
            stale_after: LONG_STALE_TIME,
        }
    }

    fn short_lived(mut self) -> Self {
        self.stale_after = SHORT_STALE_TIME;
        self
    }

    fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct ContentFeeds {
    pool: Arc<RelayPool>,
    author: String,
    cache: Option<Arc<QueryCache>>,
}

impl ContentFeeds {
    pub fn new(pool: Arc<RelayPool>, author: impl Into<String>) -> Self {
        Self {
            pool,
            author: author.into(),
            cache: None,
        }
    }

    /// Serve repeated feed calls from `cache` within their stale window
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn pool(&self) -> &Arc<RelayPool> {
        &self.pool
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    fn author_filter(&self, kinds: impl IntoIterator<Item = u16>, limit: usize) -> QueryFilter {
        QueryFilter::new()
            .kinds(kinds)
            .author(self.author.clone())
            .limit(limit)
    }

    /// Raw well-formed records for a feed, from cache when fresh
    async fn fetch(&self, query: FeedQuery) -> Result<Vec<Record>, PoolError> {
        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get_fresh(&query.key, query.stale_after))
        {
            tracing::debug!("Cache hit for {}", query.key);
            return Ok(cached);
        }

        let records: Vec<Record> = self
            .pool
            .query(&[query.filter], QueryOptions::with_timeout(query.timeout))
            .await?
            .into_iter()
            .filter(is_well_formed)
            .collect();

        if let Some(cache) = &self.cache {
            cache.insert(query.key, records.clone());
        }
        Ok(records)
    }

    /// Fetch a feed and its deletions together and reconcile the result
    async fn fetch_live(&self, query: FeedQuery) -> Result<Vec<Record>, PoolError> {
        let (records, deletions) = tokio::try_join!(self.fetch(query), self.deletions())?;
        Ok(reconcile(records, &deletions))
    }

    /// The author's deletion requests
    pub async fn deletions(&self) -> Result<Vec<Record>, PoolError> {
        let filter = self.author_filter([kinds::DELETION], 100);
        self.fetch(FeedQuery::new("deletions", filter).short_lived())
            .await
    }

    /// Latest metadata of the author
    pub async fn profile(&self) -> Result<Option<Profile>, PoolError> {
        let filter = self.author_filter([kinds::METADATA], 1);
        let records = self.fetch_live(FeedQuery::new("profile", filter)).await?;
        Ok(records.first().and_then(Profile::from_record))
    }

    /// Top-level text notes, newest first
    pub async fn notes(&self) -> Result<Vec<Record>, PoolError> {
        let filter = self.author_filter([kinds::TEXT_NOTE], 50);
        let records = self
            .fetch_live(FeedQuery::new("notes", filter).short_lived())
            .await?;
        Ok(records.into_iter().filter(|r| !has_tag(r, "e")).collect())
    }

    /// Notes and long-form articles mixed, newest first
    pub async fn posts(&self) -> Result<Vec<Record>, PoolError> {
        let filter = self.author_filter([kinds::TEXT_NOTE, kinds::LONG_FORM], 50);
        let records = self
            .fetch_live(FeedQuery::new("posts", filter).short_lived())
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.kind != kinds::TEXT_NOTE || !has_tag(r, "e"))
            .collect())
    }

    /// Highlighted articles about the site's topics
    pub async fn articles(&self) -> Result<Vec<Article>, PoolError> {
        let filter = self.author_filter([kinds::LONG_FORM], 10);
        let mut records: Vec<Record> = self
            .fetch_live(FeedQuery::new("articles", filter))
            .await?
            .into_iter()
            .filter(is_topical)
            .collect();
        sort_by_published(&mut records);
        Ok(records.iter().filter_map(Article::from_record).collect())
    }

    /// One page of every article, older than `until` when given
    pub async fn articles_page(&self, until: Option<u64>) -> Result<ArticlePage, PoolError> {
        let mut filter = self.author_filter([kinds::LONG_FORM], ARTICLE_PAGE_SIZE);
        if let Some(until) = until {
            filter = filter.until(until);
        }
        let key = match until {
            Some(until) => format!("articles_page:{}", until),
            None => "articles_page".to_string(),
        };

        let query = FeedQuery::new(key, filter).timeout(PAGED_QUERY_TIMEOUT);
        let (records, deletions) = tokio::try_join!(self.fetch(query), self.deletions())?;
        let has_more = records.len() >= ARTICLE_PAGE_SIZE;
        let next_cursor = records
            .iter()
            .map(|r| r.created_at)
            .min()
            .map(|oldest| oldest.saturating_sub(1));

        let mut live = reconcile(records.clone(), &deletions);
        sort_by_published(&mut live);

        Ok(ArticlePage {
            articles: live.iter().filter_map(Article::from_record).collect(),
            next_cursor,
            has_more,
            records,
            deletions,
        })
    }

    /// Every image from the author's picture posts, newest first
    pub async fn photos(&self) -> Result<Vec<Photo>, PoolError> {
        let filter = self.author_filter([kinds::PICTURE], 50);
        let records = self.fetch_live(FeedQuery::new("photos", filter)).await?;
        Ok(records.iter().flat_map(Photo::from_record).collect())
    }

    /// Calendar events relative to `now`: upcoming soonest first, then past
    pub async fn calendar_events(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>, PoolError> {
        let filter = self.author_filter([kinds::CALENDAR_DATE, kinds::CALENDAR_TIME], 50);
        let records = self
            .fetch_live(FeedQuery::new("calendar_events", filter).short_lived())
            .await?;

        let mut events: Vec<CalendarEvent> = records
            .iter()
            .filter_map(|r| CalendarEvent::from_record(r, now))
            .collect();
        sort_events(&mut events);
        Ok(events)
    }

    pub async fn applications(&self) -> Result<Vec<Application>, PoolError> {
        let filter = self.author_filter([kinds::APPLICATION], 20);
        let records = self.fetch_live(FeedQuery::new("applications", filter)).await?;
        Ok(records.iter().filter_map(Application::from_record).collect())
    }

    pub async fn repositories(&self) -> Result<Vec<Repository>, PoolError> {
        let filter = self.author_filter([kinds::GIT_REPOSITORY], 20);
        let records = self.fetch_live(FeedQuery::new("repositories", filter)).await?;
        Ok(records.iter().filter_map(Repository::from_record).collect())
    }
}
