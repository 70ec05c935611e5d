use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::feed::{Article, FeedId};
use crate::storage::SubscriptionStore;

/// Publish time and link of the last article dispatched for a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupState {
    pub published_at: DateTime<Utc>,
    pub link: String,
}

/// Decides whether a fetched article is new for one feed.
///
/// Owned by that feed's poller, so it is the only writer of the feed's stored state.
/// State is loaded lazily on the first check and cached afterwards.
pub struct DedupTracker {
    feed_id: FeedId,
    store: Arc<dyn SubscriptionStore>,
    lookback: chrono::Duration,
    state: Option<DedupState>,
}

impl DedupTracker {
    pub fn new(feed_id: FeedId, store: Arc<dyn SubscriptionStore>, lookback: chrono::Duration) -> Self {
        Self {
            feed_id,
            store,
            lookback,
            state: None,
        }
    }

    /// Cached state, if it has been loaded or seeded
    pub fn state(&self) -> Option<&DedupState> {
        self.state.as_ref()
    }

    pub async fn is_new(&mut self, article: &Article) -> Result<bool, StoreError> {
        self.is_new_at(article, Utc::now()).await
    }

    /// New iff the article has a timestamp strictly after the stored one and a different link.
    ///
    /// A feed without stored state is seeded with `now - lookback` and an empty link, and the
    /// seed is persisted so a restart does not move the baseline forward.
    pub async fn is_new_at(&mut self, article: &Article, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let baseline = self.baseline(now).await?;

        let Some(published_at) = article.published_at else {
            tracing::debug!(feed_id = self.feed_id, link = %article.link, "Article has no timestamp, skipping");
            return Ok(false);
        };

        Ok(published_at > baseline.published_at && article.link != baseline.link)
    }

    /// Record `article` as dispatched. Timestamp and link are written together; the stored
    /// timestamp never moves backwards.
    pub async fn commit(&mut self, article: &Article) -> Result<(), StoreError> {
        let Some(published_at) = article.published_at else {
            return Ok(());
        };

        let published_at = match &self.state {
            Some(current) if current.published_at > published_at => current.published_at,
            _ => published_at,
        };
        let next = DedupState {
            published_at,
            link: article.link.clone(),
        };

        // the in-memory copy moves even if persisting fails, so this process won't resend
        self.state = Some(next.clone());
        self.store.set_dedup_state(self.feed_id, &next).await
    }

    async fn baseline(&mut self, now: DateTime<Utc>) -> Result<DedupState, StoreError> {
        if let Some(state) = &self.state {
            return Ok(state.clone());
        }

        let state = match self.store.get_dedup_state(self.feed_id).await? {
            Some(state) => state,
            None => {
                let seed = DedupState {
                    published_at: now - self.lookback,
                    link: String::new(),
                };
                self.store.set_dedup_state(self.feed_id, &seed).await?;
                tracing::info!(feed_id = self.feed_id, baseline = %seed.published_at, "Seeded dedup baseline");
                seed
            }
        };

        self.state = Some(state.clone());
        Ok(state)
    }
}
