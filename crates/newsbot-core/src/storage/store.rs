use async_trait::async_trait;

use super::{Database, DedupRepository, SubscriptionRepository};
use crate::dedup::DedupState;
use crate::dispatch::RecipientId;
use crate::error::StoreError;
use crate::feed::FeedId;

/// Keyed store for subscriptions and per-feed dedup state.
///
/// Implementations must tolerate concurrent callers; dedup state has a single writer per
/// feed (that feed's poller).
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_subscribers(&self, feed_id: FeedId) -> Result<Vec<RecipientId>, StoreError>;

    async fn is_subscribed(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError>;

    /// Returns false when the subscription already existed
    async fn add_subscription(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError>;

    /// Returns false when there was nothing to remove
    async fn remove_subscription(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError>;

    async fn list_subscriptions(&self, recipient: RecipientId) -> Result<Vec<FeedId>, StoreError>;

    async fn get_dedup_state(&self, feed_id: FeedId) -> Result<Option<DedupState>, StoreError>;

    async fn set_dedup_state(&self, feed_id: FeedId, state: &DedupState) -> Result<(), StoreError>;
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn list_subscribers(&self, feed_id: FeedId) -> Result<Vec<RecipientId>, StoreError> {
        SubscriptionRepository::new(self).list_subscribers(feed_id).await
    }

    async fn is_subscribed(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        SubscriptionRepository::new(self).is_subscribed(recipient, feed_id).await
    }

    async fn add_subscription(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        SubscriptionRepository::new(self).add(recipient, feed_id).await
    }

    async fn remove_subscription(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        SubscriptionRepository::new(self).remove(recipient, feed_id).await
    }

    async fn list_subscriptions(&self, recipient: RecipientId) -> Result<Vec<FeedId>, StoreError> {
        SubscriptionRepository::new(self).list_subscriptions(recipient).await
    }

    async fn get_dedup_state(&self, feed_id: FeedId) -> Result<Option<DedupState>, StoreError> {
        DedupRepository::new(self).get(feed_id).await
    }

    async fn set_dedup_state(&self, feed_id: FeedId, state: &DedupState) -> Result<(), StoreError> {
        DedupRepository::new(self).set(feed_id, state).await
    }
}
