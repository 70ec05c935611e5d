use super::retry::with_retry;
use super::Database;
use crate::dispatch::RecipientId;
use crate::error::StoreError;
use crate::feed::FeedId;

/// Repository for (chat, feed) subscription pairs
pub struct SubscriptionRepository<'a> {
    db: &'a Database,
}

impl<'a> SubscriptionRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Chats subscribed to a feed
    pub async fn list_subscribers(&self, feed_id: FeedId) -> Result<Vec<RecipientId>, StoreError> {
        let rows: Vec<(i64,)> = with_retry("list_subscribers", || {
            sqlx::query_as("SELECT chat_id FROM subscriptions WHERE feed_id = ? ORDER BY created_at, chat_id")
                .bind(feed_id)
                .fetch_all(self.db.pool())
        })
        .await?;

        Ok(rows.into_iter().map(|(chat_id,)| chat_id).collect())
    }

    /// Feeds a chat is subscribed to
    pub async fn list_subscriptions(&self, chat_id: RecipientId) -> Result<Vec<FeedId>, StoreError> {
        let rows: Vec<(i64,)> = with_retry("list_subscriptions", || {
            sqlx::query_as("SELECT feed_id FROM subscriptions WHERE chat_id = ? ORDER BY feed_id")
                .bind(chat_id)
                .fetch_all(self.db.pool())
        })
        .await?;

        Ok(rows.into_iter().map(|(feed_id,)| feed_id).collect())
    }

    pub async fn is_subscribed(&self, chat_id: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        let count: (i64,) = with_retry("is_subscribed", || {
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE chat_id = ? AND feed_id = ?")
                .bind(chat_id)
                .bind(feed_id)
                .fetch_one(self.db.pool())
        })
        .await?;

        Ok(count.0 > 0)
    }

    /// Add a subscription. Returns false if it already existed.
    pub async fn add(&self, chat_id: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        let result = with_retry("add_subscription", || {
            sqlx::query("INSERT OR IGNORE INTO subscriptions (chat_id, feed_id) VALUES (?, ?)")
                .bind(chat_id)
                .bind(feed_id)
                .execute(self.db.pool())
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a subscription. Returns false if there was none.
    pub async fn remove(&self, chat_id: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        let result = with_retry("remove_subscription", || {
            sqlx::query("DELETE FROM subscriptions WHERE chat_id = ? AND feed_id = ?")
                .bind(chat_id)
                .bind(feed_id)
                .execute(self.db.pool())
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Subscriber count for a feed
    pub async fn count_subscribers(&self, feed_id: FeedId) -> Result<u32, StoreError> {
        let count: (i64,) = with_retry("count_subscribers", || {
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_one(self.db.pool())
        })
        .await?;

        Ok(count.0 as u32)
    }
}
