//! In-process doubles for the pipeline's I/O seams.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::dedup::DedupState;
use crate::dispatch::{FormatMode, RecipientId, Transport};
use crate::error::{FetchError, SendError, StoreError};
use crate::feed::{Article, FeedId, FeedSource};
use crate::storage::{Database, SubscriptionStore};

#[derive(Debug, Clone)]
pub struct Attempt {
    pub recipient: RecipientId,
    pub text: String,
    pub mode: FormatMode,
    pub at: Instant,
}

/// Records every send attempt; optionally rejects one recipient
#[derive(Default)]
pub struct RecordingTransport {
    attempts: Mutex<Vec<Attempt>>,
    reject: Option<RecipientId>,
}

impl RecordingTransport {
    pub fn failing_for(recipient: RecipientId) -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            reject: Some(recipient),
        }
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, recipient: RecipientId, text: &str, mode: FormatMode) -> Result<(), SendError> {
        self.attempts.lock().unwrap().push(Attempt {
            recipient,
            text: text.to_string(),
            mode,
            at: Instant::now(),
        });

        if self.reject == Some(recipient) {
            return Err(SendError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }
}

/// Replays scripted fetch results, then keeps returning `Empty`
pub struct ScriptedSource {
    results: Mutex<VecDeque<Result<Article, FetchError>>>,
    delay: Duration,
}

impl ScriptedSource {
    pub fn new(results: Vec<Result<Article, FetchError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            delay: Duration::ZERO,
        }
    }

    /// Every fetch takes `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, _url: &str) -> Result<Article, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::Empty))
    }
}

/// Wraps a real database, failing subscriber lookups and slowing dedup writes on request
pub struct FlakyStore {
    inner: Arc<Database>,
    fail_subscribers: bool,
    commit_delay: Duration,
    commit_started: Notify,
}

impl FlakyStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            fail_subscribers: false,
            commit_delay: Duration::ZERO,
            commit_started: Notify::new(),
        }
    }

    /// `list_subscribers` always fails
    pub fn failing_subscribers(mut self) -> Self {
        self.fail_subscribers = true;
        self
    }

    /// Every `set_dedup_state` waits `delay` before writing
    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    /// Resolves once a `set_dedup_state` call has started
    pub async fn commit_started(&self) {
        self.commit_started.notified().await
    }
}

#[async_trait]
impl SubscriptionStore for FlakyStore {
    async fn list_subscribers(&self, feed_id: FeedId) -> Result<Vec<RecipientId>, StoreError> {
        if self.fail_subscribers {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.list_subscribers(feed_id).await
    }

    async fn is_subscribed(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        self.inner.is_subscribed(recipient, feed_id).await
    }

    async fn add_subscription(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        self.inner.add_subscription(recipient, feed_id).await
    }

    async fn remove_subscription(&self, recipient: RecipientId, feed_id: FeedId) -> Result<bool, StoreError> {
        self.inner.remove_subscription(recipient, feed_id).await
    }

    async fn list_subscriptions(&self, recipient: RecipientId) -> Result<Vec<FeedId>, StoreError> {
        self.inner.list_subscriptions(recipient).await
    }

    async fn get_dedup_state(&self, feed_id: FeedId) -> Result<Option<DedupState>, StoreError> {
        self.inner.get_dedup_state(feed_id).await
    }

    async fn set_dedup_state(&self, feed_id: FeedId, state: &DedupState) -> Result<(), StoreError> {
        self.commit_started.notify_one();
        if !self.commit_delay.is_zero() {
            tokio::time::sleep(self.commit_delay).await;
        }
        self.inner.set_dedup_state(feed_id, state).await
    }
}
