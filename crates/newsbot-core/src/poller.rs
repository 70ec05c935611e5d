//! Per-feed polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::dedup::DedupTracker;
use crate::dispatch::{render_article, DispatchHandle, DispatchRequest, FormatMode};
use crate::error::FetchError;
use crate::feed::{Article, Feed, FeedSource};
use crate::service::wait_for_shutdown;
use crate::storage::SubscriptionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Evaluating,
    Dispatching,
    Sleeping,
}

/// What a single poll cycle ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    FetchFailed,
    NotNew,
    /// Dedup state could not be read; the cycle was abandoned
    StoreFailed,
    Dispatched { recipients: usize },
}

/// Polls one feed forever, handing new articles to the dispatcher
pub struct FeedPoller {
    feed: Feed,
    source: Arc<dyn FeedSource>,
    store: Arc<dyn SubscriptionStore>,
    dedup: DedupTracker,
    dispatch: DispatchHandle,
    interval: Duration,
    fetch_timeout: Duration,
    state: PollerState,
}

impl FeedPoller {
    pub fn new(
        feed: Feed,
        source: Arc<dyn FeedSource>,
        store: Arc<dyn SubscriptionStore>,
        dispatch: DispatchHandle,
        config: &AppConfig,
    ) -> Self {
        let dedup = DedupTracker::new(feed.id, store.clone(), config.lookback());
        Self {
            feed,
            source,
            store,
            dedup,
            dispatch,
            interval: config.poll_interval(),
            fetch_timeout: config.request_timeout(),
            state: PollerState::Idle,
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Fetch, evaluate and (if new) fan out once. Never fails: every error ends the cycle.
    ///
    /// The poller is back in `Idle` when this returns, whatever the outcome.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let fetched = self.fetch().await;
        self.finish(fetched).await
    }

    async fn fetch(&mut self) -> Result<Article, FetchError> {
        self.state = PollerState::Fetching;
        match tokio::time::timeout(self.fetch_timeout, self.source.fetch(&self.feed.url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_secs())),
        }
    }

    async fn finish(&mut self, fetched: Result<Article, FetchError>) -> PollOutcome {
        let outcome = self.evaluate(fetched).await;
        self.state = PollerState::Idle;
        outcome
    }

    async fn evaluate(&mut self, fetched: Result<Article, FetchError>) -> PollOutcome {
        let article = match fetched {
            Ok(article) => article,
            Err(e) => {
                warn!(feed_id = self.feed.id, "Failed to fetch {}: {}", self.feed.url, e);
                return PollOutcome::FetchFailed;
            }
        };

        self.state = PollerState::Evaluating;
        let article = article.sanitized();
        match self.dedup.is_new(&article).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(feed_id = self.feed.id, link = %article.link, "No new article");
                return PollOutcome::NotNew;
            }
            Err(e) => {
                warn!(feed_id = self.feed.id, "Failed to load dedup state: {}", e);
                return PollOutcome::StoreFailed;
            }
        }

        self.state = PollerState::Dispatching;
        let recipients = self.fan_out(&article).await;

        // committed regardless of how many requests were enqueued
        if let Err(e) = self.dedup.commit(&article).await {
            warn!(feed_id = self.feed.id, "Failed to persist dedup state: {}", e);
        }

        info!(
            feed_id = self.feed.id,
            recipients,
            "New article \"{}\" ({})",
            article.title,
            article.link
        );
        PollOutcome::Dispatched { recipients }
    }

    async fn fan_out(&self, article: &Article) -> usize {
        let subscribers = match self.store.list_subscribers(self.feed.id).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(feed_id = self.feed.id, "Failed to resolve subscribers: {}", e);
                Vec::new()
            }
        };

        let text = render_article(&self.feed, article);
        let mut enqueued = 0;
        for recipient in subscribers {
            let request = DispatchRequest::new(recipient, text.clone(), FormatMode::Markdown);
            if let Err(e) = self.dispatch.enqueue(request) {
                warn!(feed_id = self.feed.id, recipient, "Failed to enqueue article: {}", e);
                break;
            }
            enqueued += 1;
        }
        enqueued
    }

    /// Loop until the shutdown flag is raised
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(feed_id = self.feed.id, "Polling \"{}\" every {}s", self.feed.name, self.interval.as_secs());

        loop {
            let fetched = tokio::select! {
                fetched = self.fetch() => fetched,
                _ = wait_for_shutdown(&mut shutdown) => break,
            };
            // shutdown only interrupts fetching and sleeping; an article handed to the
            // dispatcher is always committed
            let outcome = self.finish(fetched).await;
            debug!(feed_id = self.feed.id, ?outcome, "Poll cycle finished");

            self.state = PollerState::Sleeping;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        self.state = PollerState::Idle;
        info!(feed_id = self.feed.id, "Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupState;
    use crate::dispatch::Dispatcher;
    use crate::storage::Database;
    use crate::test_support::{FlakyStore, RecordingTransport, ScriptedSource};
    use chrono::{DateTime, Utc};

    const GAP: Duration = Duration::from_millis(40);

    fn feed() -> Feed {
        Feed {
            id: 1,
            name: "World".to_string(),
            url: "https://example.com/rss".to_string(),
            enabled: true,
        }
    }

    fn article(link: &str, published_at: DateTime<Utc>) -> Article {
        Article {
            title: "Big news".to_string(),
            body: "<p>Something <b>happened</b></p>".to_string(),
            link: link.to_string(),
            published_at: Some(published_at),
        }
    }

    async fn store_with_subscribers(subscribers: &[i64]) -> Arc<Database> {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        for &chat in subscribers {
            db.add_subscription(chat, 1).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_first_poll_of_old_article_only_seeds_state() {
        let db = store_with_subscribers(&[100]).await;
        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, handle) = Dispatcher::new(transport.clone(), GAP);
        let old = Utc::now() - chrono::Duration::days(3);
        let source = Arc::new(ScriptedSource::new(vec![Ok(article("https://example.com/old", old))]));

        let mut poller = FeedPoller::new(feed(), source, db.clone(), handle, &AppConfig::default());
        assert_eq!(poller.poll_once().await, PollOutcome::NotNew);
        drop(poller);

        let seeded = db.get_dedup_state(1).await.unwrap().unwrap();
        assert!(seeded.link.is_empty());
        assert!(seeded.published_at > old);

        assert_eq!(dispatcher.run().await.sent, 0);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_new_article_reaches_every_subscriber() {
        let db = store_with_subscribers(&[100, 200]).await;
        let t0 = Utc::now() - chrono::Duration::hours(2);
        let t1 = Utc::now() - chrono::Duration::hours(1);
        db.set_dedup_state(
            1,
            &DedupState {
                published_at: t0,
                link: "https://example.com/0".to_string(),
            },
        )
        .await
        .unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, handle) = Dispatcher::new(transport.clone(), GAP);
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(article("https://example.com/1", t1)),
            Ok(article("https://example.com/1", t1)),
        ]));

        let mut poller = FeedPoller::new(feed(), source, db.clone(), handle, &AppConfig::default());
        assert_eq!(poller.poll_once().await, PollOutcome::Dispatched { recipients: 2 });
        assert_eq!(poller.state(), PollerState::Idle);
        // the same article on the next cycle is suppressed
        assert_eq!(poller.poll_once().await, PollOutcome::NotNew);
        drop(poller);

        let stored = db.get_dedup_state(1).await.unwrap().unwrap();
        assert_eq!(stored.published_at, t1);
        assert_eq!(stored.link, "https://example.com/1");

        assert_eq!(dispatcher.run().await.sent, 2);
        let attempts = transport.attempts();
        let mut recipients: Vec<i64> = attempts.iter().map(|a| a.recipient).collect();
        recipients.sort();
        assert_eq!(recipients, vec![100, 200]);
        for attempt in &attempts {
            assert_eq!(attempt.mode, FormatMode::Markdown);
            assert!(attempt.text.starts_with("*World*\n\n*Big news*\n\nSomething happened"));
            assert!(attempt.text.ends_with("[Read more...](https://example.com/1)"));
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_three_subscribers_is_rate_limited() {
        let db = store_with_subscribers(&[1, 2, 3]).await;
        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, handle) = Dispatcher::new(transport.clone(), GAP);
        let fresh = Utc::now() - chrono::Duration::minutes(5);
        let source = Arc::new(ScriptedSource::new(vec![Ok(article("https://example.com/x", fresh))]));

        let mut poller = FeedPoller::new(feed(), source, db, handle, &AppConfig::default());
        assert_eq!(poller.poll_once().await, PollOutcome::Dispatched { recipients: 3 });
        drop(poller);

        let stats = dispatcher.run().await;
        assert_eq!(stats.sent, 3);
        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 3);
        for pair in attempts.windows(2) {
            assert!(pair[1].at - pair[0].at >= GAP);
        }
    }

    #[tokio::test]
    async fn test_article_without_subscribers_is_still_committed() {
        let db = store_with_subscribers(&[]).await;
        let (_dispatcher, handle) = Dispatcher::new(Arc::new(RecordingTransport::default()), GAP);
        let fresh = Utc::now() - chrono::Duration::minutes(5);
        let source = Arc::new(ScriptedSource::new(vec![Ok(article("https://example.com/y", fresh))]));

        let mut poller = FeedPoller::new(feed(), source, db.clone(), handle, &AppConfig::default());
        assert_eq!(poller.poll_once().await, PollOutcome::Dispatched { recipients: 0 });
        assert_eq!(db.get_dedup_state(1).await.unwrap().unwrap().link, "https://example.com/y");
    }

    #[tokio::test]
    async fn test_fetch_error_ends_cycle() {
        let db = store_with_subscribers(&[100]).await;
        let (_dispatcher, handle) = Dispatcher::new(Arc::new(RecordingTransport::default()), GAP);
        let source = Arc::new(ScriptedSource::new(vec![Err(FetchError::Parse("bad xml".to_string()))]));

        let mut poller = FeedPoller::new(feed(), source, db.clone(), handle, &AppConfig::default());
        assert_eq!(poller.poll_once().await, PollOutcome::FetchFailed);
        assert_eq!(poller.state(), PollerState::Idle);
        assert!(db.get_dedup_state(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_is_idle_after_every_outcome() {
        let db = store_with_subscribers(&[100]).await;
        let (_dispatcher, handle) = Dispatcher::new(Arc::new(RecordingTransport::default()), GAP);
        let old = Utc::now() - chrono::Duration::days(3);
        let fresh = Utc::now() - chrono::Duration::minutes(5);
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(article("https://example.com/old", old)),
            Ok(article("https://example.com/fresh", fresh)),
        ]));

        let mut poller = FeedPoller::new(feed(), source, db, handle, &AppConfig::default());
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.poll_once().await, PollOutcome::NotNew);
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.poll_once().await, PollOutcome::Dispatched { recipients: 1 });
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.poll_once().await, PollOutcome::FetchFailed);
        assert_eq!(poller.state(), PollerState::Idle);
    }

    #[tokio::test]
    async fn test_subscriber_lookup_failure_still_commits() {
        let db = store_with_subscribers(&[100, 200]).await;
        let store = Arc::new(FlakyStore::new(db.clone()).failing_subscribers());
        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, handle) = Dispatcher::new(transport.clone(), GAP);
        let fresh = Utc::now() - chrono::Duration::minutes(5);
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(article("https://example.com/f", fresh)),
            Ok(article("https://example.com/f", fresh)),
        ]));

        let mut poller = FeedPoller::new(feed(), source, store, handle, &AppConfig::default());
        assert_eq!(poller.poll_once().await, PollOutcome::Dispatched { recipients: 0 });
        // the failed lookup does not make the article new again
        assert_eq!(poller.poll_once().await, PollOutcome::NotNew);
        drop(poller);

        let stored = db.get_dedup_state(1).await.unwrap().unwrap();
        assert_eq!(stored.link, "https://example.com/f");
        assert_eq!(stored.published_at, fresh);

        assert_eq!(dispatcher.run().await.sent, 0);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_during_commit_waits_for_it() {
        let db = store_with_subscribers(&[100]).await;
        let t0 = Utc::now() - chrono::Duration::hours(2);
        let t1 = Utc::now() - chrono::Duration::hours(1);
        db.set_dedup_state(
            1,
            &DedupState {
                published_at: t0,
                link: "l0".to_string(),
            },
        )
        .await
        .unwrap();

        let store = Arc::new(FlakyStore::new(db.clone()).with_commit_delay(Duration::from_millis(300)));
        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, handle) = Dispatcher::new(transport.clone(), GAP);
        let source = Arc::new(ScriptedSource::new(vec![Ok(article("l1", t1))]));
        let poller = FeedPoller::new(feed(), source, store.clone(), handle, &AppConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poller.run(shutdown_rx));

        store.commit_started().await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("poller did not stop")
            .unwrap();

        assert_eq!(dispatcher.run().await.sent, 1);
        let stored = db.get_dedup_state(1).await.unwrap().unwrap();
        assert_eq!(stored.link, "l1");
        assert_eq!(stored.published_at, t1);
    }

    #[tokio::test]
    async fn test_hung_fetch_times_out() {
        let db = store_with_subscribers(&[]).await;
        tokio::time::pause();

        let (_dispatcher, handle) = Dispatcher::new(Arc::new(RecordingTransport::default()), GAP);
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(article("https://example.com/z", Utc::now()))])
                .with_delay(Duration::from_secs(3600)),
        );

        let config = AppConfig::default();
        let mut poller = FeedPoller::new(feed(), source, db, handle, &config);
        let start = tokio::time::Instant::now();
        assert_eq!(poller.poll_once().await, PollOutcome::FetchFailed);
        assert_eq!(start.elapsed(), config.request_timeout());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = store_with_subscribers(&[]).await;
        tokio::time::pause();

        let (_dispatcher, handle) = Dispatcher::new(Arc::new(RecordingTransport::default()), GAP);
        // every fetch fails, so the loop never touches the store
        let source = Arc::new(ScriptedSource::new(Vec::new()));
        let poller = FeedPoller::new(feed(), source, db, handle, &AppConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poller.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(!task.is_finished());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
