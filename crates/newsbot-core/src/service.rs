use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::bot::CommandListener;
use crate::config::AppConfig;
use crate::dispatch::{DispatchStats, Dispatcher, Transport};
use crate::feed::{FeedFetcher, FeedSource};
use crate::poller::FeedPoller;
use crate::storage::{Database, SubscriptionStore};
use crate::telegram::TelegramClient;
use crate::Result;

/// Resolves once the shutdown flag is raised or its sender is gone
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Wires the store, feed source and Telegram client into pollers, the dispatcher and the
/// command listener
pub struct NewsService {
    config: Arc<AppConfig>,
    store: Arc<dyn SubscriptionStore>,
    source: Arc<dyn FeedSource>,
    telegram: Arc<TelegramClient>,
}

impl NewsService {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn SubscriptionStore>,
        source: Arc<dyn FeedSource>,
        telegram: Arc<TelegramClient>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            telegram,
        }
    }

    /// Validate `config` and open the production collaborators
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        config.validate_for_service()?;

        let db = Database::new(&config).await?;
        let fetcher = FeedFetcher::new(&config)?;
        let telegram = TelegramClient::from_config(&config)?;

        Ok(Self::new(
            Arc::new(config),
            Arc::new(db),
            Arc::new(fetcher),
            Arc::new(telegram),
        ))
    }

    /// Run until `shutdown` is raised, then let the dispatch queue drain
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> DispatchStats {
        let transport: Arc<dyn Transport> = self.telegram.clone();
        let (dispatcher, handle) = Dispatcher::new(transport, self.config.send_interval());
        let mut dispatcher_task = tokio::spawn(dispatcher.run());

        let mut tasks = JoinSet::new();
        for feed in self.config.feeds().into_iter().filter(|f| f.enabled) {
            let poller = FeedPoller::new(
                feed,
                self.source.clone(),
                self.store.clone(),
                handle.clone(),
                &self.config,
            );
            tasks.spawn(poller.run(shutdown.clone()));
        }
        info!("Started {} feed pollers", tasks.len());

        let listener = CommandListener::new(
            self.telegram.clone(),
            self.store.clone(),
            self.config.feeds(),
            handle,
            self.config.telegram.long_poll_timeout_secs,
        );
        tasks.spawn(listener.run(shutdown));

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Service task failed: {}", e);
            }
        }

        // every queue handle is gone now, so the dispatcher exits once the queue is empty
        let drain_timeout = self.config.drain_timeout();
        info!("Draining dispatch queue (up to {}s)", drain_timeout.as_secs());
        match tokio::time::timeout(drain_timeout, &mut dispatcher_task).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                error!("Dispatcher task failed: {}", e);
                DispatchStats::default()
            }
            Err(_) => {
                warn!("Dispatch queue did not drain in time, dropping remaining messages");
                dispatcher_task.abort();
                DispatchStats::default()
            }
        }
    }
}
