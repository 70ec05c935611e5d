use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::commands::{handle_command, Command};
use crate::dispatch::{DispatchHandle, DispatchRequest, FormatMode};
use crate::feed::Feed;
use crate::service::wait_for_shutdown;
use crate::storage::SubscriptionStore;
use crate::telegram::{TelegramClient, Update};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Long-polls the Bot API for chat commands and queues the replies
pub struct CommandListener {
    client: Arc<TelegramClient>,
    store: Arc<dyn SubscriptionStore>,
    feeds: Vec<Feed>,
    dispatch: DispatchHandle,
    long_poll_timeout_secs: u64,
}

impl CommandListener {
    pub fn new(
        client: Arc<TelegramClient>,
        store: Arc<dyn SubscriptionStore>,
        feeds: Vec<Feed>,
        dispatch: DispatchHandle,
        long_poll_timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            store,
            feeds,
            dispatch,
            long_poll_timeout_secs,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Command listener started");

        let mut offset = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let result = tokio::select! {
                result = self.client.get_updates(offset, self.long_poll_timeout_secs) => result,
                _ = wait_for_shutdown(&mut shutdown) => break,
            };

            match result {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch updates, retrying in {}s: {}", backoff.as_secs(), e);
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = wait_for_shutdown(&mut shutdown) => break,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        info!("Command listener stopped");
    }

    /// Answer one update. Non-message updates and plain chat text are ignored.
    pub(crate) async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        let chat = message.chat.id;
        debug!(chat, ?command, "Received command");

        let reply = handle_command(self.store.as_ref(), &self.feeds, chat, command).await;
        if let Err(e) = self
            .dispatch
            .enqueue(DispatchRequest::new(chat, reply, FormatMode::Markdown))
        {
            warn!(chat, "Failed to queue reply: {}", e);
        }
    }
}
