use tracing::warn;

use crate::dispatch::{escape_markdown, RecipientId};
use crate::feed::{Feed, FeedId};
use crate::storage::SubscriptionStore;

const HELP_TEXT: &str = "This is newsbot.\nType /list to view the available news feeds.";
const STORE_FAILURE_TEXT: &str = "Something went wrong, please try again later.";

/// A chat command understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Subscribe(FeedId),
    Unsubscribe(FeedId),
    Help,
}

impl Command {
    /// Parse a message text. Returns `None` for messages that are not commands.
    ///
    /// Feed ids may be glued to the command (`/subscribe3`) or given as an argument
    /// (`/subscribe 3`); a `@botname` suffix is ignored.
    pub fn parse(text: &str) -> Option<Command> {
        let mut tokens = text.split_whitespace();
        let head = tokens.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        let feed_arg = |rest: &str| -> Option<FeedId> {
            if rest.is_empty() {
                tokens.clone().next()?.parse().ok()
            } else {
                rest.parse().ok()
            }
        };

        let command = if name == "list" {
            Command::List
        } else if let Some(rest) = name.strip_prefix("unsubscribe") {
            feed_arg(rest).map(Command::Unsubscribe).unwrap_or(Command::Help)
        } else if let Some(rest) = name.strip_prefix("subscribe") {
            feed_arg(rest).map(Command::Subscribe).unwrap_or(Command::Help)
        } else {
            Command::Help
        };

        Some(command)
    }
}

/// Execute `command` for `chat` and return the Markdown reply
pub async fn handle_command(
    store: &dyn SubscriptionStore,
    feeds: &[Feed],
    chat: RecipientId,
    command: Command,
) -> String {
    match command {
        Command::List => list_feeds(store, feeds, chat).await,
        Command::Subscribe(feed_id) => {
            let Some(feed) = feeds.iter().find(|f| f.id == feed_id && f.enabled) else {
                return unknown_feed(feed_id);
            };
            match store.add_subscription(chat, feed_id).await {
                Ok(true) => format!("Subscribed to *{}* (#{})", escape_markdown(&feed.name), feed_id),
                Ok(false) => format!("You are already subscribed to *{}*", escape_markdown(&feed.name)),
                Err(e) => {
                    warn!(chat, feed_id, "Failed to add subscription: {}", e);
                    STORE_FAILURE_TEXT.to_string()
                }
            }
        }
        Command::Unsubscribe(feed_id) => {
            let Some(feed) = feeds.iter().find(|f| f.id == feed_id) else {
                return unknown_feed(feed_id);
            };
            match store.remove_subscription(chat, feed_id).await {
                Ok(true) => format!("Unsubscribed from *{}* (#{})", escape_markdown(&feed.name), feed_id),
                Ok(false) => format!("You are not subscribed to *{}*", escape_markdown(&feed.name)),
                Err(e) => {
                    warn!(chat, feed_id, "Failed to remove subscription: {}", e);
                    STORE_FAILURE_TEXT.to_string()
                }
            }
        }
        Command::Help => HELP_TEXT.to_string(),
    }
}

async fn list_feeds(store: &dyn SubscriptionStore, feeds: &[Feed], chat: RecipientId) -> String {
    let subscribed = match store.list_subscriptions(chat).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(chat, "Failed to list subscriptions: {}", e);
            return STORE_FAILURE_TEXT.to_string();
        }
    };

    let mut text = String::new();
    for feed in feeds.iter().filter(|f| f.enabled) {
        let name = escape_markdown(&feed.name);
        if subscribed.contains(&feed.id) {
            text.push_str(&format!("- {} (subscribed)\n  /unsubscribe{}\n", name, feed.id));
        } else {
            text.push_str(&format!("- {} (*unsubscribed*)\n  /subscribe{}\n", name, feed.id));
        }
    }

    if text.is_empty() {
        return "No news feeds are available right now.".to_string();
    }
    text
}

fn unknown_feed(feed_id: FeedId) -> String {
    format!("There is no news feed #{}. Type /list to view the available feeds.", feed_id)
}
