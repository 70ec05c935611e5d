use anyhow::{anyhow, Result};

use newsbot_core::{
    storage::{Database, SubscriptionStore},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig, chat: i64, feed_id: i64) -> Result<()> {
    let feed = config
        .find_feed(feed_id)
        .ok_or_else(|| anyhow!("No feed with id {} in the configuration", feed_id))?;

    if !feed.enabled {
        println!("Warning: feed '{}' is disabled and will not be polled.", feed.name);
    }

    if db.add_subscription(chat, feed.id).await? {
        println!("Subscribed chat {} to '{}' (#{})", chat, feed.name, feed.id);
    } else {
        println!("Chat {} is already subscribed to '{}'", chat, feed.name);
    }

    Ok(())
}
