use anyhow::Result;

use newsbot_core::{
    storage::{Database, SubscriptionStore},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig, chat: i64, feed_id: i64) -> Result<()> {
    // unknown ids are allowed so rows for feeds removed from the config can be cleaned up
    let name = config
        .find_feed(feed_id)
        .map(|f| f.name)
        .unwrap_or_else(|| format!("#{}", feed_id));

    if db.remove_subscription(chat, feed_id).await? {
        println!("Unsubscribed chat {} from '{}'", chat, name);
    } else {
        println!("Chat {} was not subscribed to '{}'", chat, name);
    }

    Ok(())
}
