use anyhow::Result;

use newsbot_core::{
    storage::{Database, SubscriptionStore},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig, chat: i64) -> Result<()> {
    let feed_ids = db.list_subscriptions(chat).await?;

    if feed_ids.is_empty() {
        println!("Chat {} has no subscriptions.", chat);
        return Ok(());
    }

    println!("Subscriptions of chat {} ({}):\n", chat, feed_ids.len());
    for id in feed_ids {
        match config.find_feed(id) {
            Some(feed) => println!("  #{} {}", feed.id, feed.name),
            None => println!("  #{} (no longer configured)", id),
        }
    }

    Ok(())
}
