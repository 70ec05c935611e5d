use anyhow::Result;

use newsbot_core::{
    storage::{Database, DedupRepository, SubscriptionRepository},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig) -> Result<()> {
    let feeds = config.feeds();

    if feeds.is_empty() {
        println!("No feeds configured.");
        println!("\nAdd a [[feeds]] entry to {}", AppConfig::config_path().display());
        return Ok(());
    }

    println!("Feeds ({}):\n", feeds.len());

    let subscriptions = SubscriptionRepository::new(db);
    let history = DedupRepository::new(db);

    for feed in &feeds {
        let subscribers = subscriptions.count_subscribers(feed.id).await?;
        let disabled = if feed.enabled { "" } else { " [disabled]" };

        println!("  #{} {}{} ({} subscribers)", feed.id, feed.name, disabled, subscribers);
        println!("    URL: {}", feed.url);
        match history.get(feed.id).await? {
            Some(state) if !state.link.is_empty() => {
                println!(
                    "    Last dispatched: {} ({})",
                    state.link,
                    state.published_at.format("%Y-%m-%d %H:%M")
                );
            }
            Some(state) => {
                println!("    Baseline: {}", state.published_at.format("%Y-%m-%d %H:%M"));
            }
            None => println!("    Not polled yet"),
        }
        println!();
    }

    Ok(())
}
