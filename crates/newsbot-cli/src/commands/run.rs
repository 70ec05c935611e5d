use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use newsbot_core::{AppConfig, NewsService};

pub async fn run(config: AppConfig) -> Result<()> {
    let feed_count = config.feeds.iter().filter(|f| f.enabled).count();
    let interval = config.poll.interval_secs;

    // Invalid configuration aborts here, before any poller starts
    let service = NewsService::from_config(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Setup signal handler for graceful shutdown
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    println!("newsbot started. Press Ctrl+C to stop.");
    println!("  Feeds: {}", feed_count);
    println!("  Poll interval: {} seconds", interval);

    // Blocks until shutdown and the dispatch queue has drained
    let stats = service.run(shutdown_rx).await;

    println!(
        "newsbot stopped ({} sent, {} failed, {} dropped).",
        stats.sent, stats.failed, stats.dropped
    );
    Ok(())
}
