use anyhow::{bail, Result};

use newsbot_core::{
    feed::{FeedFetcher, FeedSource},
    AppConfig,
};

const PREVIEW_CHARS: usize = 200;

pub async fn run(config: &AppConfig) -> Result<()> {
    config.validate()?;
    println!("Configuration OK ({} feeds)", config.feeds.len());

    let fetcher = FeedFetcher::new(config)?;
    let feeds: Vec<_> = config.feeds().into_iter().filter(|f| f.enabled).collect();
    let mut failed = 0;

    for feed in &feeds {
        println!("\n#{} {}", feed.id, feed.name);
        match fetcher.fetch(&feed.url).await {
            Ok(article) => {
                let article = article.sanitized();
                println!("  Title: {}", article.title);
                println!("  Link: {}", article.link);
                match article.published_at {
                    Some(ts) => println!("  Published: {}", ts.format("%Y-%m-%d %H:%M")),
                    None => println!("  Published: (no timestamp, would not be dispatched)"),
                }
                let preview: String = article.body.chars().take(PREVIEW_CHARS).collect();
                println!("  Body: {}", preview.replace('\n', " "));
            }
            Err(e) => {
                println!("  Error: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} feeds failed", failed, feeds.len());
    }
    println!("\nAll {} feeds OK", feeds.len());
    Ok(())
}
