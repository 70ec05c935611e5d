use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

use super::link::canonical_link;
use super::models::Article;
use crate::error::FetchError;

/// Parse RSS/Atom content and return its most recent item.
///
/// The item timestamp is its publish time, then its own update time, then the feed-level
/// update time. When several items carry a timestamp the newest one wins; otherwise the
/// first item in document order is used.
pub fn parse_latest(content: &[u8]) -> Result<Article, FetchError> {
    let feed = parser::parse(content).map_err(|e| FetchError::Parse(e.to_string()))?;

    let feed_updated = feed.updated;

    let latest = feed
        .entries
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            entry_timestamp(a)
                .cmp(&entry_timestamp(b))
                // prefer the earlier position on ties
                .then(ib.cmp(ia))
        })
        .map(|(_, entry)| entry)
        .ok_or(FetchError::Empty)?;

    Ok(to_article(latest, feed_updated))
}

fn entry_timestamp(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.published.or(entry.updated)
}

fn to_article(entry: &Entry, feed_updated: Option<DateTime<Utc>>) -> Article {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .unwrap_or_else(|| "Untitled".to_string());

    let body = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    let link = entry
        .links
        .first()
        .map(|l| canonical_link(&l.href))
        .unwrap_or_default();

    Article {
        title,
        body,
        link,
        published_at: entry_timestamp(entry).or(feed_updated),
    }
}
