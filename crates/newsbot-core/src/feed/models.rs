use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FeedConfig;

/// Stable feed identifier, as configured
pub type FeedId = i64;

/// A configured syndication endpoint. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

impl From<&FeedConfig> for Feed {
    fn from(config: &FeedConfig) -> Self {
        Feed {
            id: config.id,
            name: config.name.trim().to_string(),
            url: config.url.trim().to_string(),
            enabled: config.enabled,
        }
    }
}

/// The latest item of a feed, as seen by one poll
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    /// Raw description as fetched; sanitized text after `sanitized()`
    pub body: String,
    /// Canonical link
    pub link: String,
    /// Item publish time, falling back to the feed-level update time
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Articles without any timestamp cannot be ordered against dedup state
    pub fn has_timestamp(&self) -> bool {
        self.published_at.is_some()
    }

    /// Replace the raw body with its sanitized form
    pub fn sanitized(mut self) -> Self {
        self.body = super::sanitize(&self.body);
        self
    }
}
