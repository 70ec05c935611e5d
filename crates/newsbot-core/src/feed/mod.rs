mod fetcher;
mod link;
mod models;
mod parser;
mod sanitizer;

use async_trait::async_trait;

use crate::error::FetchError;

pub use fetcher::FeedFetcher;
pub use link::canonical_link;
pub use models::{Article, Feed, FeedId};
pub use parser::parse_latest;
pub use sanitizer::{sanitize, ELLIPSIS, MAX_BODY_CHARS};

/// Fetches the latest item of a feed. Stateless: the result depends only on the URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Article, FetchError>;
}
