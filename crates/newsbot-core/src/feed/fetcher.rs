use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use reqwest::{Client, Proxy};

use super::models::Article;
use super::parser::parse_latest;
use super::FeedSource;
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;

const BOT_USER_AGENT: &str = concat!("newsbot/", env!("CARGO_PKG_VERSION"));

/// HTTP feed source backed by a shared reqwest client
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config.request_timeout(), &config.poll.proxy_url)?;
        Ok(Self { client })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout: Duration, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .default_headers(Self::build_headers())
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5",
            ),
        );
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BOT_USER_AGENT));
        headers
    }

    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            ensure_content_size(len as usize)?;
        }

        let bytes = response.bytes().await?;
        ensure_content_size(bytes.len())?;
        Ok(bytes)
    }
}

fn ensure_content_size(size: usize) -> std::result::Result<(), FetchError> {
    if size > MAX_FEED_BYTES {
        return Err(FetchError::TooLarge(size));
    }
    Ok(())
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Article, FetchError> {
        tracing::debug!(url, "Fetching feed");
        let content = self.fetch_bytes(url).await?;
        parse_latest(&content)
    }
}
