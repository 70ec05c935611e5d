use thiserror::Error;

/// Failure to fetch or parse a feed. Always recoverable: the poller retries next cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for URL: {url}")]
    Status { status: u16, url: String },

    #[error("Feed too large ({0} bytes)")]
    TooLarge(usize),

    #[error("Feed parsing error: {0}")]
    Parse(String),

    #[error("Feed has no items")]
    Empty,

    #[error("Fetch timed out after {0}s")]
    Timeout(u64),
}

/// Failure in the subscription / dedup store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The transport rejected or failed to deliver a message.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}

/// The dispatch queue is closed and no longer accepts requests.
#[derive(Error, Debug)]
#[error("Dispatch queue closed")]
pub struct DispatchError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(StoreError::Database(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
