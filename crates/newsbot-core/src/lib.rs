pub mod bot;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod poller;
pub mod service;
pub mod storage;
pub mod telegram;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use service::NewsService;
