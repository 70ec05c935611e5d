use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::{Feed, FeedId};

/// Environment variable that overrides `telegram.bot_token`
pub const BOT_TOKEN_ENV: &str = "NEWSBOT_BOT_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (holds the SQLite database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level, used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    pub bot_token: String,
    /// Bot API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Long-poll timeout for getUpdates
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_api_url(),
            long_poll_timeout_secs: default_long_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between two polls of the same feed
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Upper bound on a single fetch; must stay below the poll interval
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// How far back the first poll of a feed may reach
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            request_timeout_secs: default_timeout(),
            lookback_hours: default_lookback_hours(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Minimum gap between two outbound sends
    #[serde(default = "default_send_interval")]
    pub send_interval_ms: u64,
    /// How long shutdown waits for queued messages to drain
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: default_send_interval(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: FeedId,
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsbot")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_long_poll_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    20
}

/// Five years
const MAX_LOOKBACK_HOURS: u64 = 5 * 365 * 24;

fn default_lookback_hours() -> u64 {
    24
}

fn default_send_interval() -> u64 {
    40 // Telegram allows ~30 messages per second across chats
}

fn default_drain_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from `path` (or the default location) and apply env overrides.
    ///
    /// A missing file at the default location yields defaults; a missing file that was
    /// asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else if path.is_some() {
            return Err(crate::Error::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        } else {
            Self::default()
        };

        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.telegram.bot_token = token.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Check everything the pipeline relies on. Any failure here is fatal at startup.
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if !seen.insert(feed.id) {
                return Err(crate::Error::Config(format!("duplicate feed id {}", feed.id)));
            }
            if feed.name.trim().is_empty() {
                return Err(crate::Error::Config(format!("feed {} has an empty name", feed.id)));
            }
            url::Url::parse(&feed.url).map_err(|e| {
                crate::Error::Config(format!("feed {} has an invalid url '{}': {}", feed.id, feed.url, e))
            })?;
        }

        if self.poll.interval_secs == 0 {
            return Err(crate::Error::Config("poll.interval_secs must be positive".to_string()));
        }
        if self.poll.request_timeout_secs == 0
            || self.poll.request_timeout_secs >= self.poll.interval_secs
        {
            return Err(crate::Error::Config(format!(
                "poll.request_timeout_secs ({}) must be positive and below poll.interval_secs ({})",
                self.poll.request_timeout_secs, self.poll.interval_secs
            )));
        }
        if self.poll.lookback_hours == 0 || self.poll.lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(crate::Error::Config(format!(
                "poll.lookback_hours ({}) must be between 1 and {}",
                self.poll.lookback_hours, MAX_LOOKBACK_HOURS
            )));
        }
        if self.dispatch.send_interval_ms == 0 {
            return Err(crate::Error::Config("dispatch.send_interval_ms must be positive".to_string()));
        }

        Ok(())
    }

    /// `validate` plus the checks only the long-running service needs.
    pub fn validate_for_service(&self) -> crate::Result<()> {
        self.validate()?;
        if self.telegram.bot_token.trim().is_empty() {
            return Err(crate::Error::Config(format!(
                "telegram.bot_token is empty (set it in the config file or via {})",
                BOT_TOKEN_ENV
            )));
        }
        if !self.feeds.iter().any(|f| f.enabled) {
            return Err(crate::Error::Config("no enabled feeds configured".to_string()));
        }
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newsbot/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newsbot")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("newsbot.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// All configured feeds, enabled or not
    pub fn feeds(&self) -> Vec<Feed> {
        self.feeds.iter().map(Feed::from).collect()
    }

    pub fn find_feed(&self, id: FeedId) -> Option<Feed> {
        self.feeds.iter().find(|f| f.id == id).map(Feed::from)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.request_timeout_secs)
    }

    pub fn lookback(&self) -> chrono::Duration {
        let hours = self.poll.lookback_hours.min(MAX_LOOKBACK_HOURS) as i64;
        chrono::Duration::try_hours(hours).unwrap_or_else(chrono::Duration::zero)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch.send_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.drain_timeout_secs)
    }
}
