use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::types::{ApiResponse, Update};
use crate::config::AppConfig;
use crate::dispatch::{FormatMode, RecipientId, Transport};
use crate::error::SendError;
use crate::{Error, Result};

/// Headroom on top of the long-poll timeout before the HTTP client gives up
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(client: Client, api_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            bot_token: bot_token.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.telegram.long_poll_timeout_secs) + LONG_POLL_SLACK;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self::new(
            client,
            config.telegram.api_url.clone(),
            config.telegram.bot_token.clone(),
        ))
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> std::result::Result<T, SendError> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Http(e.without_url()))?;

        let status = resp.status();
        let api: ApiResponse<T> = match resp.json().await {
            Ok(api) => api,
            Err(_) if !status.is_success() => {
                return Err(SendError::Api {
                    code: status.as_u16() as i64,
                    description: status.to_string(),
                });
            }
            Err(e) => return Err(SendError::Http(e.without_url())),
        };

        if !api.ok {
            return Err(SendError::Api {
                code: api.error_code.unwrap_or(status.as_u16() as i64),
                description: api.description.unwrap_or_default(),
            });
        }

        api.result.ok_or_else(|| SendError::Api {
            code: status.as_u16() as i64,
            description: format!("{} returned no result", method),
        })
    }

    /// Send a text message
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
    ) -> std::result::Result<(), SendError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode);
        }

        let _message: Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> std::result::Result<Vec<Update>, SendError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, recipient: RecipientId, text: &str, mode: FormatMode) -> std::result::Result<(), SendError> {
        self.send_message(recipient, text, mode.parse_mode()).await
    }
}
