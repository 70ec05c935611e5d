//! Single rate-limited outbound queue shared by every producer.

mod render;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, SendError};

pub use render::{escape_markdown, render_article};

/// Messaging-platform chat identifier
pub type RecipientId = i64;

/// How the transport should interpret message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    Plain,
    /// Bold and inline links in Telegram's legacy Markdown
    Markdown,
}

impl FormatMode {
    /// Value for the Bot API `parse_mode` field
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            FormatMode::Plain => None,
            FormatMode::Markdown => Some("Markdown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub recipient: RecipientId,
    pub text: String,
    pub mode: FormatMode,
}

impl DispatchRequest {
    pub fn new(recipient: RecipientId, text: impl Into<String>, mode: FormatMode) -> Self {
        Self {
            recipient,
            text: text.into(),
            mode,
        }
    }
}

/// Outbound message transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, recipient: RecipientId, text: &str, mode: FormatMode) -> Result<(), SendError>;
}

/// Producer side of the dispatch queue
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::UnboundedSender<DispatchRequest>,
}

impl DispatchHandle {
    pub fn enqueue(&self, request: DispatchRequest) -> Result<(), DispatchError> {
        self.sender.send(request).map_err(|_| DispatchError)
    }
}

/// Counters reported when the dispatcher stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// The single consumer of the dispatch queue.
///
/// Sends strictly in enqueue order with at least `min_interval` between the starts of two
/// consecutive sends. Stops once every `DispatchHandle` is dropped and the queue is empty.
pub struct Dispatcher {
    receiver: mpsc::UnboundedReceiver<DispatchRequest>,
    transport: Arc<dyn Transport>,
    min_interval: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, min_interval: Duration) -> (Self, DispatchHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = Self {
            receiver,
            transport,
            min_interval,
        };
        (dispatcher, DispatchHandle { sender })
    }

    pub async fn run(mut self) -> DispatchStats {
        info!("Dispatcher started (min interval {}ms)", self.min_interval.as_millis());

        let mut stats = DispatchStats::default();
        let mut last_send: Option<Instant> = None;

        while let Some(request) = self.receiver.recv().await {
            if request.text.trim().is_empty() {
                debug!(recipient = request.recipient, "Dropping empty message");
                stats.dropped += 1;
                continue;
            }

            if let Some(last) = last_send {
                tokio::time::sleep_until(last + self.min_interval).await;
            }
            last_send = Some(Instant::now());

            match self.transport.send(request.recipient, &request.text, request.mode).await {
                Ok(()) => {
                    debug!(recipient = request.recipient, "Message sent");
                    stats.sent += 1;
                }
                Err(e) => {
                    warn!(recipient = request.recipient, "Failed to send message: {}", e);
                    stats.failed += 1;
                }
            }
        }

        info!(
            "Dispatcher stopped: {} sent, {} failed, {} dropped",
            stats.sent, stats.failed, stats.dropped
        );
        stats
    }
}
