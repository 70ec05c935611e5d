mod client;
mod types;

pub use client::TelegramClient;
pub use types::{Chat, Message, Update};
