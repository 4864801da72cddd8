pub mod telegram;
pub mod update;

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Callback payload prefix for bill buttons.
pub const BILL_CALLBACK_PREFIX: &str = "bill:";

pub fn bill_callback_data(number: &str) -> String {
    format!("{}{}", BILL_CALLBACK_PREFIX, number)
}

/// An inline button under a message.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineButton {
    pub label: String,
    /// Opaque token echoed back in the callback query.
    pub callback_data: String,
}

/// A message to send to a chat. Each button gets its own keyboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub buttons: Vec<InlineButton>,
    /// Sent with Markdown parse mode. Off for texts echoing user input.
    pub markdown: bool,
}

impl OutgoingMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            buttons: Vec::new(),
            markdown: true,
        }
    }

    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            markdown: false,
            ..Self::text(chat_id, text)
        }
    }

    pub fn with_button(mut self, label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        self.buttons.push(InlineButton {
            label: label.into(),
            callback_data: callback_data.into(),
        });
        self
    }
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<()>;

    /// Acknowledge a button press so the client stops showing a spinner.
    async fn answer_callback(&self, query_id: &str) -> Result<()>;
}

/// Fire-and-forget an outbound call: failures are logged, never returned.
pub async fn deliver<F>(action: &str, call: F)
where
    F: Future<Output = Result<()>>,
{
    match call.await {
        Ok(()) => debug!("{} delivered", action),
        Err(e) => warn!("{} failed: {:#}", action, e),
    }
}
