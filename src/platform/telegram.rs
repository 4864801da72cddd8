use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use super::{Messenger, OutgoingMessage};
use crate::config::TelegramConfig;

/// Telegram rejects messages longer than 4096 characters; leave headroom.
const MESSAGE_CHUNK_CHARS: usize = 4000;

/// Preferred break points, strongest first.
const BREAKS: [&str; 3] = ["\n\n", "\n", " "];

/// Cut `text` into pieces of at most `max_chars` characters. Each piece ends
/// on the last paragraph, line or word break in its second half, so a cut
/// rarely lands inside a Markdown span.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let window = &rest[..limit];

        let cut = BREAKS
            .iter()
            .find_map(|sep| {
                window
                    .rfind(sep)
                    .map(|pos| pos + sep.len())
                    .filter(|&end| end > limit / 2)
            })
            .unwrap_or(limit);

        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Telegram refused the formatting, not the message itself.
fn is_markup_error(err: &RequestError) -> bool {
    match err {
        RequestError::Api(ApiError::CantParseEntities(_)) => true,
        RequestError::Api(other) => other.to_string().contains("can't parse entities"),
        _ => false,
    }
}

fn keyboard(message: &OutgoingMessage) -> Option<InlineKeyboardMarkup> {
    if message.buttons.is_empty() {
        return None;
    }
    let rows = message.buttons.iter().map(|b| {
        vec![InlineKeyboardButton::callback(
            b.label.clone(),
            b.callback_data.clone(),
        )]
    });
    Some(InlineKeyboardMarkup::new(rows))
}

/// Bot API client over teloxide's `Bot`.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Telegram HTTP client")?;

        let api_url: reqwest::Url = config
            .api_url
            .parse()
            .with_context(|| format!("Invalid Telegram API url: {}", config.api_url))?;

        Ok(Self {
            bot: Bot::with_client(config.bot_token.clone(), client).set_api_url(api_url),
        })
    }

    async fn send_chunk(
        &self,
        chat_id: ChatId,
        text: &str,
        markdown: bool,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        let mut request = self.bot.send_message(chat_id, text.to_string());
        if markdown {
            request = request.parse_mode(ParseMode::Markdown);
        }
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        request.await.map(|_| ())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    /// Long texts go out as several messages; the keyboard rides on the last one.
    /// A chunk whose Markdown Telegram can't parse is resent as plain text.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let chat_id = ChatId(message.chat_id);
        let chunks = split_message(&message.text, MESSAGE_CHUNK_CHARS);
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard(message) } else { None };

            match self
                .send_chunk(chat_id, chunk, message.markdown, markup.clone())
                .await
            {
                Ok(()) => {}
                Err(e) if message.markdown && is_markup_error(&e) => {
                    warn!("Markdown rejected, resending as plain text: {}", e);
                    self.send_chunk(chat_id, chunk, false, markup)
                        .await
                        .context("Telegram sendMessage (plain text) failed")?;
                }
                Err(e) => return Err(e).context("Telegram sendMessage failed"),
            }
        }

        debug!("Sent {} chunk(s) to {}", chunks.len(), message.chat_id);
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(teloxide::types::CallbackQueryId(query_id.to_string()))
            .await
            .context("Telegram answerCallbackQuery failed")?;
        Ok(())
    }
}
