use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::prompt::SYSTEM_PROMPT;

/// Reply used when no completion API key is configured.
pub const MISSING_KEY_MESSAGE: &str = "⚠️ Объяснения пока недоступны: не задан ключ OPENAI_API_KEY. \
Администратору нужно добавить его в настройки бота.";

/// Header prepended to every explanation.
pub fn answer_header(number: &str) -> String {
    format!("📋 **Закон № {}**", number)
}

/// Turns a bill prompt into user-facing text.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, prompt: &str, number: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI-compatible chat completion client.
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build completion HTTP client")?;
        Ok(Self { client, config })
    }

    /// Single completion round trip. Returns the trimmed answer text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT),
                ChatMessage::new("user", prompt),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.effective_base_url().trim_end_matches('/')
        );

        debug!("Sending completion request to {} ({})", url, self.config.provider);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to send completion request")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let answer = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .context("Completion API returned no answer")?;

        info!("Completion received: {} chars", answer.chars().count());
        Ok(answer)
    }
}

#[async_trait]
impl Explainer for LlmClient {
    async fn explain(&self, prompt: &str, number: &str) -> Result<String> {
        if !self.config.has_api_key() {
            return Ok(MISSING_KEY_MESSAGE.to_string());
        }

        let answer = self.complete(prompt).await?;
        Ok(format!("{}\n\n{}", answer_header(number), answer))
    }
}
