//! Text-generation backends.
//!
//! - **`openai`**: [`ChatCompletionsGenerator`], any OpenAI-compatible
//!   `/v1/chat/completions` endpoint (OpenAI, Groq, a local server). The
//!   endpoint, model and API-key variable come from `[generation]`.
//! - **`disabled`**: [`DisabledGenerator`] returns empty output, so every
//!   generated answer falls back to the "I don't know" answer while the
//!   deterministic inventory and structure answers still work.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use gitsage_core::generate::Generator;

use crate::config::GenerationConfig;
use crate::embedding::post_json_with_retry;

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }
}

pub struct ChatCompletionsGenerator {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for openai provider"))?;
        let api_key = std::env::var(config.api_key_var())
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_var()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            url: config.url.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        });
        if let Some(max) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }

        let json = post_json_with_retry(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "Chat completions",
        )
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`. A missing or null content is
/// treated as an empty answer.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let choices = json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices array"))?;

    Ok(choices
        .first()
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}
