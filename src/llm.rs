//! Chat completion adapters.
//!
//! [`OpenAIChat`] sends the prompt as a single user message to
//! `POST {base_url}/chat/completions` and returns the first choice's
//! message content verbatim. [`DisabledChat`] always fails.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use contextual_retrieval_core::traits::ChatCompleter;

use crate::config::ModelConfig;
use crate::openai::OpenAIClient;

pub struct DisabledChat;

#[async_trait]
impl ChatCompleter for DisabledChat {
    async fn chat(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

pub struct OpenAIChat {
    client: OpenAIClient,
    model: String,
}

impl OpenAIChat {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for OpenAI provider"))?;
        Ok(Self::new(OpenAIClient::from_config(config)?, model))
    }
}

#[async_trait]
impl ChatCompleter for OpenAIChat {
    async fn chat(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let json = self.client.post_json("chat/completions", &body).await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|content| content.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Create the [`ChatCompleter`] selected by `config.provider`.
pub fn create_chat(config: &ModelConfig) -> Result<Arc<dyn ChatCompleter>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => Ok(Arc::new(OpenAIChat::from_config(config)?)),
        other => bail!("Unknown LLM provider: {}", other),
    }
}
