//! Minimal client for OpenAI-compatible HTTP APIs.
//!
//! Shared by the embedding and chat adapters. Requests carry a bearer
//! token when one is configured, time out after `timeout_secs`, and are
//! retried with exponential backoff only for transient failures:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! `max_retries` defaults to 0, so out of the box every call is attempted
//! exactly once.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;
use tracing::warn;

use crate::config::ModelConfig;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl OpenAIClient {
    /// Build a client from a model section, reading the key from
    /// [`API_KEY_ENV`]. A missing key is only an error against the
    /// public OpenAI endpoint; local compatible servers often need none.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        if api_key.is_none() && config.base_url.contains("api.openai.com") {
            bail!("{} environment variable not set", API_KEY_ENV);
        }
        Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
        })
    }

    /// POST `body` to `{base_url}/{path}` and return the JSON response.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(url = %url, attempt, "retrying after transient error");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("request to {} failed after retries", url)))
    }
}
