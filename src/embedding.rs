//! Embedding model adapters.
//!
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls `POST {base_url}/embeddings` on any
//!   OpenAI-compatible server.
//!
//! Use [`create_embedder`] to pick one from the `[embedding]` section:
//!
//! ```rust,no_run
//! # use contextual_retrieval::config::parse_config;
//! # use contextual_retrieval::embedding::create_embedder;
//! let config = parse_config("[db]\npath = \"x\"\n").unwrap(); // provider = "disabled"
//! let embedder = create_embedder(&config.embedding).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use contextual_retrieval_core::traits::Embedder;

use crate::config::ModelConfig;
use crate::openai::OpenAIClient;

/// An embedder that always fails.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct OpenAIEmbedder {
    client: OpenAIClient,
    model: String,
    /// Expected vector length; responses of another length are rejected.
    dims: Option<usize>,
}

impl OpenAIEmbedder {
    pub fn new(client: OpenAIClient, model: impl Into<String>, dims: Option<usize>) -> Self {
        Self {
            client,
            model: model.into(),
            dims,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        Ok(Self::new(OpenAIClient::from_config(config)?, model, config.dims))
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = self.client.post_json("embeddings", &body).await?;
        let vector = parse_embedding_response(&json)?;

        if let Some(dims) = self.dims {
            if vector.len() != dims {
                bail!(
                    "embedding has {} dimensions, expected {}",
                    vector.len(),
                    dims
                );
            }
        }
        Ok(vector)
    }
}

/// Extract `data[0].embedding` from an embeddings response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data[0].embedding"))?;

    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid embeddings response: non-numeric value"))
        })
        .collect()
}

/// Create the [`Embedder`] selected by `config.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
pub fn create_embedder(config: &ModelConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::from_config(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
