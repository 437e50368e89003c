//! Deterministic stand-ins for the chat and embedding models.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use contextual_retrieval::config::{parse_config, Config};
use contextual_retrieval_core::traits::{ChatCompleter, Embedder};

pub const DIMS: usize = 64;

/// Hashes each lowercase word into one of [`DIMS`] buckets.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-64"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % DIMS;
            v[bucket] += 1.0;
        }
        Ok(v)
    }
}

/// Contextualizes every chunk with a fixed line and echoes answer prompts.
///
/// Chunks containing `EXPLODE` fail. Every prompt is recorded.
#[derive(Default)]
pub struct ScriptedChat {
    pub prompts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedChat {
    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with("Use the following context"))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatCompleter for ScriptedChat {
    async fn chat(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.starts_with("Use the following context") {
            return Ok(format!("ANSWER <<{}>>", prompt));
        }
        let chunk = prompt
            .split("<chunk>\n")
            .nth(1)
            .and_then(|rest| rest.split("\n</chunk>").next())
            .unwrap_or_default();
        if chunk.contains("EXPLODE") {
            bail!("model overloaded");
        }
        Ok("Situated in the test corpus.".to_string())
    }
}

/// A validated config with a database under `tmp` and models disabled.
pub fn test_config(tmp: &TempDir) -> Config {
    test_config_with_bind(tmp, "127.0.0.1:0")
}

pub fn test_config_with_bind(tmp: &TempDir, bind: &str) -> Config {
    let content = format!(
        r#"
[db]
path = "{}"

[chunking]
max_chars = 120
overlap_chars = 0

[ingest]
max_concurrency = 4

[retrieval]
top_k = 5

[server]
bind = "{}"
"#,
        tmp.path().join("crag.sqlite").display(),
        bind
    );
    parse_config(&content).unwrap()
}
