//! Chunk contextualization.
//!
//! Each chunk is sent to the chat model together with the whole document
//! and the model is asked for a short description situating the chunk.
//! The description is prepended to the chunk, separated by a blank line,
//! and that augmented text is what gets embedded and full-text indexed.

use anyhow::Result;
use tracing::debug;

use crate::traits::ChatCompleter;

pub const WHOLE_DOCUMENT_PLACEHOLDER: &str = "{{WHOLE_DOCUMENT}}";
pub const CHUNK_CONTENT_PLACEHOLDER: &str = "{{CHUNK_CONTENT}}";

/// Prompt template sent once per chunk.
pub const CONTEXTUALIZATION_PROMPT: &str = "<document>
{{WHOLE_DOCUMENT}}
</document>
Here is the chunk we want to situate within the whole document
<chunk>
{{CHUNK_CONTENT}}
</chunk>
Please give a short succinct context to situate this chunk within the overall document for the purposes of improving search retrieval of the chunk. Answer only with the succinct context and nothing else.
";

/// The contextualization prompt with the whole document already substituted.
///
/// Substitution order matches a per-chunk `replace` of the document then the
/// chunk, so building this once per document gives identical prompts.
#[derive(Debug, Clone)]
pub struct DocumentPrompt {
    template: String,
}

impl DocumentPrompt {
    pub fn new(whole_document: &str) -> Self {
        Self {
            template: CONTEXTUALIZATION_PROMPT.replace(WHOLE_DOCUMENT_PLACEHOLDER, whole_document),
        }
    }

    /// Full prompt for one chunk.
    pub fn for_chunk(&self, chunk: &str) -> String {
        self.template.replace(CHUNK_CONTENT_PLACEHOLDER, chunk)
    }
}

/// `description + "\n\n" + chunk`.
pub fn augment(description: &str, chunk: &str) -> String {
    format!("{}\n\n{}", description, chunk)
}

/// Ask the model to situate `chunk` and return the augmented chunk text.
pub async fn contextualize_with(
    chat: &dyn ChatCompleter,
    prompt: &DocumentPrompt,
    chunk: &str,
) -> Result<String> {
    let description = chat.chat(&prompt.for_chunk(chunk)).await?;
    debug!(context = %description, "generated chunk context");
    Ok(augment(&description, chunk))
}

/// One-shot form of [`contextualize_with`] for a single chunk.
pub async fn contextualize(
    chat: &dyn ChatCompleter,
    whole_document: &str,
    chunk: &str,
) -> Result<String> {
    contextualize_with(chat, &DocumentPrompt::new(whole_document), chunk).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt and answers with a fixed description.
    struct RecordingChat {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatCompleter for RecordingChat {
        async fn chat(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("ctx".to_string())
        }
    }

    #[test]
    fn test_prompt_substitutes_both_placeholders() {
        let prompt = DocumentPrompt::new("The whole text.").for_chunk("A piece.");
        assert!(prompt.starts_with("<document>\nThe whole text.\n</document>\n"));
        assert!(prompt.contains("<chunk>\nA piece.\n</chunk>\n"));
        assert!(!prompt.contains(WHOLE_DOCUMENT_PLACEHOLDER));
        assert!(!prompt.contains(CHUNK_CONTENT_PLACEHOLDER));
    }

    #[test]
    fn test_hoisted_prompt_matches_sequential_replace() {
        // A document quoting the chunk placeholder gets it replaced too.
        let doc = "Intro {{CHUNK_CONTENT}} outro";
        let chunk = "body";
        let sequential = CONTEXTUALIZATION_PROMPT
            .replace(WHOLE_DOCUMENT_PLACEHOLDER, doc)
            .replace(CHUNK_CONTENT_PLACEHOLDER, chunk);
        assert_eq!(DocumentPrompt::new(doc).for_chunk(chunk), sequential);
    }

    #[test]
    fn test_augment_joins_with_blank_line() {
        assert_eq!(augment("ctx", "A"), "ctx\n\nA");
    }

    #[tokio::test]
    async fn test_contextualize_sends_prompt_and_prepends_description() {
        let chat = RecordingChat {
            prompts: Mutex::new(Vec::new()),
        };

        let augmented = contextualize(&chat, "Whole doc. A", "A").await.unwrap();

        assert_eq!(augmented, "ctx\n\nA");
        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            prompts[0],
            CONTEXTUALIZATION_PROMPT
                .replace(WHOLE_DOCUMENT_PLACEHOLDER, "Whole doc. A")
                .replace(CHUNK_CONTENT_PLACEHOLDER, "A")
        );
    }
}
