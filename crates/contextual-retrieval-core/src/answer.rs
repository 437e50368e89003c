//! Answer composition: hybrid retrieval followed by one completion call.

use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::fusion::HybridRetriever;
use crate::traits::ChatCompleter;

/// Number of fused chunks placed in the answer context.
pub const DEFAULT_TOP_K: usize = 5;

/// Separator between chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Build the answer prompt for a context block and a question.
pub fn answer_prompt(context: &str, query: &str) -> String {
    format!(
        "Use the following context to answer the question:\n\nContext:\n{}\n\nQuestion: {}",
        context, query
    )
}

/// Answers questions from the fused top-k chunks.
#[derive(Clone)]
pub struct AnswerComposer {
    retriever: HybridRetriever,
    chat: Arc<dyn ChatCompleter>,
    top_k: usize,
}

impl AnswerComposer {
    pub fn new(retriever: HybridRetriever, chat: Arc<dyn ChatCompleter>) -> Self {
        Self {
            retriever,
            chat,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve context for `query` and return the model's answer verbatim.
    ///
    /// An empty retrieval still produces one completion call, with an
    /// empty context block.
    pub async fn answer(&self, query: &str) -> Result<String> {
        info!(query, "processing query");
        let chunks = self.retriever.retrieve(query, self.top_k).await?;
        let context = chunks.join(CONTEXT_SEPARATOR);

        let answer = self
            .chat
            .chat(&answer_prompt(&context, query))
            .await
            .map_err(Error::Completion)?;

        info!(query, context_chunks = chunks.len(), "generated answer");
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        assert_eq!(
            answer_prompt("c1\n\nc2", "why?"),
            "Use the following context to answer the question:\n\nContext:\nc1\n\nc2\n\nQuestion: why?"
        );
    }

    #[test]
    fn test_prompt_with_empty_context() {
        assert_eq!(
            answer_prompt("", "q"),
            "Use the following context to answer the question:\n\nContext:\n\n\nQuestion: q"
        );
    }
}
