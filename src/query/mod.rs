//! The narrow question-answering capability bound to a processed document.
//!
//! Sessions only ever see [`QueryEngine`]; retrieval, prompt assembly and the model call
//! stay behind it so the provider stack can change without touching session logic.

mod prompts;

use crate::embedding::{EmbeddingClient, EmbeddingClientError, EmbeddingTask};
use crate::index::{IndexError, VectorIndex};
use crate::llm::{LanguageModel, LanguageModelError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Number of chunks retrieved for every question.
pub const SIMILARITY_TOP_K: usize = 3;

/// Errors raised while answering a question.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The question could not be embedded.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The embedding provider returned no vector for the question.
    #[error("Embedding provider returned no vector for the question")]
    EmptyEmbedding,
    /// The index rejected the search.
    #[error("Similarity search failed: {0}")]
    Index(#[from] IndexError),
    /// The language model failed to produce an answer.
    #[error("Failed to synthesize answer: {0}")]
    Generation(#[from] LanguageModelError),
}

/// Answers natural-language questions about one document.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Answer `question` from the document's content.
    async fn ask(&self, question: &str) -> Result<String, QueryError>;
}

/// Retrieval-augmented engine: top-k similarity search followed by compact synthesis.
///
/// Compact synthesis packs the retrieved chunks into as few context blocks as fit the
/// character budget, answers from the first block and refines that answer with each
/// following block.
pub struct RetrieverQueryEngine {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LanguageModel>,
    context_window_chars: usize,
}

impl RetrieverQueryEngine {
    /// Wrap an index with the clients needed to answer questions against it.
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LanguageModel>,
        context_window_chars: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            context_window_chars,
        }
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<String>, QueryError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![question.to_string()], EmbeddingTask::Query)
            .await?;
        let vector = vectors.pop().ok_or(QueryError::EmptyEmbedding)?;
        let hits = self.index.search(&vector, SIMILARITY_TOP_K)?;
        tracing::debug!(
            hits = hits.len(),
            best_score = hits.first().map(|hit| hit.score),
            pages = ?hits.iter().map(|hit| hit.chunk.page).collect::<Vec<_>>(),
            "Retrieved context"
        );
        Ok(hits.into_iter().map(|hit| hit.chunk.text).collect())
    }
}

#[async_trait]
impl QueryEngine for RetrieverQueryEngine {
    async fn ask(&self, question: &str) -> Result<String, QueryError> {
        let texts = self.retrieve(question).await?;
        let blocks = prompts::pack_context(&texts, self.context_window_chars);

        let mut blocks = blocks.iter();
        let first = blocks.next().map(String::as_str).unwrap_or_default();
        let mut answer = self
            .llm
            .complete(&prompts::question_answer(first, question))
            .await?;

        for block in blocks {
            answer = self
                .llm
                .complete(&prompts::refine(block, question, &answer))
                .await?;
        }

        Ok(answer)
    }
}
