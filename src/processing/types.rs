//! Core data types and error definitions for the processing pipeline.

use crate::{
    config::{ChunkUnit, Config},
    embedding::EmbeddingClientError,
    index::IndexError,
    llm::LanguageModelError,
    parsing::ParseError,
    query::QueryEngine,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced while cutting sections into windows.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible window size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the document processing pipeline.
///
/// Any variant aborts the whole run; no partially built engine is ever returned.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The upload could not be staged on local storage.
    #[error("Failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),
    /// The parsing service failed or returned nothing usable.
    #[error("Failed to parse document: {0}")]
    Parse(#[from] ParseError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vectors could not be assembled into an index.
    #[error("Failed to build index: {0}")]
    Index(#[from] IndexError),
    /// The language model client could not be constructed.
    #[error("Failed to prepare language model: {0}")]
    LanguageModel(#[from] LanguageModelError),
}

/// Window settings for the chunking step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    /// Maximum window size, in `unit`.
    pub chunk_size: usize,
    /// Amount of trailing content repeated at the start of the next window, in `unit`.
    pub chunk_overlap: usize,
    /// Unit in which size and overlap are measured.
    pub unit: ChunkUnit,
}

/// Settings the processor needs besides the provider clients.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Chunk window settings.
    pub chunking: ChunkingOptions,
    /// Expected embedding dimension.
    pub embedding_dimension: usize,
    /// Character budget of one synthesis context block.
    pub context_window_chars: usize,
}

impl PipelineSettings {
    /// Derive pipeline settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: ChunkingOptions {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                unit: config.chunk_unit,
            },
            embedding_dimension: config.embedding_dimension,
            context_window_chars: config.context_window_chars,
        }
    }
}

/// Result of a successful processing run.
#[derive(Clone)]
pub struct ProcessedDocument {
    /// Query capability bound to the document.
    pub engine: Arc<dyn QueryEngine>,
    /// Number of sections returned by the parser.
    pub sections: usize,
    /// Number of chunks embedded and indexed.
    pub chunk_count: usize,
}

impl std::fmt::Debug for ProcessedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedDocument")
            .field("sections", &self.sections)
            .field("chunk_count", &self.chunk_count)
            .finish_non_exhaustive()
    }
}
