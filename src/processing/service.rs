//! Processing service: parse → chunk → embed → index → wrap.

use crate::{
    config::{Config, get_config},
    embedding::{EmbeddingClient, EmbeddingTask, GeminiEmbeddingClient},
    index::VectorIndex,
    llm::{GeminiClient, GenerationSettings, LanguageModel},
    parsing::{DocumentParser, DocumentSection, LlamaParseClient},
    processing::{
        chunking::chunk_sections,
        types::{PipelineSettings, ProcessedDocument, ProcessingError},
        upload::StagedUpload,
    },
    query::RetrieverQueryEngine,
    session::Credentials,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Abstraction over the processing pipeline used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Turn a staged upload into a query engine using the session's credentials.
    ///
    /// The staged file is deleted once parsing has finished, successfully or not.
    async fn process_upload(
        &self,
        credentials: &Credentials,
        upload: StagedUpload,
    ) -> Result<ProcessedDocument, ProcessingError>;
}

/// Builds provider clients from per-session credentials and runs the pipeline.
///
/// Construct once near process start and share it through an `Arc`.
pub struct ProcessingService {
    config: Config,
}

impl ProcessingService {
    /// Build a service from the global configuration.
    pub fn new() -> Self {
        Self::with_config(get_config().clone())
    }

    /// Build a service from an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Assemble a processor bound to `credentials`.
    pub fn processor_for(
        &self,
        credentials: &Credentials,
    ) -> Result<DocumentProcessor, ProcessingError> {
        let config = &self.config;
        let parser = LlamaParseClient::new(
            config.llama_parse_url.as_str(),
            credentials.llama_cloud_api_key(),
            Duration::from_millis(config.parse_poll_interval_ms),
            Duration::from_secs(config.parse_timeout_secs),
        )?;
        let embedder = GeminiEmbeddingClient::new(
            config.gemini_url.as_str(),
            credentials.gemini_api_key(),
            config.embedding_model.as_str(),
            config.embedding_dimension,
        )?;
        let llm = GeminiClient::new(
            config.gemini_url.as_str(),
            credentials.gemini_api_key(),
            GenerationSettings {
                model: config.llm_model.clone(),
                temperature: config.llm_temperature,
                top_p: config.llm_top_p,
                max_output_tokens: config.llm_max_tokens,
            },
        )?;

        Ok(DocumentProcessor::new(
            Arc::new(parser),
            Arc::new(embedder),
            Arc::new(llm),
            PipelineSettings::from_config(config),
        ))
    }
}

impl Default for ProcessingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn process_upload(
        &self,
        credentials: &Credentials,
        upload: StagedUpload,
    ) -> Result<ProcessedDocument, ProcessingError> {
        self.processor_for(credentials)?.process_upload(upload).await
    }
}

/// One configured pipeline run against a fixed set of provider clients.
pub struct DocumentProcessor {
    parser: Arc<dyn DocumentParser>,
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LanguageModel>,
    settings: PipelineSettings,
}

impl DocumentProcessor {
    /// Assemble a processor from provider clients.
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LanguageModel>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            parser,
            embedder,
            llm,
            settings,
        }
    }

    /// Process the PDF at `path` into a query engine.
    ///
    /// The file is only read while parsing; the caller keeps ownership of it.
    pub async fn process_document(
        &self,
        path: &Path,
    ) -> Result<ProcessedDocument, ProcessingError> {
        let sections = self.parse(path).await?;
        self.index_sections(sections).await
    }

    /// Process a staged upload, deleting the staged file right after parsing.
    pub async fn process_upload(
        &self,
        upload: StagedUpload,
    ) -> Result<ProcessedDocument, ProcessingError> {
        tracing::info!(
            file = upload.file_name(),
            bytes = upload.size_bytes(),
            "Processing upload"
        );
        let parsed = self.parse(upload.path()).await;
        drop(upload);
        self.index_sections(parsed?).await
    }

    async fn parse(&self, path: &Path) -> Result<Vec<DocumentSection>, ProcessingError> {
        tracing::debug!(path = %path.display(), "Parsing document");
        Ok(self.parser.parse(path).await?)
    }

    async fn index_sections(
        &self,
        sections: Vec<DocumentSection>,
    ) -> Result<ProcessedDocument, ProcessingError> {
        let section_count = sections.len();
        let chunks = chunk_sections(&sections, self.settings.chunking)?;
        tracing::debug!(
            sections = section_count,
            chunks = chunks.len(),
            chunk_size = self.settings.chunking.chunk_size,
            chunk_overlap = self.settings.chunking.chunk_overlap,
            "Document chunked"
        );

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
            self.embedder
                .generate_embeddings(texts, EmbeddingTask::Document)
                .await?
        };

        let chunk_count = chunks.len();
        let index = VectorIndex::build(self.settings.embedding_dimension, chunks, vectors)?;
        let engine = RetrieverQueryEngine::new(
            index,
            Arc::clone(&self.embedder),
            Arc::clone(&self.llm),
            self.settings.context_window_chars,
        );
        tracing::info!(
            sections = section_count,
            chunks = chunk_count,
            "Document indexed"
        );

        Ok(ProcessedDocument {
            engine: Arc::new(engine),
            sections: section_count,
            chunk_count,
        })
    }
}
