//! Embedding client abstraction and the Gemini adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Gemini accepts at most this many texts per batch request.
const MAX_BATCH_SIZE: usize = 100;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded or did not match the request.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// What the embedded text will be used for; Gemini tunes vectors per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    /// Chunks stored in the index.
    Document,
    /// Questions used to search the index.
    Query,
}

impl EmbeddingTask {
    fn as_gemini(self) -> &'static str {
        match self {
            Self::Document => "RETRIEVAL_DOCUMENT",
            Self::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        task: EmbeddingTask,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding client backed by the Gemini `batchEmbedContents` endpoint.
pub struct GeminiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingClient {
    /// Construct a client for `model`, expecting vectors of `dimension` floats.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("docchat/embedding")
            .build()
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/{}:batchEmbedContents", self.base_url, self.model)
    }

    fn batch_payload(&self, texts: &[String], task: EmbeddingTask) -> Value {
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": text }] },
                    "taskType": task.as_gemini(),
                })
            })
            .collect();
        json!({ "requests": requests })
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        task: EmbeddingTask,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.batch_payload(texts, task))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: BatchEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        body.embeddings
            .into_iter()
            .map(|embedding| {
                if embedding.values.len() == self.dimension {
                    Ok(embedding.values)
                } else {
                    Err(EmbeddingClientError::InvalidResponse(format!(
                        "expected dimension {}, got {}",
                        self.dimension,
                        embedding.values.len()
                    )))
                }
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        task: EmbeddingTask,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        tracing::debug!(
            model = %self.model,
            dimension = self.dimension,
            texts = texts.len(),
            task = ?task,
            "Generating embeddings"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            vectors.extend(self.embed_batch(batch, task).await?);
        }
        Ok(vectors)
    }
}
