//! Language model abstraction used for answer synthesis, plus the Gemini adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while generating text.
#[derive(Debug, Error)]
pub enum LanguageModelError {
    /// Provider could not be reached.
    #[error("Language model unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or carried no text.
    #[error("Malformed model response: {0}")]
    InvalidResponse(String),
}

/// Sampling settings applied to every completion.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Fully qualified model identifier, e.g. `models/gemini-1.5-flash`.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Output token limit.
    pub max_output_tokens: u32,
}

/// Interface implemented by text generation backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, LanguageModelError>;
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    settings: GenerationSettings,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client talking to `base_url` with the given key and sampling settings.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: GenerationSettings,
    ) -> Result<Self, LanguageModelError> {
        let http = Client::builder()
            .user_agent("docchat/llm")
            .build()
            .map_err(|error| LanguageModelError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/{}:generateContent",
            self.base_url, self.settings.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LanguageModelError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "topP": self.settings.top_p,
                "maxOutputTokens": self.settings.max_output_tokens,
            }
        });

        tracing::debug!(
            model = %self.settings.model,
            prompt_chars = prompt.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                LanguageModelError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LanguageModelError::ProviderUnavailable(format!(
                "model endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LanguageModelError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|error| {
            LanguageModelError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        let candidate = body.candidates.into_iter().next().ok_or_else(|| {
            LanguageModelError::InvalidResponse("response contained no candidates".into())
        })?;
        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LanguageModelError::InvalidResponse(format!(
                "candidate carried no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text.trim().to_string())
    }
}
