//! HTTP client for the LlamaParse job API.

use super::{DocumentParser, DocumentSection, ParseError, split_sections};
use async_trait::async_trait;
use reqwest::{Client, Response, multipart};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// LlamaParse client configured for markdown output.
pub struct LlamaParseClient {
    http: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarkdownResponse {
    markdown: String,
}

impl LlamaParseClient {
    /// Build a client for the service at `base_url`, authenticating with `api_key`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, ParseError> {
        let http = Client::builder().user_agent("docchat/0.1").build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            poll_interval,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/parsing/{path}", self.base_url)
    }

    async fn upload(&self, path: &Path) -> Result<String, ParseError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        tracing::debug!(file = %file_name, bytes = bytes.len(), "Uploading document to LlamaParse");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("result_type", "markdown");

        let response = self
            .http
            .post(self.endpoint("upload"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let job: JobResponse = ensure_success(response).await?.json().await?;
        tracing::info!(job_id = %job.id, "Parsing job submitted");
        Ok(job.id)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<(), ParseError> {
        let started = Instant::now();
        loop {
            let response = self
                .http
                .get(self.endpoint(&format!("job/{job_id}")))
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let job: JobResponse = ensure_success(response).await?.json().await?;
            let status = job.status.unwrap_or_default().to_uppercase();
            match status.as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" | "CANCELLED" => {
                    return Err(ParseError::JobFailed {
                        job_id: job_id.to_string(),
                        status,
                    });
                }
                _ => tracing::trace!(job_id, status = %status, "Parsing job still running"),
            }

            if started.elapsed() >= self.timeout {
                return Err(ParseError::Timeout {
                    job_id: job_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_markdown(&self, job_id: &str) -> Result<String, ParseError> {
        let response = self
            .http
            .get(self.endpoint(&format!("job/{job_id}/result/markdown")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let result: MarkdownResponse = ensure_success(response).await?.json().await?;
        Ok(result.markdown)
    }
}

#[async_trait]
impl DocumentParser for LlamaParseClient {
    async fn parse(&self, path: &Path) -> Result<Vec<DocumentSection>, ParseError> {
        let job_id = self.upload(path).await?;
        self.wait_for_job(&job_id).await?;
        let markdown = self.fetch_markdown(&job_id).await?;
        let sections = split_sections(&markdown);
        if sections.is_empty() {
            return Err(ParseError::EmptyResult);
        }
        tracing::info!(job_id = %job_id, sections = sections.len(), "Document parsed");
        Ok(sections)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ParseError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = ParseError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "LlamaParse request failed");
    Err(error)
}
