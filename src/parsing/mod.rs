//! Conversion of uploaded PDFs into markdown sections.
//!
//! Layout analysis is delegated to LlamaParse; this module only submits the file, waits for
//! the job and splits the returned markdown into page sections.

mod llama_parse;

pub use llama_parse::LlamaParseClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::Path;
use thiserror::Error;

/// Separator LlamaParse places between pages of a markdown result.
pub const PAGE_SEPARATOR: &str = "\n---\n";

/// Errors raised while turning a file into document sections.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be read from local storage.
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The parsing service responded with an unexpected status code.
    #[error("Unexpected parsing service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The parsing job finished without producing a result.
    #[error("Parsing job {job_id} ended with status {status}")]
    JobFailed {
        /// Identifier assigned by the parsing service.
        job_id: String,
        /// Terminal status reported for the job.
        status: String,
    },
    /// The parsing job did not finish within the configured timeout.
    #[error("Parsing job {job_id} did not finish within {waited_secs}s")]
    Timeout {
        /// Identifier assigned by the parsing service.
        job_id: String,
        /// Seconds spent waiting before giving up.
        waited_secs: u64,
    },
    /// The service returned no text for the document.
    #[error("Parsing service returned no content")]
    EmptyResult,
}

/// One section of parsed markdown, typically a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSection {
    /// One-based page number the section was cut from.
    pub page: usize,
    /// Markdown content of the section.
    pub text: String,
}

/// Interface implemented by document parsing backends.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse the file at `path` into markdown sections.
    async fn parse(&self, path: &Path) -> Result<Vec<DocumentSection>, ParseError>;
}

/// Split a markdown result into page sections, dropping pages without text.
pub fn split_sections(markdown: &str) -> Vec<DocumentSection> {
    markdown
        .split(PAGE_SEPARATOR)
        .enumerate()
        .filter_map(|(idx, page)| {
            let text = page.trim();
            (!text.is_empty()).then(|| DocumentSection {
                page: idx + 1,
                text: text.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sections_numbers_pages_and_skips_blank_ones() {
        let markdown = "# Balance sheet\nAssets\n---\n   \n---\n## Notes\nSee above";
        let sections = split_sections(markdown);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].page, 1);
        assert_eq!(sections[0].text, "# Balance sheet\nAssets");
        assert_eq!(sections[1].page, 3);
        assert_eq!(sections[1].text, "## Notes\nSee above");
    }

    #[test]
    fn split_sections_of_whitespace_is_empty() {
        assert!(split_sections(" \n\t").is_empty());
    }
}
