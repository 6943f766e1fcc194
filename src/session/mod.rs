//! Per-session state: credentials, the bound document and the chat transcript.
//!
//! A [`Session`] is an explicit context object. Every operation receives it; nothing about
//! a session lives in globals. Sessions are created on the first request of a browser
//! session and dropped when it ends.

mod credentials;
mod store;
mod transcript;

pub use credentials::{Credentials, CredentialsError, SessionConfig};
pub use store::{SessionId, SessionStore};
pub use transcript::{Role, Transcript, Turn};

use crate::query::{QueryEngine, QueryError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Failures of session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A query was attempted before both keys were configured.
    #[error("API keys are not configured for this session")]
    NotConfigured,
    /// A query was attempted before a document was processed.
    #[error("No document has been processed for this session")]
    NoDocument,
    /// The bound query engine failed.
    #[error("Query failed: {0}")]
    Query(#[from] QueryError),
}

/// Display information about the bound document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    /// File name as uploaded.
    pub file_name: String,
    /// Upload size in bytes.
    pub size_bytes: u64,
    /// Chunks indexed for the document.
    pub chunk_count: usize,
}

impl DocumentInfo {
    /// Upload size in kilobytes, rounded to two decimals.
    pub fn size_kb(&self) -> f64 {
        (self.size_bytes as f64 / 1024.0 * 100.0).round() / 100.0
    }
}

struct BoundDocument {
    engine: Arc<dyn QueryEngine>,
    info: DocumentInfo,
}

/// State of one user session.
#[derive(Default)]
pub struct Session {
    config: SessionConfig,
    document: Option<BoundDocument>,
    transcript: Transcript,
}

impl Session {
    /// A fresh, unconfigured session.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session starting from the given credential state.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Whether both keys are set.
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Store new keys. A bound document stays bound; it is not re-processed.
    pub fn set_credentials(
        &mut self,
        gemini_api_key: &str,
        llama_cloud_api_key: &str,
    ) -> Result<(), CredentialsError> {
        self.config
            .set_credentials(gemini_api_key, llama_cloud_api_key)?;
        tracing::info!(
            document_bound = self.document.is_some(),
            "Session credentials updated"
        );
        Ok(())
    }

    /// Ask for new keys by dropping the configured flag.
    pub fn reset_credentials(&mut self) {
        self.config.reset();
    }

    /// Active credentials, if configured.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.config.credentials()
    }

    /// Bind a freshly processed document, discarding any previous one.
    pub fn bind_document(&mut self, engine: Arc<dyn QueryEngine>, info: DocumentInfo) {
        if let Some(previous) = self.document.replace(BoundDocument { engine, info }) {
            tracing::debug!(file = %previous.info.file_name, "Replaced bound document");
        }
    }

    /// Drop the bound document and the chat history with it.
    pub fn clear_document(&mut self) {
        self.document = None;
        self.transcript.clear();
    }

    /// Whether a document is bound.
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Information about the bound document.
    pub fn document_info(&self) -> Option<&DocumentInfo> {
        self.document.as_ref().map(|document| &document.info)
    }

    /// The chat transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// One-shot question. Never touches the transcript, credentials or document.
    pub async fn ask(&self, question: &str) -> Result<String, SessionError> {
        let engine = self.engine()?;
        Ok(engine.ask(question).await?)
    }

    /// Record a user turn, answer it and record the answer.
    ///
    /// Blank input is ignored. Without a bound document the transcript is left untouched.
    /// If answering fails the user turn stays recorded without an answer.
    pub async fn append_user_turn(&mut self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let engine = self.engine()?;

        self.transcript.push(Role::User, text);
        let answer = engine.ask(text).await?;
        self.transcript.push(Role::Assistant, answer);
        Ok(())
    }

    /// Empty the transcript.
    pub fn clear_chat(&mut self) {
        self.transcript.clear();
    }

    fn engine(&self) -> Result<Arc<dyn QueryEngine>, SessionError> {
        if !self.is_configured() {
            return Err(SessionError::NotConfigured);
        }
        self.document
            .as_ref()
            .map(|document| Arc::clone(&document.engine))
            .ok_or(SessionError::NoDocument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryEngine for CountingEngine {
        async fn ask(&self, question: &str) -> Result<String, QueryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("answer #{call} to {question}"))
        }
    }

    fn info(name: &str) -> DocumentInfo {
        DocumentInfo {
            file_name: name.to_string(),
            size_bytes: 2048,
            chunk_count: 1,
        }
    }

    fn ready_session() -> (Session, Arc<CountingEngine>) {
        let mut session = Session::new();
        session.set_credentials("a", "b").expect("credentials");
        let engine = Arc::new(CountingEngine::default());
        session.bind_document(engine.clone(), info("q3.pdf"));
        (session, engine)
    }

    #[tokio::test]
    async fn user_turn_adds_question_then_answer() {
        let (mut session, _) = ready_session();
        session.append_user_turn("first").await.expect("turn");
        session.append_user_turn("X").await.expect("turn");

        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[2].content, "X");
        assert_eq!(turns[3].role, Role::Assistant);
        assert_eq!(turns[3].content, "answer #2 to X");
    }

    #[tokio::test]
    async fn ask_leaves_transcript_alone() {
        let (session, engine) = ready_session();
        session.ask("same").await.expect("answer");
        session.ask("same").await.expect("answer");

        assert!(session.transcript().is_empty());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_chat_input_is_ignored() {
        let (mut session, engine) = ready_session();
        session.append_user_turn("   ").await.expect("ignored");
        assert!(session.transcript().is_empty());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn querying_without_document_is_rejected() {
        let mut session = Session::new();
        session.set_credentials("a", "b").expect("credentials");

        let error = session.append_user_turn("hello").await.unwrap_err();
        assert!(matches!(error, SessionError::NoDocument));
        assert!(session.transcript().is_empty());
        assert!(matches!(
            session.ask("hello").await,
            Err(SessionError::NoDocument)
        ));
    }

    #[tokio::test]
    async fn querying_after_credential_reset_is_rejected() {
        let (mut session, _) = ready_session();
        session.reset_credentials();
        assert!(matches!(
            session.ask("hello").await,
            Err(SessionError::NotConfigured)
        ));
        assert!(session.has_document());
    }

    #[tokio::test]
    async fn changing_credentials_keeps_bound_document() {
        let (mut session, _) = ready_session();
        session.set_credentials("new-a", "new-b").expect("credentials");

        assert!(session.has_document());
        assert!(session.ask("still there?").await.is_ok());
    }

    #[test]
    fn binding_replaces_previous_document() {
        let (mut session, first) = ready_session();
        session.bind_document(Arc::new(CountingEngine::default()), info("q4.pdf"));

        assert_eq!(session.document_info().unwrap().file_name, "q4.pdf");
        assert_eq!(Arc::strong_count(&first), 1);
    }

    #[tokio::test]
    async fn clear_document_also_clears_chat() {
        let (mut session, _) = ready_session();
        session.append_user_turn("hi").await.expect("turn");
        session.clear_document();

        assert!(!session.has_document());
        assert!(session.transcript().is_empty());
        assert!(session.is_configured());
    }

    #[test]
    fn size_is_reported_in_rounded_kilobytes() {
        let info = DocumentInfo {
            file_name: "a.pdf".into(),
            size_bytes: 1536,
            chunk_count: 0,
        };
        assert_eq!(info.size_kb(), 1.5);
        assert_eq!(
            DocumentInfo {
                size_bytes: 1000,
                ..info
            }
            .size_kb(),
            0.98
        );
    }
}
