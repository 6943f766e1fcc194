use async_trait::async_trait;
use docchat::config::ChunkUnit;
use docchat::embedding::{EmbeddingClient, EmbeddingClientError, EmbeddingTask};
use docchat::llm::{LanguageModel, LanguageModelError};
use docchat::parsing::{DocumentParser, DocumentSection, ParseError};
use docchat::processing::{ChunkingOptions, DocumentProcessor, PipelineSettings, StagedUpload};
use docchat::query::{QueryEngine, QueryError};
use docchat::session::{DocumentInfo, Role, Session, SessionError};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct PagesParser(Vec<&'static str>);

#[async_trait]
impl DocumentParser for PagesParser {
    async fn parse(&self, _path: &Path) -> Result<Vec<DocumentSection>, ParseError> {
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(idx, text)| DocumentSection {
                page: idx + 1,
                text: text.to_string(),
            })
            .collect())
    }
}

/// Two-dimensional embedding: how much a text talks about revenue versus staff.
struct TopicEmbedder;

#[async_trait]
impl EmbeddingClient for TopicEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        _task: EmbeddingTask,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                vec![
                    lower.matches("revenue").count() as f32,
                    lower.matches("staff").count() as f32,
                ]
            })
            .collect())
    }
}

/// Answers with the first context line after the prompt's separator.
#[derive(Default)]
struct ContextEchoModel {
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for ContextEchoModel {
    async fn complete(&self, prompt: &str) -> Result<String, LanguageModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let context = prompt
            .split("---------------------\n")
            .nth(1)
            .and_then(|block| block.lines().next())
            .unwrap_or_default();
        Ok(format!("From the document: {context}"))
    }
}

struct FixedEngine(&'static str);

#[async_trait]
impl QueryEngine for FixedEngine {
    async fn ask(&self, _question: &str) -> Result<String, QueryError> {
        Ok(self.0.to_string())
    }
}

struct BrokenEngine;

#[async_trait]
impl QueryEngine for BrokenEngine {
    async fn ask(&self, _question: &str) -> Result<String, QueryError> {
        Err(QueryError::Generation(LanguageModelError::GenerationFailed(
            "Gemini returned 403".into(),
        )))
    }
}

fn info(name: &str) -> DocumentInfo {
    DocumentInfo {
        file_name: name.to_string(),
        size_bytes: 10_240,
        chunk_count: 3,
    }
}

fn processor(model: Arc<ContextEchoModel>) -> DocumentProcessor {
    DocumentProcessor::new(
        Arc::new(PagesParser(vec![
            "Revenue reached 12 million in 2023.",
            "Staff grew to 140 people.",
        ])),
        Arc::new(TopicEmbedder),
        model,
        PipelineSettings {
            chunking: ChunkingOptions {
                chunk_size: 1024,
                chunk_overlap: 200,
                unit: ChunkUnit::Tokens,
            },
            embedding_dimension: 2,
            context_window_chars: 24_000,
        },
    )
}

#[test]
fn credentials_scenario() {
    let mut session = Session::new();
    session.set_credentials("a", "b").expect("credentials");
    assert!(session.is_configured());

    let mut other = Session::new();
    assert!(other.set_credentials("", "b").is_err());
    assert!(!other.is_configured());
    assert!(!other.has_document());
}

#[tokio::test]
async fn clear_keeps_handle_and_chat_resumes() {
    let mut session = Session::new();
    session.set_credentials("a", "b").expect("credentials");
    session.bind_document(Arc::new(FixedEngine("42")), info("annual.pdf"));
    session.append_user_turn("first").await.expect("turn");
    assert_eq!(session.transcript().len(), 2);

    session.clear_chat();
    assert_eq!(session.transcript().len(), 0);
    assert!(session.has_document());
    assert!(session.is_configured());

    session.append_user_turn("hello").await.expect("turn");
    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!((turns[0].role, turns[0].content.as_str()), (Role::User, "hello"));
    assert_eq!((turns[1].role, turns[1].content.as_str()), (Role::Assistant, "42"));
}

#[tokio::test]
async fn failed_query_leaves_session_intact() {
    let mut session = Session::new();
    session.set_credentials("a", "b").expect("credentials");
    session.bind_document(Arc::new(BrokenEngine), info("annual.pdf"));

    let error = session.append_user_turn("why?").await.unwrap_err();
    assert!(matches!(error, SessionError::Query(_)));
    assert!(session.is_configured());
    assert!(session.has_document());
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.transcript().turns()[0].role, Role::User);
}

#[tokio::test]
async fn processed_document_answers_from_relevant_page() {
    let model = Arc::new(ContextEchoModel::default());
    let upload = StagedUpload::stage("annual.pdf", b"%PDF-1.7").expect("stage");
    let staged_path = upload.path().to_path_buf();

    let processed = processor(model.clone())
        .process_upload(upload)
        .await
        .expect("processed");
    assert!(!staged_path.exists());
    assert_eq!(processed.sections, 2);
    assert_eq!(processed.chunk_count, 2);

    let mut session = Session::new();
    session.set_credentials("a", "b").expect("credentials");
    session.bind_document(processed.engine, info("annual.pdf"));

    let answer = session.ask("What was the revenue?").await.expect("answer");
    assert!(answer.contains("Revenue reached 12 million"), "{answer}");
    assert!(session.transcript().is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_document_replaces_the_first() {
    let model = Arc::new(ContextEchoModel::default());
    let mut session = Session::new();
    session.set_credentials("a", "b").expect("credentials");

    let first = processor(model.clone())
        .process_upload(StagedUpload::stage("one.pdf", b"%PDF").expect("stage"))
        .await
        .expect("processed");
    let first_engine = Arc::clone(&first.engine);
    session.bind_document(first.engine, info("one.pdf"));

    session.bind_document(Arc::new(FixedEngine("from two")), info("two.pdf"));
    assert_eq!(Arc::strong_count(&first_engine), 1);
    assert_eq!(session.document_info().unwrap().file_name, "two.pdf");
    assert_eq!(session.ask("anything").await.expect("answer"), "from two");
}
