//! HTTP surface for docchat.
//!
//! Every route under `/session` acts on the caller's session, identified by the
//! `docchat_session` cookie. A session is created (and the cookie set) on the first request
//! that does not carry a known id.
//!
//! - `GET /` – The single-page UI.
//! - `GET /session` – Configured flag, current document and transcript.
//! - `DELETE /session` – End the session.
//! - `PUT /session/credentials` – Save both API keys.
//! - `DELETE /session/credentials` – Ask for new keys.
//! - `POST /session/document` – Upload a PDF (multipart field `file`) and index it.
//! - `DELETE /session/document` – Drop the document and its chat history.
//! - `POST /session/ask` – One-shot question; not recorded.
//! - `POST /session/chat` – Chat turn; returns the transcript.
//! - `DELETE /session/chat` – Clear the transcript.
//! - `GET /metrics` – Usage counters.

use crate::metrics::{MetricsSnapshot, UsageMetrics};
use crate::processing::{ProcessingApi, ProcessingError, StagedUpload, is_pdf};
use crate::session::{CredentialsError, DocumentInfo, Session, SessionError, SessionStore, Turn};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "docchat_session";

const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
const INDEX_PAGE: &str = include_str!("page.html");

/// Shared state behind the router.
struct AppState<P> {
    sessions: Arc<SessionStore>,
    processor: Arc<P>,
    metrics: UsageMetrics,
}

/// Build the HTTP router.
pub fn create_router<P>(processor: Arc<P>, sessions: Arc<SessionStore>) -> Router
where
    P: ProcessingApi + 'static,
{
    router_with_upload_limit(processor, sessions, MAX_UPLOAD_BYTES)
}

fn router_with_upload_limit<P>(
    processor: Arc<P>,
    sessions: Arc<SessionStore>,
    max_upload_bytes: usize,
) -> Router
where
    P: ProcessingApi + 'static,
{
    let state = Arc::new(AppState {
        sessions,
        processor,
        metrics: UsageMetrics::new(),
    });

    Router::new()
        .route("/", get(index_page))
        .route("/session", get(get_session::<P>).delete(end_session::<P>))
        .route(
            "/session/credentials",
            put(set_credentials::<P>).delete(reset_credentials::<P>),
        )
        .route(
            "/session/document",
            post(upload_document::<P>).delete(clear_document::<P>),
        )
        .route("/session/ask", post(ask_question::<P>))
        .route(
            "/session/chat",
            post(send_chat_message::<P>).delete(clear_chat::<P>),
        )
        .route("/metrics", get(get_metrics::<P>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Resolve the caller's session, creating it and setting the cookie when needed.
async fn resolve_session<P>(
    state: &AppState<P>,
    jar: CookieJar,
) -> (CookieJar, Arc<Mutex<Session>>) {
    let requested = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());
    let (id, session, created) = state.sessions.get_or_create(requested).await;
    if !created {
        return (jar, session);
    }

    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), session)
}

/// Document summary shown next to the tabs.
#[derive(Serialize)]
struct DocumentView {
    file_name: String,
    size_kb: f64,
    chunk_count: usize,
}

impl From<&DocumentInfo> for DocumentView {
    fn from(info: &DocumentInfo) -> Self {
        Self {
            file_name: info.file_name.clone(),
            size_kb: info.size_kb(),
            chunk_count: info.chunk_count,
        }
    }
}

/// Response body for the session routes.
#[derive(Serialize)]
struct SessionView {
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentView>,
    transcript: Vec<Turn>,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        Self {
            configured: session.is_configured(),
            document: session.document_info().map(DocumentView::from),
            transcript: session.transcript().turns().to_vec(),
        }
    }
}

async fn get_session<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let (jar, session) = resolve_session(&state, jar).await;
    let view = SessionView::of(&*session.lock().await);
    (jar, Json(view))
}

async fn end_session<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        state.sessions.remove(id).await;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

/// Request body for `PUT /session/credentials`.
#[derive(Deserialize)]
struct CredentialsRequest {
    #[serde(default)]
    gemini_api_key: String,
    #[serde(default)]
    llama_cloud_api_key: String,
}

async fn set_credentials<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<SessionView>), AppError> {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut session = session.lock().await;
    session.set_credentials(&request.gemini_api_key, &request.llama_cloud_api_key)?;
    Ok((jar, Json(SessionView::of(&session))))
}

async fn reset_credentials<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut session = session.lock().await;
    session.reset_credentials();
    (jar, Json(SessionView::of(&session)))
}

/// Response body for a processed upload.
#[derive(Serialize)]
struct DocumentResponse {
    file_name: String,
    size_kb: f64,
    sections: usize,
    chunks_indexed: usize,
}

/// Index an uploaded PDF and bind it to the session, replacing any previous document.
///
/// The session stays locked for the whole run, so further requests for the same session
/// wait until processing ends. On failure the previous document, if any, stays bound.
async fn upload_document<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<DocumentResponse>), AppError>
where
    P: ProcessingApi,
{
    let (jar, session) = resolve_session(&state, jar).await;
    let mut session = session.lock().await;
    let credentials = session
        .credentials()
        .cloned()
        .ok_or(SessionError::NotConfigured)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        if !is_pdf(&file_name, content_type.as_deref(), &bytes) {
            return Err(AppError::Validation(format!(
                "'{file_name}' is not a PDF file"
            )));
        }
        upload = Some(StagedUpload::stage(file_name, &bytes).map_err(ProcessingError::from)?);
        break;
    }
    let upload = upload
        .ok_or_else(|| AppError::Validation("Missing multipart field 'file'".to_string()))?;

    let file_name = upload.file_name().to_string();
    let size_bytes = upload.size_bytes();
    let processed = match state.processor.process_upload(&credentials, upload).await {
        Ok(processed) => processed,
        Err(error) => {
            state.metrics.record_failure();
            return Err(error.into());
        }
    };

    let info = DocumentInfo {
        file_name: file_name.clone(),
        size_bytes,
        chunk_count: processed.chunk_count,
    };
    let size_kb = info.size_kb();
    session.bind_document(processed.engine, info);
    state.metrics.record_document(processed.chunk_count as u64);
    tracing::info!(
        file = %file_name,
        sections = processed.sections,
        chunks = processed.chunk_count,
        "Document ready"
    );

    Ok((
        jar,
        Json(DocumentResponse {
            file_name,
            size_kb,
            sections: processed.sections,
            chunks_indexed: processed.chunk_count,
        }),
    ))
}

async fn clear_document<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut session = session.lock().await;
    session.clear_document();
    (jar, Json(SessionView::of(&session)))
}

/// Request body for `POST /session/ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

/// Response body for `POST /session/ask`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn ask_question<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
    Json(request): Json<AskRequest>,
) -> Result<(CookieJar, Json<AskResponse>), AppError> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation("Please enter a question".to_string()));
    }
    let (jar, session) = resolve_session(&state, jar).await;
    let session = session.lock().await;
    let answer = session
        .ask(&request.question)
        .await
        .inspect_err(|error| record_query_failure(&state.metrics, error))?;
    state.metrics.record_answer();
    Ok((jar, Json(AskResponse { answer })))
}

/// Request body for `POST /session/chat`.
#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn send_chat_message<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
    Json(request): Json<ChatRequest>,
) -> Result<(CookieJar, Json<SessionView>), AppError> {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut session = session.lock().await;
    let before = session.transcript().len();
    session
        .append_user_turn(&request.message)
        .await
        .inspect_err(|error| record_query_failure(&state.metrics, error))?;
    if session.transcript().len() > before {
        state.metrics.record_answer();
    }
    Ok((jar, Json(SessionView::of(&session))))
}

async fn clear_chat<P>(
    State(state): State<Arc<AppState<P>>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut session = session.lock().await;
    session.clear_chat();
    (jar, Json(SessionView::of(&session)))
}

async fn get_metrics<P>(State(state): State<Arc<AppState<P>>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

fn record_query_failure(metrics: &UsageMetrics, error: &SessionError) {
    if matches!(error, SessionError::Query(_)) {
        metrics.record_failure();
    }
}

/// Error responses, rendered as `{"error": message}`.
#[derive(Debug)]
enum AppError {
    /// Bad user input; nothing was attempted.
    Validation(String),
    /// The request body could not be read; carries the status the extractor chose.
    Rejected(StatusCode, String),
    /// The session is not in a state that allows the request.
    Conflict(String),
    /// An external service failed; details are logged, not returned.
    Upstream,
    /// Local failure unrelated to user input.
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::Rejected(status, message) => (status, message),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::Upstream => (
                StatusCode::BAD_GATEWAY,
                "The request failed. Check your API keys and document, then try again."
                    .to_string(),
            ),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<CredentialsError> for AppError {
    fn from(error: CredentialsError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotConfigured | SessionError::NoDocument => {
                Self::Conflict(error.to_string())
            }
            SessionError::Query(inner) => {
                tracing::error!(error = %inner, "Query failed");
                Self::Upstream
            }
        }
    }
}

impl From<ProcessingError> for AppError {
    fn from(error: ProcessingError) -> Self {
        tracing::error!(error = %error, "Document processing failed");
        match error {
            ProcessingError::Staging(inner) => Self::Internal(inner.to_string()),
            _ => Self::Upstream,
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        Self::Rejected(error.status(), error.body_text())
    }
}
