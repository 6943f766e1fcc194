#![deny(missing_docs)]

//! Core library for docchat: ask questions about, and chat with, an uploaded PDF.

/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// In-memory vector index.
pub mod index;
/// Language model abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Usage counters.
pub mod metrics;
/// PDF parsing through an external service.
pub mod parsing;
/// Document processing pipeline.
pub mod processing;
/// Question answering over a processed document.
pub mod query;
/// Per-session credentials, document and transcript.
pub mod session;
