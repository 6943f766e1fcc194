//! Document processing pipeline: parsing, chunking, embedding, and index construction.

pub mod chunking;
mod service;
pub mod types;
pub mod upload;

pub use service::{DocumentProcessor, ProcessingApi, ProcessingService};
pub use types::{
    ChunkingError, ChunkingOptions, PipelineSettings, ProcessedDocument, ProcessingError,
};
pub use upload::{StagedUpload, is_pdf};
