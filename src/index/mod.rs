//! In-memory vector index over the chunks of a single document.
//!
//! The index is brute force: every search scores all stored vectors with cosine similarity.
//! A document index lives exactly as long as the query engine that owns it.

use thiserror::Error;

/// Errors raised while building or searching the index.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// Chunk and vector counts differ.
    #[error("Received {vectors} vectors for {chunks} chunks")]
    LengthMismatch {
        /// Number of chunks supplied.
        chunks: usize,
        /// Number of vectors supplied.
        vectors: usize,
    },
    /// A vector does not have the index dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// A chunk of document text as stored in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    /// Page the chunk was cut from.
    pub page: usize,
    /// Chunk text handed to the model as context.
    pub text: String,
}

/// Search hit returned by [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Cosine similarity between the query and the chunk.
    pub score: f32,
    /// Stored chunk.
    pub chunk: IndexedChunk,
}

struct Entry {
    chunk: IndexedChunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Vector index for one document.
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<Entry>,
}

impl VectorIndex {
    /// Build an index from chunks and their embeddings, paired by position.
    pub fn build(
        dimension: usize,
        chunks: Vec<IndexedChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                if vector.len() != dimension {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                let norm = l2_norm(&vector);
                Ok(Entry {
                    chunk,
                    vector,
                    norm,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(dimension, entries = entries.len(), "Vector index built");
        Ok(Self { dimension, entries })
    }

    /// Number of chunks held by the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `top_k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine(query, query_norm, entry), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredChunk {
                score,
                chunk: entry.chunk.clone(),
            })
            .collect())
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, entry: &Entry) -> f32 {
    if query_norm == 0.0 || entry.norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query
        .iter()
        .zip(entry.vector.iter())
        .map(|(a, b)| a * b)
        .sum();
    dot / (query_norm * entry.norm)
}
