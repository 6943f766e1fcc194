//! Fixed-size overlapping windows.
//!
//! Each parsed section is cut into windows of at most `chunk_size` units, where a unit is
//! either a cl100k_base token or a character. `semchunk_rs` picks the base boundaries
//! (paragraphs, then lines, then words) and a second pass prepends up to `chunk_overlap`
//! units from the previous window, trimming from the front when the result would exceed
//! the budget.

use crate::config::ChunkUnit;
use crate::index::IndexedChunk;
use crate::parsing::DocumentSection;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::cl100k_base;

use super::types::{ChunkingError, ChunkingOptions};

pub(crate) type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Cut every section into overlapping windows, tagging each window with its page.
pub fn chunk_sections(
    sections: &[DocumentSection],
    options: ChunkingOptions,
) -> Result<Vec<IndexedChunk>, ChunkingError> {
    if options.chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    let counter = build_counter(options.unit);

    let chunks = sections
        .iter()
        .flat_map(|section| {
            split_with_counter(
                &section.text,
                options.chunk_size,
                options.chunk_overlap,
                &counter,
            )
            .into_iter()
            .map(|text| IndexedChunk {
                page: section.page,
                text,
            })
        })
        .collect();
    Ok(chunks)
}

/// Build the unit counter for `unit`.
///
/// Token counting prefers `cl100k_base` and falls back to whitespace counting when the
/// encoding cannot be loaded.
pub(crate) fn build_counter(unit: ChunkUnit) -> TokenCounter {
    match unit {
        ChunkUnit::Characters => Arc::new(|segment: &str| segment.chars().count()),
        ChunkUnit::Tokens => match cl100k_base() {
            Ok(encoding) => {
                let encoding = Arc::new(encoding);
                Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "Tokenizer unavailable; falling back to whitespace counter"
                );
                whitespace_counter()
            }
        },
    }
}

fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Split `text` into windows of at most `chunk_size` units with `overlap` carried forward.
///
/// Blank input yields no windows.
fn split_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: &TokenCounter,
) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunker_counter = Arc::clone(counter);
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| chunker_counter.as_ref()(segment)),
    );
    let windows = chunker.chunk(text);
    carry_overlap(windows, chunk_size, overlap, counter)
}

/// Prefix each window with the tail of its predecessor.
///
/// The overlap is clamped below `chunk_size` so every window still moves forward.
fn carry_overlap(
    windows: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &TokenCounter,
) -> Vec<String> {
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    if overlap == 0 || windows.len() < 2 {
        return windows;
    }

    let mut carried = Vec::with_capacity(windows.len());
    let mut previous: Option<String> = None;
    for window in windows {
        let next = match previous.as_deref() {
            None => window.clone(),
            Some(prior) => {
                let tail = tail_within(prior, overlap, counter);
                let mut joined = String::with_capacity(tail.len() + window.len() + 1);
                joined.push_str(tail);
                if !tail.is_empty()
                    && !tail.ends_with(char::is_whitespace)
                    && !window.starts_with(char::is_whitespace)
                {
                    joined.push(' ');
                }
                joined.push_str(&window);
                let trimmed = tail_within(&joined, chunk_size, counter);
                if trimmed.len() >= window.len() {
                    trimmed.to_string()
                } else {
                    window.clone()
                }
            }
        };
        carried.push(next);
        previous = Some(window);
    }
    carried
}

/// Longest suffix of `text` that starts on a word and fits in `limit` units.
///
/// Suffix cost shrinks as the start moves right, so the cut is found by binary search over
/// word starts.
fn tail_within<'a>(text: &'a str, limit: usize, counter: &TokenCounter) -> &'a str {
    let mut after_space = true;
    let word_starts: Vec<usize> = text
        .char_indices()
        .filter_map(|(offset, ch)| {
            let starts_word = after_space && !ch.is_whitespace();
            after_space = ch.is_whitespace();
            starts_word.then_some(offset)
        })
        .collect();
    let first_fit = word_starts.partition_point(|&start| counter.as_ref()(&text[start..]) > limit);
    word_starts
        .get(first_fit)
        .map(|&start| &text[start..])
        .unwrap_or("")
}
