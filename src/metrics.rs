use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity across all sessions.
#[derive(Default)]
pub struct UsageMetrics {
    documents_processed: AtomicU64,
    chunks_indexed: AtomicU64,
    questions_answered: AtomicU64,
    failed_calls: AtomicU64,
}

impl UsageMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed document and the number of chunks indexed for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record one answered question, from either the one-shot or the chat flow.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a parse, embedding or generation call that failed.
    pub fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of usage counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents successfully processed since startup.
    pub documents_processed: u64,
    /// Total chunks indexed across all processed documents.
    pub chunks_indexed: u64,
    /// Questions answered through one-shot or chat.
    pub questions_answered: u64,
    /// External calls that ended in an error.
    pub failed_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_documents_and_chunks() {
        let metrics = UsageMetrics::new();
        metrics.record_document(2);
        metrics.record_document(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_processed, 2);
        assert_eq!(snapshot.chunks_indexed, 5);
    }

    #[test]
    fn answers_and_failures_are_counted_separately() {
        let metrics = UsageMetrics::new();
        metrics.record_answer();
        metrics.record_answer();
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.questions_answered, 2);
        assert_eq!(snapshot.failed_calls, 1);
        assert_eq!(snapshot.documents_processed, 0);
    }
}
