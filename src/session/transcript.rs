//! Ordered record of chat turns.

use serde::Serialize;
use time::OffsetDateTime;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting with the document.
    User,
    /// The answer synthesized from the document.
    Assistant,
}

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    /// Author of the turn.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// RFC3339 time the turn was recorded.
    pub timestamp: String,
}

/// Append-only list of turns; the only other mutation is a full [`Transcript::clear`].
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Turns in the order they were appended.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of recorded turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are recorded.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Remove every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub(crate) fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
            timestamp: current_timestamp_rfc3339(),
        });
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
