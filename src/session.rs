// Per-session conversation state. Each UI session (one WebSocket connection
// or one terminal chat) owns exactly one ChatSession; turns are append-only
// until an explicit reset, and nothing is persisted across sessions.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::constants::PQRS_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the transcript. The content is the raw text as typed or as
/// received from the model; any `PQRS:` marker stays visible here even though
/// it is stripped from the outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, content.into()));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::Assistant, content.into()));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The trailing `window` turns used as model context. The full transcript
    /// is untouched; older turns are only dropped from the request.
    pub fn recent_turns(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    /// Clears the whole transcript. The next submission starts from zero
    /// history context.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Strips the case-insensitive `PQRS:` marker (plus surrounding whitespace)
/// from a submission. Anything else passes through untouched. The marker only
/// signals intent to the model; the system instruction never changes.
pub fn strip_pqrs_prefix(input: &str) -> &str {
    match input.get(..PQRS_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PQRS_PREFIX) => {
            input[PQRS_PREFIX.len()..].trim()
        }
        _ => input,
    }
}
