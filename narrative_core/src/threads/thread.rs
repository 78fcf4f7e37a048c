//! Callback thread definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for callback threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub Uuid);

impl ThreadId {
    /// Create a new random thread ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A callback token and its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackThread {
    pub id: ThreadId,

    /// The token as first written, e.g. "the broken umbrella".
    pub token: String,

    /// Exchange at which the thread was opened.
    pub opened_at: u64,

    /// Exchange at which the thread was last opened or recalled.
    pub last_touched: u64,

    /// How many times it has been recalled.
    pub recalls: u32,

    /// Whether the thread has been paid off.
    pub resolved: bool,
}

impl CallbackThread {
    /// Create a new open thread.
    pub fn new(token: impl Into<String>, exchange: u64) -> Self {
        Self {
            id: ThreadId::new(),
            token: token.into(),
            opened_at: exchange,
            last_touched: exchange,
            recalls: 0,
            resolved: false,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.resolved
    }

    /// Exchanges since the thread was last touched.
    pub fn dormant_for(&self, exchange: u64) -> u64 {
        exchange.saturating_sub(self.last_touched)
    }

    /// Check if this thread matches a token, ignoring case and punctuation.
    pub fn matches(&self, token: &str) -> bool {
        story_rules::normalize(&self.token) == story_rules::normalize(token)
    }

    pub fn recall(&mut self, exchange: u64) {
        self.recalls += 1;
        self.last_touched = exchange;
    }
}
