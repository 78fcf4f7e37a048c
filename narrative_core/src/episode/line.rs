//! Spoken lines and the rolling window that holds the most recent ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use story_rules::{CharacterId, LineEvidence, RelationshipDelta};

/// One immutable utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpokenLine {
    pub at: DateTime<Utc>,
    pub exchange: u64,
    pub speaker: CharacterId,
    pub speaker_name: String,
    pub text: String,
    /// Estimated spoken duration, capped at the format's maximum.
    pub duration_secs: f32,
    /// Deltas this line applied to the spotlighted pair.
    pub deltas: RelationshipDelta,
    pub latency_ms: u64,
    #[serde(default)]
    pub rationale: Vec<String>,
    /// Substituted by the runtime after a generation failure.
    #[serde(default)]
    pub fallback: bool,
}

impl SpokenLine {
    pub fn evidence(&self) -> LineEvidence<'_> {
        LineEvidence {
            text: &self.text,
            delta: self.deltas,
        }
    }
}

/// Estimate how long a line takes to say.
pub fn estimate_duration(text: &str, words_per_second: f32, max_seconds: f32) -> f32 {
    let words = text.split_whitespace().count() as f32;
    if words_per_second <= 0.0 {
        return max_seconds;
    }
    (words / words_per_second).min(max_seconds)
}

/// Bounded rolling window of recent lines, oldest first.
#[derive(Debug, Clone)]
pub struct LineWindow {
    capacity: usize,
    lines: VecDeque<SpokenLine>,
}

impl LineWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Append a line, evicting the oldest once over capacity.
    pub fn push(&mut self, line: SpokenLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// The last `n` lines, oldest first.
    pub fn last(&self, n: usize) -> Vec<&SpokenLine> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpokenLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
