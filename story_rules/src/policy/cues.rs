//! Cue lexicon - the language checkpoints listen for in recent lines.

use serde::{Deserialize, Serialize};

/// Categories of story-significant language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// Open disagreement or accusation.
    Disagreement,
    /// A stated need, want, or boundary.
    Need,
    /// An explicit relational choice: committing, or walking away.
    Commitment,
}

const DISAGREEMENT: &[&str] = &[
    "disagree",
    "you're wrong",
    "that's not true",
    "that's not fair",
    "no way",
    "why would you",
    "how could you",
    "i never said",
    "but you said",
    "you always",
    "you never",
    "stop it",
];

const NEED: &[&str] = &[
    "i need",
    "i want",
    "what i need",
    "boundary",
    "boundaries",
    "i can't keep",
    "please don't",
    "i'm asking you",
    "it matters to me",
];

const COMMITMENT: &[&str] = &[
    "i choose you",
    "i'm choosing",
    "i'm staying",
    "i am staying",
    "i'll stay",
    "i promise",
    "i'm all in",
    "i'm in",
    "let's do this",
    "commit",
    "committed",
    "i'm not going anywhere",
    "i'm leaving",
    "we're done",
];

impl CueKind {
    /// The phrases that signal this cue.
    pub fn phrases(self) -> &'static [&'static str] {
        match self {
            CueKind::Disagreement => DISAGREEMENT,
            CueKind::Need => NEED,
            CueKind::Commitment => COMMITMENT,
        }
    }

    /// Check whether `text` contains any phrase of this cue as whole words.
    pub fn matches(self, text: &str) -> bool {
        let haystack = format!(" {} ", normalize(text));
        self.phrases()
            .iter()
            .any(|phrase| haystack.contains(&format!(" {} ", phrase)))
    }
}

/// Lowercase, fold curly apostrophes, and turn punctuation into single spaces.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' => '\'',
            c if c.is_alphanumeric() || c == '\'' => c.to_ascii_lowercase(),
            _ => ' ',
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
