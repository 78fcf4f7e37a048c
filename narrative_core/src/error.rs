//! Error types for the narrative runtime.
//!
//! Policy rejections (a blocked nudge, a cadence violation, an unsafe request) are
//! not errors; they come back as [`crate::NudgeDecision`]s. Evaluation never errors
//! either; it abstains. What remains here are precondition and collaborator failures.

use story_rules::PolicyError;
use thiserror::Error;

/// Failure reported by an external collaborator (generator, safety filter, scorer).
#[derive(Debug, Clone, Error)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Errors from narrative runtime operations.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("No active episode - start one first")]
    NoActiveEpisode,

    #[error("An episode needs at least two characters, got {found}")]
    NotEnoughCharacters { found: usize },

    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("Generated line rejected: {0}")]
    InvalidLine(String),

    #[error("Dialogue generation failed: {0}")]
    Generation(#[from] CollaboratorError),

    #[error("Scene wrap not warranted: plateau counter {counter} is below threshold {threshold}")]
    WrapNotWarranted { counter: u32, threshold: u32 },

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
