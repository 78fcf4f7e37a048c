//! External collaborators the runtime drives but does not implement.
//!
//! Dialogue generation and safety screening live outside this crate. The runtime
//! only depends on these contracts; it never inspects how lines are produced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use story_rules::{CharacterId, RelationshipDelta};

use crate::context::GenerationRequest;
use crate::error::CollaboratorError;

/// A finalized line as returned by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLine {
    pub speaker: CharacterId,
    pub text: String,
    /// Deltas for the spotlighted pair.
    pub deltas: RelationshipDelta,
    #[serde(default)]
    pub rationale: Vec<String>,
    /// Generation latency attributed to this line.
    #[serde(default)]
    pub latency_ms: u64,
    /// Callback tokens this line sets up.
    #[serde(default)]
    pub opens: Vec<String>,
    /// Callback tokens this line brings back.
    #[serde(default)]
    pub recalls: Vec<String>,
    /// Callback tokens this line pays off for good.
    #[serde(default)]
    pub resolves: Vec<String>,
}

impl GeneratedLine {
    pub fn new(speaker: CharacterId, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            deltas: RelationshipDelta::zero(),
            rationale: Vec::new(),
            latency_ms: 0,
            opens: Vec::new(),
            recalls: Vec::new(),
            resolves: Vec::new(),
        }
    }

    pub fn with_deltas(mut self, deltas: RelationshipDelta) -> Self {
        self.deltas = deltas;
        self
    }

    pub fn with_rationale(mut self, reason: impl Into<String>) -> Self {
        self.rationale.push(reason.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn opening(mut self, token: impl Into<String>) -> Self {
        self.opens.push(token.into());
        self
    }

    pub fn recalling(mut self, token: impl Into<String>) -> Self {
        self.recalls.push(token.into());
        self
    }

    pub fn resolving(mut self, token: impl Into<String>) -> Self {
        self.resolves.push(token.into());
        self
    }
}

/// Safe/unsafe verdict from the safety collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub safe: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    pub fn unsafe_because(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }
}

/// Produces the lines for one exchange.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedLine>, CollaboratorError>;
}

/// Screens arbitrary text, including serialized nudge descriptions.
#[async_trait]
pub trait SafetyFilter: Send + Sync {
    async fn check(&self, text: &str) -> Result<SafetyVerdict, CollaboratorError>;
}
