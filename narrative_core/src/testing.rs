//! Testing utilities for the narrative runtime.
//!
//! This module provides deterministic stand-ins for the external collaborators:
//! - `ScriptedGenerator` for replaying prepared exchanges without a model
//! - `FailingGenerator` for exercising generation failures
//! - `PermissiveSafety`, `BlocklistSafety` and `UnavailableSafety` for the safety seam

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use story_rules::CastMember;

use crate::collaborators::{DialogueGenerator, GeneratedLine, SafetyFilter, SafetyVerdict};
use crate::context::GenerationRequest;
use crate::error::CollaboratorError;

/// A generator that returns scripted exchanges in order.
///
/// Once the script runs out it returns a single zero-delta line from the first
/// scheduled speaker, so long-running tests never stall.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Vec<GeneratedLine>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Vec<GeneratedLine>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue one more exchange.
    pub fn push(&self, lines: Vec<GeneratedLine>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(lines);
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl DialogueGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedLine>, CollaboratorError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(lines) = next {
            return Ok(lines);
        }

        let speaker = request
            .speakers
            .first()
            .copied()
            .unwrap_or(request.spotlight.0);
        Ok(vec![GeneratedLine::new(
            speaker,
            format!("Line {}.", request.exchange),
        )])
    }
}

/// A generator that always fails.
pub struct FailingGenerator {
    pub message: String,
}

impl FailingGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DialogueGenerator for FailingGenerator {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<Vec<GeneratedLine>, CollaboratorError> {
        Err(CollaboratorError::new("generator", self.message.clone()))
    }
}

/// Passes everything.
pub struct PermissiveSafety;

#[async_trait]
impl SafetyFilter for PermissiveSafety {
    async fn check(&self, _text: &str) -> Result<SafetyVerdict, CollaboratorError> {
        Ok(SafetyVerdict::safe())
    }
}

/// Flags any text containing one of the blocked terms (case-insensitive).
pub struct BlocklistSafety {
    blocked: Vec<String>,
}

impl BlocklistSafety {
    pub fn new<I, S>(blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: blocked
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }
}

#[async_trait]
impl SafetyFilter for BlocklistSafety {
    async fn check(&self, text: &str) -> Result<SafetyVerdict, CollaboratorError> {
        let lowered = text.to_lowercase();
        match self.blocked.iter().find(|term| lowered.contains(term.as_str())) {
            Some(term) => Ok(SafetyVerdict::unsafe_because(format!(
                "contains blocked term '{}'",
                term
            ))),
            None => Ok(SafetyVerdict::safe()),
        }
    }
}

/// A safety filter that cannot be reached.
pub struct UnavailableSafety;

#[async_trait]
impl SafetyFilter for UnavailableSafety {
    async fn check(&self, _text: &str) -> Result<SafetyVerdict, CollaboratorError> {
        Err(CollaboratorError::new("safety", "service unreachable"))
    }
}

/// A small named cast for scenarios.
pub fn sample_cast(count: usize) -> Vec<CastMember> {
    const NAMES: [&str; 6] = ["Ava", "Ben", "Cleo", "Dev", "Eli", "Fay"];
    (0..count)
        .map(|i| match NAMES.get(i) {
            Some(name) => CastMember::new(*name),
            None => CastMember::new(format!("Extra {}", i + 1)),
        })
        .collect()
}
