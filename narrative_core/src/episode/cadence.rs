//! Nudges and the cadence controller that rate-limits them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use story_rules::{CharacterId, Intensity, NudgeKind, NudgeSource};

use crate::config::CadenceConfig;

/// A requested steering directive. Consumed as a soft bias on the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub kind: NudgeKind,
    pub intensity: Intensity,
    pub source: NudgeSource,
    #[serde(default)]
    pub target: Option<CharacterId>,
    #[serde(default)]
    pub callback_token: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl Nudge {
    pub fn new(kind: NudgeKind, intensity: Intensity) -> Self {
        Self {
            kind,
            intensity,
            source: NudgeSource::Observer,
            target: None,
            callback_token: None,
            requested_at: Utc::now(),
        }
    }

    pub fn minor(kind: NudgeKind) -> Self {
        Self::new(kind, Intensity::Minor)
    }

    pub fn major(kind: NudgeKind) -> Self {
        Self::new(kind, Intensity::Major)
    }

    pub fn from_source(mut self, source: NudgeSource) -> Self {
        self.source = source;
        self
    }

    pub fn targeting(mut self, target: CharacterId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_callback(mut self, token: impl Into<String>) -> Self {
        self.callback_token = Some(token.into());
        self
    }

    pub fn is_major(&self) -> bool {
        self.intensity == Intensity::Major
    }

    /// Plain-text description handed to the safety filter.
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{:?} nudge '{}' requested by {:?}",
            self.intensity, self.kind, self.source
        );
        if let Some(target) = self.target {
            text.push_str(&format!(", targeting {}", target));
        }
        if let Some(token) = &self.callback_token {
            text.push_str(&format!(", recalling \"{}\"", token));
        }
        text
    }
}

/// Why a nudge was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NoActiveEpisode,
    BlockedInAct,
    NotAllowedInAct,
    Cadence,
    Unsafe,
    SafetyUnavailable,
}

/// Outcome of `apply_nudge`. Rejection is a normal outcome, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeDecision {
    pub accepted: bool,
    pub rejection: Option<Rejection>,
    /// Human-readable explanation, present for acceptances and rejections alike.
    pub reason: String,
}

impl NudgeDecision {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            rejection: None,
            reason: reason.into(),
        }
    }

    pub fn reject(rejection: Rejection, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            rejection: Some(rejection),
            reason: reason.into(),
        }
    }
}

/// Tracks accepted nudges per exchange and enforces the major-nudge cap.
#[derive(Debug, Clone)]
pub struct CadenceController {
    config: CadenceConfig,
    last_major: Option<u64>,
    major_history: Vec<u64>,
    recovery_remaining: u32,
    last_used: HashMap<NudgeKind, u64>,
    uses: HashMap<NudgeKind, u32>,
}

impl CadenceController {
    pub fn new(config: CadenceConfig) -> Self {
        Self {
            config,
            last_major: None,
            major_history: Vec::new(),
            recovery_remaining: 0,
            last_used: HashMap::new(),
            uses: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CadenceConfig {
        &self.config
    }

    /// Check whether a major nudge may be accepted at `exchange`.
    pub fn check_major(&self, exchange: u64) -> Result<(), String> {
        match self.last_major {
            Some(last) if exchange.saturating_sub(last) < self.config.major_gap => Err(format!(
                "major nudge cadence: last major at exchange {}, {} more exchange(s) required",
                last,
                self.major_cooldown_remaining(exchange)
            )),
            _ => Ok(()),
        }
    }

    /// Record an accepted nudge. Majors open the recovery window.
    pub fn record(&mut self, nudge: &Nudge, exchange: u64) {
        self.last_used.insert(nudge.kind, exchange);
        *self.uses.entry(nudge.kind).or_default() += 1;

        if nudge.is_major() {
            self.last_major = Some(exchange);
            self.major_history.push(exchange);
            self.recovery_remaining = self.config.recovery_exchanges;
        }
    }

    /// Close out one exchange of the recovery window.
    pub fn finish_exchange(&mut self) {
        self.recovery_remaining = self.recovery_remaining.saturating_sub(1);
    }

    pub fn recovery_active(&self) -> bool {
        self.recovery_remaining > 0
    }

    pub fn recovery_remaining(&self) -> u32 {
        self.recovery_remaining
    }

    /// Exchanges until another major nudge may be accepted.
    pub fn major_cooldown_remaining(&self, exchange: u64) -> u64 {
        self.last_major
            .map(|last| (last + self.config.major_gap).saturating_sub(exchange))
            .unwrap_or(0)
    }

    /// Major nudges accepted within the current cadence window.
    pub fn majors_in_window(&self, exchange: u64) -> usize {
        self.major_history
            .iter()
            .filter(|m| exchange.saturating_sub(**m) < self.config.major_gap)
            .count()
    }

    pub fn major_history(&self) -> &[u64] {
        &self.major_history
    }

    /// Exchanges until `kind` is out of its catalog cooldown.
    pub fn cooldown_remaining(&self, kind: NudgeKind, cooldown: u32, exchange: u64) -> u64 {
        self.last_used
            .get(&kind)
            .map(|last| (last + cooldown as u64).saturating_sub(exchange))
            .unwrap_or(0)
    }

    pub fn uses(&self, kind: NudgeKind) -> u32 {
        self.uses.get(&kind).copied().unwrap_or(0)
    }

    pub fn usage(&self) -> &HashMap<NudgeKind, u32> {
        &self.uses
    }
}
