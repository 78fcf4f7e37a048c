//! Runtime and evaluation configuration.

use serde::{Deserialize, Serialize};

use crate::error::NarrativeError;

/// Content constraints for an episode's format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConstraints {
    pub pg13: bool,
    /// Longest a single spoken line may run, in seconds.
    pub max_line_seconds: f32,
}

impl Default for ContentConstraints {
    fn default() -> Self {
        Self {
            pg13: true,
            max_line_seconds: 12.0,
        }
    }
}

/// Plateau detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateauConfig {
    /// Number of most recent lines inspected.
    pub window: usize,
    /// Average absolute delta below which the story counts as flat.
    pub min_magnitude: f32,
    /// Word-set overlap above which two lines count as near duplicates.
    pub similarity: f32,
    /// Counter value at which a freshness intervention is suggested.
    pub threshold: u32,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            window: 3,
            min_magnitude: 0.02,
            similarity: 0.8,
            threshold: 3,
        }
    }
}

/// Major-nudge rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Minimum exchanges between accepted major nudges.
    pub major_gap: u64,
    /// Exchanges of comfort/clarify bias after a major nudge.
    pub recovery_exchanges: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            major_gap: 6,
            recovery_exchanges: 2,
        }
    }
}

/// Configuration for the episode runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Size of the rolling spoken-line window.
    pub line_window: usize,
    /// Lines a checkpoint looks back over.
    pub checkpoint_window: usize,
    /// Speech rate used to estimate line duration.
    pub words_per_second: f32,
    /// Maximum turn records kept for export. Oldest are dropped first.
    pub turn_log_capacity: usize,
    /// Substitute a marked, zero-delta line when generation fails instead of erroring.
    pub fallback_on_generation_error: bool,
    pub content: ContentConstraints,
    pub plateau: PlateauConfig,
    pub cadence: CadenceConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            line_window: 12,
            checkpoint_window: 3,
            words_per_second: 2.5,
            turn_log_capacity: 2_000,
            fallback_on_generation_error: false,
            content: ContentConstraints::default(),
            plateau: PlateauConfig::default(),
            cadence: CadenceConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from TOML; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, NarrativeError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which checkpoints or plateau detection can never fire.
    pub fn validate(&self) -> Result<(), NarrativeError> {
        let result = self.check();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "runtime config rejected");
        }
        result
    }

    fn check(&self) -> Result<(), NarrativeError> {
        let invalid = |message: String| -> Result<(), NarrativeError> {
            Err(NarrativeError::InvalidConfig(message))
        };

        if self.line_window == 0 {
            return invalid("line_window must be at least 1".to_string());
        }
        if self.checkpoint_window == 0 || self.checkpoint_window > self.line_window {
            return invalid(format!(
                "checkpoint_window {} must be between 1 and line_window {}",
                self.checkpoint_window, self.line_window
            ));
        }
        // Similarity compares consecutive lines, so a single-line window never plateaus.
        if self.plateau.window < 2 || self.plateau.window > self.line_window {
            return invalid(format!(
                "plateau.window {} must be between 2 and line_window {}",
                self.plateau.window, self.line_window
            ));
        }
        if self.plateau.threshold == 0 {
            return invalid("plateau.threshold must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.plateau.similarity) {
            return invalid(format!(
                "plateau.similarity {} must lie in [0, 1]",
                self.plateau.similarity
            ));
        }
        if !self.words_per_second.is_finite() || self.words_per_second <= 0.0 {
            return invalid(format!(
                "words_per_second {} must be positive",
                self.words_per_second
            ));
        }
        Ok(())
    }
}

/// Configuration for the evaluation engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Best score below which the engine abstains.
    pub min_score: f32,
    /// Upper bound on candidates scored per call.
    pub max_candidates: usize,
    /// Exchanges without a touch before a callback counts as dormant.
    pub dormant_after: u64,
    /// Evaluation snapshots kept before the oldest are dropped.
    pub log_capacity: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_score: 0.1,
            max_candidates: 5,
            dormant_after: 4,
            log_capacity: 256,
        }
    }
}

impl EvaluationConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, NarrativeError> {
        Ok(toml::from_str(source)?)
    }
}
