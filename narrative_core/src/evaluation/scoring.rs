//! Freshness and coherence scoring for candidate nudges.

use serde::{Deserialize, Serialize};
use story_rules::{ActGate, Intensity, NudgeDefinition, NudgeKind};

use super::{DialogueSummary, StructuralState};
use crate::episode::word_set;
use crate::error::CollaboratorError;

/// Scores how different a candidate's move is from what was just said.
///
/// Returns a value in [0, 1], 1 being entirely new. An embedding-backed scorer
/// can be plugged in; an error makes the engine abstain.
pub trait NoveltyScorer: Send + Sync {
    fn novelty(
        &self,
        definition: &NudgeDefinition,
        dialogue: &DialogueSummary,
    ) -> Result<f32, CollaboratorError>;
}

/// Word-overlap novelty against the candidate's cue words.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalNovelty;

impl NoveltyScorer for LexicalNovelty {
    fn novelty(
        &self,
        definition: &NudgeDefinition,
        dialogue: &DialogueSummary,
    ) -> Result<f32, CollaboratorError> {
        if dialogue.lines.is_empty() {
            return Ok(1.0);
        }
        let cues: Vec<_> = definition
            .cue_words
            .iter()
            .flat_map(|w| word_set(w))
            .collect();
        if cues.is_empty() {
            return Ok(0.5);
        }

        let max_overlap = dialogue
            .lines
            .iter()
            .map(|line| {
                let words = word_set(&line.text);
                cues.iter().filter(|c| words.contains(*c)).count() as f32 / cues.len() as f32
            })
            .fold(0.0_f32, f32::max);

        Ok(1.0 - max_overlap)
    }
}

const NOVELTY_WEIGHT: f32 = 0.4;
const UNDERUSE_WEIGHT: f32 = 0.2;
const PLATEAU_WEIGHT: f32 = 0.2;
const REVIVAL_WEIGHT: f32 = 0.2;

/// Freshness gain components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshnessBreakdown {
    pub novelty: f32,
    pub underuse: f32,
    pub plateau: f32,
    pub revival: f32,
    pub total: f32,
}

pub fn freshness(
    definition: &NudgeDefinition,
    state: &StructuralState,
    novelty: f32,
    dormant_after: u64,
) -> FreshnessBreakdown {
    let novelty = novelty.clamp(0.0, 1.0);
    let uses = state.usage.get(&definition.kind).copied().unwrap_or(0);
    let underuse = 1.0 / (1.0 + uses as f32);
    let plateau = if state.plateau_threshold == 0 {
        0.0
    } else {
        (state.plateau_counter as f32 / state.plateau_threshold as f32).min(1.0)
    };
    let revival = if definition.kind == NudgeKind::RecallCallback
        && state.dormant_callback(dormant_after).is_some()
    {
        1.0
    } else {
        0.0
    };

    FreshnessBreakdown {
        novelty,
        underuse,
        plateau,
        revival,
        total: NOVELTY_WEIGHT * novelty
            + UNDERUSE_WEIGHT * underuse
            + PLATEAU_WEIGHT * plateau
            + REVIVAL_WEIGHT * revival,
    }
}

const PERSONA_WEIGHT: f32 = 0.3;
const GRAMMAR_WEIGHT: f32 = 0.3;
const CONTINUITY_WEIGHT: f32 = 0.25;
const SAFETY_WEIGHT: f32 = 0.15;

/// Bias norm at which persona drift saturates.
const DRIFT_SCALE: f32 = 0.12;
/// Attraction bias above which PG-13 content adds risk.
const PG13_ATTRACTION_LIMIT: f32 = 0.05;

/// Coherence cost components. `total` already includes the act scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceBreakdown {
    pub persona_drift: f32,
    pub grammar: f32,
    pub continuity: f32,
    pub safety: f32,
    /// Multiplier for later acts.
    pub act_scale: f32,
    pub total: f32,
}

pub fn coherence(
    definition: &NudgeDefinition,
    gate: &ActGate,
    state: &StructuralState,
    contradiction: f32,
) -> CoherenceBreakdown {
    let bias = definition.bias;
    let persona_drift = (bias.norm() / DRIFT_SCALE).clamp(0.0, 1.0);
    // Zero bias and a zero arc are both directionless.
    let grammar = bias
        .cosine(&gate.arc)
        .map(|cos| ((1.0 - cos) / 2.0).clamp(0.0, 1.0))
        .unwrap_or(0.5);
    let continuity = if definition.kind == NudgeKind::RecallCallback && state.callbacks.is_empty() {
        1.0
    } else {
        0.5 * contradiction.clamp(0.0, 1.0)
    };
    let mut safety = match definition.intensity {
        Intensity::Major => 0.3,
        Intensity::Minor => 0.1,
    };
    if state.pg13 && bias.attraction > PG13_ATTRACTION_LIMIT {
        safety += 0.2;
    }

    let act_scale = 1.0 + 0.1 * (state.act.number() as f32 - 1.0);
    let raw = PERSONA_WEIGHT * persona_drift
        + GRAMMAR_WEIGHT * grammar
        + CONTINUITY_WEIGHT * continuity
        + SAFETY_WEIGHT * safety;

    CoherenceBreakdown {
        persona_drift,
        grammar,
        continuity,
        safety,
        act_scale,
        total: raw * act_scale,
    }
}

/// Final score: freshness minus weighted coherence cost, clamped to [-1, 1].
pub fn final_score(freshness: f32, lambda: f32, cost: f32) -> f32 {
    (freshness - lambda * cost).clamp(-1.0, 1.0)
}
