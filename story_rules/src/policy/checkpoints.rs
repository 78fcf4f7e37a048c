//! Checkpoint rules - data-only predicates that gate each act transition.

use serde::{Deserialize, Serialize};

use super::CueKind;
use crate::entities::{Dimension, PairRecord, RelationshipDelta};
use crate::mechanics::Act;

/// One recent line, as seen by a checkpoint predicate.
#[derive(Debug, Clone, Copy)]
pub struct LineEvidence<'a> {
    pub text: &'a str,
    pub delta: RelationshipDelta,
}

/// Everything a checkpoint predicate is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointInput<'a> {
    /// Current record for the spotlighted pair.
    pub pair: &'a PairRecord,
    /// Short window of recent lines, oldest first.
    pub recent: &'a [LineEvidence<'a>],
    /// Number of callback threads currently open.
    pub open_callbacks: usize,
}

/// A single piece of qualifying evidence. A condition with evidence needs any one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// At least one callback thread is open.
    OpenCallback,
    /// A recent line carried a trust delta strictly above the bound.
    TrustDelta { above: f32 },
    /// A recent line carried a tension delta strictly above the bound.
    TensionDelta { above: f32 },
    /// A recent line contains cue language.
    Language { cue: CueKind },
}

impl Evidence {
    pub fn holds(&self, input: &CheckpointInput<'_>) -> bool {
        match self {
            Evidence::OpenCallback => input.open_callbacks > 0,
            Evidence::TrustDelta { above } => input.recent.iter().any(|l| l.delta.trust > *above),
            Evidence::TensionDelta { above } => {
                input.recent.iter().any(|l| l.delta.tension > *above)
            }
            Evidence::Language { cue } => input.recent.iter().any(|l| cue.matches(l.text)),
        }
    }
}

/// Threshold and evidence requirements for a transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointCondition {
    #[serde(default)]
    pub min_attraction: Option<f32>,
    #[serde(default)]
    pub min_trust: Option<f32>,
    #[serde(default)]
    pub min_tension: Option<f32>,
    /// Any one of these must hold. Empty means thresholds alone decide.
    #[serde(default)]
    pub any_of: Vec<Evidence>,
}

impl CheckpointCondition {
    /// Threshold requirements, paired with the dimension they constrain.
    pub fn thresholds(&self) -> Vec<(Dimension, f32)> {
        [
            (Dimension::Attraction, self.min_attraction),
            (Dimension::Trust, self.min_trust),
            (Dimension::Tension, self.min_tension),
        ]
        .into_iter()
        .filter_map(|(dimension, min)| min.map(|m| (dimension, m)))
        .collect()
    }

    pub fn is_satisfied(&self, input: &CheckpointInput<'_>) -> bool {
        let thresholds_met = self
            .thresholds()
            .iter()
            .all(|(dimension, min)| input.pair.get(*dimension) >= *min);

        thresholds_met && (self.any_of.is_empty() || self.any_of.iter().any(|e| e.holds(input)))
    }
}

/// A named act-transition rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRule {
    pub name: String,
    pub from: Act,
    pub to: Act,
    #[serde(default)]
    pub description: String,
    pub condition: CheckpointCondition,
}

impl CheckpointRule {
    pub fn is_satisfied(&self, input: &CheckpointInput<'_>) -> bool {
        self.condition.is_satisfied(input)
    }
}

/// The built-in checkpoint table.
pub fn standard_checkpoints() -> Vec<CheckpointRule> {
    vec![
        CheckpointRule {
            name: "mutual_spark".to_string(),
            from: Act::Setup,
            to: Act::RisingAction,
            description: "Reciprocal attraction plus a shared moment or a trust gain.".to_string(),
            condition: CheckpointCondition {
                min_attraction: Some(0.4),
                any_of: vec![Evidence::OpenCallback, Evidence::TrustDelta { above: 0.05 }],
                ..Default::default()
            },
        },
        CheckpointRule {
            name: "explicit_conflict".to_string(),
            from: Act::RisingAction,
            to: Act::Climax,
            description: "High tension with disagreement said out loud.".to_string(),
            condition: CheckpointCondition {
                min_tension: Some(0.6),
                any_of: vec![
                    Evidence::Language {
                        cue: CueKind::Disagreement,
                    },
                    Evidence::TensionDelta { above: 0.1 },
                ],
                ..Default::default()
            },
        },
        CheckpointRule {
            name: "need_stated".to_string(),
            from: Act::Climax,
            to: Act::FallingAction,
            description: "Enough trust for someone to name a need or boundary.".to_string(),
            condition: CheckpointCondition {
                min_trust: Some(0.6),
                any_of: vec![Evidence::Language { cue: CueKind::Need }],
                ..Default::default()
            },
        },
        CheckpointRule {
            name: "relational_choice".to_string(),
            from: Act::FallingAction,
            to: Act::Resolution,
            description: "Someone makes an explicit relational choice.".to_string(),
            condition: CheckpointCondition {
                any_of: vec![Evidence::Language {
                    cue: CueKind::Commitment,
                }],
                ..Default::default()
            },
        },
    ]
}
