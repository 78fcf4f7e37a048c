//! Evaluation Engine - decides whether and how to intervene.
//!
//! Each call to [`EvaluationEngine::consider`] works as follows:
//! 1. **Candidates**: act-permitted nudge kinds that are out of cooldown
//! 2. **Fragility**: volatility of the spotlighted pair and recent lines
//! 3. **λ**: the act's base coherence weight, amplified by fragility
//! 4. **Scoring**: freshness gain and coherence cost per candidate
//! 5. **Decision**: recommend the best candidate, or abstain with reasons
//!
//! The engine never mutates story state. Callers submit recommendations through
//! the session's `apply_nudge` like any other nudge.

mod fragility;
mod log;
mod scoring;

pub use fragility::*;
pub use log::*;
pub use scoring::*;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use story_rules::{
    Act, Intensity, NudgeDefinition, NudgeKind, NudgeSource, PairRecord, PolicyTables,
    RelationshipDelta,
};

use crate::config::EvaluationConfig;
use crate::episode::{Nudge, SpokenLine};

/// An open callback token and how long it has gone untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSummary {
    pub token: String,
    pub dormant_for: u64,
}

/// Structural state the engine scores against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralState {
    pub act: Act,
    pub scene_index: u32,
    pub exchange: u64,
    /// Record of the spotlighted pair.
    pub pair: PairRecord,
    pub plateau_counter: u32,
    pub plateau_threshold: u32,
    pub recovery_active: bool,
    /// Exchanges until another major nudge may be accepted.
    pub major_cooldown_remaining: u64,
    /// Exchanges until each kind leaves its catalog cooldown. Missing means ready.
    pub cooldowns: BTreeMap<NudgeKind, u64>,
    /// Accepted nudges per kind this episode.
    pub usage: BTreeMap<NudgeKind, u32>,
    pub callbacks: Vec<CallbackSummary>,
    pub pg13: bool,
}

impl StructuralState {
    /// The most dormant open callback, if any has gone untouched for `after` exchanges.
    pub fn dormant_callback(&self, after: u64) -> Option<&CallbackSummary> {
        self.callbacks
            .iter()
            .filter(|c| c.dormant_for >= after)
            .max_by_key(|c| c.dormant_for)
    }

    pub fn cooldown(&self, kind: NudgeKind) -> u64 {
        self.cooldowns.get(&kind).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(act: Act) -> Self {
        Self {
            act,
            scene_index: 0,
            exchange: 0,
            pair: PairRecord::baseline(),
            plateau_counter: 0,
            plateau_threshold: 3,
            recovery_active: false,
            major_cooldown_remaining: 0,
            cooldowns: BTreeMap::new(),
            usage: BTreeMap::new(),
            callbacks: Vec::new(),
            pg13: true,
        }
    }
}

/// One recent line as the evaluator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSummary {
    pub speaker: String,
    pub text: String,
    pub deltas: RelationshipDelta,
}

impl From<&SpokenLine> for LineSummary {
    fn from(line: &SpokenLine) -> Self {
        Self {
            speaker: line.speaker_name.clone(),
            text: line.text.clone(),
            deltas: line.deltas,
        }
    }
}

/// Summary of recent dialogue, oldest line first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueSummary {
    pub lines: Vec<LineSummary>,
    /// Contradictions reported by an outside checker, on top of detected sign flips.
    #[serde(default)]
    pub flagged_contradictions: u32,
}

impl DialogueSummary {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a SpokenLine>) -> Self {
        Self {
            lines: lines.into_iter().map(LineSummary::from).collect(),
            flagged_contradictions: 0,
        }
    }
}

/// A candidate with its full score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub kind: NudgeKind,
    pub intensity: Intensity,
    pub freshness: FreshnessBreakdown,
    pub coherence: CoherenceBreakdown,
    pub score: f32,
    /// Token to recall, for recall candidates.
    pub callback_token: Option<String>,
    pub rationale: Vec<String>,
}

impl ScoredCandidate {
    /// The nudge a caller would submit for this candidate.
    pub fn to_nudge(&self) -> Nudge {
        let nudge = Nudge::new(self.kind, self.intensity).from_source(NudgeSource::Evaluator);
        match &self.callback_token {
            Some(token) => nudge.with_callback(token.clone()),
            None => nudge,
        }
    }
}

/// The engine's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Recommendation {
    Recommend {
        nudge: Nudge,
        score: f32,
        rationale: Vec<String>,
    },
    Abstain {
        best_score: Option<f32>,
        rationale: Vec<String>,
    },
}

impl Recommendation {
    pub fn rationale(&self) -> &[String] {
        match self {
            Recommendation::Recommend { rationale, .. } => rationale,
            Recommendation::Abstain { rationale, .. } => rationale,
        }
    }

    pub fn nudge(&self) -> Option<&Nudge> {
        match self {
            Recommendation::Recommend { nudge, .. } => Some(nudge),
            Recommendation::Abstain { .. } => None,
        }
    }

    pub fn is_abstention(&self) -> bool {
        matches!(self, Recommendation::Abstain { .. })
    }
}

/// Result of one `consider` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Sequence number, shared with the log snapshots it produced.
    pub id: u64,
    pub exchange: u64,
    pub act: Act,
    pub fragility: FragilityBreakdown,
    pub lambda: f32,
    /// Scored candidates, best first.
    pub candidates: Vec<ScoredCandidate>,
    pub recommendation: Recommendation,
}

impl Evaluation {
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.candidates.first()
    }

    pub fn best_score(&self) -> Option<f32> {
        self.best().map(|c| c.score)
    }
}

pub struct EvaluationEngine {
    config: EvaluationConfig,
    policy: Arc<PolicyTables>,
    novelty: Arc<dyn NoveltyScorer>,
    log: EvaluationLog,
    next_id: u64,
}

impl EvaluationEngine {
    pub fn new(policy: Arc<PolicyTables>) -> Self {
        let config = EvaluationConfig::default();
        Self {
            config,
            policy,
            novelty: Arc::new(LexicalNovelty),
            log: EvaluationLog::new(config.log_capacity),
            next_id: 0,
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self.log = EvaluationLog::new(config.log_capacity);
        self
    }

    pub fn with_policy(mut self, policy: Arc<PolicyTables>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_novelty(mut self, novelty: Arc<dyn NoveltyScorer>) -> Self {
        self.novelty = novelty;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn log(&self) -> &EvaluationLog {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Act-permitted, out-of-cooldown kinds; least used first, catalog order on ties.
    pub fn candidates(&self, state: &StructuralState) -> Vec<&NudgeDefinition> {
        let mut candidates: Vec<_> = self
            .policy
            .catalog
            .iter()
            .filter(|d| self.policy.permits(state.act, d.kind))
            .filter(|d| state.cooldown(d.kind) == 0)
            .collect();
        candidates.sort_by_key(|d| state.usage.get(&d.kind).copied().unwrap_or(0));
        candidates.truncate(self.config.max_candidates);
        candidates
    }

    /// Score candidates and recommend one, or abstain.
    pub fn consider(&mut self, state: &StructuralState, dialogue: &DialogueSummary) -> Evaluation {
        let id = self.next_id;
        self.next_id += 1;

        let fragility = fragility(&state.pair, dialogue);
        let base_weight = self
            .policy
            .gate(state.act)
            .map(|g| g.base_coherence_weight)
            .unwrap_or(1.0);
        let lambda = coherence_weight(base_weight, fragility.index);

        let mut evaluation = Evaluation {
            id,
            exchange: state.exchange,
            act: state.act,
            fragility,
            lambda,
            candidates: Vec::new(),
            recommendation: Recommendation::Abstain {
                best_score: None,
                rationale: Vec::new(),
            },
        };

        match self.score_candidates(state, dialogue, &fragility, lambda) {
            Ok(candidates) => evaluation.candidates = candidates,
            Err(message) => {
                tracing::warn!(
                    evaluation = id,
                    error = %message,
                    "evaluation degraded to abstention"
                );
                evaluation.recommendation = Recommendation::Abstain {
                    best_score: None,
                    rationale: vec![
                        "Evaluation is unavailable right now; holding steady.".to_string()
                    ],
                };
                return evaluation;
            }
        }

        evaluation.recommendation = self.decide(state, &evaluation.candidates);
        if let Recommendation::Abstain { rationale, .. } = &evaluation.recommendation {
            tracing::debug!(evaluation = id, reason = ?rationale.first(), "abstaining");
        }
        self.record(&evaluation);
        evaluation
    }

    fn score_candidates(
        &self,
        state: &StructuralState,
        dialogue: &DialogueSummary,
        fragility: &FragilityBreakdown,
        lambda: f32,
    ) -> Result<Vec<ScoredCandidate>, String> {
        let gate = self
            .policy
            .gate(state.act)
            .ok_or_else(|| format!("no gate for {}", state.act))?;

        let mut scored = Vec::new();
        for definition in self.candidates(state) {
            let novelty = self
                .novelty
                .novelty(definition, dialogue)
                .map_err(|e| e.to_string())?;
            let fresh = freshness(definition, state, novelty, self.config.dormant_after);
            let cost = coherence(definition, gate, state, fragility.contradiction);
            let score = final_score(fresh.total, lambda, cost.total);

            let callback_token = if definition.kind == NudgeKind::RecallCallback {
                state
                    .dormant_callback(self.config.dormant_after)
                    .or_else(|| state.callbacks.first())
                    .map(|c| c.token.clone())
            } else {
                None
            };

            let mut rationale = vec![format!(
                "{}: freshness {:.2} - λ {:.2} × cost {:.2} = {:.2}",
                definition.kind, fresh.total, lambda, cost.total, score
            )];
            if fresh.plateau >= 1.0 {
                rationale.push("The story has plateaued; fresh moves are favoured.".to_string());
            }
            if fresh.revival > 0.0 {
                if let Some(token) = &callback_token {
                    rationale.push(format!("Revives the dormant callback \"{}\".", token));
                }
            }
            if fragility.index >= 0.5 {
                rationale.push(format!(
                    "The scene is fragile (index {:.2}); coherence weighs more.",
                    fragility.index
                ));
            }

            scored.push(ScoredCandidate {
                kind: definition.kind,
                intensity: definition.intensity,
                freshness: fresh,
                coherence: cost,
                score,
                callback_token,
                rationale,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }

    fn decide(&self, state: &StructuralState, candidates: &[ScoredCandidate]) -> Recommendation {
        let Some(best) = candidates.first() else {
            return Recommendation::Abstain {
                best_score: None,
                rationale: vec![format!("No permitted moves are ready in {}.", state.act)],
            };
        };

        let abstain = |reason: String| Recommendation::Abstain {
            best_score: Some(best.score),
            rationale: vec![reason],
        };

        if best.score < self.config.min_score {
            return abstain(format!(
                "Best candidate {} scored {:.2}, below the {:.2} minimum; holding steady.",
                best.kind, best.score, self.config.min_score
            ));
        }
        if best.intensity == Intensity::Major && state.major_cooldown_remaining > 0 {
            return abstain(format!(
                "Best candidate {} is a major move, but the next major is {} exchange(s) away.",
                best.kind, state.major_cooldown_remaining
            ));
        }
        if state.recovery_active && !best.kind.is_recovery_move() {
            return abstain(format!(
                "Recovering from a major move; {} is not a comfort or clarify move.",
                best.kind
            ));
        }

        let mut rationale = vec![format!(
            "Recommend {} ({:?}) with score {:.2}.",
            best.kind, best.intensity, best.score
        )];
        rationale.extend(best.rationale.iter().cloned());
        Recommendation::Recommend {
            nudge: best.to_nudge(),
            score: best.score,
            rationale,
        }
    }

    fn record(&mut self, evaluation: &Evaluation) {
        let chosen = evaluation.recommendation.nudge().map(|n| n.kind);
        let at = Utc::now();
        for candidate in &evaluation.candidates {
            self.log.record(EvaluationSnapshot {
                evaluation: evaluation.id,
                at,
                exchange: evaluation.exchange,
                act: evaluation.act,
                kind: candidate.kind,
                intensity: candidate.intensity,
                freshness: candidate.freshness,
                coherence: candidate.coherence,
                fragility: evaluation.fragility.index,
                lambda: evaluation.lambda,
                score: candidate.score,
                chosen: chosen == Some(candidate.kind),
                rationale: candidate.rationale.clone(),
            });
        }
    }
}
