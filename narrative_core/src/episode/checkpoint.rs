//! Checkpoint detection and the act transitions it produces.

use serde::{Deserialize, Serialize};
use story_rules::{
    Act, CheckpointInput, CheckpointRule, LineEvidence, PairRecord, PolicyTables, SceneEndReason,
};

use super::SpokenLine;

/// A scene change, from a checkpoint or a wrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActTransition {
    pub exchange: u64,
    pub from_act: Act,
    pub from_scene: u32,
    pub to_act: Act,
    pub to_scene: u32,
    pub reason: SceneEndReason,
    /// Name of the checkpoint rule that fired, for checkpoint transitions.
    pub checkpoint: Option<String>,
}

impl ActTransition {
    pub fn advances_act(&self) -> bool {
        self.to_act > self.from_act
    }
}

/// Find the checkpoint out of `act` satisfied by the pair and recent lines.
///
/// Returns `None` in the final act, or when the rule for `act` does not hold.
pub fn detect<'p>(
    policy: &'p PolicyTables,
    act: Act,
    pair: &PairRecord,
    recent: &[&SpokenLine],
    open_callbacks: usize,
) -> Option<&'p CheckpointRule> {
    if act.is_final() {
        return None;
    }
    let rule = policy.checkpoint_from(act)?;
    if Some(rule.to) != act.next() {
        return None;
    }

    let evidence: Vec<LineEvidence<'_>> = recent.iter().map(|l| l.evidence()).collect();
    let input = CheckpointInput {
        pair,
        recent: &evidence,
        open_callbacks,
    };
    rule.is_satisfied(&input).then_some(rule)
}
