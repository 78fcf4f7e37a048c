//! Append-only evaluation log for "why this nudge" inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use story_rules::{Act, Intensity, NudgeKind};

use super::{CoherenceBreakdown, FreshnessBreakdown};

/// One scored candidate from one `consider` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSnapshot {
    /// Sequence number of the `consider` call that produced it.
    pub evaluation: u64,
    pub at: DateTime<Utc>,
    pub exchange: u64,
    pub act: Act,
    pub kind: NudgeKind,
    pub intensity: Intensity,
    pub freshness: FreshnessBreakdown,
    pub coherence: CoherenceBreakdown,
    pub fragility: f32,
    pub lambda: f32,
    pub score: f32,
    pub chosen: bool,
    pub rationale: Vec<String>,
}

/// Bounded log, oldest snapshots evicted first. Insertion order is preserved.
#[derive(Debug, Clone)]
pub struct EvaluationLog {
    capacity: usize,
    entries: VecDeque<EvaluationSnapshot>,
}

impl EvaluationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, snapshot: EvaluationSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvaluationSnapshot> {
        self.entries.iter()
    }

    /// Snapshots from one `consider` call.
    pub fn for_evaluation(&self, evaluation: u64) -> Vec<&EvaluationSnapshot> {
        self.entries
            .iter()
            .filter(|s| s.evaluation == evaluation)
            .collect()
    }

    pub fn chosen(&self) -> impl Iterator<Item = &EvaluationSnapshot> {
        self.entries.iter().filter(|s| s.chosen)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<EvaluationSnapshot> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(evaluation: u64, chosen: bool) -> EvaluationSnapshot {
        let freshness = FreshnessBreakdown {
            novelty: 1.0,
            underuse: 1.0,
            plateau: 0.0,
            revival: 0.0,
            total: 0.6,
        };
        let coherence = CoherenceBreakdown {
            persona_drift: 0.0,
            grammar: 0.5,
            continuity: 0.0,
            safety: 0.1,
            act_scale: 1.0,
            total: 0.165,
        };
        EvaluationSnapshot {
            evaluation,
            at: Utc::now(),
            exchange: 0,
            act: Act::Setup,
            kind: NudgeKind::Comfort,
            intensity: Intensity::Minor,
            freshness,
            coherence,
            fragility: 0.3,
            lambda: 0.5,
            score: 0.5,
            chosen,
            rationale: vec!["test".to_string()],
        }
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = EvaluationLog::new(2);
        log.record(snapshot(0, false));
        log.record(snapshot(1, true));
        log.record(snapshot(2, false));

        assert_eq!(log.len(), 2);
        let order: Vec<_> = log.iter().map(|s| s.evaluation).collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(log.chosen().count(), 1);
        assert_eq!(log.for_evaluation(2).len(), 1);
    }
}
