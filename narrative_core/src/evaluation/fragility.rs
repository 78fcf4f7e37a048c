//! Fragility index - how volatile the current scene is.

use serde::{Deserialize, Serialize};
use story_rules::{Dimension, PairRecord};

use super::DialogueSummary;

const TENSION_WEIGHT: f32 = 0.45;
const TRUST_WEIGHT: f32 = 0.35;
const CONTRADICTION_WEIGHT: f32 = 0.2;

/// Mean positive tension delta that counts as fully volatile.
const TENSION_DELTA_SCALE: f32 = 0.3;
/// Mean trust loss that counts as fully volatile.
const TRUST_DELTA_SCALE: f32 = 0.1;
/// Smallest delta that takes part in a sign flip.
const FLIP_EPSILON: f32 = 0.05;
/// Contradictions at which the component saturates.
const CONTRADICTION_SATURATION: f32 = 2.0;

/// Components of the fragility index, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FragilityBreakdown {
    pub high_tension: f32,
    pub low_trust: f32,
    pub contradiction: f32,
    /// Weighted sum, capped at 1.
    pub index: f32,
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Compute the fragility index for the spotlighted pair and recent dialogue.
pub fn fragility(pair: &PairRecord, dialogue: &DialogueSummary) -> FragilityBreakdown {
    let count = dialogue.lines.len().max(1) as f32;
    let mean_tension_gain = dialogue
        .lines
        .iter()
        .map(|l| l.deltas.tension.max(0.0))
        .sum::<f32>()
        / count;
    let mean_trust = dialogue.lines.iter().map(|l| l.deltas.trust).sum::<f32>() / count;

    let high_tension =
        unit(0.5 * pair.tension + 0.5 * unit(mean_tension_gain / TENSION_DELTA_SCALE));
    let low_trust = unit(0.5 * (1.0 - pair.trust) + 0.5 * unit(-mean_trust / TRUST_DELTA_SCALE));

    let contradictions =
        count_sign_flips(dialogue).saturating_add(dialogue.flagged_contradictions);
    let contradiction = unit(contradictions as f32 / CONTRADICTION_SATURATION);

    let index = (TENSION_WEIGHT * high_tension
        + TRUST_WEIGHT * low_trust
        + CONTRADICTION_WEIGHT * contradiction)
        .min(1.0);

    FragilityBreakdown {
        high_tension,
        low_trust,
        contradiction,
        index,
    }
}

/// Count dimension reversals between consecutive lines.
pub fn count_sign_flips(dialogue: &DialogueSummary) -> u32 {
    dialogue
        .lines
        .windows(2)
        .map(|pair| {
            Dimension::ALL
                .iter()
                .filter(|d| {
                    let before = pair[0].deltas.get(**d);
                    let after = pair[1].deltas.get(**d);
                    before.abs() > FLIP_EPSILON
                        && after.abs() > FLIP_EPSILON
                        && before.signum() != after.signum()
                })
                .count() as u32
        })
        .sum()
}

/// λ: the act's base weight amplified by fragility.
pub fn coherence_weight(base: f32, fragility: f32) -> f32 {
    base * (0.6 + fragility * 1.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::LineSummary;
    use story_rules::RelationshipDelta;

    fn dialogue(deltas: &[RelationshipDelta]) -> DialogueSummary {
        DialogueSummary {
            lines: deltas
                .iter()
                .map(|d| LineSummary {
                    speaker: "A".to_string(),
                    text: "line".to_string(),
                    deltas: *d,
                })
                .collect(),
            flagged_contradictions: 0,
        }
    }

    #[test]
    fn test_fragile_beats_stable() {
        let pair = PairRecord::new(0.4, 0.4, 0.4, 0.4);
        let fragile = dialogue(&[RelationshipDelta::new(0.0, -0.1, 0.3, 0.0); 3]);
        let stable = dialogue(&[RelationshipDelta::new(0.0, 0.1, 0.0, 0.15); 3]);

        let f = fragility(&pair, &fragile);
        let s = fragility(&pair, &stable);
        assert!(f.index > s.index);
        assert!((f.high_tension - 0.7).abs() < 1e-5);
        assert!((s.low_trust - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_index_is_capped() {
        let pair = PairRecord::new(0.0, 0.0, 1.0, 0.0);
        let mut summary = dialogue(&[RelationshipDelta::new(0.0, -0.5, 0.5, 0.0); 3]);
        summary.flagged_contradictions = 10;
        let f = fragility(&pair, &summary);
        assert!(f.index <= 1.0);
        assert_eq!(f.contradiction, 1.0);
    }

    #[test]
    fn test_flagged_contradictions_saturate() {
        let mut summary = dialogue(&[
            RelationshipDelta::new(0.1, 0.0, 0.0, 0.0),
            RelationshipDelta::new(-0.1, 0.0, 0.0, 0.0),
        ]);
        summary.flagged_contradictions = u32::MAX;
        let f = fragility(&PairRecord::baseline(), &summary);
        assert_eq!(f.contradiction, 1.0);
    }

    #[test]
    fn test_sign_flips() {
        let summary = dialogue(&[
            RelationshipDelta::new(0.1, 0.1, 0.0, 0.0),
            RelationshipDelta::new(-0.1, 0.02, 0.0, 0.0),
            RelationshipDelta::new(0.1, -0.1, 0.0, 0.0),
        ]);
        // attraction flips twice; the small trust delta never counts
        assert_eq!(count_sign_flips(&summary), 2);
    }

    #[test]
    fn test_empty_dialogue() {
        let f = fragility(&PairRecord::baseline(), &DialogueSummary::default());
        assert_eq!(f.contradiction, 0.0);
        assert!(f.index >= 0.0 && f.index <= 1.0);
    }

    #[test]
    fn test_coherence_weight_range() {
        assert!((coherence_weight(1.0, 0.0) - 0.6).abs() < 1e-6);
        assert!((coherence_weight(1.0, 1.0) - 1.8).abs() < 1e-6);
    }
}
