//! Bias flags - the typed set of soft steering effects handed to generation.

use serde::{Deserialize, Serialize};
use story_rules::{CharacterId, Intensity, NudgeKind, PolicyTables, RelationshipDelta};

use crate::episode::Nudge;

/// Weight contributed by one pending nudge of the given intensity.
fn intensity_weight(intensity: Intensity) -> f32 {
    match intensity {
        Intensity::Minor => 1.0,
        Intensity::Major => 1.5,
    }
}

/// Post-major recovery window, biasing toward comfort and clarify moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryBias {
    /// Exchanges left in the window, including the one being generated.
    pub remaining: u32,
}

/// Every steering effect generation may receive. Absent effects are `None` or zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasFlags {
    pub recovery: Option<RecoveryBias>,
    pub spark_weight: f32,
    pub comfort_weight: f32,
    pub clarify_weight: f32,
    pub self_disclosure_weight: f32,
    pub stakes_weight: f32,
    /// Callback token the next lines should bring back.
    pub recall_token: Option<String>,
    /// A spotlight member and a watcher who get a brief side exchange.
    pub aside_pair: Option<(CharacterId, CharacterId)>,
    /// Upper bound on spoken seconds per line.
    pub line_length_cap: Option<f32>,
    /// Summed catalog bias of the pending nudges. Advisory only; never applied to the graph.
    pub expected_delta: RelationshipDelta,
    /// Kinds that contributed, in the order they were accepted.
    pub sources: Vec<NudgeKind>,
}

impl BiasFlags {
    /// Derive flags from the pending nudges and the recovery state.
    ///
    /// `watchers` are cast members outside the spotlight, in cast order.
    pub fn derive(
        pending: &[Nudge],
        policy: &PolicyTables,
        recovery_remaining: u32,
        spotlight: (CharacterId, CharacterId),
        watchers: &[CharacterId],
        max_line_seconds: f32,
    ) -> Self {
        let mut flags = BiasFlags::default();

        for nudge in pending {
            let weight = intensity_weight(nudge.intensity);
            if let Some(definition) = policy.definition(nudge.kind) {
                flags.expected_delta = flags.expected_delta + definition.bias;
            }
            flags.sources.push(nudge.kind);

            match nudge.kind {
                NudgeKind::Spark => flags.spark_weight += weight,
                NudgeKind::Comfort => flags.comfort_weight += weight,
                NudgeKind::Clarify => flags.clarify_weight += weight,
                NudgeKind::SelfDisclosure => flags.self_disclosure_weight += weight,
                NudgeKind::RaiseStakes => flags.stakes_weight += weight,
                NudgeKind::RecallCallback => {
                    if nudge.callback_token.is_some() {
                        flags.recall_token = nudge.callback_token.clone();
                    }
                }
                NudgeKind::Aside => {
                    let anchor = nudge
                        .target
                        .filter(|t| *t == spotlight.0 || *t == spotlight.1)
                        .unwrap_or(spotlight.0);
                    flags.aside_pair = watchers.first().map(|w| (anchor, *w));
                }
                NudgeKind::Tighten => {
                    flags.line_length_cap = Some(max_line_seconds * 0.5);
                }
            }
        }

        if recovery_remaining > 0 {
            flags.recovery = Some(RecoveryBias {
                remaining: recovery_remaining,
            });
            flags.comfort_weight = flags.comfort_weight.max(1.0);
            flags.clarify_weight = flags.clarify_weight.max(1.0);
        }

        flags
    }

    pub fn is_empty(&self) -> bool {
        *self == BiasFlags::default()
    }

    /// Short human-readable lines, one per active effect.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(recovery) = self.recovery {
            lines.push(format!(
                "Recovery: favour comfort and clarification ({} exchange(s) left)",
                recovery.remaining
            ));
        }
        let weights = [
            ("spark", self.spark_weight),
            ("comfort", self.comfort_weight),
            ("clarify", self.clarify_weight),
            ("self-disclosure", self.self_disclosure_weight),
            ("stakes", self.stakes_weight),
        ];
        for (name, weight) in weights {
            if weight > 0.0 {
                lines.push(format!("Lean into {} (weight {:.1})", name, weight));
            }
        }
        if let Some(token) = &self.recall_token {
            lines.push(format!("Bring back \"{}\"", token));
        }
        if let Some((a, b)) = self.aside_pair {
            lines.push(format!("Aside between {} and {}", a, b));
        }
        if let Some(cap) = self.line_length_cap {
            lines.push(format!("Keep lines under {:.1}s", cap));
        }
        lines
    }
}
