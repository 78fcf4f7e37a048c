//! Act gates - which nudges each act permits and how much coherence matters there.

use serde::{Deserialize, Serialize};

use crate::entities::RelationshipDelta;
use crate::mechanics::{Act, NudgeKind};

/// Static policy for one act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActGate {
    pub act: Act,
    pub allowed: Vec<NudgeKind>,
    #[serde(default)]
    pub blocked: Vec<NudgeKind>,
    /// Baseline weight of coherence cost in this act.
    pub base_coherence_weight: f32,
    /// Direction the act wants relationships to move in.
    #[serde(default)]
    pub arc: RelationshipDelta,
    #[serde(default)]
    pub description: String,
}

impl ActGate {
    /// A kind passes the gate when it is allowed and not blocked.
    pub fn permits(&self, kind: NudgeKind) -> bool {
        self.allowed.contains(&kind) && !self.blocked.contains(&kind)
    }

    pub fn is_blocked(&self, kind: NudgeKind) -> bool {
        self.blocked.contains(&kind)
    }
}

/// The built-in gate table.
pub fn standard_gates() -> Vec<ActGate> {
    use NudgeKind::*;

    vec![
        ActGate {
            act: Act::Setup,
            allowed: vec![Spark, Comfort, Clarify, SelfDisclosure, RecallCallback, Aside, Tighten],
            blocked: vec![RaiseStakes],
            base_coherence_weight: 0.8,
            arc: RelationshipDelta::new(0.6, 0.3, 0.0, 0.3),
            description: "Introduce the pair and let a spark form; no threats yet.".to_string(),
        },
        ActGate {
            act: Act::RisingAction,
            allowed: NudgeKind::ALL.to_vec(),
            blocked: vec![],
            base_coherence_weight: 1.0,
            arc: RelationshipDelta::new(0.4, 0.1, 0.5, 0.0),
            description: "Complicate the connection until conflict surfaces.".to_string(),
        },
        ActGate {
            act: Act::Climax,
            allowed: vec![Comfort, Clarify, SelfDisclosure, RaiseStakes, RecallCallback, Tighten],
            blocked: vec![Spark, Aside],
            base_coherence_weight: 1.2,
            arc: RelationshipDelta::new(0.0, 0.4, 0.5, 0.0),
            description: "Keep the conflict on the pair until a need is voiced.".to_string(),
        },
        ActGate {
            act: Act::FallingAction,
            allowed: vec![Comfort, Clarify, SelfDisclosure, RecallCallback, Aside, Tighten],
            blocked: vec![Spark, RaiseStakes],
            base_coherence_weight: 1.3,
            arc: RelationshipDelta::new(0.0, 0.5, -0.3, 0.5),
            description: "Repair and reckon; steer toward a choice.".to_string(),
        },
        ActGate {
            act: Act::Resolution,
            allowed: vec![Comfort, Clarify, RecallCallback, Tighten],
            blocked: vec![Spark, SelfDisclosure, RaiseStakes, Aside],
            base_coherence_weight: 1.5,
            arc: RelationshipDelta::new(0.2, 0.4, -0.4, 0.6),
            description: "Land the choice; only gentle, closing moves.".to_string(),
        },
    ]
}
