//! Nudge catalog - what each steering move does and how often it may be used.

use serde::{Deserialize, Serialize};

use crate::entities::RelationshipDelta;
use crate::mechanics::{Act, Intensity, NudgeKind};

/// Catalog entry for one nudge kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeDefinition {
    pub kind: NudgeKind,
    /// Intensity class the evaluator proposes this kind at.
    pub intensity: Intensity,
    /// Expected contribution to the next line's deltas. Biases generation only.
    #[serde(default)]
    pub bias: RelationshipDelta,
    /// Acts this kind may be used in. `None` = wherever the gate allows it.
    #[serde(default)]
    pub acts: Option<Vec<Act>>,
    /// Exchanges before the same kind is worth proposing again.
    #[serde(default)]
    pub cooldown: u32,
    /// Vocabulary typical of lines this nudge produces; used for novelty scoring.
    #[serde(default)]
    pub cue_words: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl NudgeDefinition {
    pub fn permitted_in(&self, act: Act) -> bool {
        self.acts.as_ref().map_or(true, |acts| acts.contains(&act))
    }
}

fn entry(
    kind: NudgeKind,
    intensity: Intensity,
    bias: RelationshipDelta,
    acts: Option<Vec<Act>>,
    cooldown: u32,
    cue_words: &[&str],
    description: &str,
) -> NudgeDefinition {
    NudgeDefinition {
        kind,
        intensity,
        bias,
        acts,
        cooldown,
        cue_words: cue_words.iter().map(|w| w.to_string()).collect(),
        description: description.to_string(),
    }
}

/// The built-in catalog.
pub fn standard_catalog() -> Vec<NudgeDefinition> {
    use Intensity::*;
    use NudgeKind::*;

    vec![
        entry(
            Spark,
            Minor,
            RelationshipDelta::new(0.06, 0.0, 0.0, 0.02),
            Some(vec![Act::Setup, Act::RisingAction]),
            2,
            &["smile", "glance", "cute", "flirt", "blush", "close"],
            "A charged look or a playful line between the pair.",
        ),
        entry(
            Comfort,
            Minor,
            RelationshipDelta::new(0.0, 0.01, -0.04, 0.06),
            None,
            1,
            &["okay", "safe", "here", "breathe", "alright", "gentle"],
            "Reassurance that lowers the temperature.",
        ),
        entry(
            Clarify,
            Minor,
            RelationshipDelta::new(0.0, 0.04, -0.03, 0.01),
            None,
            1,
            &["mean", "meant", "explain", "understand", "misunderstood", "actually"],
            "Clear up a misunderstanding before it calcifies.",
        ),
        entry(
            SelfDisclosure,
            Minor,
            RelationshipDelta::new(0.02, 0.05, 0.0, 0.01),
            None,
            3,
            &["never", "told", "anyone", "secret", "truth", "afraid"],
            "A character reveals something personal.",
        ),
        entry(
            RaiseStakes,
            Major,
            RelationshipDelta::new(0.0, -0.02, 0.08, -0.02),
            Some(vec![Act::RisingAction, Act::Climax]),
            6,
            &["lose", "leave", "risk", "choose", "last", "chance"],
            "Introduce a threat to the relationship.",
        ),
        entry(
            RecallCallback,
            Minor,
            RelationshipDelta::new(0.01, 0.02, 0.0, 0.03),
            None,
            4,
            &["remember", "again", "that", "night", "still", "back"],
            "Bring a dormant callback token back into the scene.",
        ),
        entry(
            Aside,
            Major,
            RelationshipDelta::new(0.02, 0.0, 0.02, 0.0),
            Some(vec![Act::Setup, Act::RisingAction, Act::FallingAction]),
            6,
            &["meanwhile", "whisper", "between", "us", "quietly", "corner"],
            "Pull a watcher into a side conversation.",
        ),
        entry(
            Tighten,
            Minor,
            RelationshipDelta::zero(),
            None,
            2,
            &["so", "well", "anyway", "quick", "short"],
            "Shorter lines, quicker pace.",
        ),
    ]
}
