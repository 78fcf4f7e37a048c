//! Story mechanics: acts, nudge kinds, intensities and scene end reasons.

use serde::{Deserialize, Serialize};

/// The five sequential dramatic phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Act {
    Setup,
    RisingAction,
    Climax,
    FallingAction,
    Resolution,
}

impl Act {
    pub const ALL: [Act; 5] = [
        Act::Setup,
        Act::RisingAction,
        Act::Climax,
        Act::FallingAction,
        Act::Resolution,
    ];

    /// Act number, 1 through 5.
    pub fn number(self) -> u8 {
        match self {
            Act::Setup => 1,
            Act::RisingAction => 2,
            Act::Climax => 3,
            Act::FallingAction => 4,
            Act::Resolution => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Act> {
        match number {
            1 => Some(Act::Setup),
            2 => Some(Act::RisingAction),
            3 => Some(Act::Climax),
            4 => Some(Act::FallingAction),
            5 => Some(Act::Resolution),
            _ => None,
        }
    }

    /// The act that follows this one, if any.
    pub fn next(self) -> Option<Act> {
        Act::from_number(self.number() + 1)
    }

    pub fn is_final(self) -> bool {
        self == Act::Resolution
    }

    pub fn name(self) -> &'static str {
        match self {
            Act::Setup => "Setup",
            Act::RisingAction => "Rising Action",
            Act::Climax => "Climax",
            Act::FallingAction => "Falling Action",
            Act::Resolution => "Resolution",
        }
    }
}

impl std::fmt::Display for Act {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Act {} ({})", self.number(), self.name())
    }
}

/// Every steering move the runtime knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    /// Flirtation or a charged look.
    Spark,
    /// Reassurance, warmth.
    Comfort,
    /// Clear up a misunderstanding.
    Clarify,
    /// A character reveals something personal.
    SelfDisclosure,
    /// Introduce a threat to the relationship.
    RaiseStakes,
    /// Bring back a dormant callback token.
    RecallCallback,
    /// Pull a watcher into a side conversation.
    Aside,
    /// Shorten lines and quicken the pace.
    Tighten,
}

impl NudgeKind {
    pub const ALL: [NudgeKind; 8] = [
        NudgeKind::Spark,
        NudgeKind::Comfort,
        NudgeKind::Clarify,
        NudgeKind::SelfDisclosure,
        NudgeKind::RaiseStakes,
        NudgeKind::RecallCallback,
        NudgeKind::Aside,
        NudgeKind::Tighten,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NudgeKind::Spark => "spark",
            NudgeKind::Comfort => "comfort",
            NudgeKind::Clarify => "clarify",
            NudgeKind::SelfDisclosure => "self_disclosure",
            NudgeKind::RaiseStakes => "raise_stakes",
            NudgeKind::RecallCallback => "recall_callback",
            NudgeKind::Aside => "aside",
            NudgeKind::Tighten => "tighten",
        }
    }

    /// Moves still permitted while a post-major recovery window is open.
    pub fn is_recovery_move(self) -> bool {
        matches!(self, NudgeKind::Comfort | NudgeKind::Clarify)
    }
}

impl std::fmt::Display for NudgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How disruptive a nudge is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Minor,
    Major,
}

/// Who asked for a nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeSource {
    /// A human watching the episode.
    Observer,
    /// A scripted or rule-driven trigger.
    Automatic,
    /// The evaluation engine's recommendation.
    Evaluator,
}

/// Why a scene closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneEndReason {
    Checkpoint,
    PlateauWrap,
    ExternalStop,
}

impl SceneEndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneEndReason::Checkpoint => "checkpoint",
            SceneEndReason::PlateauWrap => "plateau_wrap",
            SceneEndReason::ExternalStop => "external_stop",
        }
    }
}

impl std::fmt::Display for SceneEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_act_sequence() {
        assert_eq!(Act::Setup.next(), Some(Act::RisingAction));
        assert_eq!(Act::FallingAction.next(), Some(Act::Resolution));
        assert_eq!(Act::Resolution.next(), None);
        assert!(Act::Setup < Act::Climax);
    }

    #[test]
    fn test_act_numbers_round_trip() {
        for act in Act::ALL {
            assert_eq!(Act::from_number(act.number()), Some(act));
        }
        assert_eq!(Act::from_number(0), None);
        assert_eq!(Act::from_number(6), None);
    }

    #[test]
    fn test_nudge_kind_names_match_serde() {
        for kind in NudgeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_recovery_moves() {
        assert!(NudgeKind::Comfort.is_recovery_move());
        assert!(NudgeKind::Clarify.is_recovery_move());
        assert!(!NudgeKind::RaiseStakes.is_recovery_move());
    }
}
