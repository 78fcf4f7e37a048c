//! Read-only views of an episode for consoles and observers.

use serde::{Deserialize, Serialize};
use story_rules::{Act, CharacterId, NudgeKind, PairRecord, PairSnapshot};

use crate::episode::{EpisodeId, Nudge};

/// Threshold-crossing indicators for the spotlighted pair and the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    HighAttraction,
    HighTension,
    FragileTrust,
    Plateau,
    RecoveryActive,
}

const HIGH: f32 = 0.7;
const FRAGILE_TRUST: f32 = 0.25;
const FRAGILE_TENSION: f32 = 0.5;

impl Badge {
    pub fn label(self) -> &'static str {
        match self {
            Badge::HighAttraction => "high attraction",
            Badge::HighTension => "high tension",
            Badge::FragileTrust => "fragile trust",
            Badge::Plateau => "plateau",
            Badge::RecoveryActive => "recovery active",
        }
    }

    /// Badges earned by a pair record and the episode's counters.
    pub fn compute(pair: &PairRecord, plateauing: bool, recovery_active: bool) -> Vec<Badge> {
        let mut badges = Vec::new();
        if pair.attraction >= HIGH {
            badges.push(Badge::HighAttraction);
        }
        if pair.tension >= HIGH {
            badges.push(Badge::HighTension);
        }
        if pair.trust <= FRAGILE_TRUST && pair.tension >= FRAGILE_TENSION {
            badges.push(Badge::FragileTrust);
        }
        if plateauing {
            badges.push(Badge::Plateau);
        }
        if recovery_active {
            badges.push(Badge::RecoveryActive);
        }
        badges
    }
}

/// Summary returned by `start_episode` and embedded in every state read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: EpisodeId,
    pub vibe: String,
    pub setting: String,
    pub act: Act,
    pub act_path: Vec<Act>,
    pub scene_index: u32,
    pub exchange: u64,
    pub spotlight: (CharacterId, CharacterId),
    pub spotlight_names: (String, String),
    pub open_threads: Vec<String>,
    pub relationships: Vec<PairSnapshot>,
    pub plateau_counter: u32,
}

/// Cooldown left on one nudge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCooldown {
    pub kind: NudgeKind,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceStatus {
    /// Major nudges accepted within the current cadence window.
    pub majors_in_window: usize,
    pub major_cooldown_remaining: u64,
    pub recovery_active: bool,
    pub recovery_remaining: u32,
    pub scene_minor_nudges: u32,
    pub scene_major_nudges: u32,
    /// Kinds still cooling down. Kinds not listed are ready.
    pub cooldowns: Vec<KindCooldown>,
}

/// Full read-only state: summary, badges, pending nudges and cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub summary: EpisodeSummary,
    pub badges: Vec<Badge>,
    pub pending: Vec<Nudge>,
    pub cadence: CadenceStatus,
}

impl EpisodeState {
    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }
}
