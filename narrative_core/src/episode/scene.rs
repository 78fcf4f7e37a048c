//! Scenes - contiguous segments of one act.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use story_rules::{Act, CharacterId, Intensity, SceneEndReason};
use uuid::Uuid;

use super::EpisodeId;

/// Unique identifier for scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(pub Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

/// One scene. Open while `ended_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub episode: EpisodeId,
    pub act: Act,
    /// Position of the scene within the episode, starting at 0.
    pub index: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub spotlight: (CharacterId, CharacterId),
    pub minor_nudges: u32,
    pub major_nudges: u32,
    /// Lines spoken since the scene opened.
    pub lines: u32,
    pub end_reason: Option<SceneEndReason>,
}

impl Scene {
    /// Open the first scene of an episode.
    pub fn opening(episode: EpisodeId, act: Act, spotlight: (CharacterId, CharacterId)) -> Self {
        Self {
            id: SceneId::new(),
            episode,
            act,
            index: 0,
            started_at: Utc::now(),
            ended_at: None,
            spotlight,
            minor_nudges: 0,
            major_nudges: 0,
            lines: 0,
            end_reason: None,
        }
    }

    /// Build the scene that follows this one, keeping the spotlight.
    pub fn successor(&self, act: Act, at: DateTime<Utc>) -> Self {
        Self {
            id: SceneId::new(),
            episode: self.episode,
            act,
            index: self.index + 1,
            started_at: at,
            ended_at: None,
            spotlight: self.spotlight,
            minor_nudges: 0,
            major_nudges: 0,
            lines: 0,
            end_reason: None,
        }
    }

    pub fn close(&mut self, reason: SceneEndReason, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.end_reason = Some(reason);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn record_line(&mut self) {
        self.lines += 1;
    }

    pub fn record_nudge(&mut self, intensity: Intensity) {
        match intensity {
            Intensity::Minor => self.minor_nudges += 1,
            Intensity::Major => self.major_nudges += 1,
        }
    }
}
