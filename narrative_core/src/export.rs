//! Flat, serializable records for storage outside the runtime.
//!
//! This crate never persists anything itself; it only hands these out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use story_rules::{Act, CastMember, CharacterId, PairSnapshot, SceneEndReason};

use crate::config::ContentConstraints;
use crate::episode::{EpisodeId, Scene, SceneId, SpokenLine};
use crate::error::NarrativeError;
use crate::evaluation::EvaluationSnapshot;
use crate::threads::CallbackThread;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: EpisodeId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub vibe: String,
    pub setting: String,
    pub act_path: Vec<Act>,
    pub constraints: ContentConstraints,
    /// Completed exchanges.
    pub exchanges: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: SceneId,
    pub episode: EpisodeId,
    pub act: Act,
    pub index: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub spotlight_a: CharacterId,
    pub spotlight_b: CharacterId,
    pub minor_nudges: u32,
    pub major_nudges: u32,
    pub lines: u32,
    pub end_reason: Option<SceneEndReason>,
}

impl From<&Scene> for SceneRecord {
    fn from(scene: &Scene) -> Self {
        Self {
            id: scene.id,
            episode: scene.episode,
            act: scene.act,
            index: scene.index,
            started_at: scene.started_at,
            ended_at: scene.ended_at,
            spotlight_a: scene.spotlight.0,
            spotlight_b: scene.spotlight.1,
            minor_nudges: scene.minor_nudges,
            major_nudges: scene.major_nudges,
            lines: scene.lines,
            end_reason: scene.end_reason,
        }
    }
}

/// One spoken line with its scene context, deltas flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub episode: EpisodeId,
    pub scene: SceneId,
    pub scene_index: u32,
    pub act: Act,
    pub exchange: u64,
    pub at: DateTime<Utc>,
    pub speaker: CharacterId,
    pub speaker_name: String,
    pub text: String,
    pub duration_secs: f32,
    pub attraction_delta: f32,
    pub trust_delta: f32,
    pub tension_delta: f32,
    pub comfort_delta: f32,
    pub latency_ms: u64,
    pub fallback: bool,
}

impl TurnRecord {
    pub fn from_line(line: &SpokenLine, scene: &Scene) -> Self {
        Self {
            episode: scene.episode,
            scene: scene.id,
            scene_index: scene.index,
            act: scene.act,
            exchange: line.exchange,
            at: line.at,
            speaker: line.speaker,
            speaker_name: line.speaker_name.clone(),
            text: line.text.clone(),
            duration_secs: line.duration_secs,
            attraction_delta: line.deltas.attraction,
            trust_delta: line.deltas.trust,
            tension_delta: line.deltas.tension,
            comfort_delta: line.deltas.comfort,
            latency_ms: line.latency_ms,
            fallback: line.fallback,
        }
    }
}

/// Everything an episode produced, ready to hand to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeExport {
    pub episode: EpisodeRecord,
    pub cast: Vec<CastRecord>,
    pub scenes: Vec<SceneRecord>,
    pub turns: Vec<TurnRecord>,
    pub relationships: Vec<PairSnapshot>,
    pub threads: Vec<CallbackThread>,
    pub evaluations: Vec<EvaluationSnapshot>,
}

/// Cast member identity, without capability data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastRecord {
    pub id: CharacterId,
    pub name: String,
    pub archetype: Option<String>,
}

impl From<&CastMember> for CastRecord {
    fn from(member: &CastMember) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            archetype: member.archetype.clone(),
        }
    }
}

impl EpisodeExport {
    pub fn to_json(&self) -> Result<String, NarrativeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, NarrativeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(source: &str) -> Result<Self, NarrativeError> {
        Ok(serde_json::from_str(source)?)
    }
}
