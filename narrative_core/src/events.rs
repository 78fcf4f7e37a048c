//! Telemetry events - the append-only record of everything an episode does.
//!
//! Events are buffered per episode and handed back in order as a batch from every
//! tick. A streaming consumer can additionally subscribe and receive each event as
//! it is emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use story_rules::{Act, SceneEndReason};
use tokio::sync::mpsc;

use crate::episode::{EpisodeId, Nudge, SpokenLine};

/// Well-known metric names.
pub mod metrics {
    pub const PLATEAU_COUNTER: &str = "plateau_counter";
    pub const GENERATION_LATENCY_MS: &str = "generation_latency_ms";
    pub const SPOKEN_SECONDS: &str = "spoken_seconds";
    pub const RECOVERY_REMAINING: &str = "recovery_remaining";
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TurnStart {
        act: Act,
        scene_index: u32,
    },
    TurnEnd {
        line: SpokenLine,
    },
    NudgeApplied {
        nudge: Nudge,
    },
    SceneTransition {
        from_act: Act,
        from_scene: u32,
        to_act: Act,
        to_scene: u32,
        reason: SceneEndReason,
    },
    MetricTick {
        name: String,
        value: f64,
    },
}

/// One immutable, episode-scoped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Position in the episode's stream, starting at 0.
    pub seq: u64,
    pub episode: EpisodeId,
    pub at: DateTime<Utc>,
    /// Exchange index the event belongs to.
    pub exchange: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TelemetryEvent {
    pub fn is_scene_transition(&self) -> bool {
        matches!(self.kind, EventKind::SceneTransition { .. })
    }
}

/// Per-episode event buffer with an optional streaming tap.
#[derive(Debug)]
pub struct TelemetryEmitter {
    episode: EpisodeId,
    next_seq: u64,
    buffer: Vec<TelemetryEvent>,
    stream: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl TelemetryEmitter {
    pub fn new(episode: EpisodeId) -> Self {
        Self {
            episode,
            next_seq: 0,
            buffer: Vec::new(),
            stream: None,
        }
    }

    /// Route every future event to a streaming consumer as well.
    pub fn attach(&mut self, sender: mpsc::UnboundedSender<TelemetryEvent>) {
        self.stream = Some(sender);
    }

    pub fn emit(&mut self, exchange: u64, kind: EventKind) {
        let event = TelemetryEvent {
            seq: self.next_seq,
            episode: self.episode,
            at: Utc::now(),
            exchange,
            kind,
        };
        self.next_seq += 1;

        if let Some(stream) = &self.stream {
            if stream.send(event.clone()).is_err() {
                tracing::debug!(episode = %self.episode, "telemetry subscriber dropped");
                self.stream = None;
            }
        }
        self.buffer.push(event);
    }

    pub fn metric(&mut self, exchange: u64, name: &str, value: f64) {
        self.emit(
            exchange,
            EventKind::MetricTick {
                name: name.to_string(),
                value,
            },
        );
    }

    /// Drain the buffered events, oldest first.
    pub fn flush(&mut self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut self.buffer)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
