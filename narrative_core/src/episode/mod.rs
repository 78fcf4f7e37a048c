//! Episode - the authoritative state machine for one story run.
//!
//! An episode owns everything that changes while a story plays:
//! - **Structure**: the act path, the active scene and the closed scenes behind it
//! - **Relationships**: the pair graph, updated from every spoken line
//! - **Momentum**: the line window, plateau counter and callback threads
//! - **Steering**: pending nudges and the cadence controller
//!
//! All methods here are synchronous. Async collaborator calls happen in the session
//! before a commit, so an exchange is either committed whole or not at all.

mod cadence;
mod checkpoint;
mod line;
mod plateau;
mod scene;

pub use cadence::*;
pub use checkpoint::*;
pub use line::*;
pub use plateau::*;
pub use scene::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use story_rules::{
    Act, CastMember, CharacterId, Intensity, NudgeKind, PairRecord, PolicyTables,
    RelationshipGraph, SceneEndReason,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::collaborators::GeneratedLine;
use crate::config::{ContentConstraints, RuntimeConfig};
use crate::context::{BiasFlags, GenerationRequest};
use crate::error::NarrativeError;
use crate::evaluation::{CallbackSummary, DialogueSummary, EvaluationSnapshot, StructuralState};
use crate::events::{metrics, EventKind, TelemetryEmitter, TelemetryEvent};
use crate::export::{CastRecord, EpisodeExport, EpisodeRecord, SceneRecord, TurnRecord};
use crate::snapshot::{Badge, CadenceStatus, EpisodeState, EpisodeSummary, KindCooldown};
use crate::threads::ThreadLedger;

/// Unique identifier for episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub Uuid);

impl EpisodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pair record carried over from an earlier session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportedPair {
    pub a: CharacterId,
    pub b: CharacterId,
    pub record: PairRecord,
}

/// Optional state to seed a new episode with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportedContext {
    pub pairs: Vec<ImportedPair>,
    /// Callback tokens that start out open.
    pub callbacks: Vec<String>,
    /// Resume at this act instead of act 1.
    pub starting_act: Option<Act>,
    pub constraints: Option<ContentConstraints>,
}

impl ImportedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, a: CharacterId, b: CharacterId, record: PairRecord) -> Self {
        self.pairs.push(ImportedPair { a, b, record });
        self
    }

    pub fn with_callback(mut self, token: impl Into<String>) -> Self {
        self.callbacks.push(token.into());
        self
    }

    pub fn starting_at(mut self, act: Act) -> Self {
        self.starting_act = Some(act);
        self
    }

    pub fn with_constraints(mut self, constraints: ContentConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Exchange index the tick committed.
    pub exchange: u64,
    pub lines: Vec<SpokenLine>,
    /// At most one per tick.
    pub transitions: Vec<ActTransition>,
    /// Flushed telemetry, in emission order.
    pub events: Vec<TelemetryEvent>,
}

/// What a scene wrap produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapReport {
    pub transition: ActTransition,
    pub events: Vec<TelemetryEvent>,
}

const FALLBACK_TEXT: &str = "(A pause. Neither of them finds the words.)";

#[derive(Debug)]
pub struct Episode {
    id: EpisodeId,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    cast: Vec<CastMember>,
    vibe: String,
    setting: String,
    constraints: ContentConstraints,
    config: RuntimeConfig,
    policy: Arc<PolicyTables>,

    act_path: Vec<Act>,
    scene: Scene,
    closed_scenes: Vec<Scene>,
    transitions: Vec<ActTransition>,

    graph: RelationshipGraph,
    lines: LineWindow,
    turns: VecDeque<TurnRecord>,
    exchange: u64,

    plateau: PlateauDetector,
    cadence: CadenceController,
    pending: Vec<Nudge>,
    threads: ThreadLedger,
    telemetry: TelemetryEmitter,
}

impl Episode {
    /// Start a new episode. The first two cast members share the spotlight.
    pub fn begin(
        cast: Vec<CastMember>,
        vibe: impl Into<String>,
        setting: impl Into<String>,
        imported: Option<ImportedContext>,
        config: RuntimeConfig,
        policy: Arc<PolicyTables>,
    ) -> Result<Self, NarrativeError> {
        let mut ids: Vec<CharacterId> = Vec::with_capacity(cast.len());
        for member in &cast {
            if !ids.contains(&member.id) {
                ids.push(member.id);
            }
        }
        if ids.len() < 2 {
            return Err(NarrativeError::NotEnoughCharacters { found: ids.len() });
        }

        let imported = imported.unwrap_or_default();
        let mut graph = RelationshipGraph::for_cast(&ids);
        for pair in &imported.pairs {
            for id in [pair.a, pair.b] {
                if !ids.contains(&id) {
                    return Err(NarrativeError::UnknownCharacter(id.to_string()));
                }
            }
            if pair.a == pair.b {
                return Err(NarrativeError::UnknownCharacter(format!(
                    "{} cannot be paired with itself",
                    pair.a
                )));
            }
            graph.set(pair.a, pair.b, pair.record);
        }

        let mut threads = ThreadLedger::new();
        for token in &imported.callbacks {
            threads.open(token, 0);
        }

        let id = EpisodeId::new();
        let act = imported.starting_act.unwrap_or(Act::Setup);
        let constraints = imported.constraints.unwrap_or(config.content);
        let scene = Scene::opening(id, act, (ids[0], ids[1]));

        tracing::info!(
            episode = %id,
            cast = cast.len(),
            act = act.number(),
            open_threads = threads.open_count(),
            "episode started"
        );

        Ok(Self {
            id,
            started_at: scene.started_at,
            ended_at: None,
            cast,
            vibe: vibe.into(),
            setting: setting.into(),
            constraints,
            lines: LineWindow::new(config.line_window),
            plateau: PlateauDetector::new(config.plateau),
            cadence: CadenceController::new(config.cadence),
            config,
            policy,
            act_path: vec![act],
            scene,
            closed_scenes: Vec::new(),
            transitions: Vec::new(),
            graph,
            turns: VecDeque::new(),
            exchange: 0,
            pending: Vec::new(),
            threads,
            telemetry: TelemetryEmitter::new(id),
        })
    }

    pub fn id(&self) -> EpisodeId {
        self.id
    }

    pub fn act(&self) -> Act {
        self.scene.act
    }

    pub fn act_path(&self) -> &[Act] {
        &self.act_path
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn closed_scenes(&self) -> &[Scene] {
        &self.closed_scenes
    }

    pub fn transitions(&self) -> &[ActTransition] {
        &self.transitions
    }

    /// Completed exchanges.
    pub fn exchange(&self) -> u64 {
        self.exchange
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn lines(&self) -> &LineWindow {
        &self.lines
    }

    pub fn pending(&self) -> &[Nudge] {
        &self.pending
    }

    pub fn threads(&self) -> &ThreadLedger {
        &self.threads
    }

    pub fn cadence(&self) -> &CadenceController {
        &self.cadence
    }

    pub fn plateau(&self) -> &PlateauDetector {
        &self.plateau
    }

    pub fn constraints(&self) -> &ContentConstraints {
        &self.constraints
    }

    pub fn member(&self, id: CharacterId) -> Option<&CastMember> {
        self.cast.iter().find(|c| c.id == id)
    }

    /// Route telemetry to a streaming consumer as it is emitted.
    pub fn attach_stream(&mut self, sender: mpsc::UnboundedSender<TelemetryEvent>) {
        self.telemetry.attach(sender);
    }

    /// Current record of the spotlighted pair.
    pub fn spotlight_record(&self) -> PairRecord {
        let (a, b) = self.scene.spotlight;
        self.graph.get(a, b).copied().unwrap_or_default()
    }

    fn name_of(&self, id: CharacterId) -> String {
        self.member(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Assemble the request for the next exchange from the current state.
    pub fn generation_request(&self) -> GenerationRequest {
        let spotlight = self.scene.spotlight;
        let watchers: Vec<CharacterId> = self
            .cast
            .iter()
            .map(|c| c.id)
            .filter(|id| *id != spotlight.0 && *id != spotlight.1)
            .collect();

        let bias = BiasFlags::derive(
            &self.pending,
            &self.policy,
            self.cadence.recovery_remaining(),
            spotlight,
            &watchers,
            self.constraints.max_line_seconds,
        );

        // Alternate: whoever spoke last goes second.
        let speakers = match self.lines.last(1).first() {
            Some(last) if last.speaker == spotlight.0 => vec![spotlight.1, spotlight.0],
            _ => vec![spotlight.0, spotlight.1],
        };

        GenerationRequest {
            episode: self.id,
            exchange: self.exchange,
            act: self.scene.act,
            scene_index: self.scene.index,
            vibe: self.vibe.clone(),
            setting: self.setting.clone(),
            constraints: self.constraints,
            cast: self.cast.clone(),
            spotlight,
            speakers,
            pair: self.spotlight_record(),
            recent_lines: self.lines.iter().cloned().collect(),
            bias,
            open_callbacks: self.threads.open_tokens(),
        }
    }

    /// Commit one exchange of generated lines.
    ///
    /// Every line is validated before anything changes; an invalid line leaves the
    /// episode untouched.
    pub fn commit_exchange(
        &mut self,
        generated: Vec<GeneratedLine>,
        latency_ms: u64,
    ) -> Result<TickReport, NarrativeError> {
        if generated.is_empty() {
            return Err(NarrativeError::InvalidLine(
                "generator returned no lines".to_string(),
            ));
        }
        for line in &generated {
            if self.member(line.speaker).is_none() {
                return Err(NarrativeError::UnknownCharacter(line.speaker.to_string()));
            }
            if line.text.trim().is_empty() {
                return Err(NarrativeError::InvalidLine(format!(
                    "empty line from {}",
                    self.name_of(line.speaker)
                )));
            }
            if !line.deltas.is_finite() {
                return Err(NarrativeError::InvalidLine(format!(
                    "non-finite deltas from {}",
                    self.name_of(line.speaker)
                )));
            }
        }

        Ok(self.commit(generated, latency_ms, false))
    }

    /// Commit a clearly-marked, zero-delta line in place of failed generation.
    pub fn commit_fallback(&mut self, reason: &str, latency_ms: u64) -> TickReport {
        let speaker = self.generation_request().speakers[0];
        let line = GeneratedLine::new(speaker, FALLBACK_TEXT)
            .with_rationale(format!("fallback: {}", reason));
        self.commit(vec![line], latency_ms, true)
    }

    fn commit(
        &mut self,
        generated: Vec<GeneratedLine>,
        latency_ms: u64,
        fallback: bool,
    ) -> TickReport {
        let exchange = self.exchange;
        self.telemetry.emit(
            exchange,
            EventKind::TurnStart {
                act: self.scene.act,
                scene_index: self.scene.index,
            },
        );

        let mut spoken = Vec::with_capacity(generated.len());
        let mut transition: Option<ActTransition> = None;
        let mut plateau_counts = Vec::new();
        let mut spoken_seconds = 0.0_f32;

        for generated_line in generated {
            let line = SpokenLine {
                at: Utc::now(),
                exchange,
                speaker: generated_line.speaker,
                speaker_name: self.name_of(generated_line.speaker),
                duration_secs: estimate_duration(
                    &generated_line.text,
                    self.config.words_per_second,
                    self.constraints.max_line_seconds,
                ),
                text: generated_line.text,
                deltas: generated_line.deltas,
                latency_ms: if generated_line.latency_ms > 0 {
                    generated_line.latency_ms
                } else {
                    latency_ms
                },
                rationale: generated_line.rationale,
                fallback,
            };

            let (a, b) = self.scene.spotlight;
            let ripple = self.graph.apply_line(a, b, &line.deltas);
            if ripple.pairs_touched > 0 {
                tracing::trace!(episode = %self.id, pairs = ripple.pairs_touched, "ripple applied");
            }

            for token in &generated_line.opens {
                self.threads.open(token, exchange);
            }
            for token in &generated_line.recalls {
                if !self.threads.recall(token, exchange) {
                    tracing::debug!(
                        episode = %self.id,
                        token = %token,
                        "recall of unknown callback"
                    );
                }
            }
            for token in &generated_line.resolves {
                if self.threads.resolve(token) {
                    tracing::debug!(episode = %self.id, token = %token, "callback resolved");
                }
            }

            self.lines.push(line.clone());
            self.scene.record_line();
            self.record_turn(&line);
            self.telemetry.emit(exchange, EventKind::TurnEnd { line: line.clone() });

            if transition.is_none() {
                transition = self.check_checkpoint(exchange);
            }

            let window = self.lines.last(self.config.plateau.window);
            if let PlateauObservation::Stalled { counter } = self.plateau.observe(&window) {
                plateau_counts.push(counter);
            }

            spoken_seconds += line.duration_secs;
            spoken.push(line);
        }

        if let Some(t) = &transition {
            self.telemetry.emit(
                exchange,
                EventKind::SceneTransition {
                    from_act: t.from_act,
                    from_scene: t.from_scene,
                    to_act: t.to_act,
                    to_scene: t.to_scene,
                    reason: t.reason,
                },
            );
        }

        for counter in plateau_counts {
            self.telemetry
                .metric(exchange, metrics::PLATEAU_COUNTER, counter as f64);
        }
        self.telemetry
            .metric(exchange, metrics::GENERATION_LATENCY_MS, latency_ms as f64);
        self.telemetry
            .metric(exchange, metrics::SPOKEN_SECONDS, spoken_seconds as f64);

        self.pending.clear();
        self.cadence.finish_exchange();
        self.telemetry.metric(
            exchange,
            metrics::RECOVERY_REMAINING,
            self.cadence.recovery_remaining() as f64,
        );
        self.exchange += 1;

        TickReport {
            exchange,
            lines: spoken,
            transitions: transition.into_iter().collect(),
            events: self.telemetry.flush(),
        }
    }

    fn record_turn(&mut self, line: &SpokenLine) {
        self.turns.push_back(TurnRecord::from_line(line, &self.scene));
        while self.turns.len() > self.config.turn_log_capacity.max(1) {
            self.turns.pop_front();
        }
    }

    fn check_checkpoint(&mut self, exchange: u64) -> Option<ActTransition> {
        let pair = self.spotlight_record();
        // Evidence never reaches back past the start of the active scene.
        let in_scene = self.scene.lines as usize;
        let recent = self.lines.last(self.config.checkpoint_window.min(in_scene));
        let (name, to) = {
            let rule = detect(
                &self.policy,
                self.scene.act,
                &pair,
                &recent,
                self.threads.open_count(),
            )?;
            (rule.name.clone(), rule.to)
        };
        Some(self.change_scene(exchange, to, SceneEndReason::Checkpoint, Some(name)))
    }

    /// Close the active scene and swap in its successor in one step.
    fn change_scene(
        &mut self,
        exchange: u64,
        to: Act,
        reason: SceneEndReason,
        checkpoint: Option<String>,
    ) -> ActTransition {
        let at = Utc::now();
        let next = self.scene.successor(to, at);
        let mut closed = std::mem::replace(&mut self.scene, next);
        closed.close(reason, at);

        let transition = ActTransition {
            exchange,
            from_act: closed.act,
            from_scene: closed.index,
            to_act: to,
            to_scene: self.scene.index,
            reason,
            checkpoint,
        };

        self.closed_scenes.push(closed);
        self.act_path.push(to);
        self.plateau.reset();
        self.transitions.push(transition.clone());

        tracing::info!(
            episode = %self.id,
            from = transition.from_act.number(),
            to = transition.to_act.number(),
            scene = transition.to_scene,
            reason = %reason,
            "scene changed"
        );
        transition
    }

    /// Check a nudge against the act gate and the cadence. Safety is checked separately.
    pub fn screen_nudge(&self, nudge: &Nudge) -> Result<(), NudgeDecision> {
        let act = self.scene.act;
        if self
            .policy
            .gate(act)
            .map(|g| g.is_blocked(nudge.kind))
            .unwrap_or(false)
        {
            return Err(NudgeDecision::reject(
                Rejection::BlockedInAct,
                format!("{} is blocked in {}", nudge.kind, act),
            ));
        }
        if !self.policy.permits(act, nudge.kind) {
            return Err(NudgeDecision::reject(
                Rejection::NotAllowedInAct,
                format!("{} is not allowed in {}", nudge.kind, act),
            ));
        }
        if self.effective_intensity(nudge) == Intensity::Major {
            self.cadence
                .check_major(self.exchange)
                .map_err(|reason| NudgeDecision::reject(Rejection::Cadence, reason))?;
        }
        Ok(())
    }

    /// The stronger of the requested intensity and the kind's catalog class.
    pub fn effective_intensity(&self, nudge: &Nudge) -> Intensity {
        let catalog = self.policy.definition(nudge.kind).map(|d| d.intensity);
        if nudge.is_major() || catalog == Some(Intensity::Major) {
            Intensity::Major
        } else {
            Intensity::Minor
        }
    }

    /// Queue a screened nudge as a bias for the next tick.
    pub fn accept_nudge(&mut self, mut nudge: Nudge) -> NudgeDecision {
        nudge.intensity = self.effective_intensity(&nudge);
        self.cadence.record(&nudge, self.exchange);
        self.scene.record_nudge(nudge.intensity);
        self.telemetry.emit(
            self.exchange,
            EventKind::NudgeApplied {
                nudge: nudge.clone(),
            },
        );

        let reason = if nudge.is_major() {
            format!(
                "{} accepted for the next exchange; recovery bias for {} exchange(s)",
                nudge.kind,
                self.cadence.recovery_remaining()
            )
        } else {
            format!("{} accepted for the next exchange", nudge.kind)
        };
        self.pending.push(nudge);
        NudgeDecision::accept(reason)
    }

    /// Close the active scene as a plateau wrap and open a new one in the same act.
    pub fn wrap_scene(&mut self) -> Result<WrapReport, NarrativeError> {
        if !self.plateau.is_plateauing() {
            return Err(NarrativeError::WrapNotWarranted {
                counter: self.plateau.counter(),
                threshold: self.plateau.threshold(),
            });
        }

        let exchange = self.exchange;
        let act = self.scene.act;
        let transition = self.change_scene(exchange, act, SceneEndReason::PlateauWrap, None);
        self.telemetry.emit(
            exchange,
            EventKind::SceneTransition {
                from_act: transition.from_act,
                from_scene: transition.from_scene,
                to_act: transition.to_act,
                to_scene: transition.to_scene,
                reason: transition.reason,
            },
        );

        Ok(WrapReport {
            transition,
            events: self.telemetry.flush(),
        })
    }

    /// End the episode, closing the active scene.
    pub fn stop(&mut self) {
        let at = Utc::now();
        if self.scene.is_open() {
            self.scene.close(SceneEndReason::ExternalStop, at);
        }
        self.ended_at = Some(at);
        tracing::info!(episode = %self.id, exchanges = self.exchange, "episode stopped");
    }

    pub fn summary(&self) -> EpisodeSummary {
        let (a, b) = self.scene.spotlight;
        EpisodeSummary {
            episode: self.id,
            vibe: self.vibe.clone(),
            setting: self.setting.clone(),
            act: self.scene.act,
            act_path: self.act_path.clone(),
            scene_index: self.scene.index,
            exchange: self.exchange,
            spotlight: (a, b),
            spotlight_names: (self.name_of(a), self.name_of(b)),
            open_threads: self.threads.open_tokens(),
            relationships: self.graph.snapshot(),
            plateau_counter: self.plateau.counter(),
        }
    }

    fn cooldowns(&self) -> BTreeMap<NudgeKind, u64> {
        self.policy
            .catalog
            .iter()
            .filter_map(|d| {
                let remaining = self
                    .cadence
                    .cooldown_remaining(d.kind, d.cooldown, self.exchange);
                (remaining > 0).then_some((d.kind, remaining))
            })
            .collect()
    }

    pub fn cadence_status(&self) -> CadenceStatus {
        CadenceStatus {
            majors_in_window: self.cadence.majors_in_window(self.exchange),
            major_cooldown_remaining: self.cadence.major_cooldown_remaining(self.exchange),
            recovery_active: self.cadence.recovery_active(),
            recovery_remaining: self.cadence.recovery_remaining(),
            scene_minor_nudges: self.scene.minor_nudges,
            scene_major_nudges: self.scene.major_nudges,
            cooldowns: self
                .cooldowns()
                .into_iter()
                .map(|(kind, remaining)| KindCooldown { kind, remaining })
                .collect(),
        }
    }

    pub fn state(&self) -> EpisodeState {
        EpisodeState {
            summary: self.summary(),
            badges: Badge::compute(
                &self.spotlight_record(),
                self.plateau.is_plateauing(),
                self.cadence.recovery_active(),
            ),
            pending: self.pending.clone(),
            cadence: self.cadence_status(),
        }
    }

    pub fn structural_state(&self) -> StructuralState {
        StructuralState {
            act: self.scene.act,
            scene_index: self.scene.index,
            exchange: self.exchange,
            pair: self.spotlight_record(),
            plateau_counter: self.plateau.counter(),
            plateau_threshold: self.plateau.threshold(),
            recovery_active: self.cadence.recovery_active(),
            major_cooldown_remaining: self.cadence.major_cooldown_remaining(self.exchange),
            cooldowns: self.cooldowns(),
            usage: self
                .cadence
                .usage()
                .iter()
                .map(|(kind, uses)| (*kind, *uses))
                .collect(),
            callbacks: self
                .threads
                .open_threads()
                .map(|t| CallbackSummary {
                    token: t.token.clone(),
                    dormant_for: t.dormant_for(self.exchange),
                })
                .collect(),
            pg13: self.constraints.pg13,
        }
    }

    /// Recent dialogue as the evaluator sees it.
    pub fn dialogue_summary(&self) -> DialogueSummary {
        let window = self
            .config
            .plateau
            .window
            .max(self.config.checkpoint_window);
        DialogueSummary::from_lines(self.lines.last(window))
    }

    pub fn export(&self, evaluations: Vec<EvaluationSnapshot>) -> EpisodeExport {
        let mut scenes: Vec<SceneRecord> =
            self.closed_scenes.iter().map(SceneRecord::from).collect();
        scenes.push(SceneRecord::from(&self.scene));

        EpisodeExport {
            episode: EpisodeRecord {
                id: self.id,
                started_at: self.started_at,
                ended_at: self.ended_at,
                vibe: self.vibe.clone(),
                setting: self.setting.clone(),
                act_path: self.act_path.clone(),
                constraints: self.constraints,
                exchanges: self.exchange,
            },
            cast: self.cast.iter().map(CastRecord::from).collect(),
            scenes,
            turns: self.turns.iter().cloned().collect(),
            relationships: self.graph.snapshot(),
            threads: self.threads.all().to_vec(),
            evaluations,
        }
    }
}
