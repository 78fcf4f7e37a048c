//! Narrative session - the caller-owned handle around one episode slot.
//!
//! Every operation locks the slot, so `tick` and `apply_nudge` never interleave on
//! the same episode. The lock is held across collaborator calls; those are the
//! only suspension points. Independent sessions share nothing.

use std::sync::Arc;
use std::time::Instant;
use story_rules::{CastMember, PolicyTables};
use tokio::sync::{mpsc, Mutex};

use crate::collaborators::{DialogueGenerator, SafetyFilter};
use crate::config::{EvaluationConfig, RuntimeConfig};
use crate::episode::{
    Episode, ImportedContext, Nudge, NudgeDecision, Rejection, TickReport, WrapReport,
};
use crate::error::NarrativeError;
use crate::evaluation::{
    DialogueSummary, Evaluation, EvaluationEngine, EvaluationSnapshot, NoveltyScorer,
    StructuralState,
};
use crate::events::TelemetryEvent;
use crate::export::EpisodeExport;
use crate::snapshot::{EpisodeState, EpisodeSummary};

struct SessionState {
    episode: Option<Episode>,
    evaluator: EvaluationEngine,
    subscriber: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

pub struct NarrativeSession {
    state: Mutex<SessionState>,
    generator: Arc<dyn DialogueGenerator>,
    safety: Arc<dyn SafetyFilter>,
    policy: Arc<PolicyTables>,
    config: RuntimeConfig,
}

impl NarrativeSession {
    /// Create a session with the standard policy tables and default config.
    pub fn new(generator: Arc<dyn DialogueGenerator>, safety: Arc<dyn SafetyFilter>) -> Self {
        let policy = Arc::new(PolicyTables::standard());
        Self {
            state: Mutex::new(SessionState {
                episode: None,
                evaluator: EvaluationEngine::new(policy.clone()),
                subscriber: None,
            }),
            generator,
            safety,
            policy,
            config: RuntimeConfig::default(),
        }
    }

    /// Use a custom runtime config. It is validated before the session accepts it.
    pub fn with_config(mut self, config: RuntimeConfig) -> Result<Self, NarrativeError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Use custom policy tables. They are validated before the session accepts them.
    pub fn with_policy(mut self, policy: PolicyTables) -> Result<Self, NarrativeError> {
        policy.validate()?;
        self.policy = Arc::new(policy);
        let policy = self.policy.clone();
        Ok(self.map_evaluator(|engine| engine.with_policy(policy)))
    }

    pub fn with_evaluation(self, config: EvaluationConfig) -> Self {
        self.map_evaluator(|engine| engine.with_config(config))
    }

    pub fn with_novelty(self, scorer: Arc<dyn NoveltyScorer>) -> Self {
        self.map_evaluator(|engine| engine.with_novelty(scorer))
    }

    fn map_evaluator(mut self, f: impl FnOnce(EvaluationEngine) -> EvaluationEngine) -> Self {
        let state = self.state.get_mut();
        let engine = std::mem::replace(
            &mut state.evaluator,
            EvaluationEngine::new(self.policy.clone()),
        );
        state.evaluator = f(engine);
        self
    }

    pub fn policy(&self) -> &PolicyTables {
        &self.policy
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Start a fresh episode, replacing any current one.
    pub async fn start_episode(
        &self,
        cast: Vec<CastMember>,
        vibe: impl Into<String>,
        setting: impl Into<String>,
        imported: Option<ImportedContext>,
    ) -> Result<EpisodeSummary, NarrativeError> {
        let mut episode = Episode::begin(
            cast,
            vibe,
            setting,
            imported,
            self.config.clone(),
            self.policy.clone(),
        )?;
        let summary = episode.summary();

        let mut state = self.state.lock().await;
        if let Some(sender) = &state.subscriber {
            episode.attach_stream(sender.clone());
        }
        if let Some(previous) = state.episode.replace(episode) {
            tracing::info!(episode = %previous.id(), "replacing active episode");
        }
        state.evaluator.clear_log();
        Ok(summary)
    }

    /// Advance exactly one exchange.
    pub async fn tick(&self) -> Result<TickReport, NarrativeError> {
        let mut state = self.state.lock().await;
        let episode = state
            .episode
            .as_mut()
            .ok_or(NarrativeError::NoActiveEpisode)?;

        let request = episode.generation_request();
        let started = Instant::now();
        let generated = self.generator.generate(&request).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match generated {
            Ok(lines) => episode.commit_exchange(lines, latency_ms),
            Err(error) if self.config.fallback_on_generation_error => {
                tracing::warn!(
                    episode = %episode.id(),
                    error = %error,
                    "generation failed, using fallback line"
                );
                Ok(episode.commit_fallback(&error.to_string(), latency_ms))
            }
            Err(error) => {
                tracing::warn!(episode = %episode.id(), error = %error, "generation failed");
                Err(error.into())
            }
        }
    }

    /// Submit a nudge. Rejection is a normal outcome and always carries a reason.
    pub async fn apply_nudge(&self, nudge: Nudge) -> NudgeDecision {
        let mut state = self.state.lock().await;
        let Some(episode) = state.episode.as_mut() else {
            return NudgeDecision::reject(Rejection::NoActiveEpisode, "no active episode");
        };

        if let Err(decision) = episode.screen_nudge(&nudge) {
            tracing::info!(kind = %nudge.kind, reason = %decision.reason, "nudge rejected");
            return decision;
        }

        let decision = match self.safety.check(&nudge.describe()).await {
            Ok(verdict) if verdict.safe => episode.accept_nudge(nudge),
            Ok(verdict) => NudgeDecision::reject(
                Rejection::Unsafe,
                verdict
                    .reason
                    .unwrap_or_else(|| "flagged by the safety filter".to_string()),
            ),
            Err(error) => NudgeDecision::reject(
                Rejection::SafetyUnavailable,
                format!("safety check unavailable: {}", error),
            ),
        };

        if decision.accepted {
            tracing::info!(episode = %episode.id(), reason = %decision.reason, "nudge accepted");
        } else {
            tracing::info!(episode = %episode.id(), reason = %decision.reason, "nudge rejected");
        }
        decision
    }

    pub async fn get_state(&self) -> Result<EpisodeState, NarrativeError> {
        let state = self.state.lock().await;
        state
            .episode
            .as_ref()
            .map(Episode::state)
            .ok_or(NarrativeError::NoActiveEpisode)
    }

    /// The inputs `evaluate` scores against.
    pub async fn evaluation_input(
        &self,
    ) -> Result<(StructuralState, DialogueSummary), NarrativeError> {
        let state = self.state.lock().await;
        let episode = state
            .episode
            .as_ref()
            .ok_or(NarrativeError::NoActiveEpisode)?;
        Ok((episode.structural_state(), episode.dialogue_summary()))
    }

    /// Ask the evaluation engine whether to intervene. Never mutates the episode.
    pub async fn evaluate(&self) -> Result<Evaluation, NarrativeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let episode = state
            .episode
            .as_ref()
            .ok_or(NarrativeError::NoActiveEpisode)?;
        Ok(state
            .evaluator
            .consider(&episode.structural_state(), &episode.dialogue_summary()))
    }

    pub async fn evaluation_log(&self) -> Vec<EvaluationSnapshot> {
        self.state.lock().await.evaluator.log().to_vec()
    }

    /// Close a plateaued scene and open a new one in the same act.
    pub async fn wrap_scene(&self) -> Result<WrapReport, NarrativeError> {
        let mut state = self.state.lock().await;
        state
            .episode
            .as_mut()
            .ok_or(NarrativeError::NoActiveEpisode)?
            .wrap_scene()
    }

    /// Export the active episode without stopping it.
    pub async fn export(&self) -> Result<EpisodeExport, NarrativeError> {
        let state = self.state.lock().await;
        let episode = state
            .episode
            .as_ref()
            .ok_or(NarrativeError::NoActiveEpisode)?;
        Ok(episode.export(state.evaluator.log().to_vec()))
    }

    /// Stop the active episode and hand back its export.
    pub async fn stop_episode(&self) -> Result<EpisodeExport, NarrativeError> {
        let mut state = self.state.lock().await;
        let mut episode = state.episode.take().ok_or(NarrativeError::NoActiveEpisode)?;
        episode.stop();
        Ok(episode.export(state.evaluator.log().to_vec()))
    }

    /// Discard the active episode and the evaluation log.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if let Some(episode) = state.episode.take() {
            tracing::info!(episode = %episode.id(), "episode discarded");
        }
        state.evaluator.clear_log();
    }

    /// Stream telemetry as it is emitted. Replaces any earlier subscriber.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<TelemetryEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        if let Some(episode) = state.episode.as_mut() {
            episode.attach_stream(sender.clone());
        }
        state.subscriber = Some(sender);
        receiver
    }
}
