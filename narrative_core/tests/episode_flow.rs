//! Episode flow tests driven through a session with a scripted generator.
//!
//! These tests verify the structural guarantees of a running episode:
//! - Checkpoint-driven act transitions
//! - Act gates and major-nudge cadence
//! - Relationship bounds and act monotonicity across many exchanges
//! - Plateau tracking and scene wraps

use std::sync::Arc;

use narrative_core::testing::{sample_cast, PermissiveSafety, ScriptedGenerator};
use narrative_core::{
    Badge, EventKind, GeneratedLine, ImportedContext, NarrativeError, NarrativeSession, Nudge,
    RecoveryBias, Rejection, TelemetryEvent,
};
use story_rules::{Act, NudgeKind, PairRecord, RelationshipDelta, SceneEndReason};

fn scripted_session() -> (Arc<ScriptedGenerator>, NarrativeSession) {
    let generator = Arc::new(ScriptedGenerator::default());
    let session = NarrativeSession::new(generator.clone(), Arc::new(PermissiveSafety));
    (generator, session)
}

fn event_name(event: &TelemetryEvent) -> &'static str {
    match &event.kind {
        EventKind::TurnStart { .. } => "turn_start",
        EventKind::TurnEnd { .. } => "turn_end",
        EventKind::NudgeApplied { .. } => "nudge_applied",
        EventKind::SceneTransition { .. } => "scene_transition",
        EventKind::MetricTick { .. } => "metric_tick",
    }
}

fn metric(events: &[TelemetryEvent], name: &str) -> Option<f64> {
    events.iter().find_map(|e| match &e.kind {
        EventKind::MetricTick { name: n, value } if n == name => Some(*value),
        _ => None,
    })
}

// =============================================================================
// CHECKPOINTS
// =============================================================================

#[tokio::test]
async fn test_mutual_spark_opens_rising_action() {
    let cast = sample_cast(2);
    let (ava, ben) = (cast[0].id, cast[1].id);
    let imported = ImportedContext::new()
        .with_pair(ava, ben, PairRecord::new(0.45, 0.2, 0.1, 0.2))
        .with_callback("the lighthouse");

    let (_, session) = scripted_session();
    session
        .start_episode(cast, "cozy", "harbor bar", Some(imported))
        .await
        .unwrap();

    let report = session.tick().await.unwrap();
    assert_eq!(report.exchange, 0);
    assert_eq!(report.transitions.len(), 1);

    let transition = &report.transitions[0];
    assert_eq!(transition.from_act, Act::Setup);
    assert_eq!(transition.to_act, Act::RisingAction);
    assert_eq!(transition.reason, SceneEndReason::Checkpoint);
    assert_eq!(transition.checkpoint.as_deref(), Some("mutual_spark"));
    assert!(transition.advances_act());

    let names: Vec<&str> = report.events.iter().map(event_name).collect();
    assert_eq!(&names[..3], &["turn_start", "turn_end", "scene_transition"]);
    assert!(names[3..].iter().all(|n| *n == "metric_tick"));

    let state = session.get_state().await.unwrap();
    assert_eq!(state.summary.act, Act::RisingAction);
    assert_eq!(state.summary.act_path, vec![Act::Setup, Act::RisingAction]);
    assert_eq!(state.summary.scene_index, 1);
    assert_eq!(state.summary.exchange, 1);
}

#[tokio::test]
async fn test_attraction_alone_does_not_advance() {
    let cast = sample_cast(2);
    let (ava, ben) = (cast[0].id, cast[1].id);
    let imported = ImportedContext::new().with_pair(ava, ben, PairRecord::new(0.45, 0.2, 0.1, 0.2));

    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "cozy", "harbor bar", Some(imported))
        .await
        .unwrap();

    let report = session.tick().await.unwrap();
    assert!(report.transitions.is_empty());
    assert_eq!(session.get_state().await.unwrap().summary.act, Act::Setup);

    // A trust gain is the other half of the checkpoint.
    generator.push(vec![GeneratedLine::new(ben, "I haven't said that to anyone.")
        .with_deltas(RelationshipDelta::new(0.0, 0.06, 0.0, 0.0))]);
    let report = session.tick().await.unwrap();
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].to_act, Act::RisingAction);
}

#[tokio::test]
async fn test_at_most_one_transition_per_tick() {
    let cast = sample_cast(2);
    let (ava, ben) = (cast[0].id, cast[1].id);
    let imported = ImportedContext::new()
        .with_pair(ava, ben, PairRecord::new(0.9, 0.9, 0.9, 0.5))
        .with_callback("the lighthouse");

    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "tense", "rooftop", Some(imported))
        .await
        .unwrap();

    // Every line would satisfy some checkpoint on its own.
    generator.push(vec![
        GeneratedLine::new(ava, "I don't agree, that's not fair."),
        GeneratedLine::new(ben, "I need you to hear me."),
        GeneratedLine::new(ava, "I choose you."),
    ]);
    let report = session.tick().await.unwrap();
    assert_eq!(report.lines.len(), 3);
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(
        session.get_state().await.unwrap().summary.act_path,
        vec![Act::Setup, Act::RisingAction]
    );
}

#[tokio::test]
async fn test_checkpoint_evidence_stays_within_the_scene() {
    let cast = sample_cast(2);
    let (ava, ben) = (cast[0].id, cast[1].id);
    let imported = ImportedContext::new()
        .starting_at(Act::RisingAction)
        .with_pair(ava, ben, PairRecord::new(0.5, 0.7, 0.7, 0.3));

    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "tense", "rooftop", Some(imported))
        .await
        .unwrap();

    // Carries both conflict and need language.
    generator.push(vec![GeneratedLine::new(ava, "I disagree, and I need you to listen.")]);
    let report = session.tick().await.unwrap();
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].to_act, Act::Climax);

    generator.push(vec![GeneratedLine::new(ben, "The weather is nice.")]);
    let report = session.tick().await.unwrap();
    assert!(report.transitions.is_empty());
    assert_eq!(session.get_state().await.unwrap().summary.act, Act::Climax);

    generator.push(vec![GeneratedLine::new(ben, "I need you to stay.")]);
    let report = session.tick().await.unwrap();
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(
        session.get_state().await.unwrap().summary.act_path,
        vec![Act::RisingAction, Act::Climax, Act::FallingAction]
    );
}

// =============================================================================
// NUDGE GATES AND CADENCE
// =============================================================================

#[tokio::test]
async fn test_major_nudge_starts_recovery_and_blocks_next_major() {
    let (generator, session) = scripted_session();
    session
        .start_episode(
            sample_cast(2),
            "dramatic",
            "train platform",
            Some(ImportedContext::new().starting_at(Act::RisingAction)),
        )
        .await
        .unwrap();

    let decision = session
        .apply_nudge(Nudge::major(NudgeKind::RaiseStakes))
        .await;
    assert!(decision.accepted, "{}", decision.reason);

    let state = session.get_state().await.unwrap();
    assert!(state.cadence.recovery_active);
    assert_eq!(state.cadence.recovery_remaining, 2);
    assert!(state.has_badge(Badge::RecoveryActive));
    assert_eq!(state.pending.len(), 1);

    let report = session.tick().await.unwrap();
    assert_eq!(event_name(&report.events[0]), "nudge_applied");

    let request = &generator.requests()[0];
    assert_eq!(request.bias.recovery, Some(RecoveryBias { remaining: 2 }));
    assert!(request.bias.stakes_weight > 0.0);

    let state = session.get_state().await.unwrap();
    assert!(state.pending.is_empty());
    assert_eq!(state.cadence.recovery_remaining, 1);

    let second = session
        .apply_nudge(Nudge::major(NudgeKind::RaiseStakes))
        .await;
    assert!(!second.accepted);
    assert_eq!(second.rejection, Some(Rejection::Cadence));
    assert!(!second.reason.is_empty());

    session.tick().await.unwrap();
    let state = session.get_state().await.unwrap();
    assert!(!state.cadence.recovery_active);
    assert!(!state.has_badge(Badge::RecoveryActive));
}

#[tokio::test]
async fn test_catalog_major_kind_keeps_cadence_when_labelled_minor() {
    let (_, session) = scripted_session();
    session
        .start_episode(
            sample_cast(2),
            "dramatic",
            "train platform",
            Some(ImportedContext::new().starting_at(Act::RisingAction)),
        )
        .await
        .unwrap();

    let decision = session
        .apply_nudge(Nudge::minor(NudgeKind::RaiseStakes))
        .await;
    assert!(decision.accepted, "{}", decision.reason);

    let state = session.get_state().await.unwrap();
    assert!(state.cadence.recovery_active);
    assert_eq!(state.cadence.recovery_remaining, 2);
    assert!(state.pending[0].is_major());

    session.tick().await.unwrap();
    let second = session
        .apply_nudge(Nudge::minor(NudgeKind::RaiseStakes))
        .await;
    assert!(!second.accepted);
    assert_eq!(second.rejection, Some(Rejection::Cadence));
}

#[tokio::test]
async fn test_major_allowed_again_after_gap() {
    let (_, session) = scripted_session();
    session
        .start_episode(
            sample_cast(3),
            "dramatic",
            "train platform",
            Some(ImportedContext::new().starting_at(Act::RisingAction)),
        )
        .await
        .unwrap();

    assert!(session.apply_nudge(Nudge::major(NudgeKind::RaiseStakes)).await.accepted);
    for _ in 0..5 {
        session.tick().await.unwrap();
        assert!(!session.apply_nudge(Nudge::major(NudgeKind::Aside)).await.accepted);
    }
    session.tick().await.unwrap();
    let decision = session.apply_nudge(Nudge::major(NudgeKind::Aside)).await;
    assert!(decision.accepted, "{}", decision.reason);
}

#[tokio::test]
async fn test_act_gates_block_nudges() {
    let (_, session) = scripted_session();
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();
    let decision = session
        .apply_nudge(Nudge::minor(NudgeKind::RaiseStakes))
        .await;
    assert_eq!(decision.rejection, Some(Rejection::BlockedInAct));

    let resolution = Some(ImportedContext::new().starting_at(Act::Resolution));
    session
        .start_episode(sample_cast(3), "cozy", "cafe", resolution)
        .await
        .unwrap();
    let decision = session.apply_nudge(Nudge::major(NudgeKind::Aside)).await;
    assert_eq!(decision.rejection, Some(Rejection::BlockedInAct));
    assert!(decision.reason.contains("aside"));

    let decision = session.apply_nudge(Nudge::minor(NudgeKind::Comfort)).await;
    assert!(decision.accepted);
}

#[tokio::test]
async fn test_rejected_nudge_leaves_no_trace() {
    let (_, session) = scripted_session();
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();
    let before = session.get_state().await.unwrap();
    session
        .apply_nudge(Nudge::major(NudgeKind::RaiseStakes))
        .await;
    let after = session.get_state().await.unwrap();
    assert_eq!(before, after);

    let report = session.tick().await.unwrap();
    assert!(report.events.iter().all(|e| event_name(e) != "nudge_applied"));
}

// =============================================================================
// INVARIANTS OVER MANY EXCHANGES
// =============================================================================

#[tokio::test]
async fn test_relationships_stay_bounded_and_acts_never_regress() {
    let cast = sample_cast(3);
    let (ava, ben) = (cast[0].id, cast[1].id);
    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "chaotic", "festival", None)
        .await
        .unwrap();

    for i in 0..12 {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        generator.push(vec![
            GeneratedLine::new(ava, format!("Swing number {}.", i))
                .with_deltas(RelationshipDelta::new(0.9 * sign, -0.9 * sign, 0.9, 0.9 * sign)),
            GeneratedLine::new(ben, format!("Answer number {}.", i))
                .with_deltas(RelationshipDelta::new(0.7, 0.7 * sign, -0.8 * sign, 0.0)),
        ]);
    }

    let mut last_act = Act::Setup;
    for _ in 0..12 {
        let report = session.tick().await.unwrap();
        assert!(report.transitions.len() <= 1);

        let state = session.get_state().await.unwrap();
        for snapshot in &state.summary.relationships {
            assert!(snapshot.record.is_within_bounds(), "{:?}", snapshot);
        }
        let path = &state.summary.act_path;
        assert!(path.windows(2).all(|w| w[0].number() <= w[1].number()));
        assert!(state.summary.act.number() >= last_act.number());
        last_act = state.summary.act;
    }
}

// =============================================================================
// PLATEAU AND SCENE WRAPS
// =============================================================================

#[tokio::test]
async fn test_flat_dialogue_plateaus_and_wraps() {
    let (_, session) = scripted_session();
    session
        .start_episode(sample_cast(2), "cozy", "laundromat", None)
        .await
        .unwrap();

    match session.wrap_scene().await {
        Err(NarrativeError::WrapNotWarranted { counter, threshold }) => {
            assert_eq!(counter, 0);
            assert_eq!(threshold, 3);
        }
        other => panic!("expected WrapNotWarranted, got {:?}", other),
    }

    let mut counters = Vec::new();
    for _ in 0..5 {
        let report = session.tick().await.unwrap();
        counters.push(metric(&report.events, "plateau_counter"));
    }
    assert_eq!(counters, vec![None, None, Some(1.0), Some(2.0), Some(3.0)]);

    let state = session.get_state().await.unwrap();
    assert_eq!(state.summary.plateau_counter, 3);
    assert!(state.has_badge(Badge::Plateau));

    let wrap = session.wrap_scene().await.unwrap();
    assert_eq!(wrap.transition.reason, SceneEndReason::PlateauWrap);
    assert_eq!(wrap.transition.from_act, Act::Setup);
    assert_eq!(wrap.transition.to_act, Act::Setup);
    assert_eq!(wrap.transition.to_scene, 1);
    assert!(wrap.events.iter().any(TelemetryEvent::is_scene_transition));

    let state = session.get_state().await.unwrap();
    assert_eq!(state.summary.plateau_counter, 0);
    assert_eq!(state.summary.scene_index, 1);
    assert!(!state.has_badge(Badge::Plateau));
}

#[tokio::test]
async fn test_movement_resets_plateau() {
    let cast = sample_cast(2);
    let ava = cast[0].id;
    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "cozy", "laundromat", None)
        .await
        .unwrap();

    for _ in 0..4 {
        session.tick().await.unwrap();
    }
    assert_eq!(session.get_state().await.unwrap().summary.plateau_counter, 2);

    for text in ["You folded my shirts?", "Badly, but yes.", "That's weirdly sweet."] {
        generator.push(vec![GeneratedLine::new(ava, text)
            .with_deltas(RelationshipDelta::new(0.1, 0.05, 0.0, 0.1))]);
    }
    for _ in 0..3 {
        session.tick().await.unwrap();
    }
    assert_eq!(session.get_state().await.unwrap().summary.plateau_counter, 0);
}
