//! Session lifecycle tests: preconditions, collaborator failures, streaming and export.

use std::sync::Arc;

use narrative_core::testing::{
    sample_cast, BlocklistSafety, FailingGenerator, PermissiveSafety, ScriptedGenerator,
    UnavailableSafety,
};
use narrative_core::{
    EpisodeExport, GeneratedLine, NarrativeError, NarrativeSession, Nudge, Rejection,
    RuntimeConfig,
};
use story_rules::{CastMember, CharacterId, NudgeKind, RelationshipDelta, SceneEndReason};

fn scripted_session() -> (Arc<ScriptedGenerator>, NarrativeSession) {
    let generator = Arc::new(ScriptedGenerator::default());
    let session = NarrativeSession::new(generator.clone(), Arc::new(PermissiveSafety));
    (generator, session)
}

// =============================================================================
// PRECONDITIONS
// =============================================================================

#[tokio::test]
async fn test_operations_need_an_active_episode() {
    let (_, session) = scripted_session();

    assert!(matches!(session.tick().await, Err(NarrativeError::NoActiveEpisode)));
    assert!(matches!(session.get_state().await, Err(NarrativeError::NoActiveEpisode)));
    assert!(matches!(session.evaluate().await, Err(NarrativeError::NoActiveEpisode)));
    assert!(matches!(session.export().await, Err(NarrativeError::NoActiveEpisode)));
    assert!(matches!(session.wrap_scene().await, Err(NarrativeError::NoActiveEpisode)));

    let decision = session.apply_nudge(Nudge::minor(NudgeKind::Comfort)).await;
    assert!(!decision.accepted);
    assert_eq!(decision.rejection, Some(Rejection::NoActiveEpisode));
}

#[tokio::test]
async fn test_start_needs_two_characters() {
    let (_, session) = scripted_session();
    let solo = vec![CastMember::new("Ava")];
    assert!(matches!(
        session.start_episode(solo, "cozy", "cafe", None).await,
        Err(NarrativeError::NotEnoughCharacters { found: 1 })
    ));

    // The same member twice is still one character.
    let ava = CastMember::new("Ava");
    let twice = vec![ava.clone(), ava];
    assert!(session.start_episode(twice, "cozy", "cafe", None).await.is_err());
}

#[tokio::test]
async fn test_start_reports_the_opening_state() {
    let (_, session) = scripted_session();
    let cast = sample_cast(3);
    let summary = session
        .start_episode(cast, "cozy", "night market", None)
        .await
        .unwrap();

    assert_eq!(summary.exchange, 0);
    assert_eq!(summary.scene_index, 0);
    assert_eq!(summary.act_path.len(), 1);
    assert_eq!(summary.spotlight_names.0, "Ava");
    assert_eq!(summary.spotlight_names.1, "Ben");
    assert_eq!(summary.relationships.len(), 3);
}

#[tokio::test]
async fn test_stop_and_reset_clear_the_slot() {
    let (_, session) = scripted_session();
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();
    session.tick().await.unwrap();

    let export = session.stop_episode().await.unwrap();
    assert!(export.episode.ended_at.is_some());
    assert_eq!(
        export.scenes.last().and_then(|s| s.end_reason),
        Some(SceneEndReason::ExternalStop)
    );
    assert!(matches!(session.tick().await, Err(NarrativeError::NoActiveEpisode)));

    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();
    session.reset().await;
    assert!(matches!(session.get_state().await, Err(NarrativeError::NoActiveEpisode)));
}

// =============================================================================
// GENERATION FAILURES
// =============================================================================

#[tokio::test]
async fn test_generation_failure_leaves_state_untouched() {
    let session = NarrativeSession::new(
        Arc::new(FailingGenerator::new("model overloaded")),
        Arc::new(PermissiveSafety),
    );
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();
    assert!(session.apply_nudge(Nudge::minor(NudgeKind::Spark)).await.accepted);
    let before = session.get_state().await.unwrap();

    let result = session.tick().await;
    assert!(matches!(result, Err(NarrativeError::Generation(_))));
    assert_eq!(before, session.get_state().await.unwrap());
}

#[tokio::test]
async fn test_generation_failure_falls_back_when_configured() {
    let config = RuntimeConfig {
        fallback_on_generation_error: true,
        ..Default::default()
    };
    let session = NarrativeSession::new(
        Arc::new(FailingGenerator::new("model overloaded")),
        Arc::new(PermissiveSafety),
    )
    .with_config(config)
    .unwrap();
    let summary = session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();

    let report = session.tick().await.unwrap();
    assert_eq!(report.lines.len(), 1);
    let line = &report.lines[0];
    assert!(line.fallback);
    assert_eq!(line.deltas, RelationshipDelta::zero());
    assert!(line.rationale.iter().any(|r| r.contains("model overloaded")));

    let state = session.get_state().await.unwrap();
    assert_eq!(state.summary.exchange, 1);
    assert_eq!(state.summary.relationships, summary.relationships);
}

#[tokio::test]
async fn test_invalid_line_rejects_the_whole_exchange() {
    let cast = sample_cast(2);
    let ava = cast[0].id;
    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "cozy", "cafe", None)
        .await
        .unwrap();

    generator.push(vec![
        GeneratedLine::new(ava, "This one is fine.")
            .with_deltas(RelationshipDelta::new(0.2, 0.0, 0.0, 0.0)),
        GeneratedLine::new(CharacterId::new(), "Who said that?"),
    ]);
    let before = session.get_state().await.unwrap();
    assert!(matches!(
        session.tick().await,
        Err(NarrativeError::UnknownCharacter(_))
    ));
    assert_eq!(before, session.get_state().await.unwrap());

    generator.push(vec![GeneratedLine::new(ava, "   ")]);
    assert!(matches!(session.tick().await, Err(NarrativeError::InvalidLine(_))));

    generator.push(vec![]);
    assert!(matches!(session.tick().await, Err(NarrativeError::InvalidLine(_))));
    assert_eq!(session.get_state().await.unwrap().summary.exchange, 0);
}

#[test]
fn test_session_rejects_config_that_disables_plateaus() {
    let mut config = RuntimeConfig::default();
    config.plateau.window = 1;
    let result = NarrativeSession::new(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(PermissiveSafety),
    )
    .with_config(config);
    assert!(matches!(result, Err(NarrativeError::InvalidConfig(_))));
}

// =============================================================================
// SAFETY
// =============================================================================

#[tokio::test]
async fn test_unsafe_nudge_is_rejected() {
    let session = NarrativeSession::new(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(BlocklistSafety::new(["spark"])),
    );
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();

    let decision = session.apply_nudge(Nudge::minor(NudgeKind::Spark)).await;
    assert_eq!(decision.rejection, Some(Rejection::Unsafe));
    assert!(decision.reason.contains("spark"));
    assert!(session.get_state().await.unwrap().pending.is_empty());

    assert!(session.apply_nudge(Nudge::minor(NudgeKind::Comfort)).await.accepted);
}

#[tokio::test]
async fn test_unreachable_safety_fails_closed() {
    let session = NarrativeSession::new(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(UnavailableSafety),
    );
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();

    let decision = session.apply_nudge(Nudge::minor(NudgeKind::Comfort)).await;
    assert!(!decision.accepted);
    assert_eq!(decision.rejection, Some(Rejection::SafetyUnavailable));
    assert!(session.get_state().await.unwrap().pending.is_empty());
}

// =============================================================================
// TELEMETRY AND EXPORT
// =============================================================================

#[tokio::test]
async fn test_subscriber_sees_every_event_in_order() {
    let (_, session) = scripted_session();
    let mut stream = session.subscribe().await;
    session
        .start_episode(sample_cast(2), "cozy", "cafe", None)
        .await
        .unwrap();
    assert!(session.apply_nudge(Nudge::minor(NudgeKind::Clarify)).await.accepted);

    let mut batched = Vec::new();
    for _ in 0..3 {
        batched.extend(session.tick().await.unwrap().events);
    }

    let mut streamed = Vec::new();
    while let Ok(event) = stream.try_recv() {
        streamed.push(event);
    }
    assert_eq!(streamed, batched);
    assert!(streamed.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    assert!(streamed.windows(2).all(|w| w[0].exchange <= w[1].exchange));
}

#[tokio::test]
async fn test_export_round_trips_through_json() {
    let cast = sample_cast(2);
    let (ava, ben) = (cast[0].id, cast[1].id);
    let (generator, session) = scripted_session();
    session
        .start_episode(cast, "cozy", "cafe", None)
        .await
        .unwrap();

    generator.push(vec![
        GeneratedLine::new(ava, "Do you remember the lighthouse?")
            .opening("the lighthouse")
            .with_deltas(RelationshipDelta::new(0.05, 0.02, 0.0, 0.03)),
        GeneratedLine::new(ben, "How could I forget.").recalling("the lighthouse"),
    ]);
    session.tick().await.unwrap();
    session.tick().await.unwrap();

    let state = session.get_state().await.unwrap();
    assert_eq!(state.summary.open_threads, vec!["the lighthouse".to_string()]);

    let export = session.stop_episode().await.unwrap();
    assert_eq!(export.episode.exchanges, 2);
    assert_eq!(export.turns.len(), 3);
    assert_eq!(export.turns[0].speaker_name, "Ava");
    assert_eq!(export.cast.len(), 2);
    assert_eq!(export.threads.len(), 1);
    assert_eq!(export.threads[0].recalls, 1);

    let json = export.to_json().unwrap();
    let restored = EpisodeExport::from_json(&json).unwrap();
    assert_eq!(restored.episode.id, export.episode.id);
    assert_eq!(restored.turns.len(), export.turns.len());
    assert_eq!(restored.turns[0].text, export.turns[0].text);
    assert_eq!(restored.threads[0].token, "the lighthouse");
}
