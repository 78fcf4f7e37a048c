//! Evaluation engine tests against live episode state.

use std::sync::Arc;

use narrative_core::testing::{sample_cast, PermissiveSafety, ScriptedGenerator};
use narrative_core::{
    CollaboratorError, DialogueSummary, EvaluationEngine, ImportedContext, LineSummary,
    NarrativeSession, NoveltyScorer, Nudge, Recommendation,
};
use story_rules::{Act, Intensity, NudgeDefinition, NudgeKind, PolicyTables, RelationshipDelta};

fn session() -> NarrativeSession {
    NarrativeSession::new(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(PermissiveSafety),
    )
}

fn dialogue(delta: RelationshipDelta) -> DialogueSummary {
    let texts = ["Where were you?", "Out. Walking.", "For four hours?"];
    DialogueSummary {
        lines: texts
            .iter()
            .map(|text| LineSummary {
                speaker: "Ava".to_string(),
                text: text.to_string(),
                deltas: delta,
            })
            .collect(),
        flagged_contradictions: 0,
    }
}

struct BrokenNovelty;

impl NoveltyScorer for BrokenNovelty {
    fn novelty(
        &self,
        _definition: &NudgeDefinition,
        _dialogue: &DialogueSummary,
    ) -> Result<f32, CollaboratorError> {
        Err(CollaboratorError::new("novelty", "embedding service timed out"))
    }
}

#[tokio::test]
async fn test_scores_follow_the_tradeoff() {
    let session = session();
    session
        .start_episode(sample_cast(2), "cozy", "bookshop", None)
        .await
        .unwrap();
    for _ in 0..3 {
        session.tick().await.unwrap();
    }

    let evaluation = session.evaluate().await.unwrap();
    assert!(!evaluation.candidates.is_empty());
    // Setup's base weight is 0.8.
    assert!(evaluation.lambda >= 0.8 * 0.6 - 1e-6);
    assert!(evaluation.lambda <= 0.8 * 1.8 + 1e-6);

    for candidate in &evaluation.candidates {
        let expected = (candidate.freshness.total
            - evaluation.lambda * candidate.coherence.total)
            .clamp(-1.0, 1.0);
        assert!((candidate.score - expected).abs() < 1e-5, "{:?}", candidate);
        assert!(!candidate.rationale.is_empty());
    }
    let scores: Vec<f32> = evaluation.candidates.iter().map(|c| c.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_fragile_scene_never_scores_higher() {
    let session = session();
    session
        .start_episode(sample_cast(2), "tense", "kitchen", None)
        .await
        .unwrap();
    let (state, _) = session.evaluation_input().await.unwrap();

    let fragile = dialogue(RelationshipDelta::new(0.0, -0.1, 0.3, 0.0));
    let stable = dialogue(RelationshipDelta::new(0.0, 0.1, 0.0, 0.15));

    let mut engine = EvaluationEngine::new(Arc::new(PolicyTables::standard()));
    let f = engine.consider(&state, &fragile);
    let s = engine.consider(&state, &stable);

    assert!(f.fragility.index > s.fragility.index);
    assert!(f.lambda > s.lambda);
    for candidate in &f.candidates {
        let twin = s
            .candidates
            .iter()
            .find(|c| c.kind == candidate.kind)
            .unwrap();
        assert!(candidate.score <= twin.score + 1e-6, "{}", candidate.kind);
    }
}

#[tokio::test]
async fn test_recovery_only_recommends_recovery_moves() {
    let session = session();
    session
        .start_episode(
            sample_cast(2),
            "dramatic",
            "airport",
            Some(ImportedContext::new().starting_at(Act::RisingAction)),
        )
        .await
        .unwrap();
    assert!(session.apply_nudge(Nudge::major(NudgeKind::RaiseStakes)).await.accepted);

    let evaluation = session.evaluate().await.unwrap();
    match &evaluation.recommendation {
        Recommendation::Recommend { nudge, .. } => {
            assert!(nudge.kind.is_recovery_move());
            assert_eq!(nudge.intensity, Intensity::Minor);
        }
        Recommendation::Abstain { rationale, .. } => assert!(!rationale.is_empty()),
    }
}

#[tokio::test]
async fn test_evaluation_does_not_mutate_episode() {
    let session = session();
    session
        .start_episode(sample_cast(3), "cozy", "bookshop", None)
        .await
        .unwrap();
    session.tick().await.unwrap();

    let before = session.get_state().await.unwrap();
    session.evaluate().await.unwrap();
    session.evaluate().await.unwrap();
    assert_eq!(before, session.get_state().await.unwrap());
}

#[tokio::test]
async fn test_scorer_failure_abstains_quietly() {
    let session = session().with_novelty(Arc::new(BrokenNovelty));
    session
        .start_episode(sample_cast(2), "cozy", "bookshop", None)
        .await
        .unwrap();

    let evaluation = session.evaluate().await.unwrap();
    assert!(evaluation.recommendation.is_abstention());
    assert!(evaluation.candidates.is_empty());
    let rationale = evaluation.recommendation.rationale().join(" ");
    assert!(!rationale.contains("timed out"));
    assert!(session.evaluation_log().await.is_empty());
}

#[tokio::test]
async fn test_evaluation_log_tracks_candidates() {
    let session = session();
    session
        .start_episode(sample_cast(2), "cozy", "bookshop", None)
        .await
        .unwrap();

    let evaluation = session.evaluate().await.unwrap();
    let log = session.evaluation_log().await;
    assert_eq!(log.len(), evaluation.candidates.len());
    assert!(log.iter().all(|s| s.evaluation == evaluation.id));
    assert!(log.iter().filter(|s| s.chosen).count() <= 1);
    if let Some(nudge) = evaluation.recommendation.nudge() {
        assert!(log.iter().any(|s| s.chosen && s.kind == nudge.kind));
    }

    let export = session.export().await.unwrap();
    assert_eq!(export.evaluations.len(), log.len());

    session.reset().await;
    assert!(session.evaluation_log().await.is_empty());
}

#[tokio::test]
async fn test_recommended_nudge_is_accepted() {
    let session = session();
    session
        .start_episode(sample_cast(2), "cozy", "bookshop", None)
        .await
        .unwrap();
    for _ in 0..5 {
        session.tick().await.unwrap();
    }

    let evaluation = session.evaluate().await.unwrap();
    if let Some(nudge) = evaluation.recommendation.nudge() {
        let decision = session.apply_nudge(nudge.clone()).await;
        assert!(decision.accepted, "{}", decision.reason);
    }
}
