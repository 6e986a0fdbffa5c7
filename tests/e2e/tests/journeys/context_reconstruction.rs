//! Journey: context reconstruction and the async command surface.

use chrono::Utc;
use noema_core::{
    Command, CommandOutcome, ContextReconstructRequest, Engine, EngineService, InjectRequest,
    LogicalId, QueryRequest, QueryResult, ReferenceSnapshot, StimulusTarget,
};
use noema_e2e_tests::harness;

/// A small star: "morning" feeds coffee, shower, and inbox.
fn star_engine() -> Engine {
    let mut engine = harness::engine();
    for id in ["morning", "coffee", "shower", "inbox"] {
        engine
            .create_node(LogicalId::new(id), "memory", id.to_string(), None, None)
            .expect("node");
    }
    for dst in ["coffee", "shower", "inbox"] {
        engine
            .create_link(
                LogicalId::new("morning"),
                LogicalId::new(dst),
                "association",
                0.0,
                1.0,
                None,
            )
            .expect("link");
    }
    engine
}

#[test]
fn reconstruction_reports_the_formed_pattern() {
    let mut engine = star_engine();
    let report = engine
        .context_reconstruct(&ContextReconstructRequest {
            entry_targets: vec![(LogicalId::new("morning"), 1.0)],
            budget: 1.0,
            max_ticks: 4,
            reference_snapshot: None,
        })
        .expect("reconstruct");

    assert!(report.ticks_run >= 1 && report.ticks_run <= 4);
    assert!(report
        .nodes_above_threshold
        .iter()
        .any(|s| s.logical_id == LogicalId::new("morning")));

    // The hub heads the entity summary with its active members.
    let entity = report.entity_summary.first().expect("one entity");
    assert_eq!(entity.hub, LogicalId::new("morning"));
    assert!(entity.mean_energy > 0.0);
}

#[test]
fn similarity_scores_against_a_reference() {
    let mut engine = star_engine();
    let report = engine
        .context_reconstruct(&ContextReconstructRequest {
            entry_targets: vec![(LogicalId::new("morning"), 1.0)],
            budget: 1.0,
            max_ticks: 2,
            reference_snapshot: Some(ReferenceSnapshot {
                energies: vec![(LogicalId::new("morning"), 1.0)],
            }),
        })
        .expect("reconstruct");

    let similarity = report.similarity.expect("scored");
    assert!(similarity > 0.9, "similarity {similarity}");

    // A disjoint reference scores near zero.
    let mut other = star_engine();
    let report = other
        .context_reconstruct(&ContextReconstructRequest {
            entry_targets: vec![(LogicalId::new("morning"), 1.0)],
            budget: 1.0,
            max_ticks: 2,
            reference_snapshot: Some(ReferenceSnapshot {
                energies: vec![(LogicalId::new("nowhere"), 1.0)],
            }),
        })
        .expect("reconstruct");
    assert!(report.similarity.expect("scored") < 0.1);
}

#[test]
fn unknown_entry_target_rejects_the_run() {
    let mut engine = star_engine();
    let err = engine
        .context_reconstruct(&ContextReconstructRequest {
            entry_targets: vec![(LogicalId::new("ghost"), 1.0)],
            budget: 1.0,
            max_ticks: 2,
            reference_snapshot: None,
        })
        .unwrap_err();
    assert!(matches!(err, noema_core::EngineError::UnknownTarget(_)));
}

#[tokio::test]
async fn service_serves_commands_queries_and_events() {
    let engine = harness::engine();
    let (handle, mut events, join) = EngineService::spawn(engine);

    let outcome = handle
        .command(Command::CreateNode {
            logical: LogicalId::new("n1"),
            node_type: "memory".to_string(),
            description: "first".to_string(),
            meta: None,
            valid_from: None,
        })
        .await
        .expect("create");
    assert!(matches!(outcome, CommandOutcome::Created { .. }));

    handle
        .command(Command::Inject(InjectRequest {
            targets: vec![StimulusTarget {
                logical: LogicalId::new("n1"),
                weight: 1.0,
            }],
            budget: 0.7,
            deadline: None,
            affect: None,
        }))
        .await
        .expect("inject");

    let response = handle
        .query(QueryRequest::Snapshot {})
        .await
        .expect("snapshot");
    assert!(!response.partial);
    match response.result {
        QueryResult::Snapshot(snapshot) => {
            assert_eq!(snapshot.active, vec![LogicalId::new("n1")]);
        }
        other => panic!("wrong result: {other:?}"),
    }

    // The stream saw the create and the injection in order.
    let first = events.recv().await.expect("version.create");
    let second = events.recv().await.expect("stimulus.inject");
    assert!(second.seq > first.seq);

    handle.shutdown().await;
    join.await.expect("clean stop");
}

#[tokio::test]
async fn missed_query_deadline_flags_partial() {
    let engine = harness::engine();
    let (handle, _events, join) = EngineService::spawn(engine);

    let response = handle
        .query_with_deadline(
            QueryRequest::Snapshot {},
            Some(Utc::now() - chrono::Duration::seconds(1)),
        )
        .await
        .expect("snapshot");
    assert!(response.partial);

    handle.shutdown().await;
    join.await.expect("clean stop");
}
