//! Journey: create a node, let it decay, correct it, time-travel both axes.

use chrono::{Duration, Utc};
use noema_core::{
    Command, DecayProfile, EngineConfig, EventKind, LogicalId, NodeType, TimeAxis,
};
use noema_e2e_tests::harness;

fn memory_profile(lambda_e: f64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.decay.profiles.insert(
        NodeType::Memory,
        DecayProfile {
            lambda_e,
            lambda_w: 0.999,
        },
    );
    config
}

#[test]
fn create_inject_decay_then_supersede() {
    let mut engine = harness::engine_with(memory_profile(0.9));
    engine
        .create_node(LogicalId::new("n1"), "memory", "first".into(), None, None)
        .expect("create");

    harness::inject_single(&mut engine, "n1", 0.8);

    let before_supersede = Utc::now();
    for _ in 0..5 {
        engine.tick_with_dt(1.0);
    }

    // E = 0.8 * 0.9^5, about 0.472.
    let energy = engine.store().energy(&LogicalId::new("n1"));
    let expected = 0.8 * 0.9_f64.powi(5);
    assert!((energy - expected).abs() < 1e-9, "energy {energy}");

    // No supersession events so far.
    assert!(!engine
        .replay_events()
        .iter()
        .any(|r| matches!(r.kind, EventKind::VersionSupersede { .. })));

    std::thread::sleep(std::time::Duration::from_millis(5));
    engine
        .supersede_node(&LogicalId::new("n1"), "second".into(), None, None)
        .expect("supersede");

    let old = engine
        .as_of_node(&LogicalId::new("n1"), TimeAxis::Knowledge, before_supersede)
        .expect("pre-supersession belief");
    assert_eq!(old.description, "first");

    let new = engine
        .as_of_node(&LogicalId::new("n1"), TimeAxis::Knowledge, Utc::now())
        .expect("current belief");
    assert_eq!(new.description, "second");
    assert_eq!(new.version_seq, old.version_seq + 1);

    // Chain links are mutual.
    let history = engine.history(&LogicalId::new("n1"));
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].superseded_by, Some(history[1].version_id.clone()));
    assert_eq!(history[1].supersedes, Some(history[0].version_id.clone()));
}

#[test]
fn retroactive_fact_splits_the_axes() {
    let mut engine = harness::engine();
    let now = Utc::now();

    engine
        .create_node(
            LogicalId::new("backfill"),
            "memory",
            "learned late".into(),
            None,
            Some(now - Duration::days(7)),
        )
        .expect("retroactive create");

    // The create event carries the retroactive flag.
    let retroactive = engine.replay_events().iter().any(|r| {
        matches!(
            r.kind,
            EventKind::VersionCreate { retroactive: true, .. }
        )
    });
    assert!(retroactive);

    // True in the world three days ago, but not yet believed then.
    let logical = LogicalId::new("backfill");
    assert!(engine
        .as_of_node(&logical, TimeAxis::Reality, now - Duration::days(3))
        .is_some());
    assert!(engine
        .as_of_node(&logical, TimeAxis::Knowledge, now - Duration::days(3))
        .is_none());
}

#[test]
fn supersession_is_atomic_per_logical_id() {
    let mut engine = harness::engine();
    engine
        .create_node(LogicalId::new("n1"), "memory", "v1".into(), None, None)
        .expect("create");

    for i in 2..=6 {
        engine
            .supersede_node(&LogicalId::new("n1"), format!("v{i}"), None, None)
            .expect("supersede");
    }

    // Exactly one live version at any instant, and sequences are dense.
    let history = engine.history(&LogicalId::new("n1"));
    assert_eq!(history.len(), 6);
    assert_eq!(history.iter().filter(|v| v.is_live()).count(), 1);
    for (i, version) in history.iter().enumerate() {
        assert_eq!(version.version_seq, i as u32 + 1);
        if let Some(end) = version.known_to {
            assert!(version.known_from <= end);
        }
    }
}

#[test]
fn hot_reload_changes_decay_mid_run() {
    let mut engine = harness::engine_with(memory_profile(0.9));
    engine
        .create_node(LogicalId::new("n1"), "memory", "first".into(), None, None)
        .expect("create");
    harness::inject_single(&mut engine, "n1", 0.8);
    engine.tick_with_dt(1.0);

    engine
        .execute_command(Command::ConfigureDecay {
            type_profiles: [(
                NodeType::Memory,
                DecayProfile {
                    lambda_e: 0.5,
                    lambda_w: 0.999,
                },
            )]
            .into_iter()
            .collect(),
            weight_cadence_ticks: None,
        })
        .expect("hot reload");
    engine.tick_with_dt(1.0);

    let expected = 0.8 * 0.9 * 0.5;
    let energy = engine.store().energy(&LogicalId::new("n1"));
    assert!((energy - expected).abs() < 1e-9, "energy {energy}");
}
