//! Universal invariants: bounded energies, conservation, injection laws.

use noema_core::{EngineConfig, FeatureFlags, LogicalId};
use noema_e2e_tests::harness;

#[test]
fn energies_never_leave_the_unit_interval() {
    let mut engine = harness::ring_engine(EngineConfig::default(), "default", 5);
    for round in 0..30 {
        if round % 3 == 0 {
            harness::inject_ring(&mut engine, 5, 1.0);
        }
        engine.tick_with_dt(7.0);
        for i in 0..5 {
            let energy = engine.store().energy(&LogicalId::new(format!("r{i}")));
            assert!(energy >= 0.0, "negative energy {energy}");
            assert!(energy <= 1.0, "energy above one {energy}");
        }
    }
}

#[test]
fn conservation_error_stays_inside_tolerance() {
    let mut engine = harness::ring_engine(EngineConfig::default(), "memory", 6);
    harness::inject_ring(&mut engine, 6, 0.9);
    for _ in 0..20 {
        let summary = engine.tick_with_dt(1.0);
        assert!(
            summary.conservation_error <= 1e-9,
            "conservation error {} on tick {}",
            summary.conservation_error,
            summary.tick_id
        );
    }
}

#[test]
fn stickiness_loss_is_accounted_not_leaked() {
    let mut config = EngineConfig::default();
    config.features = FeatureFlags {
        stickiness: true,
        ..Default::default()
    };
    let mut engine = harness::engine_with(config);

    engine
        .create_node(LogicalId::new("src"), "default", "src".into(), None, None)
        .expect("src");
    let mut meta = serde_json::Map::new();
    meta.insert("stickiness".to_string(), serde_json::Value::from(0.5));
    engine
        .create_node(
            LogicalId::new("dst"),
            "default",
            "dst".into(),
            Some(meta),
            None,
        )
        .expect("dst");
    engine
        .create_link(
            LogicalId::new("src"),
            LogicalId::new("dst"),
            "association",
            0.0,
            1.0,
            None,
        )
        .expect("link");

    harness::inject_single(&mut engine, "src", 1.0);
    let summary = engine.tick_with_dt(1.0);

    // Half the gross transfer leaks as flow-through loss; the conservation
    // check accounts it instead of reporting a breach.
    assert_eq!(summary.strides, 1);
    assert!(summary.conservation_error <= 1e-9);
    let src = engine.store().energy(&LogicalId::new("src"));
    let dst = engine.store().energy(&LogicalId::new("dst"));
    // Source lost the gross 0.02; destination kept half, pre-decay.
    let lambda = engine
        .config()
        .decay
        .profile(noema_core::NodeType::Default)
        .lambda_e;
    assert!((src - 0.98 * lambda).abs() < 1e-9);
    assert!((dst - 0.01 * lambda).abs() < 1e-9);
}

#[test]
fn split_injection_equals_single_injection() {
    // Two injections of b/2 against one of b, in the linear regime.
    let mut split = harness::line_engine(EngineConfig::default(), "memory", &["n1", "n2"]);
    harness::inject_single(&mut split, "n1", 0.3);
    harness::inject_single(&mut split, "n1", 0.3);

    let mut single = harness::line_engine(EngineConfig::default(), "memory", &["n1", "n2"]);
    harness::inject_single(&mut single, "n1", 0.6);

    let a = split.store().energy(&LogicalId::new("n1"));
    let b = single.store().energy(&LogicalId::new("n1"));
    assert!((a - b).abs() < 1e-12);
}

#[test]
fn saturated_target_absorbs_nothing() {
    let mut engine = harness::line_engine(EngineConfig::default(), "memory", &["n1", "n2"]);
    harness::inject_single(&mut engine, "n1", 1.0);
    assert_eq!(engine.store().energy(&LogicalId::new("n1")), 1.0);

    // A second full-budget injection cannot push past the bound.
    harness::inject_single(&mut engine, "n1", 1.0);
    assert_eq!(engine.store().energy(&LogicalId::new("n1")), 1.0);
}

#[test]
fn at_most_one_live_version_per_logical_id() {
    let mut engine = harness::engine();
    engine
        .create_node(LogicalId::new("n1"), "memory", "v1".into(), None, None)
        .expect("create");
    for i in 0..4 {
        engine
            .supersede_node(&LogicalId::new("n1"), format!("v{}", i + 2), None, None)
            .expect("supersede");
        let live = engine
            .history(&LogicalId::new("n1"))
            .into_iter()
            .filter(|v| v.is_live())
            .count();
        assert_eq!(live, 1);
    }
}
