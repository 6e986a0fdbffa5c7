//! Journey: Hebbian strengthening fires only behind the newness gate.

use noema_core::{EngineConfig, EventKind, LinkKey, LogicalId};
use noema_e2e_tests::harness;

/// dt that pushes the n1 -> n2 transfer to the per-source cap, enough to
/// close n2's threshold gap in a single stride.
const RECRUIT_DT: f64 = 50.0;

#[test]
fn dormant_recruitment_strengthens_exactly_once() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);

    // Both endpoints start at zero energy. Inject just enough into n1 that
    // a single stride flips n2 active for the first time.
    harness::inject_single(&mut engine, "n1", 1.0);
    let summary = engine.tick_with_dt(RECRUIT_DT);

    assert_eq!(summary.weight_updates, 1);

    let updates: Vec<_> = engine
        .replay_events()
        .into_iter()
        .filter_map(|r| match r.kind {
            EventKind::WeightsUpdated(update) => Some(update),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].delta_log_w > 0.0);
    assert_eq!(updates[0].link, LinkKey::new("n1", "n2"));

    // The learned weight landed in the store.
    let weight = engine.store().link_weight_log(&LinkKey::new("n1", "n2"));
    assert!((weight - updates[0].delta_log_w).abs() < 1e-12);
}

#[test]
fn already_active_endpoints_never_strengthen() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);

    // First tick recruits n2 and strengthens once.
    harness::inject_single(&mut engine, "n1", 1.0);
    engine.tick_with_dt(RECRUIT_DT);
    let weight_after_recruit = engine.store().link_weight_log(&LinkKey::new("n1", "n2"));

    // Keep both endpoints active and stride again: the gate stays shut.
    harness::inject_single(&mut engine, "n1", 0.5);
    let summary = engine.tick_with_dt(1.0);
    assert_eq!(summary.weight_updates, 0);
    assert_eq!(
        engine.store().link_weight_log(&LinkKey::new("n1", "n2")),
        weight_after_recruit
    );
}

#[test]
fn sub_threshold_transfer_does_not_learn() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);
    harness::inject_single(&mut engine, "n1", 1.0);

    // dt = 1 moves only 0.02: n2 stays dormant, nothing learns.
    let summary = engine.tick_with_dt(1.0);
    assert_eq!(summary.weight_updates, 0);
    assert_eq!(engine.store().link_weight_log(&LinkKey::new("n1", "n2")), 0.0);
}

#[test]
fn fork_recruitment_strengthens_both_links() {
    // A fork: hub feeds two identical targets; recruiting both in one frame
    // strengthens both links by the same amount.
    let mut engine = harness::engine();
    for id in ["hub", "left", "right"] {
        engine
            .create_node(LogicalId::new(id), "default", id.to_string(), None, None)
            .expect("node");
    }
    for dst in ["left", "right"] {
        engine
            .create_link(
                LogicalId::new("hub"),
                LogicalId::new(dst),
                "association",
                0.0,
                1.0,
                None,
            )
            .expect("link");
    }

    // Pre-warm both targets to just under threshold so the capped fork
    // transfer (0.05 per edge) can close the remaining gap.
    engine
        .inject(&noema_core::InjectRequest {
            targets: vec![
                noema_core::StimulusTarget {
                    logical: LogicalId::new("left"),
                    weight: 0.5,
                },
                noema_core::StimulusTarget {
                    logical: LogicalId::new("right"),
                    weight: 0.5,
                },
            ],
            budget: 0.12,
            deadline: None,
            affect: None,
        })
        .expect("pre-warm");
    harness::inject_single(&mut engine, "hub", 1.0);
    engine.tick_with_dt(RECRUIT_DT);

    // Both targets were recruited, so both links strengthened. The rolling
    // z-score tightens between the two observations, so the first-processed
    // link (ties break on destination id) takes the larger step.
    let left = engine.store().link_weight_log(&LinkKey::new("hub", "left"));
    let right = engine.store().link_weight_log(&LinkKey::new("hub", "right"));
    assert!(left > 0.0);
    assert!(right > 0.0);
    assert!(left > right);
}

#[test]
fn weight_decay_erodes_learned_links_on_cadence() {
    let mut config = EngineConfig::default();
    config.decay.weight_cadence_ticks = 2;
    let mut engine = harness::line_engine(config, "default", &["n1", "n2"]);

    harness::inject_single(&mut engine, "n1", 1.0);
    engine.tick_with_dt(RECRUIT_DT);
    let learned = engine.store().link_weight_log(&LinkKey::new("n1", "n2"));
    assert!(learned > 0.0);

    // Tick 2 lands on the weight cadence; the learned weight shrinks toward
    // zero but survives.
    engine.tick_with_dt(1.0);
    let decayed = engine.store().link_weight_log(&LinkKey::new("n1", "n2"));
    assert!(decayed < learned);
    assert!(decayed > 0.0);
}
