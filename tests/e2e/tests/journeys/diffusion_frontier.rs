//! Journey: two-node diffusion, frontier flips, boundary behaviors.

use noema_core::{EngineConfig, EventKind, FlipDirection, LogicalId};
use noema_e2e_tests::harness;

#[test]
fn two_node_stride_moves_alpha_share() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);
    harness::inject_single(&mut engine, "n1", 1.0);

    let summary = engine.tick_with_dt(1.0);

    // W~ = 1, alpha = 0.02, dt = 1: staged transfer is
    // min(1.0 * 1 * 0.02 * 1, 0.1 * 1.0) = 0.02.
    assert_eq!(summary.strides, 1);
    assert!((summary.energy_transferred - 0.02).abs() < 1e-12);
    assert!(summary.conservation_error <= 1e-9);

    // Post-commit pattern decays with the default-type factor.
    let lambda = engine
        .config()
        .decay
        .profile(noema_core::NodeType::Default)
        .lambda_e;
    let n1 = engine.store().energy(&LogicalId::new("n1"));
    let n2 = engine.store().energy(&LogicalId::new("n2"));
    assert!((n1 - 0.98 * lambda).abs() < 1e-9);
    assert!((n2 - 0.02 * lambda).abs() < 1e-9);
}

#[test]
fn recruitment_flips_exactly_once() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);
    harness::inject_single(&mut engine, "n1", 1.0);

    // dt = 50 pushes the transfer to the per-source cap: 0.1 reaches the
    // default threshold of 0.1 exactly.
    engine.tick_with_dt(50.0);

    let up_flips: Vec<LogicalId> = engine
        .replay_events()
        .into_iter()
        .filter_map(|r| match r.kind {
            EventKind::NodeFlip(flip) if flip.direction == FlipDirection::Up => {
                Some(flip.logical_id)
            }
            _ => None,
        })
        .collect();
    assert!(up_flips.contains(&LogicalId::new("n2")));
    assert_eq!(
        up_flips.iter().filter(|id| **id == LogicalId::new("n2")).count(),
        1
    );
}

#[test]
fn sub_threshold_transfer_does_not_flip() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);
    harness::inject_single(&mut engine, "n1", 0.5);

    // dt = 1: transfer is 0.01, far below the 0.1 threshold gap.
    engine.tick_with_dt(1.0);

    let n2_flipped = engine.replay_events().into_iter().any(|r| {
        matches!(
            r.kind,
            EventKind::NodeFlip(ref flip)
                if flip.logical_id == LogicalId::new("n2")
        )
    });
    assert!(!n2_flipped);
    assert!(engine.store().energy(&LogicalId::new("n2")) < 0.1);
}

#[test]
fn zero_energy_source_emits_no_strides() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["n1", "n2"]);
    // Nothing injected: no sources, no strides, no error.
    let summary = engine.tick_with_dt(1.0);
    assert_eq!(summary.strides, 0);
    assert_eq!(summary.energy_transferred, 0.0);
}

#[test]
fn zero_out_degree_source_is_harmless() {
    let mut engine = harness::line_engine(EngineConfig::default(), "default", &["solo"]);
    harness::inject_single(&mut engine, "solo", 0.9);

    let summary = engine.tick_with_dt(1.0);
    assert_eq!(summary.strides, 0);
    // The node still decays and stays bounded.
    let energy = engine.store().energy(&LogicalId::new("solo"));
    assert!(energy > 0.0 && energy < 0.9);
}

#[test]
fn energies_stay_bounded_under_hammering() {
    let mut engine = harness::ring_engine(EngineConfig::default(), "default", 4);
    for _ in 0..20 {
        harness::inject_ring(&mut engine, 4, 1.0);
        engine.tick_with_dt(10.0);
        for i in 0..4 {
            let energy = engine.store().energy(&LogicalId::new(format!("r{i}")));
            assert!((0.0..=1.0).contains(&energy), "energy {energy} out of bounds");
        }
    }
}

#[test]
fn shadow_tracks_one_hop_neighbors() {
    let mut engine =
        harness::line_engine(EngineConfig::default(), "default", &["a", "b", "c"]);
    harness::inject_single(&mut engine, "a", 0.9);
    engine.tick_with_dt(1.0);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.active, vec![LogicalId::new("a")]);
    assert_eq!(snapshot.shadow, vec![LogicalId::new("b")]);
}
