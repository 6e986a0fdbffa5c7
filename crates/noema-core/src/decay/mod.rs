//! Decay engine - per-type activation and weight decay
//!
//! Two independent clocks: activation decay runs after every commit with the
//! frame's dt; weight decay runs on a slow cadence and uses factors much
//! closer to 1. The criticality controller contributes an extra per-tick
//! retention lever on top of the type profiles.

use std::collections::HashMap;

use crate::config::{DecayConfig, FeatureFlags};
use crate::graph::{LogicalId, NodeType};
use crate::store::GraphStore;

/// Meta key consulted for decay resistance when the feature is on.
const RESISTANCE_META_KEY: &str = "decayResistance";

/// Meta key consulted for the consolidation factor when the feature is on.
const CONSOLIDATION_META_KEY: &str = "consolidation";

// ============================================================================
// SUMMARIES
// ============================================================================

/// Accounting for one activation-decay sweep.
#[derive(Debug, Default, Clone)]
pub struct DecaySummary {
    /// Total energy removed this sweep
    pub energy_decayed: f64,
    /// Nodes whose energy changed
    pub nodes_decayed: usize,
}

/// Accounting for one weight-decay sweep.
#[derive(Debug, Default, Clone)]
pub struct WeightDecaySummary {
    /// Link weights decayed
    pub links_decayed: usize,
    /// Node weight attractors decayed
    pub nodes_decayed: usize,
}

// ============================================================================
// ACTIVATION DECAY
// ============================================================================

/// Apply per-type activation decay to every node, after commit.
///
/// Retention is `lambda_e^dt`, stretched by decay resistance (dt / r) and
/// sharpened by the consolidation exponent when those features are on, then
/// scaled by the controller's `(1 - delta)` lever.
pub fn apply_activation_decay(
    store: &mut GraphStore,
    config: &DecayConfig,
    features: &FeatureFlags,
    controller_delta: f64,
    dt_secs: f64,
) -> DecaySummary {
    let mut summary = DecaySummary::default();
    if dt_secs <= 0.0 {
        return summary;
    }

    let modifiers = read_time_modifiers(store, features);
    let lever = (1.0 - controller_delta).clamp(0.0, 1.0);

    for (logical, rt) in store.iter_runtime_mut() {
        if rt.energy <= 0.0 {
            continue;
        }
        let (node_type, resistance, consolidation) = modifiers
            .get(logical)
            .copied()
            .unwrap_or((NodeType::Default, 1.0, 1.0));
        let lambda = config.profile(node_type).lambda_e;

        let effective_dt = dt_secs / resistance;
        let mut retention = lambda.powf(effective_dt);
        if consolidation != 1.0 {
            retention = retention.powf(consolidation);
        }

        let post = rt.energy * retention * lever;
        summary.energy_decayed += rt.energy - post;
        summary.nodes_decayed += 1;
        rt.energy = post;
    }

    summary
}

/// Per-node (type, resistance, consolidation) computed at read time.
/// Resistance and consolidation are never stored on versions; they come out
/// of live-version meta only while their switches are on.
fn read_time_modifiers(
    store: &GraphStore,
    features: &FeatureFlags,
) -> HashMap<LogicalId, (NodeType, f64, f64)> {
    store
        .iter_runtime()
        .map(|(logical, _)| {
            let live = store.live_node(logical);
            let node_type = live.map(|v| v.node_type).unwrap_or_default();
            let resistance = if features.decay_resistance {
                live.and_then(|v| v.meta.get(RESISTANCE_META_KEY))
                    .and_then(|value| value.as_f64())
                    .map(|r| r.clamp(1.0, 1.5))
                    .unwrap_or(1.0)
            } else {
                1.0
            };
            let consolidation = if features.consolidation {
                live.and_then(|v| v.meta.get(CONSOLIDATION_META_KEY))
                    .and_then(|value| value.as_f64())
                    .map(|c| c.clamp(0.5, 1.0))
                    .unwrap_or(1.0)
            } else {
                1.0
            };
            (logical.clone(), (node_type, resistance, consolidation))
        })
        .collect()
}

// ============================================================================
// WEIGHT DECAY
// ============================================================================

/// Apply slow weight decay to link weights and node attractors.
///
/// Link weights decay with the destination node's profile; node attractors
/// decay with their own type's profile. Fires once per cadence window, not
/// per tick.
pub fn apply_weight_decay(store: &mut GraphStore, config: &DecayConfig) -> WeightDecaySummary {
    let mut summary = WeightDecaySummary::default();

    let node_types: HashMap<LogicalId, NodeType> = store
        .iter_runtime()
        .map(|(logical, _)| {
            (
                logical.clone(),
                store
                    .live_node(logical)
                    .map(|v| v.node_type)
                    .unwrap_or_default(),
            )
        })
        .collect();

    store.for_each_link_weight_mut(|key, _link_type, weight_log| {
        let dst_type = node_types
            .get(&key.dst)
            .copied()
            .unwrap_or(NodeType::Default);
        let lambda_w = config.profile(dst_type).lambda_w;
        if *weight_log != 0.0 {
            *weight_log *= lambda_w;
            summary.links_decayed += 1;
        }
    });

    for (logical, rt) in store.iter_runtime_mut() {
        if rt.weight_log == 0.0 {
            continue;
        }
        let node_type = node_types
            .get(logical)
            .copied()
            .unwrap_or(NodeType::Default);
        rt.weight_log *= config.profile(node_type).lambda_w;
        summary.nodes_decayed += 1;
    }

    summary
}

// ============================================================================
// TESTS
// ============================================================================
