//! Graph fixtures and event-stream helpers shared across journeys.

use noema_core::{
    Engine, EngineConfig, EventRecord, InjectRequest, LogicalId, StimulusTarget,
};

/// Engine with the default configuration; panics on invalid defaults.
pub fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

/// Engine from a caller-tuned configuration.
pub fn engine_with(config: EngineConfig) -> Engine {
    Engine::new(config).expect("config is valid")
}

/// Nodes chained left-to-right: ids[0] -> ids[1] -> ... with association
/// links at the type baseline weight.
pub fn line_engine(config: EngineConfig, node_type: &str, ids: &[&str]) -> Engine {
    let mut engine = engine_with(config);
    for id in ids {
        engine
            .create_node(LogicalId::new(*id), node_type, (*id).to_string(), None, None)
            .expect("create node");
    }
    for pair in ids.windows(2) {
        engine
            .create_link(
                LogicalId::new(pair[0]),
                LogicalId::new(pair[1]),
                "association",
                0.0,
                1.0,
                None,
            )
            .expect("create link");
    }
    engine
}

/// A directed ring of `n` nodes of one type.
pub fn ring_engine(config: EngineConfig, node_type: &str, n: usize) -> Engine {
    let mut engine = engine_with(config);
    for i in 0..n {
        engine
            .create_node(
                LogicalId::new(format!("r{i}")),
                node_type,
                format!("ring node {i}"),
                None,
                None,
            )
            .expect("create node");
    }
    for i in 0..n {
        engine
            .create_link(
                LogicalId::new(format!("r{i}")),
                LogicalId::new(format!("r{}", (i + 1) % n)),
                "association",
                0.0,
                1.0,
                None,
            )
            .expect("create link");
    }
    engine
}

/// Inject the whole budget into one node.
pub fn inject_single(engine: &mut Engine, id: &str, budget: f64) {
    engine
        .inject(&InjectRequest {
            targets: vec![StimulusTarget {
                logical: LogicalId::new(id),
                weight: 1.0,
            }],
            budget,
            deadline: None,
            affect: None,
        })
        .expect("inject");
}

/// Spread a budget evenly over a ring.
pub fn inject_ring(engine: &mut Engine, n: usize, budget: f64) {
    engine
        .inject(&InjectRequest {
            targets: (0..n)
                .map(|i| StimulusTarget {
                    logical: LogicalId::new(format!("r{i}")),
                    weight: 1.0 / n as f64,
                })
                .collect(),
            budget,
            deadline: None,
            affect: None,
        })
        .expect("inject");
}

/// Event kinds in emission order, for order assertions.
pub fn kind_names(events: &[EventRecord]) -> Vec<String> {
    events
        .iter()
        .map(|record| {
            let value: serde_json::Value =
                serde_json::from_str(&record.to_json()).expect("event json");
            value["kind"].as_str().expect("kind field").to_string()
        })
        .collect()
}

/// Serialize a stream with the non-deterministic fields masked: wall and
/// monotonic clocks, plus freshly minted version ids. Everything else must
/// replay byte-identically.
pub fn masked_stream(events: &[EventRecord]) -> Vec<String> {
    const MASKED_KEYS: [&str; 4] = ["versionId", "linkId", "oldVersion", "newVersion"];

    fn mask(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, nested) in map.iter_mut() {
                    if MASKED_KEYS.contains(&key.as_str()) {
                        *nested = serde_json::Value::Null;
                    } else {
                        mask(nested);
                    }
                }
            }
            serde_json::Value::Array(items) => items.iter_mut().for_each(mask),
            _ => {}
        }
    }

    events
        .iter()
        .map(|record| {
            let mut value: serde_json::Value =
                serde_json::from_str(&record.to_json()).expect("event json");
            value["tsWall"] = serde_json::Value::Null;
            value["tsMonoUs"] = serde_json::Value::Null;
            mask(&mut value);
            value.to_string()
        })
        .collect()
}
