//! Event emitter - structured per-stride/per-frame/version events
//!
//! Every cognitive operation emits one closed-set event. Records carry a
//! monotonically increasing `seq`, the owning `tick_id`, and both monotonic
//! and wall-clock timestamps. Within a tick the order is fixed: strides,
//! then the commit summary, then flips, then the criticality update, then
//! frame end. Consumers subscribe to a broadcast channel; a bounded replay
//! buffer keeps the recent past for diagnostics, dropping oldest events with
//! a count when it overflows.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::criticality::CriticalityUpdate;
use crate::diffusion::StrideRecord;
use crate::frontier::Flip;
use crate::graph::{LinkType, LogicalId, NodeType, VersionId};
use crate::learning::WeightUpdate;
use crate::store::GraphStore;

// ============================================================================
// EVENT TAXONOMY
// ============================================================================

/// Per-type bin counts for the aggregate histogram events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeHistogram {
    /// The node or link type the bins cover
    pub type_name: String,
    /// Bin counts, low to high
    pub counts: Vec<u64>,
}

/// The closed set of event variants. New kinds require explicit handling at
/// every match site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    /// A frame opened
    #[serde(rename = "frame.start")]
    FrameStart {
        /// Owning tick
        tick_id: u64,
        /// Interval the frame's physics multiply by
        dt: f64,
        /// Active-set size at frame start
        frontier_size: usize,
    },
    /// A stimulus batch was applied
    #[serde(rename = "stimulus.inject")]
    StimulusInject {
        /// Targets with their budget shares
        targets: Vec<(LogicalId, f64)>,
        /// Total requested budget
        budget: f64,
    },
    /// One stride executed
    #[serde(rename = "stride.exec")]
    StrideExec(StrideRecord),
    /// A node crossed its threshold at commit
    #[serde(rename = "node.flip")]
    NodeFlip(Flip),
    /// The frame's staged deltas were applied
    #[serde(rename = "commit.summary")]
    CommitSummary {
        /// Gross energy moved by strides
        energy_transferred: f64,
        /// Energy removed by decay this frame
        energy_decay: f64,
        /// Absolute conservation residual
        conservation_error: f64,
    },
    /// Controller output for the frame
    #[serde(rename = "criticality.update")]
    CriticalityUpdate(CriticalityUpdate),
    /// A link weight was strengthened
    #[serde(rename = "weights.updated")]
    WeightsUpdated(WeightUpdate),
    /// A new version chain started
    #[serde(rename = "version.create")]
    VersionCreate {
        /// Stable identity
        logical_id: LogicalId,
        /// Freshly created version
        version_id: VersionId,
        /// True when the reality interval starts before the write
        retroactive: bool,
    },
    /// A version was replaced on the knowledge axis
    #[serde(rename = "version.supersede")]
    VersionSupersede {
        /// Stable identity
        logical_id: LogicalId,
        /// Closed version
        old_version: VersionId,
        /// New live version
        new_version: VersionId,
    },
    /// A frame closed
    #[serde(rename = "frame.end")]
    FrameEnd {
        /// Owning tick
        tick_id: u64,
    },
    /// Per-type activation energy distribution
    #[serde(rename = "energy.histogram")]
    EnergyHistogram {
        /// One histogram per node type
        histograms: Vec<TypeHistogram>,
    },
    /// Per-type learned weight distribution
    #[serde(rename = "weight.histogram")]
    WeightHistogram {
        /// One histogram per link type
        histograms: Vec<TypeHistogram>,
    },
    /// A runtime invariant failed
    #[serde(rename = "invariant.violation")]
    InvariantViolation {
        /// Tick in which the breach was detected
        tick_id: u64,
        /// Human-readable description
        message: String,
    },
}

/// One emitted record: envelope plus variant payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Total order over the stream
    pub seq: u64,
    /// Owning tick
    pub tick_id: u64,
    /// Microseconds since emitter start (monotonic)
    pub ts_mono_us: u64,
    /// Wall-clock stamp
    pub ts_wall: DateTime<Utc>,
    /// The event itself
    #[serde(flatten)]
    pub kind: EventKind,
}

impl EventRecord {
    /// Serialize to a JSON line for transport.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// EMITTER
// ============================================================================

/// Bounded event emitter owned by the tick loop.
pub struct EventEmitter {
    seq: u64,
    epoch: Instant,
    replay: VecDeque<EventRecord>,
    capacity: usize,
    dropped: u64,
    tx: broadcast::Sender<EventRecord>,
}

impl EventEmitter {
    /// Create an emitter with the given replay/broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            seq: 0,
            epoch: Instant::now(),
            replay: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
            tx,
        }
    }

    /// Subscribe to the live stream. Slow consumers lag and lose oldest
    /// events channel-side; the replay buffer is unaffected.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }

    /// Emit one event; returns its sequence number.
    pub fn emit(&mut self, tick_id: u64, kind: EventKind) -> u64 {
        self.seq += 1;
        let record = EventRecord {
            seq: self.seq,
            tick_id,
            ts_mono_us: self.epoch.elapsed().as_micros() as u64,
            ts_wall: Utc::now(),
            kind,
        };

        if self.replay.len() == self.capacity {
            self.replay.pop_front();
            self.dropped += 1;
        }
        self.replay.push_back(record.clone());

        // No receivers is not an error; the replay buffer still has it.
        let _ = self.tx.send(record);
        self.seq
    }

    /// Events dropped off the replay buffer so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Last emitted sequence number.
    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    /// Snapshot of the replay buffer, oldest first.
    pub fn replay(&self) -> Vec<EventRecord> {
        self.replay.iter().cloned().collect()
    }
}

// ============================================================================
// AGGREGATE HISTOGRAMS
// ============================================================================

/// Per-node-type energy histograms over [0, 1].
pub fn energy_histograms(store: &GraphStore, bins: usize) -> Vec<TypeHistogram> {
    let bins = bins.max(1);
    let mut by_type: Vec<(NodeType, Vec<u64>)> = NodeType::all()
        .into_iter()
        .map(|t| (t, vec![0u64; bins]))
        .collect();

    for (logical, rt) in store.iter_runtime() {
        let node_type = store
            .live_node(logical)
            .map(|v| v.node_type)
            .unwrap_or_default();
        let bin = ((rt.energy * bins as f64) as usize).min(bins - 1);
        if let Some((_, counts)) = by_type.iter_mut().find(|(t, _)| *t == node_type) {
            counts[bin] += 1;
        }
    }

    by_type
        .into_iter()
        .map(|(t, counts)| TypeHistogram {
            type_name: t.as_str().to_string(),
            counts,
        })
        .collect()
}

/// Per-link-type weight histograms over [-ceiling, ceiling].
pub fn weight_histograms(store: &GraphStore, bins: usize, ceiling: f64) -> Vec<TypeHistogram> {
    let bins = bins.max(1);
    let span = (2.0 * ceiling).max(f64::EPSILON);
    let mut by_type: Vec<(LinkType, Vec<u64>)> = LinkType::all()
        .into_iter()
        .map(|t| (t, vec![0u64; bins]))
        .collect();

    for (_, link_type, weight_log) in store.iter_link_weights() {
        let normalized = ((weight_log + ceiling) / span).clamp(0.0, 1.0);
        let bin = ((normalized * bins as f64) as usize).min(bins - 1);
        if let Some((_, counts)) = by_type.iter_mut().find(|(t, _)| *t == link_type) {
            counts[bin] += 1;
        }
    }

    by_type
        .into_iter()
        .map(|(t, counts)| TypeHistogram {
            type_name: t.as_str().to_string(),
            counts,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
