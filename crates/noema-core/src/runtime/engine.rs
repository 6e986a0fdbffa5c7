//! The engine: the single process-wide runtime state and its tick loop.
//!
//! One `Engine` owns the store, frontier, staged deltas, rolling statistics,
//! controller, and emitter. The tick loop is the sole mutator of energies
//! and frontier sets; structural writes and queries serialize through the
//! same owner, so readers always see a consistent between-tick snapshot.
//!
//! One frame: snapshot the active set, stage strides, commit atomically,
//! report flips, decay, learn behind the newness gate, run the rho
//! controller, seal statistics, emit frame events.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::config::{DiffusionConfig, EngineConfig};
use crate::criticality::{
    coherence, sample_rho, CriticalityController, CriticalityUpdate, FlowObservation, SafetyState,
};
use crate::decay::{apply_activation_decay, apply_weight_decay};
use crate::diffusion::{commit, execute_strides, DeltaBuffer, FanoutSelector, TypeWeightStats};
use crate::learning::LinkStrengthener;
use crate::error::{EngineError, Result};
use crate::events::{
    energy_histograms, weight_histograms, EventEmitter, EventKind, EventRecord,
};
use crate::frontier::Frontier;
use crate::graph::{LinkKey, LinkType, LinkVersion, LogicalId, NodeType, NodeVersion, VersionId};
use crate::scheduler::TickScheduler;
use crate::stimulus::{InjectReport, InjectRequest, StimulusInjector};
use crate::store::{GraphStore, TimeAxis};

use super::commands::{
    Command, CommandOutcome, ContextReconstructReport, ContextReconstructRequest, EngineStats,
    EntitySummary, NodeSample, QueryRequest, QueryResponse, QueryResult, SnapshotReport,
};

/// Conservation tolerance: 1% of injected energy, floored.
const CONSERVATION_TOLERANCE: f64 = 0.01;
const CONSERVATION_FLOOR: f64 = 1e-9;

/// Diagnostic snapshot sample size.
const SNAPSHOT_SAMPLE: usize = 64;

/// How many hubs a context reconstruction reports.
const ENTITY_HUBS: usize = 5;

/// Target nudge applied while task nodes are active and the adaptive-target
/// switch is on.
const TASK_TARGET_NUDGE: f64 = 0.05;

// ============================================================================
// TICK SUMMARY
// ============================================================================

/// What one tick did, returned to embedders.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick that ran
    pub tick_id: u64,
    /// Interval the physics used
    pub dt: f64,
    /// Strides executed
    pub strides: usize,
    /// Gross energy moved by strides
    pub energy_transferred: f64,
    /// Energy removed by decay
    pub energy_decayed: f64,
    /// Absolute conservation residual
    pub conservation_error: f64,
    /// Threshold crossings reported
    pub flips: usize,
    /// Link strengthenings applied
    pub weight_updates: usize,
    /// Branching-ratio proxy
    pub rho_proxy: f64,
    /// Power-iteration sample, when this tick was on cadence
    pub rho_sampled: Option<f64>,
    /// Safety state after the controller step
    pub state: SafetyState,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The consciousness graph runtime.
pub struct Engine {
    config: EngineConfig,
    store: GraphStore,
    frontier: Frontier,
    delta: DeltaBuffer,
    weight_stats: TypeWeightStats,
    selector: FanoutSelector,
    scheduler: TickScheduler,
    injector: StimulusInjector,
    controller: CriticalityController,
    strengthener: LinkStrengthener,
    emitter: EventEmitter,
    tick_id: u64,
    /// Energy injected since the last tick, consumed by the conservation
    /// check and the branching proxy.
    injected_since_tick: f64,
    /// Total energy at the previous frame boundary, the baseline for the
    /// per-tick conservation ledger.
    prev_total_energy: f64,
}

impl Engine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let selector = FanoutSelector::new(config.diffusion.top_k);
        let scheduler = TickScheduler::new(config.scheduler.clone());
        let emitter = EventEmitter::new(config.events.buffer_capacity);
        Ok(Self {
            config,
            store: GraphStore::new(),
            frontier: Frontier::new(),
            delta: DeltaBuffer::new(),
            weight_stats: TypeWeightStats::new(),
            selector,
            scheduler,
            injector: StimulusInjector::new(),
            controller: CriticalityController::new(),
            strengthener: LinkStrengthener::new(),
            emitter,
            tick_id: 0,
            injected_since_tick: 0.0,
            prev_total_energy: 0.0,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the store for embedders and tests.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Subscribe to the live event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventRecord> {
        self.emitter.subscribe()
    }

    /// Snapshot of the replay buffer, oldest first.
    pub fn replay_events(&self) -> Vec<EventRecord> {
        self.emitter.replay()
    }

    /// Ticks run so far.
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    // ========================================================================
    // STRUCTURAL WRITES
    // ========================================================================

    /// Create a node; emits `version.create`.
    pub fn create_node(
        &mut self,
        logical: LogicalId,
        type_name: &str,
        description: String,
        meta: Option<Map<String, Value>>,
        valid_from: Option<DateTime<Utc>>,
    ) -> Result<VersionId> {
        let node_type = NodeType::parse_name(type_name)
            .ok_or_else(|| EngineError::TypeUnknown(type_name.to_string()))?;
        let receipt = self.store.create_node(
            logical.clone(),
            node_type,
            description,
            meta.unwrap_or_default(),
            valid_from,
        )?;
        self.emitter.emit(
            self.tick_id,
            EventKind::VersionCreate {
                logical_id: logical,
                version_id: receipt.version_id.clone(),
                retroactive: receipt.retroactive,
            },
        );
        Ok(receipt.version_id)
    }

    /// Supersede a node; emits `version.supersede`.
    pub fn supersede_node(
        &mut self,
        logical: &LogicalId,
        new_description: String,
        new_meta: Option<Map<String, Value>>,
        new_valid_from: Option<DateTime<Utc>>,
    ) -> Result<(VersionId, VersionId)> {
        let receipt =
            self.store
                .supersede_node(logical, new_description, new_meta, new_valid_from)?;
        self.emitter.emit(
            self.tick_id,
            EventKind::VersionSupersede {
                logical_id: logical.clone(),
                old_version: receipt.old_version.clone(),
                new_version: receipt.new_version.clone(),
            },
        );
        Ok((receipt.old_version, receipt.new_version))
    }

    /// Create a link; emits `version.create` keyed by the endpoint pair.
    pub fn create_link(
        &mut self,
        src: LogicalId,
        dst: LogicalId,
        type_name: &str,
        weight_log: f64,
        confidence: f64,
        valid_from: Option<DateTime<Utc>>,
    ) -> Result<VersionId> {
        let link_type = LinkType::parse_name(type_name)
            .ok_or_else(|| EngineError::TypeUnknown(type_name.to_string()))?;
        let key = LinkKey::new(src.clone(), dst.clone());
        let receipt =
            self.store
                .create_link(src, dst, link_type, weight_log, confidence, valid_from)?;
        self.emitter.emit(
            self.tick_id,
            EventKind::VersionCreate {
                logical_id: LogicalId::new(key.to_string()),
                version_id: receipt.version_id.clone(),
                retroactive: receipt.retroactive,
            },
        );
        Ok(receipt.version_id)
    }

    /// Supersede a link; emits `version.supersede`.
    pub fn supersede_link(
        &mut self,
        src: &LogicalId,
        dst: &LogicalId,
        new_type_name: Option<&str>,
        new_confidence: Option<f64>,
        new_valid_from: Option<DateTime<Utc>>,
    ) -> Result<(VersionId, VersionId)> {
        let new_link_type = match new_type_name {
            Some(name) => Some(
                LinkType::parse_name(name)
                    .ok_or_else(|| EngineError::TypeUnknown(name.to_string()))?,
            ),
            None => None,
        };
        let key = LinkKey::new(src.clone(), dst.clone());
        let receipt =
            self.store
                .supersede_link(&key, new_link_type, new_confidence, new_valid_from)?;
        self.emitter.emit(
            self.tick_id,
            EventKind::VersionSupersede {
                logical_id: LogicalId::new(key.to_string()),
                old_version: receipt.old_version.clone(),
                new_version: receipt.new_version.clone(),
            },
        );
        Ok((receipt.old_version, receipt.new_version))
    }

    // ========================================================================
    // STIMULUS
    // ========================================================================

    /// Inject a stimulus batch between ticks; emits `stimulus.inject`.
    pub fn inject(&mut self, request: &InjectRequest) -> Result<InjectReport> {
        if let Some(deadline) = request.deadline {
            if Utc::now() > deadline {
                return Err(EngineError::Busy);
            }
        }
        let report = self.injector.inject(
            &mut self.store,
            &self.config.injection,
            &self.config.features,
            request,
        )?;
        self.scheduler.note_stimulus();
        self.injected_since_tick += report.injected_total;
        self.emitter.emit(
            self.tick_id,
            EventKind::StimulusInject {
                targets: request
                    .targets
                    .iter()
                    .map(|t| (t.logical.clone(), t.weight))
                    .collect(),
                budget: request.budget,
            },
        );
        Ok(report)
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Scheduler-derived interval for the next tick, in seconds.
    pub fn current_dt(&mut self) -> f64 {
        self.scheduler.current_dt()
    }

    /// Run one tick with the scheduler-derived interval.
    pub fn tick(&mut self) -> TickSummary {
        let dt = self.scheduler.current_dt();
        self.tick_with_dt(dt)
    }

    /// Run one tick with an explicit interval. The frame's physics all
    /// multiply by `dt_secs`.
    pub fn tick_with_dt(&mut self, dt_secs: f64) -> TickSummary {
        self.tick_id += 1;
        let tick_id = self.tick_id;

        // 1. Snapshot the active set at frame start.
        let sources = self.store.iterate_active();
        self.emitter.emit(
            tick_id,
            EventKind::FrameStart {
                tick_id,
                dt: dt_secs,
                frontier_size: sources.len(),
            },
        );

        // 2. Clear staging.
        self.delta.clear();

        // 3. Stage strides against the last sealed weight stats.
        let diffusion = self.effective_diffusion();
        let pass = execute_strides(
            &self.store,
            &sources,
            &self.selector,
            &self.weight_stats,
            &diffusion,
            &self.config.features,
            dt_secs,
            &mut self.delta,
        );
        for record in &pass.records {
            self.emitter
                .emit(tick_id, EventKind::StrideExec(record.clone()));
        }

        // 4. Commit atomically; membership changes are reported against the
        //    previous frame boundary.
        let prev_active: HashSet<LogicalId> = self.frontier.active().cloned().collect();
        let outcome = commit(&mut self.store, &self.delta);
        let flips = self.frontier.apply_commit(&self.store);

        // 5. Activation decay, after commit; weight decay on its cadence.
        let decay_summary = apply_activation_decay(
            &mut self.store,
            &self.config.decay,
            &self.config.features,
            self.controller.delta_lever(),
            dt_secs,
        );
        if self.config.decay.weight_cadence_ticks > 0
            && tick_id % self.config.decay.weight_cadence_ticks == 0
        {
            apply_weight_decay(&mut self.store, &self.config.decay);
        }

        // Conservation ledger across the frame boundary: the measured change
        // in total energy since the last frame must equal what entered minus
        // what left (decay, stickiness, clamp losses). A mismatch means some
        // component's accounting drifted from the energies actually written.
        let injected = std::mem::take(&mut self.injected_since_tick);
        let total_energy: f64 = self.store.iter_runtime().map(|(_, rt)| rt.energy).sum();
        let measured_delta = total_energy - self.prev_total_energy;
        let expected_delta =
            injected - decay_summary.energy_decayed - pass.flow_through_loss - outcome.clip_loss;
        let conservation_error = (measured_delta - expected_delta).abs();
        self.prev_total_energy = total_energy;
        let tolerance = CONSERVATION_TOLERANCE * injected.max(CONSERVATION_FLOOR);
        let breached = conservation_error > tolerance.max(CONSERVATION_FLOOR);

        self.emitter.emit(
            tick_id,
            EventKind::CommitSummary {
                energy_transferred: pass.energy_transferred,
                energy_decay: decay_summary.energy_decayed,
                conservation_error,
            },
        );
        if breached {
            tracing::warn!(
                tick_id,
                conservation_error,
                "conservation breach; suppressing learning this tick"
            );
            self.emitter.emit(
                tick_id,
                EventKind::InvariantViolation {
                    tick_id,
                    message: format!(
                        "conservation error {conservation_error} exceeds tolerance {tolerance}"
                    ),
                },
            );
        }

        for flip in &flips {
            self.emitter.emit(tick_id, EventKind::NodeFlip(flip.clone()));
        }

        // 6. Learning, suppressed wholesale on a conservation breach.
        let weight_updates = if breached {
            Vec::new()
        } else {
            let flipped_up: HashSet<LogicalId> = flips
                .iter()
                .filter(|f| f.direction == crate::frontier::FlipDirection::Up)
                .map(|f| f.logical_id.clone())
                .collect();
            self.strengthener.strengthen(
                &mut self.store,
                &self.config.learning,
                &pass.records,
                &prev_active,
                &flipped_up,
            )
        };
        for update in &weight_updates {
            self.emitter
                .emit(tick_id, EventKind::WeightsUpdated(update.clone()));
        }

        // 7. Criticality: proxy every tick, authoritative sample on cadence.
        let flow = FlowObservation {
            transferred_out: pass.energy_transferred,
            injected,
        };
        let rho_proxy = self.controller.branching_ratio(&flow);
        let rho_sampled = if self.config.criticality.sample_cadence_ticks > 0
            && tick_id % self.config.criticality.sample_cadence_ticks == 0
        {
            Some(sample_rho(
                &self.store,
                &self.frontier,
                &self.selector,
                &self.weight_stats,
                (diffusion.alpha_tick * dt_secs).clamp(0.0, 1.0),
                self.effective_delta(dt_secs),
                self.config.criticality.power_iterations,
            ))
        } else {
            None
        };
        // A dead sub-operator sample carries no signal; fall back to the
        // proxy rather than steering on zero.
        let rho_sampled = rho_sampled.filter(|rho| *rho > 0.0);

        let state = self.controller.control(
            &self.config.criticality,
            self.effective_target(),
            rho_proxy,
            rho_sampled,
            self.config.features.criticality_modes,
        );
        let coherence_value = self
            .config
            .features
            .coherence_metric
            .then(|| coherence(&self.store, &self.frontier));
        self.emitter.emit(
            tick_id,
            EventKind::CriticalityUpdate(CriticalityUpdate {
                rho_proxy,
                rho_sampled,
                state,
                delta_lever: self.controller.delta_lever(),
                alpha_scale: self.controller.alpha_scale(),
                coherence: coherence_value,
            }),
        );

        // 8. Seal rolling stats for the next frame's readers.
        self.weight_stats.seal(&self.store);

        if self.config.events.histogram_cadence_ticks > 0
            && tick_id % self.config.events.histogram_cadence_ticks == 0
        {
            let bins = self.config.events.histogram_bins;
            let energy = energy_histograms(&self.store, bins);
            self.emitter
                .emit(tick_id, EventKind::EnergyHistogram { histograms: energy });
            let weights =
                weight_histograms(&self.store, bins, self.config.learning.weight_ceiling);
            self.emitter
                .emit(tick_id, EventKind::WeightHistogram { histograms: weights });
        }

        self.emitter.emit(tick_id, EventKind::FrameEnd { tick_id });

        TickSummary {
            tick_id,
            dt: dt_secs,
            strides: pass.records.len(),
            energy_transferred: pass.energy_transferred,
            energy_decayed: decay_summary.energy_decayed,
            conservation_error,
            flips: flips.len(),
            weight_updates: weight_updates.len(),
            rho_proxy,
            rho_sampled,
            state,
        }
    }

    /// Diffusion config with the controller's alpha lever folded in when the
    /// criticality-modes switch is on.
    fn effective_diffusion(&self) -> DiffusionConfig {
        let mut diffusion = self.config.diffusion.clone();
        if self.config.features.criticality_modes {
            diffusion.alpha_tick =
                (diffusion.alpha_tick * self.controller.alpha_scale()).clamp(1e-6, 0.1);
        }
        diffusion
    }

    /// Mean per-tick decay fraction over the active set, fed to the sampled
    /// operator.
    fn effective_delta(&self, dt_secs: f64) -> f64 {
        let lever = self.controller.delta_lever();
        let active: Vec<&LogicalId> = self.frontier.active().collect();
        if active.is_empty() {
            return lever;
        }
        let mean_retention: f64 = active
            .iter()
            .map(|logical| {
                let node_type = self
                    .store
                    .live_node(logical)
                    .map(|v| v.node_type)
                    .unwrap_or_default();
                self.config.decay.profile(node_type).lambda_e.powf(dt_secs)
            })
            .sum::<f64>()
            / active.len() as f64;
        (1.0 - mean_retention * (1.0 - lever)).clamp(0.0, 1.0)
    }

    /// Controller target, nudged while task nodes are active when the
    /// adaptive-target switch is on.
    fn effective_target(&self) -> f64 {
        let base = self.config.criticality.rho_target;
        if !self.config.features.task_adaptive_targets {
            return base;
        }
        let task_active = self.frontier.active().any(|logical| {
            self.store
                .live_node(logical)
                .map(|v| v.node_type == NodeType::Task)
                .unwrap_or(false)
        });
        if task_active {
            (base + TASK_TARGET_NUDGE).min(1.2)
        } else {
            base
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// As-of node resolution.
    pub fn as_of_node(
        &self,
        logical: &LogicalId,
        axis: TimeAxis,
        instant: DateTime<Utc>,
    ) -> Option<NodeVersion> {
        self.store.as_of_node(logical, axis, instant)
    }

    /// As-of link resolution.
    pub fn as_of_link(
        &self,
        src: &LogicalId,
        dst: &LogicalId,
        axis: TimeAxis,
        instant: DateTime<Utc>,
    ) -> Option<LinkVersion> {
        self.store
            .as_of_link(&LinkKey::new(src.clone(), dst.clone()), axis, instant)
    }

    /// Version chain of a node, oldest first.
    pub fn history(&self, logical: &LogicalId) -> Vec<NodeVersion> {
        self.store.node_history(logical)
    }

    /// Diagnostic frontier/energy snapshot.
    pub fn snapshot(&self) -> SnapshotReport {
        let mut sample: Vec<NodeSample> = self
            .store
            .iter_runtime()
            .map(|(logical, rt)| NodeSample {
                logical_id: logical.clone(),
                energy: rt.energy,
                threshold: rt.threshold,
            })
            .collect();
        sample.sort_by(|a, b| {
            b.energy
                .partial_cmp(&a.energy)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.logical_id.cmp(&b.logical_id))
        });
        sample.truncate(SNAPSHOT_SAMPLE);

        SnapshotReport {
            active: self.store.iterate_active(),
            shadow: self.frontier.shadow().cloned().collect(),
            sample,
        }
    }

    /// Aggregate runtime statistics.
    pub fn stats(&self) -> EngineStats {
        let mut totals: HashMap<NodeType, (f64, usize)> = HashMap::new();
        for (logical, rt) in self.store.iter_runtime() {
            let node_type = self
                .store
                .live_node(logical)
                .map(|v| v.node_type)
                .unwrap_or_default();
            let entry = totals.entry(node_type).or_insert((0.0, 0));
            entry.0 += rt.energy;
            entry.1 += 1;
        }
        let mean_energy_by_type = totals
            .into_iter()
            .map(|(t, (sum, n))| (t, sum / n.max(1) as f64))
            .collect();

        EngineStats {
            node_count: self.store.node_count(),
            link_count: self.store.link_count(),
            version_count: self.store.version_count(),
            active_count: self.store.iterate_active().len(),
            shadow_count: self.frontier.shadow_len(),
            tick_id: self.tick_id,
            last_seq: self.emitter.last_seq(),
            dropped_events: self.emitter.dropped(),
            mean_energy_by_type,
        }
    }

    /// Inject into the entry targets, run up to `max_ticks`, and report the
    /// activation pattern that formed.
    pub fn context_reconstruct(
        &mut self,
        request: &ContextReconstructRequest,
    ) -> Result<ContextReconstructReport> {
        let inject_request = InjectRequest {
            targets: request
                .entry_targets
                .iter()
                .map(|(logical, weight)| crate::stimulus::StimulusTarget {
                    logical: logical.clone(),
                    weight: *weight,
                })
                .collect(),
            budget: request.budget,
            deadline: None,
            affect: None,
        };
        self.inject(&inject_request)?;

        let mut ticks_run = 0u32;
        for _ in 0..request.max_ticks {
            let summary = self.tick();
            ticks_run += 1;
            if summary.strides == 0 && self.store.iterate_active().is_empty() {
                break;
            }
        }

        let nodes_above_threshold: Vec<NodeSample> = self
            .store
            .iterate_active()
            .into_iter()
            .map(|logical| {
                let rt = self.store.runtime(&logical);
                NodeSample {
                    energy: rt.map(|r| r.energy).unwrap_or(0.0),
                    threshold: rt.map(|r| r.threshold).unwrap_or(0.0),
                    logical_id: logical,
                }
            })
            .collect();

        let entity_summary = self.entity_neighborhoods(&nodes_above_threshold);
        let similarity = request
            .reference_snapshot
            .as_ref()
            .map(|reference| self.pattern_similarity(&reference.energies));

        Ok(ContextReconstructReport {
            ticks_run,
            nodes_above_threshold,
            entity_summary,
            similarity,
        })
    }

    /// Approximate entities: the highest-degree active hubs with their
    /// active out-neighbors. Read-time aggregation only, nothing stored.
    fn entity_neighborhoods(&self, active: &[NodeSample]) -> Vec<EntitySummary> {
        let active_set: HashSet<&LogicalId> = active.iter().map(|s| &s.logical_id).collect();
        let mut hubs: Vec<(&NodeSample, usize)> = active
            .iter()
            .map(|sample| (sample, self.store.degree_out(&sample.logical_id)))
            .collect();
        hubs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.logical_id.cmp(&b.0.logical_id)));

        hubs.into_iter()
            .take(ENTITY_HUBS)
            .map(|(sample, _)| {
                let members: Vec<LogicalId> = self
                    .store
                    .adjacency_out(&sample.logical_id)
                    .into_iter()
                    .filter(|link| active_set.contains(&link.dst))
                    .map(|link| link.dst)
                    .collect();
                let energy_sum: f64 = members
                    .iter()
                    .map(|m| self.store.energy(m))
                    .sum::<f64>()
                    + sample.energy;
                let mean_energy = energy_sum / (members.len() + 1) as f64;
                EntitySummary {
                    hub: sample.logical_id.clone(),
                    members,
                    mean_energy,
                }
            })
            .collect()
    }

    /// Cosine similarity between current energies and a reference pattern
    /// over the union of their supports.
    fn pattern_similarity(&self, reference: &[(LogicalId, f64)]) -> f64 {
        let mut ids: std::collections::BTreeSet<LogicalId> =
            reference.iter().map(|(id, _)| id.clone()).collect();
        for (logical, rt) in self.store.iter_runtime() {
            if rt.energy > 0.0 {
                ids.insert(logical.clone());
            }
        }
        let reference_map: HashMap<&LogicalId, f64> =
            reference.iter().map(|(id, e)| (id, *e)).collect();

        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        for id in &ids {
            let a = self.store.energy(id);
            let b = reference_map.get(id).copied().unwrap_or(0.0);
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }

    // ========================================================================
    // COMMAND / QUERY DISPATCH
    // ========================================================================

    /// Apply one command.
    pub fn execute_command(&mut self, command: Command) -> Result<CommandOutcome> {
        match command {
            Command::CreateNode {
                logical,
                node_type,
                description,
                meta,
                valid_from,
            } => {
                let version_id =
                    self.create_node(logical, &node_type, description, meta, valid_from)?;
                Ok(CommandOutcome::Created { version_id })
            }
            Command::SupersedeNode {
                logical,
                new_description,
                new_meta,
                new_valid_from,
            } => {
                let (old_version, new_version) =
                    self.supersede_node(&logical, new_description, new_meta, new_valid_from)?;
                Ok(CommandOutcome::Superseded {
                    old_version,
                    new_version,
                })
            }
            Command::CreateLink {
                src,
                dst,
                link_type,
                weight_log,
                confidence,
                valid_from,
            } => {
                let version_id =
                    self.create_link(src, dst, &link_type, weight_log, confidence, valid_from)?;
                Ok(CommandOutcome::Created { version_id })
            }
            Command::SupersedeLink {
                src,
                dst,
                new_link_type,
                new_confidence,
                new_valid_from,
            } => {
                let (old_version, new_version) = self.supersede_link(
                    &src,
                    &dst,
                    new_link_type.as_deref(),
                    new_confidence,
                    new_valid_from,
                )?;
                Ok(CommandOutcome::Superseded {
                    old_version,
                    new_version,
                })
            }
            Command::Inject(request) => {
                let report = self.inject(&request)?;
                Ok(CommandOutcome::Injected(report))
            }
            Command::ConfigureDecay {
                type_profiles,
                weight_cadence_ticks,
            } => {
                let mut decay = self.config.decay.clone();
                for (node_type, profile) in type_profiles {
                    decay.profiles.insert(node_type, profile);
                }
                if let Some(cadence) = weight_cadence_ticks {
                    decay.weight_cadence_ticks = cadence;
                }
                let mut candidate = self.config.clone();
                candidate.decay = decay;
                candidate.validate()?;
                self.config = candidate;
                Ok(CommandOutcome::Configured)
            }
            Command::ConfigureCriticality {
                target,
                k_p,
                k_alpha,
                cadence,
            } => {
                let mut candidate = self.config.clone();
                candidate.criticality.rho_target = target;
                candidate.criticality.k_p = k_p;
                candidate.criticality.k_alpha = k_alpha;
                if let Some(cadence) = cadence {
                    candidate.criticality.sample_cadence_ticks = cadence;
                }
                candidate.validate()?;
                self.config = candidate;
                Ok(CommandOutcome::Configured)
            }
        }
    }

    /// Serve one query.
    pub fn execute_query(&mut self, query: QueryRequest) -> Result<QueryResult> {
        match query {
            QueryRequest::AsOfNode {
                logical,
                axis,
                instant,
            } => {
                let axis = TimeAxis::parse_name(&axis)
                    .ok_or_else(|| EngineError::TypeUnknown(axis.clone()))?;
                Ok(QueryResult::Node {
                    version: self.as_of_node(&logical, axis, instant),
                })
            }
            QueryRequest::AsOfLink {
                src,
                dst,
                axis,
                instant,
            } => {
                let axis = TimeAxis::parse_name(&axis)
                    .ok_or_else(|| EngineError::TypeUnknown(axis.clone()))?;
                Ok(QueryResult::Link {
                    version: self.as_of_link(&src, &dst, axis, instant),
                })
            }
            QueryRequest::History { logical } => Ok(QueryResult::History {
                versions: self.history(&logical),
            }),
            QueryRequest::ContextReconstruct(request) => {
                Ok(QueryResult::Context(self.context_reconstruct(&request)?))
            }
            QueryRequest::Snapshot {} => Ok(QueryResult::Snapshot(self.snapshot())),
        }
    }

    /// Serve a query against a soft deadline; a missed deadline yields a
    /// best-effort result flagged partial instead of an error.
    pub fn execute_query_with_deadline(
        &mut self,
        query: QueryRequest,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<QueryResponse> {
        let partial = deadline.is_some_and(|d| Utc::now() > d);
        let result = self.execute_query(query)?;
        Ok(QueryResponse { result, partial })
    }
}

// ============================================================================
// TESTS
// ============================================================================
