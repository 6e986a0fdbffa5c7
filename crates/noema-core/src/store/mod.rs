//! Graph store - version chains, adjacency indices, runtime state
//!
//! In-memory realization of the persisted layout: a versions table keyed by
//! version id, a logical index mapping each logical id to its chain, and
//! adjacency indices for out- and in-links. Energies live in runtime records
//! and are not durable; learned weights are durable store state.
//!
//! The store is single-writer: all mutating operations go through the tick
//! thread or the command surface serialized in front of it. Mutations are
//! atomic per logical id; a rejected write leaves no partial state.

mod bitemporal;

pub use bitemporal::{check_intervals, resolve_as_of, TemporalRecord, TimeAxis};

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::graph::{
    LinkKey, LinkRuntime, LinkType, LinkVersion, LogicalId, NodeRuntime, NodeType, NodeVersion,
    ResolvedLink, VersionId,
};

/// Capacity of the as-of resolution cache. External collaborators tend to
/// replay the same handful of instants (deploy marks, session starts), so a
/// small cache absorbs most of the repeat lookups.
const AS_OF_CACHE_CAPACITY: usize = 512;

// ============================================================================
// RECEIPTS
// ============================================================================

/// Outcome of a version-creating write, carrying what the event layer needs.
#[derive(Debug, Clone)]
pub struct CreateReceipt {
    /// Id of the freshly inserted version
    pub version_id: VersionId,
    /// True when the reality interval starts before the write instant
    pub retroactive: bool,
}

/// Outcome of a supersession.
#[derive(Debug, Clone)]
pub struct SupersedeReceipt {
    /// Version whose knowledge interval was closed
    pub old_version: VersionId,
    /// Freshly inserted live version
    pub new_version: VersionId,
    /// True when the new reality interval starts before the old one
    pub retroactive: bool,
}

// ============================================================================
// GRAPH STORE
// ============================================================================

/// Versioned graph store with adjacency and runtime-state indices.
pub struct GraphStore {
    node_versions: HashMap<VersionId, NodeVersion>,
    link_versions: HashMap<VersionId, LinkVersion>,
    /// Chains ordered oldest-to-newest; append order is known_from order.
    node_chains: HashMap<LogicalId, Vec<VersionId>>,
    link_chains: HashMap<LinkKey, Vec<VersionId>>,
    out_links: HashMap<LogicalId, Vec<LinkKey>>,
    in_links: HashMap<LogicalId, Vec<LinkKey>>,
    /// Runtime state in id order: decay sweeps and stat seals accumulate
    /// floats deterministically across runs.
    node_runtime: BTreeMap<LogicalId, NodeRuntime>,
    link_runtime: BTreeMap<LinkKey, LinkRuntime>,
    /// As-of resolutions keyed by (logical, axis, instant in micros).
    /// Cleared wholesale on any version write; writes are rare next to reads.
    as_of_cache: Mutex<LruCache<(LogicalId, TimeAxis, i64), Option<VersionId>>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            node_versions: HashMap::new(),
            link_versions: HashMap::new(),
            node_chains: HashMap::new(),
            link_chains: HashMap::new(),
            out_links: HashMap::new(),
            in_links: HashMap::new(),
            node_runtime: BTreeMap::new(),
            link_runtime: BTreeMap::new(),
            as_of_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(AS_OF_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
        }
    }

    fn invalidate_as_of_cache(&self) {
        if let Ok(mut cache) = self.as_of_cache.lock() {
            cache.clear();
        }
    }

    // ========================================================================
    // NODE WRITES
    // ========================================================================

    /// Create the first version of a node.
    ///
    /// Fails with `DuplicateLogical` when a live version already exists;
    /// callers wanting replacement must supersede instead.
    pub fn create_node(
        &mut self,
        logical: LogicalId,
        node_type: NodeType,
        description: String,
        meta: Map<String, Value>,
        valid_from: Option<DateTime<Utc>>,
    ) -> Result<CreateReceipt> {
        let now = Utc::now();
        if self.live_node(&logical).is_some() {
            return Err(EngineError::DuplicateLogical(logical));
        }

        let valid_from = valid_from.unwrap_or(now);
        check_intervals(valid_from, None, now, None)?;

        let version_id = VersionId::fresh();
        let seq = self
            .node_chains
            .get(&logical)
            .and_then(|chain| chain.last())
            .and_then(|id| self.node_versions.get(id))
            .map(|v| v.version_seq + 1)
            .unwrap_or(1);

        let version = NodeVersion {
            logical_id: logical.clone(),
            version_id: version_id.clone(),
            version_seq: seq,
            node_type,
            description,
            meta,
            valid_from,
            valid_to: None,
            known_from: now,
            known_to: None,
            supersedes: None,
            superseded_by: None,
        };

        self.node_versions.insert(version_id.clone(), version);
        self.node_chains
            .entry(logical.clone())
            .or_default()
            .push(version_id.clone());
        self.node_runtime.entry(logical).or_default();
        self.invalidate_as_of_cache();

        Ok(CreateReceipt {
            version_id,
            retroactive: valid_from < now,
        })
    }

    /// Close the live version of a node and insert its replacement.
    ///
    /// Atomic across the two affected rows: the old version's knowledge
    /// interval closes at `now` and gains its forward chain link, the new
    /// version opens at `now`.
    pub fn supersede_node(
        &mut self,
        logical: &LogicalId,
        new_description: String,
        new_meta: Option<Map<String, Value>>,
        new_valid_from: Option<DateTime<Utc>>,
    ) -> Result<SupersedeReceipt> {
        let now = Utc::now();
        let old = self
            .live_node(logical)
            .ok_or_else(|| EngineError::NotFound(logical.clone()))?
            .clone();

        let valid_from = new_valid_from.unwrap_or(now);
        check_intervals(valid_from, None, now, None)?;

        let new_id = VersionId::fresh();
        let new_version = NodeVersion {
            logical_id: logical.clone(),
            version_id: new_id.clone(),
            version_seq: old.version_seq + 1,
            node_type: old.node_type,
            description: new_description,
            meta: new_meta.unwrap_or_else(|| old.meta.clone()),
            valid_from,
            valid_to: None,
            known_from: now,
            known_to: None,
            supersedes: Some(old.version_id.clone()),
            superseded_by: None,
        };

        let retroactive = valid_from < old.valid_from;

        if let Some(v0) = self.node_versions.get_mut(&old.version_id) {
            v0.known_to = Some(now);
            v0.superseded_by = Some(new_id.clone());
        }
        self.node_versions.insert(new_id.clone(), new_version);
        self.node_chains
            .entry(logical.clone())
            .or_default()
            .push(new_id.clone());
        self.invalidate_as_of_cache();

        Ok(SupersedeReceipt {
            old_version: old.version_id,
            new_version: new_id,
            retroactive,
        })
    }

    // ========================================================================
    // LINK WRITES
    // ========================================================================

    /// Create the first version of a directed link.
    ///
    /// Both endpoints must resolve to live node versions. The initial learned
    /// weight seeds the durable link-runtime record.
    pub fn create_link(
        &mut self,
        src: LogicalId,
        dst: LogicalId,
        link_type: LinkType,
        weight_log: f64,
        confidence: f64,
        valid_from: Option<DateTime<Utc>>,
    ) -> Result<CreateReceipt> {
        let now = Utc::now();
        if self.live_node(&src).is_none() {
            return Err(EngineError::NotFound(src));
        }
        if self.live_node(&dst).is_none() {
            return Err(EngineError::NotFound(dst));
        }

        let key = LinkKey {
            src: src.clone(),
            dst: dst.clone(),
        };
        if self.live_link(&key).is_some() {
            return Err(EngineError::DuplicateLogical(LogicalId::new(key.to_string())));
        }

        let valid_from = valid_from.unwrap_or(now);
        check_intervals(valid_from, None, now, None)?;

        let version_id = VersionId::fresh();
        let seq = self
            .link_chains
            .get(&key)
            .and_then(|chain| chain.last())
            .and_then(|id| self.link_versions.get(id))
            .map(|v| v.version_seq + 1)
            .unwrap_or(1);

        let version = LinkVersion {
            src: src.clone(),
            dst: dst.clone(),
            version_id: version_id.clone(),
            version_seq: seq,
            link_type,
            confidence: confidence.clamp(0.0, 1.0),
            valid_from,
            valid_to: None,
            known_from: now,
            known_to: None,
            supersedes: None,
            superseded_by: None,
        };

        self.link_versions.insert(version_id.clone(), version);
        self.link_chains
            .entry(key.clone())
            .or_default()
            .push(version_id.clone());
        let out = self.out_links.entry(src).or_default();
        if !out.contains(&key) {
            out.push(key.clone());
        }
        let inn = self.in_links.entry(dst).or_default();
        if !inn.contains(&key) {
            inn.push(key.clone());
        }
        self.link_runtime
            .entry(key)
            .or_insert(LinkRuntime { weight_log });
        self.invalidate_as_of_cache();

        Ok(CreateReceipt {
            version_id,
            retroactive: valid_from < now,
        })
    }

    /// Close the live version of a link and insert its replacement.
    pub fn supersede_link(
        &mut self,
        key: &LinkKey,
        new_link_type: Option<LinkType>,
        new_confidence: Option<f64>,
        new_valid_from: Option<DateTime<Utc>>,
    ) -> Result<SupersedeReceipt> {
        let now = Utc::now();
        let old = self
            .live_link(key)
            .ok_or_else(|| EngineError::NotFound(LogicalId::new(key.to_string())))?
            .clone();

        let valid_from = new_valid_from.unwrap_or(now);
        check_intervals(valid_from, None, now, None)?;

        let new_id = VersionId::fresh();
        let new_version = LinkVersion {
            src: old.src.clone(),
            dst: old.dst.clone(),
            version_id: new_id.clone(),
            version_seq: old.version_seq + 1,
            link_type: new_link_type.unwrap_or(old.link_type),
            confidence: new_confidence.unwrap_or(old.confidence).clamp(0.0, 1.0),
            valid_from,
            valid_to: None,
            known_from: now,
            known_to: None,
            supersedes: Some(old.version_id.clone()),
            superseded_by: None,
        };

        let retroactive = valid_from < old.valid_from;

        if let Some(v0) = self.link_versions.get_mut(&old.version_id) {
            v0.known_to = Some(now);
            v0.superseded_by = Some(new_id.clone());
        }
        self.link_versions.insert(new_id.clone(), new_version);
        self.link_chains
            .entry(key.clone())
            .or_default()
            .push(new_id.clone());
        self.invalidate_as_of_cache();

        Ok(SupersedeReceipt {
            old_version: old.version_id,
            new_version: new_id,
            retroactive,
        })
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Current believed version of a node, if any.
    pub fn live_node(&self, logical: &LogicalId) -> Option<&NodeVersion> {
        let chain = self.node_chains.get(logical)?;
        let last = self.node_versions.get(chain.last()?)?;
        last.is_live().then_some(last)
    }

    /// Current believed version of a link, if any.
    pub fn live_link(&self, key: &LinkKey) -> Option<&LinkVersion> {
        let chain = self.link_chains.get(key)?;
        let last = self.link_versions.get(chain.last()?)?;
        last.is_live().then_some(last)
    }

    /// Live version of the link between two endpoints, if one exists.
    pub fn link_between(&self, src: &LogicalId, dst: &LogicalId) -> Option<&LinkVersion> {
        self.live_link(&LinkKey {
            src: src.clone(),
            dst: dst.clone(),
        })
    }

    /// Version chain of a node oldest-to-newest.
    pub fn node_history(&self, logical: &LogicalId) -> Vec<NodeVersion> {
        self.node_chains
            .get(logical)
            .map(|chain| {
                chain
                    .iter()
                    .filter_map(|id| self.node_versions.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// As-of resolution for a node on the given axis.
    pub fn as_of_node(
        &self,
        logical: &LogicalId,
        axis: TimeAxis,
        instant: DateTime<Utc>,
    ) -> Option<NodeVersion> {
        let cache_key = (logical.clone(), axis, instant.timestamp_micros());
        if let Ok(mut cache) = self.as_of_cache.lock() {
            if let Some(hit) = cache.get(&cache_key) {
                return hit
                    .as_ref()
                    .and_then(|id| self.node_versions.get(id))
                    .cloned();
            }
        }

        let chain = self.node_chains.get(logical)?;
        let versions: Vec<&NodeVersion> = chain
            .iter()
            .filter_map(|id| self.node_versions.get(id))
            .collect();
        let resolved = resolve_as_of(versions.iter().copied(), axis, instant);

        if let Ok(mut cache) = self.as_of_cache.lock() {
            cache.put(cache_key, resolved.map(|v| v.version_id.clone()));
        }
        resolved.cloned()
    }

    /// As-of resolution for a link on the given axis.
    pub fn as_of_link(
        &self,
        key: &LinkKey,
        axis: TimeAxis,
        instant: DateTime<Utc>,
    ) -> Option<LinkVersion> {
        let chain = self.link_chains.get(key)?;
        let versions: Vec<&LinkVersion> = chain
            .iter()
            .filter_map(|id| self.link_versions.get(id))
            .collect();
        resolve_as_of(versions.iter().copied(), axis, instant).cloned()
    }

    /// Out-links of a node whose endpoints both resolve to live versions.
    pub fn adjacency_out(&self, logical: &LogicalId) -> Vec<ResolvedLink> {
        self.resolve_adjacency(self.out_links.get(logical))
    }

    /// In-links of a node whose endpoints both resolve to live versions.
    pub fn adjacency_in(&self, logical: &LogicalId) -> Vec<ResolvedLink> {
        self.resolve_adjacency(self.in_links.get(logical))
    }

    fn resolve_adjacency(&self, keys: Option<&Vec<LinkKey>>) -> Vec<ResolvedLink> {
        let Some(keys) = keys else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|key| {
                let version = self.live_link(key)?;
                // Endpoint liveness gates traversal; a superseded-away
                // endpoint silently drops the edge from adjacency.
                self.live_node(&key.src)?;
                self.live_node(&key.dst)?;
                Some(ResolvedLink {
                    src: key.src.clone(),
                    dst: key.dst.clone(),
                    version_id: version.version_id.clone(),
                    link_type: version.link_type,
                    confidence: version.confidence,
                    weight_log: self
                        .link_runtime
                        .get(key)
                        .map(|rt| rt.weight_log)
                        .unwrap_or(0.0),
                })
            })
            .collect()
    }

    /// Out-degree counting only live-resolvable links.
    pub fn degree_out(&self, logical: &LogicalId) -> usize {
        self.adjacency_out(logical).len()
    }

    // ========================================================================
    // RUNTIME STATE
    // ========================================================================

    /// Runtime record of a node, if it exists.
    pub fn runtime(&self, logical: &LogicalId) -> Option<&NodeRuntime> {
        self.node_runtime.get(logical)
    }

    /// Mutable runtime record of a node.
    pub fn runtime_mut(&mut self, logical: &LogicalId) -> Option<&mut NodeRuntime> {
        self.node_runtime.get_mut(logical)
    }

    /// Activation energy of a node (0 when unknown).
    pub fn energy(&self, logical: &LogicalId) -> f64 {
        self.node_runtime
            .get(logical)
            .map(|rt| rt.energy)
            .unwrap_or(0.0)
    }

    /// Write an energy value, clamped to [0, 1].
    pub fn set_energy(&mut self, logical: &LogicalId, energy: f64) {
        if let Some(rt) = self.node_runtime.get_mut(logical) {
            rt.energy = energy.clamp(0.0, 1.0);
        }
    }

    /// Iterate all node runtime records.
    pub fn iter_runtime(&self) -> impl Iterator<Item = (&LogicalId, &NodeRuntime)> {
        self.node_runtime.iter()
    }

    /// Iterate all node runtime records mutably.
    pub fn iter_runtime_mut(&mut self) -> impl Iterator<Item = (&LogicalId, &mut NodeRuntime)> {
        self.node_runtime.iter_mut()
    }

    /// Logical ids currently at or above threshold, in id order; used by
    /// the tick loop.
    pub fn iterate_active(&self) -> Vec<LogicalId> {
        self.node_runtime
            .iter()
            .filter(|(_, rt)| rt.is_active())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Learned weight of a link (log units, 0 when unknown).
    pub fn link_weight_log(&self, key: &LinkKey) -> f64 {
        self.link_runtime
            .get(key)
            .map(|rt| rt.weight_log)
            .unwrap_or(0.0)
    }

    /// Overwrite the learned weight of a link.
    pub fn set_link_weight_log(&mut self, key: &LinkKey, weight_log: f64) {
        if let Some(rt) = self.link_runtime.get_mut(key) {
            rt.weight_log = weight_log;
        }
    }

    /// Iterate all link runtime records with the live link type.
    pub fn iter_link_weights(&self) -> impl Iterator<Item = (&LinkKey, LinkType, f64)> {
        self.link_runtime.iter().filter_map(|(key, rt)| {
            let version = self.live_link(key)?;
            Some((key, version.link_type, rt.weight_log))
        })
    }

    /// Mutably iterate link weights with the live link type.
    pub fn for_each_link_weight_mut(&mut self, mut f: impl FnMut(&LinkKey, LinkType, &mut f64)) {
        let live_types: HashMap<LinkKey, LinkType> = self
            .link_runtime
            .keys()
            .filter_map(|key| self.live_link(key).map(|v| (key.clone(), v.link_type)))
            .collect();
        for (key, rt) in self.link_runtime.iter_mut() {
            if let Some(link_type) = live_types.get(key) {
                f(key, *link_type, &mut rt.weight_log);
            }
        }
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Number of logical nodes with a live version.
    pub fn node_count(&self) -> usize {
        self.node_chains
            .keys()
            .filter(|id| self.live_node(id).is_some())
            .count()
    }

    /// Number of logical links with a live version.
    pub fn link_count(&self) -> usize {
        self.link_chains
            .keys()
            .filter(|key| self.live_link(key).is_some())
            .count()
    }

    /// Total version rows (nodes + links), live or superseded.
    pub fn version_count(&self) -> usize {
        self.node_versions.len() + self.link_versions.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
