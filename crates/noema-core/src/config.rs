//! Engine configuration surface.
//!
//! One nested record covering every tunable, hot-reloadable section by
//! section through the command surface. All optional physics (priming,
//! stickiness, consolidation, resistance, coherence, criticality modes,
//! task-adaptive targets) sit behind individual kill switches that default
//! off; a default-configured engine runs the deterministic baseline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::graph::NodeType;

// ============================================================================
// DIFFUSION
// ============================================================================

/// Stride diffusion tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffusionConfig {
    /// Per-tick diffusion share, in (0, 0.1]
    pub alpha_tick: f64,
    /// Per-source transfer cap as a fraction of source energy, in [0.05, 0.2]
    pub beta_cap: f64,
    /// K for selective fanout, in 1..=4
    pub top_k: usize,
    /// Temperature for the softmax split across top-K targets
    pub softmax_temperature: f64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            alpha_tick: 0.02,
            beta_cap: 0.10,
            top_k: 1,
            softmax_temperature: 1.0,
        }
    }
}

// ============================================================================
// DECAY
// ============================================================================

/// Per-type decay factors. `lambda_e` drives activation decay every tick;
/// `lambda_w` drives weight decay on the slow cadence and sits much closer
/// to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayProfile {
    /// Activation retention per second, in (0, 1)
    pub lambda_e: f64,
    /// Weight retention per slow-cadence application, in (0, 1)
    pub lambda_w: f64,
}

/// Decay engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecayConfig {
    /// Per-type profiles; types without an entry use the Default profile
    pub profiles: HashMap<NodeType, DecayProfile>,
    /// Weight decay fires once every this many ticks
    pub weight_cadence_ticks: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            NodeType::Memory,
            DecayProfile {
                lambda_e: 0.95,
                lambda_w: 0.999,
            },
        );
        profiles.insert(
            NodeType::Task,
            DecayProfile {
                lambda_e: 0.85,
                lambda_w: 0.995,
            },
        );
        profiles.insert(
            NodeType::Default,
            DecayProfile {
                lambda_e: 0.90,
                lambda_w: 0.998,
            },
        );
        Self {
            profiles,
            weight_cadence_ticks: 60,
        }
    }
}

impl DecayConfig {
    /// Profile for a type, falling back to the Default profile.
    pub fn profile(&self, node_type: NodeType) -> DecayProfile {
        self.profiles
            .get(&node_type)
            .or_else(|| self.profiles.get(&NodeType::Default))
            .copied()
            .unwrap_or(DecayProfile {
                lambda_e: 0.90,
                lambda_w: 0.998,
            })
    }
}

// ============================================================================
// CRITICALITY
// ============================================================================

/// Spectral-radius controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CriticalityConfig {
    /// Target spectral radius, in [0.8, 1.2]
    pub rho_target: f64,
    /// Proportional gain on the decay lever
    pub k_p: f64,
    /// Optional smaller gain on the diffusion share
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_alpha: Option<f64>,
    /// Power-iteration sampling cadence in ticks
    pub sample_cadence_ticks: u64,
    /// Power-iteration steps per sample
    pub power_iterations: usize,
    /// Lower bound of the controller's decay lever
    pub delta_min: f64,
    /// Upper bound of the controller's decay lever
    pub delta_max: f64,
    /// Hysteresis margin on safety-state transitions
    pub hysteresis: f64,
}

impl Default for CriticalityConfig {
    fn default() -> Self {
        Self {
            rho_target: 1.0,
            k_p: 0.2,
            k_alpha: None,
            sample_cadence_ticks: 10,
            power_iterations: 10,
            delta_min: 0.0,
            delta_max: 0.5,
            hysteresis: 0.02,
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Tick interval derivation bounds and smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Lower clamp on the derived interval, seconds
    pub min_dt_secs: f64,
    /// Upper clamp on the derived interval, seconds
    pub max_dt_secs: f64,
    /// Optional EMA smoothing horizon in seconds; None disables smoothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_horizon_secs: Option<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_dt_secs: 0.1,
            max_dt_secs: 3600.0,
            ema_horizon_secs: None,
        }
    }
}

// ============================================================================
// INJECTION
// ============================================================================

/// Stimulus injection limits and priming shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectionConfig {
    /// Maximum accepted budget per injection
    pub max_budget: f64,
    /// Priming gain p, capped at 0.2
    pub priming_gain: f64,
    /// Magnitude floor below which recent affect is ignored
    pub priming_floor: f64,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            max_budget: 1.0,
            priming_gain: 0.2,
            priming_floor: 0.1,
        }
    }
}

// ============================================================================
// LEARNING
// ============================================================================

/// Hebbian strengthening tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningConfig {
    /// Step size applied to the z-scored utility
    pub eta: f64,
    /// Soft ceiling on |weight_log| in natural units
    pub weight_ceiling: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            eta: 0.05,
            weight_ceiling: 2.0,
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Event emitter sizing and aggregate cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventConfig {
    /// Bounded buffer capacity; oldest non-critical events drop beyond it
    pub buffer_capacity: usize,
    /// Per-type histogram events fire once every this many ticks
    pub histogram_cadence_ticks: u64,
    /// Number of histogram bins over [0, 1] energies / weight range
    pub histogram_bins: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024,
            histogram_cadence_ticks: 50,
            histogram_bins: 10,
        }
    }
}

// ============================================================================
// FEATURE FLAGS
// ============================================================================

/// Kill switches for optional physics. Every switch defaults off; the
/// baseline run is deterministic and conservation-exact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    /// Reweight injection targets by recent affect
    pub affective_priming: bool,
    /// Target-side stickiness with flow-through loss accounting
    pub stickiness: bool,
    /// Consolidation exponent on retention
    pub consolidation: bool,
    /// Per-node decay resistance stretching half-life
    pub decay_resistance: bool,
    /// Report active-set coherence inside criticality updates
    pub coherence_metric: bool,
    /// Allow the controller to trim the diffusion share as well
    pub criticality_modes: bool,
    /// Nudge the rho target while task nodes are active
    pub task_adaptive_targets: bool,
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Stride diffusion tunables
    pub diffusion: DiffusionConfig,
    /// Per-type decay profiles and cadence
    pub decay: DecayConfig,
    /// Spectral-radius controller
    pub criticality: CriticalityConfig,
    /// Tick interval derivation
    pub scheduler: SchedulerConfig,
    /// Stimulus injection limits
    pub injection: InjectionConfig,
    /// Hebbian strengthening
    pub learning: LearningConfig,
    /// Event emitter sizing
    pub events: EventConfig,
    /// Optional physics kill switches
    pub features: FeatureFlags,
}

impl EngineConfig {
    /// Reject values outside their documented ranges before they reach the
    /// tick loop.
    pub fn validate(&self) -> Result<()> {
        let d = &self.diffusion;
        if !(d.alpha_tick > 0.0 && d.alpha_tick <= 0.1) {
            return Err(EngineError::InvalidConfig(format!(
                "alpha_tick {} outside (0, 0.1]",
                d.alpha_tick
            )));
        }
        if !(0.05..=0.2).contains(&d.beta_cap) {
            return Err(EngineError::InvalidConfig(format!(
                "beta_cap {} outside [0.05, 0.2]",
                d.beta_cap
            )));
        }
        if !(1..=4).contains(&d.top_k) {
            return Err(EngineError::InvalidConfig(format!(
                "top_k {} outside 1..=4",
                d.top_k
            )));
        }
        if d.softmax_temperature <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "softmax_temperature must be positive".to_string(),
            ));
        }

        for (node_type, profile) in &self.decay.profiles {
            if !(profile.lambda_e > 0.0 && profile.lambda_e < 1.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "lambda_e for {node_type} outside (0, 1)"
                )));
            }
            if !(profile.lambda_w > 0.0 && profile.lambda_w < 1.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "lambda_w for {node_type} outside (0, 1)"
                )));
            }
        }

        let c = &self.criticality;
        if !(0.8..=1.2).contains(&c.rho_target) {
            return Err(EngineError::InvalidConfig(format!(
                "rho_target {} outside [0.8, 1.2]",
                c.rho_target
            )));
        }
        if c.delta_min > c.delta_max {
            return Err(EngineError::InvalidConfig(
                "delta_min above delta_max".to_string(),
            ));
        }

        let s = &self.scheduler;
        if s.min_dt_secs <= 0.0 || s.min_dt_secs > s.max_dt_secs {
            return Err(EngineError::InvalidConfig(
                "scheduler bounds must satisfy 0 < min <= max".to_string(),
            ));
        }

        if self.injection.max_budget <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "max_budget must be positive".to_string(),
            ));
        }
        if self.injection.priming_gain > 0.2 {
            return Err(EngineError::InvalidConfig(
                "priming_gain capped at 0.2".to_string(),
            ));
        }

        if self.events.histogram_bins == 0 {
            return Err(EngineError::InvalidConfig(
                "histogram_bins must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.diffusion.alpha_tick, 0.02);
        assert_eq!(config.diffusion.beta_cap, 0.10);
        assert_eq!(config.diffusion.top_k, 1);
        assert_eq!(config.criticality.rho_target, 1.0);
        assert!(!config.features.affective_priming);
        assert!(!config.features.stickiness);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut config = EngineConfig::default();
        config.diffusion.alpha_tick = 0.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.diffusion.beta_cap = 0.3;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.criticality.rho_target = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.decay.profiles.insert(
            NodeType::Memory,
            DecayProfile {
                lambda_e: 1.5,
                lambda_w: 0.99,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_falls_back_to_default_type() {
        let mut config = DecayConfig::default();
        config.profiles.remove(&NodeType::Task);
        let profile = config.profile(NodeType::Task);
        assert_eq!(profile.lambda_e, config.profile(NodeType::Default).lambda_e);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: EngineConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.diffusion.alpha_tick, config.diffusion.alpha_tick);
        assert_eq!(back.decay.weight_cadence_ticks, config.decay.weight_cadence_ticks);
    }
}
