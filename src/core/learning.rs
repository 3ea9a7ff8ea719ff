//! Local weight-learning rules on top of the network's connections.
//!
//! Two rules are provided:
//! - Hebbian: `dw = lr * pre * post - decay * (w - 1)`, applied every tick.
//! - Reward-based: eligibility traces accumulate `pre * post` every tick and a
//!   reward converts them into `dw = lr * trace * reward`.
//!
//! A [`LearningManager`] keeps a registry of named rules and lets exactly one
//! of them be active at a time.

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::debug;

use crate::connection::ConnectionId;
use crate::error::{check_finite, check_probability, check_weight_bounds, ConfigError, LookupError};
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HebbianConfig {
    pub learning_rate: f32,
    /// Pull of each weight back toward 1.0 per tick.
    pub decay_rate: f32,
    pub min_weight: f32,
    pub max_weight: f32,
}

impl Default for HebbianConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            decay_rate: 0.001,
            min_weight: 0.1,
            max_weight: 2.0,
        }
    }
}

impl HebbianConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("hebbian.learning_rate", self.learning_rate)?;
        check_probability("hebbian.decay_rate", self.decay_rate)?;
        check_weight_bounds("hebbian.weight", self.min_weight, self.max_weight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RewardConfig {
    pub learning_rate: f32,
    /// Per-tick trace retention factor.
    pub trace_decay: f32,
    pub min_weight: f32,
    pub max_weight: f32,
    /// Fraction of every trace kept after a reward is applied.
    pub reward_trace_retention: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            trace_decay: 0.9,
            min_weight: 0.1,
            max_weight: 2.0,
            reward_trace_retention: 0.5,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("reward.learning_rate", self.learning_rate)?;
        check_probability("reward.trace_decay", self.trace_decay)?;
        check_probability("reward.reward_trace_retention", self.reward_trace_retention)?;
        check_weight_bounds("reward.weight", self.min_weight, self.max_weight)
    }
}

/// Correlation learning. Ignores reward.
#[derive(Debug, Clone)]
pub struct HebbianLearning {
    cfg: HebbianConfig,
    enabled: bool,
}

impl HebbianLearning {
    pub fn new(cfg: HebbianConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            enabled: false,
        })
    }

    pub fn config(&self) -> &HebbianConfig {
        &self.cfg
    }

    pub fn update(&mut self, network: &mut Network) {
        if !self.enabled {
            return;
        }
        let cfg = self.cfg;
        for (conn, pre, post) in network.connections_with_activity_mut() {
            let delta = cfg.learning_rate * pre * post;
            let decay = cfg.decay_rate * (conn.weight - 1.0);
            conn.adjust_weight(delta - decay, cfg.min_weight, cfg.max_weight);
        }
    }
}

/// Three-factor learning: eligibility traces gated by an external reward.
#[derive(Debug, Clone)]
pub struct RewardBasedLearning {
    cfg: RewardConfig,
    enabled: bool,
    traces: HashMap<ConnectionId, f32>,
}

impl RewardBasedLearning {
    /// Starts with a zero trace for every connection the network has now.
    pub fn new(network: &Network, cfg: RewardConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let traces = network.connections().iter().map(|c| (c.id, 0.0)).collect();
        Ok(Self {
            cfg,
            enabled: false,
            traces,
        })
    }

    pub fn config(&self) -> &RewardConfig {
        &self.cfg
    }

    pub fn trace(&self, id: ConnectionId) -> f32 {
        self.traces.get(&id).copied().unwrap_or(0.0)
    }

    /// Decay traces and accumulate `pre * post`. Weights are untouched.
    pub fn update(&mut self, network: &mut Network) {
        if !self.enabled {
            return;
        }
        let decay = self.cfg.trace_decay;
        for (conn, pre, post) in network.connections_with_activity_mut() {
            let trace = self.traces.entry(conn.id).or_insert(0.0);
            *trace = *trace * decay + pre * post;
        }
    }

    /// Convert eligibility into weight change, then shrink every trace.
    /// Non-finite rewards are ignored.
    pub fn apply_reward(&mut self, network: &mut Network, reward: f32) {
        if !self.enabled || !reward.is_finite() {
            return;
        }
        let cfg = self.cfg;
        for (conn, _, _) in network.connections_with_activity_mut() {
            let trace = self.traces.get(&conn.id).copied().unwrap_or(0.0);
            conn.adjust_weight(cfg.learning_rate * trace * reward, cfg.min_weight, cfg.max_weight);
        }
        for trace in self.traces.values_mut() {
            *trace *= cfg.reward_trace_retention;
        }
    }

    /// Zero every eligibility trace.
    pub fn reset(&mut self) {
        self.traces.values_mut().for_each(|t| *t = 0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LearningKind {
    Hebbian,
    RewardBased,
}

/// Closed set of learning rules behind one interface.
#[derive(Debug, Clone)]
pub enum LearningAlgorithm {
    Hebbian(HebbianLearning),
    RewardBased(RewardBasedLearning),
}

impl LearningAlgorithm {
    pub fn kind(&self) -> LearningKind {
        match self {
            LearningAlgorithm::Hebbian(_) => LearningKind::Hebbian,
            LearningAlgorithm::RewardBased(_) => LearningKind::RewardBased,
        }
    }

    /// Called once per simulation tick.
    pub fn update(&mut self, network: &mut Network) {
        match self {
            LearningAlgorithm::Hebbian(h) => h.update(network),
            LearningAlgorithm::RewardBased(r) => r.update(network),
        }
    }

    pub fn apply_reward(&mut self, network: &mut Network, reward: f32) {
        match self {
            // Pure correlation learning has no use for reward.
            LearningAlgorithm::Hebbian(_) => {}
            LearningAlgorithm::RewardBased(r) => r.apply_reward(network, reward),
        }
    }

    /// Drop accumulated learning state. Weights are not touched.
    pub fn reset(&mut self) {
        match self {
            LearningAlgorithm::Hebbian(_) => {}
            LearningAlgorithm::RewardBased(r) => r.reset(),
        }
    }

    pub fn enable(&mut self) {
        self.set_enabled(true);
    }

    pub fn disable(&mut self) {
        self.set_enabled(false);
    }

    fn set_enabled(&mut self, enabled: bool) {
        match self {
            LearningAlgorithm::Hebbian(h) => h.enabled = enabled,
            LearningAlgorithm::RewardBased(r) => r.enabled = enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            LearningAlgorithm::Hebbian(h) => h.enabled,
            LearningAlgorithm::RewardBased(r) => r.enabled,
        }
    }
}

impl From<HebbianLearning> for LearningAlgorithm {
    fn from(h: HebbianLearning) -> Self {
        LearningAlgorithm::Hebbian(h)
    }
}

impl From<RewardBasedLearning> for LearningAlgorithm {
    fn from(r: RewardBasedLearning) -> Self {
        LearningAlgorithm::RewardBased(r)
    }
}

/// Registry of named learning rules with a single active selection.
#[derive(Debug, Clone, Default)]
pub struct LearningManager {
    algorithms: HashMap<String, LearningAlgorithm>,
    active: Option<String>,
}

impl LearningManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with `"hebbian"` and `"reward"` registered at default settings.
    pub fn with_defaults(network: &Network) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.add_algorithm("hebbian", HebbianLearning::new(HebbianConfig::default())?);
        manager.add_algorithm(
            "reward",
            RewardBasedLearning::new(network, RewardConfig::default())?,
        );
        Ok(manager)
    }

    /// Register a rule. Registered rules start disabled; replacing the active
    /// rule deactivates it.
    pub fn add_algorithm(&mut self, name: &str, algorithm: impl Into<LearningAlgorithm>) {
        let mut algorithm = algorithm.into();
        algorithm.disable();
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.algorithms.insert(name.to_string(), algorithm);
    }

    /// Make `name` the only enabled rule.
    pub fn set_active(&mut self, name: &str) -> Result<(), LookupError> {
        if !self.algorithms.contains_key(name) {
            return Err(LookupError::UnknownAlgorithm(name.to_string()));
        }
        for (key, algorithm) in self.algorithms.iter_mut() {
            if key == name {
                algorithm.enable();
            } else {
                algorithm.disable();
            }
        }
        debug!(algorithm = name, "learning rule activated");
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn deactivate(&mut self) {
        for algorithm in self.algorithms.values_mut() {
            algorithm.disable();
        }
        self.active = None;
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get_algorithm(&self, name: &str) -> Option<&LearningAlgorithm> {
        self.algorithms.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.algorithms.keys().map(String::as_str)
    }

    fn active_mut(&mut self) -> Option<&mut LearningAlgorithm> {
        let name = self.active.as_deref()?;
        self.algorithms.get_mut(name)
    }

    pub fn update(&mut self, network: &mut Network) {
        if let Some(algorithm) = self.active_mut() {
            algorithm.update(network);
        }
    }

    pub fn apply_reward(&mut self, network: &mut Network, reward: f32) {
        if let Some(algorithm) = self.active_mut() {
            algorithm.apply_reward(network, reward);
        }
    }

    /// Reset every registered rule. The active selection is kept.
    pub fn reset(&mut self) {
        for algorithm in self.algorithms.values_mut() {
            algorithm.reset();
        }
    }
}
