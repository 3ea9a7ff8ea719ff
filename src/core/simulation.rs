//! A network plus its learning layer and run controls.
//!
//! `Simulation` is the unit a driver serializes access to: one tick or one
//! external mutation at a time, never interleaved.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::debug;

use crate::error::{check_range, ConfigError, LookupError};
use crate::learning::LearningManager;
use crate::network::{Network, NetworkConfig, NetworkState};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionModulation {
    pub id: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationSnapshot {
    pub running: bool,
    pub speed: f32,
    pub network: NetworkState,
    /// Hub readout vector, when the network has a hub.
    pub readout: Option<Vec<f32>>,
    /// Hub modulation weight per region, in region order.
    pub modulation: Vec<RegionModulation>,
    pub learning: Option<String>,
}

pub struct Simulation {
    network: Network,
    learning: LearningManager,
    running: bool,
    speed: f32,
}

impl Simulation {
    pub const MAX_SPEED: f32 = 10.0;

    /// Build a network and attach the default learning rules (inactive).
    pub fn new(cfg: NetworkConfig) -> Result<Self, ConfigError> {
        let network = Network::new(cfg)?;
        let learning = LearningManager::with_defaults(&network)?;
        Ok(Self {
            network,
            learning,
            running: false,
            speed: 1.0,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn learning(&self) -> &LearningManager {
        &self.learning
    }

    pub fn play(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), ConfigError> {
        check_range("speed", speed, f32::MIN_POSITIVE, Self::MAX_SPEED)?;
        self.speed = speed;
        Ok(())
    }

    /// Advance one tick if running. Returns whether a tick happened.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.step();
        true
    }

    /// Advance exactly one tick regardless of the run state.
    pub fn step(&mut self) {
        self.network.update(self.speed);
        self.learning.update(&mut self.network);
    }

    /// Stop and zero all dynamic state, learning traces included.
    /// Topology and weights survive.
    pub fn reset(&mut self) {
        self.running = false;
        self.network.reset();
        self.learning.reset();
        debug!("simulation reset");
    }

    pub fn stimulate(&mut self, region_id: &str, strength: f32) -> Result<usize, LookupError> {
        self.network.stimulate_region(region_id, strength)
    }

    pub fn stimulate_hub(&mut self, strength: f32) -> Result<usize, LookupError> {
        self.network.stimulate_hub(strength)
    }

    pub fn inject_input(&mut self, values: &[f32]) -> Result<usize, LookupError> {
        self.network.inject_input(values)
    }

    /// Non-finite rewards are ignored.
    pub fn apply_reward(&mut self, reward: f32) {
        self.learning.apply_reward(&mut self.network, reward);
    }

    /// Select the active learning rule, or switch learning off with `None`.
    pub fn set_learning(&mut self, name: Option<&str>) -> Result<(), LookupError> {
        match name {
            Some(name) => self.learning.set_active(name),
            None => {
                self.learning.deactivate();
                Ok(())
            }
        }
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        let hub = self.network.hub();
        SimulationSnapshot {
            running: self.running,
            speed: self.speed,
            network: self.network.get_state(),
            readout: hub.map(|h| h.get_readout()),
            modulation: hub
                .map(|h| {
                    self.network
                        .regions()
                        .iter()
                        .map(|r| RegionModulation {
                            id: r.id.clone(),
                            weight: h.modulation_weight(&r.id),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            learning: self.learning.active_name().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubConfig;

    fn make_test_simulation() -> Simulation {
        let cfg = NetworkConfig::default()
            .with_hub(HubConfig::default())
            .with_seed(42);
        Simulation::new(cfg).unwrap()
    }

    #[test]
    fn tick_only_advances_while_running() {
        let mut sim = make_test_simulation();
        assert!(!sim.tick());
        assert_eq!(sim.network().tick(), 0);

        sim.play();
        assert!(sim.tick());
        assert!(sim.tick());
        assert_eq!(sim.network().tick(), 2);

        sim.pause();
        sim.step();
        assert_eq!(sim.network().tick(), 3);
    }

    #[test]
    fn speed_is_validated() {
        let mut sim = make_test_simulation();
        assert!(sim.set_speed(2.0).is_ok());
        assert_eq!(sim.speed(), 2.0);
        assert!(sim.set_speed(0.0).is_err());
        assert!(sim.set_speed(-1.0).is_err());
        assert!(sim.set_speed(f32::NAN).is_err());
        assert!(sim.set_speed(50.0).is_err());
        assert_eq!(sim.speed(), 2.0);
    }

    #[test]
    fn snapshot_reports_hub_and_learning() {
        let mut sim = make_test_simulation();
        sim.set_learning(Some("hebbian")).unwrap();
        sim.stimulate("frontal", 1.0).unwrap();
        sim.play();
        for _ in 0..10 {
            sim.tick();
        }

        let snap = sim.snapshot();
        assert!(snap.running);
        assert_eq!(snap.network.regions.len(), 6);
        assert_eq!(snap.readout.as_ref().map(Vec::len), Some(4));
        assert_eq!(snap.modulation.len(), 6);
        assert_eq!(snap.modulation[0].id, "frontal");
        assert_eq!(snap.learning.as_deref(), Some("hebbian"));

        sim.set_learning(None).unwrap();
        assert_eq!(sim.snapshot().learning, None);
    }

    #[test]
    fn unknown_learning_rule_is_reported() {
        let mut sim = make_test_simulation();
        assert_eq!(
            sim.set_learning(Some("backprop")),
            Err(LookupError::UnknownAlgorithm("backprop".to_string()))
        );
    }

    #[test]
    fn reward_learning_changes_weights_after_activity() {
        let mut sim = make_test_simulation();
        sim.set_learning(Some("reward")).unwrap();
        let before: Vec<f32> = sim.network().connections().iter().map(|c| c.weight).collect();

        // Enough picks that several co-firing neurons share an edge.
        for _ in 0..6 {
            sim.stimulate("motor", 2.0).unwrap();
        }
        sim.step();
        sim.apply_reward(1.0);

        let changed = sim
            .network()
            .connections()
            .iter()
            .zip(&before)
            .any(|(c, &w)| c.weight != w);
        assert!(changed);
    }

    #[test]
    fn reward_after_reset_leaves_weights_alone() {
        let mut sim = make_test_simulation();
        sim.set_learning(Some("reward")).unwrap();
        for _ in 0..6 {
            sim.stimulate("motor", 2.0).unwrap();
        }
        sim.step();
        sim.reset();

        let before: Vec<f32> = sim.network().connections().iter().map(|c| c.weight).collect();
        sim.apply_reward(1.0);
        let after: Vec<f32> = sim.network().connections().iter().map(|c| c.weight).collect();
        assert_eq!(after, before);
        assert_eq!(sim.learning().active_name(), Some("reward"));
    }

    #[test]
    fn non_finite_reward_cannot_poison_weights() {
        let mut sim = make_test_simulation();
        sim.set_learning(Some("reward")).unwrap();
        for _ in 0..6 {
            sim.stimulate("motor", 2.0).unwrap();
        }
        sim.step();
        sim.apply_reward(f32::NAN);
        assert!(sim.network().connections().iter().all(|c| c.weight.is_finite()));
    }

    #[test]
    fn reset_stops_and_clears() {
        let mut sim = make_test_simulation();
        sim.play();
        sim.stimulate("occipital", 1.0).unwrap();
        sim.tick();
        sim.reset();
        assert!(!sim.is_running());
        assert_eq!(sim.network().stats().total_signals, 0);
        assert_eq!(sim.network().tick(), 0);
    }
}
