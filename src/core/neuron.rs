#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::error::{check_finite, check_probability, check_range, ConfigError};

/// Activity level of a neuron, in [0, 1].
pub type Activity = f32;

/// Which cluster owns a neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cluster {
    /// Index into the network's region list.
    Region(usize),
    Hub,
}

/// Arena address of a neuron: owning cluster plus position in its neuron list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuronKey {
    pub cluster: Cluster,
    pub index: usize,
}

impl NeuronKey {
    pub fn region(region: usize, index: usize) -> Self {
        Self {
            cluster: Cluster::Region(region),
            index,
        }
    }

    pub fn hub(index: usize) -> Self {
        Self {
            cluster: Cluster::Hub,
            index,
        }
    }
}

/// Leaky integrate-and-fire parameters shared by every neuron in a network.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NeuronDynamics {
    /// Potential at which a neuron fires.
    pub threshold: f32,
    /// Fraction of potential lost per tick.
    pub decay_rate: f32,
    /// Ticks during which synaptic input is dropped after a spike.
    pub refractory_period: u32,
    /// Activity multiplier applied on each refractory tick.
    pub refractory_activity_decay: f32,
    /// Activity above which a neuron emits signals on its outgoing connections.
    pub emit_threshold: f32,
    /// Activity above which a neuron counts as active in network stats.
    pub active_threshold: f32,
}

impl Default for NeuronDynamics {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            decay_rate: 0.05,
            refractory_period: 5,
            refractory_activity_decay: 0.8,
            emit_threshold: 0.9,
            active_threshold: 0.1,
        }
    }
}

impl NeuronDynamics {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("threshold", self.threshold)?;
        check_probability("decay_rate", self.decay_rate)?;
        check_probability("refractory_activity_decay", self.refractory_activity_decay)?;
        check_range("emit_threshold", self.emit_threshold, 0.0, 1.0)?;
        check_range("active_threshold", self.active_threshold, 0.0, 1.0)?;
        Ok(())
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_refractory_period(mut self, ticks: u32) -> Self {
        self.refractory_period = ticks;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Neuron {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub region_id: String,

    pub activity: Activity,
    pub potential: f32,
    pub threshold: f32,
    pub refractory: u32,

    /// Display size, not used by the dynamics.
    pub radius: f32,

    // Handles into the network's connection arena.
    outgoing: Vec<ConnectionId>,
    incoming: Vec<ConnectionId>,
}

impl Neuron {
    pub fn new(id: String, x: f32, y: f32, region_id: String, threshold: f32) -> Self {
        Self {
            id,
            x,
            y,
            region_id,
            activity: 0.0,
            potential: 0.0,
            threshold,
            refractory: 0,
            radius: 3.0,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    pub fn outgoing(&self) -> &[ConnectionId] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[ConnectionId] {
        &self.incoming
    }

    pub(crate) fn link_outgoing(&mut self, id: ConnectionId) {
        self.outgoing.push(id);
    }

    pub(crate) fn link_incoming(&mut self, id: ConnectionId) {
        self.incoming.push(id);
    }

    /// Synaptic input. Dropped while refractory.
    pub fn receive_input(&mut self, amount: f32, weight: f32) {
        if self.refractory > 0 {
            return;
        }
        self.potential += amount * weight;
    }

    /// Advance one tick.
    ///
    /// Returns the `(connection, activity)` pairs of a spike when the neuron
    /// fired this tick, otherwise an empty list. Potential decays after the
    /// firing check either way.
    pub fn update(&mut self, dynamics: &NeuronDynamics) -> Vec<(ConnectionId, Activity)> {
        let mut spike = Vec::new();

        if self.refractory > 0 {
            self.refractory -= 1;
            self.activity *= dynamics.refractory_activity_decay;
        }

        if self.potential >= self.threshold && self.refractory == 0 {
            self.fire(dynamics);
            spike = self.outgoing.iter().map(|&c| (c, self.activity)).collect();
        }

        self.potential *= 1.0 - dynamics.decay_rate;

        spike
    }

    fn fire(&mut self, dynamics: &NeuronDynamics) {
        self.activity = 1.0;
        self.potential = 0.0;
        self.refractory = dynamics.refractory_period;
    }

    /// Direct external drive; ignores the refractory gate.
    pub fn stimulate(&mut self, strength: f32) {
        self.potential += strength;
    }

    pub fn reset(&mut self) {
        self.activity = 0.0;
        self.potential = 0.0;
        self.refractory = 0;
    }

    pub fn is_refractory(&self) -> bool {
        self.refractory > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_neuron() -> Neuron {
        Neuron::new("t_0".to_string(), 0.0, 0.0, "t".to_string(), 0.5)
    }

    #[test]
    fn refractory_drops_synaptic_input_but_not_stimulus() {
        let mut n = make_neuron();
        n.refractory = 3;
        n.receive_input(1.0, 2.0);
        assert_eq!(n.potential, 0.0);

        n.stimulate(0.4);
        assert!((n.potential - 0.4).abs() < 1e-6);
    }

    #[test]
    fn receive_input_scales_by_weight() {
        let mut n = make_neuron();
        n.receive_input(0.5, 0.6);
        assert!((n.potential - 0.3).abs() < 1e-6);
    }

    #[test]
    fn fire_resets_potential_and_sets_refractory() {
        let dynamics = NeuronDynamics::default();
        let mut n = make_neuron();
        n.link_outgoing(ConnectionId(4));
        n.link_outgoing(ConnectionId(9));
        n.stimulate(0.7);

        let spike = n.update(&dynamics);
        assert_eq!(spike, vec![(ConnectionId(4), 1.0), (ConnectionId(9), 1.0)]);
        assert_eq!(n.activity, 1.0);
        assert_eq!(n.potential, 0.0);
        assert_eq!(n.refractory, 5);
    }

    #[test]
    fn below_threshold_only_decays() {
        let dynamics = NeuronDynamics::default();
        let mut n = make_neuron();
        n.stimulate(0.4);

        let spike = n.update(&dynamics);
        assert!(spike.is_empty());
        assert_eq!(n.activity, 0.0);
        assert!((n.potential - 0.38).abs() < 1e-6);
    }

    #[test]
    fn refractory_counts_down_and_activity_decays() {
        let dynamics = NeuronDynamics::default();
        let mut n = make_neuron();
        n.stimulate(1.0);
        n.update(&dynamics);

        n.update(&dynamics);
        assert_eq!(n.refractory, 4);
        assert!((n.activity - 0.8).abs() < 1e-6);

        for _ in 0..4 {
            n.update(&dynamics);
        }
        assert_eq!(n.refractory, 0);
        assert!((n.activity - 0.8f32.powi(5)).abs() < 1e-6);
    }

    #[test]
    fn can_fire_on_tick_refractory_expires() {
        let dynamics = NeuronDynamics::default();
        let mut n = make_neuron();
        n.stimulate(1.0);
        n.update(&dynamics);
        for _ in 0..4 {
            n.update(&dynamics);
        }
        assert_eq!(n.refractory, 1);

        n.stimulate(1.0);
        n.update(&dynamics);
        assert_eq!(n.activity, 1.0);
        assert_eq!(n.refractory, 5);
    }

    #[test]
    fn state_stays_bounded_under_drive() {
        let dynamics = NeuronDynamics::default();
        let mut n = make_neuron();
        for t in 0..500 {
            if t % 3 == 0 {
                n.stimulate(0.9);
            }
            n.receive_input(1.0, 1.5);
            n.update(&dynamics);
            assert!((0.0..=1.0).contains(&n.activity));
        }
    }

    #[test]
    fn dynamics_validation() {
        assert!(NeuronDynamics::default().validate().is_ok());
        let bad = NeuronDynamics {
            decay_rate: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
