use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::neuron::NeuronKey;

/// Default per-tick signal progress at speed multiplier 1.0.
pub const BASE_SPEED: f32 = 0.02;

/// Progress within this distance of 1.0 counts as arrived, so that
/// accumulated f32 steps (50 x 0.02) land on the intended tick.
const ARRIVAL_EPSILON: f32 = 1e-5;

/// Index into the network's connection arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionId(pub usize);

impl ConnectionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionKind {
    IntraRegion,
    InterRegion,
    /// Region neuron -> hub neuron.
    HubAfferent,
    /// Hub neuron -> region neuron.
    HubEfferent,
    HubInternal,
}

/// A value in transit along a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    pub progress: f32,
    pub strength: f32,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub kind: ConnectionKind,
    pub from: NeuronKey,
    pub to: NeuronKey,

    pub weight: f32,

    /// Monitoring accumulator; bumped on emission, decays every tick.
    pub activity: f32,

    signals: Vec<Signal>,
}

impl Connection {
    pub fn new(id: ConnectionId, kind: ConnectionKind, from: NeuronKey, to: NeuronKey) -> Self {
        Self {
            id,
            kind,
            from,
            to,
            weight: 1.0,
            activity: 0.0,
            signals: Vec::new(),
        }
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn add_signal(&mut self, strength: f32) {
        self.signals.push(Signal {
            progress: 0.0,
            strength,
        });
        self.activity = (self.activity + 0.3).min(1.0);
    }

    /// Advance in-flight signals and return the ones that arrived this tick.
    ///
    /// Travel time is independent of the geometric length of the connection.
    pub fn update(&mut self, speed_multiplier: f32, base_speed: f32) -> Vec<Signal> {
        let step = base_speed * speed_multiplier;
        let mut arrived = Vec::new();

        self.signals.retain_mut(|signal| {
            signal.progress += step;
            if signal.progress >= 1.0 - ARRIVAL_EPSILON {
                arrived.push(*signal);
                false
            } else {
                true
            }
        });

        self.activity *= 0.95;

        arrived
    }

    /// Add `delta` to the weight and clamp into `[min, max]`.
    #[inline]
    pub fn adjust_weight(&mut self, delta: f32, min: f32, max: f32) {
        self.weight = (self.weight + delta).clamp(min, max);
    }

    pub(crate) fn clear(&mut self) {
        self.signals.clear();
        self.activity = 0.0;
    }

    /// Display identity, e.g. `conn_12`, `hub_conn_3`, `hub_internal_40`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ConnectionKind::IntraRegion | ConnectionKind::InterRegion => "conn",
            ConnectionKind::HubAfferent | ConnectionKind::HubEfferent => "hub_conn",
            ConnectionKind::HubInternal => "hub_internal",
        };
        write!(f, "{}_{}", prefix, self.id.0)
    }
}
