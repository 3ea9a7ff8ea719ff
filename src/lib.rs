//! brainnet: a small spiking-network simulator.
//!
//! Neurons are grouped into named regions scattered over a 2D rectangle.
//! Firing neurons launch signals along weighted, directed connections; a
//! signal travels for a number of ticks and then delivers weighted input to
//! the target neuron. An optional central hub aggregates region activity,
//! nudges per-region modulation weights, and exposes a fixed-size readout.
//! Learning rules (Hebbian, reward-modulated) adjust weights between ticks.
//!
//! Everything is deterministic given `NetworkConfig::seed`.

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/neuron.rs"]
pub mod neuron;

#[path = "core/connection.rs"]
pub mod connection;

#[path = "core/region.rs"]
pub mod region;

#[path = "core/hub.rs"]
pub mod hub;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/learning.rs"]
pub mod learning;

#[path = "core/simulation.rs"]
pub mod simulation;

pub mod observer;

pub mod prelude {
    pub use crate::connection::{Connection, ConnectionId, ConnectionKind, Signal};
    pub use crate::error::{ConfigError, LookupError};
    pub use crate::hub::{CentralHub, HubConfig};
    pub use crate::learning::{
        HebbianConfig, HebbianLearning, LearningAlgorithm, LearningManager, RewardBasedLearning,
        RewardConfig,
    };
    pub use crate::network::{ExecutionTier, Network, NetworkConfig, NetworkState, NetworkStats};
    pub use crate::neuron::{Neuron, NeuronDynamics, NeuronKey};
    pub use crate::region::{Bounds, Region, RegionSpec};
    pub use crate::simulation::{Simulation, SimulationSnapshot};
}
