//! Central hub: aggregator, router and homeostatic controller.
//!
//! The hub is a region-like cluster with connections to and from every
//! region. Each tick it folds the regions' mean activity into a fixed-size
//! readout vector and nudges a per-region modulation weight toward a target
//! activity level.

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::connection::{Connection, ConnectionId, ConnectionKind};
use crate::error::{check_finite, check_probability, check_range, check_weight_bounds, ConfigError};
use crate::neuron::{Neuron, NeuronDynamics, NeuronKey};
use crate::prng::Prng;
use crate::region::{scatter_neurons, stimulate_random, Bounds, Region};

/// Region id recorded on hub neurons.
pub const HUB_REGION_ID: &str = "hub";

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HubConfig {
    pub position: (f32, f32),
    pub size: f32,
    pub neuron_count: usize,
    /// Length of the readout vector.
    pub output_size: usize,
    /// Per-direction probability of linking a region neuron with the hub.
    pub connection_prob: f32,
    /// Probability of each ordered hub-internal pair being linked.
    pub internal_prob: f32,
    /// Activity level the homeostatic loop steers regions toward.
    pub target_activity: f32,
    pub modulation_rate: f32,
    pub modulation_min: f32,
    pub modulation_max: f32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            position: (0.45, 0.45),
            size: 0.08,
            neuron_count: 20,
            output_size: 4,
            connection_prob: 0.3,
            internal_prob: 0.3,
            target_activity: 0.5,
            modulation_rate: 0.01,
            modulation_min: 0.1,
            modulation_max: 2.0,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("hub.position.x", self.position.0)?;
        check_finite("hub.position.y", self.position.1)?;
        check_range("hub.size", self.size, 0.0, 1.0)?;
        if self.output_size == 0 {
            return Err(ConfigError::EmptyDimension {
                field: "hub.output_size",
            });
        }
        check_probability("hub.connection_prob", self.connection_prob)?;
        check_probability("hub.internal_prob", self.internal_prob)?;
        check_range("hub.target_activity", self.target_activity, 0.0, 1.0)?;
        check_finite("hub.modulation_rate", self.modulation_rate)?;
        check_weight_bounds("hub.modulation", self.modulation_min, self.modulation_max)?;
        Ok(())
    }

    pub fn with_neuron_count(mut self, count: usize) -> Self {
        self.neuron_count = count;
        self
    }

    pub fn with_output_size(mut self, size: usize) -> Self {
        self.output_size = size;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CentralHub {
    cfg: HubConfig,

    pub x: f32,
    pub y: f32,
    pub radius: f32,

    pub(crate) neurons: Vec<Neuron>,

    // Readout vector, `output_size` long.
    state: Vec<f32>,

    // Region -> hub links, for bookkeeping. The network owns the connections.
    region_connections: HashMap<String, Vec<ConnectionId>>,

    modulation_weights: HashMap<String, f32>,
}

impl CentralHub {
    pub fn new(cfg: HubConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            x: 0.0,
            y: 0.0,
            radius: 0.0,
            neurons: Vec::new(),
            state: vec![0.0; cfg.output_size],
            region_connections: HashMap::new(),
            modulation_weights: HashMap::new(),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.cfg
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn output_size(&self) -> usize {
        self.cfg.output_size
    }

    /// Resolve geometry and scatter hub neurons inside 0.8 of the hub radius.
    pub fn initialize(&mut self, bounds: &Bounds, dynamics: &NeuronDynamics, rng: &mut Prng) {
        let (x, y, radius) = bounds.resolve(self.cfg.position, self.cfg.size);
        self.x = x;
        self.y = y;
        self.radius = radius;

        self.neurons = scatter_neurons(
            HUB_REGION_ID,
            HUB_REGION_ID,
            self.cfg.neuron_count,
            (x, y),
            radius * 0.8,
            dynamics,
            rng,
        );
    }

    /// Wire the hub to every region and to itself.
    ///
    /// For each region neuron, one region->hub and one hub->region link are
    /// each created with probability `connection_prob`, landing on a random
    /// hub neuron. Every ordered pair of distinct hub neurons is linked with
    /// probability `internal_prob`. New connections are numbered from
    /// `first_id`; the caller takes ownership of the returned list.
    pub fn connect_to_regions(
        &mut self,
        regions: &mut [Region],
        first_id: usize,
        rng: &mut Prng,
    ) -> Vec<Connection> {
        let mut created: Vec<Connection> = Vec::new();
        let prob = self.cfg.connection_prob;
        let hub_len = self.neurons.len();

        for (ri, region) in regions.iter_mut().enumerate() {
            let bookkeeping = self
                .region_connections
                .entry(region.id.clone())
                .or_default();
            self.modulation_weights.insert(region.id.clone(), 1.0);

            // Without hub neurons there is nothing to land on.
            if hub_len == 0 {
                continue;
            }

            for (ni, neuron) in region.neurons.iter_mut().enumerate() {
                if rng.chance(prob) {
                    let hi = rng.gen_range_usize(0, hub_len);
                    let id = ConnectionId(first_id + created.len());
                    neuron.link_outgoing(id);
                    self.neurons[hi].link_incoming(id);
                    bookkeeping.push(id);
                    created.push(Connection::new(
                        id,
                        ConnectionKind::HubAfferent,
                        NeuronKey::region(ri, ni),
                        NeuronKey::hub(hi),
                    ));
                }

                if rng.chance(prob) {
                    let hi = rng.gen_range_usize(0, hub_len);
                    let id = ConnectionId(first_id + created.len());
                    self.neurons[hi].link_outgoing(id);
                    neuron.link_incoming(id);
                    created.push(Connection::new(
                        id,
                        ConnectionKind::HubEfferent,
                        NeuronKey::hub(hi),
                        NeuronKey::region(ri, ni),
                    ));
                }
            }
        }

        for i in 0..hub_len {
            for j in 0..hub_len {
                if i != j && rng.chance(self.cfg.internal_prob) {
                    let id = ConnectionId(first_id + created.len());
                    self.neurons[i].link_outgoing(id);
                    self.neurons[j].link_incoming(id);
                    created.push(Connection::new(
                        id,
                        ConnectionKind::HubInternal,
                        NeuronKey::hub(i),
                        NeuronKey::hub(j),
                    ));
                }
            }
        }

        created
    }

    pub fn update(&mut self, dynamics: &NeuronDynamics) {
        for neuron in &mut self.neurons {
            neuron.update(dynamics);
        }
    }

    /// Fold modulated region activity into the readout vector.
    ///
    /// Region `i` (in slice order) accumulates into slot `i % output_size`.
    /// Entries are divided by the largest entry, floored at 1.0, and capped
    /// at 1.0; an all-zero input yields the zero vector.
    pub fn aggregate(&mut self, regions: &[Region]) -> &[f32] {
        let size = self.cfg.output_size;
        self.state.clear();
        self.state.resize(size, 0.0);

        for (i, region) in regions.iter().enumerate() {
            let weight = self.modulation_weight(&region.id);
            self.state[i % size] += region.total_activity * weight;
        }

        let max_val = self.state.iter().copied().fold(0.0f32, f32::max);
        if max_val > 0.0 {
            let divisor = max_val.max(1.0);
            for v in &mut self.state {
                *v = (*v / divisor).min(1.0);
            }
        }

        &self.state
    }

    /// Homeostatic feedback: move each known region's modulation weight by
    /// `(target - activity) * modulation_rate`, kept within the configured bounds.
    pub fn modulate_regions(&mut self, regions: &[Region], target_activity: f32) {
        for region in regions {
            if let Some(w) = self.modulation_weights.get_mut(&region.id) {
                let diff = target_activity - region.total_activity;
                *w = (*w + diff * self.cfg.modulation_rate)
                    .clamp(self.cfg.modulation_min, self.cfg.modulation_max);
            }
        }
    }

    /// Modulation weight for a region; 1.0 for regions the hub has not seen.
    pub fn modulation_weight(&self, region_id: &str) -> f32 {
        self.modulation_weights.get(region_id).copied().unwrap_or(1.0)
    }

    pub fn modulation_weights(&self) -> &HashMap<String, f32> {
        &self.modulation_weights
    }

    pub fn region_connections(&self, region_id: &str) -> &[ConnectionId] {
        self.region_connections
            .get(region_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn readout(&self) -> &[f32] {
        &self.state
    }

    pub fn get_readout(&self) -> Vec<f32> {
        self.state.clone()
    }

    pub fn stimulate(&mut self, strength: f32, count: usize, rng: &mut Prng) -> usize {
        stimulate_random(&mut self.neurons, strength, count, rng)
    }

    /// Zero the readout and every hub neuron. Modulation weights are kept.
    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|v| *v = 0.0);
        for neuron in &mut self.neurons {
            neuron.reset();
        }
    }
}
