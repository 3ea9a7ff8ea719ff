use hashbrown::{HashMap, HashSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::debug;

use crate::connection::{Connection, ConnectionId, ConnectionKind, Signal, BASE_SPEED};
use crate::error::{check_probability, check_range, ConfigError, LookupError};
use crate::hub::{CentralHub, HubConfig, HUB_REGION_ID};
use crate::neuron::{Activity, Cluster, Neuron, NeuronDynamics, NeuronKey};
use crate::prng::Prng;
use crate::region::{Bounds, Region, RegionSpec};

/// Execution tier for connection advancement.
///
/// - `Scalar`: single-threaded (default, works everywhere)
/// - `Parallel`: signals advance on the rayon pool (requires `parallel` feature)
///
/// Both tiers deliver arrivals in connection order, so results match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionTier {
    #[default]
    Scalar,
    Parallel,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    pub bounds: Bounds,
    /// Region catalog, in the order regions are built and iterated.
    pub regions: Vec<RegionSpec>,

    /// Probability of an edge for each ordered neuron pair inside a region.
    pub intra_prob: f32,
    /// Probability of an edge for each cross-region neuron pair.
    pub inter_prob: f32,

    pub hub: Option<HubConfig>,

    pub dynamics: NeuronDynamics,
    pub base_speed: f32,

    /// Neurons driven by one `stimulate_region` call.
    pub stimulate_count: usize,
    /// Region that receives `inject_input`.
    pub input_region: String,
    /// Maximum number of values `inject_input` consumes.
    pub input_width: usize,

    // If set, topology and stimulation picks are reproducible.
    pub seed: Option<u64>,

    pub tier: ExecutionTier,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::default(),
            regions: RegionSpec::default_catalog(),
            intra_prob: 0.15,
            inter_prob: 0.05,
            hub: None,
            dynamics: NeuronDynamics::default(),
            base_speed: BASE_SPEED,
            stimulate_count: 5,
            input_region: "sensory".to_string(),
            input_width: 10,
            seed: None,
            tier: ExecutionTier::default(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;

        let mut seen: HashSet<&str> = HashSet::with_capacity(self.regions.len());
        for spec in &self.regions {
            spec.validate()?;
            if !seen.insert(spec.id.as_str()) {
                return Err(ConfigError::DuplicateRegion(spec.id.clone()));
            }
        }

        check_probability("intra_prob", self.intra_prob)?;
        check_probability("inter_prob", self.inter_prob)?;
        if let Some(hub) = &self.hub {
            hub.validate()?;
            // Hub neurons are named `hub_<i>`; a region with that id would collide.
            if seen.contains(HUB_REGION_ID) {
                return Err(ConfigError::ReservedRegionId(HUB_REGION_ID.to_string()));
            }
        }
        self.dynamics.validate()?;
        check_range("base_speed", self.base_speed, 0.0, 1.0)?;
        Ok(())
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_regions(mut self, regions: Vec<RegionSpec>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_hub(mut self, hub: HubConfig) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_probabilities(mut self, intra: f32, inter: f32) -> Self {
        self.intra_prob = intra;
        self.inter_prob = inter;
        self
    }

    pub fn with_dynamics(mut self, dynamics: NeuronDynamics) -> Self {
        self.dynamics = dynamics;
        self
    }
}

/// Read-only per-region view.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionState {
    pub id: String,
    pub activity: f32,
    pub neuron_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkStats {
    pub tick: u64,
    pub total_signals: u64,
    pub active_neurons: usize,
    pub connection_count: usize,
    pub signals_in_flight: usize,
}

/// Snapshot returned by [`Network::get_state`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkState {
    /// One entry per region, in catalog order.
    pub regions: Vec<RegionState>,
    pub stats: NetworkStats,
}

impl NetworkState {
    pub fn region(&self, id: &str) -> Option<&RegionState> {
        self.regions.iter().find(|r| r.id == id)
    }
}

pub struct Network {
    cfg: NetworkConfig,

    regions: Vec<Region>,
    region_index: HashMap<String, usize>,

    hub: Option<CentralHub>,

    // Single owner of every edge. `ConnectionId(i)` is slot `i`.
    connections: Vec<Connection>,

    // Region neurons in region order; hub neurons are not included.
    all_neurons: Vec<NeuronKey>,

    rng: Prng,

    tick: u64,
    total_signals: u64,
    active_neurons: usize,
}

impl Network {
    pub fn new(cfg: NetworkConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let mut rng = match cfg.seed {
            Some(seed) => Prng::new(seed),
            None => Prng::from_clock(),
        };

        let mut regions = Vec::with_capacity(cfg.regions.len());
        let mut region_index = HashMap::with_capacity(cfg.regions.len());
        for (i, spec) in cfg.regions.iter().enumerate() {
            let mut region = Region::new(spec);
            region.generate_neurons(&cfg.bounds, &cfg.dynamics, &mut rng);
            region_index.insert(spec.id.clone(), i);
            regions.push(region);
        }

        let all_neurons = regions
            .iter()
            .enumerate()
            .flat_map(|(ri, r)| (0..r.neurons.len()).map(move |ni| NeuronKey::region(ri, ni)))
            .collect();

        let mut net = Self {
            hub: None,
            regions,
            region_index,
            connections: Vec::new(),
            all_neurons,
            rng,
            tick: 0,
            total_signals: 0,
            active_neurons: 0,
            cfg,
        };

        net.create_connections();

        if let Some(hub_cfg) = net.cfg.hub {
            let mut hub = CentralHub::new(hub_cfg)?;
            hub.initialize(&net.cfg.bounds, &net.cfg.dynamics, &mut net.rng);
            let first_id = net.connections.len();
            let links = hub.connect_to_regions(&mut net.regions, first_id, &mut net.rng);
            net.connections.extend(links);
            net.hub = Some(hub);
        }

        debug!(
            regions = net.regions.len(),
            neurons = net.all_neurons.len(),
            connections = net.connections.len(),
            hub = net.hub.is_some(),
            "network built"
        );

        Ok(net)
    }

    fn create_connections(&mut self) {
        // Intra-region: every ordered pair, no self-loops.
        for ri in 0..self.regions.len() {
            let n = self.regions[ri].neurons.len();
            for i in 0..n {
                for j in 0..n {
                    if i != j && self.rng.chance(self.cfg.intra_prob) {
                        self.link(
                            ConnectionKind::IntraRegion,
                            NeuronKey::region(ri, i),
                            NeuronKey::region(ri, j),
                        );
                    }
                }
            }
        }

        // Inter-region: each unordered region pair once, edges point from the
        // earlier region to the later one.
        for r1 in 0..self.regions.len() {
            for r2 in (r1 + 1)..self.regions.len() {
                let n1 = self.regions[r1].neurons.len();
                let n2 = self.regions[r2].neurons.len();
                for i in 0..n1 {
                    for j in 0..n2 {
                        if self.rng.chance(self.cfg.inter_prob) {
                            self.link(
                                ConnectionKind::InterRegion,
                                NeuronKey::region(r1, i),
                                NeuronKey::region(r2, j),
                            );
                        }
                    }
                }
            }
        }
    }

    fn link(&mut self, kind: ConnectionKind, from: NeuronKey, to: NeuronKey) -> ConnectionId {
        let id = ConnectionId(self.connections.len());
        if let Some(n) = locate_mut(&mut self.regions, &mut self.hub, from) {
            n.link_outgoing(id);
        }
        if let Some(n) = locate_mut(&mut self.regions, &mut self.hub, to) {
            n.link_incoming(id);
        }
        self.connections.push(Connection::new(id, kind, from, to));
        id
    }

    /// Advance the whole network by one tick.
    ///
    /// Order is fixed: connections advance and deliver first, then neurons
    /// update, then neurons above the emission threshold put a signal on
    /// each outgoing connection. Non-finite or negative speeds count as 0.
    pub fn update(&mut self, speed_multiplier: f32) {
        let speed = if speed_multiplier.is_finite() {
            speed_multiplier.max(0.0)
        } else {
            0.0
        };

        let arrivals = self.advance_connections(speed);
        for (id, signals) in arrivals {
            let conn = &self.connections[id.index()];
            let (to, weight) = (conn.to, conn.weight);
            if let Some(neuron) = locate_mut(&mut self.regions, &mut self.hub, to) {
                for signal in signals {
                    neuron.receive_input(signal.strength, weight);
                }
            }
        }

        let dynamics = self.cfg.dynamics;
        for region in &mut self.regions {
            region.update(&dynamics);
            self.total_signals +=
                emit_signals(&region.neurons, &mut self.connections, dynamics.emit_threshold);
        }

        if let Some(hub) = &mut self.hub {
            hub.update(&dynamics);
            self.total_signals +=
                emit_signals(&hub.neurons, &mut self.connections, dynamics.emit_threshold);
            hub.aggregate(&self.regions);
            let target = hub.config().target_activity;
            hub.modulate_regions(&self.regions, target);
        }

        self.active_neurons = self
            .regions
            .iter()
            .flat_map(|r| r.neurons.iter())
            .filter(|n| n.activity > dynamics.active_threshold)
            .count();

        self.tick = self.tick.wrapping_add(1);
    }

    fn advance_connections(&mut self, speed: f32) -> Vec<(ConnectionId, Vec<Signal>)> {
        let base_speed = self.cfg.base_speed;
        match self.effective_execution_tier() {
            ExecutionTier::Scalar => self
                .connections
                .iter_mut()
                .filter_map(|c| {
                    let arrived = c.update(speed, base_speed);
                    (!arrived.is_empty()).then_some((c.id, arrived))
                })
                .collect(),
            ExecutionTier::Parallel => self.advance_connections_parallel(speed, base_speed),
        }
    }

    #[cfg(feature = "parallel")]
    fn advance_connections_parallel(
        &mut self,
        speed: f32,
        base_speed: f32,
    ) -> Vec<(ConnectionId, Vec<Signal>)> {
        // `collect` on an indexed parallel iterator preserves order.
        self.connections
            .par_iter_mut()
            .map(|c| (c.id, c.update(speed, base_speed)))
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|(_, arrived)| !arrived.is_empty())
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn advance_connections_parallel(
        &mut self,
        speed: f32,
        base_speed: f32,
    ) -> Vec<(ConnectionId, Vec<Signal>)> {
        self.connections
            .iter_mut()
            .filter_map(|c| {
                let arrived = c.update(speed, base_speed);
                (!arrived.is_empty()).then_some((c.id, arrived))
            })
            .collect()
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.cfg.tier = tier;
    }

    pub fn execution_tier(&self) -> ExecutionTier {
        self.cfg.tier
    }

    /// The tier actually used, honoring compile-time feature gates.
    pub fn effective_execution_tier(&self) -> ExecutionTier {
        match self.cfg.tier {
            ExecutionTier::Scalar => ExecutionTier::Scalar,
            ExecutionTier::Parallel => {
                if cfg!(feature = "parallel") {
                    ExecutionTier::Parallel
                } else {
                    ExecutionTier::Scalar
                }
            }
        }
    }

    /// Stimulate `stimulate_count` random neurons of a region.
    /// Returns how many neurons were driven.
    pub fn stimulate_region(&mut self, region_id: &str, strength: f32) -> Result<usize, LookupError> {
        let idx = *self
            .region_index
            .get(region_id)
            .ok_or_else(|| LookupError::UnknownRegion(region_id.to_string()))?;
        let count = self.cfg.stimulate_count;
        Ok(self.regions[idx].stimulate(strength, count, &mut self.rng))
    }

    pub fn stimulate_hub(&mut self, strength: f32) -> Result<usize, LookupError> {
        let count = self.cfg.stimulate_count;
        let hub = self.hub.as_mut().ok_or(LookupError::NoHub)?;
        Ok(hub.stimulate(strength, count, &mut self.rng))
    }

    /// Drive the first input-region neurons with `values`, one value each.
    ///
    /// At most `input_width` values are used. Returns the number applied.
    pub fn inject_input(&mut self, values: &[f32]) -> Result<usize, LookupError> {
        let idx = *self
            .region_index
            .get(self.cfg.input_region.as_str())
            .ok_or_else(|| LookupError::UnknownRegion(self.cfg.input_region.clone()))?;
        let neurons = &mut self.regions[idx].neurons;

        let mut applied = 0;
        for (neuron, &value) in neurons.iter_mut().zip(values.iter().take(self.cfg.input_width)) {
            neuron.stimulate(value);
            applied += 1;
        }
        Ok(applied)
    }

    /// Zero all dynamic state. Topology and weights are kept.
    pub fn reset(&mut self) {
        for region in &mut self.regions {
            region.reset();
        }
        if let Some(hub) = &mut self.hub {
            hub.reset();
        }
        for conn in &mut self.connections {
            conn.clear();
        }
        self.tick = 0;
        self.total_signals = 0;
        self.active_neurons = 0;
    }

    pub fn get_state(&self) -> NetworkState {
        NetworkState {
            regions: self
                .regions
                .iter()
                .map(|r| RegionState {
                    id: r.id.clone(),
                    activity: r.total_activity,
                    neuron_count: r.neurons.len(),
                })
                .collect(),
            stats: self.stats(),
        }
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            tick: self.tick,
            total_signals: self.total_signals,
            active_neurons: self.active_neurons,
            connection_count: self.connections.len(),
            signals_in_flight: self.connections.iter().map(|c| c.signals().len()).sum(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    pub fn bounds(&self) -> &Bounds {
        &self.cfg.bounds
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.region_index.get(id).map(|&i| &self.regions[i])
    }

    pub fn hub(&self) -> Option<&CentralHub> {
        self.hub.as_ref()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.index())
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id.index())
    }

    pub fn neuron(&self, key: NeuronKey) -> Option<&Neuron> {
        locate(&self.regions, self.hub.as_ref(), key)
    }

    pub fn neuron_mut(&mut self, key: NeuronKey) -> Option<&mut Neuron> {
        locate_mut(&mut self.regions, &mut self.hub, key)
    }

    /// Region neurons in region order.
    pub fn all_neurons(&self) -> impl Iterator<Item = &Neuron> + '_ {
        self.all_neurons.iter().filter_map(|&k| self.neuron(k))
    }

    pub fn neuron_count(&self) -> usize {
        self.all_neurons.len()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn total_signals(&self) -> u64 {
        self.total_signals
    }

    pub fn active_neurons(&self) -> usize {
        self.active_neurons
    }

    /// Each connection paired with its (pre, post) neuron activity.
    ///
    /// This is the view plasticity rules work on: weights are mutable,
    /// neuron state is not.
    pub fn connections_with_activity_mut(
        &mut self,
    ) -> impl Iterator<Item = (&mut Connection, Activity, Activity)> + '_ {
        let regions = &self.regions;
        let hub = self.hub.as_ref();
        self.connections.iter_mut().map(move |c| {
            let pre = locate(regions, hub, c.from).map_or(0.0, |n| n.activity);
            let post = locate(regions, hub, c.to).map_or(0.0, |n| n.activity);
            (c, pre, post)
        })
    }
}

fn locate<'a>(regions: &'a [Region], hub: Option<&'a CentralHub>, key: NeuronKey) -> Option<&'a Neuron> {
    match key.cluster {
        Cluster::Region(r) => regions.get(r)?.neurons.get(key.index),
        Cluster::Hub => hub?.neurons.get(key.index),
    }
}

fn locate_mut<'a>(
    regions: &'a mut [Region],
    hub: &'a mut Option<CentralHub>,
    key: NeuronKey,
) -> Option<&'a mut Neuron> {
    match key.cluster {
        Cluster::Region(r) => regions.get_mut(r)?.neurons.get_mut(key.index),
        Cluster::Hub => hub.as_mut()?.neurons.get_mut(key.index),
    }
}

/// Put a signal on every outgoing connection of each neuron above `threshold`.
/// Returns the number of signals emitted.
fn emit_signals(neurons: &[Neuron], connections: &mut [Connection], threshold: f32) -> u64 {
    let mut emitted = 0;
    for neuron in neurons {
        if neuron.activity > threshold {
            for id in neuron.outgoing() {
                if let Some(conn) = connections.get_mut(id.index()) {
                    conn.add_signal(neuron.activity);
                    emitted += 1;
                }
            }
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_network() -> Network {
        let cfg = NetworkConfig::default()
            .with_bounds(Bounds::new(0.0, 0.0, 100.0, 100.0))
            .with_seed(42);
        Network::new(cfg).unwrap()
    }

    fn small_catalog(count: usize) -> Vec<RegionSpec> {
        vec![
            RegionSpec::new("a", "A", "#fff", (0.3, 0.3), 0.1).with_neuron_count(count),
            RegionSpec::new("sensory", "S", "#fff", (0.7, 0.7), 0.1).with_neuron_count(count),
        ]
    }

    #[test]
    fn end_to_end_idle_run() {
        let mut net = make_test_network();
        for _ in 0..100 {
            net.update(1.0);
        }

        let state = net.get_state();
        assert_eq!(state.regions.len(), 6);
        for (entry, spec) in state.regions.iter().zip(RegionSpec::default_catalog()) {
            assert_eq!(entry.id, spec.id);
            assert_eq!(entry.neuron_count, spec.neuron_count);
        }
        assert_eq!(state.stats.tick, 100);
        // Nothing drives an idle network.
        assert_eq!(state.stats.total_signals, 0);
        assert_eq!(state.stats.active_neurons, 0);
    }

    #[test]
    fn every_connection_is_referenced_exactly_once_each_side() {
        let cfg = NetworkConfig::default()
            .with_bounds(Bounds::new(0.0, 0.0, 100.0, 100.0))
            .with_hub(HubConfig::default())
            .with_seed(7);
        let net = Network::new(cfg).unwrap();
        assert!(!net.connections().is_empty());

        let n = net.connections().len();
        let mut out_refs = vec![0usize; n];
        let mut in_refs = vec![0usize; n];
        let hub_neurons = net.hub().map(|h| h.neurons()).unwrap_or(&[]);
        for neuron in net.all_neurons().chain(hub_neurons.iter()) {
            for id in neuron.outgoing() {
                out_refs[id.index()] += 1;
            }
            for id in neuron.incoming() {
                in_refs[id.index()] += 1;
            }
        }
        assert!(out_refs.iter().all(|&c| c == 1));
        assert!(in_refs.iter().all(|&c| c == 1));

        for (i, c) in net.connections().iter().enumerate() {
            assert_eq!(c.id.index(), i);
            assert_ne!(c.from, c.to);
            assert!(net.neuron(c.from).unwrap().outgoing().contains(&c.id));
            assert!(net.neuron(c.to).unwrap().incoming().contains(&c.id));
        }
    }

    #[test]
    fn inter_region_edges_run_forward_in_catalog_order() {
        let net = make_test_network();
        for c in net.connections() {
            match (c.kind, c.from.cluster, c.to.cluster) {
                (ConnectionKind::IntraRegion, Cluster::Region(a), Cluster::Region(b)) => {
                    assert_eq!(a, b)
                }
                (ConnectionKind::InterRegion, Cluster::Region(a), Cluster::Region(b)) => {
                    assert!(a < b)
                }
                other => panic!("unexpected connection {other:?}"),
            }
        }
    }

    #[test]
    fn zero_probabilities_build_no_edges() {
        let cfg = NetworkConfig::default()
            .with_probabilities(0.0, 0.0)
            .with_seed(1);
        let net = Network::new(cfg).unwrap();
        assert!(net.connections().is_empty());
    }

    #[test]
    fn invalid_config_fails_fast() {
        let cfg = NetworkConfig::default().with_probabilities(1.2, 0.05);
        assert!(matches!(
            Network::new(cfg),
            Err(ConfigError::OutOfRange {
                field: "intra_prob",
                ..
            })
        ));

        let mut regions = RegionSpec::default_catalog();
        regions.push(regions[0].clone());
        let cfg = NetworkConfig::default().with_regions(regions);
        assert!(matches!(
            Network::new(cfg),
            Err(ConfigError::DuplicateRegion(id)) if id == "frontal"
        ));
    }

    #[test]
    fn hub_id_is_reserved_when_hub_is_present() {
        let regions = vec![
            RegionSpec::new("hub", "Hub", "#fff", (0.2, 0.2), 0.1).with_neuron_count(3),
            RegionSpec::new("sensory", "S", "#fff", (0.7, 0.7), 0.1).with_neuron_count(3),
        ];
        let cfg = NetworkConfig::default()
            .with_regions(regions.clone())
            .with_hub(HubConfig::default());
        assert!(matches!(
            Network::new(cfg),
            Err(ConfigError::ReservedRegionId(id)) if id == "hub"
        ));

        // Without a hub the name is free and neuron ids stay unique.
        let net = Network::new(NetworkConfig::default().with_regions(regions).with_seed(1)).unwrap();
        let mut ids: Vec<&str> = net.all_neurons().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn neuron_ids_are_unique_with_hub() {
        let net = Network::new(NetworkConfig::default().with_hub(HubConfig::default()).with_seed(2)).unwrap();
        let hub = net.hub().unwrap();
        let mut ids: Vec<&str> = net
            .all_neurons()
            .chain(hub.neurons().iter())
            .map(|n| n.id.as_str())
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn fired_neuron_emits_one_tick_later_than_threshold_crossing() {
        let cfg = NetworkConfig::default()
            .with_regions(small_catalog(2))
            .with_probabilities(1.0, 0.0)
            .with_seed(3);
        let mut net = Network::new(cfg).unwrap();
        assert_eq!(net.connections().len(), 4);

        net.neuron_mut(NeuronKey::region(0, 0)).unwrap().stimulate(1.0);
        net.update(1.0);

        // Fired this tick, signal placed on its single outgoing edge.
        assert_eq!(net.total_signals(), 1);
        let out = net.neuron(NeuronKey::region(0, 0)).unwrap().outgoing()[0];
        assert_eq!(net.connection(out).unwrap().signals().len(), 1);
        assert_eq!(net.connection(out).unwrap().signals()[0].progress, 0.0);
        assert_eq!(net.active_neurons(), 1);
    }

    #[test]
    fn signal_delivery_drives_downstream_neuron() {
        let cfg = NetworkConfig::default()
            .with_regions(small_catalog(2))
            .with_probabilities(1.0, 0.0)
            .with_seed(3);
        let mut net = Network::new(cfg).unwrap();

        net.neuron_mut(NeuronKey::region(0, 0)).unwrap().stimulate(1.0);
        net.update(1.0);

        // 50 ticks of travel, delivered at the start of the 50th update.
        for _ in 0..49 {
            net.update(1.0);
            assert_eq!(net.neuron(NeuronKey::region(0, 1)).unwrap().activity, 0.0);
        }
        net.update(1.0);
        let downstream = net.neuron(NeuronKey::region(0, 1)).unwrap();
        assert_eq!(downstream.activity, 1.0);
        assert_eq!(downstream.refractory, 5);
    }

    #[test]
    fn stimulate_unknown_region_is_reported() {
        let mut net = make_test_network();
        assert_eq!(
            net.stimulate_region("cerebellum", 1.0),
            Err(LookupError::UnknownRegion("cerebellum".to_string()))
        );
        assert_eq!(net.stimulate_region("motor", 1.0), Ok(5));
        assert_eq!(net.stimulate_hub(1.0), Err(LookupError::NoHub));
    }

    #[test]
    fn inject_input_feeds_first_sensory_neurons() {
        let mut net = make_test_network();
        let values: Vec<f32> = (0..15).map(|i| 0.01 * i as f32).collect();
        assert_eq!(net.inject_input(&values), Ok(10));

        let sensory = net.region("sensory").unwrap();
        for (i, n) in sensory.neurons().iter().enumerate() {
            let expected = if i < 10 { 0.01 * i as f32 } else { 0.0 };
            assert!((n.potential - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn inject_input_without_sensory_region_is_reported() {
        let cfg = NetworkConfig::default()
            .with_regions(vec![RegionSpec::new("a", "A", "#fff", (0.5, 0.5), 0.1)])
            .with_seed(2);
        let mut net = Network::new(cfg).unwrap();
        assert!(matches!(
            net.inject_input(&[1.0]),
            Err(LookupError::UnknownRegion(_))
        ));
    }

    #[test]
    fn stimulated_network_stays_bounded() {
        let cfg = NetworkConfig::default()
            .with_hub(HubConfig::default())
            .with_seed(11);
        let mut net = Network::new(cfg).unwrap();
        for t in 0..300 {
            if t % 10 == 0 {
                net.stimulate_region("frontal", 1.0).unwrap();
                net.stimulate_hub(1.0).unwrap();
            }
            net.update(1.5);
            for n in net.all_neurons() {
                assert!((0.0..=1.0).contains(&n.activity));
            }
            let readout = net.hub().unwrap().readout();
            assert_eq!(readout.len(), 4);
            assert!(readout.iter().all(|v| (0.0..=1.0).contains(v)));
        }
        assert!(net.total_signals() > 0);
    }

    /// Round-robin, modulated, normalised region activity as the hub should report it.
    fn expected_readout(net: &Network, weights: &[f32]) -> Vec<f32> {
        let size = net.hub().unwrap().output_size();
        let mut out = vec![0.0f32; size];
        for (i, region) in net.regions().iter().enumerate() {
            out[i % size] += region.total_activity * weights[i];
        }
        let max = out.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            let divisor = max.max(1.0);
            for v in &mut out {
                *v = (*v / divisor).min(1.0);
            }
        }
        out
    }

    fn hub_weights(net: &Network) -> Vec<f32> {
        let hub = net.hub().unwrap();
        net.regions().iter().map(|r| hub.modulation_weight(&r.id)).collect()
    }

    #[test]
    fn idle_tick_nudges_modulation_toward_target() {
        let cfg = NetworkConfig::default()
            .with_hub(HubConfig::default())
            .with_seed(4);
        let mut net = Network::new(cfg).unwrap();
        net.update(1.0);

        // 1.0 + (0.5 - 0.0) * 0.01
        let hub = net.hub().unwrap();
        assert!((hub.modulation_weight("frontal") - 1.005).abs() < 1e-6);
        assert!(hub.readout().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn update_folds_modulated_activity_into_readout() {
        let cfg = NetworkConfig::default()
            .with_hub(HubConfig::default())
            .with_seed(6);
        let mut net = Network::new(cfg).unwrap();

        for id in ["frontal", "temporal", "sensory"] {
            net.stimulate_region(id, 1.0).unwrap();
        }
        net.update(1.0);
        let first = expected_readout(&net, &[1.0; 6]);
        assert!(first.iter().any(|&v| v > 0.0));
        for (got, want) in net.hub().unwrap().readout().iter().zip(&first) {
            assert!((got - want).abs() < 1e-6);
        }

        // The second tick aggregates with the weights the first tick left behind.
        let weights = hub_weights(&net);
        assert!(weights.iter().all(|&w| w != 1.0));
        net.stimulate_region("motor", 1.0).unwrap();
        net.update(1.0);
        let second = expected_readout(&net, &weights);
        for (got, want) in net.hub().unwrap().readout().iter().zip(&second) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn reset_clears_dynamics_but_keeps_topology() {
        let cfg = NetworkConfig::default()
            .with_hub(HubConfig::default())
            .with_seed(5);
        let mut net = Network::new(cfg).unwrap();
        let edges = net.connections().len();
        for _ in 0..5 {
            net.stimulate_region("temporal", 2.0).unwrap();
            net.update(1.0);
        }
        net.connection_mut(ConnectionId(0)).unwrap().weight = 1.7;

        net.reset();
        let stats = net.stats();
        assert_eq!(stats.tick, 0);
        assert_eq!(stats.total_signals, 0);
        assert_eq!(stats.signals_in_flight, 0);
        assert_eq!(stats.connection_count, edges);
        assert!(net.all_neurons().all(|n| n.activity == 0.0 && n.potential == 0.0));
        assert_eq!(net.connection(ConnectionId(0)).unwrap().weight, 1.7);
    }

    #[test]
    fn same_seed_same_topology() {
        let a = make_test_network();
        let b = make_test_network();
        assert_eq!(a.connections().len(), b.connections().len());
        for (x, y) in a.connections().iter().zip(b.connections()) {
            assert_eq!((x.from, x.to), (y.from, y.to));
        }
    }

    #[test]
    fn parallel_tier_matches_scalar() {
        let build = |tier| {
            let mut cfg = NetworkConfig::default().with_seed(9);
            cfg.tier = tier;
            Network::new(cfg).unwrap()
        };
        let mut scalar = build(ExecutionTier::Scalar);
        let mut parallel = build(ExecutionTier::Parallel);
        for t in 0..120 {
            if t % 15 == 0 {
                scalar.stimulate_region("parietal", 1.0).unwrap();
                parallel.stimulate_region("parietal", 1.0).unwrap();
            }
            scalar.update(2.0);
            parallel.update(2.0);
        }
        assert_eq!(scalar.get_state(), parallel.get_state());
    }
}
