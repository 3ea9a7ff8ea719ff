#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::connection::{Connection, ConnectionKind};
use crate::network::{Network, NetworkStats};
use crate::region::Bounds;

/// A read-only, render-ready picture of the network at one tick.
///
/// Design intent:
/// - Observers cannot mutate or steer the network.
/// - Framing is *on-demand* and allocates; the update loop never builds one.
/// - Idle connections are left out unless `FrameOptions::include_idle` is set,
///   which keeps frames small for the default six-region layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkFrame {
    pub tick: u64,
    pub bounds: Bounds,
    pub stats: NetworkStats,
    pub regions: Vec<RegionView>,
    pub hub: Option<HubView>,
    pub neurons: Vec<NeuronView>,
    pub connections: Vec<ConnectionView>,
    pub signals: Vec<SignalView>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionView {
    pub id: String,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub activity: f32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HubView {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub readout: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuronView {
    pub id: String,
    pub region_id: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub activity: f32,
    pub refractory: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionView {
    pub label: String,
    pub kind: ConnectionKind,
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub weight: f32,
    pub activity: f32,
}

/// A signal interpolated onto its connection's straight segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalView {
    pub x: f32,
    pub y: f32,
    pub progress: f32,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOptions {
    /// Emit every connection, not only those carrying signals or recent activity.
    pub include_idle: bool,
    /// Connection activity above this counts as "recent".
    pub activity_floor: f32,
    /// Include hub neurons in `neurons`.
    pub include_hub_neurons: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            include_idle: false,
            activity_floor: 0.05,
            include_hub_neurons: true,
        }
    }
}

pub struct NetworkAdapter<'a> {
    network: &'a Network,
    opts: FrameOptions,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self {
            network,
            opts: FrameOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: FrameOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn frame(&self) -> NetworkFrame {
        let net = self.network;

        let regions = net
            .regions()
            .iter()
            .map(|r| RegionView {
                id: r.id.clone(),
                name: r.name.clone(),
                color: r.color.clone(),
                x: r.x,
                y: r.y,
                radius: r.radius,
                activity: r.total_activity,
            })
            .collect();

        let hub = net.hub().map(|h| HubView {
            x: h.x,
            y: h.y,
            radius: h.radius,
            readout: h.get_readout(),
        });

        let hub_neurons = net
            .hub()
            .filter(|_| self.opts.include_hub_neurons)
            .map(|h| h.neurons())
            .unwrap_or_default();

        let neurons = net
            .all_neurons()
            .chain(hub_neurons.iter())
            .map(|n| NeuronView {
                id: n.id.clone(),
                region_id: n.region_id.clone(),
                x: n.x,
                y: n.y,
                radius: n.radius,
                activity: n.activity,
                refractory: n.is_refractory(),
            })
            .collect();

        let mut connections = Vec::new();
        let mut signals = Vec::new();
        for conn in net.connections() {
            let Some((from, to)) = self.endpoints(conn) else {
                continue;
            };

            for s in conn.signals() {
                signals.push(SignalView {
                    x: from.0 + (to.0 - from.0) * s.progress,
                    y: from.1 + (to.1 - from.1) * s.progress,
                    progress: s.progress,
                    strength: s.strength,
                });
            }

            let busy = !conn.signals().is_empty() || conn.activity > self.opts.activity_floor;
            if self.opts.include_idle || busy {
                connections.push(ConnectionView {
                    label: conn.label(),
                    kind: conn.kind,
                    from,
                    to,
                    weight: conn.weight,
                    activity: conn.activity,
                });
            }
        }

        NetworkFrame {
            tick: net.tick(),
            bounds: *net.bounds(),
            stats: net.stats(),
            regions,
            hub,
            neurons,
            connections,
            signals,
        }
    }

    fn endpoints(&self, conn: &Connection) -> Option<((f32, f32), (f32, f32))> {
        let a = self.network.neuron(conn.from)?;
        let b = self.network.neuron(conn.to)?;
        Some(((a.x, a.y), (b.x, b.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubConfig;
    use crate::network::NetworkConfig;

    fn make_network(hub: bool) -> Network {
        let mut cfg = NetworkConfig::default().with_seed(11);
        if hub {
            cfg = cfg.with_hub(HubConfig::default());
        }
        Network::new(cfg).unwrap()
    }

    #[test]
    fn quiet_network_frames_without_connections() {
        let net = make_network(false);
        let frame = NetworkAdapter::new(&net).frame();
        assert_eq!(frame.tick, 0);
        assert_eq!(frame.regions.len(), 6);
        assert!(frame.hub.is_none());
        assert_eq!(frame.neurons.len(), net.neuron_count());
        assert!(frame.connections.is_empty());
        assert!(frame.signals.is_empty());
    }

    #[test]
    fn include_idle_lists_every_connection() {
        let net = make_network(true);
        let opts = FrameOptions {
            include_idle: true,
            ..FrameOptions::default()
        };
        let frame = NetworkAdapter::new(&net).with_options(opts).frame();
        assert_eq!(frame.connections.len(), net.connections().len());

        let hub = net.hub().unwrap();
        assert_eq!(frame.neurons.len(), net.neuron_count() + hub.neurons().len());
        assert_eq!(frame.hub.as_ref().map(|h| h.readout.len()), Some(hub.output_size()));
    }

    #[test]
    fn signals_sit_on_their_segment() {
        let mut net = make_network(false);
        net.stimulate_region("frontal", 1.0).unwrap();
        for _ in 0..5 {
            net.update(1.0);
        }

        let frame = NetworkAdapter::new(&net).frame();
        assert!(!frame.signals.is_empty());
        assert!(!frame.connections.is_empty());

        let (lo_x, hi_x) = (net.bounds().x, net.bounds().x + net.bounds().width);
        for s in &frame.signals {
            assert!(s.progress > 0.0 && s.progress < 1.0);
            assert!(s.x >= lo_x && s.x <= hi_x);
        }
    }

    #[test]
    fn hub_neurons_can_be_hidden() {
        let net = make_network(true);
        let opts = FrameOptions {
            include_hub_neurons: false,
            ..FrameOptions::default()
        };
        let frame = NetworkAdapter::new(&net).with_options(opts).frame();
        assert_eq!(frame.neurons.len(), net.neuron_count());
        assert!(frame.neurons.iter().all(|n| n.region_id != crate::hub::HUB_REGION_ID));
    }
}
