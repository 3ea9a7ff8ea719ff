#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{check_finite, check_range, ConfigError};
use crate::neuron::{Neuron, NeuronDynamics};
use crate::prng::Prng;

/// Bounding rectangle that relative region geometry is resolved against.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            x: 100.0,
            y: 50.0,
            width: 600.0,
            height: 500.0,
        }
    }
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("bounds.x", self.x)?;
        check_finite("bounds.y", self.y)?;
        check_finite("bounds.width", self.width)?;
        check_finite("bounds.height", self.height)?;
        if self.width <= 0.0 {
            return Err(ConfigError::EmptyDimension {
                field: "bounds.width",
            });
        }
        if self.height <= 0.0 {
            return Err(ConfigError::EmptyDimension {
                field: "bounds.height",
            });
        }
        Ok(())
    }

    /// Absolute center and radius for a relative position and size.
    pub fn resolve(&self, position: (f32, f32), size: f32) -> (f32, f32, f32) {
        let x = self.x + self.width * position.0;
        let y = self.y + self.height * position.1;
        let radius = self.width.min(self.height) * size;
        (x, y, radius)
    }
}

/// One row of the region catalog.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionSpec {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Center as fractions of the bounding rectangle.
    pub position: (f32, f32),
    /// Radius as a fraction of the shorter bounds side.
    pub size: f32,
    pub neuron_count: usize,
}

impl RegionSpec {
    pub const DEFAULT_NEURON_COUNT: usize = 60;

    pub fn new(id: &str, name: &str, color: &str, position: (f32, f32), size: f32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            position,
            size,
            neuron_count: Self::DEFAULT_NEURON_COUNT,
        }
    }

    pub fn with_neuron_count(mut self, count: usize) -> Self {
        self.neuron_count = count;
        self
    }

    /// The six-region layout used when no catalog is given.
    pub fn default_catalog() -> Vec<RegionSpec> {
        vec![
            RegionSpec::new("frontal", "Frontal", "#00ffff", (0.25, 0.25), 0.18),
            RegionSpec::new("parietal", "Parietal", "#4488ff", (0.65, 0.2), 0.16),
            RegionSpec::new("temporal", "Temporal", "#00ff88", (0.4, 0.65), 0.15),
            RegionSpec::new("occipital", "Occipital", "#ff00ff", (0.8, 0.45), 0.14),
            RegionSpec::new("motor", "Motor", "#ffff00", (0.2, 0.45), 0.12),
            RegionSpec::new("sensory", "Sensory", "#ff8844", (0.45, 0.4), 0.14),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("region.position.x", self.position.0)?;
        check_finite("region.position.y", self.position.1)?;
        check_range("region.size", self.size, 0.0, 1.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub color: String,
    pub relative_position: (f32, f32),
    pub relative_size: f32,
    pub neuron_count: usize,

    // Absolute geometry, resolved by `generate_neurons`.
    pub x: f32,
    pub y: f32,
    pub radius: f32,

    pub total_activity: f32,

    pub(crate) neurons: Vec<Neuron>,
}

impl Region {
    pub fn new(spec: &RegionSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            color: spec.color.clone(),
            relative_position: spec.position,
            relative_size: spec.size,
            neuron_count: spec.neuron_count,
            x: 0.0,
            y: 0.0,
            radius: 0.0,
            total_activity: 0.0,
            neurons: Vec::new(),
        }
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// Resolve absolute geometry and scatter `neuron_count` neurons.
    ///
    /// Angle and radius are drawn uniformly, so density rises toward the center.
    pub fn generate_neurons(&mut self, bounds: &Bounds, dynamics: &NeuronDynamics, rng: &mut Prng) {
        let (x, y, radius) = bounds.resolve(self.relative_position, self.relative_size);
        self.x = x;
        self.y = y;
        self.radius = radius;

        self.neurons = scatter_neurons(
            &self.id,
            &self.id,
            self.neuron_count,
            (x, y),
            radius * 0.85,
            dynamics,
            rng,
        );
    }

    /// Update every neuron and return the mean activity (0 when empty).
    pub fn update(&mut self, dynamics: &NeuronDynamics) -> f32 {
        let mut sum = 0.0;
        for neuron in &mut self.neurons {
            neuron.update(dynamics);
            sum += neuron.activity;
        }

        self.total_activity = if self.neurons.is_empty() {
            0.0
        } else {
            sum / self.neurons.len() as f32
        };
        self.total_activity
    }

    /// Stimulate up to `count` distinct neurons picked at random.
    /// Returns how many were driven.
    pub fn stimulate(&mut self, strength: f32, count: usize, rng: &mut Prng) -> usize {
        stimulate_random(&mut self.neurons, strength, count, rng)
    }

    pub fn reset(&mut self) {
        for neuron in &mut self.neurons {
            neuron.reset();
        }
        self.total_activity = 0.0;
    }
}

/// Disk scatter shared by regions and the hub.
pub(crate) fn scatter_neurons(
    id_prefix: &str,
    region_id: &str,
    count: usize,
    center: (f32, f32),
    max_radius: f32,
    dynamics: &NeuronDynamics,
    rng: &mut Prng,
) -> Vec<Neuron> {
    (0..count)
        .map(|i| {
            let angle = rng.next_f32_01() * core::f32::consts::TAU;
            let r = rng.next_f32_01() * max_radius;
            let mut neuron = Neuron::new(
                format!("{id_prefix}_{i}"),
                center.0 + angle.cos() * r,
                center.1 + angle.sin() * r,
                region_id.to_string(),
                dynamics.threshold,
            );
            neuron.radius = rng.gen_range_f32(2.0, 4.0);
            neuron
        })
        .collect()
}

pub(crate) fn stimulate_random(
    neurons: &mut [Neuron],
    strength: f32,
    count: usize,
    rng: &mut Prng,
) -> usize {
    let mut order: Vec<usize> = (0..neurons.len()).collect();
    rng.shuffle(&mut order);

    let n = count.min(neurons.len());
    for &i in &order[..n] {
        neurons[i].stimulate(strength);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_region(count: usize, rng: &mut Prng) -> Region {
        let spec = RegionSpec::new("r", "R", "#fff", (0.5, 0.5), 0.2).with_neuron_count(count);
        let mut region = Region::new(&spec);
        region.generate_neurons(
            &Bounds::new(0.0, 0.0, 100.0, 100.0),
            &NeuronDynamics::default(),
            rng,
        );
        region
    }

    #[test]
    fn neurons_lie_inside_scaled_disk() {
        let mut rng = Prng::new(5);
        let region = make_region(200, &mut rng);
        assert_eq!(region.x, 50.0);
        assert_eq!(region.y, 50.0);
        assert_eq!(region.radius, 20.0);
        assert_eq!(region.neurons().len(), 200);

        for n in region.neurons() {
            let d = ((n.x - 50.0).powi(2) + (n.y - 50.0).powi(2)).sqrt();
            assert!(d <= 20.0 * 0.85 + 1e-3);
            assert_eq!(n.region_id, "r");
            assert!((2.0..4.0).contains(&n.radius));
        }
        assert_eq!(region.neurons()[3].id, "r_3");
    }

    #[test]
    fn empty_region_has_zero_activity() {
        let mut rng = Prng::new(5);
        let mut region = make_region(0, &mut rng);
        assert_eq!(region.update(&NeuronDynamics::default()), 0.0);
    }

    #[test]
    fn update_returns_mean_activity() {
        let mut rng = Prng::new(5);
        let mut region = make_region(4, &mut rng);
        region.neurons[0].stimulate(1.0);
        let mean = region.update(&NeuronDynamics::default());
        assert!((mean - 0.25).abs() < 1e-6);
        assert_eq!(region.total_activity, mean);
    }

    #[test]
    fn stimulate_picks_distinct_neurons() {
        let mut rng = Prng::new(8);
        let mut region = make_region(10, &mut rng);

        assert_eq!(region.stimulate(0.3, 4, &mut rng), 4);
        let touched = region.neurons().iter().filter(|n| n.potential > 0.0).count();
        assert_eq!(touched, 4);
        assert!(region
            .neurons()
            .iter()
            .all(|n| n.potential == 0.0 || (n.potential - 0.3).abs() < 1e-6));

        assert_eq!(region.stimulate(0.3, 50, &mut rng), 10);
    }

    #[test]
    fn default_catalog_has_six_unique_regions() {
        let catalog = RegionSpec::default_catalog();
        assert_eq!(catalog.len(), 6);
        let mut ids: Vec<&str> = catalog.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert!(catalog.iter().all(|s| s.validate().is_ok()));
    }

    #[test]
    fn bounds_reject_degenerate_rectangles() {
        assert!(Bounds::default().validate().is_ok());
        assert!(Bounds::new(0.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(Bounds::new(0.0, f32::INFINITY, 10.0, 10.0).validate().is_err());
    }
}
