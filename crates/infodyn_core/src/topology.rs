//! Brain wiring model: layers, nerves and synapses.
//!
//! Neuron indices are laid out as `Input [0, i)`, `Output [i, i + o)` and
//! `Internal [i + o, N)`. A [`Topology`] is validated once at construction
//! and is immutable afterwards; every measure driver selects its variables
//! through the queries below.

use core::fmt;
use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{InfodynError, Result};

/// Neuron layer selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    All,
    Input,
    Output,
    Internal,
    /// Output ∪ Internal
    Processing,
}

impl Layer {
    pub fn name(self) -> &'static str {
        match self {
            Layer::All => "All",
            Layer::Input => "Input",
            Layer::Output => "Output",
            Layer::Internal => "Internal",
            Layer::Processing => "Processing",
        }
    }

    /// True if `other` (a concrete layer) is part of `self`.
    pub fn contains(self, other: Layer) -> bool {
        match self {
            Layer::All => true,
            Layer::Processing => matches!(other, Layer::Output | Layer::Internal | Layer::Processing),
            _ => self == other,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named, contiguous bundle of neurons inside a single layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nerve {
    pub label: String,
    pub start: usize,
    pub count: usize,
}

impl Nerve {
    pub fn new(label: impl Into<String>, start: usize, count: usize) -> Self {
        Self {
            label: label.into(),
            start,
            count,
        }
    }

    /// Places nerves back to back from index 0 in declaration order.
    pub fn contiguous<'a, I>(declarations: I) -> Vec<Nerve>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut start = 0;
        declarations
            .into_iter()
            .map(|(label, count)| {
                let nerve = Nerve::new(label, start, count);
                // A saturated start fails range validation in `Topology::new`.
                start = start.saturating_add(count);
                nerve
            })
            .collect()
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.start + self.count
    }

    pub fn contains(&self, neuron: usize) -> bool {
        self.indices().contains(&neuron)
    }

    pub fn overlaps(&self, other: &Nerve) -> bool {
        self.start < other.start.saturating_add(other.count)
            && other.start < self.start.saturating_add(self.count)
    }
}

/// Directed wiring edge `pre -> post`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Synapse {
    pub pre: usize,
    pub post: usize,
}

impl Synapse {
    pub fn new(pre: usize, post: usize) -> Self {
        Self { pre, post }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    neuron_count: usize,
    input_count: usize,
    output_count: usize,
    nerves: Vec<Nerve>,
    synapses: Vec<Synapse>,
}

impl Topology {
    /// Builds and validates a topology. Fails fast on the first violated
    /// invariant.
    pub fn new(
        neuron_count: usize,
        input_count: usize,
        output_count: usize,
        nerves: Vec<Nerve>,
        synapses: Vec<Synapse>,
    ) -> Result<Self> {
        if input_count
            .checked_add(output_count)
            .map_or(true, |layered| layered > neuron_count)
        {
            return Err(InfodynError::Topology(format!(
                "{} input + {} output neurons exceed neuron count {}",
                input_count, output_count, neuron_count
            )));
        }

        let topology = Self {
            neuron_count,
            input_count,
            output_count,
            nerves: Vec::with_capacity(nerves.len()),
            synapses: Vec::with_capacity(synapses.len()),
        };
        topology.with_nerves(nerves)?.with_synapses(synapses)
    }

    fn with_nerves(mut self, nerves: Vec<Nerve>) -> Result<Self> {
        for nerve in nerves {
            if nerve.count == 0 {
                return Err(InfodynError::Topology(format!("nerve {} is empty", nerve.label)));
            }
            let last = nerve.start.checked_add(nerve.count - 1);
            let (first_layer, last_layer) =
                match (self.layer_of(nerve.start), last.and_then(|last| self.layer_of(last))) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(InfodynError::Topology(format!(
                            "nerve {} (start {}, {} neurons) exceeds neuron count {}",
                            nerve.label, nerve.start, nerve.count, self.neuron_count
                        )))
                    }
                };
            if first_layer != last_layer {
                return Err(InfodynError::Topology(format!(
                    "nerve {} spans {} and {} layers",
                    nerve.label, first_layer, last_layer
                )));
            }
            if let Some(other) = self.nerves.iter().find(|other| other.overlaps(&nerve)) {
                return Err(InfodynError::Topology(format!(
                    "nerve {} overlaps nerve {}",
                    nerve.label, other.label
                )));
            }
            self.nerves.push(nerve);
        }
        Ok(self)
    }

    fn with_synapses(mut self, synapses: Vec<Synapse>) -> Result<Self> {
        for synapse in synapses {
            if !self.is_valid(synapse.pre) || !self.is_valid(synapse.post) {
                return Err(InfodynError::Topology(format!(
                    "synapse {} -> {} references a neuron outside [0, {})",
                    synapse.pre, synapse.post, self.neuron_count
                )));
            }
            if synapse.pre == synapse.post {
                return Err(InfodynError::Topology(format!(
                    "synapse {} -> {} is a self-loop",
                    synapse.pre, synapse.post
                )));
            }
            if self.layer_of(synapse.post) == Some(Layer::Input) {
                return Err(InfodynError::Topology(format!(
                    "synapse {} -> {} terminates on an input neuron",
                    synapse.pre, synapse.post
                )));
            }
            self.synapses.push(synapse);
        }
        Ok(self)
    }

    pub fn neuron_count(&self) -> usize {
        self.neuron_count
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn output_count(&self) -> usize {
        self.output_count
    }

    pub fn is_valid(&self, neuron: usize) -> bool {
        neuron < self.neuron_count
    }

    /// Concrete layer (Input, Output or Internal) of a neuron.
    pub fn layer_of(&self, neuron: usize) -> Option<Layer> {
        if !self.is_valid(neuron) {
            None
        } else if neuron < self.input_count {
            Some(Layer::Input)
        } else if neuron < self.input_count + self.output_count {
            Some(Layer::Output)
        } else {
            Some(Layer::Internal)
        }
    }

    /// Ordered index range of a layer.
    pub fn neuron_indices(&self, layer: Layer) -> Range<usize> {
        let processing_start = self.input_count;
        let internal_start = self.input_count + self.output_count;
        match layer {
            Layer::All => 0..self.neuron_count,
            Layer::Input => 0..self.input_count,
            Layer::Output => processing_start..internal_start,
            Layer::Internal => internal_start..self.neuron_count,
            Layer::Processing => processing_start..self.neuron_count,
        }
    }

    /// Nerves lying inside `layer`, in declaration order.
    pub fn nerves(&self, layer: Layer) -> Vec<&Nerve> {
        self.nerves
            .iter()
            .filter(|nerve| {
                self.layer_of(nerve.start)
                    .is_some_and(|concrete| layer.contains(concrete))
            })
            .collect()
    }

    pub fn all_nerves(&self) -> &[Nerve] {
        &self.nerves
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    /// Distinct predecessors of `post`, in synapse order.
    ///
    /// Scans every synapse: the wire format does not promise any ordering,
    /// so there is no early exit.
    pub fn pre_neurons(&self, post: usize) -> Vec<usize> {
        let mut pre_neurons = Vec::new();
        for synapse in &self.synapses {
            if synapse.post == post && !pre_neurons.contains(&synapse.pre) {
                pre_neurons.push(synapse.pre);
            }
        }
        pre_neurons
    }

    /// Predecessors of `post` other than `excluded`; the conditioning set of
    /// a complete transfer measurement.
    pub fn pre_neurons_excluding(&self, post: usize, excluded: usize) -> Vec<usize> {
        let mut pre_neurons = self.pre_neurons(post);
        pre_neurons.retain(|&pre| pre != excluded);
        pre_neurons
    }

    /// Distinct successors of `pre`, in synapse order.
    pub fn post_neurons(&self, pre: usize) -> Vec<usize> {
        let mut post_neurons = Vec::new();
        for synapse in &self.synapses {
            if synapse.pre == pre && !post_neurons.contains(&synapse.post) {
                post_neurons.push(synapse.post);
            }
        }
        post_neurons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2 input, 2 output, 2 internal neurons.
    fn sample_topology() -> Topology {
        let nerves = Nerve::contiguous([("Red", 1), ("Green", 1), ("Eat", 1), ("Mate", 1)]);
        let synapses = vec![
            Synapse::new(0, 2),
            Synapse::new(1, 2),
            Synapse::new(4, 2),
            Synapse::new(0, 5),
            Synapse::new(5, 3),
        ];
        Topology::new(6, 2, 2, nerves, synapses).expect("valid topology")
    }

    #[test]
    fn test_layer_ranges() {
        let topology = sample_topology();
        assert_eq!(topology.neuron_indices(Layer::All), 0..6);
        assert_eq!(topology.neuron_indices(Layer::Input), 0..2);
        assert_eq!(topology.neuron_indices(Layer::Output), 2..4);
        assert_eq!(topology.neuron_indices(Layer::Internal), 4..6);
        assert_eq!(topology.neuron_indices(Layer::Processing), 2..6);
        assert_eq!(topology.layer_of(3), Some(Layer::Output));
        assert_eq!(topology.layer_of(6), None);
    }

    #[test]
    fn test_nerves_by_layer() {
        let topology = sample_topology();
        let input: Vec<&str> = topology
            .nerves(Layer::Input)
            .iter()
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(input, vec!["Red", "Green"]);
        assert_eq!(topology.nerves(Layer::Output).len(), 2);
        assert_eq!(topology.nerves(Layer::Processing).len(), 2);
        assert!(topology.nerves(Layer::Internal).is_empty());
        assert_eq!(topology.nerves(Layer::All).len(), 4);
    }

    #[test]
    fn test_pre_and_post_neurons() {
        let topology = sample_topology();
        assert_eq!(topology.pre_neurons(2), vec![0, 1, 4]);
        assert_eq!(topology.pre_neurons_excluding(2, 1), vec![0, 4]);
        assert_eq!(topology.post_neurons(0), vec![2, 5]);
        assert!(topology.pre_neurons(0).is_empty());
        assert!(topology.post_neurons(2).is_empty());
    }

    #[test]
    fn test_unsorted_synapses_are_fully_scanned() {
        // Synapses into neuron 2 are interleaved with synapses into 3.
        let synapses = vec![
            Synapse::new(0, 2),
            Synapse::new(0, 3),
            Synapse::new(1, 2),
            Synapse::new(1, 3),
            Synapse::new(3, 2),
        ];
        let topology = Topology::new(4, 2, 2, Vec::new(), synapses).unwrap();
        assert_eq!(topology.pre_neurons_excluding(2, 0), vec![1, 3]);
    }

    #[test]
    fn test_invalid_topologies_rejected() {
        assert!(Topology::new(3, 2, 2, Vec::new(), Vec::new()).is_err());

        let spanning = vec![Nerve::new("Wide", 1, 2)];
        assert!(Topology::new(4, 2, 1, spanning, Vec::new()).is_err());

        let overlapping = vec![Nerve::new("A", 0, 2), Nerve::new("B", 1, 1)];
        assert!(Topology::new(4, 2, 1, overlapping, Vec::new()).is_err());

        let into_input = vec![Synapse::new(2, 0)];
        assert!(Topology::new(4, 2, 1, Vec::new(), into_input).is_err());

        let self_loop = vec![Synapse::new(3, 3)];
        assert!(Topology::new(4, 2, 1, Vec::new(), self_loop).is_err());

        let out_of_range = vec![Synapse::new(7, 3)];
        assert!(Topology::new(4, 2, 1, Vec::new(), out_of_range).is_err());

        assert!(Topology::new(1, usize::MAX, 1, Vec::new(), Vec::new()).is_err());
        let huge = vec![Nerve::new("Huge", 1, usize::MAX)];
        assert!(matches!(
            Topology::new(4, 2, 1, huge, Vec::new()),
            Err(InfodynError::Topology(_))
        ));
        let after_huge = Nerve::contiguous([("A", usize::MAX), ("B", 1)]);
        assert_eq!(after_huge[1].start, usize::MAX);
        assert!(Topology::new(4, 2, 1, after_huge, Vec::new()).is_err());
    }
}
