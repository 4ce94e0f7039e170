//! Hierarchical (count, sum) aggregation and local-series bookkeeping.
//!
//! Parent tallies are always built by merging child tallies in a fixed
//! order, so a parent's `sum` is bit-identical to summing its children's
//! `sum`s in that order.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{InfodynError, Result};
use crate::topology::{Layer, Topology};

/// Running `(count, sum)` of scalar contributions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Tally {
    pub count: usize,
    pub sum: f64,
}

impl Tally {
    pub fn of(value: f64) -> Self {
        Self { count: 1, sum: value }
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn merge(&mut self, other: &Tally) {
        self.count += other.count;
        self.sum += other.sum;
    }

    /// `sum / count`, or 0 for an empty tally.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<'a> FromIterator<&'a Tally> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a Tally>>(iter: I) -> Self {
        let mut total = Tally::default();
        for tally in iter {
            total.merge(tally);
        }
        total
    }
}

/// Arithmetic mean of a local series, 0 when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Per-neuron local series keyed by neuron index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Locals {
    series: BTreeMap<usize, Vec<f64>>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, neuron: usize, series: Vec<f64>) {
        self.series.insert(neuron, series);
    }

    /// Element-wise adds `series` into the neuron's entry, creating it if
    /// absent. Both series must share one alignment.
    pub fn accumulate(&mut self, neuron: usize, series: &[f64]) -> Result<()> {
        match self.series.get_mut(&neuron) {
            Some(existing) => {
                if existing.len() != series.len() {
                    return Err(InfodynError::Estimator(format!(
                        "local series for neuron {} has {} rows, contribution has {}",
                        neuron,
                        existing.len(),
                        series.len()
                    )));
                }
                for (total, value) in existing.iter_mut().zip(series) {
                    *total += value;
                }
            }
            None => {
                self.series.insert(neuron, series.to_vec());
            }
        }
        Ok(())
    }

    pub fn get(&self, neuron: usize) -> Option<&[f64]> {
        self.series.get(&neuron).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f64])> {
        self.series.iter().map(|(&neuron, series)| (neuron, series.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// One tally per neuron holding the mean of its series. Neurons whose
    /// series is empty contribute nothing.
    pub fn neuron_tallies(&self) -> BTreeMap<usize, Tally> {
        self.iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(neuron, series)| (neuron, Tally::of(mean(series))))
            .collect()
    }
}

/// Trivial/nontrivial decomposition of one local series.
///
/// Each value goes to exactly one bucket by strict sign, zero counting as
/// trivial. Both parts are divided by the full series length, so the total
/// is their sum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SeparableSplit {
    pub trivial: f64,
    pub nontrivial: f64,
}

impl SeparableSplit {
    pub fn of(series: &[f64]) -> Self {
        if series.is_empty() {
            return Self::default();
        }
        let (mut trivial, mut nontrivial) = (0.0, 0.0);
        for &value in series {
            if value < 0.0 {
                nontrivial += value;
            } else {
                trivial += value;
            }
        }
        let n = series.len() as f64;
        Self {
            trivial: trivial / n,
            nontrivial: nontrivial / n,
        }
    }

    pub fn total(&self) -> f64 {
        self.trivial + self.nontrivial
    }
}

/// Network-wide trivial, nontrivial and total tallies. The total's sum is
/// the sum of the two parts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SplitTally {
    pub trivial: Tally,
    pub nontrivial: Tally,
}

impl SplitTally {
    pub fn add(&mut self, split: &SeparableSplit) {
        self.trivial.add(split.trivial);
        self.nontrivial.add(split.nontrivial);
    }

    pub fn total(&self) -> Tally {
        Tally {
            count: self.trivial.count,
            sum: self.trivial.sum + self.nontrivial.sum,
        }
    }
}

// =========================================================================
// Grouping hierarchy
// =========================================================================

/// Key of one aggregated row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Group {
    Total,
    Layer(Layer),
    Nerve(String),
    Neuron(usize),
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Total => f.write_str("*"),
            Group::Layer(layer) => f.write_str(layer.name()),
            Group::Nerve(label) => f.write_str(label),
            Group::Neuron(index) => write!(f, "n{}", index),
        }
    }
}

impl From<Group> for String {
    fn from(group: Group) -> String {
        group.to_string()
    }
}

/// Groups per-neuron tallies through nerve, layer, `Processing` and total.
///
/// Row order: for each of Input, Output and Internal, its nerves in
/// declaration order then the layer; then Processing (Output merged with
/// Internal); then the total (Input merged with Processing). A layer merges
/// its nerves in order followed by the neurons outside any nerve.
pub fn hierarchy(topology: &Topology, per_neuron: &BTreeMap<usize, Tally>) -> Vec<(Group, Tally)> {
    let neuron_tally = |neuron: usize| per_neuron.get(&neuron).copied().unwrap_or_default();
    let mut rows = Vec::new();
    let mut layer_tallies = Vec::with_capacity(3);

    for layer in [Layer::Input, Layer::Output, Layer::Internal] {
        let mut layer_tally = Tally::default();
        let nerves = topology.nerves(layer);
        for nerve in &nerves {
            let mut nerve_tally = Tally::default();
            for neuron in nerve.indices() {
                nerve_tally.merge(&neuron_tally(neuron));
            }
            rows.push((Group::Nerve(nerve.label.clone()), nerve_tally));
            layer_tally.merge(&nerve_tally);
        }
        let mut remainder = Tally::default();
        for neuron in topology
            .neuron_indices(layer)
            .filter(|&neuron| !nerves.iter().any(|nerve| nerve.contains(neuron)))
        {
            remainder.merge(&neuron_tally(neuron));
        }
        layer_tally.merge(&remainder);
        rows.push((Group::Layer(layer), layer_tally));
        layer_tallies.push(layer_tally);
    }

    let mut processing = layer_tallies[1];
    processing.merge(&layer_tallies[2]);
    rows.push((Group::Layer(Layer::Processing), processing));

    let mut total = layer_tallies[0];
    total.merge(&processing);
    rows.push((Group::Total, total));
    rows
}

/// Merges every per-neuron tally in index order.
pub fn total(per_neuron: &BTreeMap<usize, Tally>) -> Tally {
    per_neuron.values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Nerve, Synapse};

    #[test]
    fn test_empty_tally_mean_is_zero() {
        let tally = Tally::default();
        assert_eq!(tally.mean(), 0.0);
        assert!(tally.is_empty());

        let mut tally = Tally::default();
        tally.add(1.5);
        tally.add(2.5);
        assert_eq!(tally.mean(), 2.0);
    }

    #[test]
    fn test_locals_accumulate_in_place() {
        let mut locals = Locals::new();
        locals.insert(2, vec![1.0, 2.0, 3.0]);
        locals.accumulate(2, &[0.5, -1.0, 0.0]).unwrap();
        locals.accumulate(4, &[1.0]).unwrap();
        assert_eq!(locals.get(2), Some(&[1.5, 1.0, 3.0][..]));
        assert_eq!(locals.get(4), Some(&[1.0][..]));
        assert!(locals.accumulate(2, &[1.0]).is_err());
    }

    #[test]
    fn test_split_routes_zero_to_trivial() {
        let split = SeparableSplit::of(&[0.0, -2.0, 4.0, 0.0]);
        assert_eq!(split.trivial, 1.0);
        assert_eq!(split.nontrivial, -0.5);
        assert_eq!(split.total(), 0.5);
        assert_eq!(SeparableSplit::of(&[]), SeparableSplit::default());
    }

    #[test]
    fn test_hierarchy_order_and_sums() {
        // 2 input (one nerve), 1 output, 2 internal
        let topology = Topology::new(
            5,
            2,
            1,
            vec![Nerve::new("Eye", 0, 1), Nerve::new("Motor", 2, 1)],
            vec![Synapse::new(0, 2), Synapse::new(1, 3), Synapse::new(3, 4)],
        )
        .unwrap();
        let per_neuron: BTreeMap<usize, Tally> = [
            (0, Tally::of(0.25)),
            (1, Tally::of(0.5)),
            (3, Tally { count: 2, sum: 1.0 }),
        ]
        .into_iter()
        .collect();

        let rows = hierarchy(&topology, &per_neuron);
        let labels: Vec<String> = rows.iter().map(|(group, _)| group.to_string()).collect();
        assert_eq!(
            labels,
            ["Eye", "Input", "Motor", "Output", "Internal", "Processing", "*"]
        );
        let sums: Vec<(usize, f64)> = rows.iter().map(|(_, t)| (t.count, t.sum)).collect();
        assert_eq!(
            sums,
            [(1, 0.25), (2, 0.75), (0, 0.0), (0, 0.0), (2, 1.0), (2, 1.0), (4, 1.75)]
        );
    }
}
