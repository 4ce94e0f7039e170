use std::collections::BTreeMap;

use super::EdgeLocals;
use crate::aggregate::{Locals, SeparableSplit};
use crate::error::Result;
use crate::topology::{Layer, Topology};

/// Separable information of every processing neuron.
///
/// A neuron's local storage series is summed element-wise with the local
/// apparent transfer of every edge ending on it, and the combined series is
/// split by sign per time step. Neurons with no usable rows are absent.
pub fn separable_information(
    topology: &Topology,
    storage: &Locals,
    transfer: &[EdgeLocals],
) -> Result<BTreeMap<usize, SeparableSplit>> {
    let mut combined = storage.clone();
    for edge in transfer {
        combined.accumulate(edge.post, &edge.locals)?;
    }

    let processing = topology.neuron_indices(Layer::Processing);
    Ok(combined
        .iter()
        .filter(|(neuron, series)| processing.contains(neuron) && !series.is_empty())
        .map(|(neuron, series)| (neuron, SeparableSplit::of(series)))
        .collect())
}
