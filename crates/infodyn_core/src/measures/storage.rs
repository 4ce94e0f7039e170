use super::measure;
use crate::aggregate::Locals;
use crate::config::EstimatorConfig;
use crate::embedding::EmbeddingPlan;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::topology::Layer;

/// Local active information storage of every processing neuron: how much
/// its last `k` values say about its next one.
pub fn active_information_storage(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    k: usize,
) -> Result<Locals> {
    let mut locals = Locals::new();
    for neuron in ensemble.topology().neuron_indices(Layer::Processing) {
        let series = measure(ensemble, config, &EmbeddingPlan::storage(neuron, k))?;
        locals.insert(neuron, series);
    }
    Ok(locals)
}
