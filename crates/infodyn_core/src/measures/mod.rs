//! Measure drivers.
//!
//! Each driver picks variables through the [`Topology`](crate::topology::Topology),
//! embeds every trial with an [`EmbeddingPlan`], hands the observations to a
//! fresh estimator and returns the locals as plain values. Combining them
//! into rows is left to the per-agent functions below and to
//! [`aggregate`](crate::aggregate).

mod separable;
mod storage;
mod transfer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use separable::separable_information;
pub use storage::active_information_storage;
pub use transfer::{
    apparent_transfer, collective_transfer, complete_transfer, select_synapses, source_tallies,
    EdgeLocals,
};

use crate::aggregate::{self, Group, SplitTally, Tally};
use crate::config::EstimatorConfig;
use crate::embedding::{EmbeddingPlan, Observations};
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::estimator::estimate_locals;
use crate::report::{Metric, Row};
use crate::topology::Layer;

/// Runs one estimation with a freshly created estimator.
///
/// An agent with fewer embedded rows than the estimator needs yields an
/// empty series, which every tally skips.
pub(crate) fn measure(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    plan: &EmbeddingPlan,
) -> Result<Vec<f64>> {
    let trials = plan.embed_trials(ensemble)?;
    let mut estimator = config.create_estimator();
    let rows: usize = trials.iter().map(Observations::rows).sum();
    if rows < estimator.minimum_rows() {
        debug!(
            agent = ensemble.agent_id(),
            estimator = estimator.name(),
            source = ?plan.source,
            target = ?plan.target,
            rows,
            minimum = estimator.minimum_rows(),
            "too few rows; not estimated"
        );
        return Ok(Vec::new());
    }
    let locals = estimate_locals(estimator.as_mut(), &trials)?;
    debug!(
        agent = ensemble.agent_id(),
        estimator = estimator.name(),
        source = ?plan.source,
        target = ?plan.target,
        rows = locals.len(),
        "measured"
    );
    Ok(locals)
}

/// Which storage/transfer/separable statistics are printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicsSelection {
    pub storage: bool,
    pub transfer: bool,
    pub separable: bool,
}

impl Default for DynamicsSelection {
    fn default() -> Self {
        Self {
            storage: true,
            transfer: true,
            separable: true,
        }
    }
}

fn detail_rows(
    agent: u64,
    metric: Metric,
    per_neuron: &BTreeMap<usize, Tally>,
) -> impl Iterator<Item = Row> + '_ {
    per_neuron
        .iter()
        .map(move |(&neuron, &tally)| Row::new(agent, metric, Group::Neuron(neuron), tally))
}

fn hierarchy_rows(
    ensemble: &Ensemble,
    metric: Metric,
    per_neuron: &BTreeMap<usize, Tally>,
) -> impl Iterator<Item = Row> {
    let agent = ensemble.agent_id();
    aggregate::hierarchy(ensemble.topology(), per_neuron)
        .into_iter()
        .map(move |(group, tally)| Row::new(agent, metric, group, tally))
}

/// Storage, apparent transfer and separable information of one agent.
///
/// Separable information always needs both storage and transfer locals, so
/// they are computed whenever it is selected even if not printed.
pub fn dynamics(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    embedding: usize,
    selection: DynamicsSelection,
    detail: bool,
) -> Result<Vec<Row>> {
    let agent = ensemble.agent_id();
    let mut rows = Vec::new();

    let storage = if selection.storage || selection.separable {
        Some(active_information_storage(ensemble, config, embedding)?)
    } else {
        None
    };
    let transfer = if selection.transfer || selection.separable {
        Some(apparent_transfer(ensemble, config, embedding)?)
    } else {
        None
    };

    if let (true, Some(storage)) = (selection.storage, &storage) {
        let per_neuron = storage.neuron_tallies();
        if detail {
            rows.extend(detail_rows(agent, Metric::ActiveInfoStorage, &per_neuron));
        }
        rows.push(Row::new(
            agent,
            Metric::ActiveInfoStorage,
            Group::Total,
            aggregate::total(&per_neuron),
        ));
    }

    if let (true, Some(transfer)) = (selection.transfer, &transfer) {
        let per_neuron = source_tallies(transfer);
        if detail {
            rows.extend(detail_rows(agent, Metric::ApparentTransfer, &per_neuron));
        }
        rows.extend(hierarchy_rows(ensemble, Metric::ApparentTransfer, &per_neuron));
    }

    if let (true, Some(storage), Some(transfer)) = (selection.separable, &storage, &transfer) {
        let splits = separable_information(ensemble.topology(), storage, transfer)?;
        let per_neuron: BTreeMap<usize, Tally> = splits
            .iter()
            .map(|(&neuron, split)| (neuron, Tally::of(split.total())))
            .collect();
        if detail {
            rows.extend(detail_rows(agent, Metric::SeparableInfo, &per_neuron));
        }
        // The network row comes from the split so trivial + nontrivial is exact.
        rows.extend(
            hierarchy_rows(ensemble, Metric::SeparableInfo, &per_neuron)
                .filter(|row| row.group != Group::Total),
        );
        let mut network = SplitTally::default();
        for split in splits.values() {
            network.add(split);
        }
        rows.push(Row::new(agent, Metric::SeparableTrivial, Group::Total, network.trivial));
        rows.push(Row::new(
            agent,
            Metric::SeparableNontrivial,
            Group::Total,
            network.nontrivial,
        ));
        rows.push(Row::new(agent, Metric::SeparableInfo, Group::Total, network.total()));
    }
    Ok(rows)
}

/// Collective transfer into every processing neuron with predecessors.
pub fn collective(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    embedding: usize,
    detail: bool,
) -> Result<Vec<Row>> {
    let agent = ensemble.agent_id();
    let per_neuron = collective_transfer(ensemble, config, embedding)?.neuron_tallies();
    let mut rows = Vec::new();
    if detail {
        rows.extend(detail_rows(agent, Metric::CollectiveTransfer, &per_neuron));
    }

    // Targets are processing neurons; group them by their own layer.
    let topology = ensemble.topology();
    let in_layer = |layer: Layer| -> Tally {
        per_neuron
            .range(topology.neuron_indices(layer))
            .map(|(_, tally)| tally)
            .collect()
    };
    let output = in_layer(Layer::Output);
    let internal = in_layer(Layer::Internal);
    let mut processing = output;
    processing.merge(&internal);
    rows.push(Row::new(agent, Metric::CollectiveTransfer, Group::Layer(Layer::Output), output));
    rows.push(Row::new(
        agent,
        Metric::CollectiveTransfer,
        Group::Layer(Layer::Internal),
        internal,
    ));
    rows.push(Row::new(agent, Metric::CollectiveTransfer, Group::Total, processing));
    Ok(rows)
}

/// Complete transfer over (at most `synapse_cap`) synapses.
pub fn complete(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    embedding: usize,
    synapse_cap: Option<usize>,
    detail: bool,
) -> Result<Vec<Row>> {
    let agent = ensemble.agent_id();
    let edges = complete_transfer(ensemble, config, embedding, synapse_cap)?;
    let per_neuron = source_tallies(&edges);
    let mut rows = Vec::new();
    if detail {
        rows.extend(detail_rows(agent, Metric::CompleteTransfer, &per_neuron));
    }
    rows.extend(hierarchy_rows(ensemble, Metric::CompleteTransfer, &per_neuron));
    Ok(rows)
}
