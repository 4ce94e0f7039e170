//! Apparent, complete and collective transfer entropy.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use super::measure;
use crate::aggregate::{mean, Locals, Tally};
use crate::config::EstimatorConfig;
use crate::embedding::EmbeddingPlan;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::topology::{Layer, Synapse, Topology};

/// Local transfer along one edge `pre -> post`.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeLocals {
    pub pre: usize,
    pub post: usize,
    pub locals: Vec<f64>,
}

impl EdgeLocals {
    pub fn mean(&self) -> f64 {
        mean(&self.locals)
    }
}

/// Apparent transfer along every distinct edge, ordered by pre neuron.
pub fn apparent_transfer(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    k: usize,
) -> Result<Vec<EdgeLocals>> {
    let topology = ensemble.topology();
    let mut edges = Vec::new();
    for pre in topology.neuron_indices(Layer::All) {
        for post in topology.post_neurons(pre) {
            let locals = measure(ensemble, config, &EmbeddingPlan::apparent_transfer(pre, post, k))?;
            edges.push(EdgeLocals { pre, post, locals });
        }
    }
    Ok(edges)
}

/// Synapses evaluated by complete transfer. With a cap smaller than the
/// synapse count the list is shuffled (seeded by `seed` and the agent) and
/// truncated.
pub fn select_synapses(
    topology: &Topology,
    cap: Option<usize>,
    seed: u64,
    agent: u64,
) -> Vec<Synapse> {
    let mut synapses = topology.synapses().to_vec();
    if let Some(cap) = cap {
        if synapses.len() > cap {
            let mut rng = ChaCha20Rng::seed_from_u64(seed ^ agent.rotate_left(32));
            synapses.shuffle(&mut rng);
            synapses.truncate(cap);
        }
    }
    synapses
}

/// Complete transfer along each selected synapse, conditioned on the
/// target's own past and every other predecessor of the target.
pub fn complete_transfer(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    k: usize,
    synapse_cap: Option<usize>,
) -> Result<Vec<EdgeLocals>> {
    let topology = ensemble.topology();
    let synapses = select_synapses(topology, synapse_cap, config.seed, ensemble.agent_id());
    debug!(
        agent = ensemble.agent_id(),
        selected = synapses.len(),
        total = topology.synapses().len(),
        "complete transfer synapses"
    );

    let mut edges = Vec::with_capacity(synapses.len());
    for Synapse { pre, post } in synapses {
        let others = topology.pre_neurons_excluding(post, pre);
        let plan = EmbeddingPlan::complete_transfer(pre, post, others, k);
        let locals = measure(ensemble, config, &plan)?;
        edges.push(EdgeLocals { pre, post, locals });
    }
    Ok(edges)
}

/// Collective transfer into each processing neuron from all of its
/// predecessors jointly. Neurons without predecessors are absent.
pub fn collective_transfer(
    ensemble: &Ensemble,
    config: &EstimatorConfig,
    k: usize,
) -> Result<Locals> {
    let topology = ensemble.topology();
    let mut locals = Locals::new();
    for post in topology.neuron_indices(Layer::Processing) {
        let pre = topology.pre_neurons(post);
        if pre.is_empty() {
            continue;
        }
        let series = measure(ensemble, config, &EmbeddingPlan::collective_transfer(pre, post, k))?;
        locals.insert(post, series);
    }
    Ok(locals)
}

/// Per source neuron, the tally of its edges' mean transfer, merged in edge
/// order.
pub fn source_tallies(edges: &[EdgeLocals]) -> BTreeMap<usize, Tally> {
    let mut per_neuron: BTreeMap<usize, Tally> = BTreeMap::new();
    for edge in edges.iter().filter(|edge| !edge.locals.is_empty()) {
        per_neuron.entry(edge.pre).or_default().add(edge.mean());
    }
    per_neuron
}
