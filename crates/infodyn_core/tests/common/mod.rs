//! Shared fixtures: seeded traces and ensembles pushed through the stream
//! writer and reader.

#![allow(dead_code)]

use infodyn_core::{Ensemble, EnsembleReader, StreamWriter, TimeSeries, Topology};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Uniform noise in [0, 1) with every wired neuron partly driven by its
/// predecessors at the previous step.
pub fn driven_trace(topology: &Topology, len: usize, seed: u64) -> TimeSeries {
    let n = topology.neuron_count();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(len);
    for t in 0..len {
        let mut row: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
        if t > 0 {
            for post in 0..n {
                let pre = topology.pre_neurons(post);
                if !pre.is_empty() {
                    let drive: f64 = pre.iter().map(|&p| rows[t - 1][p]).sum::<f64>() / pre.len() as f64;
                    row[post] = 0.7 * drive + 0.3 * row[post];
                }
            }
        }
        rows.push(row);
    }
    TimeSeries::from_rows(n, rows).expect("fixture rows")
}

pub fn ensemble(agent: u64, topology: Topology, trials: &[usize], seed: u64) -> Ensemble {
    let mut ensemble = Ensemble::new(agent, topology);
    for (i, &len) in trials.iter().enumerate() {
        let trace = driven_trace(ensemble.topology(), len, seed + i as u64);
        ensemble.push(trace).expect("fixture trial");
    }
    ensemble
}

/// Serialises and re-reads, so fixtures exercise the wire format.
pub fn through_stream(ensembles: &[Ensemble]) -> Vec<Ensemble> {
    let mut writer = StreamWriter::new(Vec::new());
    writer.write_arguments(&["fixture = true"]).expect("arguments");
    for ensemble in ensembles {
        writer.write_ensemble(ensemble).expect("ensemble");
    }
    let bytes = writer.into_inner();
    let mut reader = EnsembleReader::new(bytes.as_slice());
    reader.read_arguments().expect("arguments");
    reader.collect::<Result<Vec<_>, _>>().expect("stream")
}
