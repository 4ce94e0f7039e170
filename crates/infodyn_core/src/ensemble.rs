//! Raw activation traces of one agent.

use crate::error::{InfodynError, Result};
use crate::topology::Topology;

/// One trial: a `len() x dimension()` matrix of neuron activations, stored
/// row-major so a row is one observation of every neuron.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    dimension: usize,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            values: Vec::new(),
        }
    }

    pub fn from_rows<I, R>(dimension: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[f64]>,
    {
        let mut series = Self::new(dimension);
        for row in rows {
            series.push(row.as_ref())?;
        }
        Ok(series)
    }

    pub fn push(&mut self, observation: &[f64]) -> Result<()> {
        if observation.len() != self.dimension {
            return Err(InfodynError::Estimator(format!(
                "observation has {} values, expected {}",
                observation.len(),
                self.dimension
            )));
        }
        self.values.extend_from_slice(observation);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.values.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, time: usize) -> &[f64] {
        &self.values[time * self.dimension..(time + 1) * self.dimension]
    }

    #[inline]
    pub fn value(&self, time: usize, neuron: usize) -> f64 {
        self.values[time * self.dimension + neuron]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.dimension.max(1))
    }
}

/// Topology plus every trial recorded for one agent.
#[derive(Clone, Debug, PartialEq)]
pub struct Ensemble {
    agent_id: u64,
    topology: Topology,
    trials: Vec<TimeSeries>,
}

impl Ensemble {
    pub fn new(agent_id: u64, topology: Topology) -> Self {
        Self {
            agent_id,
            topology,
            trials: Vec::new(),
        }
    }

    pub fn push(&mut self, trial: TimeSeries) -> Result<()> {
        if trial.dimension() != self.topology.neuron_count() {
            return Err(InfodynError::Estimator(format!(
                "trial dimension {} does not match neuron count {}",
                trial.dimension(),
                self.topology.neuron_count()
            )));
        }
        self.trials.push(trial);
        Ok(())
    }

    pub fn agent_id(&self) -> u64 {
        self.agent_id
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn trials(&self) -> &[TimeSeries] {
        &self.trials
    }

    /// Total number of observations across trials.
    pub fn observation_count(&self) -> usize {
        self.trials.iter().map(TimeSeries::len).sum()
    }

    /// Column-major copy of `neurons` over every trial, concatenated in
    /// trial order: `result[v][t]` is neuron `neurons[v]` at pooled time `t`.
    pub fn combined_columns(&self, neurons: &[usize]) -> Vec<Vec<f64>> {
        let total = self.observation_count();
        neurons
            .iter()
            .map(|&neuron| {
                let mut column = Vec::with_capacity(total);
                for trial in &self.trials {
                    column.extend((0..trial.len()).map(|time| trial.value(time, neuron)));
                }
                column
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_and_values() {
        let series = TimeSeries::from_rows(2, [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.row(1), &[0.3, 0.4]);
        assert_eq!(series.value(2, 1), 0.6);
        assert_eq!(series.rows().count(), 3);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let mut series = TimeSeries::new(3);
        assert!(series.push(&[1.0, 2.0]).is_err());
        assert!(series.is_empty());
    }

    #[test]
    fn test_combined_columns_follow_trial_order() {
        let topology = Topology::new(2, 1, 1, Vec::new(), Vec::new()).unwrap();
        let mut ensemble = Ensemble::new(7, topology);
        ensemble
            .push(TimeSeries::from_rows(2, [[1.0, 10.0], [2.0, 20.0]]).unwrap())
            .unwrap();
        ensemble
            .push(TimeSeries::from_rows(2, [[3.0, 30.0]]).unwrap())
            .unwrap();

        let columns = ensemble.combined_columns(&[1, 0]);
        assert_eq!(columns, vec![vec![10.0, 20.0, 30.0], vec![1.0, 2.0, 3.0]]);
        assert_eq!(ensemble.observation_count(), 3);
    }
}
