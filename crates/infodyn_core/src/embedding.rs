//! Delay embedding of raw trials into row-aligned observation matrices.
//!
//! Every plan has a common anchor. With history `h = max(span of every
//! block, 1)`, row `t` of a trial of length `T` (for `t < T - h`) has anchor
//! index `a = t + h - 1`:
//!
//! * a source or conditioning block with history `e` reads indices
//!   `a - max(e, 1) + 1 ..= a` of each of its neurons (history 0 is the
//!   instantaneous value at the anchor);
//! * the target reads index `a + 1`, the "future" of every history block.
//!
//! Values are laid out neuron by neuron, each neuron's lags oldest first.
//! Trials with `T <= h` contribute no rows.

use serde::{Deserialize, Serialize};

use crate::ensemble::{Ensemble, TimeSeries};
use crate::error::{InfodynError, Result};
use crate::linalg::Matrix;

/// Neurons sharing one history length (`0` = instantaneous).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub neurons: Vec<usize>,
    pub history: usize,
}

impl Block {
    pub fn instantaneous(neurons: Vec<usize>) -> Self {
        Self { neurons, history: 0 }
    }

    pub fn embedded(neurons: Vec<usize>, history: usize) -> Self {
        Self { neurons, history }
    }

    /// Number of time steps read per neuron.
    pub fn span(&self) -> usize {
        self.history.max(1)
    }

    /// Number of columns this block contributes.
    pub fn width(&self) -> usize {
        self.span() * self.neurons.len()
    }

    fn write_row(&self, trial: &TimeSeries, anchor: usize, row: &mut Vec<f64>) {
        let span = self.span();
        for &neuron in &self.neurons {
            row.extend((anchor + 1 - span..=anchor).map(|time| trial.value(time, neuron)));
        }
    }
}

/// Three aligned matrices handed to an estimator in one call.
#[derive(Clone, Debug, PartialEq)]
pub struct Observations {
    pub source: Matrix,
    pub target: Matrix,
    pub conditioning: Matrix,
}

impl Observations {
    pub fn empty(source: usize, target: usize, conditioning: usize) -> Self {
        Self {
            source: Matrix::empty(source),
            target: Matrix::empty(target),
            conditioning: Matrix::empty(conditioning),
        }
    }

    pub fn rows(&self) -> usize {
        self.target.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Row-wise stacking of another trial's observations.
    pub fn append(&mut self, other: &Observations) -> Result<()> {
        self.source.append_rows(&other.source)?;
        self.target.append_rows(&other.target)?;
        self.conditioning.append_rows(&other.conditioning)?;
        Ok(())
    }
}

/// Which neurons fill which role, and with what history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingPlan {
    pub source: Vec<Block>,
    pub target: Vec<usize>,
    pub conditioning: Vec<Block>,
}

impl EmbeddingPlan {
    pub fn new(source: Vec<Block>, target: Vec<usize>, conditioning: Vec<Block>) -> Self {
        Self {
            source,
            target,
            conditioning,
        }
    }

    /// Active information storage of `neuron` with history `k`.
    pub fn storage(neuron: usize, k: usize) -> Self {
        Self::new(vec![Block::embedded(vec![neuron], k)], vec![neuron], Vec::new())
    }

    /// Apparent transfer `pre -> post`: conditioned on the target's own past.
    pub fn apparent_transfer(pre: usize, post: usize, k: usize) -> Self {
        Self::new(
            vec![Block::instantaneous(vec![pre])],
            vec![post],
            vec![Block::embedded(vec![post], k)],
        )
    }

    /// Complete transfer `pre -> post`: additionally conditioned on the
    /// instantaneous values of every other predecessor of `post`.
    pub fn complete_transfer(pre: usize, post: usize, others: Vec<usize>, k: usize) -> Self {
        let mut conditioning = vec![Block::embedded(vec![post], k)];
        if !others.is_empty() {
            conditioning.push(Block::instantaneous(others));
        }
        Self::new(vec![Block::instantaneous(vec![pre])], vec![post], conditioning)
    }

    /// Collective transfer from every predecessor of `post` jointly.
    pub fn collective_transfer(pre: Vec<usize>, post: usize, k: usize) -> Self {
        Self::new(
            vec![Block::instantaneous(pre)],
            vec![post],
            vec![Block::embedded(vec![post], k)],
        )
    }

    /// Common history length `h`; every trial loses its first `h` rows.
    pub fn history(&self) -> usize {
        self.source
            .iter()
            .chain(&self.conditioning)
            .map(Block::span)
            .max()
            .unwrap_or(1)
    }

    /// Column counts `(source, target, conditioning)`.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (
            self.source.iter().map(Block::width).sum(),
            self.target.len(),
            self.conditioning.iter().map(Block::width).sum(),
        )
    }

    pub fn usable_rows(&self, trial_len: usize) -> usize {
        trial_len.saturating_sub(self.history())
    }

    fn max_neuron(&self) -> Option<usize> {
        self.source
            .iter()
            .chain(&self.conditioning)
            .flat_map(|block| block.neurons.iter())
            .chain(&self.target)
            .copied()
            .max()
    }

    /// Embeds a single trial. Short trials give an empty result.
    pub fn embed(&self, trial: &TimeSeries) -> Result<Observations> {
        if let Some(neuron) = self.max_neuron() {
            if neuron >= trial.dimension() {
                return Err(InfodynError::Estimator(format!(
                    "neuron {} outside trial dimension {}",
                    neuron,
                    trial.dimension()
                )));
            }
        }

        let (source_dim, target_dim, conditioning_dim) = self.dimensions();
        let mut observations = Observations::empty(source_dim, target_dim, conditioning_dim);
        let history = self.history();
        let mut row = Vec::with_capacity(source_dim.max(conditioning_dim).max(target_dim));

        for t in 0..self.usable_rows(trial.len()) {
            let anchor = t + history - 1;

            row.clear();
            for block in &self.source {
                block.write_row(trial, anchor, &mut row);
            }
            observations.source.push_row(&row)?;

            row.clear();
            row.extend(self.target.iter().map(|&neuron| trial.value(anchor + 1, neuron)));
            observations.target.push_row(&row)?;

            row.clear();
            for block in &self.conditioning {
                block.write_row(trial, anchor, &mut row);
            }
            observations.conditioning.push_row(&row)?;
        }
        Ok(observations)
    }

    /// Embeds every trial separately, in trial order, skipping trials too
    /// short to contribute a row.
    pub fn embed_trials(&self, ensemble: &Ensemble) -> Result<Vec<Observations>> {
        let mut embedded = Vec::with_capacity(ensemble.trials().len());
        for trial in ensemble.trials() {
            let observations = self.embed(trial)?;
            if !observations.is_empty() {
                embedded.push(observations);
            }
        }
        Ok(embedded)
    }

    /// All trials stacked row-wise into one observation set.
    pub fn embed_pooled(&self, ensemble: &Ensemble) -> Result<Observations> {
        let (source_dim, target_dim, conditioning_dim) = self.dimensions();
        let mut pooled = Observations::empty(source_dim, target_dim, conditioning_dim);
        for observations in self.embed_trials(ensemble)? {
            pooled.append(&observations)?;
        }
        Ok(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Neuron `n` at time `t` has value `10 * t + n`.
    fn ramp(len: usize, dimension: usize) -> TimeSeries {
        let rows: Vec<Vec<f64>> = (0..len)
            .map(|t| (0..dimension).map(|n| (10 * t + n) as f64).collect())
            .collect();
        TimeSeries::from_rows(dimension, rows).unwrap()
    }

    #[test]
    fn test_storage_embedding_reads_own_past() {
        let observations = EmbeddingPlan::storage(1, 3).embed(&ramp(6, 2)).unwrap();
        assert_eq!(observations.rows(), 3);
        assert_eq!(observations.source.row(0), &[1.0, 11.0, 21.0]);
        assert_eq!(observations.target.row(0), &[31.0]);
        assert_eq!(observations.source.row(2), &[21.0, 31.0, 41.0]);
        assert_eq!(observations.target.row(2), &[51.0]);
        assert_eq!(observations.conditioning.cols(), 0);
        assert_eq!(observations.conditioning.rows(), 3);
    }

    #[test]
    fn test_apparent_transfer_source_sits_at_anchor() {
        let observations = EmbeddingPlan::apparent_transfer(0, 2, 2)
            .embed(&ramp(5, 3))
            .unwrap();
        assert_eq!(observations.rows(), 3);
        // anchor = t + 1
        assert_eq!(observations.source.row(0), &[10.0]);
        assert_eq!(observations.target.row(0), &[22.0]);
        assert_eq!(observations.conditioning.row(0), &[2.0, 12.0]);
    }

    #[test]
    fn test_complete_transfer_conditioning_layout() {
        let plan = EmbeddingPlan::complete_transfer(0, 3, vec![1, 2], 2);
        assert_eq!(plan.dimensions(), (1, 1, 4));
        let observations = plan.embed(&ramp(4, 4)).unwrap();
        assert_eq!(observations.conditioning.row(1), &[13.0, 23.0, 21.0, 22.0]);
        assert_eq!(observations.target.row(1), &[33.0]);
    }

    #[test]
    fn test_rows_never_read_past_anchor() {
        for source in 0..4 {
            for conditioning in 0..4 {
                let plan = EmbeddingPlan::new(
                    vec![Block::embedded(vec![0], source)],
                    vec![1],
                    vec![Block::embedded(vec![1], conditioning)],
                );
                let history = source.max(conditioning).max(1);
                let trial = ramp(9, 2);
                let observations = plan.embed(&trial).unwrap();
                assert_eq!(observations.rows(), 9 - history);
                for t in 0..observations.rows() {
                    let anchor = (t + history - 1) as f64;
                    let latest = observations
                        .source
                        .row(t)
                        .iter()
                        .chain(observations.conditioning.row(t))
                        .map(|value| (value / 10.0).floor())
                        .fold(f64::MIN, f64::max);
                    assert_eq!(latest, anchor);
                    assert_eq!((observations.target.get(t, 0) / 10.0).floor(), anchor + 1.0);
                }
            }
        }
    }

    #[test]
    fn test_short_trials_are_skipped() {
        let plan = EmbeddingPlan::storage(0, 4);
        assert!(plan.embed(&ramp(4, 1)).unwrap().is_empty());
        assert!(plan.embed(&ramp(0, 1)).unwrap().is_empty());
        assert_eq!(plan.embed(&ramp(5, 1)).unwrap().rows(), 1);
    }

    #[test]
    fn test_out_of_range_neuron() {
        assert!(EmbeddingPlan::storage(3, 1).embed(&ramp(5, 2)).is_err());
    }
}
