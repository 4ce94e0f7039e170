//! Conditional mutual information estimators.
//!
//! Every measure driver talks to an estimator through
//! [`ConditionalMiEstimator`]: declare the three column counts, load every
//! trial's observations, then ask for the average or the per-row locals.
//! Implementations are interchangeable and selected by
//! [`EstimatorConfig`](crate::config::EstimatorConfig); a fresh instance is
//! created for each measurement and dropped afterwards.

mod gaussian;
mod kraskov;
pub(crate) mod special;

pub use gaussian::GaussianEstimator;
pub use kraskov::KraskovEstimator;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::embedding::Observations;
use crate::error::{InfodynError, Result};
use crate::linalg::Matrix;

/// Capability consumed by the measure drivers.
pub trait ConditionalMiEstimator {
    /// Declares the column counts of the next estimation and clears any
    /// previously loaded data.
    fn initialize(&mut self, source_dim: usize, target_dim: usize, conditioning_dim: usize)
        -> Result<()>;

    fn start_accumulation(&mut self);

    /// Loads one trial's observations. May be called once per trial.
    fn add_observations(&mut self, observations: &Observations) -> Result<()>;

    /// Seals the loaded data; no more observations may be added. Fails
    /// when fewer than [`minimum_rows`](Self::minimum_rows) were loaded.
    fn finish_accumulation(&mut self) -> Result<()>;

    /// Fewest rows this estimator can produce an estimate from.
    fn minimum_rows(&self) -> usize;

    /// Estimate over every loaded row, in nats.
    fn compute_average(&self) -> Result<f64>;

    /// Per-row estimates in load order.
    fn compute_local(&self) -> Result<Vec<f64>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Runs the whole estimator protocol over a list of per-trial observation
/// sets and returns the locals.
pub fn estimate_locals(
    estimator: &mut dyn ConditionalMiEstimator,
    trials: &[Observations],
) -> Result<Vec<f64>> {
    let (source_dim, target_dim, conditioning_dim) = match trials.first() {
        Some(first) => (
            first.source.cols(),
            first.target.cols(),
            first.conditioning.cols(),
        ),
        None => return Ok(Vec::new()),
    };
    estimator.initialize(source_dim, target_dim, conditioning_dim)?;
    estimator.start_accumulation();
    for observations in trials {
        estimator.add_observations(observations)?;
    }
    estimator.finish_accumulation()?;
    estimator.compute_local()
}

// =========================================================================
// Shared accumulation
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initialized,
    Accumulating,
    Finished,
}

/// Observation buffer and preprocessing shared by the estimators.
///
/// `finish` adds `noise_level` Gaussian noise to every column (seeded, so
/// repeated runs agree) and optionally rescales each column to zero mean
/// and unit variance.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    phase: Phase,
    noise_level: f64,
    normalise: bool,
    seed: u64,
    data: Option<Observations>,
}

impl Accumulator {
    pub(crate) fn new(noise_level: f64, normalise: bool, seed: u64) -> Self {
        Self {
            phase: Phase::Uninitialized,
            noise_level,
            normalise,
            seed,
            data: None,
        }
    }

    pub(crate) fn initialize(
        &mut self,
        source_dim: usize,
        target_dim: usize,
        conditioning_dim: usize,
    ) -> Result<()> {
        if source_dim == 0 || target_dim == 0 {
            return Err(InfodynError::Estimator(format!(
                "source and target need at least one column (got {} and {})",
                source_dim, target_dim
            )));
        }
        self.data = Some(Observations::empty(source_dim, target_dim, conditioning_dim));
        self.phase = Phase::Initialized;
        Ok(())
    }

    pub(crate) fn start(&mut self) {
        if self.phase != Phase::Uninitialized {
            self.phase = Phase::Accumulating;
        }
    }

    pub(crate) fn add(&mut self, observations: &Observations) -> Result<()> {
        if self.phase != Phase::Accumulating {
            return Err(InfodynError::Estimator(
                "observations added outside start/finish accumulation".to_string(),
            ));
        }
        let data = self.data.as_mut().ok_or_else(uninitialized)?;
        let expected = (
            data.source.cols(),
            data.target.cols(),
            data.conditioning.cols(),
        );
        let got = (
            observations.source.cols(),
            observations.target.cols(),
            observations.conditioning.cols(),
        );
        if expected != got {
            return Err(InfodynError::Estimator(format!(
                "initialised for dimensions {:?}, observations have {:?}",
                expected, got
            )));
        }
        if observations.source.rows() != observations.rows()
            || observations.conditioning.rows() != observations.rows()
        {
            return Err(InfodynError::Estimator(
                "source, target and conditioning row counts differ".to_string(),
            ));
        }
        data.append(observations)
    }

    pub(crate) fn finish(&mut self, minimum_rows: usize) -> Result<()> {
        if self.phase != Phase::Accumulating {
            return Err(InfodynError::Estimator(
                "finish_accumulation without start_accumulation".to_string(),
            ));
        }
        let data = self.data.as_mut().ok_or_else(uninitialized)?;
        if data.rows() < minimum_rows {
            return Err(InfodynError::Estimator(format!(
                "{} observations accumulated, at least {} required",
                data.rows(),
                minimum_rows
            )));
        }

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        for matrix in [&mut data.source, &mut data.target, &mut data.conditioning] {
            for col in 0..matrix.cols() {
                let mut column = matrix.column(col);
                if self.noise_level > 0.0 {
                    add_gaussian_noise(&mut column, self.noise_level, &mut rng);
                }
                if self.normalise {
                    standardise(&mut column);
                }
                matrix.set_column(col, &column);
            }
        }
        self.phase = Phase::Finished;
        Ok(())
    }

    /// Preprocessed observations; only available after `finish`.
    pub(crate) fn finished(&self) -> Result<&Observations> {
        match (&self.data, self.phase) {
            (Some(data), Phase::Finished) => Ok(data),
            _ => Err(InfodynError::Estimator(
                "estimate requested before finish_accumulation".to_string(),
            )),
        }
    }
}

fn uninitialized() -> InfodynError {
    InfodynError::Estimator("estimator used before initialize".to_string())
}

/// Adds `scale * N(0, 1)` to every value, drawing pairs with Box-Muller.
pub(crate) fn add_gaussian_noise(values: &mut [f64], scale: f64, rng: &mut ChaCha20Rng) {
    for pair in values.chunks_mut(2) {
        let (z0, z1) = standard_normal_pair(rng);
        pair[0] += z0 * scale;
        if let Some(second) = pair.get_mut(1) {
            *second += z1 * scale;
        }
    }
}

pub(crate) fn standard_normal_pair(rng: &mut ChaCha20Rng) -> (f64, f64) {
    let u1: f64 = rng.gen::<f64>().max(1e-300);
    let u2: f64 = rng.gen();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * std::f64::consts::PI * u2;
    (r * theta.cos(), r * theta.sin())
}

/// Zero mean, unit (n - 1) variance. Constant columns are only centred.
pub(crate) fn standardise(values: &mut [f64]) {
    let n = values.len();
    if n == 0 {
        return;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let sd = variance.sqrt();
    for value in values.iter_mut() {
        *value -= mean;
        if sd > 0.0 {
            *value /= sd;
        }
    }
}

/// Row-wise `[a | b | ...]` of equally tall matrices.
pub(crate) fn joint(parts: &[&Matrix]) -> Result<Matrix> {
    let rows = parts.first().map_or(0, |m| m.rows());
    let mut joined = Matrix::zeros(rows, 0);
    for part in parts {
        joined = joined.hstack(part)?;
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(rows: usize) -> Observations {
        let mut observations = Observations::empty(1, 1, 0);
        for t in 0..rows {
            observations.source.push_row(&[t as f64]).unwrap();
            observations.target.push_row(&[(t * t) as f64]).unwrap();
            observations.conditioning.push_row(&[]).unwrap();
        }
        observations
    }

    #[test]
    fn test_accumulator_protocol_order() {
        let mut accumulator = Accumulator::new(0.0, false, 0);
        assert!(accumulator.add(&observations(3)).is_err());

        accumulator.initialize(1, 1, 0).unwrap();
        accumulator.start();
        accumulator.add(&observations(3)).unwrap();
        accumulator.add(&observations(2)).unwrap();
        assert!(accumulator.finished().is_err());
        accumulator.finish(2).unwrap();
        assert_eq!(accumulator.finished().unwrap().rows(), 5);
        assert!(accumulator.add(&observations(1)).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut accumulator = Accumulator::new(0.0, false, 0);
        accumulator.initialize(2, 1, 0).unwrap();
        accumulator.start();
        assert!(matches!(
            accumulator.add(&observations(3)),
            Err(InfodynError::Estimator(_))
        ));
    }

    #[test]
    fn test_too_few_rows_rejected() {
        let mut accumulator = Accumulator::new(0.0, false, 0);
        accumulator.initialize(1, 1, 0).unwrap();
        accumulator.start();
        accumulator.add(&observations(2)).unwrap();
        assert!(accumulator.finish(5).is_err());
    }

    #[test]
    fn test_noise_is_seeded() {
        let mut a = vec![0.0; 7];
        let mut b = vec![0.0; 7];
        add_gaussian_noise(&mut a, 1e-3, &mut ChaCha20Rng::seed_from_u64(9));
        add_gaussian_noise(&mut b, 1e-3, &mut ChaCha20Rng::seed_from_u64(9));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() < 1e-2 && *v != 0.0));
    }

    #[test]
    fn test_standardise() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        standardise(&mut values);
        let mean: f64 = values.iter().sum::<f64>() / 4.0;
        let variance: f64 = values.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((variance - 1.0).abs() < 1e-12);

        let mut constant = vec![5.0; 3];
        standardise(&mut constant);
        assert_eq!(constant, vec![0.0; 3]);
    }
}
