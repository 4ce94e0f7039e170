//! Kraskov-Stögbauer-Grassberger conditional mutual information
//! (algorithm 1, max-norm, brute-force neighbour search).
//!
//! For each row the distance `ε` to its `k`-th nearest neighbour in the
//! joint `(x, y, z)` space fixes the radius; the strict neighbour counts
//! inside `ε` in the `(x, z)`, `(y, z)` and `z` subspaces give the local
//! value `ψ(k) − ψ(n_xz + 1) − ψ(n_yz + 1) + ψ(n_z + 1)`. Without a
//! conditioning set `n_z = N − 1` and this is plain KSG mutual information.

use super::special::digamma;
use super::{Accumulator, ConditionalMiEstimator};
use crate::embedding::Observations;
use crate::error::{InfodynError, Result};
use crate::linalg::Matrix;

pub struct KraskovEstimator {
    k: usize,
    accumulator: Accumulator,
}

impl KraskovEstimator {
    pub fn new(k: usize, noise_level: f64, normalise: bool, seed: u64) -> Self {
        Self {
            k,
            accumulator: Accumulator::new(noise_level, normalise, seed),
        }
    }

    pub fn neighbours(&self) -> usize {
        self.k
    }
}

/// Max-norm distance between rows `i` and `j` of `m`.
#[inline]
fn max_norm(m: &Matrix, i: usize, j: usize) -> f64 {
    m.row(i)
        .iter()
        .zip(m.row(j))
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

fn ksg_locals(data: &Observations, k: usize) -> Vec<f64> {
    let n = data.rows();
    let psi_k = digamma(k as f64);
    let mut dx = vec![0.0; n];
    let mut dy = vec![0.0; n];
    let mut dz = vec![0.0; n];
    let mut joint = Vec::with_capacity(n);

    (0..n)
        .map(|i| {
            joint.clear();
            for j in 0..n {
                dx[j] = max_norm(&data.source, i, j);
                dy[j] = max_norm(&data.target, i, j);
                dz[j] = max_norm(&data.conditioning, i, j);
                if j != i {
                    joint.push(dx[j].max(dy[j]).max(dz[j]));
                }
            }
            let (_, epsilon, _) = joint.select_nth_unstable_by(k - 1, f64::total_cmp);
            let epsilon = *epsilon;

            let (mut n_xz, mut n_yz, mut n_z) = (0usize, 0usize, 0usize);
            for j in (0..n).filter(|&j| j != i) {
                if dz[j] < epsilon {
                    n_z += 1;
                    if dx[j] < epsilon {
                        n_xz += 1;
                    }
                    if dy[j] < epsilon {
                        n_yz += 1;
                    }
                }
            }
            psi_k - digamma((n_xz + 1) as f64) - digamma((n_yz + 1) as f64)
                + digamma((n_z + 1) as f64)
        })
        .collect()
}

impl ConditionalMiEstimator for KraskovEstimator {
    fn initialize(
        &mut self,
        source_dim: usize,
        target_dim: usize,
        conditioning_dim: usize,
    ) -> Result<()> {
        if self.k == 0 {
            return Err(InfodynError::Estimator(
                "kraskov estimator needs at least one neighbour".to_string(),
            ));
        }
        self.accumulator
            .initialize(source_dim, target_dim, conditioning_dim)
    }

    fn start_accumulation(&mut self) {
        self.accumulator.start();
    }

    fn add_observations(&mut self, observations: &Observations) -> Result<()> {
        self.accumulator.add(observations)
    }

    fn finish_accumulation(&mut self) -> Result<()> {
        self.accumulator.finish(self.minimum_rows())
    }

    fn minimum_rows(&self) -> usize {
        self.k + 1
    }

    fn compute_average(&self) -> Result<f64> {
        let locals = self.compute_local()?;
        Ok(locals.iter().sum::<f64>() / locals.len() as f64)
    }

    fn compute_local(&self) -> Result<Vec<f64>> {
        let data = self.accumulator.finished()?;
        Ok(ksg_locals(data, self.k))
    }

    fn name(&self) -> &'static str {
        "kraskov"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::standard_normal_pair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn load(estimator: &mut KraskovEstimator, observations: &Observations) {
        estimator
            .initialize(
                observations.source.cols(),
                observations.target.cols(),
                observations.conditioning.cols(),
            )
            .unwrap();
        estimator.start_accumulation();
        estimator.add_observations(observations).unwrap();
        estimator.finish_accumulation().unwrap();
    }

    fn sample(rows: usize, rho: f64, conditioned: bool, seed: u64) -> Observations {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut observations = Observations::empty(1, 1, usize::from(conditioned));
        for _ in 0..rows {
            let (x, e) = standard_normal_pair(&mut rng);
            let (z, _) = standard_normal_pair(&mut rng);
            let y = rho * x + (1.0 - rho * rho).sqrt() * e;
            observations.source.push_row(&[x]).unwrap();
            observations.target.push_row(&[y]).unwrap();
            if conditioned {
                observations.conditioning.push_row(&[z]).unwrap();
            } else {
                observations.conditioning.push_row(&[]).unwrap();
            }
        }
        observations
    }

    #[test]
    fn test_ksg_recovers_gaussian_mutual_information() {
        let rho: f64 = 0.8;
        let mut estimator = KraskovEstimator::new(4, 1e-8, true, 0);
        load(&mut estimator, &sample(600, rho, false, 21));
        let estimate = estimator.compute_average().unwrap();
        let expected = -0.5 * (1.0 - rho * rho).ln();
        assert!(
            (estimate - expected).abs() < 0.1,
            "ksg {} vs analytic {}",
            estimate,
            expected
        );
    }

    #[test]
    fn test_independent_conditioning_leaves_information() {
        let rho: f64 = 0.8;
        let mut estimator = KraskovEstimator::new(4, 1e-8, true, 0);
        load(&mut estimator, &sample(600, rho, true, 22));
        let estimate = estimator.compute_average().unwrap();
        let expected = -0.5 * (1.0 - rho * rho).ln();
        assert!((estimate - expected).abs() < 0.15, "cmi {}", estimate);
    }

    #[test]
    fn test_independent_variables_near_zero() {
        let mut estimator = KraskovEstimator::new(4, 1e-8, true, 0);
        load(&mut estimator, &sample(600, 0.0, true, 23));
        let estimate = estimator.compute_average().unwrap();
        assert!(estimate.abs() < 0.08, "cmi {}", estimate);
    }

    #[test]
    fn test_locals_match_average_and_row_count() {
        let mut estimator = KraskovEstimator::new(3, 1e-8, true, 0);
        load(&mut estimator, &sample(50, 0.5, true, 24));
        let locals = estimator.compute_local().unwrap();
        assert_eq!(locals.len(), 50);
        let mean = locals.iter().sum::<f64>() / 50.0;
        assert_eq!(mean, estimator.compute_average().unwrap());
    }

    #[test]
    fn test_needs_more_rows_than_neighbours() {
        let mut estimator = KraskovEstimator::new(4, 1e-8, true, 0);
        estimator.initialize(1, 1, 0).unwrap();
        estimator.start_accumulation();
        estimator.add_observations(&sample(4, 0.5, false, 1)).unwrap();
        assert!(matches!(
            estimator.finish_accumulation(),
            Err(InfodynError::Estimator(_))
        ));
    }
}
