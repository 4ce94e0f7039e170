//! Linear-Gaussian conditional mutual information.
//!
//! `I(X;Y|Z) = ½ ln(|Σ_XZ| |Σ_YZ| / (|Σ_Z| |Σ_XYZ|))`. Locals are the
//! pointwise log density ratios `ln p(x,y,z) p(z) / (p(x,z) p(y,z))` under
//! the fitted Gaussians; with the unbiased covariance their mean equals the
//! average.

use super::{joint, Accumulator, ConditionalMiEstimator};
use crate::embedding::Observations;
use crate::error::Result;
use crate::linalg::{Cholesky, Matrix};

pub struct GaussianEstimator {
    accumulator: Accumulator,
}

impl GaussianEstimator {
    pub fn new(noise_level: f64, normalise: bool, seed: u64) -> Self {
        Self {
            accumulator: Accumulator::new(noise_level, normalise, seed),
        }
    }

    fn fit(&self) -> Result<Fit> {
        let data = self.accumulator.finished()?;
        let all = joint(&[&data.source, &data.target, &data.conditioning])?;
        let covariance = all.covariance()?;
        let dx = data.source.cols();
        let dy = data.target.cols();
        let x: Vec<usize> = (0..dx).collect();
        let y: Vec<usize> = (dx..dx + dy).collect();
        let z: Vec<usize> = (dx + dy..all.cols()).collect();
        let with_z = |part: &[usize]| part.iter().chain(&z).copied().collect::<Vec<_>>();
        let xyz: Vec<usize> = (0..all.cols()).collect();

        Ok(Fit {
            means: all.means(),
            xz: Marginal::new(&covariance, with_z(&x))?,
            yz: Marginal::new(&covariance, with_z(&y))?,
            z: Marginal::new(&covariance, z.clone())?,
            xyz: Marginal::new(&covariance, xyz)?,
            data: all,
        })
    }
}

/// Gaussian restricted to a subset of the joint columns.
struct Marginal {
    columns: Vec<usize>,
    cholesky: Cholesky,
}

impl Marginal {
    fn new(covariance: &Matrix, columns: Vec<usize>) -> Result<Self> {
        let cholesky = Cholesky::new(&covariance.principal_submatrix(&columns))?;
        Ok(Self { columns, cholesky })
    }

    fn mahalanobis(&self, centred: &[f64]) -> f64 {
        let v: Vec<f64> = self.columns.iter().map(|&c| centred[c]).collect();
        self.cholesky.mahalanobis(&v)
    }
}

struct Fit {
    means: Vec<f64>,
    xz: Marginal,
    yz: Marginal,
    z: Marginal,
    xyz: Marginal,
    data: Matrix,
}

impl Fit {
    fn log_det_ratio(&self) -> f64 {
        self.xz.cholesky.log_determinant() + self.yz.cholesky.log_determinant()
            - self.z.cholesky.log_determinant()
            - self.xyz.cholesky.log_determinant()
    }
}

impl ConditionalMiEstimator for GaussianEstimator {
    fn initialize(
        &mut self,
        source_dim: usize,
        target_dim: usize,
        conditioning_dim: usize,
    ) -> Result<()> {
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
        2
    }

    fn compute_average(&self) -> Result<f64> {
        Ok(0.5 * self.fit()?.log_det_ratio())
    }

    fn compute_local(&self) -> Result<Vec<f64>> {
        let fit = self.fit()?;
        let constant = fit.log_det_ratio();
        let mut centred = vec![0.0; fit.means.len()];
        let locals = (0..fit.data.rows())
            .map(|row| {
                for ((c, value), mean) in centred.iter_mut().zip(fit.data.row(row)).zip(&fit.means)
                {
                    *c = value - mean;
                }
                0.5 * (constant + fit.xz.mahalanobis(&centred) + fit.yz.mahalanobis(&centred)
                    - fit.z.mahalanobis(&centred)
                    - fit.xyz.mahalanobis(&centred))
            })
            .collect();
        Ok(locals)
    }

    fn name(&self) -> &'static str {
        "gaussian"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfodynError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use crate::estimator::standard_normal_pair;

    /// y = rho * x + sqrt(1 - rho^2) * e
    fn correlated(rows: usize, rho: f64, seed: u64) -> Observations {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut observations = Observations::empty(1, 1, 0);
        for _ in 0..rows {
            let (x, e) = standard_normal_pair(&mut rng);
            let y = rho * x + (1.0 - rho * rho).sqrt() * e;
            observations.source.push_row(&[x]).unwrap();
            observations.target.push_row(&[y]).unwrap();
            observations.conditioning.push_row(&[]).unwrap();
        }
        observations
    }

    fn loaded(observations: &Observations) -> GaussianEstimator {
        let mut estimator = GaussianEstimator::new(0.0, true, 0);
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
        estimator
    }

    #[test]
    fn test_mutual_information_of_correlated_gaussians() {
        let rho: f64 = 0.8;
        let estimator = loaded(&correlated(4000, rho, 3));
        let expected = -0.5 * (1.0 - rho * rho).ln();
        let average = estimator.compute_average().unwrap();
        assert!(
            (average - expected).abs() < 0.05,
            "average {} vs analytic {}",
            average,
            expected
        );
    }

    #[test]
    fn test_locals_average_to_estimate() {
        let estimator = loaded(&correlated(500, 0.5, 11));
        let locals = estimator.compute_local().unwrap();
        assert_eq!(locals.len(), 500);
        let mean = locals.iter().sum::<f64>() / locals.len() as f64;
        let average = estimator.compute_average().unwrap();
        assert!((mean - average).abs() < 1e-9, "{} vs {}", mean, average);
    }

    #[test]
    fn test_conditioning_on_copy_of_source_removes_information() {
        let base = correlated(800, 0.9, 5);
        let mut observations = Observations::empty(1, 1, 1);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for row in 0..base.rows() {
            let (jitter, _) = standard_normal_pair(&mut rng);
            observations.source.push_row(base.source.row(row)).unwrap();
            observations.target.push_row(base.target.row(row)).unwrap();
            observations
                .conditioning
                .push_row(&[base.source.get(row, 0) + 1e-3 * jitter])
                .unwrap();
        }
        let average = loaded(&observations).compute_average().unwrap();
        assert!(average.abs() < 0.02, "residual information {}", average);
    }

    #[test]
    fn test_identical_columns_are_ill_conditioned() {
        let mut observations = Observations::empty(1, 1, 1);
        for t in 0..20 {
            let value = (t as f64).sin();
            observations.source.push_row(&[value]).unwrap();
            observations.target.push_row(&[(t as f64).cos()]).unwrap();
            observations.conditioning.push_row(&[value]).unwrap();
        }
        let estimator = loaded(&observations);
        assert!(matches!(
            estimator.compute_average(),
            Err(InfodynError::NumericalConditioning(_))
        ));
    }
}
