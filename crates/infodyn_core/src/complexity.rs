//! Gaussian-approximation integration and Tononi-Sporns-Edelman complexity
//! over an agent's processing neurons.
//!
//! The pooled trace is copula-transformed to Gaussian marginals, its
//! covariance `Σ` gives the integration `I = ½ ln(∏ diag Σ / det Σ)` and
//! the complexity `C = ((n − 1) I − Σ_i I(Σ without i)) / n`.
//!
//! Identical or constant traces make `Σ` singular. The transform is then
//! repeated with a larger tie-breaking noise, following the state machine
//! in [`ComplexityState`], until it succeeds or the noise budget runs out.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tracing::debug;

use crate::config::ComplexityConfig;
use crate::ensemble::Ensemble;
use crate::error::{InfodynError, Result};
use crate::estimator::standard_normal_pair;
use crate::linalg::{Cholesky, Matrix};
use crate::topology::Layer;

/// Headroom so that repeated multiplication landing a rounding error above
/// `max_noise` still counts as reaching it.
const NOISE_SLACK: f64 = 1e-9;

/// Hard ceiling on noise escalations for one agent, whatever the schedule.
pub const MAX_ATTEMPTS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ComplexityEstimate {
    /// Number of processing neurons.
    pub count: usize,
    pub integration: f64,
    pub complexity: f64,
    /// Noise scale of the successful attempt.
    pub noise: f64,
    pub retries: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ComplexityState {
    Computing { attempt: usize, noise: f64 },
    Retrying { attempt: usize, noise: f64, reason: String },
    Succeeded(ComplexityEstimate),
    Exhausted { retries: usize, noise: f64, reason: String },
}

impl ComplexityState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComplexityState::Succeeded(_) | ComplexityState::Exhausted { .. }
        )
    }
}

/// Standard-normal sample of size `n`, sorted ascending.
fn sorted_normals(n: usize, rng: &mut ChaCha20Rng) -> Vec<f64> {
    let mut normals = Vec::with_capacity(n + 1);
    while normals.len() < n {
        let (z0, z1) = standard_normal_pair(rng);
        normals.push(z0);
        normals.push(z1);
    }
    normals.truncate(n);
    normals.sort_by(f64::total_cmp);
    normals
}

/// Copula transform: every column is perturbed by `noise` Gaussian noise,
/// ranked, and replaced by the matching order statistic of one shared
/// standard-normal sample.
pub fn gaussianize(columns: &mut [Vec<f64>], noise: f64, rng: &mut ChaCha20Rng) {
    let n = columns.first().map_or(0, Vec::len);
    let normals = sorted_normals(n, rng);
    let mut order: Vec<usize> = Vec::with_capacity(n);
    let mut perturbed = vec![0.0; n];

    for column in columns.iter_mut() {
        let mut time = 0;
        while time < n {
            let (z0, z1) = standard_normal_pair(rng);
            perturbed[time] = column[time] + z0 * noise;
            if time + 1 < n {
                perturbed[time + 1] = column[time + 1] + z1 * noise;
            }
            time += 2;
        }
        order.clear();
        order.extend(0..n);
        order.sort_by(|&a, &b| perturbed[a].total_cmp(&perturbed[b]));
        for (rank, &time) in order.iter().enumerate() {
            column[time] = normals[rank];
        }
    }
}

/// `½ ln(∏ diag Σ / det Σ)`.
pub fn integration(covariance: &Matrix) -> Result<f64> {
    let mut log_diagonal = 0.0;
    for variance in covariance.diagonal() {
        if !(variance > 0.0 && variance.is_finite()) {
            return Err(InfodynError::NumericalConditioning(format!(
                "variance {} has no logarithm",
                variance
            )));
        }
        log_diagonal += variance.ln();
    }
    let log_determinant = Cholesky::new(covariance)?.log_determinant();
    let value = 0.5 * (log_diagonal - log_determinant);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InfodynError::NumericalConditioning(format!(
            "integration is not finite ({})",
            value
        )))
    }
}

/// Tononi-Sporns-Edelman complexity given the whole-system integration.
pub fn complexity(covariance: &Matrix, whole: f64) -> Result<f64> {
    let n = covariance.rows();
    if n == 0 {
        return Ok(0.0);
    }
    let mut subsets = 0.0;
    for index in 0..n {
        subsets += integration(&covariance.without(index))?;
    }
    Ok(((n - 1) as f64 * whole - subsets) / n as f64)
}

fn compute_once(columns: &[Vec<f64>], noise: f64, rng: &mut ChaCha20Rng) -> Result<(f64, f64)> {
    let mut gaussian = columns.to_vec();
    gaussianize(&mut gaussian, noise, rng);
    let rows = gaussian.first().map_or(0, Vec::len);
    let mut observations = Matrix::zeros(rows, gaussian.len());
    for (col, values) in gaussian.iter().enumerate() {
        observations.set_column(col, values);
    }
    let covariance = observations.covariance()?;
    let whole = integration(&covariance)?;
    Ok((whole, complexity(&covariance, whole)?))
}

/// Advances the retry loop by one transition. Errors other than numerical
/// conditioning are returned as-is.
fn step(
    state: ComplexityState,
    columns: &[Vec<f64>],
    config: &ComplexityConfig,
    rng: &mut ChaCha20Rng,
) -> Result<ComplexityState> {
    Ok(match state {
        ComplexityState::Computing { attempt: n, noise } => match compute_once(columns, noise, rng) {
            Ok((integration, complexity)) => ComplexityState::Succeeded(ComplexityEstimate {
                count: columns.len(),
                integration,
                complexity,
                noise,
                retries: n,
            }),
            Err(err) if err.is_conditioning() => ComplexityState::Retrying {
                attempt: n,
                noise,
                reason: err.to_string(),
            },
            Err(err) => return Err(err),
        },
        ComplexityState::Retrying {
            attempt,
            noise,
            reason,
        } => {
            let next = noise * config.escalation;
            if attempt + 1 < MAX_ATTEMPTS
                && config.escalation > 1.0
                && next <= config.max_noise * (1.0 + NOISE_SLACK)
            {
                debug!(attempt, noise = next, %reason, "retrying with more noise");
                ComplexityState::Computing {
                    attempt: attempt + 1,
                    noise: next,
                }
            } else {
                ComplexityState::Exhausted {
                    retries: attempt,
                    noise,
                    reason,
                }
            }
        }
        terminal => terminal,
    })
}

/// Runs the retry loop for one agent and returns its terminal state,
/// either [`ComplexityState::Succeeded`] or [`ComplexityState::Exhausted`].
/// A noise schedule rejected by [`ComplexityConfig::validate`] is an error.
pub fn estimate(ensemble: &Ensemble, config: &ComplexityConfig) -> Result<ComplexityState> {
    config.validate()?;
    let neurons: Vec<usize> = ensemble
        .topology()
        .neuron_indices(Layer::Processing)
        .collect();
    if neurons.is_empty() {
        return Ok(ComplexityState::Succeeded(ComplexityEstimate {
            count: 0,
            integration: 0.0,
            complexity: 0.0,
            noise: config.initial_noise,
            retries: 0,
        }));
    }
    let columns = ensemble.combined_columns(&neurons);
    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);

    let mut state = ComplexityState::Computing {
        attempt: 0,
        noise: config.initial_noise,
    };
    while !state.is_terminal() {
        state = step(state, &columns, config, &mut rng)?;
    }
    Ok(state)
}
