use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use clap::{Args, ValueEnum};

use crate::error::{InfodynError, Result};
use crate::estimator::{ConditionalMiEstimator, GaussianEstimator, KraskovEstimator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum EstimatorKind {
    Kraskov,
    Gaussian,
}

impl EstimatorKind {
    pub fn name(self) -> &'static str {
        match self {
            EstimatorKind::Kraskov => "kraskov",
            EstimatorKind::Gaussian => "gaussian",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[cfg_attr(feature = "cli", derive(Args))]
pub struct EstimatorConfig {
    /// Conditional MI estimator (Kraskov, Gaussian)
    #[cfg_attr(feature = "cli", arg(long, value_enum, default_value_t = EstimatorKind::Kraskov))]
    pub estimator: EstimatorKind,

    /// Nearest neighbours for the Kraskov estimator
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 4))]
    pub neighbours: usize,

    /// Scale of the Gaussian noise added to every estimator input column
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 1e-8))]
    pub noise_level: f64,

    /// Rescale estimator inputs to zero mean and unit variance
    #[cfg_attr(feature = "cli", arg(long, default_value_t = true, action = clap::ArgAction::Set))]
    pub normalise: bool,

    /// Request an accelerated estimator backend
    #[cfg_attr(feature = "cli", arg(long))]
    pub use_gpu: bool,

    /// Seed for every random draw
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 0))]
    pub seed: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorKind::Kraskov,
            neighbours: 4,
            noise_level: 1e-8,
            normalise: true,
            use_gpu: false,
            seed: 0,
        }
    }
}

impl EstimatorConfig {
    /// Fresh estimator for one measurement.
    pub fn create_estimator(&self) -> Box<dyn ConditionalMiEstimator> {
        match self.estimator {
            EstimatorKind::Kraskov => Box::new(KraskovEstimator::new(
                self.neighbours,
                self.noise_level,
                self.normalise,
                self.seed,
            )),
            EstimatorKind::Gaussian => Box::new(GaussianEstimator::new(
                self.noise_level,
                self.normalise,
                self.seed,
            )),
        }
    }

    /// `key = value` pairs echoed as provenance.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let mut properties = vec![("ESTIMATOR", self.estimator.name().to_string())];
        if self.estimator == EstimatorKind::Kraskov {
            properties.push(("NEIGHBOURS", self.neighbours.to_string()));
        }
        properties.extend([
            ("NOISE_LEVEL", format!("{:e}", self.noise_level)),
            ("NORMALISE", self.normalise.to_string()),
            ("USE_GPU", self.use_gpu.to_string()),
            ("SEED", self.seed.to_string()),
        ]);
        properties
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[cfg_attr(feature = "cli", derive(Args))]
pub struct ComplexityConfig {
    /// Initial Gaussianisation noise scale
    #[cfg_attr(feature = "cli", arg(long = "noise", default_value_t = 1e-6))]
    pub initial_noise: f64,

    /// Largest noise scale tried before giving up on an agent
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 1.0))]
    pub max_noise: f64,

    /// Factor applied to the noise scale after each ill-conditioned attempt
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 10.0))]
    pub escalation: f64,

    /// Seed for the Gaussianisation draws
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 0))]
    pub seed: u64,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            initial_noise: 1e-6,
            max_noise: 1.0,
            escalation: 10.0,
            seed: 0,
        }
    }
}

impl ComplexityConfig {
    /// Rejects noise schedules that could never reach `max_noise`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> Result<()> { Err(InfodynError::Config(message)) };
        if !(self.initial_noise.is_finite() && self.initial_noise > 0.0) {
            return invalid(format!("initial noise must be positive, got {}", self.initial_noise));
        }
        if !(self.max_noise.is_finite() && self.max_noise >= self.initial_noise) {
            return invalid(format!(
                "max noise must be at least the initial noise {}, got {}",
                self.initial_noise, self.max_noise
            ));
        }
        if !(self.escalation.is_finite() && self.escalation > 1.0) {
            return invalid(format!("escalation must exceed 1, got {}", self.escalation));
        }
        Ok(())
    }

    pub fn properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("INITIAL_NOISE", format!("{:e}", self.initial_noise)),
            ("MAX_NOISE", format!("{:e}", self.max_noise)),
            ("ESCALATION", format!("{}", self.escalation)),
            ("SEED", self.seed.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EstimatorConfig::default();
        assert_eq!(config.estimator, EstimatorKind::Kraskov);
        assert_eq!(config.neighbours, 4);
        assert_eq!(config.create_estimator().name(), "kraskov");

        let gaussian = EstimatorConfig {
            estimator: EstimatorKind::Gaussian,
            ..EstimatorConfig::default()
        };
        assert_eq!(gaussian.create_estimator().name(), "gaussian");
        assert!(!gaussian.properties().iter().any(|(key, _)| *key == "NEIGHBOURS"));
    }

    #[test]
    fn test_complexity_noise_schedule_validated() {
        assert!(ComplexityConfig::default().validate().is_ok());
        let with = |initial_noise: f64, max_noise: f64, escalation: f64| ComplexityConfig {
            initial_noise,
            max_noise,
            escalation,
            seed: 0,
        };
        for config in [
            with(0.0, 1.0, 10.0),
            with(-1e-6, 1.0, 10.0),
            with(f64::NAN, 1.0, 10.0),
            with(f64::INFINITY, 1.0, 10.0),
            with(1e-6, 1e-7, 10.0),
            with(1e-6, f64::NAN, 10.0),
            with(1e-6, 1.0, 1.0),
            with(1e-6, 1.0, 0.5),
            with(1e-6, 1.0, f64::NAN),
        ] {
            assert!(
                matches!(config.validate(), Err(InfodynError::Config(_))),
                "{:?}",
                config
            );
        }
        assert!(with(0.5, 0.5, 2.0).validate().is_ok());
    }

    #[test]
    fn test_properties_order() {
        let keys: Vec<&str> = EstimatorConfig::default()
            .properties()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(
            keys,
            ["ESTIMATOR", "NEIGHBOURS", "NOISE_LEVEL", "NORMALISE", "USE_GPU", "SEED"]
        );
    }
}
