//! # infodyn_core
//!
//! Information dynamics of evolved neural controllers.
//!
//! The pipeline reads one agent at a time from a self-describing text
//! stream ([`stream`]), selects variables through its wiring
//! ([`topology`]), delay-embeds every recorded trial ([`embedding`]) and
//! estimates conditional mutual information ([`estimator`]) to produce
//! active information storage, apparent, complete and collective transfer
//! entropy and separable information ([`measures`]). Per-neuron results are
//! rolled up through nerves and layers ([`aggregate`]). Independently,
//! [`complexity`] computes Gaussian integration and TSE complexity.

pub mod aggregate;
pub mod complexity;
pub mod config;
pub mod embedding;
pub mod ensemble;
pub mod error;
pub mod estimator;
pub mod linalg;
pub mod measures;
pub mod report;
pub mod stream;
pub mod topology;

pub use aggregate::{Group, Locals, SeparableSplit, Tally};
pub use complexity::{ComplexityEstimate, ComplexityState};
pub use config::{ComplexityConfig, EstimatorConfig, EstimatorKind};
pub use embedding::{Block, EmbeddingPlan, Observations};
pub use ensemble::{Ensemble, TimeSeries};
pub use error::{InfodynError, Result};
pub use estimator::{ConditionalMiEstimator, GaussianEstimator, KraskovEstimator};
pub use measures::DynamicsSelection;
pub use report::{ComplexityRow, Metric, Row};
pub use stream::{EnsembleReader, Next, StreamWriter};
pub use topology::{Layer, Nerve, Synapse, Topology};
