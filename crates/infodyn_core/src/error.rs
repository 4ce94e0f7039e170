//! Error taxonomy shared by every stage of the pipeline.
//!
//! Protocol and topology errors are fatal for the whole run: once the stream
//! is out of step the next `# AGENT` header cannot be located. Numerical
//! conditioning errors are recoverable and are only surfaced by the
//! complexity retry loop after it has exhausted its noise budget.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfodynError {
    /// Malformed or unexpected stream content.
    #[error("protocol error at line {line_number}: {message} (got {line:?})")]
    Protocol {
        line_number: usize,
        line: String,
        message: String,
    },

    /// Wiring that violates the topology invariants.
    #[error("topology error: {0}")]
    Topology(String),

    /// Near-singular covariance or an undefined logarithm.
    #[error("numerical conditioning error: {0}")]
    NumericalConditioning(String),

    /// Estimator misuse: inconsistent dimensions, too few observations.
    #[error("estimator error: {0}")]
    Estimator(String),

    /// Settings outside their admissible range.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InfodynError {
    pub(crate) fn protocol(line_number: usize, line: &str, message: impl Into<String>) -> Self {
        InfodynError::Protocol {
            line_number,
            line: line.to_string(),
            message: message.into(),
        }
    }

    /// True for errors the complexity retry loop may recover from.
    pub fn is_conditioning(&self) -> bool {
        matches!(self, InfodynError::NumericalConditioning(_))
    }
}

pub type Result<T> = std::result::Result<T, InfodynError>;
