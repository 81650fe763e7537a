//! Error taxonomy for schedule construction and evaluation.

use thiserror::Error;

/// Errors raised by the ladder, the boundary builder, and the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The schedule cannot be built from the given parameters.
    #[error("invalid schedule configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong with the configuration
        reason: String,
    },

    /// A step past the last boundary was queried under the `Fail` policy.
    #[error("step {step} is past the end of the schedule ({total_steps} steps)")]
    OutOfRangeStep {
        /// The queried 1-based step
        step: usize,
        /// Last boundary of the table
        total_steps: usize,
    },
}

impl ScheduleError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an OutOfRangeStep error.
    pub fn out_of_range(step: usize, total_steps: usize) -> Self {
        Self::OutOfRangeStep { step, total_steps }
    }
}

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, ScheduleError>;
