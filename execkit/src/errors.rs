//! Error types for execkit.
//!
//! One taxonomy covers all four components. Pipeline stage failures,
//! retry outcomes, and cancellation all surface as [`ExecError`] so that
//! callers composing the pieces handle a single error type.

use thiserror::Error;

/// Opaque cause type carried by wrapping errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type for pipeline execution and retry outcomes.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A stage received a value of a different kind than it declared.
    ///
    /// The typed builder prevents this statically; this variant is the
    /// runtime backstop behind the type-erased stage chain.
    #[error("composition error in stage '{stage}': expected {expected}, got {actual}")]
    Composition {
        /// The stage whose input did not match.
        stage: String,
        /// The type name the stage expected.
        expected: &'static str,
        /// The type name of the value it actually received.
        actual: &'static str,
    },

    /// A validation stage's specification evaluated false.
    #[error("validation failed in stage '{stage}': {message}")]
    Validation {
        /// The validation stage name.
        stage: String,
        /// The failure message configured on the stage.
        message: String,
    },

    /// A transform or conditional-transform stage body failed.
    #[error("transform failed in stage '{stage}': {source}")]
    Transform {
        /// The failing stage name.
        stage: String,
        /// The underlying error raised by the stage body.
        #[source]
        source: BoxError,
    },

    /// The retry predicate kept accepting but `max_attempts` was reached.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: BoxError,
    },

    /// The composed retry predicate rejected the error.
    #[error("non-retryable failure: {source}")]
    NonRetryable {
        /// The rejected error.
        #[source]
        source: BoxError,
    },

    /// The operation was aborted via a cancellation token.
    #[error("operation cancelled: {reason}")]
    Cancelled {
        /// The reason supplied to the token.
        reason: String,
    },
}

impl ExecError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a transform error from an underlying cause.
    #[must_use]
    pub fn transform(stage: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transform {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Returns true for the terminal retry outcomes.
    #[must_use]
    pub fn is_retry_outcome(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. } | Self::NonRetryable { .. })
    }

    /// Returns the underlying cause, if this error wraps one.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        match self {
            Self::Transform { source, .. }
            | Self::RetryExhausted { source, .. }
            | Self::NonRetryable { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result alias used by pipeline and retry execution.
pub type ExecutionResult<T> = Result<T, ExecError>;

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
