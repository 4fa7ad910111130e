//! Execution error types.
//!
//! Every failure an operator can report is one of these variants. An
//! operator that returns one of them has failed for good; the driver stops
//! advancing it and closes the operator tree.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug or contract violation).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,

    // Configuration errors (0x0100 - 0x01FF)
    /// Selection vector mode not supported by the operator.
    UnsupportedSelectionVector = 0x0100,
    /// Column type does not match the expected type.
    TypeMismatch = 0x0101,
    /// Expected column is absent.
    MissingColumn = 0x0102,
    /// Invalid configuration value.
    InvalidConfig = 0x0103,

    // Schema errors (0x0200 - 0x02FF)
    /// Column advertised as repeated is not.
    NotRepeated = 0x0200,

    // Resource errors (0x0300 - 0x03FF)
    /// Allocation exceeded the memory limit.
    AllocationFailed = 0x0300,

    // Execution errors (0x0400 - 0x04FF)
    /// Expression evaluation failed.
    EvaluationFailed = 0x0400,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category for this code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match (*self as u16) >> 8 {
            0x01 => ErrorCategory::Configuration,
            0x02 => ErrorCategory::SchemaInconsistency,
            0x03 => ErrorCategory::ResourceExhaustion,
            0x04 => ErrorCategory::Execution,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Operator was wired or configured in a way it cannot run.
    Configuration,
    /// Upstream produced data that contradicts its own schema.
    SchemaInconsistency,
    /// Memory limit hit while building output.
    ResourceExhaustion,
    /// Row-level evaluation failure.
    Execution,
    /// Bug or protocol misuse.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::SchemaInconsistency => "schema inconsistency",
            ErrorCategory::ResourceExhaustion => "resource exhaustion",
            ErrorCategory::Execution => "execution",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// The main error type for the execution core.
///
/// # Example
///
/// ```rust
/// use kestrel_common::error::{ErrorCategory, KestrelError, KestrelResult};
///
/// fn check_mode(mode: &str) -> KestrelResult<()> {
///     Err(KestrelError::UnsupportedSelectionVector {
///         operator: "Unnest".into(),
///         mode: mode.into(),
///     })
/// }
///
/// let err = check_mode("TWO_BYTE").unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Configuration);
/// ```
#[derive(Debug, Error)]
pub enum KestrelError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug or a protocol violation.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// The incoming batch uses a selection vector the operator cannot read.
    #[error("{operator} does not support selection vector mode {mode}")]
    UnsupportedSelectionVector {
        /// Operator name.
        operator: String,
        /// Offending mode.
        mode: String,
    },

    /// Destination column type differs from the source.
    #[error("type mismatch for column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Expected type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    /// A column the operator depends on is absent.
    #[error("column '{column}' not found in {context}")]
    MissingColumn {
        /// The missing column.
        column: String,
        /// Where the lookup happened.
        context: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    /// Column was expected to be repeated but is flat.
    #[error("column '{column}' is not a repeated column")]
    NotRepeated {
        /// Column name.
        column: String,
    },

    // ==========================================================================
    // Resource Errors
    // ==========================================================================
    /// The allocator could not satisfy a reservation.
    #[error("allocation of {requested} bytes failed: {available} of {limit} bytes available")]
    AllocationFailed {
        /// Bytes requested.
        requested: usize,
        /// Bytes still available.
        available: usize,
        /// Allocator limit.
        limit: usize,
    },

    // ==========================================================================
    // Execution Errors
    // ==========================================================================
    /// Expression evaluation failed.
    #[error("evaluation failed: {message}")]
    Evaluation {
        /// Error message.
        message: String,
    },
}

impl KestrelError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::UnsupportedSelectionVector { .. } => ErrorCode::UnsupportedSelectionVector,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::MissingColumn { .. } => ErrorCode::MissingColumn,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::NotRepeated { .. } => ErrorCode::NotRepeated,
            Self::AllocationFailed { .. } => ErrorCode::AllocationFailed,
            Self::Evaluation { .. } => ErrorCode::EvaluationFailed,
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Nothing in the execution core is retried in place: transient
    /// conditions are reported as an outcome, not an error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }

    /// Returns true if the query may be restarted at a higher level.
    #[must_use]
    pub const fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a missing column error.
    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    /// Creates an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }
}
