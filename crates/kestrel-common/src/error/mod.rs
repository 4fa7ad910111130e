//! Error handling for the execution core.
//!
//! This module provides a unified error type and result alias used
//! across all Kestrel components.

mod execution;

pub use execution::{ErrorCategory, ErrorCode, KestrelError};

/// Result type alias for Kestrel operations.
pub type KestrelResult<T> = std::result::Result<T, KestrelError>;
