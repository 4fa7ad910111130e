//! Execution configuration structures.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MEMORY_LIMIT, MAX_ROW_COUNT, TEST_MEMORY_LIMIT};
use crate::error::{KestrelError, KestrelResult};

/// Settings shared by every operator of one fragment.
///
/// # Example
///
/// ```rust
/// use kestrel_common::config::ExecConfig;
///
/// let config = ExecConfig::default();
/// assert_eq!(config.output_batch_rows, 65_536);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Default output-row cap handed to operators.
    /// Default: 65536
    pub output_batch_rows: usize,

    /// Byte limit of the fragment's buffer allocator.
    /// Default: 268435456 (256 MB)
    pub memory_limit_bytes: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            output_batch_rows: MAX_ROW_COUNT,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl ExecConfig {
    /// Creates a configuration with the given output-row cap.
    #[must_use]
    pub fn with_output_batch_rows(output_batch_rows: usize) -> Self {
        Self {
            output_batch_rows,
            ..Default::default()
        }
    }

    /// Creates a small configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            output_batch_rows: 1024,
            memory_limit_bytes: TEST_MEMORY_LIMIT,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> KestrelResult<()> {
        if self.output_batch_rows == 0 {
            return Err(KestrelError::invalid_config(
                "output_batch_rows must be greater than 0",
            ));
        }

        if self.output_batch_rows > MAX_ROW_COUNT {
            return Err(KestrelError::invalid_config(format!(
                "output_batch_rows must be at most {}",
                MAX_ROW_COUNT
            )));
        }

        if self.memory_limit_bytes == 0 {
            return Err(KestrelError::invalid_config(
                "memory_limit_bytes must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExecConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory_limit_bytes, 256 * 1024 * 1024);
    }

    #[test]
    fn test_testing_config() {
        let config = ExecConfig::for_testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory_limit_bytes, TEST_MEMORY_LIMIT);
    }

    #[test]
    fn test_validate_rejects_bad_caps() {
        assert!(ExecConfig::with_output_batch_rows(0).validate().is_err());
        assert!(ExecConfig::with_output_batch_rows(MAX_ROW_COUNT + 1)
            .validate()
            .is_err());
        assert!(ExecConfig::with_output_batch_rows(MAX_ROW_COUNT)
            .validate()
            .is_ok());

        let config = ExecConfig {
            memory_limit_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExecConfig = serde_json::from_str(r#"{"output_batch_rows": 4}"#).unwrap();
        assert_eq!(config.output_batch_rows, 4);
        assert_eq!(config.memory_limit_bytes, DEFAULT_MEMORY_LIMIT);
    }
}
