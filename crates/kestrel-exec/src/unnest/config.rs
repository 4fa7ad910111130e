//! Unnest configuration.

use kestrel_common::constants::MAX_ROW_COUNT;
use kestrel_common::error::{KestrelError, KestrelResult};
use serde::{Deserialize, Serialize};

/// Configuration accepted by [`super::UnnestExec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnnestConfig {
    /// Name of the repeated column to expand.
    pub unnest_field: String,

    /// Maximum rows produced per call.
    /// Default: 65536
    #[serde(default = "default_output_row_cap")]
    pub output_row_cap: usize,
}

fn default_output_row_cap() -> usize {
    MAX_ROW_COUNT
}

impl UnnestConfig {
    /// Creates a configuration with the maximum output cap.
    pub fn new(unnest_field: impl Into<String>) -> Self {
        Self {
            unnest_field: unnest_field.into(),
            output_row_cap: default_output_row_cap(),
        }
    }

    /// Sets the output cap.
    #[must_use]
    pub fn with_output_row_cap(mut self, cap: usize) -> Self {
        self.output_row_cap = cap;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> KestrelResult<()> {
        if self.unnest_field.is_empty() {
            return Err(KestrelError::invalid_config("unnest_field must not be empty"));
        }

        if self.output_row_cap == 0 || self.output_row_cap > MAX_ROW_COUNT {
            return Err(KestrelError::invalid_config(format!(
                "output_row_cap must be in [1, {}], got {}",
                MAX_ROW_COUNT, self.output_row_cap
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(UnnestConfig::new("items").validate().is_ok());
        assert!(UnnestConfig::new("").validate().is_err());
        assert!(UnnestConfig::new("items").with_output_row_cap(0).validate().is_err());
        assert!(UnnestConfig::new("items")
            .with_output_row_cap(MAX_ROW_COUNT + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_default_cap() {
        let config: UnnestConfig = serde_json::from_str(r#"{"unnest_field": "items"}"#).unwrap();
        assert_eq!(config, UnnestConfig::new("items"));
    }
}
