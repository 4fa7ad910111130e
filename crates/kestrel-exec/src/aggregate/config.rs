//! Streaming aggregation configuration.

use kestrel_common::constants::MIN_OUTPUT_ROWS;
use kestrel_common::error::{KestrelError, KestrelResult};
use serde::{Deserialize, Serialize};

use crate::expr::{AggregateExpr, NamedExpr};

/// Configuration accepted by [`super::StreamingAggExec`].
///
/// # Example
///
/// ```rust
/// use kestrel_exec::aggregate::StreamingAggregateConfig;
/// use kestrel_exec::expr::{AggregateExpr, NamedExpr, PhysicalExpr};
///
/// let config = StreamingAggregateConfig::new(
///     vec![NamedExpr::new(PhysicalExpr::col("name_left"), "name")],
///     vec![AggregateExpr::sum(
///         PhysicalExpr::plus(PhysicalExpr::col("id_left"), PhysicalExpr::col("cost_left")),
///         "total_sum",
///     )],
/// );
/// assert!(config.validate().is_ok());
/// assert_eq!(config.output_row_cap(1000), 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingAggregateConfig {
    /// Grouping keys, in output order.
    #[serde(default)]
    pub group_by: Vec<NamedExpr>,

    /// Aggregates, emitted after the grouping keys.
    #[serde(default)]
    pub aggregates: Vec<AggregateExpr>,

    /// Multiplier on the platform output-row cap.
    /// Default: 1.0
    #[serde(default = "default_fraction")]
    pub output_batch_size_fraction: f32,
}

fn default_fraction() -> f32 {
    1.0
}

impl StreamingAggregateConfig {
    /// Creates a configuration using the full output-row cap.
    pub fn new(group_by: Vec<NamedExpr>, aggregates: Vec<AggregateExpr>) -> Self {
        Self {
            group_by,
            aggregates,
            output_batch_size_fraction: default_fraction(),
        }
    }

    /// Sets the output batch size fraction.
    #[must_use]
    pub fn with_fraction(mut self, fraction: f32) -> Self {
        self.output_batch_size_fraction = fraction;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> KestrelResult<()> {
        validate_fraction(self.output_batch_size_fraction)?;

        if self.group_by.is_empty() && self.aggregates.is_empty() {
            return Err(KestrelError::invalid_config(
                "streaming aggregate needs at least one grouping or aggregate expression",
            ));
        }

        Ok(())
    }

    /// Returns the output-row cap for a platform default of `default_rows`.
    pub fn output_row_cap(&self, default_rows: usize) -> usize {
        output_row_cap(default_rows, self.output_batch_size_fraction)
    }
}

pub(crate) fn validate_fraction(fraction: f32) -> KestrelResult<()> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(KestrelError::invalid_config(format!(
            "output_batch_size_fraction must be in (0, 1], got {}",
            fraction
        )));
    }
    Ok(())
}

pub(crate) fn output_row_cap(default_rows: usize, fraction: f32) -> usize {
    let scaled = (default_rows as f64 * f64::from(fraction)).floor() as usize;
    scaled.max(MIN_OUTPUT_ROWS)
}
