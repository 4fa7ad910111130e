//! Streaming (sorted-input) group aggregation.
//!
//! [`StreamingAggExec`] merges runs of equal grouping keys as they stream
//! past. Group boundaries signalled by upstream `EndOfGroup` outcomes flush
//! the open group and reset every accumulator, so no partial result leaks
//! from one group into the next.

mod config;
mod strategy;
mod streaming;

pub use config::StreamingAggregateConfig;
pub use strategy::{AccumulatorSet, Aggregator};
pub use streaming::StreamingAggExec;
