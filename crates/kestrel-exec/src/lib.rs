//! # kestrel-exec
//!
//! Batch-execution core of the Kestrel query engine.
//!
//! This crate implements:
//! - The columnar batch and vector model with zero-copy transfer
//! - The outcome protocol shared by every operator
//! - Expressions and aggregate accumulators
//! - A streaming (sorted-input) group aggregation operator
//! - An unnest operator driven by a lateral cursor
//!
//! # Execution Model
//!
//! Operators are pulled one outcome at a time:
//!
//! ```ignore
//! loop {
//!     match operator.advance()? {
//!         Outcome::NewSchema(batch) | Outcome::Data(batch) => consume(batch),
//!         Outcome::EndOfGroup(batch) => close_group(batch),
//!         Outcome::NotYet => continue,
//!         Outcome::EndOfStream => break,
//!     }
//! }
//! operator.close();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Aggregate accumulators
pub mod accumulator;

/// Streaming group aggregation
pub mod aggregate;

/// Record batches and selection vectors
pub mod batch;

/// Per-operator execution context
pub mod context;

/// Row-level expression evaluation
pub mod evaluator;

/// Physical expressions
pub mod expr;

/// Outcome protocol and the operator trait
pub mod outcome;

/// Row representation
pub mod row;

/// Fields and schemas
pub mod schema;

/// Scripted upstream operator
pub mod source;

/// Logical data types
pub mod types;

/// Unnest kernel, operator and lateral cursor
pub mod unnest;

/// Runtime values
pub mod value;

/// Column vectors and transfer
pub mod vector;

pub use batch::{
    RecordBatch, RecordBatchBuilder, SchemaChangeCallback, SelectionVector, SelectionVectorMode,
};
pub use context::OperatorContext;
pub use outcome::{Operator, Outcome, OutcomeKind};
pub use row::Row;
pub use schema::{Field, Schema};
pub use types::DataType;
pub use value::Value;
pub use vector::{Column, RepeatedAccessor, RepeatedVector, TransferPair, ValueVector};
