//! Outcome protocol shared by every operator.
//!
//! An operator is driven by repeated calls to [`Operator::advance`]; each
//! call returns exactly one [`Outcome`]. Batches travel only inside the
//! data-bearing variants, so "current batch is valid only after a data
//! outcome" is enforced by the type system. A failure is an `Err`.
//!
//! Rules every operator follows:
//!
//! - The first batch it produces is announced with `NewSchema`, and so is
//!   every batch whose shape differs from the last announced one.
//! - `EndOfGroup` may carry zero rows and is never merged with the next
//!   outcome.
//! - After `EndOfStream`, every further call returns `EndOfStream`.
//! - After an `Err`, further calls return `KestrelError::Internal`.

use std::fmt;
use std::sync::Arc;

use kestrel_common::error::KestrelResult;

use crate::batch::RecordBatch;
use crate::schema::Schema;

/// Result of one `advance()` call.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A batch whose shape differs from the previously announced one.
    NewSchema(RecordBatch),
    /// A batch with the announced shape.
    Data(RecordBatch),
    /// A batch (possibly empty) that closes the current group.
    EndOfGroup(RecordBatch),
    /// Nothing available yet; call again without changing anything.
    NotYet,
    /// No more data will ever be produced.
    EndOfStream,
}

impl Outcome {
    /// Returns the kind of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::NewSchema(_) => OutcomeKind::NewSchema,
            Outcome::Data(_) => OutcomeKind::HasData,
            Outcome::EndOfGroup(_) => OutcomeKind::EndOfGroup,
            Outcome::NotYet => OutcomeKind::NotYet,
            Outcome::EndOfStream => OutcomeKind::EndOfStream,
        }
    }

    /// Returns the batch of a data-bearing outcome.
    pub fn batch(&self) -> Option<&RecordBatch> {
        match self {
            Outcome::NewSchema(b) | Outcome::Data(b) | Outcome::EndOfGroup(b) => Some(b),
            Outcome::NotYet | Outcome::EndOfStream => None,
        }
    }

    /// Consumes the outcome and returns its batch.
    pub fn into_batch(self) -> Option<RecordBatch> {
        match self {
            Outcome::NewSchema(b) | Outcome::Data(b) | Outcome::EndOfGroup(b) => Some(b),
            Outcome::NotYet | Outcome::EndOfStream => None,
        }
    }

    /// Returns the number of rows carried (0 for control outcomes).
    pub fn record_count(&self) -> usize {
        self.batch().map_or(0, RecordBatch::num_rows)
    }

    /// Returns true if the outcome carries a batch.
    pub fn is_data_bearing(&self) -> bool {
        self.batch().is_some()
    }
}

/// The outcome classes, including failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// Batch with a new shape.
    NewSchema,
    /// Batch with the announced shape.
    HasData,
    /// Group boundary.
    EndOfGroup,
    /// Terminal.
    EndOfStream,
    /// Transient retry signal.
    NotYet,
    /// Unrecoverable error.
    Failure,
}

impl OutcomeKind {
    /// Classifies the result of an `advance()` call.
    pub fn of(result: &KestrelResult<Outcome>) -> Self {
        match result {
            Ok(outcome) => outcome.kind(),
            Err(_) => OutcomeKind::Failure,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeKind::NewSchema => "NEW_SCHEMA",
            OutcomeKind::HasData => "HAS_DATA",
            OutcomeKind::EndOfGroup => "END_OF_GROUP",
            OutcomeKind::EndOfStream => "END_OF_STREAM",
            OutcomeKind::NotYet => "NO_DATA_YET",
            OutcomeKind::Failure => "FAILURE",
        };
        f.write_str(name)
    }
}

/// Trait for executable operators.
pub trait Operator: fmt::Debug {
    /// Returns the operator name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Returns the output schema, once one has been announced.
    fn schema(&self) -> Option<Arc<Schema>>;

    /// Produces the next outcome.
    fn advance(&mut self) -> KestrelResult<Outcome>;

    /// Returns the row count of the most recently produced batch.
    fn record_count(&self) -> usize;

    /// Releases all owned storage and closes children. Idempotent.
    fn close(&mut self);
}

/// Lifecycle shared by the operators of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperatorState {
    Running,
    Finished,
    Failed,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_common::error::KestrelError;

    use crate::schema::Field;
    use crate::types::DataType;

    fn empty_batch() -> RecordBatch {
        RecordBatch::empty(Arc::new(Schema::new(vec![Field::nullable(
            "a",
            DataType::Int,
        )])))
    }

    #[test]
    fn test_outcome_kind() {
        assert_eq!(Outcome::NewSchema(empty_batch()).kind(), OutcomeKind::NewSchema);
        assert_eq!(Outcome::Data(empty_batch()).kind(), OutcomeKind::HasData);
        assert_eq!(Outcome::EndOfGroup(empty_batch()).kind(), OutcomeKind::EndOfGroup);
        assert_eq!(Outcome::NotYet.kind(), OutcomeKind::NotYet);
        assert_eq!(Outcome::EndOfStream.kind(), OutcomeKind::EndOfStream);
    }

    #[test]
    fn test_batch_only_on_data_outcomes() {
        assert!(Outcome::EndOfGroup(empty_batch()).is_data_bearing());
        assert!(!Outcome::NotYet.is_data_bearing());
        assert!(Outcome::EndOfStream.into_batch().is_none());
        assert_eq!(Outcome::EndOfStream.record_count(), 0);
    }

    #[test]
    fn test_kind_of_result() {
        let failed: KestrelResult<Outcome> = Err(KestrelError::internal("boom"));
        assert_eq!(OutcomeKind::of(&failed), OutcomeKind::Failure);
        assert_eq!(OutcomeKind::of(&Ok(Outcome::NotYet)), OutcomeKind::NotYet);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(OutcomeKind::EndOfGroup.to_string(), "END_OF_GROUP");
        assert_eq!(OutcomeKind::NotYet.to_string(), "NO_DATA_YET");
    }
}
