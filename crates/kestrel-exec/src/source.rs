//! Scripted upstream operator.
//!
//! [`ReplayExec`] plays back a fixed list of outcomes exactly as given, so
//! tests can drive an operator through any upstream protocol sequence,
//! including sequences a well-behaved producer would never emit.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use kestrel_common::error::{KestrelError, KestrelResult};
use tracing::trace;

use crate::outcome::{Operator, Outcome};
use crate::schema::Schema;

/// Replays a list of outcomes, then `EndOfStream` forever.
#[derive(Debug)]
pub struct ReplayExec {
    steps: VecDeque<Outcome>,
    failure: Option<KestrelError>,
    schema: Option<Arc<Schema>>,
    record_count: usize,
    closed: Rc<Cell<bool>>,
}

impl ReplayExec {
    /// Creates a source replaying `steps`.
    pub fn new(steps: Vec<Outcome>) -> Self {
        Self {
            steps: steps.into(),
            failure: None,
            schema: None,
            record_count: 0,
            closed: Rc::new(Cell::new(false)),
        }
    }

    /// Fails with `error` once every step has been replayed.
    #[must_use]
    pub fn then_fail(mut self, error: KestrelError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Returns a handle that observes `close()` after the source is boxed.
    pub fn close_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.closed)
    }

    /// Returns the number of steps not yet replayed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl Operator for ReplayExec {
    fn name(&self) -> &'static str {
        "ReplayExec"
    }

    fn schema(&self) -> Option<Arc<Schema>> {
        self.schema.clone()
    }

    fn advance(&mut self) -> KestrelResult<Outcome> {
        let outcome = match self.steps.pop_front() {
            Some(outcome) => outcome,
            None => match self.failure.take() {
                Some(error) => return Err(error),
                None => Outcome::EndOfStream,
            },
        };

        if let Some(batch) = outcome.batch() {
            self.schema = Some(Arc::clone(batch.schema()));
        }
        self.record_count = outcome.record_count();
        trace!(
            operator = self.name(),
            outcome = %outcome.kind(),
            rows = self.record_count,
            "replay"
        );
        Ok(outcome)
    }

    fn record_count(&self) -> usize {
        self.record_count
    }

    fn close(&mut self) {
        self.steps.clear();
        self.closed.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RecordBatch;
    use crate::outcome::OutcomeKind;
    use crate::schema::Field;
    use crate::types::DataType;

    fn empty() -> RecordBatch {
        RecordBatch::empty(Arc::new(Schema::new(vec![Field::nullable("a", DataType::Int)])))
    }

    #[test]
    fn test_replays_in_order_then_ends() {
        let mut source = ReplayExec::new(vec![
            Outcome::NewSchema(empty()),
            Outcome::EndOfGroup(empty()),
        ]);
        assert!(source.schema().is_none());
        assert_eq!(source.advance().unwrap().kind(), OutcomeKind::NewSchema);
        assert!(source.schema().is_some());
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.advance().unwrap().kind(), OutcomeKind::EndOfGroup);
        assert_eq!(source.advance().unwrap().kind(), OutcomeKind::EndOfStream);
        assert_eq!(source.advance().unwrap().kind(), OutcomeKind::EndOfStream);
    }

    #[test]
    fn test_then_fail() {
        let mut source = ReplayExec::new(Vec::new()).then_fail(KestrelError::internal("boom"));
        assert!(source.advance().is_err());
        assert_eq!(source.advance().unwrap().kind(), OutcomeKind::EndOfStream);
    }

    #[test]
    fn test_close_flag() {
        let mut source = ReplayExec::new(vec![Outcome::NotYet]);
        let flag = source.close_flag();
        source.close();
        assert!(source.is_closed());
        assert!(flag.get());
        assert_eq!(source.remaining(), 0);
    }
}
