//! Lateral cursor contract.

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::batch::RecordBatch;

/// Read-only view of the lateral join's position.
pub trait LateralContract: fmt::Debug {
    /// Index of the outer row currently being expanded.
    fn record_index(&self) -> usize;

    /// The outer batch being joined, or `None` once the outer side is done.
    fn incoming(&self) -> Option<RecordBatch>;

    /// Changes every time a new outer batch is installed.
    fn incoming_generation(&self) -> u64;
}

/// Single-threaded lateral cursor.
///
/// The owner writes through `&self`; unnest operators only see it as a
/// [`LateralContract`].
#[derive(Debug, Default)]
pub struct LateralCursor {
    row: Cell<usize>,
    generation: Cell<u64>,
    incoming: RefCell<Option<RecordBatch>>,
}

impl LateralCursor {
    /// Creates a cursor with no outer batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new outer batch and rewinds to its first row.
    pub fn set_incoming(&self, batch: RecordBatch) {
        *self.incoming.borrow_mut() = Some(batch);
        self.row.set(0);
        self.generation.set(self.generation.get() + 1);
    }

    /// Moves to the next outer row. Returns false past the last row.
    pub fn advance_row(&self) -> bool {
        let next = self.row.get() + 1;
        self.row.set(next);
        self.incoming
            .borrow()
            .as_ref()
            .map_or(false, |b| next < b.num_rows())
    }

    /// Positions the cursor on `row`.
    pub fn set_row(&self, row: usize) {
        self.row.set(row);
    }

    /// Marks the outer side as exhausted.
    pub fn finish(&self) {
        *self.incoming.borrow_mut() = None;
    }
}

impl LateralContract for LateralCursor {
    fn record_index(&self) -> usize {
        self.row.get()
    }

    fn incoming(&self) -> Option<RecordBatch> {
        self.incoming.borrow().clone()
    }

    fn incoming_generation(&self) -> u64 {
        self.generation.get()
    }
}
