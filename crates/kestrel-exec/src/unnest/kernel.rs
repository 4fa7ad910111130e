//! Unnest kernel.

use std::rc::Rc;

use kestrel_common::constants::{MAX_ROW_COUNT, MIN_OUTPUT_ROWS};
use kestrel_common::error::{KestrelError, KestrelResult};
use tracing::debug;

use super::lateral::LateralContract;
use crate::batch::{RecordBatch, SchemaChangeCallback, SelectionVectorMode};
use crate::schema::Field;
use crate::vector::{Column, RepeatedVector, TransferPair};

/// How far the current outer row has been expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    NotStarted,
    Row { row: usize, inner_index: usize },
}

/// Expands the inner values of one outer row at a time into an output batch.
///
/// The outer row is re-read from the lateral contract on every call. If the
/// output cap stops an expansion early, the next call for the same row
/// resumes where it left off; a different row starts over at inner index 0.
#[derive(Debug)]
pub struct Unnest {
    lateral: Option<Rc<dyn LateralContract>>,
    field: Option<RepeatedVector>,
    transfer: Option<TransferPair>,
    output_row_cap: usize,
    progress: Progress,
}

impl Default for Unnest {
    fn default() -> Self {
        Self::new()
    }
}

impl Unnest {
    /// Creates a kernel with the maximum output cap.
    pub fn new() -> Self {
        Self {
            lateral: None,
            field: None,
            transfer: None,
            output_row_cap: MAX_ROW_COUNT,
            progress: Progress::NotStarted,
        }
    }

    /// Binds the kernel to the incoming selection mode and lateral cursor.
    pub fn setup(
        &mut self,
        incoming_mode: SelectionVectorMode,
        lateral: Rc<dyn LateralContract>,
    ) -> KestrelResult<()> {
        if incoming_mode != SelectionVectorMode::None {
            return Err(KestrelError::UnsupportedSelectionVector {
                operator: "Unnest".to_string(),
                mode: incoming_mode.to_string(),
            });
        }
        self.lateral = Some(lateral);
        Ok(())
    }

    /// Sets the repeated column to expand and resets progress.
    pub fn set_unnest_field(&mut self, column: &Column) -> KestrelResult<()> {
        let repeated = column.as_repeated()?;
        let inner = repeated.inner();
        let target = Field::nullable(repeated.name(), inner.data_type().clone());
        self.transfer = Some(TransferPair::new(inner, target)?);
        self.field = Some(repeated.clone());
        self.progress = Progress::NotStarted;
        Ok(())
    }

    /// Returns the repeated column being expanded.
    pub fn unnest_field(&self) -> Option<&RepeatedVector> {
        self.field.as_ref()
    }

    /// Returns the field of the produced column.
    pub fn output_field(&self) -> Option<&Field> {
        self.transfer.as_ref().map(TransferPair::target_field)
    }

    /// Sets the maximum number of rows produced per call.
    pub fn set_output_row_cap(&mut self, cap: usize) {
        self.output_row_cap = cap.max(MIN_OUTPUT_ROWS);
    }

    /// Returns the output cap.
    pub fn output_row_cap(&self) -> usize {
        self.output_row_cap
    }

    /// Moves up to `requested` inner values of the current outer row into
    /// `outgoing` and returns how many were moved.
    ///
    /// `outgoing` must already hold a column matching [`Self::output_field`];
    /// its record count is set to the returned count.
    pub fn unnest_records(
        &mut self,
        requested: usize,
        outgoing: &mut RecordBatch,
    ) -> KestrelResult<usize> {
        let (Some(lateral), Some(field), Some(pair)) =
            (self.lateral.as_ref(), self.field.as_ref(), self.transfer.as_mut())
        else {
            return Err(KestrelError::internal("unnest used before setup"));
        };

        let current_record = lateral.record_index();
        let accessor = field.accessor();
        if current_record >= accessor.value_count() {
            return Err(KestrelError::invalid_argument(format!(
                "lateral row {} out of range for '{}' with {} rows",
                current_record,
                field.name(),
                accessor.value_count()
            )));
        }

        let inner_value_count = accessor.inner_value_count_at(current_record);
        let already = match self.progress {
            Progress::Row { row, inner_index } if row == current_record => inner_index,
            _ => 0,
        };
        let count = inner_value_count
            .saturating_sub(already)
            .min(self.output_row_cap)
            .min(requested);

        debug!(
            current_record,
            inner_value_count,
            record_count = requested,
            output_limit = self.output_row_cap,
            already,
            count,
            "unnest"
        );

        pair.split_and_transfer(accessor.offset_at(current_record) + already, count)?;
        let target = pair.target_field().clone();

        if let Some(existing) = outgoing.column_by_name(&target.name) {
            if existing.data_type() != &target.data_type {
                return Err(KestrelError::TypeMismatch {
                    column: target.name.clone(),
                    expected: target.data_type.to_string(),
                    actual: existing.data_type().to_string(),
                });
            }
        }

        let mut callback = SchemaChangeCallback::new();
        let column = outgoing.add_or_get(&target, &mut callback);
        if callback.schema_changed() {
            return Err(KestrelError::missing_column(target.name, "outgoing batch"));
        }
        match column {
            Column::Flat(dst) => pair.target_mut().transfer_to(dst)?,
            Column::Repeated(dst) => {
                return Err(KestrelError::TypeMismatch {
                    column: target.name.clone(),
                    expected: target.data_type.to_string(),
                    actual: dst.field().data_type.to_string(),
                })
            }
        }
        outgoing.set_record_count(count)?;

        self.progress = Progress::Row {
            row: current_record,
            inner_index: already + count,
        };
        Ok(count)
    }

    /// Returns true once every inner value of the current outer row has
    /// been produced.
    pub fn is_row_drained(&self) -> bool {
        match (self.progress, self.field.as_ref(), self.lateral.as_ref()) {
            (Progress::Row { row, inner_index }, Some(field), Some(lateral))
                if row == lateral.record_index() =>
            {
                inner_index >= field.accessor().inner_value_count_at(row)
            }
            _ => false,
        }
    }

    /// Restarts the next expansion at inner index 0.
    pub fn reset_progress(&mut self) {
        self.progress = Progress::NotStarted;
    }

    /// Releases the transfer pair and the bound column. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut pair) = self.transfer.take() {
            pair.clear();
        }
        self.field = None;
        self.progress = Progress::NotStarted;
    }
}
