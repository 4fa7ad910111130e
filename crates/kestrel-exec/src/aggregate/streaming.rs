//! Streaming aggregate operator.

use std::sync::Arc;

use kestrel_common::error::{KestrelError, KestrelResult};
use kestrel_common::memory::Reservation;
use tracing::{debug, trace, warn};

use super::config::{output_row_cap, validate_fraction, StreamingAggregateConfig};
use super::strategy::{AccumulatorSet, Aggregator};
use crate::batch::{RecordBatch, SelectionVectorMode};
use crate::context::OperatorContext;
use crate::outcome::{Operator, OperatorState, Outcome, OutcomeKind};
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;

/// Upstream batch being consumed, with the position of the next row.
#[derive(Debug)]
struct InputCursor {
    batch: RecordBatch,
    position: usize,
    closes_group: bool,
}

/// Group aggregation over input sorted by the grouping key.
///
/// Output is announced with a zero-row `NewSchema`, then:
///
/// - finalized groups are buffered until the output-row cap is hit
///   (`Data`), an upstream group boundary arrives (`EndOfGroup`, carrying
///   the buffered rows) or upstream ends (`Data`, then `EndOfStream`);
/// - a group spread over several upstream `Data` batches accumulates
///   continuously;
/// - every upstream `EndOfGroup` surfaces as exactly one downstream
///   `EndOfGroup`, even when it carries no rows.
#[derive(Debug)]
pub struct StreamingAggExec {
    /// Child operator.
    child: Box<dyn Operator>,
    /// Accumulation strategy.
    aggregator: Box<dyn Aggregator>,
    /// Execution context.
    ctx: OperatorContext,
    /// Maximum rows per output batch.
    output_row_cap: usize,
    /// Schema the aggregator is currently bound to.
    input_schema: Option<Arc<Schema>>,
    /// Announced output schema.
    output_schema: Option<Arc<Schema>>,
    /// Batch being consumed.
    input: Option<InputCursor>,
    /// Upstream outcome held back until pending output is flushed.
    stashed: Option<(OutcomeKind, RecordBatch)>,
    /// Key of the group being accumulated.
    open_group: Option<Vec<Value>>,
    /// Finalized rows not yet handed downstream.
    output_rows: Vec<Row>,
    /// A group was finalized since the last boundary.
    group_emitted: bool,
    /// Upstream has sent at least one `EndOfGroup`.
    boundary_seen: bool,
    /// Memory charged for `output_rows`.
    reservation: Option<Reservation>,
    /// Upstream returned `EndOfStream`.
    upstream_done: bool,
    state: OperatorState,
    record_count: usize,
}

impl StreamingAggExec {
    /// Creates a streaming aggregate from its configuration.
    pub fn new(
        child: Box<dyn Operator>,
        config: StreamingAggregateConfig,
        ctx: OperatorContext,
    ) -> KestrelResult<Self> {
        config.validate()?;
        let fraction = config.output_batch_size_fraction;
        let aggregator = AccumulatorSet::new(config.group_by, config.aggregates);
        Self::with_aggregator(child, Box::new(aggregator), fraction, ctx)
    }

    /// Creates a streaming aggregate with a custom strategy.
    pub fn with_aggregator(
        child: Box<dyn Operator>,
        aggregator: Box<dyn Aggregator>,
        output_batch_size_fraction: f32,
        ctx: OperatorContext,
    ) -> KestrelResult<Self> {
        validate_fraction(output_batch_size_fraction)?;
        let output_row_cap = output_row_cap(ctx.output_batch_rows(), output_batch_size_fraction);

        Ok(Self {
            child,
            aggregator,
            ctx,
            output_row_cap,
            input_schema: None,
            output_schema: None,
            input: None,
            stashed: None,
            open_group: None,
            output_rows: Vec::new(),
            group_emitted: false,
            boundary_seen: false,
            reservation: None,
            upstream_done: false,
            state: OperatorState::Running,
            record_count: 0,
        })
    }

    /// Returns the maximum number of rows per output batch.
    pub fn output_row_cap(&self) -> usize {
        self.output_row_cap
    }

    fn buffer_full(&self) -> bool {
        self.output_rows.len() >= self.output_row_cap
    }

    fn next_outcome(&mut self) -> KestrelResult<Outcome> {
        loop {
            if let Some(mut cursor) = self.input.take() {
                if !self.consume(&mut cursor)? {
                    self.input = Some(cursor);
                    return self.flush(Outcome::Data);
                }
                if !cursor.closes_group {
                    continue;
                }
                self.open_default_group();
                if self.open_group.is_some() && self.buffer_full() {
                    // no room for the open group's row; keep the boundary
                    self.input = Some(cursor);
                    return self.flush(Outcome::Data);
                }
                self.close_open_group()?;
                self.aggregator.initialize();
                self.group_emitted = false;
                self.boundary_seen = true;
                debug!(
                    operator = self.name(),
                    rows = self.output_rows.len(),
                    "group boundary"
                );
                return self.flush(Outcome::EndOfGroup);
            }

            if self.upstream_done {
                if !self.boundary_seen {
                    self.open_default_group();
                }
                if self.open_group.is_some() && self.buffer_full() {
                    return self.flush(Outcome::Data);
                }
                self.close_open_group()?;
                if !self.output_rows.is_empty() {
                    return self.flush(Outcome::Data);
                }
                self.state = OperatorState::Finished;
                self.release_output();
                return Ok(Outcome::EndOfStream);
            }

            let (kind, batch) = match self.stashed.take() {
                Some(pending) => pending,
                None => match self.child.advance()? {
                    Outcome::NotYet => return Ok(Outcome::NotYet),
                    Outcome::EndOfStream => {
                        debug!(operator = self.name(), "upstream finished");
                        self.upstream_done = true;
                        continue;
                    }
                    Outcome::NewSchema(batch) => (OutcomeKind::NewSchema, batch),
                    Outcome::Data(batch) => (OutcomeKind::HasData, batch),
                    Outcome::EndOfGroup(batch) => (OutcomeKind::EndOfGroup, batch),
                },
            };

            let mode = batch.selection_mode();
            if mode != SelectionVectorMode::None {
                return Err(KestrelError::UnsupportedSelectionVector {
                    operator: self.name().to_string(),
                    mode: mode.to_string(),
                });
            }

            let schema_changed = self.input_schema.as_deref() != Some(batch.schema().as_ref());
            if schema_changed && (self.open_group.is_some() || !self.output_rows.is_empty()) {
                // finish everything built under the old schema first
                self.stashed = Some((kind, batch));
                if !self.buffer_full() {
                    self.close_open_group()?;
                }
                return self.flush(Outcome::Data);
            }

            if schema_changed {
                let output = self.aggregator.setup(batch.schema())?;
                debug!(
                    operator = self.name(),
                    input = %batch.schema(),
                    output = %output,
                    "aggregate layout rebuilt"
                );
                self.input_schema = Some(Arc::clone(batch.schema()));
                self.output_schema = Some(Arc::clone(&output));
                if kind == OutcomeKind::NewSchema {
                    self.set_input(batch, false);
                } else {
                    self.stashed = Some((kind, batch));
                }
                return Ok(Outcome::NewSchema(RecordBatch::empty(output)));
            }

            match kind {
                OutcomeKind::NewSchema => {
                    self.set_input(batch, false);
                    return Ok(Outcome::NewSchema(RecordBatch::empty(self.require_output_schema()?)));
                }
                OutcomeKind::EndOfGroup => self.set_input(batch, true),
                _ => self.set_input(batch, false),
            }
        }
    }

    fn set_input(&mut self, batch: RecordBatch, closes_group: bool) {
        trace!(
            operator = self.name(),
            rows = batch.num_rows(),
            closes_group,
            "input batch"
        );
        self.input = Some(InputCursor {
            batch,
            position: 0,
            closes_group,
        });
    }

    /// Folds rows of `cursor` into groups.
    ///
    /// Returns false if it stopped before a row that opens a new group
    /// because the output buffer is full; that row is left unconsumed.
    fn consume(&mut self, cursor: &mut InputCursor) -> KestrelResult<bool> {
        while cursor.position < cursor.batch.num_rows() {
            let row = cursor.batch.row(cursor.position).ok_or_else(|| {
                KestrelError::internal(format!("input row {} unreadable", cursor.position))
            })?;
            let key = self.aggregator.group_key(&row)?;

            if self.open_group.as_ref() != Some(&key) {
                if self.open_group.is_some() && self.buffer_full() {
                    return Ok(false);
                }
                self.close_open_group()?;
                self.open_group = Some(key);
            }

            self.aggregator.accumulate_row(&row)?;
            cursor.position += 1;
        }
        Ok(true)
    }

    /// Opens the empty-key group of a global aggregate that has produced
    /// nothing since the last boundary, so the group still yields a row.
    fn open_default_group(&mut self) {
        if self.aggregator.has_grouping_keys()
            || self.open_group.is_some()
            || self.group_emitted
            || self.output_schema.is_none()
        {
            return;
        }
        self.open_group = Some(Vec::new());
    }

    /// Moves the open group's result into the output buffer.
    fn close_open_group(&mut self) -> KestrelResult<()> {
        let Some(key) = self.open_group.take() else {
            return Ok(());
        };
        let row = self.aggregator.finalize_group(key)?;
        self.charge(row.estimated_size())?;
        trace!(operator = self.name(), row = %row, "group finalized");
        self.output_rows.push(row);
        self.group_emitted = true;
        Ok(())
    }

    fn charge(&mut self, bytes: usize) -> KestrelResult<()> {
        match self.reservation.as_mut() {
            Some(reservation) => reservation.grow(bytes),
            None => {
                self.reservation = Some(self.ctx.reserve(bytes)?);
                Ok(())
            }
        }
    }

    fn flush(&mut self, wrap: fn(RecordBatch) -> Outcome) -> KestrelResult<Outcome> {
        let schema = self.require_output_schema()?;
        let rows = std::mem::take(&mut self.output_rows);
        let batch = RecordBatch::from_rows(schema, &rows)?;
        self.reservation = None;
        Ok(wrap(batch))
    }

    fn require_output_schema(&self) -> KestrelResult<Arc<Schema>> {
        self.output_schema
            .clone()
            .ok_or_else(|| KestrelError::internal("output schema not yet built"))
    }

    fn release_output(&mut self) {
        self.input = None;
        self.stashed = None;
        self.open_group = None;
        self.output_rows.clear();
        self.reservation = None;
    }
}

impl Operator for StreamingAggExec {
    fn name(&self) -> &'static str {
        "StreamingAggExec"
    }

    fn schema(&self) -> Option<Arc<Schema>> {
        self.output_schema.clone()
    }

    fn advance(&mut self) -> KestrelResult<Outcome> {
        match self.state {
            OperatorState::Running => {}
            OperatorState::Finished => return Ok(Outcome::EndOfStream),
            OperatorState::Failed => {
                return Err(KestrelError::internal(format!(
                    "{} advanced after failure",
                    self.name()
                )))
            }
            OperatorState::Closed => {
                return Err(KestrelError::internal(format!(
                    "{} advanced after close",
                    self.name()
                )))
            }
        }

        match self.next_outcome() {
            Ok(outcome) => {
                self.record_count = outcome.record_count();
                trace!(
                    operator = self.name(),
                    outcome = %outcome.kind(),
                    rows = self.record_count,
                    "advance"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(operator = self.name(), error = %e, "advance failed");
                self.state = OperatorState::Failed;
                self.record_count = 0;
                self.release_output();
                Err(e)
            }
        }
    }

    fn record_count(&self) -> usize {
        self.record_count
    }

    fn close(&mut self) {
        if self.state == OperatorState::Closed {
            return;
        }
        self.release_output();
        self.child.close();
        self.state = OperatorState::Closed;
        debug!(operator = self.name(), "closed");
    }
}
