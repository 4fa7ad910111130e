//! Unnest operator.

use std::rc::Rc;
use std::sync::Arc;

use kestrel_common::error::{KestrelError, KestrelResult};
use tracing::{debug, trace, warn};

use super::config::UnnestConfig;
use super::kernel::Unnest;
use super::lateral::LateralContract;
use crate::batch::RecordBatch;
use crate::context::OperatorContext;
use crate::outcome::{Operator, OperatorState, Outcome};
use crate::schema::Schema;

/// Operator expanding the lateral join's current outer row.
///
/// Each outer batch installed on the lateral cursor is announced once
/// (`NewSchema` when the output shape changes). After that every call
/// expands the current outer row: `Data` while inner values remain, then
/// `EndOfGroup` on the call that drains the row, which tells the lateral
/// join to move its cursor.
#[derive(Debug)]
pub struct UnnestExec {
    config: UnnestConfig,
    lateral: Rc<dyn LateralContract>,
    ctx: OperatorContext,
    kernel: Unnest,
    /// Generation of the outer batch the kernel is bound to.
    generation: Option<u64>,
    /// Output container refilled by the kernel.
    output: Option<RecordBatch>,
    output_schema: Option<Arc<Schema>>,
    state: OperatorState,
    record_count: usize,
}

impl UnnestExec {
    /// Creates an unnest operator reading its position from `lateral`.
    pub fn new(
        config: UnnestConfig,
        lateral: Rc<dyn LateralContract>,
        ctx: OperatorContext,
    ) -> KestrelResult<Self> {
        config.validate()?;
        let mut kernel = Unnest::new();
        kernel.set_output_row_cap(config.output_row_cap);

        Ok(Self {
            config,
            lateral,
            ctx,
            kernel,
            generation: None,
            output: None,
            output_schema: None,
            state: OperatorState::Running,
            record_count: 0,
        })
    }

    /// Restarts the current outer row at inner index 0.
    pub fn reset_progress(&mut self) {
        self.kernel.reset_progress();
    }

    fn next_outcome(&mut self) -> KestrelResult<Outcome> {
        let Some(incoming) = self.lateral.incoming() else {
            debug!(operator = self.name(), "outer side finished");
            self.state = OperatorState::Finished;
            self.release();
            return Ok(Outcome::EndOfStream);
        };

        let generation = self.lateral.incoming_generation();
        if self.generation != Some(generation) {
            self.generation = Some(generation);
            if let Some(schema) = self.bind(&incoming)? {
                return Ok(Outcome::NewSchema(RecordBatch::empty(schema)));
            }
        }

        let requested = self.ctx.output_batch_rows();
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| KestrelError::internal("unnest output container missing"))?;
        if incoming.num_rows() == 0 {
            // no outer row to expand; close the (empty) group
            return Ok(Outcome::EndOfGroup(output.take_batch()));
        }
        self.kernel.unnest_records(requested, output)?;
        let batch = output.take_batch();

        if self.kernel.is_row_drained() {
            Ok(Outcome::EndOfGroup(batch))
        } else {
            Ok(Outcome::Data(batch))
        }
    }

    /// Binds the kernel to a new outer batch.
    ///
    /// Returns the output schema if it has to be announced.
    fn bind(&mut self, incoming: &RecordBatch) -> KestrelResult<Option<Arc<Schema>>> {
        self.kernel
            .setup(incoming.selection_mode(), Rc::clone(&self.lateral))?;

        let name = &self.config.unnest_field;
        let column = incoming
            .column_by_name(name)
            .ok_or_else(|| KestrelError::missing_column(name.clone(), "incoming batch"))?;
        self.kernel.set_unnest_field(column)?;

        let field = self
            .kernel
            .output_field()
            .cloned()
            .ok_or_else(|| KestrelError::internal("unnest field not bound"))?;
        let schema = Arc::new(Schema::new(vec![field]));
        self.output = Some(RecordBatch::empty(Arc::clone(&schema)));

        debug!(
            operator = self.name(),
            field = %name,
            outer_rows = incoming.num_rows(),
            "outer batch bound"
        );

        if self.output_schema.as_deref() == Some(schema.as_ref()) {
            return Ok(None);
        }
        self.output_schema = Some(Arc::clone(&schema));
        Ok(Some(schema))
    }

    fn release(&mut self) {
        self.kernel.close();
        self.output = None;
    }
}

impl Operator for UnnestExec {
    fn name(&self) -> &'static str {
        "UnnestExec"
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
                self.release();
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
        self.release();
        self.state = OperatorState::Closed;
        debug!(operator = self.name(), "closed");
    }
}
