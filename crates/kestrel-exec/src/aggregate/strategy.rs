//! Pluggable accumulation strategy for the streaming aggregate.

use std::fmt;
use std::sync::Arc;

use kestrel_common::error::{KestrelError, KestrelResult};

use crate::accumulator::Accumulator;
use crate::evaluator::evaluate_expr;
use crate::expr::{AggregateExpr, AggregateFunc, NamedExpr, PhysicalExpr};
use crate::row::Row;
use crate::schema::{Field, Schema};
use crate::value::Value;

/// Per-group accumulation used by [`super::StreamingAggExec`].
///
/// The operator owns group detection and flushing; an `Aggregator` only
/// knows how to key, fold and finalize rows.
pub trait Aggregator: fmt::Debug {
    /// Rebuilds the layout for a new input schema and returns the output schema.
    fn setup(&mut self, input: &Schema) -> KestrelResult<Arc<Schema>>;

    /// Returns false for a global aggregate, which yields one row per group
    /// even when the group saw no input.
    fn has_grouping_keys(&self) -> bool;

    /// Evaluates the grouping key of `row`.
    fn group_key(&self, row: &Row) -> KestrelResult<Vec<Value>>;

    /// Discards all accumulated state.
    fn initialize(&mut self);

    /// Folds `row` into the open group.
    fn accumulate_row(&mut self, row: &Row) -> KestrelResult<()>;

    /// Produces the output row of the open group and starts a fresh one.
    fn finalize_group(&mut self, key: Vec<Value>) -> KestrelResult<Row>;
}

/// Expressions bound to the current input schema.
#[derive(Debug, Clone)]
struct BoundExprs {
    keys: Vec<PhysicalExpr>,
    args: Vec<Option<PhysicalExpr>>,
}

/// Table-driven [`Aggregator`]: one [`Accumulator`] per aggregate expression.
#[derive(Debug, Clone)]
pub struct AccumulatorSet {
    group_by: Vec<NamedExpr>,
    aggregates: Vec<AggregateExpr>,
    bound: Option<BoundExprs>,
    accumulators: Vec<Accumulator>,
}

impl AccumulatorSet {
    /// Creates an unbound set.
    pub fn new(group_by: Vec<NamedExpr>, aggregates: Vec<AggregateExpr>) -> Self {
        let accumulators = aggregates.iter().map(|a| Accumulator::new(a.func)).collect();
        Self {
            group_by,
            aggregates,
            bound: None,
            accumulators,
        }
    }

    fn bound(&self) -> KestrelResult<&BoundExprs> {
        self.bound
            .as_ref()
            .ok_or_else(|| KestrelError::internal("aggregator used before setup"))
    }
}

impl Aggregator for AccumulatorSet {
    fn setup(&mut self, input: &Schema) -> KestrelResult<Arc<Schema>> {
        let mut fields = Vec::with_capacity(self.group_by.len() + self.aggregates.len());
        let mut keys = Vec::with_capacity(self.group_by.len());
        for named in &self.group_by {
            keys.push(named.expr.bind(input)?);
            fields.push(Field::nullable(named.name.clone(), named.expr.data_type(input)?));
        }

        let mut args = Vec::with_capacity(self.aggregates.len());
        for agg in &self.aggregates {
            let arg = match (agg.func, agg.args.first()) {
                (AggregateFunc::CountStar, _) => None,
                (_, Some(arg)) => Some(arg),
                (func, None) => {
                    return Err(KestrelError::invalid_config(format!(
                        "{} requires an argument",
                        func
                    )))
                }
            };
            let input_type = arg.map(|a| a.data_type(input)).transpose()?;
            fields.push(Field::nullable(
                agg.name.clone(),
                agg.func.return_type(input_type.as_ref()),
            ));
            args.push(arg.map(|a| a.bind(input)).transpose()?);
        }

        self.bound = Some(BoundExprs { keys, args });
        self.initialize();
        Ok(Arc::new(Schema::new(fields)))
    }

    fn has_grouping_keys(&self) -> bool {
        !self.group_by.is_empty()
    }

    fn group_key(&self, row: &Row) -> KestrelResult<Vec<Value>> {
        self.bound()?
            .keys
            .iter()
            .map(|e| evaluate_expr(e, row).map_err(KestrelError::from))
            .collect()
    }

    fn initialize(&mut self) {
        for acc in &mut self.accumulators {
            acc.reset();
        }
    }

    fn accumulate_row(&mut self, row: &Row) -> KestrelResult<()> {
        let bound = self
            .bound
            .as_ref()
            .ok_or_else(|| KestrelError::internal("aggregator used before setup"))?;

        for (acc, arg) in self.accumulators.iter_mut().zip(&bound.args) {
            let value = match arg {
                Some(expr) => evaluate_expr(expr, row)?,
                // COUNT(*) doesn't need an argument
                None => Value::int(1),
            };
            acc.accumulate(&value)?;
        }
        Ok(())
    }

    fn finalize_group(&mut self, key: Vec<Value>) -> KestrelResult<Row> {
        let mut row = Row::new(key);
        for acc in &mut self.accumulators {
            row.push(acc.result());
            acc.reset();
        }
        Ok(row)
    }
}
