//! Shared fixtures for the operator integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use kestrel_exec::expr::{AggregateExpr, NamedExpr, PhysicalExpr};
use kestrel_exec::aggregate::StreamingAggregateConfig;
use kestrel_exec::{
    DataType, Field, Operator, Outcome, OutcomeKind, RecordBatch, Row, Schema, Value,
};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a `fmt` subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// `(id_left INT, cost_left INT, name_left TEXT)`
pub fn input_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::not_null("id_left", DataType::Int),
        Field::not_null("cost_left", DataType::Int),
        Field::nullable("name_left", DataType::Text),
    ]))
}

/// Builds an input batch from `(id, cost, name)` triples.
pub fn input(rows: &[(i32, i32, &str)]) -> RecordBatch {
    let rows: Vec<Row> = rows
        .iter()
        .map(|&(id, cost, name)| Row::new(vec![Value::int(id), Value::int(cost), Value::string(name)]))
        .collect();
    RecordBatch::from_rows(input_schema(), &rows).unwrap()
}

/// A zero-row input batch.
pub fn empty() -> RecordBatch {
    RecordBatch::empty(input_schema())
}

/// The single-row batch `(1, 10, "item1")`.
pub fn item1() -> RecordBatch {
    input(&[(1, 10, "item1")])
}

/// `GROUP BY name_left AS name` with `sum(id_left + cost_left) AS total_sum`.
pub fn sum_by_name() -> StreamingAggregateConfig {
    StreamingAggregateConfig::new(
        vec![NamedExpr::new(PhysicalExpr::col("name_left"), "name")],
        vec![AggregateExpr::sum(
            PhysicalExpr::plus(PhysicalExpr::col("id_left"), PhysicalExpr::col("cost_left")),
            "total_sum",
        )],
    )
}

/// Expected `(name, total_sum)` output rows.
pub fn totals(rows: &[(&str, i64)]) -> Vec<Row> {
    rows.iter()
        .map(|&(name, total)| Row::new(vec![Value::string(name), Value::BigInt(total)]))
        .collect()
}

/// Returns the rows carried by an outcome.
pub fn rows_of(outcome: &Outcome) -> Vec<Row> {
    outcome.batch().map(|b| b.rows().collect()).unwrap_or_default()
}

/// Advances `op` until `EndOfStream`, returning each outcome kind with its rows.
///
/// Panics after `limit` outcomes so a broken terminal state cannot hang a test.
pub fn drain(op: &mut dyn Operator, limit: usize) -> Vec<(OutcomeKind, Vec<Row>)> {
    let mut seen = Vec::new();
    for _ in 0..limit {
        let outcome = op.advance().unwrap();
        let kind = outcome.kind();
        seen.push((kind, rows_of(&outcome)));
        if kind == OutcomeKind::EndOfStream {
            return seen;
        }
    }
    panic!("no EndOfStream after {} outcomes: {:?}", limit, seen);
}

/// Returns only the kinds of `outcomes`.
pub fn kinds(outcomes: &[(OutcomeKind, Vec<Row>)]) -> Vec<OutcomeKind> {
    outcomes.iter().map(|(k, _)| *k).collect()
}
