//! Unnest driven by a lateral cursor.

mod support;

use std::rc::Rc;
use std::sync::Arc;

use kestrel_common::{ErrorCategory, KestrelError};
use kestrel_exec::unnest::{LateralContract, LateralCursor, Unnest, UnnestConfig, UnnestExec};
use kestrel_exec::{
    Column, DataType, Field, Operator, OperatorContext, OutcomeKind, RecordBatch, Row, Schema,
    SelectionVectorMode, Value,
};

use support::{drain, init_tracing, kinds};

fn items_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::not_null("id", DataType::Int),
        Field::nullable("items", DataType::array(DataType::Int)),
    ]))
}

/// One outer row per list, with ids counting from `first_id`.
fn outer(first_id: i32, lists: &[&[i32]]) -> RecordBatch {
    let rows: Vec<Row> = lists
        .iter()
        .enumerate()
        .map(|(i, list)| {
            Row::new(vec![
                Value::int(first_id + i as i32),
                Value::list(list.iter().map(|&v| Value::int(v))),
            ])
        })
        .collect();
    RecordBatch::from_rows(items_schema(), &rows).unwrap()
}

fn outgoing() -> RecordBatch {
    RecordBatch::empty(Arc::new(Schema::new(vec![Field::nullable(
        "items",
        DataType::Int,
    )])))
}

fn values(batch: &RecordBatch) -> Vec<i64> {
    batch
        .rows()
        .filter_map(|r| r.get(0).and_then(Value::to_i64))
        .collect()
}

/// A kernel bound to the `items` column of `batch`.
fn kernel(batch: &RecordBatch, cursor: &Rc<LateralCursor>, cap: usize) -> Unnest {
    init_tracing();
    let lateral: Rc<dyn LateralContract> = cursor.clone();
    let mut unnest = Unnest::new();
    unnest.setup(batch.selection_mode(), lateral).unwrap();
    unnest
        .set_unnest_field(batch.column_by_name("items").unwrap())
        .unwrap();
    unnest.set_output_row_cap(cap);
    unnest
}

// =============================================================================
// Kernel
// =============================================================================

#[test]
fn test_seven_values_cap_three() {
    let batch = outer(1, &[&[1, 2, 3, 4, 5, 6, 7]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 3);

    let mut out = outgoing();
    let mut counts = Vec::new();
    let mut seen = Vec::new();
    while !unnest.is_row_drained() {
        counts.push(unnest.unnest_records(1024, &mut out).unwrap());
        seen.extend(values(&out));
    }

    assert_eq!(counts, vec![3, 3, 1]);
    assert_eq!(seen, (1..=7).collect::<Vec<i64>>());
}

#[test]
fn test_every_value_produced_exactly_once() {
    for n in 0..10 {
        for cap in 1..5 {
            let list: Vec<i32> = (0..n).collect();
            let batch = outer(1, &[&list]);
            let cursor = Rc::new(LateralCursor::new());
            let mut unnest = kernel(&batch, &cursor, cap);

            let mut out = outgoing();
            let mut seen = Vec::new();
            let mut remaining = n as usize;
            loop {
                let count = unnest.unnest_records(1024, &mut out).unwrap();
                assert!(count <= cap.min(remaining), "n={} cap={}", n, cap);
                assert_eq!(out.num_rows(), count);
                seen.extend(values(&out));
                remaining -= count;
                if unnest.is_row_drained() {
                    break;
                }
            }

            assert_eq!(remaining, 0);
            assert_eq!(seen, (0..n as i64).collect::<Vec<_>>(), "n={} cap={}", n, cap);
        }
    }
}

#[test]
fn test_requested_count_bounds_output() {
    let batch = outer(1, &[&[1, 2, 3, 4, 5]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 4);

    let mut out = outgoing();
    assert_eq!(unnest.unnest_records(2, &mut out).unwrap(), 2);
    assert_eq!(unnest.unnest_records(10, &mut out).unwrap(), 3);
    assert_eq!(values(&out), vec![3, 4, 5]);
}

#[test]
fn test_reset_progress_restarts_row() {
    let batch = outer(1, &[&[1, 2, 3, 4, 5]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 2);

    let mut out = outgoing();
    unnest.unnest_records(10, &mut out).unwrap();
    unnest.unnest_records(10, &mut out).unwrap();
    assert_eq!(values(&out), vec![3, 4]);

    unnest.reset_progress();
    unnest.unnest_records(10, &mut out).unwrap();
    assert_eq!(values(&out), vec![1, 2]);
}

#[test]
fn test_cursor_moves_between_rows() {
    let batch = outer(1, &[&[1, 2, 3], &[], &[9]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 2);
    let mut out = outgoing();

    assert_eq!(unnest.unnest_records(10, &mut out).unwrap(), 2);
    assert_eq!(unnest.unnest_records(10, &mut out).unwrap(), 1);
    assert!(unnest.is_row_drained());

    cursor.set_row(1);
    assert!(!unnest.is_row_drained());
    assert_eq!(unnest.unnest_records(10, &mut out).unwrap(), 0);
    assert!(unnest.is_row_drained());

    cursor.set_row(2);
    assert_eq!(unnest.unnest_records(10, &mut out).unwrap(), 1);
    assert_eq!(values(&out), vec![9]);
}

#[test]
fn test_transfer_shares_storage() {
    let batch = outer(1, &[&[1, 2, 3, 4]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 2);

    let mut out = outgoing();
    unnest.unnest_records(10, &mut out).unwrap();

    let source = batch
        .column_by_name("items")
        .unwrap()
        .as_repeated()
        .unwrap()
        .inner()
        .clone();
    match out.column(0).unwrap() {
        Column::Flat(v) => {
            assert!(v.shares_buffer(&source));
            assert_eq!(v.len(), 2);
        }
        Column::Repeated(_) => panic!("unnest output must be flat"),
    }
}

#[test]
fn test_destination_type_mismatch() {
    let batch = outer(1, &[&[1, 2]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 10);

    let mut out = RecordBatch::empty(Arc::new(Schema::new(vec![Field::nullable(
        "items",
        DataType::Text,
    )])));
    let err = unnest.unnest_records(10, &mut out).unwrap_err();
    assert!(matches!(err, KestrelError::TypeMismatch { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_destination_column_missing() {
    let batch = outer(1, &[&[1, 2]]);
    let cursor = Rc::new(LateralCursor::new());
    let mut unnest = kernel(&batch, &cursor, 10);

    let mut out = RecordBatch::empty(Arc::new(Schema::new(vec![Field::nullable(
        "other",
        DataType::Int,
    )])));
    let err = unnest.unnest_records(10, &mut out).unwrap_err();
    assert!(matches!(err, KestrelError::MissingColumn { .. }));
}

#[test]
fn test_flat_field_is_not_repeated() {
    let batch = outer(1, &[&[1]]);
    let mut unnest = Unnest::new();
    let err = unnest
        .set_unnest_field(batch.column_by_name("id").unwrap())
        .unwrap_err();
    assert!(matches!(err, KestrelError::NotRepeated { .. }));
    assert_eq!(err.category(), ErrorCategory::SchemaInconsistency);
}

#[test]
fn test_selection_vector_rejected() {
    let lateral: Rc<dyn LateralContract> = Rc::new(LateralCursor::new());
    let err = Unnest::new()
        .setup(SelectionVectorMode::FourByte, lateral)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

// =============================================================================
// Operator
// =============================================================================

fn unnest_exec(cursor: &Rc<LateralCursor>, cap: usize) -> UnnestExec {
    init_tracing();
    let lateral: Rc<dyn LateralContract> = cursor.clone();
    UnnestExec::new(
        UnnestConfig::new("items").with_output_row_cap(cap),
        lateral,
        OperatorContext::for_testing(),
    )
    .unwrap()
}

#[test]
fn test_operator_follows_lateral_cursor() {
    use OutcomeKind::{EndOfGroup, EndOfStream, HasData, NewSchema};

    let cursor = Rc::new(LateralCursor::new());
    let mut op = unnest_exec(&cursor, 3);
    cursor.set_incoming(outer(1, &[&[1, 2, 3, 4], &[], &[5]]));

    let mut seen = Vec::new();
    for _ in 0..20 {
        let outcome = op.advance().unwrap();
        let kind = outcome.kind();
        let rows = outcome.batch().map(values).unwrap_or_default();
        seen.push((kind, rows));
        match kind {
            EndOfGroup if !cursor.advance_row() => cursor.finish(),
            EndOfStream => break,
            _ => {}
        }
    }

    assert_eq!(
        seen,
        vec![
            (NewSchema, vec![]),
            (HasData, vec![1, 2, 3]),
            (EndOfGroup, vec![4]),
            (EndOfGroup, vec![]),
            (EndOfGroup, vec![5]),
            (EndOfStream, vec![]),
        ]
    );
    assert_eq!(op.advance().unwrap().kind(), EndOfStream);
}

#[test]
fn test_operator_second_outer_batch_keeps_schema() {
    let cursor = Rc::new(LateralCursor::new());
    let mut op = unnest_exec(&cursor, 10);

    cursor.set_incoming(outer(1, &[&[1, 2]]));
    assert_eq!(op.advance().unwrap().kind(), OutcomeKind::NewSchema);
    assert_eq!(op.schema().unwrap().names(), vec!["items"]);
    assert_eq!(op.advance().unwrap().kind(), OutcomeKind::EndOfGroup);
    assert_eq!(op.record_count(), 2);

    cursor.set_incoming(outer(2, &[&[3]]));
    cursor.finish();
    let out = drain(&mut op, 5);
    assert_eq!(kinds(&out), vec![OutcomeKind::EndOfStream]);
}

#[test]
fn test_operator_zero_row_outer_batch() {
    let cursor = Rc::new(LateralCursor::new());
    let mut op = unnest_exec(&cursor, 3);
    cursor.set_incoming(RecordBatch::empty(items_schema()));

    assert_eq!(op.advance().unwrap().kind(), OutcomeKind::NewSchema);
    let out = op.advance().unwrap();
    assert_eq!(out.kind(), OutcomeKind::EndOfGroup);
    assert_eq!(out.record_count(), 0);

    // the operator keeps working for the next outer batch
    cursor.set_incoming(outer(1, &[&[7, 8]]));
    let out = op.advance().unwrap();
    assert_eq!(out.kind(), OutcomeKind::EndOfGroup);
    assert_eq!(out.batch().map(values), Some(vec![7, 8]));

    cursor.finish();
    assert_eq!(op.advance().unwrap().kind(), OutcomeKind::EndOfStream);
}

#[test]
fn test_operator_reset_progress() {
    let cursor = Rc::new(LateralCursor::new());
    let mut op = unnest_exec(&cursor, 2);
    cursor.set_incoming(outer(1, &[&[1, 2, 3]]));

    assert_eq!(op.advance().unwrap().kind(), OutcomeKind::NewSchema);
    let first = op.advance().unwrap();
    assert_eq!(first.batch().map(values), Some(vec![1, 2]));

    op.reset_progress();
    let again = op.advance().unwrap();
    assert_eq!(again.kind(), OutcomeKind::HasData);
    assert_eq!(again.batch().map(values), Some(vec![1, 2]));
}

#[test]
fn test_operator_close_is_idempotent() {
    let cursor = Rc::new(LateralCursor::new());
    let mut op = unnest_exec(&cursor, 2);
    cursor.set_incoming(outer(1, &[&[1]]));

    assert_eq!(op.advance().unwrap().kind(), OutcomeKind::NewSchema);
    op.close();
    op.close();
    assert!(op.advance().is_err());
}
