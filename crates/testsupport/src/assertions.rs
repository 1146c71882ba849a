//! Assertion helpers for query results.

use common::RecordBatch;
use database::{CommandOutcome, CommandResult};
use types::Value;

/// Extract the row batch from a command result, panicking otherwise.
pub fn expect_rows(result: &CommandResult) -> &RecordBatch {
    match &result.outcome {
        CommandOutcome::Rows(batch) => batch,
        other => panic!("expected rows, got {other:?}"),
    }
}

/// Assert a result's rows equal the expected values, in order.
pub fn assert_rows_eq(result: &CommandResult, expected: &[Vec<Value>]) {
    let batch = expect_rows(result);
    let actual: Vec<Vec<Value>> = batch.rows.iter().map(|t| t.values.clone()).collect();
    pretty_assertions::assert_eq!(actual, expected.to_vec());
}

/// Assert a result produced a single row with a single value.
pub fn assert_single_value(result: &CommandResult, expected: &Value) {
    let batch = expect_rows(result);
    assert_eq!(batch.rows.len(), 1, "expected one row, got {}", batch.rows.len());
    assert_eq!(batch.rows[0].column_count(), 1);
    assert_eq!(&batch.rows[0].values[0], expected);
}

/// Assert an affected-row count.
pub fn assert_count(result: &CommandResult, expected: u64) {
    match &result.outcome {
        CommandOutcome::Count { affected } => assert_eq!(*affected, expected),
        other => panic!("expected count, got {other:?}"),
    }
}
