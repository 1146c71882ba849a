//! Reusable test data and builders.

use common::Tuple;
use types::Value;

/// SQL setting up the canonical join corpus: `t1(id, v)` and `t2(id, w)`
/// with NULL keys on both sides, plus an empty `t3(id, x)`.
pub const JOIN_CORPUS_SQL: &str = "
    CREATE TABLE t1 (id INT, v VARCHAR(20));
    CREATE TABLE t2 (id INT, w VARCHAR(20));
    CREATE TABLE t3 (id INT, x VARCHAR(20));
    INSERT INTO t1 VALUES (1, 'alpha'), (2, 'beta'), (3, 'gamma'), (4, 'delta'),
                          (NULL, 'lorem'), (NULL, 'ipsum');
    INSERT INTO t2 VALUES (1, 'A'), (2, 'B'), (3, 'C'), (4, 'D'), (NULL, '9');
";

/// Build a tuple of integer values.
pub fn int_row(values: &[i32]) -> Tuple {
    Tuple::new(values.iter().map(|&v| Value::Int(v)).collect())
}

/// Build a tuple of text values.
pub fn text_row(values: &[&str]) -> Tuple {
    Tuple::new(values.iter().map(|&v| Value::Text(v.to_string())).collect())
}

/// Build a tuple from mixed values.
pub fn mixed_row(values: Vec<Value>) -> Tuple {
    Tuple::new(values)
}

/// Build an all-NULL tuple of the given width.
pub fn null_row(width: usize) -> Tuple {
    Tuple::nulls(width)
}
