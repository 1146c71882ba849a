//! End-to-end query tests over the canonical join corpus:
//! `t1(id, v)` and `t2(id, w)` with NULL keys, plus an empty `t3`.

use common::Config;
use database::{CommandOutcome, CommandResult, Database};
use pretty_assertions::assert_eq;
use types::Value;

fn open_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::builder().data_dir(dir.path().to_path_buf()).build();
    (Database::open(config).unwrap(), dir)
}

fn corpus() -> (Database, tempfile::TempDir) {
    let (mut db, dir) = open_db();
    db.execute(
        "CREATE TABLE t1 (id INT, v VARCHAR(20));
         CREATE TABLE t2 (id INT, w VARCHAR(20));
         CREATE TABLE t3 (id INT, x VARCHAR(20));
         INSERT INTO t1 VALUES (1, 'alpha'), (2, 'beta'), (3, 'gamma'), (4, 'delta'),
                               (NULL, 'lorem'), (NULL, 'ipsum');
         INSERT INTO t2 VALUES (1, 'A'), (2, 'B'), (3, 'C'), (4, 'D'), (NULL, '9');",
    )
    .unwrap();
    (db, dir)
}

fn rows(result: &CommandResult) -> Vec<Vec<Value>> {
    match &result.outcome {
        CommandOutcome::Rows(batch) => batch.rows.iter().map(|t| t.values.clone()).collect(),
        other => panic!("expected rows, got {other:?}"),
    }
}

fn query(db: &mut Database, sql: &str) -> Vec<Vec<Value>> {
    let results = db.execute(sql).unwrap();
    rows(&results[0])
}

fn int(v: i32) -> Value {
    Value::Int(v)
}

fn text(s: &str) -> Value {
    Value::Text(s.into())
}

#[test]
fn natural_join_matches_on_shared_column() {
    let (mut db, _dir) = corpus();
    let result = query(&mut db, "SELECT * FROM t1 NATURAL JOIN t2 ORDER BY id");
    assert_eq!(
        result,
        vec![
            vec![int(1), text("alpha"), text("A")],
            vec![int(2), text("beta"), text("B")],
            vec![int(3), text("gamma"), text("C")],
            vec![int(4), text("delta"), text("D")],
        ]
    );
}

#[test]
fn join_on_arithmetic_condition() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT * FROM t1 JOIN t2 ON t1.id = t2.id - 1 ORDER BY t1.id",
    );
    assert_eq!(
        result,
        vec![
            vec![int(1), text("alpha"), int(2), text("B")],
            vec![int(2), text("beta"), int(3), text("C")],
            vec![int(3), text("gamma"), int(4), text("D")],
        ]
    );
}

#[test]
fn left_join_pads_null_keyed_rows() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT * FROM t1 LEFT JOIN t2 ON t1.id = t2.id",
    );
    assert_eq!(result.len(), 6);

    let matched: Vec<_> = result.iter().filter(|r| !r[2].is_null()).collect();
    assert_eq!(matched.len(), 4);

    let padded: Vec<_> = result.iter().filter(|r| r[2].is_null()).collect();
    assert_eq!(padded.len(), 2);
    for row in padded {
        assert!(row[0].is_null());
        assert!(row[3].is_null());
        assert!(matches!(&row[1], Value::Text(s) if s == "lorem" || s == "ipsum"));
    }
}

#[test]
fn right_join_keeps_standard_column_order() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT * FROM t1 RIGHT JOIN t2 ON t1.id = t2.id",
    );
    assert_eq!(result.len(), 5);

    let padded: Vec<_> = result.iter().filter(|r| r[0].is_null()).collect();
    assert_eq!(padded.len(), 1);
    assert_eq!(
        padded[0],
        &vec![Value::Null, Value::Null, Value::Null, text("9")]
    );
}

#[test]
fn full_outer_join_pads_both_sides() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT * FROM t1 FULL OUTER JOIN t2 ON t1.id = t2.id",
    );
    // 4 matched + 2 left-padded + 1 right-padded
    assert_eq!(result.len(), 7);
    let left_only = result
        .iter()
        .filter(|r| !r[1].is_null() && r[2].is_null() && r[3].is_null())
        .count();
    let right_only = result
        .iter()
        .filter(|r| r[0].is_null() && r[1].is_null() && !r[3].is_null())
        .count();
    assert_eq!(left_only, 2);
    assert_eq!(right_only, 1);
}

#[test]
fn comma_list_is_a_cross_product() {
    let (mut db, _dir) = corpus();
    let result = query(&mut db, "SELECT * FROM t1, t2");
    assert_eq!(result.len(), 30);
}

#[test]
fn joins_against_an_empty_table() {
    let (mut db, _dir) = corpus();
    assert!(query(&mut db, "SELECT * FROM t1 NATURAL JOIN t3").is_empty());

    let result = query(&mut db, "SELECT * FROM t1 LEFT JOIN t3 ON t1.id = t3.id");
    assert_eq!(result.len(), 6);
    assert!(result.iter().all(|r| r[2].is_null() && r[3].is_null()));
}

#[test]
fn every_emitted_tuple_matches_the_result_schema() {
    let (mut db, _dir) = corpus();
    for sql in [
        "SELECT * FROM t1",
        "SELECT v FROM t1 WHERE id > 1",
        "SELECT * FROM t1 JOIN t2 ON t1.id = t2.id",
        "SELECT * FROM t1 NATURAL JOIN t2",
        "SELECT t1.v, t2.w FROM t1, t2",
    ] {
        let results = db.execute(sql).unwrap();
        match &results[0].outcome {
            CommandOutcome::Rows(batch) => {
                for row in &batch.rows {
                    assert_eq!(
                        row.column_count(),
                        batch.columns.len(),
                        "arity mismatch for {sql}"
                    );
                }
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }
}

#[test]
fn where_with_unknown_is_filtered() {
    let (mut db, _dir) = corpus();
    // The two NULL-id rows evaluate to UNKNOWN and are dropped.
    let result = query(&mut db, "SELECT * FROM t1 WHERE id < 10");
    assert_eq!(result.len(), 4);

    // IS NULL still reaches them.
    let result = query(&mut db, "SELECT v FROM t1 WHERE id IS NULL ORDER BY v");
    assert_eq!(result, vec![vec![text("ipsum")], vec![text("lorem")]]);
}

#[test]
fn three_way_join_with_where_conjuncts() {
    let (mut db, _dir) = corpus();
    db.execute("INSERT INTO t3 VALUES (2, 'two'), (3, 'three')")
        .unwrap();

    let result = query(
        &mut db,
        "SELECT t1.v, t2.w, t3.x FROM t1, t2, t3 \
         WHERE t1.id = t2.id AND t2.id = t3.id AND t1.id > 2 ORDER BY t1.id",
    );
    assert_eq!(result, vec![vec![text("gamma"), text("C"), text("three")]]);
}

#[test]
fn order_by_limit_and_offset() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT id FROM t1 WHERE id IS NOT NULL ORDER BY id DESC LIMIT 2 OFFSET 1",
    );
    assert_eq!(result, vec![vec![int(3)], vec![int(2)]]);
}

#[test]
fn order_by_places_nulls_last_ascending() {
    let (mut db, _dir) = corpus();
    let result = query(&mut db, "SELECT id FROM t1 ORDER BY id");
    let ids: Vec<_> = result.into_iter().map(|mut r| r.remove(0)).collect();
    assert_eq!(
        ids,
        vec![int(1), int(2), int(3), int(4), Value::Null, Value::Null]
    );
}

#[test]
fn expressions_and_functions_in_the_select_list() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT id * 10 AS scaled, UPPER(v) FROM t1 WHERE id = 2",
    );
    assert_eq!(result, vec![vec![int(20), text("BETA")]]);
}

#[test]
fn like_and_between_filters() {
    let (mut db, _dir) = corpus();
    let result = query(&mut db, "SELECT v FROM t1 WHERE v LIKE '%a' ORDER BY v");
    assert_eq!(
        result,
        vec![vec![text("alpha")], vec![text("beta")], vec![text("delta")], vec![text("gamma")]]
    );

    let result = query(
        &mut db,
        "SELECT id FROM t1 WHERE id BETWEEN 2 AND 3 ORDER BY id",
    );
    assert_eq!(result, vec![vec![int(2)], vec![int(3)]]);
}

#[test]
fn uncorrelated_subqueries_materialise() {
    let (mut db, _dir) = corpus();

    let result = query(
        &mut db,
        "SELECT v FROM t1 WHERE id IN (SELECT id FROM t2 WHERE id > 2) ORDER BY id",
    );
    assert_eq!(result, vec![vec![text("gamma")], vec![text("delta")]]);

    let result = query(
        &mut db,
        "SELECT v FROM t1 WHERE EXISTS (SELECT * FROM t3) ORDER BY v",
    );
    assert!(result.is_empty(), "t3 is empty so EXISTS is false");

    let result = query(
        &mut db,
        "SELECT v FROM t1 WHERE id = (SELECT id FROM t2 WHERE w = 'B')",
    );
    assert_eq!(result, vec![vec![text("beta")]]);
}

#[test]
fn derived_tables_in_from() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT sub.id FROM (SELECT id FROM t1 WHERE id > 2) AS sub ORDER BY sub.id",
    );
    assert_eq!(result, vec![vec![int(3)], vec![int(4)]]);
}

#[test]
fn using_join_and_aliases() {
    let (mut db, _dir) = corpus();
    let result = query(
        &mut db,
        "SELECT a.v, b.w FROM t1 AS a JOIN t2 AS b ON a.id = b.id WHERE a.id = 1",
    );
    assert_eq!(result, vec![vec![text("alpha"), text("A")]]);

    let result = query(&mut db, "SELECT * FROM t1 JOIN t2 USING (id) WHERE id = 4");
    assert_eq!(result, vec![vec![int(4), text("delta"), text("D")]]);
}

#[test]
fn dml_round_trip_with_counts() {
    let (mut db, _dir) = corpus();

    let results = db
        .execute("UPDATE t1 SET v = 'renamed' WHERE id = 1")
        .unwrap();
    assert_eq!(results[0].row_count(), 1);

    let result = query(&mut db, "SELECT v FROM t1 WHERE id = 1");
    assert_eq!(result, vec![vec![text("renamed")]]);

    let results = db.execute("DELETE FROM t1 WHERE id IS NULL").unwrap();
    assert_eq!(results[0].row_count(), 2);
    assert_eq!(query(&mut db, "SELECT * FROM t1").len(), 4);
}

#[test]
fn insert_select_copies_rows() {
    let (mut db, _dir) = corpus();
    let results = db
        .execute("INSERT INTO t3 SELECT id, v FROM t1 WHERE id <= 2")
        .unwrap();
    assert_eq!(results[0].row_count(), 2);
    assert_eq!(query(&mut db, "SELECT * FROM t3").len(), 2);
}

#[test]
fn analyze_feeds_the_cost_model() {
    let (mut db, _dir) = corpus();
    let results = db.execute("ANALYZE TABLE t1").unwrap();
    assert!(matches!(results[0].outcome, CommandOutcome::Message(_)));

    let stats = &db.catalog().table("t1").unwrap().stats;
    assert_eq!(stats.num_tuples, 6);
    assert_eq!(stats.columns[0].num_nulls, 2);
    assert_eq!(stats.columns[0].num_distinct, 4);
    assert_eq!(stats.columns[0].min, Some(int(1)));
    assert_eq!(stats.columns[0].max, Some(int(4)));
}

#[test]
fn explain_renders_plan_and_analyze_executes() {
    let (mut db, _dir) = corpus();
    let results = db
        .execute("EXPLAIN SELECT * FROM t1 JOIN t2 ON t1.id = t2.id")
        .unwrap();
    match &results[0].outcome {
        CommandOutcome::Explain(text) => {
            assert!(text.contains("NestedLoopsJoin"));
            assert!(text.contains("FileScan"));
        }
        other => panic!("expected explain, got {other:?}"),
    }

    let results = db
        .execute("EXPLAIN ANALYZE SELECT * FROM t1")
        .unwrap();
    match &results[0].outcome {
        CommandOutcome::Explain(text) => assert!(text.contains("rows: 6")),
        other => panic!("expected explain, got {other:?}"),
    }
}

#[test]
fn repeated_execution_is_deterministic() {
    let (mut db, _dir) = corpus();
    let sql = "SELECT * FROM t1 JOIN t2 ON t1.id = t2.id ORDER BY t1.id";
    let first = query(&mut db, sql);
    let second = query(&mut db, sql);
    assert_eq!(first, second);
}

#[test]
fn transaction_verbs_are_politely_refused() {
    let (mut db, _dir) = open_db();
    for sql in ["BEGIN", "COMMIT", "ROLLBACK"] {
        let results = db.execute(sql).unwrap();
        assert!(matches!(
            &results[0].outcome,
            CommandOutcome::Message(m) if m.contains("not supported")
        ));
    }
}

#[test]
fn errors_carry_their_kind() {
    let (mut db, _dir) = corpus();

    let err = db.execute("SELECT nope FROM t1").unwrap_err();
    assert!(matches!(err, common::DbError::Schema(_)));

    let err = db.execute("SELECT * FROM missing").unwrap_err();
    assert!(matches!(err, common::DbError::Plan(_)));

    let err = db.execute("SELECT id + v FROM t1").unwrap_err();
    assert!(matches!(err, common::DbError::Type(_)));
}

#[test]
fn catalog_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::builder().data_dir(dir.path().to_path_buf()).build();

    {
        let mut db = Database::open(config.clone()).unwrap();
        db.execute("CREATE TABLE keep (id INT, note TEXT); INSERT INTO keep VALUES (7, 'seven')")
            .unwrap();
    }

    let mut db = Database::open(config).unwrap();
    let result = query(&mut db, "SELECT * FROM keep");
    assert_eq!(result, vec![vec![int(7), text("seven")]]);
}
