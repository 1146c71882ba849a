use crate::{
    DEFAULT_SELECTIVITY, PlanContext, PlanNode, PlanOp, Planner, add_predicate_to_plan,
    estimate_selectivity,
};
use catalog::{Catalog, ColumnStats, TableSchema, TableStats};
use common::{ColumnInfo, ColumnName, DbError, Schema};
use expr::{BoolOp, CompareOp, Expr, JoinType, SelectClause};
use pretty_assertions::assert_eq;
use types::{SqlType, Value};

fn add_table(catalog: &mut Catalog, name: &str, value_col: &str, num_tuples: u64) {
    let schema = TableSchema::try_new(vec![
        ColumnInfo::new("id", SqlType::Int),
        ColumnInfo::new(value_col, SqlType::Varchar(20)),
    ])
    .unwrap();
    catalog.create_table(name, schema).unwrap();
    catalog
        .update_stats(
            name,
            TableStats {
                num_tuples,
                num_pages: (num_tuples / 50).max(1),
                avg_tuple_size: 24.0,
                columns: vec![
                    ColumnStats {
                        num_distinct: num_tuples.max(1),
                        num_nulls: 0,
                        min: Some(Value::Int(1)),
                        max: Some(Value::Int(num_tuples.max(1) as i32)),
                    },
                    ColumnStats::default(),
                ],
            },
        )
        .unwrap();
}

fn test_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    add_table(&mut catalog, "t1", "v", 100);
    add_table(&mut catalog, "t2", "w", 1000);
    add_table(&mut catalog, "t3", "x", 10);
    catalog
}

fn plan_sql(catalog: &Catalog, sql: &str) -> PlanNode {
    let select = parse_select(sql);
    Planner::plan_select(&select, &PlanContext::new(catalog)).unwrap()
}

fn parse_select(sql: &str) -> SelectClause {
    match parser::parse_sql(sql).unwrap().remove(0) {
        parser::Statement::Select(select) => select,
        other => panic!("expected SELECT, got {other:?}"),
    }
}

/// Split every applied predicate in the tree back into conjuncts.
fn collect_applied_conjuncts(plan: &PlanNode, out: &mut Vec<Expr>) {
    let mut push_pred = |pred: &Expr, out: &mut Vec<Expr>| {
        out.extend(pred.clone().into_conjuncts());
    };
    match &plan.op {
        PlanOp::FileScan { predicate, .. } => {
            if let Some(pred) = predicate {
                push_pred(pred, out);
            }
        }
        PlanOp::Filter { child, predicate } => {
            push_pred(predicate, out);
            collect_applied_conjuncts(child, out);
        }
        PlanOp::Project { child, .. }
        | PlanOp::Sort { child, .. }
        | PlanOp::Rename { child, .. }
        | PlanOp::Limit { child, .. } => collect_applied_conjuncts(child, out),
        PlanOp::NestedLoopsJoin {
            left,
            right,
            predicate,
            ..
        } => {
            if let Some(pred) = predicate {
                push_pred(pred, out);
            }
            collect_applied_conjuncts(left, out);
            collect_applied_conjuncts(right, out);
        }
    }
}

fn find_join<'a>(plan: &'a PlanNode) -> Option<&'a PlanNode> {
    match &plan.op {
        PlanOp::NestedLoopsJoin { .. } => Some(plan),
        PlanOp::Filter { child, .. }
        | PlanOp::Project { child, .. }
        | PlanOp::Sort { child, .. }
        | PlanOp::Rename { child, .. }
        | PlanOp::Limit { child, .. } => find_join(child),
        PlanOp::FileScan { .. } => None,
    }
}

#[test]
fn single_table_select_star_is_a_bare_scan() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT * FROM t1");
    assert!(matches!(
        plan.op,
        PlanOp::FileScan { ref table, predicate: None } if table == "t1"
    ));
    assert_eq!(plan.schema().unwrap().labels(), vec!["t1.id", "t1.v"]);
}

#[test]
fn where_is_pushed_into_the_scan() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT * FROM t1 WHERE id = 1");
    match &plan.op {
        PlanOp::FileScan { predicate, .. } => assert!(predicate.is_some()),
        other => panic!("expected pushed-down scan, got {other:?}"),
    }
}

#[test]
fn non_trivial_projection_gets_a_project_node() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT v FROM t1");
    assert!(matches!(plan.op, PlanOp::Project { .. }));
    assert_eq!(plan.schema().unwrap().labels(), vec!["t1.v"]);

    // Aliases force a projection even for a full column list.
    let plan = plan_sql(&catalog, "SELECT id AS key, v FROM t1");
    assert!(matches!(plan.op, PlanOp::Project { .. }));
    assert_eq!(plan.schema().unwrap().labels(), vec!["key", "t1.v"]);
}

#[test]
fn order_by_adds_sort_and_limit_wraps() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT * FROM t1 ORDER BY id DESC LIMIT 3");
    match &plan.op {
        PlanOp::Limit { child, limit, .. } => {
            assert_eq!(*limit, Some(3));
            assert!(matches!(child.op, PlanOp::Sort { .. }));
        }
        other => panic!("expected limit over sort, got {other:?}"),
    }
}

#[test]
fn every_conjunct_is_applied_exactly_once() {
    let catalog = test_catalog();
    let plan = plan_sql(
        &catalog,
        "SELECT * FROM t1, t2, t3 \
         WHERE t1.id = t2.id AND t2.id = t3.id AND t1.id > 0",
    );

    let mut applied = Vec::new();
    collect_applied_conjuncts(&plan, &mut applied);

    let expected = parse_select(
        "SELECT * FROM t1 WHERE t1.id = t2.id AND t2.id = t3.id AND t1.id > 0",
    )
    .where_clause
    .unwrap()
    .into_conjuncts();

    assert_eq!(applied.len(), expected.len());
    for conjunct in expected {
        let count = applied.iter().filter(|c| **c == conjunct).count();
        assert_eq!(count, 1, "conjunct {conjunct} applied {count} times");
    }
}

#[test]
fn inner_join_on_conjuncts_join_the_pool() {
    let catalog = test_catalog();
    let plan = plan_sql(
        &catalog,
        "SELECT * FROM t1 JOIN t2 ON t1.id = t2.id AND t2.id > 5",
    );

    let mut applied = Vec::new();
    collect_applied_conjuncts(&plan, &mut applied);
    assert_eq!(applied.len(), 2);
}

#[test]
fn dp_puts_the_smaller_input_on_the_outer_side() {
    let catalog = test_catalog();
    // t3 has 10 tuples, t2 has 1000; outer-side cpu cost favours t3 first.
    let plan = plan_sql(&catalog, "SELECT * FROM t2 JOIN t3 ON t2.id = t3.id");
    let join = find_join(&plan).expect("join in plan");
    match &join.op {
        PlanOp::NestedLoopsJoin { left, .. } => {
            assert!(
                matches!(&left.op, PlanOp::FileScan { table, .. } if table == "t3"),
                "expected t3 as the outer input"
            );
        }
        other => panic!("expected join, got {other:?}"),
    }
}

#[test]
fn right_outer_joins_are_normalised_with_swapped_schema() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT * FROM t1 RIGHT JOIN t2 ON t1.id = t2.id");
    let join = find_join(&plan).expect("join in plan");
    match &join.op {
        PlanOp::NestedLoopsJoin {
            join_type,
            schema_swapped,
            left,
            ..
        } => {
            assert_eq!(*join_type, JoinType::LeftOuter);
            assert!(*schema_swapped);
            // The stored left child is the original right input.
            assert!(matches!(&left.op, PlanOp::FileScan { table, .. } if table == "t2"));
        }
        other => panic!("expected normalised join, got {other:?}"),
    }
    // The output schema keeps the SQL-standard column order.
    assert_eq!(
        plan.schema().unwrap().labels(),
        vec!["t1.id", "t1.v", "t2.id", "t2.w"]
    );
}

#[test]
fn outer_joins_stay_where_the_query_put_them() {
    let catalog = test_catalog();
    let plan = plan_sql(
        &catalog,
        "SELECT * FROM t1 JOIN (t2 LEFT JOIN t3 ON t2.id = t3.id) ON t1.id = t2.id",
    );

    // The outer join must appear intact: a LeftOuter node over scans of t2
    // and t3, never re-ordered across.
    fn find_outer(plan: &PlanNode) -> Option<(&PlanNode, &PlanNode)> {
        match &plan.op {
            PlanOp::NestedLoopsJoin {
                join_type: JoinType::LeftOuter,
                left,
                right,
                ..
            } => Some((left, right)),
            PlanOp::NestedLoopsJoin { left, right, .. } => {
                find_outer(left).or_else(|| find_outer(right))
            }
            PlanOp::Filter { child, .. }
            | PlanOp::Project { child, .. }
            | PlanOp::Sort { child, .. }
            | PlanOp::Rename { child, .. }
            | PlanOp::Limit { child, .. } => find_outer(child),
            PlanOp::FileScan { .. } => None,
        }
    }

    let (left, right) = find_outer(&plan).expect("outer join preserved");
    assert!(matches!(&left.op, PlanOp::FileScan { table, .. } if table == "t2"));
    assert!(matches!(&right.op, PlanOp::FileScan { table, .. } if table == "t3"));
}

#[test]
fn outer_join_conjuncts_push_only_into_the_preserved_side() {
    let catalog = test_catalog();
    let plan = plan_sql(
        &catalog,
        "SELECT * FROM t1 LEFT JOIN t2 ON t1.id = t2.id WHERE t1.id > 3 AND t2.w = 'q'",
    );

    // t1 is preserved: its conjunct lands in the scan. The t2 conjunct must
    // stay above the join.
    fn scan_predicate<'a>(plan: &'a PlanNode, table: &str) -> Option<&'a Expr> {
        match &plan.op {
            PlanOp::FileScan {
                table: t,
                predicate,
            } if t == table => predicate.as_ref(),
            PlanOp::FileScan { .. } => None,
            PlanOp::Filter { child, .. }
            | PlanOp::Project { child, .. }
            | PlanOp::Sort { child, .. }
            | PlanOp::Rename { child, .. }
            | PlanOp::Limit { child, .. } => scan_predicate(child, table),
            PlanOp::NestedLoopsJoin { left, right, .. } => {
                scan_predicate(left, table).or_else(|| scan_predicate(right, table))
            }
        }
    }

    assert!(scan_predicate(&plan, "t1").is_some());
    assert!(scan_predicate(&plan, "t2").is_none());

    // Both conjuncts are still applied exactly once overall.
    let mut applied = Vec::new();
    collect_applied_conjuncts(&plan, &mut applied);
    // join condition + 2 WHERE conjuncts
    assert_eq!(applied.len(), 3);
}

#[test]
fn natural_join_collapses_shared_columns() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT * FROM t1 NATURAL JOIN t2");
    assert_eq!(plan.schema().unwrap().labels(), vec!["id", "t1.v", "t2.w"]);
}

#[test]
fn using_join_collapses_named_columns() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT * FROM t1 JOIN t2 USING (id)");
    assert_eq!(plan.schema().unwrap().labels(), vec!["id", "t1.v", "t2.w"]);
}

#[test]
fn derived_tables_are_planned_and_renamed() {
    let catalog = test_catalog();
    let plan = plan_sql(
        &catalog,
        "SELECT * FROM (SELECT id FROM t1) AS sub WHERE sub.id = 1",
    );
    assert_eq!(plan.schema().unwrap().labels(), vec!["sub.id"]);
}

#[test]
fn aliased_tables_are_renamed() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT a.id FROM t1 AS a");
    assert_eq!(plan.schema().unwrap().labels(), vec!["a.id"]);
}

#[test]
fn unknown_column_is_a_schema_error() {
    let catalog = test_catalog();
    let select = parse_select("SELECT * FROM t1 WHERE banana = 1");
    let err = Planner::plan_select(&select, &PlanContext::new(&catalog)).unwrap_err();
    assert!(matches!(err, DbError::Schema(_)), "got {err:?}");
}

#[test]
fn unknown_table_is_a_plan_error() {
    let catalog = test_catalog();
    let select = parse_select("SELECT * FROM no_such_table");
    let err = Planner::plan_select(&select, &PlanContext::new(&catalog)).unwrap_err();
    assert!(matches!(err, DbError::Plan(_)), "got {err:?}");
}

#[test]
fn grouping_and_aggregates_are_rejected() {
    let catalog = test_catalog();
    let ctx = PlanContext::new(&catalog);

    for sql in [
        "SELECT id FROM t1 GROUP BY id",
        "SELECT DISTINCT id FROM t1",
        "SELECT count(id) FROM t1",
    ] {
        let err = Planner::plan_select(&parse_select(sql), &ctx).unwrap_err();
        assert!(matches!(err, DbError::Plan(_)), "{sql}: got {err:?}");
    }
}

#[test]
fn add_predicate_merges_into_predicate_slots() {
    let a = Expr::compare(
        Expr::ColumnRef(ColumnName::unqualified("id")),
        CompareOp::Gt,
        Expr::Literal(Value::Int(0)),
    );
    let b = Expr::compare(
        Expr::ColumnRef(ColumnName::unqualified("id")),
        CompareOp::Lt,
        Expr::Literal(Value::Int(9)),
    );

    let scan = add_predicate_to_plan(PlanNode::file_scan("t1"), a.clone());
    let merged = add_predicate_to_plan(scan, b.clone());
    match merged.op {
        PlanOp::FileScan { predicate, .. } => {
            assert_eq!(
                predicate.unwrap(),
                Expr::Boolean {
                    op: BoolOp::And,
                    terms: vec![a.clone(), b.clone()],
                }
            );
        }
        other => panic!("expected scan, got {other:?}"),
    }

    // Non-slotted nodes get wrapped instead.
    let sort = PlanNode::sort(PlanNode::file_scan("t1"), vec![]);
    let wrapped = add_predicate_to_plan(sort, a);
    assert!(matches!(wrapped.op, PlanOp::Filter { .. }));
}

#[test]
fn selectivity_uses_column_statistics() {
    let schema = Schema::new(vec![ColumnInfo::new("id", SqlType::Int).with_table("t")]);
    let stats = vec![ColumnStats {
        num_distinct: 100,
        num_nulls: 0,
        min: Some(Value::Int(1)),
        max: Some(Value::Int(100)),
    }];
    let col = Expr::ColumnRef(ColumnName::qualified("t", "id"));

    let eq = Expr::compare(col.clone(), CompareOp::Eq, Expr::Literal(Value::Int(7)));
    assert!((estimate_selectivity(&eq, &schema, &stats) - 0.01).abs() < 1e-6);

    let lt = Expr::compare(col.clone(), CompareOp::Lt, Expr::Literal(Value::Int(51)));
    let sel = estimate_selectivity(&lt, &schema, &stats);
    assert!((0.4..=0.6).contains(&sel), "got {sel}");

    // AND multiplies, OR uses inclusion-exclusion.
    let both = Expr::and(eq.clone(), lt.clone());
    let expect = estimate_selectivity(&eq, &schema, &stats) * sel;
    assert!((estimate_selectivity(&both, &schema, &stats) - expect).abs() < 1e-6);

    let either = Expr::or(eq.clone(), lt.clone());
    let se = estimate_selectivity(&eq, &schema, &stats);
    let expect = se + sel - se * sel;
    assert!((estimate_selectivity(&either, &schema, &stats) - expect).abs() < 1e-6);

    // Opaque predicates fall back to the default.
    let like = Expr::StringMatch {
        op: expr::MatchOp::Like,
        expr: Box::new(col),
        pattern: Box::new(Expr::Literal(Value::Text("x%".into()))),
        negated: false,
    };
    assert_eq!(estimate_selectivity(&like, &schema, &stats), DEFAULT_SELECTIVITY);
}

#[test]
fn explain_renders_the_tree() {
    let catalog = test_catalog();
    let plan = plan_sql(&catalog, "SELECT v FROM t1 WHERE id = 1 ORDER BY v");
    let text = crate::explain_plan(&plan);
    assert!(text.contains("Sort"));
    assert!(text.contains("Project"));
    assert!(text.contains("FileScan[t1]"));
    assert!(text.contains("cpu="));
}
