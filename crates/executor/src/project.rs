//! Projection: evaluate a resolved select list over child tuples.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Schema, Tuple};
use expr::Environment;
use planner::{ProjectItem, ProjectSource, SortKey};

/// Emits one materialised tuple per input tuple, with columns passed
/// through by ordinal or computed by expression. The item list comes out of
/// `planner::resolve_projection`, so wildcards are already expanded.
pub struct ProjectExec {
    input: Box<dyn Executor>,
    items: Vec<ProjectItem>,
    schema: Schema,
}

impl ProjectExec {
    pub fn new(input: Box<dyn Executor>, items: Vec<ProjectItem>, schema: Schema) -> Self {
        Self {
            input,
            items,
            schema,
        }
    }
}

impl Executor for ProjectExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        let Some(tuple) = self.input.next(ctx)? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match &item.source {
                ProjectSource::Column(i) => {
                    let v = tuple.get(*i).cloned().ok_or_else(|| {
                        common::DbError::Schema(format!(
                            "projection ordinal {i} beyond tuple arity {}",
                            tuple.column_count()
                        ))
                    })?;
                    values.push(v);
                }
                ProjectSource::Computed(expr) => {
                    let env = Environment::single(self.input.schema(), &tuple);
                    values.push(expr.evaluate(&env)?);
                }
            }
        }
        Ok(Some(Tuple::new(values)))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn supports_marking(&self) -> bool {
        self.input.supports_marking()
    }

    fn mark(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.mark(ctx)
    }

    fn reset_to_mark(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.reset_to_mark(ctx)
    }

    fn results_ordered_by(&self) -> Option<&[SortKey]> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{MockExec, TestDb, int_text_tuple, t1_schema};
    use expr::SelectValue;
    use planner::resolve_projection;
    use types::Value;

    fn project_over(
        rows: Vec<Tuple>,
        sql_values: &str,
    ) -> (TestDb, ProjectExec) {
        let db = TestDb::new();
        let schema = t1_schema();
        let values: Vec<SelectValue> =
            db.parse_select_values(&format!("SELECT {sql_values} FROM t1"));
        let (out_schema, items) = resolve_projection(&values, &schema).unwrap();
        let exec = ProjectExec::new(
            Box::new(MockExec::new(rows, schema)),
            items,
            out_schema,
        );
        (db, exec)
    }

    #[test]
    fn passthrough_and_computed_columns() {
        let (mut db, mut project) =
            project_over(vec![int_text_tuple(2, "ada")], "v, id + 1");
        let mut ctx = db.ctx();

        project.open(&mut ctx).unwrap();
        let row = project.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.values, vec![Value::Text("ada".into()), Value::Int(3)]);
        assert!(row.is_cacheable(), "projected tuples are materialised");
        assert!(project.next(&mut ctx).unwrap().is_none());
        project.close(&mut ctx).unwrap();
    }

    #[test]
    fn wildcard_expansion_reproduces_the_child() {
        let (mut db, mut project) = project_over(vec![int_text_tuple(1, "x")], "*");
        let mut ctx = db.ctx();

        project.open(&mut ctx).unwrap();
        let row = project.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.values, vec![Value::Int(1), Value::Text("x".into())]);
        project.close(&mut ctx).unwrap();
    }

    #[test]
    fn output_schema_uses_aliases() {
        let (_db, project) = project_over(vec![], "id AS key");
        assert_eq!(project.schema().labels(), vec!["key"]);
    }
}
