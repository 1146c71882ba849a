//! SQL script execution with captured, pretty-printed output.

use crate::context::TestContext;
use common::DbResult;
use common::pretty::{TableStyleKind, render_record_batch};
use database::CommandOutcome;
use parser::parse_sql;

/// Execute a script against a fresh database and capture all output:
/// result tables, affected-row counts, messages, and per-statement errors.
///
/// # Example
///
/// ```no_run
/// use testsupport::prelude::*;
///
/// let output = run_sql_script(
///     "CREATE TABLE users (id INT, name TEXT);
///      SELECT * FROM users;",
/// )
/// .unwrap();
/// assert!(output.contains("table 'users' created"));
/// ```
pub fn run_sql_script(sql: &str) -> DbResult<String> {
    let mut ctx = TestContext::new()?;
    run_sql_script_with_context(sql, &mut ctx)
}

/// Execute a script against an existing context, so multiple scripts can
/// share database state. Statement errors are captured in the output
/// instead of aborting the script.
pub fn run_sql_script_with_context(sql: &str, ctx: &mut TestContext) -> DbResult<String> {
    let statements = parse_sql(sql)?;
    let mut output = String::new();

    for stmt in statements {
        let rendered = match ctx.db().execute_statement(stmt) {
            Ok(result) => match &result.outcome {
                CommandOutcome::Rows(batch) => {
                    let table = render_record_batch(batch, TableStyleKind::Ascii);
                    format!("{table}\n{} row(s)", batch.rows.len())
                }
                CommandOutcome::Count { affected } => format!("{affected} row(s) affected"),
                CommandOutcome::Explain(text) => text.trim_end().to_string(),
                CommandOutcome::Message(message) => message.clone(),
            },
            Err(e) => format!("error: {e}"),
        };

        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&rendered);
        output.push('\n');
    }

    Ok(output)
}
