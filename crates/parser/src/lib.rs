mod ast;

pub use ast::*;

use common::{ColumnName, DbError, DbResult};
use expr::{
    ArithOp, CompareOp, Expr, FromClause, JoinCondition, JoinType, MatchOp, OrderByExpr,
    SelectClause, SelectValue,
};
use sqlparser::ast as sqlast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;
use types::{SqlType, Value};

/// Parse SQL text into the internal AST statements.
pub fn parse_sql(sql: &str) -> DbResult<Vec<Statement>> {
    let dialect = GenericDialect {};
    let stmts = SqlParser::parse_sql(&dialect, sql)
        .map_err(|e| DbError::Parser(format!("SQL parse error: {e}")))?;

    stmts.into_iter().map(map_statement).collect()
}

fn map_statement(stmt: sqlast::Statement) -> DbResult<Statement> {
    use sqlast::Statement as SqlStatement;

    match stmt {
        SqlStatement::CreateTable {
            name,
            columns,
            constraints,
            ..
        } => {
            let table = normalize_object_name(&name)?;
            let primary_key = resolve_primary_key(&columns, &constraints)?;
            let unique_keys = extract_unique_keys(&constraints);

            let mapped_columns = columns
                .into_iter()
                .map(|col| {
                    Ok(ColumnDef {
                        ty: map_data_type(&col.data_type)?,
                        name: normalize_ident_owned(col.name),
                    })
                })
                .collect::<DbResult<Vec<_>>>()?;

            Ok(Statement::CreateTable {
                name: table,
                columns: mapped_columns,
                primary_key,
                unique_keys,
            })
        }
        SqlStatement::Drop {
            object_type, names, ..
        } => match object_type {
            sqlast::ObjectType::Table => Ok(Statement::DropTable {
                name: first_name(names)?,
            }),
            sqlast::ObjectType::Index => Ok(Statement::DropIndex {
                name: first_name(names)?,
            }),
            _ => Err(DbError::Parser(format!(
                "unsupported DROP type: {object_type:?}"
            ))),
        },
        SqlStatement::CreateIndex {
            name,
            table_name,
            columns,
            ..
        } => {
            let index_name = name
                .ok_or_else(|| DbError::Parser("index name required".into()))
                .map(|n| normalize_object_name(&n))??;
            let table = normalize_object_name(&table_name)?;
            let columns = columns
                .iter()
                .map(map_index_column)
                .collect::<DbResult<Vec<_>>>()?;
            Ok(Statement::CreateIndex {
                name: index_name,
                table,
                columns,
            })
        }
        SqlStatement::Insert {
            table_name, source, ..
        } => {
            let table = normalize_object_name(&table_name)?;
            let source = source.ok_or_else(|| DbError::Parser("INSERT source missing".into()))?;
            let source = map_insert_source(*source)?;
            Ok(Statement::Insert { table, source })
        }
        SqlStatement::Query(query) => Ok(Statement::Select(map_query(*query)?)),
        SqlStatement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table = table_name_from_with_joins(&table)?;
            let assignments = assignments
                .into_iter()
                .map(|assign| {
                    let ident = assign
                        .id
                        .last()
                        .ok_or_else(|| DbError::Parser("invalid assignment target".into()))?;
                    Ok((normalize_ident(ident), map_expr(assign.value)?))
                })
                .collect::<DbResult<Vec<_>>>()?;
            let selection = selection.map(map_expr).transpose()?;
            Ok(Statement::Update {
                table,
                assignments,
                selection,
            })
        }
        SqlStatement::Delete {
            from, selection, ..
        } => {
            if from.is_empty() {
                return Err(DbError::Parser("DELETE requires FROM source".into()));
            }
            if from.len() > 1 {
                return Err(DbError::Parser("multi-table DELETE not supported".into()));
            }
            let table = table_name_from_with_joins(&from[0])?;
            let selection = selection.map(map_expr).transpose()?;
            Ok(Statement::Delete { table, selection })
        }
        SqlStatement::Explain {
            statement, analyze, ..
        } => {
            let query = Box::new(map_statement(*statement)?);
            Ok(Statement::Explain { query, analyze })
        }
        SqlStatement::Analyze { table_name, .. } => Ok(Statement::Analyze {
            table: normalize_object_name(&table_name)?,
        }),
        SqlStatement::StartTransaction { .. } => Ok(Statement::Begin),
        SqlStatement::Commit { .. } => Ok(Statement::Commit),
        SqlStatement::Rollback { .. } => Ok(Statement::Rollback),
        _ => Err(DbError::Parser("unsupported statement".into())),
    }
}

fn map_query(query: sqlast::Query) -> DbResult<SelectClause> {
    use sqlast::SetExpr;

    let select = match *query.body {
        SetExpr::Select(select) => select,
        SetExpr::Values(_) => {
            return Err(DbError::Parser("standalone VALUES not supported".into()));
        }
        _ => return Err(DbError::Parser("SET operations not supported".into())),
    };

    let sqlast::Select {
        distinct,
        projection,
        from,
        selection,
        group_by,
        having,
        ..
    } = *select;

    let distinct = match distinct {
        None => false,
        Some(sqlast::Distinct::Distinct) => true,
        Some(sqlast::Distinct::On(_)) => {
            return Err(DbError::Parser("DISTINCT ON not supported".into()));
        }
    };

    let from = map_from_list(from)?;

    let values = projection
        .into_iter()
        .map(map_select_item)
        .collect::<DbResult<Vec<_>>>()?;
    if values.is_empty() {
        return Err(DbError::Parser("SELECT list is empty".into()));
    }

    let where_clause = selection.map(map_expr).transpose()?;

    let group_by = match group_by {
        sqlast::GroupByExpr::All => {
            return Err(DbError::Parser("GROUP BY ALL not supported".into()));
        }
        sqlast::GroupByExpr::Expressions(exprs) => exprs
            .into_iter()
            .map(map_expr)
            .collect::<DbResult<Vec<_>>>()?,
    };
    let having = having.map(map_expr).transpose()?;

    let order_by = query
        .order_by
        .into_iter()
        .map(map_order_by_expr)
        .collect::<DbResult<Vec<_>>>()?;

    let limit = query
        .limit
        .map(|expr| match expr {
            sqlast::Expr::Value(sqlast::Value::Number(n, _)) => n
                .parse::<u64>()
                .map_err(|_| DbError::Parser(format!("invalid LIMIT value: {}", n))),
            _ => Err(DbError::Parser(
                "LIMIT must be a non-negative integer".into(),
            )),
        })
        .transpose()?;

    let offset = query
        .offset
        .map(|offset_expr| match offset_expr.value {
            sqlast::Expr::Value(sqlast::Value::Number(n, _)) => n
                .parse::<u64>()
                .map_err(|_| DbError::Parser(format!("invalid OFFSET value: {}", n))),
            _ => Err(DbError::Parser(
                "OFFSET must be a non-negative integer".into(),
            )),
        })
        .transpose()?;

    Ok(SelectClause {
        distinct,
        values,
        from,
        where_clause,
        group_by,
        having,
        order_by,
        limit,
        offset,
    })
}

/// A comma-separated FROM list is an implicit cross join.
fn map_from_list(from: Vec<sqlast::TableWithJoins>) -> DbResult<Option<FromClause>> {
    let mut result: Option<FromClause> = None;
    for twj in from {
        let clause = map_table_with_joins(twj)?;
        result = Some(match result {
            None => clause,
            Some(left) => FromClause::join(left, clause, JoinType::Cross, JoinCondition::None),
        });
    }
    Ok(result)
}

fn map_table_with_joins(twj: sqlast::TableWithJoins) -> DbResult<FromClause> {
    let mut clause = map_table_factor(twj.relation)?;
    for join in twj.joins {
        let right = map_table_factor(join.relation)?;
        let (join_type, condition) = map_join_operator(join.join_operator)?;
        clause = FromClause::join(clause, right, join_type, condition);
    }
    Ok(clause)
}

fn map_table_factor(factor: sqlast::TableFactor) -> DbResult<FromClause> {
    match factor {
        sqlast::TableFactor::Table { name, alias, .. } => Ok(FromClause::BaseTable {
            table: normalize_object_name(&name)?,
            alias: alias.map(|a| normalize_ident_owned(a.name)),
        }),
        sqlast::TableFactor::Derived {
            lateral,
            subquery,
            alias,
        } => {
            if lateral {
                return Err(DbError::Parser("LATERAL subqueries not supported".into()));
            }
            let alias = alias
                .map(|a| normalize_ident_owned(a.name))
                .ok_or_else(|| DbError::Parser("derived table requires an alias".into()))?;
            Ok(FromClause::Derived {
                query: Box::new(map_query(*subquery)?),
                alias,
            })
        }
        sqlast::TableFactor::NestedJoin {
            table_with_joins,
            alias,
        } => {
            if alias.is_some() {
                return Err(DbError::Parser("aliased join groups not supported".into()));
            }
            map_table_with_joins(*table_with_joins)
        }
        other => Err(DbError::Parser(format!(
            "unsupported table factor: {other:?}"
        ))),
    }
}

fn map_join_operator(op: sqlast::JoinOperator) -> DbResult<(JoinType, JoinCondition)> {
    use sqlast::JoinOperator as SqlJoin;

    Ok(match op {
        SqlJoin::Inner(c) => (JoinType::Inner, map_join_constraint(c)?),
        SqlJoin::LeftOuter(c) => (JoinType::LeftOuter, map_join_constraint(c)?),
        SqlJoin::RightOuter(c) => (JoinType::RightOuter, map_join_constraint(c)?),
        SqlJoin::FullOuter(c) => (JoinType::FullOuter, map_join_constraint(c)?),
        SqlJoin::CrossJoin => (JoinType::Cross, JoinCondition::None),
        other => {
            return Err(DbError::Parser(format!(
                "unsupported join operator: {other:?}"
            )));
        }
    })
}

fn map_join_constraint(constraint: sqlast::JoinConstraint) -> DbResult<JoinCondition> {
    use sqlast::JoinConstraint as SqlConstraint;

    Ok(match constraint {
        SqlConstraint::On(expr) => JoinCondition::On(map_expr(expr)?),
        SqlConstraint::Using(cols) => {
            JoinCondition::Using(cols.iter().map(normalize_ident).collect())
        }
        SqlConstraint::Natural => JoinCondition::Natural,
        SqlConstraint::None => JoinCondition::None,
    })
}

fn map_order_by_expr(expr: sqlast::OrderByExpr) -> DbResult<OrderByExpr> {
    Ok(OrderByExpr {
        expr: map_expr(expr.expr)?,
        ascending: expr.asc.unwrap_or(true),
    })
}

fn map_insert_source(query: sqlast::Query) -> DbResult<InsertSource> {
    match &*query.body {
        sqlast::SetExpr::Values(_) => {
            let sqlast::SetExpr::Values(values) = *query.body else {
                unreachable!("matched above");
            };
            if values.rows.is_empty() {
                return Err(DbError::Parser("INSERT requires at least one row".into()));
            }
            let rows = values
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(map_expr).collect::<DbResult<Vec<_>>>())
                .collect::<DbResult<Vec<_>>>()?;
            Ok(InsertSource::Values(rows))
        }
        sqlast::SetExpr::Select(_) => Ok(InsertSource::Select(Box::new(map_query(query)?))),
        _ => Err(DbError::Parser(
            "INSERT expects VALUES list or SELECT".into(),
        )),
    }
}

fn map_select_item(item: sqlast::SelectItem) -> DbResult<SelectValue> {
    match item {
        sqlast::SelectItem::Wildcard(options) => {
            ensure_plain_wildcard(&options)?;
            Ok(SelectValue::Wildcard)
        }
        sqlast::SelectItem::QualifiedWildcard(name, options) => {
            ensure_plain_wildcard(&options)?;
            Ok(SelectValue::TableWildcard(normalize_object_name(&name)?))
        }
        sqlast::SelectItem::UnnamedExpr(expr) => Ok(SelectValue::Expression {
            expr: map_expr(expr)?,
            alias: None,
        }),
        sqlast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectValue::Expression {
            expr: map_expr(expr)?,
            alias: Some(normalize_ident_owned(alias)),
        }),
    }
}

fn map_expr(expr: sqlast::Expr) -> DbResult<Expr> {
    use sqlast::Expr as SqlExpr;

    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::ColumnRef(ColumnName::unqualified(
            normalize_ident_owned(ident),
        ))),
        SqlExpr::CompoundIdentifier(idents) => match idents.as_slice() {
            [table, column] => Ok(Expr::ColumnRef(ColumnName::qualified(
                normalize_ident(table),
                normalize_ident(column),
            ))),
            _ => Err(DbError::Parser(
                "column references support at most one qualifier".into(),
            )),
        },
        SqlExpr::Value(value) => Ok(Expr::Literal(map_value(value)?)),
        SqlExpr::BinaryOp { left, op, right } => {
            let left = map_expr(*left)?;
            let right = map_expr(*right)?;
            map_binary(left, op, right)
        }
        SqlExpr::UnaryOp { op, expr } => {
            let inner = map_expr(*expr)?;
            match op {
                sqlast::UnaryOperator::Not => Ok(Expr::Not(Box::new(inner))),
                sqlast::UnaryOperator::Plus => Ok(inner),
                sqlast::UnaryOperator::Minus => Ok(Expr::arith(
                    Expr::Literal(Value::Int(0)),
                    ArithOp::Sub,
                    inner,
                )),
                other => Err(DbError::Parser(format!(
                    "unsupported unary operator: {other:?}"
                ))),
            }
        }
        SqlExpr::Nested(expr) => map_expr(*expr),
        // BETWEEN desugars into a two-compare AND.
        SqlExpr::Between {
            expr,
            negated,
            low,
            high,
        } => {
            let subject = map_expr(*expr)?;
            let range = Expr::and(
                Expr::compare(subject.clone(), CompareOp::Ge, map_expr(*low)?),
                Expr::compare(subject, CompareOp::Le, map_expr(*high)?),
            );
            Ok(if negated {
                Expr::Not(Box::new(range))
            } else {
                range
            })
        }
        SqlExpr::Like {
            negated,
            expr,
            pattern,
            escape_char,
        } => {
            if escape_char.is_some() {
                return Err(DbError::Parser("LIKE ... ESCAPE not supported".into()));
            }
            Ok(Expr::StringMatch {
                op: MatchOp::Like,
                expr: Box::new(map_expr(*expr)?),
                pattern: Box::new(map_expr(*pattern)?),
                negated,
            })
        }
        SqlExpr::SimilarTo {
            negated,
            expr,
            pattern,
            escape_char,
        } => {
            if escape_char.is_some() {
                return Err(DbError::Parser("SIMILAR TO ... ESCAPE not supported".into()));
            }
            Ok(Expr::StringMatch {
                op: MatchOp::SimilarTo,
                expr: Box::new(map_expr(*expr)?),
                pattern: Box::new(map_expr(*pattern)?),
                negated,
            })
        }
        SqlExpr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: Box::new(map_expr(*expr)?),
            list: list.into_iter().map(map_expr).collect::<DbResult<Vec<_>>>()?,
            negated,
        }),
        SqlExpr::InSubquery {
            expr,
            subquery,
            negated,
        } => Ok(Expr::InSelect {
            expr: Box::new(map_expr(*expr)?),
            query: Box::new(map_query(*subquery)?),
            negated,
        }),
        SqlExpr::Exists { subquery, negated } => {
            let exists = Expr::Exists(Box::new(map_query(*subquery)?));
            Ok(if negated {
                Expr::Not(Box::new(exists))
            } else {
                exists
            })
        }
        SqlExpr::Subquery(subquery) => Ok(Expr::ScalarSubquery(Box::new(map_query(*subquery)?))),
        SqlExpr::IsNull(expr) => Ok(Expr::IsNull {
            expr: Box::new(map_expr(*expr)?),
            negated: false,
        }),
        SqlExpr::IsNotNull(expr) => Ok(Expr::IsNull {
            expr: Box::new(map_expr(*expr)?),
            negated: true,
        }),
        SqlExpr::Function(func) => map_function(func),
        other => Err(DbError::Parser(format!("unsupported expr: {other:?}"))),
    }
}

fn map_binary(left: Expr, op: sqlast::BinaryOperator, right: Expr) -> DbResult<Expr> {
    use sqlast::BinaryOperator as SqlBinary;

    Ok(match op {
        SqlBinary::Eq => Expr::compare(left, CompareOp::Eq, right),
        SqlBinary::NotEq => Expr::compare(left, CompareOp::Ne, right),
        SqlBinary::Lt => Expr::compare(left, CompareOp::Lt, right),
        SqlBinary::LtEq => Expr::compare(left, CompareOp::Le, right),
        SqlBinary::Gt => Expr::compare(left, CompareOp::Gt, right),
        SqlBinary::GtEq => Expr::compare(left, CompareOp::Ge, right),
        SqlBinary::Plus => Expr::arith(left, ArithOp::Add, right),
        SqlBinary::Minus => Expr::arith(left, ArithOp::Sub, right),
        SqlBinary::Multiply => Expr::arith(left, ArithOp::Mul, right),
        SqlBinary::Divide => Expr::arith(left, ArithOp::Div, right),
        SqlBinary::Modulo => Expr::arith(left, ArithOp::Mod, right),
        // AND/OR flatten into the N-ary representation on construction.
        SqlBinary::And => Expr::and(left, right),
        SqlBinary::Or => Expr::or(left, right),
        other => return Err(DbError::Parser(format!("unsupported operator: {other:?}"))),
    })
}

fn map_function(func: sqlast::Function) -> DbResult<Expr> {
    let name = normalize_object_name(&func.name)?;
    let args = func
        .args
        .into_iter()
        .map(|arg| match arg {
            sqlast::FunctionArg::Unnamed(sqlast::FunctionArgExpr::Expr(e)) => map_expr(e),
            other => Err(DbError::Parser(format!(
                "unsupported function argument: {other:?}"
            ))),
        })
        .collect::<DbResult<Vec<_>>>()?;
    Ok(Expr::FunctionCall { name, args })
}

fn map_value(value: sqlast::Value) -> DbResult<Value> {
    use sqlast::Value as SqlValue;

    match value {
        SqlValue::Number(num, _) => {
            if num.contains(['.', 'e', 'E']) {
                let parsed = num
                    .parse::<f64>()
                    .map_err(|_| DbError::Parser(format!("invalid numeric literal: {num}")))?;
                return Ok(Value::Double(parsed));
            }
            let parsed = num
                .parse::<i64>()
                .map_err(|_| DbError::Parser(format!("invalid int literal: {num}")))?;
            Ok(match i32::try_from(parsed) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::BigInt(parsed),
            })
        }
        SqlValue::SingleQuotedString(s) => Ok(Value::Text(s)),
        SqlValue::Boolean(b) => Ok(Value::Bool(b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(DbError::Parser(format!("unsupported literal: {other:?}"))),
    }
}

/// Map a declared column type via its canonical rendering, so the mapping is
/// insulated from sqlparser's `DataType` surface.
fn map_data_type(dt: &sqlast::DataType) -> DbResult<SqlType> {
    let rendered = dt.to_string().to_uppercase();
    let (base, args) = split_type_args(&rendered);

    let ty = match base {
        "TINYINT" => SqlType::TinyInt,
        "SMALLINT" => SqlType::SmallInt,
        "INT" | "INTEGER" => SqlType::Int,
        "BIGINT" => SqlType::BigInt,
        "FLOAT" | "REAL" => SqlType::Float,
        "DOUBLE" | "DOUBLE PRECISION" => SqlType::Double,
        "NUMERIC" | "DECIMAL" => {
            let precision = args.first().copied().unwrap_or(10).min(u64::from(u8::MAX)) as u8;
            let scale = args.get(1).copied().unwrap_or(0).min(u64::from(u8::MAX)) as u8;
            SqlType::Numeric { precision, scale }
        }
        "CHAR" | "CHARACTER" => {
            SqlType::Char(args.first().copied().unwrap_or(1).min(u64::from(u16::MAX)) as u16)
        }
        "VARCHAR" | "CHARACTER VARYING" => {
            SqlType::Varchar(args.first().copied().unwrap_or(255).min(u64::from(u16::MAX)) as u16)
        }
        "TEXT" | "STRING" => SqlType::Text,
        "DATE" => SqlType::Date,
        "TIME" => SqlType::Time,
        "DATETIME" => SqlType::DateTime,
        "TIMESTAMP" => SqlType::Timestamp,
        "BOOLEAN" | "BOOL" => SqlType::Bool,
        other => return Err(DbError::Parser(format!("unsupported column type: {other}"))),
    };
    Ok(ty)
}

/// Split `"VARCHAR(20)"` into `("VARCHAR", [20])`.
fn split_type_args(rendered: &str) -> (&str, Vec<u64>) {
    match rendered.split_once('(') {
        None => (rendered.trim(), Vec::new()),
        Some((base, rest)) => {
            let args = rest
                .trim_end_matches(')')
                .split(',')
                .filter_map(|part| part.trim().parse::<u64>().ok())
                .collect();
            (base.trim(), args)
        }
    }
}

fn normalize_ident(ident: &sqlast::Ident) -> String {
    ident.value.to_lowercase()
}

fn normalize_ident_owned(ident: sqlast::Ident) -> String {
    ident.value.to_lowercase()
}

fn normalize_object_name(name: &sqlast::ObjectName) -> DbResult<String> {
    name.0
        .first()
        .map(|ident| ident.value.to_lowercase())
        .ok_or_else(|| DbError::Parser("invalid object name".into()))
}

fn first_name(mut names: Vec<sqlast::ObjectName>) -> DbResult<String> {
    if names.is_empty() {
        return Err(DbError::Parser("DROP requires a target".into()));
    }
    normalize_object_name(&names.remove(0))
}

fn table_name_from_with_joins(table: &sqlast::TableWithJoins) -> DbResult<String> {
    if !table.joins.is_empty() {
        return Err(DbError::Parser("joined targets not supported here".into()));
    }
    match &table.relation {
        sqlast::TableFactor::Table { name, .. } => normalize_object_name(name),
        _ => Err(DbError::Parser("unsupported table factor".into())),
    }
}

fn map_index_column(column: &sqlast::OrderByExpr) -> DbResult<String> {
    match &column.expr {
        sqlast::Expr::Identifier(ident) => Ok(normalize_ident(ident)),
        sqlast::Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(normalize_ident)
            .ok_or_else(|| DbError::Parser("invalid identifier".into())),
        other => Err(DbError::Parser(format!(
            "unsupported index column: {other:?}"
        ))),
    }
}

fn ensure_plain_wildcard(options: &sqlast::WildcardAdditionalOptions) -> DbResult<()> {
    let has_options = options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_rename.is_some()
        || options.opt_replace.is_some();
    if has_options {
        Err(DbError::Parser("wildcard options not supported".into()))
    } else {
        Ok(())
    }
}

/// Resolve primary key from inline column constraints and table-level
/// constraints. Returns an error if the PK is defined in both places.
fn resolve_primary_key(
    columns: &[sqlast::ColumnDef],
    constraints: &[sqlast::TableConstraint],
) -> DbResult<Option<Vec<String>>> {
    let inline_pk = extract_inline_primary_key(columns)?;
    let table_pk = extract_primary_key(constraints)?;

    match (table_pk, inline_pk) {
        (Some(_), Some(_)) => Err(DbError::Parser(
            "PRIMARY KEY defined both inline and at table level".into(),
        )),
        (Some(pk), None) | (None, Some(pk)) => Ok(Some(pk)),
        (None, None) => Ok(None),
    }
}

fn extract_primary_key(constraints: &[sqlast::TableConstraint]) -> DbResult<Option<Vec<String>>> {
    use sqlast::TableConstraint;

    for constraint in constraints {
        match constraint {
            TableConstraint::Unique {
                columns,
                is_primary,
                ..
            } if *is_primary => {
                let pk_columns: Vec<String> = columns.iter().map(normalize_ident).collect();

                if pk_columns.is_empty() {
                    return Err(DbError::Parser(
                        "PRIMARY KEY must include at least one column".into(),
                    ));
                }

                return Ok(Some(pk_columns));
            }
            _ => continue,
        }
    }
    Ok(None)
}

/// Non-primary UNIQUE table constraints become candidate keys.
fn extract_unique_keys(constraints: &[sqlast::TableConstraint]) -> Vec<Vec<String>> {
    constraints
        .iter()
        .filter_map(|constraint| match constraint {
            sqlast::TableConstraint::Unique {
                columns,
                is_primary: false,
                ..
            } => Some(columns.iter().map(normalize_ident).collect()),
            _ => None,
        })
        .collect()
}

fn extract_inline_primary_key(columns: &[sqlast::ColumnDef]) -> DbResult<Option<Vec<String>>> {
    use sqlast::ColumnOption;

    let mut pk_columns = Vec::new();
    for column in columns {
        let has_primary_key = column.options.iter().any(|opt| {
            matches!(
                opt.option,
                ColumnOption::Unique {
                    is_primary: true,
                    ..
                }
            )
        });
        if has_primary_key {
            pk_columns.push(normalize_ident(&column.name));
        }
    }

    match pk_columns.len() {
        0 => Ok(None),
        1 => Ok(Some(pk_columns)),
        _ => Err(DbError::Parser(
            "multiple PRIMARY KEY column constraints; use PRIMARY KEY (col1, col2)".into(),
        )),
    }
}
