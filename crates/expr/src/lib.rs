//! Expression and query ASTs plus the runtime expression engine.
//!
//! Expressions evaluate against an [`Environment`] of `(schema, tuple)`
//! bindings using SQL three-valued logic: any comparison over a NULL operand
//! yields UNKNOWN (represented as `Value::Null`), and `evaluate_predicate`
//! treats UNKNOWN as false.
//!
//! AND/OR are stored N-ary and flattened on construction, so the planner can
//! treat a top-level WHERE as a flat set of conjuncts.

mod env;
mod eval;
pub mod functions;
mod select;

pub use env::Environment;
pub use select::{
    FromClause, JoinCondition, JoinType, OrderByExpr, SelectClause, SelectValue,
};

use common::{ColumnInfo, ColumnName, DbError, DbResult, Schema};
use std::collections::BTreeSet;
use std::fmt;
use types::{SqlType, Value};

/// Arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The operator with its operands exchanged (not the negation).
    pub fn flipped(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }
}

/// N-ary boolean connectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

/// String pattern matching flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchOp {
    /// SQL LIKE with `%` and `_` wildcards.
    Like,
    /// SIMILAR TO, treated as an anchored regular expression.
    SimilarTo,
}

/// Expression abstract syntax tree.
///
/// `Exists`, `InSelect` and `ScalarSubquery` embed a full [`SelectClause`];
/// uncorrelated subqueries are materialised into literals by the session
/// layer before evaluation ever sees them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    ColumnRef(ColumnName),
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Flattened N-ary AND/OR; `Expr::and_of` / `Expr::or_of` maintain the
    /// flattening invariant.
    Boolean {
        op: BoolOp,
        terms: Vec<Expr>,
    },
    Not(Box<Expr>),
    StringMatch {
        op: MatchOp,
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Exists(Box<SelectClause>),
    InSelect {
        expr: Box<Expr>,
        query: Box<SelectClause>,
        negated: bool,
    },
    ScalarSubquery(Box<SelectClause>),
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal(v: Value) -> Expr {
        Expr::Literal(v)
    }

    pub fn column(name: ColumnName) -> Expr {
        Expr::ColumnRef(name)
    }

    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn arith(left: Expr, op: ArithOp, right: Expr) -> Expr {
        Expr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build an N-ary AND, splicing in the terms of any AND operand so the
    /// result is always flat. Zero terms collapse to TRUE, one term to the
    /// term itself.
    pub fn and_of(terms: Vec<Expr>) -> Expr {
        Self::boolean_of(BoolOp::And, terms, true)
    }

    /// Build an N-ary OR with the same flattening rule; zero terms collapse
    /// to FALSE.
    pub fn or_of(terms: Vec<Expr>) -> Expr {
        Self::boolean_of(BoolOp::Or, terms, false)
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Self::and_of(vec![left, right])
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Self::or_of(vec![left, right])
    }

    fn boolean_of(op: BoolOp, terms: Vec<Expr>, empty: bool) -> Expr {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Expr::Boolean { op: inner, terms } if inner == op => flat.extend(terms),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Literal(Value::Bool(empty)),
            1 => flat.into_iter().next().unwrap(),
            _ => Expr::Boolean { op, terms: flat },
        }
    }

    /// Split a predicate on its top-level AND into conjuncts. Non-AND
    /// expressions are a single conjunct.
    pub fn into_conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::Boolean {
                op: BoolOp::And,
                terms,
            } => terms,
            other => vec![other],
        }
    }

    /// Collect every column name referenced by this expression. Embedded
    /// subqueries resolve their own references and contribute nothing.
    pub fn all_symbols(&self, out: &mut BTreeSet<ColumnName>) {
        match self {
            Expr::Literal(_) | Expr::Exists(_) | Expr::ScalarSubquery(_) => {}
            Expr::ColumnRef(name) => {
                out.insert(name.clone());
            }
            Expr::Arith { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.all_symbols(out);
                right.all_symbols(out);
            }
            Expr::Boolean { terms, .. } => {
                for t in terms {
                    t.all_symbols(out);
                }
            }
            Expr::Not(e) | Expr::IsNull { expr: e, .. } => e.all_symbols(out),
            Expr::StringMatch { expr, pattern, .. } => {
                expr.all_symbols(out);
                pattern.all_symbols(out);
            }
            Expr::InList { expr, list, .. } => {
                expr.all_symbols(out);
                for e in list {
                    e.all_symbols(out);
                }
            }
            Expr::InSelect { expr, .. } => expr.all_symbols(out),
            Expr::FunctionCall { args, .. } => {
                for a in args {
                    a.all_symbols(out);
                }
            }
        }
    }

    /// Infer the descriptor of this expression's result against a schema.
    ///
    /// Fails with a `Schema` error when a column reference cannot be
    /// resolved and a `Type` error when operand types cannot combine.
    pub fn column_info(&self, schema: &Schema) -> DbResult<ColumnInfo> {
        let bool_result = |e: &Expr, nullable: bool| ColumnInfo {
            table: None,
            name: e.to_string(),
            ty: SqlType::Bool,
            nullable,
        };

        match self {
            Expr::Literal(v) => Ok(ColumnInfo {
                table: None,
                name: self.to_string(),
                // A bare NULL literal is typeless; TEXT is the neutral choice.
                ty: v.sql_type().unwrap_or(SqlType::Text),
                nullable: v.is_null(),
            }),
            Expr::ColumnRef(name) => {
                let idx = schema.find_column(name)?;
                Ok(schema.column(idx).cloned().expect("index from lookup"))
            }
            Expr::Arith { left, right, .. } => {
                let l = left.column_info(schema)?;
                let r = right.column_info(schema)?;
                let ty = types::coerce::arithmetic_result_type(l.ty, r.ty)
                    .map_err(|e| DbError::Type(e.to_string()))?;
                Ok(ColumnInfo {
                    table: None,
                    name: self.to_string(),
                    ty,
                    nullable: l.nullable || r.nullable,
                })
            }
            Expr::Compare { left, right, .. } => {
                // Resolve both sides so unresolved references surface here.
                left.column_info(schema)?;
                right.column_info(schema)?;
                Ok(bool_result(self, true))
            }
            Expr::Boolean { terms, .. } => {
                for t in terms {
                    t.column_info(schema)?;
                }
                Ok(bool_result(self, true))
            }
            Expr::Not(e) => {
                e.column_info(schema)?;
                Ok(bool_result(self, true))
            }
            Expr::StringMatch { expr, pattern, .. } => {
                expr.column_info(schema)?;
                pattern.column_info(schema)?;
                Ok(bool_result(self, true))
            }
            Expr::InList { expr, list, .. } => {
                expr.column_info(schema)?;
                for e in list {
                    e.column_info(schema)?;
                }
                Ok(bool_result(self, true))
            }
            Expr::IsNull { expr, .. } => {
                expr.column_info(schema)?;
                Ok(bool_result(self, false))
            }
            Expr::Exists(_) => Ok(bool_result(self, false)),
            Expr::InSelect { expr, .. } => {
                expr.column_info(schema)?;
                Ok(bool_result(self, true))
            }
            Expr::ScalarSubquery(_) => Err(DbError::Schema(
                "scalar subquery must be materialised before type inference".into(),
            )),
            Expr::FunctionCall { name, args } => {
                let func = functions::registry().get(name).ok_or_else(|| {
                    DbError::Schema(format!("unknown function '{name}'"))
                })?;
                let mut arg_types = Vec::with_capacity(args.len());
                let mut nullable = false;
                for a in args {
                    let info = a.column_info(schema)?;
                    nullable |= info.nullable;
                    arg_types.push(info.ty);
                }
                Ok(ColumnInfo {
                    table: None,
                    name: self.to_string(),
                    ty: (func.return_type)(&arg_types)?,
                    nullable,
                })
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => match v {
                Value::Text(s) => write!(f, "'{s}'"),
                other => write!(f, "{other}"),
            },
            Expr::ColumnRef(name) => write!(f, "{name}"),
            Expr::Arith { op, left, right } => {
                let sym = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div => "/",
                    ArithOp::Mod => "%",
                };
                write!(f, "{left} {sym} {right}")
            }
            Expr::Compare { op, left, right } => {
                let sym = match op {
                    CompareOp::Eq => "=",
                    CompareOp::Ne => "!=",
                    CompareOp::Lt => "<",
                    CompareOp::Le => "<=",
                    CompareOp::Gt => ">",
                    CompareOp::Ge => ">=",
                };
                write!(f, "{left} {sym} {right}")
            }
            Expr::Boolean { op, terms } => {
                let sym = match op {
                    BoolOp::And => " AND ",
                    BoolOp::Or => " OR ",
                };
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{sym}")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Expr::Not(e) => write!(f, "NOT {e}"),
            Expr::StringMatch {
                op,
                expr,
                pattern,
                negated,
            } => {
                let kw = match op {
                    MatchOp::Like => "LIKE",
                    MatchOp::SimilarTo => "SIMILAR TO",
                };
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}{kw} {pattern}")
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}IN (")?;
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Expr::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{expr} IS NOT NULL")
                } else {
                    write!(f, "{expr} IS NULL")
                }
            }
            Expr::Exists(_) => write!(f, "EXISTS (...)"),
            Expr::InSelect { expr, negated, .. } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}IN (...)")
            }
            Expr::ScalarSubquery(_) => write!(f, "(...)"),
            Expr::FunctionCall { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}
