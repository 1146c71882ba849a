//! Query AST: SELECT clauses and FROM trees.
//!
//! These live alongside [`Expr`](crate::Expr) because subquery expressions
//! embed a `SelectClause` and select clauses embed expressions.

use crate::Expr;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

impl JoinType {
    pub fn is_outer(&self) -> bool {
        matches!(
            self,
            JoinType::LeftOuter | JoinType::RightOuter | JoinType::FullOuter
        )
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
            JoinType::Cross => "CROSS",
        };
        write!(f, "{s}")
    }
}

/// How a join pairs rows: no condition (CROSS or plain comma), NATURAL,
/// USING(cols), or an explicit ON expression.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum JoinCondition {
    None,
    Natural,
    Using(Vec<String>),
    On(Expr),
}

/// A FROM-clause tree node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FromClause {
    BaseTable {
        table: String,
        alias: Option<String>,
    },
    /// Derived table: `(SELECT ...) AS alias`. SQL requires the alias.
    Derived {
        query: Box<SelectClause>,
        alias: String,
    },
    Join {
        left: Box<FromClause>,
        right: Box<FromClause>,
        join_type: JoinType,
        condition: JoinCondition,
    },
}

impl FromClause {
    pub fn join(
        left: FromClause,
        right: FromClause,
        join_type: JoinType,
        condition: JoinCondition,
    ) -> FromClause {
        FromClause::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            condition,
        }
    }

    /// The name this node exposes to column references, when it has one.
    pub fn result_name(&self) -> Option<&str> {
        match self {
            FromClause::BaseTable { table, alias } => Some(alias.as_deref().unwrap_or(table)),
            FromClause::Derived { alias, .. } => Some(alias),
            FromClause::Join { .. } => None,
        }
    }
}

/// One entry of a select list.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SelectValue {
    /// `*`
    Wildcard,
    /// `qualifier.*`
    TableWildcard(String),
    /// `expr [AS alias]`
    Expression { expr: Expr, alias: Option<String> },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub ascending: bool,
}

/// A parsed SELECT, the planner's input.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SelectClause {
    pub distinct: bool,
    pub values: Vec<SelectValue>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectClause {
    /// A bare `SELECT *` over the given FROM tree; useful as a scaffold in
    /// tests and the planner.
    pub fn star_from(from: FromClause) -> Self {
        Self {
            distinct: false,
            values: vec![SelectValue::Wildcard],
            from: Some(from),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}
