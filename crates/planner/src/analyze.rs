//! FROM-clause analysis: classify join leaves and collect conjuncts.
//!
//! A node is a leaf for the join enumerator iff it is a base table, a
//! derived table, an outer join (reordering across one changes semantics),
//! or a NATURAL/USING join (its condition depends on child schemas and its
//! output collapses the shared columns). Plain inner/cross joins dissolve:
//! their ON predicates split on AND into the shared conjunct pool and both
//! children are walked recursively.

use expr::{Expr, FromClause, JoinCondition, JoinType};

/// Result of walking a FROM tree: the enumerator's leaves and the pooled
/// conjuncts (WHERE conjuncts first, then inner-join ON conjuncts in walk
/// order). Conjunct identity is the index into `conjuncts`.
#[derive(Debug)]
pub struct FromAnalysis {
    pub leaves: Vec<FromClause>,
    pub conjuncts: Vec<Expr>,
}

/// Analyse a FROM tree, seeding the conjunct pool with the WHERE conjuncts.
pub fn analyze_from(from: &FromClause, where_conjuncts: Vec<Expr>) -> FromAnalysis {
    let mut analysis = FromAnalysis {
        leaves: Vec::new(),
        conjuncts: where_conjuncts,
    };
    collect(from, &mut analysis);
    analysis
}

fn collect(node: &FromClause, analysis: &mut FromAnalysis) {
    match node {
        FromClause::Join {
            left,
            right,
            join_type: JoinType::Inner | JoinType::Cross,
            condition: condition @ (JoinCondition::On(_) | JoinCondition::None),
        } => {
            if let JoinCondition::On(pred) = condition {
                analysis.conjuncts.extend(pred.clone().into_conjuncts());
            }
            collect(left, analysis);
            collect(right, analysis);
        }
        leaf => analysis.leaves.push(leaf.clone()),
    }
}
