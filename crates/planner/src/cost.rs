//! Plan cost estimates.
//!
//! `cpu_cost` is the objective the join enumerator minimises; the remaining
//! fields feed parent-node estimates.

use std::fmt;

/// Estimated execution cost of a prepared plan node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlanCost {
    /// Estimated number of tuples the node produces.
    pub num_tuples: f32,
    /// Estimated average size of a produced tuple, in bytes.
    pub avg_tuple_size: f32,
    /// Accumulated CPU effort (tuples touched, predicate evaluations).
    pub cpu_cost: f32,
    /// Estimated block I/O operations.
    pub num_block_ios: u64,
}

impl PlanCost {
    pub fn new(num_tuples: f32, avg_tuple_size: f32, cpu_cost: f32, num_block_ios: u64) -> Self {
        Self {
            num_tuples,
            avg_tuple_size,
            cpu_cost,
            num_block_ios,
        }
    }
}

impl fmt::Display for PlanCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows={:.1} size={:.1} cpu={:.1} ios={}",
            self.num_tuples, self.avg_tuple_size, self.cpu_cost, self.num_block_ios
        )
    }
}
