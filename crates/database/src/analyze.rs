//! ANALYZE: recompute table and per-column statistics.

use catalog::{ColumnStats, TableStats};
use common::DbResult;
use storage::{HeapFile, HeapTable};
use types::{Value, coerce};

/// Scan a heap file and produce fresh statistics: physical counts from the
/// page headers, and per-column null counts, distinct estimates and
/// min/max values from a full pass over the tuples.
pub(crate) fn collect_stats(heap: &mut HeapFile, column_count: usize) -> DbResult<TableStats> {
    let physical = heap.stats()?;

    let mut per_column: Vec<Vec<Value>> = vec![Vec::new(); column_count];
    let mut null_counts = vec![0u64; column_count];

    let mut cursor = heap.first_tuple()?;
    while let Some(tuple) = cursor {
        let rid = tuple.rid().expect("heap tuples carry their rid");
        for (ordinal, value) in tuple.values.iter().enumerate().take(column_count) {
            if value.is_null() {
                null_counts[ordinal] += 1;
            } else {
                per_column[ordinal].push(value.clone());
            }
        }
        cursor = heap.next_tuple(rid)?;
    }

    let columns = per_column
        .into_iter()
        .zip(null_counts)
        .map(|(mut values, num_nulls)| {
            values.sort_by(|a, b| {
                coerce::compare(a, b)
                    .ok()
                    .flatten()
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut num_distinct = 0u64;
            let mut previous: Option<&Value> = None;
            for value in &values {
                let is_new = match previous {
                    None => true,
                    Some(prev) => !matches!(
                        coerce::compare(prev, value),
                        Ok(Some(std::cmp::Ordering::Equal))
                    ),
                };
                if is_new {
                    num_distinct += 1;
                }
                previous = Some(value);
            }

            ColumnStats {
                num_distinct,
                num_nulls,
                min: values.first().cloned(),
                max: values.last().cloned(),
            }
        })
        .collect();

    Ok(TableStats {
        num_tuples: physical.num_tuples,
        num_pages: physical.num_pages,
        avg_tuple_size: physical.avg_tuple_size,
        columns,
    })
}
