use crate::query::predicates::{ColumnFilter, ComparisonKind};
use crate::query::row_group_statistics::{ColumnStatistics, StatValue};
use crate::schema::OutputRowSchema;
use crate::storage::FileReader;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// Result of pruning one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Row groups proven to contain no matching row
    pub skip: BTreeSet<usize>,

    /// Rows in the row groups that survive
    pub rows_surviving: u64,

    /// Rows in the whole file
    pub total_rows: u64,
}

impl PruneOutcome {
    /// Every non-empty row group was skipped
    pub fn skips_everything(&self, num_row_groups: usize) -> bool {
        self.rows_surviving == 0 && self.skip.len() == num_row_groups && num_row_groups > 0
    }
}

/// A filter resolved to a column name and a literal in the statistics
/// domain
#[derive(Debug, Clone)]
struct PruneTarget {
    column: String,
    comparison: ComparisonKind,
    literal: StatValue,
}

/// Row-group pruning with min/max column statistics
///
/// ## Decision rule, per row group
/// A row group is skipped when *any* filter proves that no row can satisfy
/// it (filters are ANDed, so one is enough). For `col <op> lit`:
///
/// ```text
/// col <  lit   skip if lit <= min
/// col <= lit   skip if lit <  min
/// col >  lit   skip if lit >= max
/// col >= lit   skip if lit >  max
/// col =  lit   skip if lit <  min or lit > max
/// ```
///
/// ## Never skipped
/// - row groups with zero rows (they contribute nothing anyway)
/// - when the column has no statistics for the row group, or they can't be
///   decoded (logged, the filter just doesn't prune here)
/// - when the column is entirely null in the row group (min/max undefined)
///
/// # Example
/// ```text
/// Filter: age > 30
///
/// rg 0: age [20..25]  → SKIP (30 >= 25)
/// rg 1: age [18..60]  → KEEP
/// rg 2: no stats      → KEEP
/// ```
#[derive(Debug, Clone)]
pub struct PruningEngine {
    targets: Vec<PruneTarget>,
}

impl PruningEngine {
    /// Resolve `filters` against the output schema they were extracted for
    pub fn new(filters: &[ColumnFilter], schema: &OutputRowSchema) -> Self {
        let targets = filters
            .iter()
            .filter_map(|filter| {
                let column = schema.column(filter.column_index)?;
                let literal = StatValue::from_scalar(&filter.literal)?;
                Some(PruneTarget {
                    column: column.name.clone(),
                    comparison: filter.comparison,
                    literal,
                })
            })
            .collect();

        Self { targets }
    }

    pub fn has_filters(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Compute the skip set and surviving row estimate for one file
    pub fn prune(&self, reader: &FileReader) -> PruneOutcome {
        let mut outcome = PruneOutcome::default();

        for row_group in 0..reader.num_row_groups() {
            let rows = reader.row_group_num_rows(row_group).unwrap_or(0);
            outcome.total_rows += rows;

            if rows > 0 && self.row_group_excluded(reader, row_group, rows) {
                outcome.skip.insert(row_group);
            } else {
                outcome.rows_surviving += rows;
            }
        }

        outcome
    }

    fn row_group_excluded(&self, reader: &FileReader, row_group: usize, rows: u64) -> bool {
        for target in &self.targets {
            let Some(root) = reader.find_column(&target.column) else {
                continue;
            };
            let Some(field) = reader.field(root) else {
                continue;
            };
            let Some(raw) = reader.column_statistics(row_group, root) else {
                continue; // No stats, can't prune
            };

            let stats = match ColumnStatistics::decode(raw, field.data_type()) {
                Ok(stats) => stats,
                Err(e) => {
                    debug!(
                        path = %reader.path().display(),
                        row_group,
                        column = %target.column,
                        error = %e,
                        "ignoring undecodable statistics"
                    );
                    continue;
                }
            };

            if stats.null_count == Some(rows) {
                continue;
            }
            let (Some(min), Some(max)) = (&stats.min, &stats.max) else {
                continue;
            };

            if filter_excludes(target.comparison, &target.literal, min, max) {
                debug!(
                    path = %reader.path().display(),
                    row_group,
                    column = %target.column,
                    op = target.comparison.symbol(),
                    min = ?min,
                    max = ?max,
                    literal = ?target.literal,
                    "skipping row group"
                );
                return true;
            }
        }
        false
    }
}

/// Whether `col <kind> literal` is unsatisfiable for every value in
/// `[min, max]`
///
/// Incomparable values never exclude.
pub fn filter_excludes(
    kind: ComparisonKind,
    literal: &StatValue,
    min: &StatValue,
    max: &StatValue,
) -> bool {
    let vs_min = literal.compare(min);
    let vs_max = literal.compare(max);

    match kind {
        ComparisonKind::Lt => matches!(vs_min, Some(Ordering::Less | Ordering::Equal)),
        ComparisonKind::LtEq => vs_min == Some(Ordering::Less),
        ComparisonKind::Gt => matches!(vs_max, Some(Ordering::Greater | Ordering::Equal)),
        ComparisonKind::GtEq => vs_max == Some(Ordering::Greater),
        ComparisonKind::Eq => {
            vs_min == Some(Ordering::Less) || vs_max == Some(Ordering::Greater)
        }
    }
}

/// Prune one file's row groups with `filters`
pub fn prune_row_groups(
    reader: &FileReader,
    filters: &[ColumnFilter],
    schema: &OutputRowSchema,
) -> PruneOutcome {
    PruningEngine::new(filters, schema).prune(reader)
}
