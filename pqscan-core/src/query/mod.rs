//! Planning-time pruning
//!
//! - `predicates`: turns restriction clauses (DataFusion `Expr`) into
//!   normalized `column <op> literal` filters
//! - `row_group_statistics`: decodes parquet min/max/null-count statistics
//!   into a comparable domain
//! - `pruning`: decides which row groups a set of filters can skip

pub mod predicates;
pub mod pruning;
pub mod row_group_statistics;

pub use predicates::{extract_row_group_filters, ColumnFilter, ComparisonKind, FilterError};
pub use pruning::{filter_excludes, prune_row_groups, PruneOutcome, PruningEngine};
pub use row_group_statistics::{ColumnStatistics, StatValue, StatisticsError};
