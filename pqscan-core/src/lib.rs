//! pqscan - read parquet files as a table, row by row
//!
//! Three layers:
//! - `query`: reduces restriction clauses to `column <op> literal` filters
//!   and skips row groups whose min/max statistics prove no row matches
//! - `scan`: flattens surviving (file, row group) pairs into a work list
//!   and hands it out to any number of workers through one atomic cursor
//! - `storage`: opens files, buffers one row group of the used columns at a
//!   time and decodes it into the row format the engine expects
//!
//! ```no_run
//! use pqscan_core::{plan_scan, OutputRowSchema, ReadMode, ScanConfig};
//! use pqscan_core::{OutputColumn, OutputType};
//! use datafusion::prelude::{col, lit};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = OutputRowSchema::new(vec![
//!     OutputColumn::new("id", OutputType::Int64),
//!     OutputColumn::new("age", OutputType::Int32),
//! ]);
//! let plan = plan_scan(&["people.parquet"], &[col("age").gt(lit(30))], &schema)?;
//! let mut scan = plan.open_scan(&schema, ScanConfig::default())?;
//! while let Some(row) = scan.next(ReadMode::Materialize)? {
//!     println!("{}", row);
//! }
//! # Ok(())
//! # }
//! ```

pub mod query;
pub mod scan;
pub mod schema;
pub mod storage;

pub use query::{extract_row_group_filters, prune_row_groups, ColumnFilter, ComparisonKind};
pub use scan::{
    plan_scan, sample_rows, ReadCoordinator, ReadList, RowGroupWorkItem, ScanError, ScanPlan,
    ScanState,
};
pub use schema::{OutputColumn, OutputRowSchema, OutputType};
pub use storage::{FileReader, ReadListStrategy, ReadMode, ReaderError, Row, ScanConfig, Value};
