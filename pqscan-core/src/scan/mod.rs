//! Execution-time scan machinery
//!
//! - `coordinator`: lock-free shared cursor handing out work-list indices
//! - `read_list`: the ordered (file, row group) work list
//! - `scan_state`: per-worker state serving rows one at a time
//! - `planner`: validates files and prunes row groups before execution
//! - `sample`: stride sampling over all rows

pub mod coordinator;
pub mod planner;
pub mod read_list;
pub mod sample;
pub mod scan_state;

pub use coordinator::ReadCoordinator;
pub use planner::{plan_scan, PlannedFile, ScanPlan};
pub use read_list::{ReadList, RowGroupWorkItem};
pub use sample::{sample_rows, Sample};
pub use scan_state::{ScanError, ScanState};
