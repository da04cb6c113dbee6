use super::coordinator::ReadCoordinator;
use super::scan_state::{ScanError, ScanState};
use crate::query::{extract_row_group_filters, PruningEngine};
use crate::schema::OutputRowSchema;
use crate::storage::{FileReader, ScanConfig};
use datafusion::logical_expr::Expr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A file that survived planning, with the row groups pruning skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub num_row_groups: usize,
    pub skip: BTreeSet<usize>,
    pub total_rows: u64,
    pub rows_to_read: u64,
}

impl PlannedFile {
    /// Row groups left to read, ascending, 0-based
    pub fn row_groups_to_read(&self) -> Vec<usize> {
        (0..self.num_row_groups)
            .filter(|rg| !self.skip.contains(rg))
            .collect()
    }
}

/// Outcome of planning a scan over a set of files
///
/// Serializable so a leader can plan once and hand the result to every
/// worker; each worker then opens its own readers via `open_worker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPlan {
    pub files: Vec<PlannedFile>,

    /// Files dropped because every row group was skipped
    pub skipped_files: Vec<PathBuf>,

    /// Rows across all input files, before pruning
    pub total_rows: u64,

    /// Estimated rows to read after pruning
    pub rows_to_read: u64,

    /// Uncompressed bytes across all input files
    pub total_byte_size: u64,

    /// Number of filters extracted from the clauses
    pub filters_applied: usize,
}

/// Plan a scan of `paths`: validate schemas and prune row groups
///
/// The first file is validated against `schema`; every later file must
/// have exactly the first file's schema. Restriction clauses are reduced to
/// row-group filters once and applied to every file.
///
/// # Example
/// ```text
/// Files:   a.parquet (3 row groups), b.parquet (2 row groups)
/// Clauses: [age > 30]
///
/// a.parquet rg 0 [20..25] skip, rg 1 [28..40] keep, rg 2 [31..90] keep
/// b.parquet rg 0 [1..10]  skip, rg 1 [2..29]  skip  → file dropped
///
/// Plan: files = [a.parquet skip {0}], skipped_files = [b.parquet]
/// ```
///
/// # Errors
/// I/O and schema errors for any file abort planning. A file whose
/// schema differs from the first file's is `ScanError::SchemaDrift`.
pub fn plan_scan<P: AsRef<Path>>(
    paths: &[P],
    clauses: &[Expr],
    schema: &OutputRowSchema,
) -> Result<ScanPlan, ScanError> {
    let filters = extract_row_group_filters(clauses, schema)?;
    let engine = PruningEngine::new(&filters, schema);

    let mut plan = ScanPlan {
        files: Vec::with_capacity(paths.len()),
        skipped_files: Vec::new(),
        total_rows: 0,
        rows_to_read: 0,
        total_byte_size: 0,
        filters_applied: filters.len(),
    };
    let mut first: Option<FileReader> = None;

    for path in paths {
        let reader = FileReader::open(path)?;

        match &first {
            None => reader.validate_schema(schema)?,
            Some(first) if !first.schema_matches(&reader) => {
                return Err(ScanError::SchemaDrift {
                    path: reader.path().to_path_buf(),
                    first: first.path().to_path_buf(),
                });
            }
            Some(_) => {}
        }

        let outcome = engine.prune(&reader);
        let num_row_groups = reader.num_row_groups();
        plan.total_rows += outcome.total_rows;
        plan.total_byte_size += reader.total_byte_size();

        if outcome.skips_everything(num_row_groups) {
            debug!(path = %reader.path().display(), "skipping file, all row groups pruned");
            plan.skipped_files.push(reader.path().to_path_buf());
        } else {
            plan.rows_to_read += outcome.rows_surviving;
            plan.files.push(PlannedFile {
                path: reader.path().to_path_buf(),
                num_row_groups,
                skip: outcome.skip,
                total_rows: outcome.total_rows,
                rows_to_read: outcome.rows_surviving,
            });
        }

        if first.is_none() {
            first = Some(reader);
        }
    }

    info!(
        files = plan.files.len(),
        skipped_files = plan.skipped_files.len(),
        filters = plan.filters_applied,
        total_rows = plan.total_rows,
        rows_to_read = plan.rows_to_read,
        "planned scan"
    );
    Ok(plan)
}

impl ScanPlan {
    pub fn to_json(&self) -> Result<String, ScanError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Surviving row groups of planned file `file`
    pub fn row_groups_to_read(&self, file: usize) -> Option<Vec<usize>> {
        self.files.get(file).map(PlannedFile::row_groups_to_read)
    }

    /// Number of work items the plan produces
    pub fn num_work_items(&self) -> usize {
        self.files
            .iter()
            .map(|f| f.num_row_groups - f.skip.len())
            .sum()
    }

    /// Open the planned files for a single worker with a private
    /// coordinator
    pub fn open_scan(
        &self,
        schema: &OutputRowSchema,
        config: ScanConfig,
    ) -> Result<ScanState, ScanError> {
        self.populate(ScanState::new(schema.clone(), config))
    }

    /// Open the planned files for one worker of a parallel scan
    ///
    /// Every worker gets its own file handles; only `coordinator` is shared.
    pub fn open_worker(
        &self,
        schema: &OutputRowSchema,
        config: ScanConfig,
        coordinator: Arc<ReadCoordinator>,
    ) -> Result<ScanState, ScanError> {
        self.populate(ScanState::with_coordinator(schema.clone(), config, coordinator))
    }

    fn populate(&self, mut state: ScanState) -> Result<ScanState, ScanError> {
        for file in &self.files {
            state.add_file(&file.path, &file.skip)?;
        }
        state.build_read_list();
        Ok(state)
    }
}

/// Explain output: surviving row groups per file, numbered from 1 the way
/// parquet tooling numbers them
impl std::fmt::Display for ScanPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for file in &self.files {
            let row_groups: Vec<String> = file
                .row_groups_to_read()
                .iter()
                .map(|rg| (rg + 1).to_string())
                .collect();
            writeln!(f, "Reading file {}", file.path.display())?;
            writeln!(f, "  Row groups: {}", row_groups.join(", "))?;
        }
        for path in &self.skipped_files {
            writeln!(f, "Skipped file {}", path.display())?;
        }
        write!(
            f,
            "Rows: {} of {} ({} filter(s))",
            self.rows_to_read, self.total_rows, self.filters_applied
        )
    }
}
