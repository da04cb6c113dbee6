use super::coordinator::ReadCoordinator;
use super::read_list::ReadList;
use crate::query::row_group_statistics::row_group_min;
use crate::query::FilterError;
use crate::schema::OutputRowSchema;
use crate::storage::{
    Datum, FileReader, ReadListStrategy, ReadMode, ReaderError, Row, ScanConfig, Value,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Execution-side state of one worker's scan
///
/// Owns one `FileReader` per input file (workers never share file
/// handles) and the work list built from the surviving row groups of each
/// file. Row groups are claimed through a `ReadCoordinator`, which is
/// either private to this state or shared with other workers scanning the
/// same files with the same work list.
///
/// ## Protocol
/// ```text
/// next():
///   current row group has rows left → decode one row
///   otherwise                       → claim index i from the coordinator
///       i >= len(work list)         → end of scan (terminal)
///       work list[i] = (file, rg)   → buffer rg in file's reader, repeat
/// ```
#[derive(Debug)]
pub struct ScanState {
    schema: OutputRowSchema,
    config: ScanConfig,

    readers: Vec<FileReader>,
    /// Row groups not skipped by pruning, per file, ascending
    surviving: Vec<Vec<usize>>,
    read_list: Option<ReadList>,

    coordinator: Arc<ReadCoordinator>,
    shared_coordinator: bool,

    /// File whose reader holds the row group being served
    current: Option<usize>,
    datums: Vec<Datum>,
    exhausted: bool,
}

impl ScanState {
    /// Scan with its own coordinator (single worker, rescans allowed)
    pub fn new(schema: OutputRowSchema, config: ScanConfig) -> Self {
        Self::build(schema, config, Arc::new(ReadCoordinator::new()), false)
    }

    /// One worker of a parallel scan sharing `coordinator`
    ///
    /// Every worker must add the same files with the same skip sets, in the
    /// same order, so their work lists agree index for index.
    pub fn with_coordinator(
        schema: OutputRowSchema,
        config: ScanConfig,
        coordinator: Arc<ReadCoordinator>,
    ) -> Self {
        Self::build(schema, config, coordinator, true)
    }

    fn build(
        schema: OutputRowSchema,
        config: ScanConfig,
        coordinator: Arc<ReadCoordinator>,
        shared_coordinator: bool,
    ) -> Self {
        let datums = vec![Datum::Null; schema.len()];
        Self {
            schema,
            config,
            readers: Vec::new(),
            surviving: Vec::new(),
            read_list: None,
            coordinator,
            shared_coordinator,
            current: None,
            datums,
            exhausted: false,
        }
    }

    /// Open `path`, validate it against the output schema and queue every
    /// row group not in `skip`
    ///
    /// Files are scanned in the order they are added.
    pub fn add_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        skip: &BTreeSet<usize>,
    ) -> Result<(), ScanError> {
        let reader = FileReader::open_for(path, &self.schema)?;
        let row_groups: Vec<usize> = (0..reader.num_row_groups())
            .filter(|rg| !skip.contains(rg))
            .collect();

        debug!(
            path = %reader.path().display(),
            file_index = self.readers.len(),
            row_groups = row_groups.len(),
            skipped = skip.len(),
            "added file to scan"
        );

        self.readers.push(reader);
        self.surviving.push(row_groups);
        self.read_list = None;
        Ok(())
    }

    /// Build (or return the already built) work list using the configured
    /// strategy
    pub fn build_read_list(&mut self) -> &ReadList {
        let surviving = &self.surviving;
        let readers = &self.readers;
        let strategy = &self.config.strategy;

        self.read_list.get_or_insert_with(|| match strategy {
            ReadListStrategy::Concatenate => ReadList::concatenate(surviving),
            ReadListStrategy::MergeByColumn { column } => {
                let keyed: Vec<Vec<_>> = surviving
                    .iter()
                    .zip(readers)
                    .map(|(row_groups, reader)| {
                        row_groups
                            .iter()
                            .map(|&rg| (rg, row_group_min(reader, rg, column)))
                            .collect()
                    })
                    .collect();
                ReadList::merge_by_keys(&keyed)
            }
        })
    }

    /// Next output row, or `None` once the work list is exhausted
    ///
    /// In `ReadMode::Fake` rows are counted off without decoding; every
    /// value of the returned row is null.
    pub fn next(&mut self, mode: ReadMode) -> Result<Option<Row<'_>>, ScanError> {
        if !self.advance(mode)? {
            return Ok(None);
        }

        let file_index = self.current.unwrap_or_default();
        let reader = self
            .readers
            .get(file_index)
            .ok_or(ScanError::ReaderOutOfRange {
                file_index,
                num_files: self.readers.len(),
            })?;
        Ok(Some(Row::new(&self.schema, &self.datums, reader.arena())))
    }

    /// Move to the next row, claiming and buffering row groups as needed
    fn advance(&mut self, mode: ReadMode) -> Result<bool, ScanError> {
        if self.exhausted {
            return Ok(false);
        }
        self.build_read_list();

        let num_files = self.readers.len();
        loop {
            if let Some(file_index) = self.current {
                let reader = self
                    .readers
                    .get_mut(file_index)
                    .ok_or(ScanError::ReaderOutOfRange {
                        file_index,
                        num_files,
                    })?;
                if reader.next_row(&mut self.datums, mode)? {
                    return Ok(true);
                }
                reader.discard_buffers();
                self.current = None;
            }

            let index = self.coordinator.claim_next();
            let Some(item) = self.read_list.as_ref().and_then(|list| list.get(index)) else {
                trace!(index, "work list exhausted");
                self.exhausted = true;
                return Ok(false);
            };
            trace!(index, file_index = item.file_index, row_group = item.row_group, "claimed");

            let reader = self
                .readers
                .get_mut(item.file_index)
                .ok_or(ScanError::ReaderOutOfRange {
                    file_index: item.file_index,
                    num_files,
                })?;
            reader.buffer_row_group(item.row_group, &self.config)?;
            self.current = Some(item.file_index);
        }
    }

    /// Restart the scan from the first work item
    ///
    /// Buffers are dropped and rebuilt lazily on the next claim. Only a
    /// scan with a private coordinator can rewind; with a shared one the
    /// other workers would have to be stopped first.
    pub fn rescan(&mut self) -> Result<(), ScanError> {
        if self.shared_coordinator {
            return Err(ScanError::Unsupported(
                "rescan of a scan whose coordinator is shared with other workers".to_string(),
            ));
        }

        self.coordinator.reset();
        for reader in &mut self.readers {
            reader.discard_buffers();
        }
        self.current = None;
        self.exhausted = false;
        self.datums.fill(Datum::Null);
        Ok(())
    }

    /// Random access into the row group currently being served
    pub fn read_row(&self, row: usize, column: usize) -> Result<Value, ScanError> {
        let file_index = self.current.ok_or_else(|| {
            ScanError::Unsupported("read_row with no row group buffered".to_string())
        })?;
        let reader = self
            .readers
            .get(file_index)
            .ok_or(ScanError::ReaderOutOfRange {
                file_index,
                num_files: self.readers.len(),
            })?;
        Ok(reader.read_row(row, column)?)
    }

    pub fn schema(&self) -> &OutputRowSchema {
        &self.schema
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<ReadCoordinator> {
        &self.coordinator
    }

    pub fn num_files(&self) -> usize {
        self.readers.len()
    }

    pub fn reader(&self, file_index: usize) -> Option<&FileReader> {
        self.readers.get(file_index)
    }

    /// Rows in all added files, pruned or not
    pub fn total_rows(&self) -> u64 {
        self.readers.iter().map(FileReader::total_rows).sum()
    }

    /// Rows in the row groups queued for reading
    pub fn rows_to_read(&self) -> u64 {
        self.readers
            .iter()
            .zip(&self.surviving)
            .map(|(reader, row_groups)| {
                row_groups
                    .iter()
                    .filter_map(|&rg| reader.row_group_num_rows(rg))
                    .sum::<u64>()
            })
            .sum()
    }

    /// True once a claim ran past the end of the work list
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Errors surfacing from a scan, its planning or sampling
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Work item names file {file_index} but the scan has {num_files} file(s)")]
    ReaderOutOfRange { file_index: usize, num_files: usize },

    #[error("Schema of {path} differs from the schema of {first}")]
    SchemaDrift { path: PathBuf, first: PathBuf },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Failed to (de)serialize scan plan: {0}")]
    Plan(#[from] serde_json::Error),
}
