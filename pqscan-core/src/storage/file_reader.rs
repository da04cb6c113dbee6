use super::arena::RowArena;
use super::column_buffer::ColumnChunkBuffer;
use super::config::ScanConfig;
use super::datum::{Datum, Value};
use super::decode::{BindFailure, ColumnDecoder};
use crate::schema::OutputRowSchema;
use arrow::array::{new_empty_array, Array, ArrayRef};
use arrow::datatypes::{DataType, FieldRef, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use memmap2::Mmap;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder,
};
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use parquet::file::reader::ChunkReader;
use parquet::file::statistics::Statistics;
use parquet::schema::types::SchemaDescriptor;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether `next_row` materializes values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Materialize,

    /// Advance the row position (and row groups) without decoding anything.
    /// Every output slot comes back null. Used to skip rows cheaply while
    /// collecting sparse samples.
    Fake,
}

/// Output column bound to a top-level file column
#[derive(Debug, Clone)]
struct ColumnBinding {
    name: String,
    root: usize,
    decoder: ColumnDecoder,
}

/// One open parquet file
///
/// Opening reads only the footer: schema, row-group count and per
/// row-group metadata/statistics. Column data is read one row group at a
/// time by `buffer_row_group`, for the columns the bound output schema
/// marks as used, and handed out row by row through `next_row`.
///
/// Variable-length values for the current row are decoded into a
/// `RowArena` owned by the reader. The arena is reset at the start of
/// every row and on every row-group switch.
#[derive(Debug)]
pub struct FileReader {
    path: PathBuf,
    file: File,
    metadata: ArrowReaderMetadata,

    /// Read-only mapping of the whole file, held while the scan config
    /// asks for mapped reads
    mapped: Option<Bytes>,

    /// Leaf column index for each top-level column that is a primitive,
    /// `None` for lists (their leaf statistics describe elements)
    root_leaf: Vec<Option<usize>>,

    /// One slot per output column, `None` for unused columns
    bindings: Vec<Option<ColumnBinding>>,
    buffers: Vec<Option<ColumnChunkBuffer>>,
    arena: RowArena,

    row_group: Option<usize>,
    row: usize,
    num_rows: usize,
}

impl FileReader {
    /// Open a parquet file and read its footer
    ///
    /// # Errors
    /// `ReaderError::Open` if the file can't be opened,
    /// `ReaderError::Parquet` if it isn't a readable parquet container.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReaderError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ReaderError::Open(path.clone(), e))?;
        let metadata = ArrowReaderMetadata::load(&file, ArrowReaderOptions::new())
            .map_err(|e| ReaderError::Parquet(path.clone(), e))?;
        let root_leaf = primitive_root_leaves(metadata.parquet_schema());

        debug!(
            path = %path.display(),
            row_groups = metadata.metadata().num_row_groups(),
            "opened parquet file"
        );

        Ok(Self {
            path,
            file,
            metadata,
            mapped: None,
            root_leaf,
            bindings: Vec::new(),
            buffers: Vec::new(),
            arena: RowArena::new(),
            row_group: None,
            row: 0,
            num_rows: 0,
        })
    }

    /// Open and bind in one step
    pub fn open_for<P: AsRef<Path>>(path: P, schema: &OutputRowSchema) -> Result<Self, ReaderError> {
        let mut reader = Self::open(path)?;
        reader.bind(schema)?;
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arrow view of the file schema
    pub fn schema(&self) -> &SchemaRef {
        self.metadata.schema()
    }

    pub fn num_row_groups(&self) -> usize {
        self.metadata.metadata().num_row_groups()
    }

    pub fn row_group_num_rows(&self, row_group: usize) -> Option<u64> {
        self.metadata
            .metadata()
            .row_groups()
            .get(row_group)
            .map(|rg| rg.num_rows().max(0) as u64)
    }

    pub fn total_rows(&self) -> u64 {
        self.metadata
            .metadata()
            .row_groups()
            .iter()
            .map(|rg| rg.num_rows().max(0) as u64)
            .sum()
    }

    /// Uncompressed size of all row groups as recorded in the footer
    pub fn total_byte_size(&self) -> u64 {
        self.metadata
            .metadata()
            .row_groups()
            .iter()
            .map(|rg| rg.total_byte_size().max(0) as u64)
            .sum()
    }

    /// Case-insensitive lookup of a top-level column
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.schema()
            .fields()
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
    }

    pub fn field(&self, root: usize) -> Option<&FieldRef> {
        self.schema().fields().get(root)
    }

    /// Footer statistics of top-level column `root` in `row_group`
    ///
    /// `None` when the chunk carries no statistics, when the column is a
    /// list (leaf statistics describe elements, not rows) or when either
    /// index is out of range.
    pub fn column_statistics(&self, row_group: usize, root: usize) -> Option<&Statistics> {
        let leaf = self.root_leaf.get(root).copied().flatten()?;
        self.metadata
            .metadata()
            .row_groups()
            .get(row_group)?
            .columns()
            .get(leaf)?
            .statistics()
    }

    /// Whether the chunk may contain nulls: true when statistics say so or
    /// when there are no statistics at all
    fn chunk_has_nulls(&self, row_group: usize, root: usize) -> bool {
        self.column_statistics(row_group, root)
            .and_then(Statistics::null_count_opt)
            .map_or(true, |n| n > 0)
    }

    /// Same column names (case-insensitive) and types, in the same order
    pub fn schema_matches(&self, other: &FileReader) -> bool {
        let ours = self.schema().fields();
        let theirs = other.schema().fields();
        ours.len() == theirs.len()
            && ours.iter().zip(theirs.iter()).all(|(a, b)| {
                a.name().eq_ignore_ascii_case(b.name()) && a.data_type() == b.data_type()
            })
    }

    /// Check that every used output column exists in this file with a
    /// readable type, without changing the reader
    ///
    /// Nested structs, maps and lists of lists are rejected here, before
    /// any row group is read.
    pub fn validate_schema(&self, schema: &OutputRowSchema) -> Result<(), ReaderError> {
        self.resolve(schema).map(|_| ())
    }

    /// Validate `schema` and make it the layout produced by `next_row`
    ///
    /// Drops any buffered row group.
    pub fn bind(&mut self, schema: &OutputRowSchema) -> Result<(), ReaderError> {
        self.bindings = self.resolve(schema)?;
        self.discard_buffers();
        Ok(())
    }

    fn resolve(&self, schema: &OutputRowSchema) -> Result<Vec<Option<ColumnBinding>>, ReaderError> {
        let mut bindings = Vec::with_capacity(schema.len());

        for column in schema.columns() {
            if !column.used {
                bindings.push(None);
                continue;
            }

            let root = self
                .find_column(&column.name)
                .ok_or_else(|| ReaderError::MissingColumn {
                    path: self.path.clone(),
                    column: column.name.clone(),
                })?;
            let file_type = self.schema().field(root).data_type();

            let decoder = ColumnDecoder::bind(file_type, &column.data_type).map_err(|failure| {
                let expected = column.data_type.to_string();
                let column = column.name.clone();
                let data_type = file_type.clone();
                match failure {
                    BindFailure::TypeMismatch => ReaderError::TypeMismatch {
                        column,
                        found: data_type,
                        expected,
                    },
                    BindFailure::UnsupportedNesting => {
                        ReaderError::UnsupportedNesting { column, data_type }
                    }
                    BindFailure::UnsupportedType => ReaderError::UnsupportedType { column, data_type },
                }
            })?;

            bindings.push(Some(ColumnBinding {
                name: column.name.clone(),
                root,
                decoder,
            }));
        }

        Ok(bindings)
    }

    /// Read the used columns of `row_group` into memory, replacing the
    /// previously buffered row group
    ///
    /// With `config.use_threads` and more than one used column, columns are
    /// decoded in parallel, each task reading through its own file handle
    /// (or the shared mapping under `config.use_mmap`).
    pub fn buffer_row_group(
        &mut self,
        row_group: usize,
        config: &ScanConfig,
    ) -> Result<(), ReaderError> {
        let num_rows =
            self.row_group_num_rows(row_group)
                .ok_or_else(|| ReaderError::RowGroupOutOfRange {
                    path: self.path.clone(),
                    row_group,
                    num_row_groups: self.num_row_groups(),
                })? as usize;

        self.discard_buffers();

        if !config.use_mmap {
            self.mapped = None;
        } else if self.mapped.is_none() {
            self.mapped = Some(self.map_file()?);
        }

        let mut roots: Vec<usize> = self.bindings.iter().flatten().map(|b| b.root).collect();
        roots.sort_unstable();
        roots.dedup();

        let batch_size = config.batch_size_for(num_rows);
        let arrays: HashMap<usize, ArrayRef> = if roots.is_empty() {
            HashMap::new()
        } else if config.use_threads && roots.len() > 1 {
            roots
                .par_iter()
                .map(|&root| -> Result<(usize, ArrayRef), ReaderError> {
                    let mut columns = self.read_columns(row_group, &[root], batch_size, true)?;
                    let array = columns.pop().ok_or_else(|| ReaderError::Decode {
                        path: self.path.clone(),
                        column: self.column_name(root),
                        row: 0,
                        reason: "reader returned no column".to_string(),
                    })?;
                    Ok((root, array))
                })
                .collect::<Result<HashMap<_, _>, ReaderError>>()?
        } else {
            let columns = self.read_columns(row_group, &roots, batch_size, false)?;
            roots.iter().copied().zip(columns).collect()
        };

        let mut buffers = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let buffer = match binding {
                Some(binding) => {
                    let array = arrays.get(&binding.root).cloned().ok_or_else(|| {
                        ReaderError::Decode {
                            path: self.path.clone(),
                            column: binding.name.clone(),
                            row: 0,
                            reason: "column missing from decoded row group".to_string(),
                        }
                    })?;
                    let has_nulls = self.chunk_has_nulls(row_group, binding.root);
                    Some(ColumnChunkBuffer::new(array, binding.decoder.clone(), has_nulls))
                }
                None => None,
            };
            buffers.push(buffer);
        }

        self.buffers = buffers;
        self.row_group = Some(row_group);
        self.row = 0;
        self.num_rows = num_rows;

        debug!(
            path = %self.path.display(),
            row_group,
            rows = num_rows,
            columns = roots.len(),
            "buffered row group"
        );
        Ok(())
    }

    fn map_file(&self) -> Result<Bytes, ReaderError> {
        // SAFETY: the mapping is read-only and files are not rewritten in
        // place while a scan holds them open
        let mmap =
            unsafe { Mmap::map(&self.file) }.map_err(|e| ReaderError::Open(self.path.clone(), e))?;
        #[cfg(unix)]
        {
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }
        debug!(path = %self.path.display(), bytes = mmap.len(), "mapped parquet file");
        Ok(Bytes::from_owner(mmap))
    }

    /// Decode top-level columns `roots` (ascending) of one row group, one
    /// array per root
    fn read_columns(
        &self,
        row_group: usize,
        roots: &[usize],
        batch_size: usize,
        own_handle: bool,
    ) -> Result<Vec<ArrayRef>, ReaderError> {
        let mask = ProjectionMask::roots(self.metadata.parquet_schema(), roots.iter().copied());

        let batches = match &self.mapped {
            Some(bytes) => self.read_batches(bytes.clone(), row_group, mask, batch_size)?,
            None => {
                // Cloned descriptors share a seek position, so parallel
                // readers need their own
                let file = if own_handle {
                    File::open(&self.path)
                } else {
                    self.file.try_clone()
                }
                .map_err(|e| ReaderError::Open(self.path.clone(), e))?;
                self.read_batches(file, row_group, mask, batch_size)?
            }
        };

        let mut columns = Vec::with_capacity(roots.len());
        for (pos, &root) in roots.iter().enumerate() {
            let array = match batches.as_slice() {
                [] => new_empty_array(self.schema().field(root).data_type()),
                [batch] => batch.column(pos).clone(),
                many => {
                    let chunks: Vec<&dyn Array> =
                        many.iter().map(|b| b.column(pos).as_ref()).collect();
                    arrow::compute::concat(&chunks)
                        .map_err(|e| ReaderError::Arrow(self.path.clone(), e))?
                }
            };
            columns.push(array);
        }
        Ok(columns)
    }

    fn read_batches<T: ChunkReader + 'static>(
        &self,
        source: T,
        row_group: usize,
        mask: ProjectionMask,
        batch_size: usize,
    ) -> Result<Vec<RecordBatch>, ReaderError> {
        let reader = ParquetRecordBatchReaderBuilder::new_with_metadata(source, self.metadata.clone())
            .with_row_groups(vec![row_group])
            .with_projection(mask)
            .with_batch_size(batch_size)
            .build()
            .map_err(|e| ReaderError::Parquet(self.path.clone(), e))?;

        reader
            .collect::<Result<Vec<RecordBatch>, ArrowError>>()
            .map_err(|e| ReaderError::Arrow(self.path.clone(), e))
    }

    fn column_name(&self, root: usize) -> String {
        self.field(root)
            .map(|f| f.name().clone())
            .unwrap_or_else(|| format!("#{}", root))
    }

    /// Fill `datums` (one slot per output column) with the next row of the
    /// buffered row group
    ///
    /// Returns `Ok(false)` when the row group is exhausted or none is
    /// buffered. Unused columns are always null, as is everything in
    /// `ReadMode::Fake`.
    pub fn next_row(&mut self, datums: &mut [Datum], mode: ReadMode) -> Result<bool, ReaderError> {
        self.arena.reset();

        if self.row_group.is_none() || self.row >= self.num_rows {
            return Ok(false);
        }

        for (i, slot) in datums.iter_mut().enumerate() {
            let Some(buffer) = self.buffers.get_mut(i).and_then(Option::as_mut) else {
                *slot = Datum::Null;
                continue;
            };

            if mode == ReadMode::Fake {
                buffer.skip();
                *slot = Datum::Null;
                continue;
            }

            let column = || {
                self.bindings
                    .get(i)
                    .and_then(Option::as_ref)
                    .map(|b| b.name.clone())
                    .unwrap_or_default()
            };
            *slot = match buffer.next_value(&mut self.arena) {
                Ok(Some(datum)) => datum,
                Ok(None) => {
                    return Err(ReaderError::Decode {
                        path: self.path.clone(),
                        column: column(),
                        row: self.row,
                        reason: "column chunk shorter than row group".to_string(),
                    })
                }
                Err(reason) => {
                    return Err(ReaderError::Decode {
                        path: self.path.clone(),
                        column: column(),
                        row: self.row,
                        reason,
                    })
                }
            };
        }

        self.row += 1;
        Ok(true)
    }

    /// Random access into the buffered row group, detached from the arena
    ///
    /// Unused columns read as `Value::Null`. Does not move the row cursor.
    pub fn read_row(&self, row: usize, column: usize) -> Result<Value, ReaderError> {
        let decode_error = |reason: String| ReaderError::Decode {
            path: self.path.clone(),
            column: self
                .bindings
                .get(column)
                .and_then(Option::as_ref)
                .map(|b| b.name.clone())
                .unwrap_or_else(|| format!("#{}", column)),
            row,
            reason,
        };

        if self.row_group.is_none() {
            return Err(decode_error("no row group buffered".to_string()));
        }
        let Some(buffer) = self.buffers.get(column).and_then(Option::as_ref) else {
            return Ok(Value::Null);
        };

        let mut scratch = RowArena::new();
        let datum = buffer.value_at(row, &mut scratch).map_err(decode_error)?;
        Ok(datum.resolve(&scratch).to_owned_value())
    }

    /// Arena holding the current row's variable-length values
    pub fn arena(&self) -> &RowArena {
        &self.arena
    }

    pub fn current_row_group(&self) -> Option<usize> {
        self.row_group
    }

    /// Rows of the buffered row group already handed out
    pub fn row_position(&self) -> usize {
        self.row
    }

    /// True when nothing is buffered or every buffered row has been read
    pub fn finished_row_group(&self) -> bool {
        self.row_group.is_none() || self.row >= self.num_rows
    }

    /// Whether row groups are currently read through a memory mapping
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Drop buffered column data; the next read must buffer a row group
    pub fn discard_buffers(&mut self) {
        self.buffers.clear();
        self.arena.reset();
        self.row_group = None;
        self.row = 0;
        self.num_rows = 0;
    }
}

/// Leaf index of every top-level primitive column
fn primitive_root_leaves(descr: &SchemaDescriptor) -> Vec<Option<usize>> {
    let roots = descr.root_schema().get_fields();
    let mut leaves = vec![None; roots.len()];

    for leaf in 0..descr.num_columns() {
        let root = descr.get_column_root_idx(leaf);
        if roots.get(root).is_some_and(|r| r.is_primitive()) {
            leaves[root] = Some(leaf);
        }
    }
    leaves
}

/// Errors from opening, validating and decoding a parquet file
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Failed to open file {0}: {1}")]
    Open(PathBuf, std::io::Error),

    #[error("Failed to read parquet file {0}: {1}")]
    Parquet(PathBuf, ParquetError),

    #[error("Column '{column}' does not exist in file {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Type mismatch on column '{column}': file type {found} cannot be read as {expected}")]
    TypeMismatch {
        column: String,
        found: DataType,
        expected: String,
    },

    #[error("Column '{column}' has unsupported nesting ({data_type}); only one level of list of primitives is readable")]
    UnsupportedNesting { column: String, data_type: DataType },

    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },

    #[error("Row group {row_group} out of range for {path} ({num_row_groups} row groups)")]
    RowGroupOutOfRange {
        path: PathBuf,
        row_group: usize,
        num_row_groups: usize,
    },

    #[error("Failed to decode column '{column}' at row {row} of {path}: {reason}")]
    Decode {
        path: PathBuf,
        column: String,
        row: usize,
        reason: String,
    },

    #[error("Arrow error reading {0}: {1}")]
    Arrow(PathBuf, ArrowError),
}
