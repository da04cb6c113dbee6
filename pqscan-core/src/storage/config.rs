use serde::{Deserialize, Serialize};

/// How the flattened (file, row group) work list is ordered
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadListStrategy {
    /// Files in the order they were added, row groups ascending within a file
    #[default]
    Concatenate,

    /// K-way merge of the per-file lists keyed by each row group's minimum
    /// statistic of `column`
    ///
    /// Use this when every input file is sorted on `column`: workers then
    /// see row groups in roughly ascending key order across files.
    /// Row groups without a usable minimum sort ahead of the others.
    MergeByColumn { column: String },
}

/// Per-scan configuration
///
/// Passed into `ScanState::new`; there is no process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Decode the used columns of a row group in parallel (one rayon task
    /// per column)
    ///
    /// Each task opens its own handle to the file, so this trades file
    /// descriptors for wall-clock time on wide row groups.
    pub use_threads: bool,

    /// Upper bound on rows per decoded arrow batch
    ///
    /// `None` decodes a whole row group as one batch. Smaller values lower
    /// the transient memory spike while decoding; the buffered row group is
    /// still concatenated into one array per column afterwards.
    pub batch_size_hint: Option<usize>,

    /// Work list ordering
    pub strategy: ReadListStrategy,

    /// Read column chunks through a read-only memory mapping of each file
    /// instead of positioned reads on a file handle
    #[serde(default)]
    pub use_mmap: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            use_threads: true,
            batch_size_hint: None,
            strategy: ReadListStrategy::Concatenate,
            use_mmap: false,
        }
    }
}

impl ScanConfig {
    /// Decode columns one after another on the calling thread
    pub fn sequential() -> Self {
        Self {
            use_threads: false,
            ..Self::default()
        }
    }

    /// Decode columns of a row group in parallel
    pub fn parallel() -> Self {
        Self {
            use_threads: true,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size_hint = Some(rows.max(1));
        self
    }

    pub fn with_strategy(mut self, strategy: ReadListStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Rows per decoded batch for a row group of `row_group_rows` rows
    pub(crate) fn batch_size_for(&self, row_group_rows: usize) -> usize {
        match self.batch_size_hint {
            Some(hint) => hint.max(1),
            None => row_group_rows.max(1),
        }
    }
}
