use std::sync::atomic::{AtomicU64, Ordering};

/// Shared cursor into a scan's work list
///
/// This is the entire work-distribution protocol between workers: each
/// `claim_next` is one fetch-and-add, so every caller gets a distinct,
/// previously unclaimed index. There is no partitioning or rebalancing;
/// whoever claims an index first reads that row group, which balances load
/// on its own when row groups differ in size.
///
/// The layout is a single `u64` so a leader can place it in a shared
/// memory region and workers can attach to it. In-process, share it with
/// `Arc<ReadCoordinator>`.
///
/// The coordinator holds no reference to readers or files, only the index.
#[repr(C)]
#[derive(Debug, Default)]
pub struct ReadCoordinator {
    cursor: AtomicU64,
}

impl ReadCoordinator {
    pub const fn new() -> Self {
        Self {
            cursor: AtomicU64::new(0),
        }
    }

    /// Bytes a shared region must reserve to hold one coordinator
    pub const fn shared_size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Claim the next work-list index
    ///
    /// Returns the pre-increment value. Indices at or beyond the work list's
    /// length mean the scan is finished.
    pub fn claim_next(&self) -> u64 {
        // Only atomicity of the counter matters; the work list itself is
        // immutable once workers start
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }

    /// Rewind to the first index
    ///
    /// Only safe between scans: no worker may be claiming concurrently.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }

    /// Number of claims made so far (may exceed the work list's length)
    pub fn claimed(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }
}
