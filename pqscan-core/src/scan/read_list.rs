use crate::query::StatValue;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// One unit of scan work: a row group of one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowGroupWorkItem {
    pub file_index: usize,
    pub row_group: usize,
}

impl RowGroupWorkItem {
    pub fn new(file_index: usize, row_group: usize) -> Self {
        Self {
            file_index,
            row_group,
        }
    }
}

/// Ordered work list shared (read-only) by every worker of a scan
///
/// Workers index it with values claimed from the `ReadCoordinator`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadList {
    items: Vec<RowGroupWorkItem>,
}

impl ReadList {
    pub fn from_items(items: Vec<RowGroupWorkItem>) -> Self {
        Self { items }
    }

    /// Files in order, surviving row groups ascending within each file
    ///
    /// `per_file[i]` holds the surviving row groups of file `i`.
    pub fn concatenate(per_file: &[Vec<usize>]) -> Self {
        let items = per_file
            .iter()
            .enumerate()
            .flat_map(|(file_index, row_groups)| {
                let mut row_groups = row_groups.clone();
                row_groups.sort_unstable();
                row_groups
                    .into_iter()
                    .map(move |rg| RowGroupWorkItem::new(file_index, rg))
            })
            .collect();
        Self { items }
    }

    /// K-way merge of per-file row-group lists by sort key
    ///
    /// `per_file[i]` holds `(row_group, key)` for file `i`, in the order the
    /// file should be consumed (ascending row group). The merge repeatedly
    /// takes the head with the smallest key across files; a missing key sorts
    /// first, ties go to the lower file index, then the lower row group.
    /// Each file's own order is preserved.
    pub fn merge_by_keys(per_file: &[Vec<(usize, Option<StatValue>)>]) -> Self {
        let total = per_file.iter().map(Vec::len).sum();
        let mut items = Vec::with_capacity(total);
        let mut heap = BinaryHeap::with_capacity(per_file.len());

        for (file_index, row_groups) in per_file.iter().enumerate() {
            if let Some((row_group, key)) = row_groups.first() {
                heap.push(Reverse(MergeHead {
                    key: key.clone(),
                    file_index,
                    position: 0,
                    row_group: *row_group,
                }));
            }
        }

        while let Some(Reverse(head)) = heap.pop() {
            items.push(RowGroupWorkItem::new(head.file_index, head.row_group));

            let next = head.position + 1;
            if let Some((row_group, key)) = per_file[head.file_index].get(next) {
                heap.push(Reverse(MergeHead {
                    key: key.clone(),
                    file_index: head.file_index,
                    position: next,
                    row_group: *row_group,
                }));
            }
        }

        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve a claimed index; `None` once the list is exhausted
    pub fn get(&self, index: u64) -> Option<RowGroupWorkItem> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.items.get(i))
            .copied()
    }

    pub fn items(&self) -> &[RowGroupWorkItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowGroupWorkItem> {
        self.items.iter()
    }
}

/// Current head of one file's list during the merge
#[derive(Debug, Clone)]
struct MergeHead {
    key: Option<StatValue>,
    file_index: usize,
    position: usize,
    row_group: usize,
}

impl MergeHead {
    fn key_order(&self, other: &Self) -> Ordering {
        match (&self.key, &other.key) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
        }
    }
}

impl Ord for MergeHead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_order(other)
            .then(self.file_index.cmp(&other.file_index))
            .then(self.row_group.cmp(&other.row_group))
    }
}

impl PartialOrd for MergeHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MergeHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeHead {}
