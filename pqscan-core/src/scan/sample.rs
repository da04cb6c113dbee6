use super::scan_state::{ScanError, ScanState};
use crate::schema::OutputRowSchema;
use crate::storage::{ReadMode, ScanConfig, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Rows picked at a fixed stride from a set of files
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub rows: Vec<Vec<Value>>,

    /// Rows in all sampled files
    pub total_rows: u64,
}

/// Collect up to `target_rows` evenly spaced rows from `paths`
///
/// Scans every row group of every file (no pruning) with all columns of
/// `schema` in use. Every `max(1, total_rows / target_rows)`-th row is
/// decoded; rows in between are stepped over in fake mode, which still
/// moves through row groups but decodes nothing.
pub fn sample_rows<P: AsRef<Path>>(
    paths: &[P],
    schema: &OutputRowSchema,
    target_rows: usize,
    config: ScanConfig,
) -> Result<Sample, ScanError> {
    if paths.is_empty() {
        return Err(ScanError::Unsupported(
            "sampling requires at least one file".to_string(),
        ));
    }

    let mut state = ScanState::new(schema.with_all_used(), config);
    for path in paths {
        state.add_file(path, &BTreeSet::new())?;
    }

    let total_rows = state.total_rows();
    let mut rows = Vec::with_capacity(target_rows.min(total_rows as usize));
    if target_rows == 0 {
        return Ok(Sample { rows, total_rows });
    }

    let ratio = (total_rows / target_rows as u64).max(1);
    let mut seen: u64 = 0;

    loop {
        let mode = if seen % ratio == 0 {
            ReadMode::Materialize
        } else {
            ReadMode::Fake
        };
        let Some(row) = state.next(mode)? else {
            break;
        };
        if mode == ReadMode::Materialize {
            rows.push(row.to_values());
            if rows.len() >= target_rows {
                break;
            }
        }
        seen += 1;
    }

    debug!(
        sampled = rows.len(),
        total_rows,
        ratio,
        "collected sample rows"
    );
    Ok(Sample { rows, total_rows })
}
