use super::arena::RowArena;
use super::datum::Datum;
use super::decode::ColumnDecoder;
use arrow::array::{Array, ArrayRef};

/// Decoded values of one used column for the buffered row group
///
/// Rebuilt on every row-group switch, never shared between row groups.
#[derive(Debug)]
pub struct ColumnChunkBuffer {
    array: ArrayRef,
    decoder: ColumnDecoder,
    has_nulls: bool,
    pos: usize,
}

impl ColumnChunkBuffer {
    /// `stats_has_nulls` comes from the row group's statistics (true when
    /// the column chunk carries none). The array's own null count is
    /// consulted as well so a chunk with understated statistics still
    /// yields nulls rather than garbage.
    pub fn new(array: ArrayRef, decoder: ColumnDecoder, stats_has_nulls: bool) -> Self {
        let has_nulls = stats_has_nulls || array.null_count() > 0;
        Self {
            array,
            decoder,
            has_nulls,
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn has_nulls(&self) -> bool {
        self.has_nulls
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decode the value under the cursor and advance
    ///
    /// Returns `Ok(None)` once the buffer is exhausted.
    pub fn next_value(&mut self, arena: &mut RowArena) -> Result<Option<Datum>, String> {
        if self.pos >= self.array.len() {
            return Ok(None);
        }
        let datum = self.value_at(self.pos, arena)?;
        self.pos += 1;
        Ok(Some(datum))
    }

    /// Advance without decoding (sampling fake reads)
    pub fn skip(&mut self) -> bool {
        if self.pos >= self.array.len() {
            return false;
        }
        self.pos += 1;
        true
    }

    /// Decode the value at `index` without touching the cursor
    pub fn value_at(&self, index: usize, arena: &mut RowArena) -> Result<Datum, String> {
        if index >= self.array.len() {
            return Err(format!(
                "row {} past end of column chunk ({} rows)",
                index,
                self.array.len()
            ));
        }
        if self.has_nulls && self.array.is_null(index) {
            return Ok(Datum::Null);
        }
        self.decoder.decode(self.array.as_ref(), index, arena)
    }
}
