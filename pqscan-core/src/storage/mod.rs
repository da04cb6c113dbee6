pub mod arena;
pub mod column_buffer;
pub mod config;
pub mod datum;
pub mod decode;
pub mod file_reader;

pub use arena::{RowArena, Span};
pub use column_buffer::ColumnChunkBuffer;
pub use config::{ReadListStrategy, ScanConfig};
pub use datum::{ArrayView, Datum, Row, Value, ValueRef};
pub use decode::{ColumnDecoder, ScalarKind};
pub use file_reader::{FileReader, ReadMode, ReaderError};
