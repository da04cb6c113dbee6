use crate::storage::datum::unix_micros;
use crate::storage::FileReader;
use arrow::datatypes::{DataType, TimeUnit};
use datafusion::common::ScalarValue;
use parquet::basic::Type as PhysicalType;
use parquet::file::statistics::Statistics;
use std::cmp::Ordering;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// A statistics bound or filter literal in a comparable domain
///
/// Integers of every width share `Int`, floats share `Float`, text and
/// binary share `Bytes` (unsigned lexicographic order, as parquet orders
/// byte arrays). Temporal values keep the file epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    /// µs since 1970-01-01
    Timestamp(i64),
    /// Days since 1970-01-01
    Date(i32),
}

impl StatValue {
    /// Literal value in the statistics domain, `None` for nulls, NaN and
    /// types statistics can't be compared against
    pub fn from_scalar(value: &ScalarValue) -> Option<Self> {
        let stat = match value {
            ScalarValue::Boolean(Some(v)) => StatValue::Bool(*v),
            ScalarValue::Int8(Some(v)) => StatValue::Int(*v as i64),
            ScalarValue::Int16(Some(v)) => StatValue::Int(*v as i64),
            ScalarValue::Int32(Some(v)) => StatValue::Int(*v as i64),
            ScalarValue::Int64(Some(v)) => StatValue::Int(*v),
            ScalarValue::UInt8(Some(v)) => StatValue::Int(*v as i64),
            ScalarValue::UInt16(Some(v)) => StatValue::Int(*v as i64),
            ScalarValue::UInt32(Some(v)) => StatValue::Int(*v as i64),
            ScalarValue::UInt64(Some(v)) => match i64::try_from(*v) {
                Ok(v) => StatValue::Int(v),
                Err(_) => StatValue::Float(*v as f64),
            },
            ScalarValue::Float32(Some(v)) if !v.is_nan() => StatValue::Float(*v as f64),
            ScalarValue::Float64(Some(v)) if !v.is_nan() => StatValue::Float(*v),
            ScalarValue::Utf8(Some(v)) | ScalarValue::LargeUtf8(Some(v)) => {
                StatValue::Bytes(v.as_bytes().to_vec())
            }
            ScalarValue::Binary(Some(v)) | ScalarValue::LargeBinary(Some(v)) => {
                StatValue::Bytes(v.clone())
            }
            ScalarValue::Date32(Some(v)) => StatValue::Date(*v),
            ScalarValue::TimestampSecond(Some(v), _) => {
                StatValue::Timestamp(unix_micros(*v, &TimeUnit::Second)?)
            }
            ScalarValue::TimestampMillisecond(Some(v), _) => {
                StatValue::Timestamp(unix_micros(*v, &TimeUnit::Millisecond)?)
            }
            ScalarValue::TimestampMicrosecond(Some(v), _) => StatValue::Timestamp(*v),
            ScalarValue::TimestampNanosecond(Some(v), _) => {
                StatValue::Timestamp(unix_micros(*v, &TimeUnit::Nanosecond)?)
            }
            _ => return None,
        };
        Some(stat)
    }

    /// Order two values, coercing integers to floats and dates to
    /// timestamps; `None` when the kinds can't be compared
    pub fn compare(&self, other: &StatValue) -> Option<Ordering> {
        use StatValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Date(a), Timestamp(b)) => Some(date_micros(*a).cmp(&(*b as i128))),
            (Timestamp(a), Date(b)) => Some((*a as i128).cmp(&date_micros(*b))),
            _ => None,
        }
    }
}

/// Midnight of a day in microseconds; widened so no `i32` day overflows
fn date_micros(days: i32) -> i128 {
    days as i128 * MICROS_PER_DAY as i128
}

/// Decoded min/max/null-count of one column chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStatistics {
    pub min: Option<StatValue>,
    pub max: Option<StatValue>,
    pub null_count: Option<u64>,
}

impl ColumnStatistics {
    /// Decode footer statistics of a column whose arrow type is
    /// `column_type`
    ///
    /// Bounds are stored in the column's plain encoding (little-endian
    /// numbers, raw bytes for byte arrays); the arrow type decides how the
    /// physical value is interpreted (e.g. INT32 as date vs. integer).
    pub fn decode(stats: &Statistics, column_type: &DataType) -> Result<Self, StatisticsError> {
        let physical = stats.physical_type();

        // Files written before the ordering fix stored byte-array bounds
        // with signed comparison
        if physical == PhysicalType::BYTE_ARRAY && stats.is_min_max_deprecated() {
            return Err(StatisticsError::DeprecatedOrdering);
        }

        let min = stats
            .min_bytes_opt()
            .map(|b| decode_value(b, physical, column_type))
            .transpose()?;
        let max = stats
            .max_bytes_opt()
            .map(|b| decode_value(b, physical, column_type))
            .transpose()?;

        Ok(Self {
            min,
            max,
            null_count: stats.null_count_opt(),
        })
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], StatisticsError> {
    bytes.try_into().map_err(|_| StatisticsError::Width {
        expected: N,
        actual: bytes.len(),
    })
}

fn decode_value(
    bytes: &[u8],
    physical: PhysicalType,
    column_type: &DataType,
) -> Result<StatValue, StatisticsError> {
    let value = match (physical, column_type) {
        (PhysicalType::BOOLEAN, DataType::Boolean) => {
            StatValue::Bool(fixed::<1>(bytes)?[0] != 0)
        }
        (PhysicalType::INT32, DataType::Int8 | DataType::Int16 | DataType::Int32) => {
            StatValue::Int(i32::from_le_bytes(fixed(bytes)?) as i64)
        }
        (PhysicalType::INT32, DataType::Date32) => {
            StatValue::Date(i32::from_le_bytes(fixed(bytes)?))
        }
        (PhysicalType::INT64, DataType::Int64) => StatValue::Int(i64::from_le_bytes(fixed(bytes)?)),
        (PhysicalType::INT64, DataType::Timestamp(unit, _)) => {
            let raw = i64::from_le_bytes(fixed(bytes)?);
            StatValue::Timestamp(unix_micros(raw, unit).ok_or(StatisticsError::OutOfRange)?)
        }
        (PhysicalType::FLOAT, DataType::Float32) => {
            let v = f32::from_le_bytes(fixed(bytes)?);
            if v.is_nan() {
                return Err(StatisticsError::NaN);
            }
            StatValue::Float(v as f64)
        }
        (PhysicalType::DOUBLE, DataType::Float64) => {
            let v = f64::from_le_bytes(fixed(bytes)?);
            if v.is_nan() {
                return Err(StatisticsError::NaN);
            }
            StatValue::Float(v)
        }
        (
            PhysicalType::BYTE_ARRAY,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary,
        ) => StatValue::Bytes(bytes.to_vec()),
        (physical, column_type) => {
            return Err(StatisticsError::Unsupported {
                physical: physical.to_string(),
                column_type: column_type.clone(),
            })
        }
    };
    Ok(value)
}

/// Minimum statistic of `column` in `row_group`, if present and decodable
pub fn row_group_min(reader: &FileReader, row_group: usize, column: &str) -> Option<StatValue> {
    let root = reader.find_column(column)?;
    let field = reader.field(root)?;
    let stats = reader.column_statistics(row_group, root)?;
    ColumnStatistics::decode(stats, field.data_type()).ok()?.min
}

/// Why a column chunk's statistics can't be used
///
/// Never fatal: the affected filter simply can't prune that row group.
#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("Statistics bound has {actual} bytes, expected {expected}")]
    Width { expected: usize, actual: usize },

    #[error("Statistics of physical type {physical} can't describe a {column_type} column")]
    Unsupported {
        physical: String,
        column_type: DataType,
    },

    #[error("Statistics bound is NaN")]
    NaN,

    #[error("Byte array statistics use the deprecated signed ordering")]
    DeprecatedOrdering,

    #[error("Statistics bound is outside the microsecond timestamp range")]
    OutOfRange,
}
