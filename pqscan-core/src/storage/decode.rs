use super::arena::RowArena;
use super::datum::{date_from_unix_days, timestamp_from_unix, timestamp_from_unix_days, Datum};
use crate::schema::OutputType;
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimeUnit, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};

/// Physical layout of a file column, as far as decoding is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    Date32,
    Timestamp(TimeUnit),
}

impl ScalarKind {
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        let kind = match data_type {
            DataType::Boolean => ScalarKind::Bool,
            DataType::Int8 => ScalarKind::Int8,
            DataType::Int16 => ScalarKind::Int16,
            DataType::Int32 => ScalarKind::Int32,
            DataType::Int64 => ScalarKind::Int64,
            DataType::Float32 => ScalarKind::Float32,
            DataType::Float64 => ScalarKind::Float64,
            DataType::Utf8 => ScalarKind::Utf8,
            DataType::LargeUtf8 => ScalarKind::LargeUtf8,
            DataType::Binary => ScalarKind::Binary,
            DataType::LargeBinary => ScalarKind::LargeBinary,
            DataType::Date32 => ScalarKind::Date32,
            DataType::Timestamp(unit, _) => ScalarKind::Timestamp(*unit),
            _ => return None,
        };
        Some(kind)
    }

    /// Fixed set of widenings accepted between file and output types
    pub fn can_produce(&self, output: &OutputType) -> bool {
        use OutputType as O;
        match self {
            ScalarKind::Bool => matches!(output, O::Bool),
            ScalarKind::Int8 | ScalarKind::Int16 | ScalarKind::Int32 => {
                matches!(output, O::Int32 | O::Int64 | O::Float64)
            }
            ScalarKind::Int64 => matches!(output, O::Int64 | O::Float64),
            ScalarKind::Float32 => matches!(output, O::Float32 | O::Float64),
            ScalarKind::Float64 => matches!(output, O::Float64),
            ScalarKind::Utf8 | ScalarKind::LargeUtf8 => matches!(output, O::Text | O::Bytea),
            ScalarKind::Binary | ScalarKind::LargeBinary => matches!(output, O::Bytea),
            ScalarKind::Date32 => matches!(output, O::Date | O::Timestamp),
            ScalarKind::Timestamp(_) => matches!(output, O::Timestamp),
        }
    }
}

/// How one output column is produced from its file column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDecoder {
    Scalar {
        source: ScalarKind,
        target: OutputType,
    },
    List {
        large: bool,
        element: ScalarKind,
        target: OutputType,
    },
}

/// Why a file column can't back an output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindFailure {
    TypeMismatch,
    UnsupportedNesting,
    UnsupportedType,
}

impl ColumnDecoder {
    /// Pick a decoder for reading `file_type` as `output`
    pub fn bind(file_type: &DataType, output: &OutputType) -> Result<Self, BindFailure> {
        match file_type {
            DataType::Struct(_) | DataType::Map(_, _) | DataType::Union(_, _) => {
                Err(BindFailure::UnsupportedNesting)
            }
            DataType::List(field) | DataType::LargeList(field) => {
                let element_type = field.data_type();
                if element_type.is_nested() {
                    return Err(BindFailure::UnsupportedNesting);
                }
                let element =
                    ScalarKind::from_arrow(element_type).ok_or(BindFailure::UnsupportedType)?;
                match output.element_type() {
                    Some(target) if element.can_produce(target) => Ok(ColumnDecoder::List {
                        large: matches!(file_type, DataType::LargeList(_)),
                        element,
                        target: target.clone(),
                    }),
                    _ => Err(BindFailure::TypeMismatch),
                }
            }
            other => {
                let source = ScalarKind::from_arrow(other).ok_or(BindFailure::UnsupportedType)?;
                if output.is_array() || !source.can_produce(output) {
                    return Err(BindFailure::TypeMismatch);
                }
                Ok(ColumnDecoder::Scalar {
                    source,
                    target: output.clone(),
                })
            }
        }
    }

    /// Decode the value at `index`, which must not be null
    pub fn decode(
        &self,
        array: &dyn Array,
        index: usize,
        arena: &mut RowArena,
    ) -> Result<Datum, String> {
        match self {
            ColumnDecoder::Scalar { source, target } => {
                decode_scalar(array, index, source, target, arena)
            }
            ColumnDecoder::List {
                large,
                element,
                target,
            } => {
                let values = if *large {
                    array
                        .as_list_opt::<i64>()
                        .ok_or_else(|| mismatch("large list", array))?
                        .value(index)
                } else {
                    array
                        .as_list_opt::<i32>()
                        .ok_or_else(|| mismatch("list", array))?
                        .value(index)
                };

                let mut decoded = Vec::with_capacity(values.len());
                for i in 0..values.len() {
                    if values.is_null(i) {
                        decoded.push(Datum::Null);
                    } else {
                        decoded.push(decode_scalar(values.as_ref(), i, element, target, arena)?);
                    }
                }

                let start = arena.begin_array();
                for datum in decoded {
                    arena.push_element(datum);
                }
                Ok(Datum::Array(arena.finish_array(start)))
            }
        }
    }
}

fn mismatch(expected: &str, array: &dyn Array) -> String {
    format!("expected {} array, found {}", expected, array.data_type())
}

/// Intermediate value read off an arrow array before output conversion
enum Raw<'a> {
    Bool(bool),
    Int(i64),
    F32(f32),
    F64(f64),
    Str(&'a str),
    Bin(&'a [u8]),
    /// Days since 1970-01-01
    Date(i32),
    /// In the column's own unit
    Timestamp(i64, TimeUnit),
}

fn read_raw<'a>(array: &'a dyn Array, index: usize, source: &ScalarKind) -> Result<Raw<'a>, String> {
    let raw = match source {
        ScalarKind::Bool => Raw::Bool(
            array
                .as_boolean_opt()
                .ok_or_else(|| mismatch("boolean", array))?
                .value(index),
        ),
        ScalarKind::Int8 => Raw::Int(
            array
                .as_primitive_opt::<Int8Type>()
                .ok_or_else(|| mismatch("int8", array))?
                .value(index) as i64,
        ),
        ScalarKind::Int16 => Raw::Int(
            array
                .as_primitive_opt::<Int16Type>()
                .ok_or_else(|| mismatch("int16", array))?
                .value(index) as i64,
        ),
        ScalarKind::Int32 => Raw::Int(
            array
                .as_primitive_opt::<Int32Type>()
                .ok_or_else(|| mismatch("int32", array))?
                .value(index) as i64,
        ),
        ScalarKind::Int64 => Raw::Int(
            array
                .as_primitive_opt::<Int64Type>()
                .ok_or_else(|| mismatch("int64", array))?
                .value(index),
        ),
        ScalarKind::Float32 => Raw::F32(
            array
                .as_primitive_opt::<Float32Type>()
                .ok_or_else(|| mismatch("float32", array))?
                .value(index),
        ),
        ScalarKind::Float64 => Raw::F64(
            array
                .as_primitive_opt::<Float64Type>()
                .ok_or_else(|| mismatch("float64", array))?
                .value(index),
        ),
        ScalarKind::Utf8 => Raw::Str(
            array
                .as_string_opt::<i32>()
                .ok_or_else(|| mismatch("utf8", array))?
                .value(index),
        ),
        ScalarKind::LargeUtf8 => Raw::Str(
            array
                .as_string_opt::<i64>()
                .ok_or_else(|| mismatch("large utf8", array))?
                .value(index),
        ),
        ScalarKind::Binary => Raw::Bin(
            array
                .as_binary_opt::<i32>()
                .ok_or_else(|| mismatch("binary", array))?
                .value(index),
        ),
        ScalarKind::LargeBinary => Raw::Bin(
            array
                .as_binary_opt::<i64>()
                .ok_or_else(|| mismatch("large binary", array))?
                .value(index),
        ),
        ScalarKind::Date32 => Raw::Date(
            array
                .as_primitive_opt::<Date32Type>()
                .ok_or_else(|| mismatch("date32", array))?
                .value(index),
        ),
        ScalarKind::Timestamp(unit) => {
            let value = match unit {
                TimeUnit::Second => array
                    .as_primitive_opt::<TimestampSecondType>()
                    .map(|a| a.value(index)),
                TimeUnit::Millisecond => array
                    .as_primitive_opt::<TimestampMillisecondType>()
                    .map(|a| a.value(index)),
                TimeUnit::Microsecond => array
                    .as_primitive_opt::<TimestampMicrosecondType>()
                    .map(|a| a.value(index)),
                TimeUnit::Nanosecond => array
                    .as_primitive_opt::<TimestampNanosecondType>()
                    .map(|a| a.value(index)),
            };
            Raw::Timestamp(value.ok_or_else(|| mismatch("timestamp", array))?, *unit)
        }
    };
    Ok(raw)
}

fn decode_scalar(
    array: &dyn Array,
    index: usize,
    source: &ScalarKind,
    target: &OutputType,
    arena: &mut RowArena,
) -> Result<Datum, String> {
    let raw = read_raw(array, index, source)?;

    let datum = match (raw, target) {
        (Raw::Bool(v), OutputType::Bool) => Datum::Bool(v),
        (Raw::Int(v), OutputType::Int32) => {
            Datum::Int32(i32::try_from(v).map_err(|_| format!("{} overflows int4", v))?)
        }
        (Raw::Int(v), OutputType::Int64) => Datum::Int64(v),
        (Raw::Int(v), OutputType::Float64) => Datum::Float64(v as f64),
        (Raw::F32(v), OutputType::Float32) => Datum::Float32(v),
        (Raw::F32(v), OutputType::Float64) => Datum::Float64(v as f64),
        (Raw::F64(v), OutputType::Float64) => Datum::Float64(v),
        (Raw::Str(v), OutputType::Text) => Datum::Text(arena.alloc_text(v)),
        (Raw::Str(v), OutputType::Bytea) => Datum::Bytea(arena.alloc_bytes(v.as_bytes())),
        (Raw::Bin(v), OutputType::Bytea) => Datum::Bytea(arena.alloc_bytes(v)),
        (Raw::Date(v), OutputType::Date) => Datum::Date(
            date_from_unix_days(v).ok_or_else(|| format!("date {} is out of range", v))?,
        ),
        (Raw::Date(v), OutputType::Timestamp) => Datum::Timestamp(
            timestamp_from_unix_days(v)
                .ok_or_else(|| format!("date {} is out of range for timestamp", v))?,
        ),
        (Raw::Timestamp(v, unit), OutputType::Timestamp) => Datum::Timestamp(
            timestamp_from_unix(v, &unit)
                .ok_or_else(|| format!("timestamp {} {:?} is out of range", v, unit))?,
        ),
        (_, target) => return Err(format!("{:?} column cannot produce {}", source, target)),
    };
    Ok(datum)
}
