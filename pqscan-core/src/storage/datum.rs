use super::arena::{RowArena, Span};
use crate::schema::OutputRowSchema;
use arrow::datatypes::TimeUnit;
use chrono::{DateTime, Duration, NaiveDate};

/// Days between 1970-01-01 (file epoch) and 2000-01-01 (engine epoch)
pub const UNIX_TO_ENGINE_EPOCH_DAYS: i32 = 10_957;

/// Microseconds between 1970-01-01 and 2000-01-01
pub const UNIX_TO_ENGINE_EPOCH_MICROS: i64 = 946_684_800_000_000;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Convert a file date (days since 1970-01-01) to engine days; `None`
/// when the shifted date leaves the `i32` range
pub fn date_from_unix_days(days: i32) -> Option<i32> {
    days.checked_sub(UNIX_TO_ENGINE_EPOCH_DAYS)
}

/// Engine timestamp (µs since 2000-01-01) at midnight of a file date
pub fn timestamp_from_unix_days(days: i32) -> Option<i64> {
    (days as i64)
        .checked_mul(MICROS_PER_DAY)?
        .checked_sub(UNIX_TO_ENGINE_EPOCH_MICROS)
}

/// Normalize a file timestamp in `unit` to microseconds since 1970-01-01
///
/// Nanoseconds truncate toward negative infinity so that pre-1970 values
/// land in the correct microsecond.
pub fn unix_micros(value: i64, unit: &TimeUnit) -> Option<i64> {
    match unit {
        TimeUnit::Second => value.checked_mul(1_000_000),
        TimeUnit::Millisecond => value.checked_mul(1_000),
        TimeUnit::Microsecond => Some(value),
        TimeUnit::Nanosecond => Some(value.div_euclid(1_000)),
    }
}

/// Convert a file timestamp in `unit` to engine microseconds
pub fn timestamp_from_unix(value: i64, unit: &TimeUnit) -> Option<i64> {
    unix_micros(value, unit)?.checked_sub(UNIX_TO_ENGINE_EPOCH_MICROS)
}

/// One decoded output value
///
/// Fixed-size. Variable-length payloads live in the reader's `RowArena` and
/// are referenced by `Span`, so a `Datum` is only meaningful together with
/// the arena it was decoded into, and only until that arena is reset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Datum {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(Span),
    Bytea(Span),
    /// µs since 2000-01-01 00:00:00 UTC
    Timestamp(i64),
    /// Days since 2000-01-01
    Date(i32),
    Array(Span),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Resolve arena references
    pub fn resolve<'a>(&self, arena: &'a RowArena) -> ValueRef<'a> {
        match *self {
            Datum::Null => ValueRef::Null,
            Datum::Bool(v) => ValueRef::Bool(v),
            Datum::Int32(v) => ValueRef::Int32(v),
            Datum::Int64(v) => ValueRef::Int64(v),
            Datum::Float32(v) => ValueRef::Float32(v),
            Datum::Float64(v) => ValueRef::Float64(v),
            Datum::Text(span) => ValueRef::Text(arena.text(span)),
            Datum::Bytea(span) => ValueRef::Bytea(arena.bytes(span)),
            Datum::Timestamp(v) => ValueRef::Timestamp(v),
            Datum::Date(v) => ValueRef::Date(v),
            Datum::Array(span) => ValueRef::Array(ArrayView {
                elements: arena.elements(span),
                arena,
            }),
        }
    }
}

/// Borrowed view of a decoded value
#[derive(Debug, Clone, Copy)]
pub enum ValueRef<'a> {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(&'a str),
    Bytea(&'a [u8]),
    Timestamp(i64),
    Date(i32),
    Array(ArrayView<'a>),
}

impl<'a> ValueRef<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, ValueRef::Null)
    }

    pub fn to_owned_value(&self) -> Value {
        match *self {
            ValueRef::Null => Value::Null,
            ValueRef::Bool(v) => Value::Bool(v),
            ValueRef::Int32(v) => Value::Int32(v),
            ValueRef::Int64(v) => Value::Int64(v),
            ValueRef::Float32(v) => Value::Float32(v),
            ValueRef::Float64(v) => Value::Float64(v),
            ValueRef::Text(v) => Value::Text(v.to_string()),
            ValueRef::Bytea(v) => Value::Bytea(v.to_vec()),
            ValueRef::Timestamp(v) => Value::Timestamp(v),
            ValueRef::Date(v) => Value::Date(v),
            ValueRef::Array(view) => Value::Array(view.iter().map(|v| v.to_owned_value()).collect()),
        }
    }
}

/// Elements of a one-dimensional array value
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a> {
    elements: &'a [Datum],
    arena: &'a RowArena,
}

impl<'a> ArrayView<'a> {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ValueRef<'a>> {
        self.elements.get(index).map(|d| d.resolve(self.arena))
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueRef<'a>> + 'a {
        let arena = self.arena;
        self.elements.iter().map(move |d| d.resolve(arena))
    }
}

/// Owned decoded value, detached from any arena
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytea(Vec<u8>),
    Timestamp(i64),
    Date(i32),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn engine_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn fmt_date(f: &mut std::fmt::Formatter<'_>, days: i32) -> std::fmt::Result {
    match engine_epoch().checked_add_signed(Duration::days(days as i64)) {
        Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        None => write!(f, "date({})", days),
    }
}

fn fmt_timestamp(f: &mut std::fmt::Formatter<'_>, micros: i64) -> std::fmt::Result {
    match micros
        .checked_add(UNIX_TO_ENGINE_EPOCH_MICROS)
        .and_then(DateTime::from_timestamp_micros)
    {
        Some(ts) => write!(f, "{}", ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f")),
        None => write!(f, "timestamp({})", micros),
    }
}

fn fmt_value(f: &mut std::fmt::Formatter<'_>, value: ValueRef<'_>) -> std::fmt::Result {
    match value {
        ValueRef::Null => write!(f, "NULL"),
        ValueRef::Bool(v) => write!(f, "{}", if v { "t" } else { "f" }),
        ValueRef::Int32(v) => write!(f, "{}", v),
        ValueRef::Int64(v) => write!(f, "{}", v),
        ValueRef::Float32(v) => write!(f, "{}", v),
        ValueRef::Float64(v) => write!(f, "{}", v),
        ValueRef::Text(v) => write!(f, "{}", v),
        ValueRef::Bytea(v) => {
            write!(f, "\\x")?;
            for b in v {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
        ValueRef::Timestamp(v) => fmt_timestamp(f, v),
        ValueRef::Date(v) => fmt_date(f, v),
        ValueRef::Array(view) => {
            write!(f, "{{")?;
            for (i, element) in view.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                fmt_value(f, element)?;
            }
            write!(f, "}}")
        }
    }
}

impl std::fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_value(f, *self)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", if *v { "t" } else { "f" }),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Bytea(v) => {
                write!(f, "\\x")?;
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Timestamp(v) => fmt_timestamp(f, *v),
            Value::Date(v) => fmt_date(f, *v),
            Value::Array(values) => {
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One output row, borrowed from the scan that produced it
///
/// Valid until the next call that advances the scan.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    schema: &'a OutputRowSchema,
    datums: &'a [Datum],
    arena: &'a RowArena,
}

impl<'a> Row<'a> {
    pub(crate) fn new(schema: &'a OutputRowSchema, datums: &'a [Datum], arena: &'a RowArena) -> Self {
        Self {
            schema,
            datums,
            arena,
        }
    }

    pub fn len(&self) -> usize {
        self.datums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    /// Value of output column `index`; `None` past the last column
    pub fn get(&self, index: usize) -> Option<ValueRef<'a>> {
        self.datums.get(index).map(|d| d.resolve(self.arena))
    }

    /// Case-insensitive lookup by output column name
    pub fn get_by_name(&self, name: &str) -> Option<ValueRef<'a>> {
        self.schema.index_of(name).and_then(|i| self.get(i))
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.datums.get(index).map_or(true, Datum::is_null)
    }

    pub fn datums(&self) -> &'a [Datum] {
        self.datums
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueRef<'a>> + 'a {
        let arena = self.arena;
        self.datums.iter().map(move |d| d.resolve(arena))
    }

    /// Detach the row from the scan
    pub fn to_values(&self) -> Vec<Value> {
        self.iter().map(|v| v.to_owned_value()).collect()
    }
}

impl std::fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            fmt_value(f, value)?;
        }
        Ok(())
    }
}
