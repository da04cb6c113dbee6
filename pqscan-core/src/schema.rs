use arrow::datatypes::{DataType, Schema};
use serde::{Deserialize, Serialize};

/// Column types the consuming query engine understands
///
/// These are the *output* types of a scan. Physical parquet/arrow types are
/// mapped onto them at validation time (see `storage::decode`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Bytea,
    /// Microseconds since 2000-01-01 00:00:00 UTC
    Timestamp,
    /// Days since 2000-01-01
    Date,
    /// One-dimensional array of a scalar element type
    Array(Box<OutputType>),
}

impl OutputType {
    /// Array of `element`
    pub fn array_of(element: OutputType) -> Self {
        OutputType::Array(Box::new(element))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, OutputType::Array(_))
    }

    /// Element type for arrays, `None` for scalars
    pub fn element_type(&self) -> Option<&OutputType> {
        match self {
            OutputType::Array(elem) => Some(elem.as_ref()),
            _ => None,
        }
    }

    /// Whether values of this type have a total order usable for pruning
    pub fn is_orderable(&self) -> bool {
        !self.is_array()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            OutputType::Int32 | OutputType::Int64 | OutputType::Float32 | OutputType::Float64
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, OutputType::Timestamp | OutputType::Date)
    }

    /// Natural output type for an arrow type, used when deriving a schema
    /// straight from a file
    ///
    /// Returns `None` for types a scan can't produce (structs, maps,
    /// nested lists, unsigned integers, ...).
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        let ty = match data_type {
            DataType::Boolean => OutputType::Bool,
            DataType::Int8 | DataType::Int16 | DataType::Int32 => OutputType::Int32,
            DataType::Int64 => OutputType::Int64,
            DataType::Float32 => OutputType::Float32,
            DataType::Float64 => OutputType::Float64,
            DataType::Utf8 | DataType::LargeUtf8 => OutputType::Text,
            DataType::Binary | DataType::LargeBinary => OutputType::Bytea,
            DataType::Timestamp(_, _) => OutputType::Timestamp,
            DataType::Date32 => OutputType::Date,
            DataType::List(field) | DataType::LargeList(field) => {
                let element = OutputType::from_arrow(field.data_type())?;
                if element.is_array() {
                    return None;
                }
                OutputType::array_of(element)
            }
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputType::Bool => write!(f, "bool"),
            OutputType::Int32 => write!(f, "int4"),
            OutputType::Int64 => write!(f, "int8"),
            OutputType::Float32 => write!(f, "float4"),
            OutputType::Float64 => write!(f, "float8"),
            OutputType::Text => write!(f, "text"),
            OutputType::Bytea => write!(f, "bytea"),
            OutputType::Timestamp => write!(f, "timestamp"),
            OutputType::Date => write!(f, "date"),
            OutputType::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

/// One column of the row the engine asks the scan to fill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub name: String,
    pub data_type: OutputType,

    /// Referenced by the query (target list or restriction clauses).
    /// Unused columns are never read and always come back as null.
    pub used: bool,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, data_type: OutputType) -> Self {
        Self {
            name: name.into(),
            data_type,
            used: true,
        }
    }

    /// A column that is part of the row layout but not needed by the query
    pub fn unused(name: impl Into<String>, data_type: OutputType) -> Self {
        Self {
            name: name.into(),
            data_type,
            used: false,
        }
    }
}

/// Row layout requested by the query engine
///
/// Immutable for the duration of a scan. Column lookups by name are
/// case-insensitive, matching how file columns are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRowSchema {
    columns: Vec<OutputColumn>,
}

impl OutputRowSchema {
    pub fn new(columns: Vec<OutputColumn>) -> Self {
        Self { columns }
    }

    /// Derive a layout from an arrow schema, every column marked used
    ///
    /// Columns whose type has no output counterpart are returned separately
    /// so the caller can decide whether that is fatal.
    pub fn from_arrow_schema(schema: &Schema) -> (Self, Vec<String>) {
        let mut columns = Vec::with_capacity(schema.fields().len());
        let mut unsupported = Vec::new();

        for field in schema.fields() {
            match OutputType::from_arrow(field.data_type()) {
                Some(data_type) => columns.push(OutputColumn::new(field.name().clone(), data_type)),
                None => unsupported.push(field.name().clone()),
            }
        }

        (Self { columns }, unsupported)
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&OutputColumn> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Indices of columns marked used, ascending
    pub fn used_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.used)
            .map(|(i, _)| i)
            .collect()
    }

    /// Copy of this layout with every column marked used
    pub fn with_all_used(&self) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| OutputColumn {
                    used: true,
                    ..c.clone()
                })
                .collect(),
        }
    }

    /// Copy of this layout where only `names` (case-insensitive) are used
    pub fn with_used<S: AsRef<str>>(&self, names: &[S]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| OutputColumn {
                    used: names.iter().any(|n| n.as_ref().eq_ignore_ascii_case(&c.name)),
                    ..c.clone()
                })
                .collect(),
        }
    }
}
