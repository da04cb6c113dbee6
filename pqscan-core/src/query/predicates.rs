use crate::schema::{OutputRowSchema, OutputType};
use arrow::datatypes::DataType;
use datafusion::common::ScalarValue;
use datafusion::logical_expr::utils::split_conjunction;
use datafusion::logical_expr::{BinaryExpr, Cast, Expr, Operator};
use tracing::trace;

/// Comparison operators with a total order, the only ones statistics can
/// answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonKind {
    Lt,
    LtEq,
    Eq,
    GtEq,
    Gt,
}

impl ComparisonKind {
    pub fn from_operator(op: &Operator) -> Option<Self> {
        match op {
            Operator::Lt => Some(Self::Lt),
            Operator::LtEq => Some(Self::LtEq),
            Operator::Eq => Some(Self::Eq),
            Operator::GtEq => Some(Self::GtEq),
            Operator::Gt => Some(Self::Gt),
            _ => None,
        }
    }

    /// Operator to use once the operands are swapped: `5 < a` is `a > 5`
    pub fn commute(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Eq => Self::Eq,
            Self::GtEq => Self::LtEq,
            Self::Gt => Self::Lt,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Eq => "=",
            Self::GtEq => ">=",
            Self::Gt => ">",
        }
    }
}

/// `column <op> literal`, normalized so the column is always on the left
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    /// Index into the output row schema
    pub column_index: usize,
    pub literal: ScalarValue,
    pub literal_type: DataType,
    pub comparison: ComparisonKind,
}

impl ColumnFilter {
    pub fn new(column_index: usize, comparison: ComparisonKind, literal: ScalarValue) -> Self {
        Self {
            column_index,
            literal_type: literal.data_type(),
            literal,
            comparison,
        }
    }
}

/// Extract the row-group filters usable for statistics pruning
///
/// Every clause is split on AND. Each conjunct is recognized when it is
/// one of:
/// - `column <op> literal` or `literal <op> column` (operator commuted),
///   for `<`, `<=`, `=`, `>=`, `>`
/// - a bare boolean column (`col`, `col IS TRUE`): `col = true`
/// - a negated boolean column (`NOT col`, `col IS FALSE`): `col = false`
///
/// A literal may be wrapped in a cast (e.g. `DATE '2024-01-01'`) as long as
/// the cast can be folded. Everything else is ignored: it gives no pruning
/// but the engine still evaluates it on each row. So is a comparison whose
/// column type has no ordering (arrays) or whose literal is null or of an
/// incomparable type.
///
/// # Example
/// ```text
/// Clauses: [age > 30 AND name = 'bob', 18 <= age, active, lower(name) = 'x']
///
/// Filters:
///   age  >  Int64(30)
///   name =  Utf8("bob")
///   age  >= Int64(18)
///   active = Boolean(true)
/// ```
///
/// # Errors
/// `FilterError::UnknownColumn` if a recognized clause names a column that
/// isn't in `schema`; clauses are expected to be resolved against the
/// same row layout the scan produces.
pub fn extract_row_group_filters(
    clauses: &[Expr],
    schema: &OutputRowSchema,
) -> Result<Vec<ColumnFilter>, FilterError> {
    let mut filters = Vec::new();

    for clause in clauses {
        for conjunct in split_conjunction(clause) {
            let Some((name, comparison, literal)) = recognize(conjunct) else {
                trace!(clause = %conjunct, "clause not usable for row group pruning");
                continue;
            };

            let column_index = schema
                .index_of(name)
                .ok_or_else(|| FilterError::UnknownColumn(name.to_string()))?;
            let column = &schema.columns()[column_index];

            if literal.is_null() || !literal_comparable(&column.data_type, &literal) {
                trace!(
                    column = %column.name,
                    column_type = %column.data_type,
                    literal = %literal,
                    "skipping filter with incomparable literal"
                );
                continue;
            }

            filters.push(ColumnFilter::new(column_index, comparison, literal));
        }
    }

    Ok(filters)
}

/// Match one conjunct against the recognized shapes
fn recognize(expr: &Expr) -> Option<(&str, ComparisonKind, ScalarValue)> {
    match expr {
        Expr::BinaryExpr(BinaryExpr { left, op, right }) => {
            let comparison = ComparisonKind::from_operator(op)?;
            if let (Some(name), Some(literal)) = (column_name(left), literal_value(right)) {
                return Some((name, comparison, literal));
            }
            if let (Some(literal), Some(name)) = (literal_value(left), column_name(right)) {
                return Some((name, comparison.commute(), literal));
            }
            None
        }
        Expr::Column(column) => Some((
            column.name.as_str(),
            ComparisonKind::Eq,
            ScalarValue::Boolean(Some(true)),
        )),
        Expr::IsTrue(inner) => Some((
            column_name(inner)?,
            ComparisonKind::Eq,
            ScalarValue::Boolean(Some(true)),
        )),
        Expr::Not(inner) | Expr::IsFalse(inner) => Some((
            column_name(inner)?,
            ComparisonKind::Eq,
            ScalarValue::Boolean(Some(false)),
        )),
        _ => None,
    }
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Column(column) => Some(column.name.as_str()),
        _ => None,
    }
}

/// Literal value of `expr`, folding casts and negation of literals
fn literal_value(expr: &Expr) -> Option<ScalarValue> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::Cast(Cast { expr, data_type }) => literal_value(expr)?.cast_to(data_type).ok(),
        Expr::Negative(inner) => literal_value(inner)?.arithmetic_negate().ok(),
        _ => None,
    }
}

/// Whether `literal` can be ordered against values of `column_type`
fn literal_comparable(column_type: &OutputType, literal: &ScalarValue) -> bool {
    let literal_type = literal.data_type();
    match column_type {
        OutputType::Bool => literal_type == DataType::Boolean,
        OutputType::Int32 | OutputType::Int64 | OutputType::Float32 | OutputType::Float64 => {
            literal_type.is_numeric()
        }
        OutputType::Text | OutputType::Bytea => matches!(
            literal_type,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary
        ),
        OutputType::Date | OutputType::Timestamp => {
            matches!(literal_type, DataType::Date32 | DataType::Timestamp(_, _))
        }
        OutputType::Array(_) => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Filter references column '{0}' which is not part of the scanned row")]
    UnknownColumn(String),
}
