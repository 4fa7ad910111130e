//! Physical expressions.
//!
//! Expressions are built by name and bound to an input schema before use;
//! binding resolves every column reference to a position.

use std::fmt;

use kestrel_common::error::{KestrelError, KestrelResult};
use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::types::DataType;
use crate::value::Value;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BinaryOp {
    /// Returns true for `+ - * / %`.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        f.write_str(s)
    }
}

/// A physical expression that can be evaluated on a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalExpr {
    /// Column reference.
    Column {
        /// Column name.
        name: String,
        /// Position in the input schema, once bound.
        index: Option<usize>,
    },

    /// Literal value.
    Literal(Value),

    /// Binary operation.
    BinaryExpr {
        /// Left operand.
        left: Box<PhysicalExpr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<PhysicalExpr>,
    },

    /// CAST expression.
    Cast {
        /// Expression to cast.
        expr: Box<PhysicalExpr>,
        /// Target data type.
        data_type: DataType,
    },
}

impl PhysicalExpr {
    /// Creates an unbound column reference.
    pub fn col(name: impl Into<String>) -> Self {
        PhysicalExpr::Column {
            name: name.into(),
            index: None,
        }
    }

    /// Creates a bound column reference.
    pub fn column(name: impl Into<String>, index: usize) -> Self {
        PhysicalExpr::Column {
            name: name.into(),
            index: Some(index),
        }
    }

    /// Creates a literal.
    pub fn lit(value: Value) -> Self {
        PhysicalExpr::Literal(value)
    }

    /// Creates a binary expression.
    pub fn binary(left: PhysicalExpr, op: BinaryOp, right: PhysicalExpr) -> Self {
        PhysicalExpr::BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Creates `left + right`.
    pub fn plus(left: PhysicalExpr, right: PhysicalExpr) -> Self {
        Self::binary(left, BinaryOp::Plus, right)
    }

    /// Creates a cast.
    pub fn cast(expr: PhysicalExpr, data_type: DataType) -> Self {
        PhysicalExpr::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    /// Resolves column names against `schema`.
    pub fn bind(&self, schema: &Schema) -> KestrelResult<PhysicalExpr> {
        match self {
            PhysicalExpr::Column { name, .. } => schema
                .index_of(name)
                .map(|i| PhysicalExpr::column(name.clone(), i))
                .ok_or_else(|| KestrelError::missing_column(name.clone(), "input schema")),
            PhysicalExpr::Literal(v) => Ok(PhysicalExpr::Literal(v.clone())),
            PhysicalExpr::BinaryExpr { left, op, right } => Ok(PhysicalExpr::binary(
                left.bind(schema)?,
                *op,
                right.bind(schema)?,
            )),
            PhysicalExpr::Cast { expr, data_type } => {
                Ok(PhysicalExpr::cast(expr.bind(schema)?, data_type.clone()))
            }
        }
    }

    /// Returns the type this expression produces over `schema`.
    pub fn data_type(&self, schema: &Schema) -> KestrelResult<DataType> {
        match self {
            PhysicalExpr::Column { name, .. } => schema
                .field_with_name(name)
                .map(|f| f.data_type.clone())
                .ok_or_else(|| KestrelError::missing_column(name.clone(), "input schema")),
            PhysicalExpr::Literal(v) => Ok(v.data_type().unwrap_or(DataType::Text)),
            PhysicalExpr::BinaryExpr { left, op, right } => {
                if !op.is_arithmetic() {
                    return Ok(DataType::Boolean);
                }
                let l = left.data_type(schema)?;
                let r = right.data_type(schema)?;
                if l.is_floating() || r.is_floating() {
                    Ok(DataType::Double)
                } else {
                    Ok(DataType::BigInt)
                }
            }
            PhysicalExpr::Cast { data_type, .. } => Ok(data_type.clone()),
        }
    }
}

impl fmt::Display for PhysicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalExpr::Column { name, index } => match index {
                Some(i) => write!(f, "{}@{}", name, i),
                None => write!(f, "{}", name),
            },
            PhysicalExpr::Literal(v) => write!(f, "{}", v),
            PhysicalExpr::BinaryExpr { left, op, right } => write!(f, "({} {} {})", left, op, right),
            PhysicalExpr::Cast { expr, data_type } => write!(f, "CAST({} AS {})", expr, data_type),
        }
    }
}

/// An expression paired with its output column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    /// The expression.
    pub expr: PhysicalExpr,
    /// Output column name.
    pub name: String,
}

impl NamedExpr {
    /// Creates a named expression.
    pub fn new(expr: PhysicalExpr, name: impl Into<String>) -> Self {
        Self {
            expr,
            name: name.into(),
        }
    }

    /// Creates a pass-through column keeping its name.
    pub fn column(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(PhysicalExpr::col(name.clone()), name)
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunc {
    /// COUNT(expr), skips NULLs.
    Count,
    /// COUNT(*)
    CountStar,
    /// SUM(expr)
    Sum,
    /// AVG(expr)
    Avg,
    /// MIN(expr)
    Min,
    /// MAX(expr)
    Max,
    /// First non-NULL value.
    First,
    /// Last non-NULL value.
    Last,
}

impl AggregateFunc {
    /// Returns the result type for an input of type `input`.
    pub fn return_type(&self, input: Option<&DataType>) -> DataType {
        match self {
            AggregateFunc::Count | AggregateFunc::CountStar => DataType::BigInt,
            AggregateFunc::Sum => match input {
                Some(t) if t.is_integral() => DataType::BigInt,
                _ => DataType::Double,
            },
            AggregateFunc::Avg => DataType::Double,
            AggregateFunc::Min | AggregateFunc::Max | AggregateFunc::First | AggregateFunc::Last => {
                input.cloned().unwrap_or(DataType::Text)
            }
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunc::Count | AggregateFunc::CountStar => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
            AggregateFunc::First => "first",
            AggregateFunc::Last => "last",
        };
        f.write_str(s)
    }
}

/// An aggregate call with its output column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpr {
    /// Function.
    pub func: AggregateFunc,
    /// Arguments (empty for `CountStar`).
    pub args: Vec<PhysicalExpr>,
    /// Output column name.
    pub name: String,
}

impl AggregateExpr {
    /// Creates an aggregate expression.
    pub fn new(func: AggregateFunc, args: Vec<PhysicalExpr>, name: impl Into<String>) -> Self {
        Self {
            func,
            args,
            name: name.into(),
        }
    }

    /// `SUM(expr) AS name`
    pub fn sum(expr: PhysicalExpr, name: impl Into<String>) -> Self {
        Self::new(AggregateFunc::Sum, vec![expr], name)
    }

    /// `COUNT(*) AS name`
    pub fn count_star(name: impl Into<String>) -> Self {
        Self::new(AggregateFunc::CountStar, Vec::new(), name)
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.func == AggregateFunc::CountStar {
            return write!(f, "count(*) AS {}", self.name);
        }
        write!(f, "{}(", self.func)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ") AS {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    fn test_schema() -> Schema {
        Schema::new(vec![
            Field::not_null("id_left", DataType::Int),
            Field::not_null("cost_left", DataType::Int),
            Field::nullable("name_left", DataType::Text),
        ])
    }

    #[test]
    fn test_bind_resolves_indices() {
        let expr = PhysicalExpr::plus(PhysicalExpr::col("id_left"), PhysicalExpr::col("cost_left"));
        let bound = expr.bind(&test_schema()).unwrap();
        assert_eq!(
            bound,
            PhysicalExpr::plus(
                PhysicalExpr::column("id_left", 0),
                PhysicalExpr::column("cost_left", 1)
            )
        );
    }

    #[test]
    fn test_bind_missing_column() {
        let err = PhysicalExpr::col("nope").bind(&test_schema()).unwrap_err();
        assert!(matches!(err, KestrelError::MissingColumn { .. }));
    }

    #[test]
    fn test_data_type() {
        let schema = test_schema();
        let sum = PhysicalExpr::plus(PhysicalExpr::col("id_left"), PhysicalExpr::col("cost_left"));
        assert_eq!(sum.data_type(&schema).unwrap(), DataType::BigInt);

        let mixed = PhysicalExpr::plus(PhysicalExpr::col("id_left"), PhysicalExpr::lit(Value::double(0.5)));
        assert_eq!(mixed.data_type(&schema).unwrap(), DataType::Double);

        let cmp = PhysicalExpr::binary(PhysicalExpr::col("id_left"), BinaryOp::Lt, PhysicalExpr::lit(Value::int(3)));
        assert_eq!(cmp.data_type(&schema).unwrap(), DataType::Boolean);
    }

    #[test]
    fn test_aggregate_return_type() {
        assert_eq!(AggregateFunc::Sum.return_type(Some(&DataType::Int)), DataType::BigInt);
        assert_eq!(AggregateFunc::Sum.return_type(Some(&DataType::Float)), DataType::Double);
        assert_eq!(AggregateFunc::CountStar.return_type(None), DataType::BigInt);
        assert_eq!(AggregateFunc::Max.return_type(Some(&DataType::Text)), DataType::Text);
    }

    #[test]
    fn test_display() {
        let agg = AggregateExpr::sum(
            PhysicalExpr::plus(PhysicalExpr::col("id_left"), PhysicalExpr::col("cost_left")),
            "total_sum",
        );
        assert_eq!(agg.to_string(), "sum((id_left + cost_left)) AS total_sum");
        assert_eq!(AggregateExpr::count_star("n").to_string(), "count(*) AS n");
    }

    #[test]
    fn test_serde_round_trip() {
        let named = NamedExpr::column("name_left");
        let json = serde_json::to_string(&named).unwrap();
        let back: NamedExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, named);
    }
}
