//! Logical data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a column.
///
/// `Array(inner)` is the type of a repeated column whose inner values
/// have type `inner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// BOOLEAN
    Boolean,
    /// TINYINT (8-bit)
    TinyInt,
    /// SMALLINT (16-bit)
    SmallInt,
    /// INT (32-bit)
    Int,
    /// BIGINT (64-bit)
    BigInt,
    /// FLOAT (32-bit)
    Float,
    /// DOUBLE (64-bit)
    Double,
    /// TEXT
    Text,
    /// Repeated values of the inner type.
    Array(Box<DataType>),
}

impl DataType {
    /// Creates a repeated type over `inner`.
    pub fn array(inner: DataType) -> Self {
        DataType::Array(Box::new(inner))
    }

    /// Returns true for the integer types.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt
        )
    }

    /// Returns true for the floating point types.
    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// Returns true for integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    /// Returns true if this is a repeated type.
    pub fn is_repeated(&self) -> bool {
        matches!(self, DataType::Array(_))
    }

    /// Returns the inner type of a repeated type.
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Array(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Array(inner) => write!(f, "ARRAY<{}>", inner),
        }
    }
}
