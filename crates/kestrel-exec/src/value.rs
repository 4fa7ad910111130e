//! Runtime values for query execution.
//!
//! This module defines the `Value` type which represents a single scalar
//! (or, for repeated columns, a list of scalars) during execution.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use kestrel_common::VALUE_HEADER_SIZE;
use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// A runtime value during query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 8-bit signed integer.
    TinyInt(i8),
    /// 16-bit signed integer.
    SmallInt(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// 32-bit floating point.
    Float(f32),
    /// 64-bit floating point.
    Double(f64),
    /// String value.
    String(String),
    /// The inner values of one row of a repeated column.
    List(Vec<Value>),
}

impl Value {
    /// Creates a NULL value.
    pub fn null() -> Self {
        Value::Null
    }

    /// Creates a boolean value.
    pub fn boolean(v: bool) -> Self {
        Value::Boolean(v)
    }

    /// Creates an integer value.
    pub fn int(v: i32) -> Self {
        Value::Int(v)
    }

    /// Creates a bigint value.
    pub fn bigint(v: i64) -> Self {
        Value::BigInt(v)
    }

    /// Creates a double value.
    pub fn double(v: f64) -> Self {
        Value::Double(v)
    }

    /// Creates a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    /// Creates a list value.
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(values.into_iter().collect())
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for integer values.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)
        )
    }

    /// Returns true for floating point values.
    pub fn is_floating(&self) -> bool {
        matches!(self, Value::Float(_) | Value::Double(_))
    }

    /// Converts this value to a boolean.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                self.to_i64().map(|i| i != 0)
            }
            _ => None,
        }
    }

    /// Converts this value to an i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::TinyInt(i) => Some(i64::from(*i)),
            Value::SmallInt(i) => Some(i64::from(*i)),
            Value::Int(i) => Some(i64::from(*i)),
            Value::BigInt(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Double(f) => Some(*f as i64),
            Value::String(s) => s.parse().ok(),
            Value::Null | Value::List(_) => None,
        }
    }

    /// Converts this value to an f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::TinyInt(i) => Some(f64::from(*i)),
            Value::SmallInt(i) => Some(f64::from(*i)),
            Value::Int(i) => Some(f64::from(*i)),
            Value::BigInt(i) => Some(*i as f64),
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(f) => Some(*f),
            Value::String(s) => s.parse().ok(),
            Value::Null | Value::List(_) => None,
        }
    }

    /// Converts this value to a string.
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Returns the data type of this value, or `None` for NULL.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::TinyInt(_) => Some(DataType::TinyInt),
            Value::SmallInt(_) => Some(DataType::SmallInt),
            Value::Int(_) => Some(DataType::Int),
            Value::BigInt(_) => Some(DataType::BigInt),
            Value::Float(_) => Some(DataType::Float),
            Value::Double(_) => Some(DataType::Double),
            Value::String(_) => Some(DataType::Text),
            Value::List(values) => {
                let inner = values
                    .iter()
                    .find_map(Value::data_type)
                    .unwrap_or(DataType::Text);
                Some(DataType::array(inner))
            }
        }
    }

    /// Returns true if this value may be stored in a column of `data_type`.
    ///
    /// NULL fits every type.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Null, _) => true,
            (Value::List(values), DataType::Array(inner)) => values.iter().all(|v| v.fits(inner)),
            (Value::List(_), _) => false,
            (v, t) => v.data_type().as_ref() == Some(t),
        }
    }

    /// Casts this value to the specified type.
    pub fn cast(&self, target: &DataType) -> Result<Value, String> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        match target {
            DataType::Boolean => self
                .to_bool()
                .map(Value::Boolean)
                .ok_or_else(|| format!("cannot cast {} to BOOLEAN", self)),
            DataType::TinyInt => self
                .to_i64()
                .and_then(|v| i8::try_from(v).ok())
                .map(Value::TinyInt)
                .ok_or_else(|| format!("cannot cast {} to TINYINT", self)),
            DataType::SmallInt => self
                .to_i64()
                .and_then(|v| i16::try_from(v).ok())
                .map(Value::SmallInt)
                .ok_or_else(|| format!("cannot cast {} to SMALLINT", self)),
            DataType::Int => self
                .to_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int)
                .ok_or_else(|| format!("cannot cast {} to INT", self)),
            DataType::BigInt => self
                .to_i64()
                .map(Value::BigInt)
                .ok_or_else(|| format!("cannot cast {} to BIGINT", self)),
            DataType::Float => self
                .to_f64()
                .map(|v| Value::Float(v as f32))
                .ok_or_else(|| format!("cannot cast {} to FLOAT", self)),
            DataType::Double => self
                .to_f64()
                .map(Value::Double)
                .ok_or_else(|| format!("cannot cast {} to DOUBLE", self)),
            DataType::Text => self
                .to_string_value()
                .map(Value::String)
                .ok_or_else(|| format!("cannot cast {} to TEXT", self)),
            DataType::Array(inner) => match self {
                Value::List(values) => values
                    .iter()
                    .map(|v| v.cast(inner))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List),
                _ => Err(format!("cannot cast {} to {}", self, target)),
            },
        }
    }

    /// Approximate number of bytes this value occupies.
    pub fn estimated_size(&self) -> usize {
        match self {
            Value::String(s) => VALUE_HEADER_SIZE + s.len(),
            Value::List(values) => {
                VALUE_HEADER_SIZE + values.iter().map(Value::estimated_size).sum::<usize>()
            }
            _ => VALUE_HEADER_SIZE,
        }
    }

    /// Numeric view used for cross-type comparison and hashing.
    fn numeric(&self) -> Option<f64> {
        match self {
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Float(_)
            | Value::Double(_) => self.to_f64(),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Float(_)
            | Value::Double(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // NULL is less than any non-NULL value
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),

            // Integers compare exactly, everything else numeric goes through f64
            (a, b) if a.is_integral() && b.is_integral() => {
                a.to_i64().unwrap_or_default().cmp(&b.to_i64().unwrap_or_default())
            }
            (a, b) => match (a.numeric(), b.numeric()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.type_rank().cmp(&b.type_rank()),
            },
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::String(s) => s.hash(state),
            Value::List(values) => values.hash(state),
            numeric => numeric.numeric().unwrap_or_default().to_bits().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(i) => write!(f, "{}", i),
            Value::SmallInt(i) => write!(f, "{}", i),
            Value::Int(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}
