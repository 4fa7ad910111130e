//! Fields and schemas.
//!
//! A schema is the *shape* of a batch: two batches have the same shape iff
//! their schemas hold the same names and types in the same order.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// A named, typed column slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Whether NULL is allowed.
    pub nullable: bool,
}

impl Field {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Creates a new non-nullable field.
    pub fn not_null(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, false)
    }

    /// Creates a new nullable field.
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, true)
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns true if `other` has the same name and type.
    pub fn same_shape(&self, other: &Field) -> bool {
        self.name == other.name && self.data_type == other.data_type
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{}",
            self.name,
            self.data_type,
            if self.nullable { "" } else { " NOT NULL" }
        )
    }
}

/// Ordered list of fields with a name index.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema from fields.
    ///
    /// If two fields share a name, lookups by name find the first.
    pub fn new(fields: Vec<Field>) -> Self {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            index.entry(field.name.clone()).or_insert(i);
        }
        Self { fields, index }
    }

    /// Creates an empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field at `index`.
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the position of the named field.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns the named field.
    pub fn field_with_name(&self, name: &str) -> Option<&Field> {
        self.index_of(name).and_then(|i| self.fields.get(i))
    }

    /// Returns the field names in order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.same_shape(b))
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> Schema {
        Schema::new(vec![
            Field::not_null("id_left", DataType::Int),
            Field::not_null("cost_left", DataType::Int),
            Field::nullable("name_left", DataType::Text),
        ])
    }

    #[test]
    fn test_lookup() {
        let schema = test_schema();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("name_left"), Some(2));
        assert_eq!(schema.index_of("missing"), None);
        assert_eq!(
            schema.field_with_name("cost_left").map(|f| &f.data_type),
            Some(&DataType::Int)
        );
    }

    #[test]
    fn test_shape_equality_ignores_nullability() {
        let a = test_schema();
        let b = Schema::new(vec![
            Field::nullable("id_left", DataType::Int),
            Field::nullable("cost_left", DataType::Int),
            Field::nullable("name_left", DataType::Text),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_inequality() {
        let a = test_schema();
        let reordered = Schema::new(vec![
            Field::not_null("cost_left", DataType::Int),
            Field::not_null("id_left", DataType::Int),
            Field::nullable("name_left", DataType::Text),
        ]);
        let retyped = Schema::new(vec![
            Field::not_null("id_left", DataType::BigInt),
            Field::not_null("cost_left", DataType::Int),
            Field::nullable("name_left", DataType::Text),
        ]);
        assert_ne!(a, reordered);
        assert_ne!(a, retyped);
        assert_ne!(a, Schema::empty());
    }

    #[test]
    fn test_display() {
        let schema = Schema::new(vec![Field::not_null("id", DataType::Int)]);
        assert_eq!(schema.to_string(), "[id: INT NOT NULL]");
    }
}
