//! Column vectors and zero-copy transfer.
//!
//! A [`ValueVector`] is a window (`offset`, `len`) over a reference-counted
//! buffer. Moving storage between containers never copies values:
//!
//! - [`ValueVector::transfer_to`] moves the whole buffer and leaves the
//!   donor empty.
//! - [`ValueVector::split_and_transfer`] hands out a window over the same
//!   buffer.
//!
//! A [`RepeatedVector`] adds per-row offsets over a flat inner vector; its
//! [`RepeatedAccessor`] borrows the vector, so an accessor can never outlive
//! a transfer of the storage it reads.

use std::mem;
use std::sync::Arc;

use kestrel_common::error::{KestrelError, KestrelResult};

use crate::schema::Field;
use crate::types::DataType;
use crate::value::Value;

fn type_mismatch(column: &str, expected: &DataType, actual: &DataType) -> KestrelError {
    KestrelError::TypeMismatch {
        column: column.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

// =============================================================================
// Flat vectors
// =============================================================================

/// A flat column of values.
#[derive(Debug, Clone)]
pub struct ValueVector {
    field: Field,
    buffer: Arc<Vec<Value>>,
    offset: usize,
    len: usize,
}

impl ValueVector {
    /// Creates a vector owning `values`.
    ///
    /// Values are not checked against the field type; see [`Self::try_new`].
    pub fn new(field: Field, values: Vec<Value>) -> Self {
        let len = values.len();
        Self {
            field,
            buffer: Arc::new(values),
            offset: 0,
            len,
        }
    }

    /// Creates a vector, rejecting values that do not fit the field type.
    pub fn try_new(field: Field, values: Vec<Value>) -> KestrelResult<Self> {
        if let Some(bad) = values.iter().find(|v| !v.fits(&field.data_type)) {
            let actual = bad.data_type().unwrap_or(DataType::Text);
            return Err(type_mismatch(&field.name, &field.data_type, &actual));
        }
        Ok(Self::new(field, values))
    }

    /// Creates an empty vector.
    pub fn empty(field: Field) -> Self {
        Self::new(field, Vec::new())
    }

    /// Returns the field.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.field.name
    }

    /// Returns the declared data type.
    pub fn data_type(&self) -> &DataType {
        &self.field.data_type
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values().get(index)
    }

    /// Returns the visible values.
    pub fn values(&self) -> &[Value] {
        &self.buffer[self.offset..self.offset + self.len]
    }

    /// Returns an iterator over the values.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values().iter()
    }

    /// Returns true if both vectors read the same underlying buffer.
    pub fn shares_buffer(&self, other: &ValueVector) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Moves this vector's storage into `dst` in O(1).
    ///
    /// `dst` keeps its field and must have the same data type. This vector
    /// is left empty.
    pub fn transfer_to(&mut self, dst: &mut ValueVector) -> KestrelResult<()> {
        if dst.field.data_type != self.field.data_type {
            return Err(type_mismatch(
                &dst.field.name,
                &dst.field.data_type,
                &self.field.data_type,
            ));
        }
        dst.buffer = mem::take(&mut self.buffer);
        dst.offset = mem::take(&mut self.offset);
        dst.len = mem::take(&mut self.len);
        Ok(())
    }

    /// Returns a vector over `[start, start + count)` sharing this buffer.
    pub fn split_and_transfer(&self, start: usize, count: usize) -> KestrelResult<ValueVector> {
        match start.checked_add(count) {
            Some(end) if end <= self.len => Ok(ValueVector {
                field: self.field.clone(),
                buffer: Arc::clone(&self.buffer),
                offset: self.offset + start,
                len: count,
            }),
            _ => Err(KestrelError::invalid_argument(format!(
                "range [{}, {}+{}) out of bounds for '{}' with {} values",
                start, start, count, self.field.name, self.len
            ))),
        }
    }

    /// Moves the storage out, leaving an empty vector of the same field.
    pub fn take(&mut self) -> ValueVector {
        let empty = ValueVector::empty(self.field.clone());
        mem::replace(self, empty)
    }

    /// Releases the storage.
    pub fn clear(&mut self) {
        self.buffer = Arc::default();
        self.offset = 0;
        self.len = 0;
    }

    /// Approximate number of bytes visible through this vector.
    pub fn estimated_size(&self) -> usize {
        self.iter().map(Value::estimated_size).sum()
    }
}

// =============================================================================
// Repeated vectors
// =============================================================================

/// A repeated column: each outer row holds a list of inner values.
///
/// Row `r` owns the inner values `offsets[r]..offsets[r + 1]`.
#[derive(Debug, Clone)]
pub struct RepeatedVector {
    field: Field,
    offsets: Arc<Vec<usize>>,
    values: ValueVector,
}

impl RepeatedVector {
    /// Creates a repeated vector from offsets and inner values.
    pub fn new(field: Field, offsets: Vec<usize>, values: ValueVector) -> KestrelResult<Self> {
        let expected = DataType::array(values.data_type().clone());
        if field.data_type != expected {
            return Err(type_mismatch(&field.name, &expected, &field.data_type));
        }

        let well_formed = offsets.first() == Some(&0)
            && offsets.windows(2).all(|w| w[0] <= w[1])
            && offsets.last() == Some(&values.len());
        if !well_formed {
            return Err(KestrelError::invalid_argument(format!(
                "malformed offsets for repeated column '{}'",
                field.name
            )));
        }

        Ok(Self {
            field,
            offsets: Arc::new(offsets),
            values,
        })
    }

    /// Creates a repeated vector from one list per outer row.
    pub fn from_lists(field: Field, lists: Vec<Vec<Value>>) -> KestrelResult<Self> {
        let inner = inner_field(&field);
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        offsets.push(0);
        let mut values = Vec::new();
        for list in lists {
            values.extend(list);
            offsets.push(values.len());
        }
        let values = ValueVector::try_new(inner, values)?;
        Self::new(field, offsets, values)
    }

    /// Creates an empty repeated vector.
    pub fn empty(field: Field) -> Self {
        let values = ValueVector::empty(inner_field(&field));
        Self {
            field,
            offsets: Arc::new(vec![0]),
            values,
        }
    }

    /// Returns the field.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.field.name
    }

    /// Returns the number of outer rows.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Returns true if there are no outer rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the flat inner values.
    pub fn inner(&self) -> &ValueVector {
        &self.values
    }

    /// Returns a read-only accessor.
    pub fn accessor(&self) -> RepeatedAccessor<'_> {
        RepeatedAccessor { vector: self }
    }

    /// Returns the list at `row` as a value.
    pub fn list_at(&self, row: usize) -> Option<Value> {
        if row >= self.len() {
            return None;
        }
        Some(Value::List(self.accessor().values_at(row).to_vec()))
    }

    /// Moves the storage out, leaving an empty vector of the same field.
    pub fn take(&mut self) -> RepeatedVector {
        let empty = RepeatedVector::empty(self.field.clone());
        mem::replace(self, empty)
    }

    /// Releases the storage.
    pub fn clear(&mut self) {
        self.offsets = Arc::new(vec![0]);
        self.values.clear();
    }

    /// Approximate number of bytes held.
    pub fn estimated_size(&self) -> usize {
        self.values.estimated_size() + self.offsets.len() * mem::size_of::<usize>()
    }
}

fn inner_field(field: &Field) -> Field {
    let inner = field
        .data_type
        .element_type()
        .cloned()
        .unwrap_or_else(|| field.data_type.clone());
    Field::nullable(field.name.clone(), inner)
}

/// Read-only view over a repeated vector.
#[derive(Debug, Clone, Copy)]
pub struct RepeatedAccessor<'a> {
    vector: &'a RepeatedVector,
}

impl<'a> RepeatedAccessor<'a> {
    /// Returns the number of outer rows.
    pub fn value_count(&self) -> usize {
        self.vector.len()
    }

    /// Returns the number of inner values of `row` (0 past the end).
    pub fn inner_value_count_at(&self, row: usize) -> usize {
        match (self.vector.offsets.get(row), self.vector.offsets.get(row + 1)) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        }
    }

    /// Returns the position of the first inner value of `row`.
    pub fn offset_at(&self, row: usize) -> usize {
        self.vector
            .offsets
            .get(row)
            .copied()
            .unwrap_or_else(|| self.vector.values.len())
    }

    /// Returns the inner values of `row`.
    pub fn values_at(&self, row: usize) -> &'a [Value] {
        let start = self.offset_at(row);
        let count = self.inner_value_count_at(row);
        &self.vector.values.values()[start..start + count]
    }

    /// Returns every inner value.
    pub fn inner_values(&self) -> &'a [Value] {
        self.vector.values.values()
    }
}

// =============================================================================
// Columns
// =============================================================================

/// A column of a record batch.
#[derive(Debug, Clone)]
pub enum Column {
    /// One value per row.
    Flat(ValueVector),
    /// A list of values per row.
    Repeated(RepeatedVector),
}

impl Column {
    /// Creates an empty column for `field`.
    pub fn empty(field: Field) -> Self {
        if field.data_type.is_repeated() {
            Column::Repeated(RepeatedVector::empty(field))
        } else {
            Column::Flat(ValueVector::empty(field))
        }
    }

    /// Creates a column from one value per row.
    ///
    /// Rows of a repeated column must be `Value::List` or NULL (an empty list).
    pub fn from_values(field: Field, values: Vec<Value>) -> KestrelResult<Self> {
        if !field.data_type.is_repeated() {
            return ValueVector::try_new(field, values).map(Column::Flat);
        }

        let mut lists = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::List(items) => lists.push(items),
                Value::Null => lists.push(Vec::new()),
                other => {
                    let actual = other.data_type().unwrap_or(DataType::Text);
                    return Err(type_mismatch(&field.name, &field.data_type, &actual));
                }
            }
        }
        RepeatedVector::from_lists(field, lists).map(Column::Repeated)
    }

    /// Returns the field.
    pub fn field(&self) -> &Field {
        match self {
            Column::Flat(v) => v.field(),
            Column::Repeated(v) => v.field(),
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.field().name
    }

    /// Returns the declared data type.
    pub fn data_type(&self) -> &DataType {
        &self.field().data_type
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Flat(v) => v.len(),
            Column::Repeated(v) => v.len(),
        }
    }

    /// Returns true if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value of `row` (a `Value::List` for repeated columns).
    pub fn value_at(&self, row: usize) -> Option<Value> {
        match self {
            Column::Flat(v) => v.get(row).cloned(),
            Column::Repeated(v) => v.list_at(row),
        }
    }

    /// Returns the repeated vector, failing if the column is flat.
    pub fn as_repeated(&self) -> KestrelResult<&RepeatedVector> {
        match self {
            Column::Repeated(v) => Ok(v),
            Column::Flat(v) => Err(KestrelError::NotRepeated {
                column: v.name().to_string(),
            }),
        }
    }

    /// Moves the storage out, leaving an empty column of the same field.
    pub fn take(&mut self) -> Column {
        match self {
            Column::Flat(v) => Column::Flat(v.take()),
            Column::Repeated(v) => Column::Repeated(v.take()),
        }
    }

    /// Releases the storage.
    pub fn clear(&mut self) {
        match self {
            Column::Flat(v) => v.clear(),
            Column::Repeated(v) => v.clear(),
        }
    }

    /// Approximate number of bytes held.
    pub fn estimated_size(&self) -> usize {
        match self {
            Column::Flat(v) => v.estimated_size(),
            Column::Repeated(v) => v.estimated_size(),
        }
    }
}

// =============================================================================
// Transfer pairs
// =============================================================================

/// Binds a source vector to a target field for repeated range transfers.
#[derive(Debug)]
pub struct TransferPair {
    source: ValueVector,
    target: ValueVector,
}

impl TransferPair {
    /// Creates a pair. The target field must have the source's type.
    pub fn new(source: &ValueVector, target_field: Field) -> KestrelResult<Self> {
        if target_field.data_type != *source.data_type() {
            return Err(type_mismatch(
                &target_field.name,
                &target_field.data_type,
                source.data_type(),
            ));
        }
        Ok(Self {
            source: source.clone(),
            target: ValueVector::empty(target_field),
        })
    }

    /// Points the target at `[start, start + count)` of the source.
    pub fn split_and_transfer(&mut self, start: usize, count: usize) -> KestrelResult<()> {
        let window = self.source.split_and_transfer(start, count)?;
        self.target.buffer = window.buffer;
        self.target.offset = window.offset;
        self.target.len = window.len;
        Ok(())
    }

    /// Returns the target field.
    pub fn target_field(&self) -> &Field {
        self.target.field()
    }

    /// Returns the target vector.
    pub fn target(&self) -> &ValueVector {
        &self.target
    }

    /// Returns the target vector mutably.
    pub fn target_mut(&mut self) -> &mut ValueVector {
        &mut self.target
    }

    /// Releases both the source reference and the target window.
    pub fn clear(&mut self) {
        self.source.clear();
        self.target.clear();
    }
}
