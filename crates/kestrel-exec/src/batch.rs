//! Record batch for vectorized execution.
//!
//! A `RecordBatch` is the unit of data movement between operators: a schema,
//! one column per field, a record count and an optional selection vector.
//! Batches are owned by exactly one operator at a time; column storage moves
//! between batches through [`RecordBatch::take_batch`] and the vector-level
//! transfer operations.

use std::fmt;
use std::sync::Arc;

use kestrel_common::error::{KestrelError, KestrelResult};

use crate::row::Row;
use crate::schema::{Field, Schema};
use crate::value::Value;
use crate::vector::Column;

/// How (and whether) a batch is filtered through a selection vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionVectorMode {
    /// Every row is selected.
    None,
    /// Two-byte indices into a single batch.
    TwoByte,
    /// Four-byte indices spanning several batches.
    FourByte,
}

impl fmt::Display for SelectionVectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionVectorMode::None => write!(f, "NONE"),
            SelectionVectorMode::TwoByte => write!(f, "TWO_BYTE"),
            SelectionVectorMode::FourByte => write!(f, "FOUR_BYTE"),
        }
    }
}

/// Row indirection over a batch's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionVector {
    /// Two-byte indices.
    TwoByte(Vec<u16>),
    /// Four-byte indices.
    FourByte(Vec<u32>),
}

impl SelectionVector {
    /// Returns the mode of this selection vector.
    pub fn mode(&self) -> SelectionVectorMode {
        match self {
            SelectionVector::TwoByte(_) => SelectionVectorMode::TwoByte,
            SelectionVector::FourByte(_) => SelectionVectorMode::FourByte,
        }
    }

    /// Returns the number of selected rows.
    pub fn len(&self) -> usize {
        match self {
            SelectionVector::TwoByte(v) => v.len(),
            SelectionVector::FourByte(v) => v.len(),
        }
    }

    /// Returns true if no rows are selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Records whether `add_or_get` had to change a batch's column set.
#[derive(Debug, Default)]
pub struct SchemaChangeCallback {
    changed: bool,
}

impl SchemaChangeCallback {
    /// Creates an unflagged callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags a schema change.
    pub fn mark(&mut self) {
        self.changed = true;
    }

    /// Returns true if a change was flagged, and clears the flag.
    pub fn schema_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

/// A batch of rows for vectorized execution.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    /// The schema of this batch.
    schema: Arc<Schema>,
    /// The columns in this batch.
    columns: Vec<Column>,
    /// Number of rows in this batch.
    num_rows: usize,
    /// Optional selection vector.
    selection: Option<SelectionVector>,
    /// Bumped every time the column set changes.
    schema_version: u64,
}

impl RecordBatch {
    /// Creates a new record batch with the given schema and columns.
    pub fn new(schema: Arc<Schema>, columns: Vec<Column>) -> KestrelResult<Self> {
        if columns.len() != schema.len() {
            return Err(KestrelError::invalid_argument(format!(
                "column count {} doesn't match schema field count {}",
                columns.len(),
                schema.len()
            )));
        }

        for (field, column) in schema.fields().iter().zip(columns.iter()) {
            if !field.same_shape(column.field()) {
                return Err(KestrelError::TypeMismatch {
                    column: field.name.clone(),
                    expected: field.data_type.to_string(),
                    actual: column.data_type().to_string(),
                });
            }
        }

        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(col) = columns.iter().find(|c| c.len() != num_rows) {
            return Err(KestrelError::invalid_argument(format!(
                "column '{}' has {} rows, expected {}",
                col.name(),
                col.len(),
                num_rows
            )));
        }

        Ok(Self {
            schema,
            columns,
            num_rows,
            selection: None,
            schema_version: 0,
        })
    }

    /// Creates an empty record batch with the given schema.
    pub fn empty(schema: Arc<Schema>) -> Self {
        let columns = schema.fields().iter().cloned().map(Column::empty).collect();
        Self {
            schema,
            columns,
            num_rows: 0,
            selection: None,
            schema_version: 0,
        }
    }

    /// Creates a record batch from rows.
    pub fn from_rows(schema: Arc<Schema>, rows: &[Row]) -> KestrelResult<Self> {
        let mut builder = RecordBatchBuilder::new(schema);
        for row in rows {
            builder.append_row(row)?;
        }
        builder.build()
    }

    /// Returns the schema of this batch.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the number of rows in this batch.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the number of columns in this batch.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if this batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Returns the schema version.
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the named column.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).and_then(|i| self.columns.get(i))
    }

    /// Returns the columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the selection vector mode.
    pub fn selection_mode(&self) -> SelectionVectorMode {
        self.selection
            .as_ref()
            .map_or(SelectionVectorMode::None, SelectionVector::mode)
    }

    /// Returns the selection vector, if any.
    pub fn selection(&self) -> Option<&SelectionVector> {
        self.selection.as_ref()
    }

    /// Attaches a selection vector.
    pub fn with_selection(mut self, selection: SelectionVector) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Returns the row at the given index.
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.num_rows {
            return None;
        }
        self.columns
            .iter()
            .map(|c| c.value_at(index))
            .collect::<Option<Vec<_>>>()
            .map(Row::new)
    }

    /// Returns an iterator over the rows.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.num_rows).filter_map(move |i| self.row(i))
    }

    /// Sets the record count.
    ///
    /// The count may not exceed the length of any column.
    pub fn set_record_count(&mut self, count: usize) -> KestrelResult<()> {
        if let Some(col) = self.columns.iter().find(|c| c.len() < count) {
            return Err(KestrelError::invalid_argument(format!(
                "record count {} exceeds the {} values of column '{}'",
                count,
                col.len(),
                col.name()
            )));
        }
        self.num_rows = count;
        Ok(())
    }

    /// Returns the column for `field`, creating it if needed.
    ///
    /// A column with the same name and type is reused. Otherwise the column
    /// is replaced (same name, other type) or appended, `callback` is
    /// flagged and the schema version is bumped.
    pub fn add_or_get(&mut self, field: &Field, callback: &mut SchemaChangeCallback) -> &mut Column {
        let index = match self.schema.index_of(&field.name) {
            Some(i) if self.columns[i].field().same_shape(field) => i,
            Some(i) => {
                self.columns[i] = Column::empty(field.clone());
                self.rebuild_schema();
                callback.mark();
                i
            }
            None => {
                self.columns.push(Column::empty(field.clone()));
                self.rebuild_schema();
                callback.mark();
                self.columns.len() - 1
            }
        };
        &mut self.columns[index]
    }

    /// Moves every column out into a new batch.
    ///
    /// This batch keeps empty columns of the same shape and a zero record
    /// count, so it can be refilled without a schema change.
    pub fn take_batch(&mut self) -> RecordBatch {
        RecordBatch {
            schema: Arc::clone(&self.schema),
            columns: self.columns.iter_mut().map(Column::take).collect(),
            num_rows: std::mem::take(&mut self.num_rows),
            selection: self.selection.take(),
            schema_version: self.schema_version,
        }
    }

    /// Releases all column storage.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.num_rows = 0;
        self.selection = None;
    }

    /// Approximate number of bytes held by the columns.
    pub fn estimated_size(&self) -> usize {
        self.columns.iter().map(Column::estimated_size).sum()
    }

    fn rebuild_schema(&mut self) {
        let fields = self.columns.iter().map(|c| c.field().clone()).collect();
        self.schema = Arc::new(Schema::new(fields));
        self.schema_version += 1;
    }
}

impl fmt::Display for RecordBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "RecordBatch ({} rows x {} cols)",
            self.num_rows,
            self.num_columns()
        )?;

        writeln!(f, "{}", self.schema.names().join(" | "))?;

        // Limit to 10 rows for display
        for row in self.rows().take(10) {
            writeln!(f, "{}", row)?;
        }

        if self.num_rows > 10 {
            writeln!(f, "... ({} more rows)", self.num_rows - 10)?;
        }

        Ok(())
    }
}

/// Builder for creating record batches incrementally.
#[derive(Debug)]
pub struct RecordBatchBuilder {
    /// The schema.
    schema: Arc<Schema>,
    /// The columns being built.
    columns: Vec<Vec<Value>>,
}

impl RecordBatchBuilder {
    /// Creates a new builder with the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        let columns = vec![Vec::new(); schema.len()];
        Self { schema, columns }
    }

    /// Appends a row to the batch.
    pub fn append_row(&mut self, row: &Row) -> KestrelResult<()> {
        if row.num_columns() != self.columns.len() {
            return Err(KestrelError::invalid_argument(format!(
                "row has {} columns, expected {}",
                row.num_columns(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(row.iter()) {
            column.push(value.clone());
        }
        Ok(())
    }

    /// Returns the current number of rows.
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    /// Builds the record batch.
    pub fn build(self) -> KestrelResult<RecordBatch> {
        let columns = self
            .columns
            .into_iter()
            .zip(self.schema.fields().iter())
            .map(|(values, field)| Column::from_values(field.clone(), values))
            .collect::<KestrelResult<Vec<_>>>()?;
        RecordBatch::new(self.schema, columns)
    }
}
