//! The schema catalog abstraction.
//!
//! A [`SchemaCatalog`] is whatever stores table definitions and rows: a real
//! database connection or the in-memory [`MemoryCatalog`](crate::memory::MemoryCatalog).
//! The executor only talks to the backend through this trait.

use std::collections::HashSet;
use std::hash::BuildHasher;
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::Result;
use crate::schema::{FieldSchema, FieldUid, TableSchema};
use crate::value::Value;

/// Which part of the catalog a metadata update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogScope {
    /// Main field definition (caption, description, flags).
    Main,
    /// Extended properties (display and lookup settings).
    Extended,
}

/// Row counts reported by [`SchemaCatalog::copy_rows`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub rows_copied: u64,
    /// Rows where at least one value could not be converted and was replaced
    /// by the field's fallback value.
    pub rows_with_conversion_failure: u64,
}

/// Backend operations needed to alter a table.
///
/// Physical operations are only called between
/// [`begin_transaction`](Self::begin_transaction) and
/// [`commit`](Self::commit)/[`rollback`](Self::rollback).
///
/// # Errors
///
/// Every operation reports backend failures as
/// [`AlterError::Catalog`](crate::error::AlterError::Catalog), and missing
/// tables as [`AlterError::TableNotFound`](crate::error::AlterError::TableNotFound).
#[allow(clippy::missing_errors_doc)]
pub trait SchemaCatalog {
    /// Starts a transaction. Transactions are never nested.
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commits the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Rolls the current transaction back.
    fn rollback(&mut self) -> Result<()>;

    /// Loads a table definition with field uids assigned.
    fn table_schema(&mut self, name: &str) -> Result<TableSchema>;

    /// Returns true if a table (or any other object occupying the name)
    /// exists.
    fn table_exists(&mut self, name: &str) -> Result<bool>;

    /// Issues a uid for a field that is about to be inserted.
    fn next_field_uid(&mut self) -> Result<FieldUid>;

    /// Persists the metadata of one field of an existing table.
    fn store_field_metadata(
        &mut self,
        table: &str,
        field: &FieldSchema,
        scope: CatalogScope,
    ) -> Result<()>;

    /// Creates a physical table (and its catalog entry) from a definition.
    fn create_physical_table(&mut self, schema: &TableSchema) -> Result<()>;

    /// Drops a physical table and its catalog entry.
    fn drop_table(&mut self, name: &str) -> Result<()>;

    /// Renames a table, keeping its catalog entry.
    fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<()>;

    /// Copies every row of `source` into `destination` following `plan`.
    fn copy_rows(
        &mut self,
        source: &str,
        destination: &str,
        plan: &ConversionPlan,
    ) -> Result<CopyStats>;
}

/// How one destination column is filled.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    /// Source column name; `None` for newly inserted fields.
    pub source: Option<String>,
    /// Destination field definition.
    pub target: FieldSchema,
    /// Whether source values go through conversion.
    pub convert: bool,
}

impl ColumnMapping {
    /// Computes the destination value from the source value.
    ///
    /// Returns the value and whether conversion failed.
    #[must_use]
    pub fn map_value(&self, value: Option<&Value>) -> (Value, bool) {
        match (&self.source, value) {
            (None, _) => (self.target.initial_value(), false),
            (Some(_), None | Some(Value::Null)) => {
                if self.target.not_null && !self.target.auto_increment {
                    (self.target.fallback_value(), false)
                } else {
                    (Value::Null, false)
                }
            }
            (Some(_), Some(v)) if !self.convert => (v.clone(), false),
            (Some(column), Some(v)) => match self.target.convert_value(v) {
                Ok(converted) => (converted, false),
                Err(err) => {
                    debug!(
                        column = %column,
                        error = %err,
                        "Conversion failed, using fallback value"
                    );
                    (self.target.fallback_value(), true)
                }
            },
        }
    }
}

/// One converted row.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedRow {
    pub values: Vec<Value>,
    pub conversion_failed: bool,
}

/// Column mapping from an old table definition to a new one.
///
/// Columns are correlated by field uid, so renamed fields keep their data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionPlan {
    columns: Vec<ColumnMapping>,
}

impl ConversionPlan {
    /// Builds the plan. A column is converted when its uid is in
    /// `conversions` or its type, max length or unsigned flag changed.
    #[must_use]
    pub fn new<S: BuildHasher>(
        source: &TableSchema,
        target: &TableSchema,
        conversions: &HashSet<FieldUid, S>,
    ) -> Self {
        let columns = target
            .fields
            .iter()
            .map(|field| {
                let source_field = source.field_by_uid(field.uid);
                ColumnMapping {
                    source: source_field.map(|f| f.name.clone()),
                    target: field.clone(),
                    convert: source_field.is_some_and(|f| {
                        conversions.contains(&field.uid)
                            || f.field_type != field.field_type
                            || f.max_length != field.max_length
                            || f.unsigned != field.unsigned
                    }),
                }
            })
            .collect();
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// Source columns to read, in the order [`convert_row`](Self::convert_row)
    /// expects them.
    #[must_use]
    pub fn source_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| c.source.as_deref())
            .collect()
    }

    /// Destination columns, in table order.
    #[must_use]
    pub fn target_columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.target.name.as_str()).collect()
    }

    /// Converts one source row (values in [`source_columns`](Self::source_columns)
    /// order) into a destination row.
    #[must_use]
    pub fn convert_row(&self, source_row: &[Value]) -> ConvertedRow {
        let mut values = Vec::with_capacity(self.columns.len());
        let mut conversion_failed = false;
        let mut next_source = 0;
        for column in &self.columns {
            let input = if column.source.is_some() {
                let value = source_row.get(next_source);
                next_source += 1;
                value
            } else {
                None
            };
            let (value, failed) = column.map_value(input);
            conversion_failed |= failed;
            values.push(value);
        }
        ConvertedRow {
            values,
            conversion_failed,
        }
    }
}

/// Transaction guard: rolls back on drop unless committed.
pub struct Transaction<'a, C: SchemaCatalog + ?Sized> {
    catalog: &'a mut C,
    open: bool,
}

impl<'a, C: SchemaCatalog + ?Sized> Transaction<'a, C> {
    /// Begins a transaction on `catalog`.
    ///
    /// # Errors
    ///
    /// Passes through the catalog's error.
    pub fn begin(catalog: &'a mut C) -> Result<Self> {
        catalog.begin_transaction()?;
        debug!("Transaction started");
        Ok(Self {
            catalog,
            open: true,
        })
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Passes through the catalog's error; the guard then still rolls back.
    pub fn commit(mut self) -> Result<()> {
        self.catalog.commit()?;
        self.open = false;
        debug!("Transaction committed");
        Ok(())
    }
}

impl<C: SchemaCatalog + ?Sized> Deref for Transaction<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.catalog
    }
}

impl<C: SchemaCatalog + ?Sized> DerefMut for Transaction<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.catalog
    }
}

impl<C: SchemaCatalog + ?Sized> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        match self.catalog.rollback() {
            Ok(()) => debug!("Transaction rolled back"),
            Err(err) => warn!(error = %err, "Rollback failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, UidGenerator};

    fn tables() -> (TableSchema, TableSchema) {
        let mut source = TableSchema::new("persons")
            .field(FieldSchema::new("id", FieldType::Integer).primary_key())
            .field(FieldSchema::new("age", FieldType::Text))
            .field(FieldSchema::new("city", FieldType::Text));
        UidGenerator::new().assign(&mut source);

        let mut target = source.clone();
        target.fields[1].field_type = FieldType::Integer;
        target.fields[1].name = "years".to_string();
        target.fields.remove(2);
        target
            .fields
            .push(FieldSchema::new("score", FieldType::Integer).with_uid(FieldUid(9)).default(5));
        (source, target)
    }

    #[test]
    fn test_plan_correlates_by_uid() {
        let (source, target) = tables();
        let plan = ConversionPlan::new(&source, &target, &HashSet::new());

        assert_eq!(plan.source_columns(), vec!["id", "age"]);
        assert_eq!(plan.target_columns(), vec!["id", "years", "score"]);
        assert!(!plan.columns()[0].convert);
        assert!(plan.columns()[1].convert); // type changed
        assert_eq!(plan.columns()[2].source, None);
    }

    #[test]
    fn test_convert_row() {
        let (source, target) = tables();
        let plan = ConversionPlan::new(&source, &target, &HashSet::new());

        let row = plan.convert_row(&[Value::Integer(1), Value::from("42")]);
        assert_eq!(
            row.values,
            vec![Value::Integer(1), Value::Integer(42), Value::Integer(5)]
        );
        assert!(!row.conversion_failed);

        let row = plan.convert_row(&[Value::Integer(2), Value::from("abc")]);
        assert_eq!(row.values[1], Value::Integer(0));
        assert!(row.conversion_failed);

        let row = plan.convert_row(&[Value::Integer(3), Value::Null]);
        assert_eq!(row.values[1], Value::Null);
    }

    #[test]
    fn test_not_null_target_gets_fallback_for_null() {
        let (source, mut target) = tables();
        target.fields[1].not_null = true;
        let plan = ConversionPlan::new(&source, &target, &HashSet::new());

        let row = plan.convert_row(&[Value::Integer(1), Value::Null]);
        assert_eq!(row.values[1], Value::Integer(0));
        assert!(!row.conversion_failed);

        let row = plan.convert_row(&[Value::Integer(1), Value::from("n/a")]);
        assert_eq!(row.values[1], Value::Integer(0));
        assert!(row.conversion_failed);
    }
}
