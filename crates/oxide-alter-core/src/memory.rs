//! In-memory schema catalog.
//!
//! Keeps tables and their rows in a map and implements transactions with
//! snapshots. Every call is recorded, and failures or cancellations can be
//! injected at any operation, which makes it the catalog used by the engine
//! tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::catalog::{CatalogScope, ConversionPlan, CopyStats, SchemaCatalog};
use crate::error::{AlterError, Result};
use crate::schema::{FieldSchema, FieldUid, TableSchema, UidGenerator};
use crate::value::Value;

/// Catalog operations, as recorded by [`MemoryCatalog::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOperation {
    BeginTransaction,
    Commit,
    Rollback,
    TableSchema,
    TableExists,
    NextFieldUid,
    StoreFieldMetadata,
    CreatePhysicalTable,
    DropTable,
    RenameTable,
    CopyRows,
}

impl CatalogOperation {
    /// Returns true for operations that change the physical tables.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        matches!(
            self,
            Self::CreatePhysicalTable | Self::DropTable | Self::RenameTable | Self::CopyRows
        )
    }

    /// Returns true for operations that write anything.
    #[must_use]
    pub const fn is_write(self) -> bool {
        self.is_physical() || matches!(self, Self::StoreFieldMetadata)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Injected {
    Fail,
    Cancel,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
}

/// Schema catalog backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: BTreeMap<String, MemoryTable>,
    snapshot: Option<BTreeMap<String, MemoryTable>>,
    uids: UidGenerator,
    calls: Vec<CatalogOperation>,
    injected: HashMap<CatalogOperation, Injected>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `operation` fail with a catalog error.
    #[must_use]
    pub fn fail_on(mut self, operation: CatalogOperation) -> Self {
        self.injected.insert(operation, Injected::Fail);
        self
    }

    /// Makes `operation` report a cancellation.
    #[must_use]
    pub fn cancel_on(mut self, operation: CatalogOperation) -> Self {
        self.injected.insert(operation, Injected::Cancel);
        self
    }

    /// Removes every injected failure or cancellation.
    pub fn clear_injections(&mut self) {
        self.injected.clear();
    }

    /// Registers a table, assigning uids to its fields. Returns the stored
    /// definition.
    ///
    /// # Errors
    ///
    /// Fails when the definition is invalid or the name is taken.
    pub fn create_table(&mut self, mut schema: TableSchema) -> Result<TableSchema> {
        self.uids.assign(&mut schema);
        schema.validate()?;
        if self.tables.contains_key(&schema.name) {
            return Err(AlterError::catalog(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        self.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        Ok(schema)
    }

    /// Inserts a row, converting values to the field types and enforcing
    /// constraints.
    ///
    /// # Errors
    ///
    /// Fails on unknown tables, conversion failures and constraint
    /// violations.
    pub fn insert_row(&mut self, table: &str, row: Vec<Value>) -> Result<()> {
        let stored = self.table_mut(table)?;
        insert_checked(stored, row)
    }

    /// Rows of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<&[Vec<Value>]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    /// Values of one column, looked up by field name.
    #[must_use]
    pub fn column(&self, table: &str, field: &str) -> Option<Vec<Value>> {
        let stored = self.tables.get(table)?;
        let index = stored.schema.fields.iter().position(|f| f.name == field)?;
        Some(stored.rows.iter().map(|row| row[index].clone()).collect())
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn calls(&self) -> &[CatalogOperation] {
        &self.calls
    }

    #[must_use]
    pub fn called(&self, operation: CatalogOperation) -> bool {
        self.calls.contains(&operation)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn record(&mut self, operation: CatalogOperation) -> Result<()> {
        self.calls.push(operation);
        match self.injected.get(&operation) {
            Some(Injected::Fail) => Err(AlterError::catalog(format!(
                "injected failure in {operation:?}"
            ))),
            Some(Injected::Cancel) => Err(AlterError::Cancelled(format!("{operation:?}"))),
            None => Ok(()),
        }
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| AlterError::TableNotFound(name.to_string()))
    }
}

fn insert_checked(table: &mut MemoryTable, row: Vec<Value>) -> Result<()> {
    let fields = &table.schema.fields;
    if row.len() != fields.len() {
        return Err(AlterError::catalog(format!(
            "table '{}' has {} columns but {} values were supplied",
            table.schema.name,
            fields.len(),
            row.len()
        )));
    }

    let mut converted = Vec::with_capacity(row.len());
    for (index, (field, value)) in fields.iter().zip(row).enumerate() {
        let mut value = field.convert_value(&value).map_err(AlterError::catalog)?;
        if value.is_null() && field.auto_increment {
            value = Value::Integer(next_serial(&table.rows, index));
        }
        if value.is_null() && field.not_null {
            return Err(AlterError::catalog(format!(
                "NOT NULL constraint failed: {}.{}",
                table.schema.name, field.name
            )));
        }
        converted.push(value);
    }

    check_unique(&table.schema, &table.rows, &converted)?;
    table.rows.push(converted);
    Ok(())
}

fn next_serial(rows: &[Vec<Value>], index: usize) -> i64 {
    rows.iter()
        .filter_map(|row| row[index].as_integer())
        .max()
        .unwrap_or(0)
        + 1
}

fn check_unique(schema: &TableSchema, rows: &[Vec<Value>], row: &[Value]) -> Result<()> {
    let key: Vec<usize> = schema
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.primary_key)
        .map(|(i, _)| i)
        .collect();
    if !key.is_empty()
        && rows
            .iter()
            .any(|existing| key.iter().all(|&i| existing[i] == row[i]))
    {
        return Err(AlterError::catalog(format!(
            "UNIQUE constraint failed: {} primary key",
            schema.name
        )));
    }

    for (index, field) in schema.fields.iter().enumerate() {
        let duplicate = field.unique
            && !row[index].is_null()
            && rows.iter().any(|existing| existing[index] == row[index]);
        if duplicate {
            return Err(AlterError::catalog(format!(
                "UNIQUE constraint failed: {}.{}",
                schema.name, field.name
            )));
        }
    }
    Ok(())
}

impl SchemaCatalog for MemoryCatalog {
    fn begin_transaction(&mut self) -> Result<()> {
        self.record(CatalogOperation::BeginTransaction)?;
        if self.snapshot.is_some() {
            return Err(AlterError::catalog("a transaction is already active"));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.record(CatalogOperation::Commit)?;
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| AlterError::catalog("no active transaction"))
    }

    fn rollback(&mut self) -> Result<()> {
        self.record(CatalogOperation::Rollback)?;
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| AlterError::catalog("no active transaction"))?;
        self.tables = snapshot;
        debug!("Memory catalog restored from snapshot");
        Ok(())
    }

    fn table_schema(&mut self, name: &str) -> Result<TableSchema> {
        self.record(CatalogOperation::TableSchema)?;
        self.tables
            .get(name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| AlterError::TableNotFound(name.to_string()))
    }

    fn table_exists(&mut self, name: &str) -> Result<bool> {
        self.record(CatalogOperation::TableExists)?;
        Ok(self.tables.contains_key(name))
    }

    fn next_field_uid(&mut self) -> Result<FieldUid> {
        self.record(CatalogOperation::NextFieldUid)?;
        Ok(self.uids.next_uid())
    }

    fn store_field_metadata(
        &mut self,
        table: &str,
        field: &FieldSchema,
        scope: CatalogScope,
    ) -> Result<()> {
        self.record(CatalogOperation::StoreFieldMetadata)?;
        let stored = self.table_mut(table)?;
        let existing = stored
            .schema
            .field_by_uid_mut(field.uid)
            .ok_or_else(|| AlterError::UnknownField {
                table: table.to_string(),
                uid: field.uid,
            })?;
        match scope {
            CatalogScope::Main => {
                existing.caption = field.caption.clone();
                existing.description = field.description.clone();
                existing.allow_empty = field.allow_empty;
            }
            CatalogScope::Extended => existing.extended = field.extended.clone(),
        }
        Ok(())
    }

    fn create_physical_table(&mut self, schema: &TableSchema) -> Result<()> {
        self.record(CatalogOperation::CreatePhysicalTable)?;
        schema.validate()?;
        if self.tables.contains_key(&schema.name) {
            return Err(AlterError::catalog(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        self.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> Result<()> {
        self.record(CatalogOperation::DropTable)?;
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AlterError::TableNotFound(name.to_string()))
    }

    fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        self.record(CatalogOperation::RenameTable)?;
        if self.tables.contains_key(new_name) {
            return Err(AlterError::catalog(format!(
                "table '{new_name}' already exists"
            )));
        }
        let mut table = self
            .tables
            .remove(old_name)
            .ok_or_else(|| AlterError::TableNotFound(old_name.to_string()))?;
        table.schema.name = new_name.to_string();
        self.tables.insert(new_name.to_string(), table);
        Ok(())
    }

    fn copy_rows(
        &mut self,
        source: &str,
        destination: &str,
        plan: &ConversionPlan,
    ) -> Result<CopyStats> {
        self.record(CatalogOperation::CopyRows)?;
        let (source_rows, indices) = {
            let table = self
                .tables
                .get(source)
                .ok_or_else(|| AlterError::TableNotFound(source.to_string()))?;
            let indices = plan
                .source_columns()
                .into_iter()
                .map(|column| {
                    table
                        .schema
                        .fields
                        .iter()
                        .position(|f| f.name == column)
                        .ok_or_else(|| {
                            AlterError::catalog(format!("no such column: {source}.{column}"))
                        })
                })
                .collect::<Result<Vec<usize>>>()?;
            (table.rows.clone(), indices)
        };

        let target = self.table_mut(destination)?;
        let target_names: HashSet<&str> = plan.target_columns().into_iter().collect();
        if target.schema.fields.len() != target_names.len()
            || target
                .schema
                .fields
                .iter()
                .any(|f| !target_names.contains(f.name.as_str()))
        {
            return Err(AlterError::catalog(format!(
                "conversion plan does not match table '{destination}'"
            )));
        }

        let mut stats = CopyStats::default();
        for row in source_rows {
            let input: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
            let converted = plan.convert_row(&input);
            insert_checked(target, converted.values)?;
            stats.rows_copied += 1;
            if converted.conversion_failed {
                stats.rows_with_conversion_failure += 1;
            }
        }
        Ok(stats)
    }
}
