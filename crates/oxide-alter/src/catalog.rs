//! [`SchemaCatalog`] over a SQLite database.
//!
//! Field definitions that SQLite cannot hold itself (captions, lookup
//! settings, the exact field type) live in a side table. Tables without
//! catalog rows are introspected from `pragma_table_info`, so databases
//! created by other tools can be altered as well.

use std::collections::HashMap;
use std::str::FromStr;

use oxide_alter_core::catalog::{CatalogScope, ConversionPlan, CopyStats, SchemaCatalog};
use oxide_alter_core::error::{AlterError, Result as AlterResult};
use oxide_alter_core::schema::{
    ExtendedProperties, FieldSchema, FieldUid, TableSchema, UidGenerator,
};
use oxide_alter_core::value::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row, Sqlite, TypeInfo, ValueRef};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::dialect::{field_type_from_sql, AlterDialect, SqliteDialect};
use crate::error::{Result, SqliteCatalogError};

/// Name of the side table holding field definitions.
pub const FIELDS_TABLE: &str = "oxide_alter_fields";

/// SQL to create the field catalog table.
const CREATE_FIELDS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "oxide_alter_fields" (
    "table_name" TEXT NOT NULL,
    "position" INTEGER NOT NULL,
    "field_name" TEXT NOT NULL,
    "definition" TEXT NOT NULL,
    "extended" TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY ("table_name", "field_name")
)
"#;

const SELECT_FIELDS_SQL: &str = r#"
SELECT "definition", "extended" FROM "oxide_alter_fields"
WHERE "table_name" = ? ORDER BY "position"
"#;

const INSERT_FIELD_SQL: &str = r#"
INSERT INTO "oxide_alter_fields" ("table_name", "position", "field_name", "definition", "extended")
VALUES (?, ?, ?, ?, ?)
"#;

/// A blocking catalog over one SQLite connection.
///
/// The connection is driven by a private current-thread runtime, so the
/// catalog can be used from synchronous code such as the executor.
pub struct SqliteCatalog {
    runtime: Runtime,
    conn: SqliteConnection,
    dialect: SqliteDialect,
    uids: UidGenerator,
    /// Field uids issued this session, keyed by `(table, field)`.
    known_uids: HashMap<(String, String), FieldUid>,
    snapshot: Option<HashMap<(String, String), FieldUid>>,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("known_uids", &self.known_uids.len())
            .field("in_transaction", &self.snapshot.is_some())
            .finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Opens (creating if missing) the database at `url`.
    ///
    /// # Errors
    ///
    /// Fails when the URL is invalid, the database cannot be opened or the
    /// field catalog cannot be created.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = runtime.block_on(SqliteConnection::connect_with(&options))?;
        info!(url = %url, "Connected to database");

        let mut catalog = Self {
            runtime,
            conn,
            dialect: SqliteDialect::new(),
            uids: UidGenerator::new(),
            known_uids: HashMap::new(),
            snapshot: None,
        };
        catalog.execute_sql(CREATE_FIELDS_TABLE_SQL)?;
        Ok(catalog)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub fn open_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:")
    }

    /// Returns the dialect used to generate SQL.
    #[must_use]
    pub const fn dialect(&self) -> &SqliteDialect {
        &self.dialect
    }

    /// Executes a statement without parameters.
    ///
    /// # Errors
    ///
    /// Returns the database error.
    pub fn execute_sql(&mut self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let Self { runtime, conn, .. } = self;
        let done = runtime.block_on(sqlx::query(sql).execute(&mut *conn))?;
        Ok(done.rows_affected())
    }

    /// Names of the user tables, excluding the field catalog.
    ///
    /// # Errors
    ///
    /// Returns the database error.
    pub fn table_names(&mut self) -> Result<Vec<String>> {
        let sql = "SELECT name FROM sqlite_master WHERE type = 'table' \
                   AND name NOT LIKE 'sqlite_%' AND name != ? ORDER BY name";
        debug!(sql = %sql, "Executing SQL");
        let Self { runtime, conn, .. } = self;
        let rows: Vec<(String,)> = runtime.block_on(
            sqlx::query_as(sql)
                .bind(FIELDS_TABLE)
                .fetch_all(&mut *conn),
        )?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Inserts one row; `values` follow the table's field order.
    ///
    /// # Errors
    ///
    /// Fails on unknown tables and constraint violations.
    pub fn insert_row(&mut self, table: &str, values: Vec<Value>) -> Result<()> {
        let schema = self.table_schema(table)?;
        let columns: Vec<&str> = schema.field_names().collect();
        let sql = self.dialect.insert_sql(table, &columns);
        debug!(sql = %sql, "Executing SQL");
        let Self { runtime, conn, .. } = self;
        let query = values.into_iter().fold(sqlx::query(&sql), bind_value);
        runtime.block_on(query.execute(&mut *conn))?;
        Ok(())
    }

    /// Reads every row of `table`, values converted to their field types.
    ///
    /// # Errors
    ///
    /// Fails on unknown tables.
    pub fn rows(&mut self, table: &str) -> Result<Vec<Vec<Value>>> {
        let schema = self.table_schema(table)?;
        let columns: Vec<&str> = schema.field_names().collect();
        let raw = self.select_rows(table, &columns)?;
        Ok(raw
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&schema.fields)
                    .map(|(value, field)| field.convert_value(&value).unwrap_or(value))
                    .collect()
            })
            .collect())
    }

    /// Values of one column of `table`, in row order.
    ///
    /// # Errors
    ///
    /// Fails on unknown tables and fields.
    pub fn column(&mut self, table: &str, field: &str) -> Result<Vec<Value>> {
        let schema = self.table_schema(table)?;
        let index = schema
            .fields
            .iter()
            .position(|f| f.name == field)
            .ok_or_else(|| {
                AlterError::InvalidSchema(format!("no field '{field}' in '{table}'"))
            })?;
        Ok(self
            .rows(table)?
            .into_iter()
            .map(|mut row| row.swap_remove(index))
            .collect())
    }

    fn select_rows(&mut self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Value>>> {
        let sql = self.dialect.select_sql(table, columns);
        debug!(sql = %sql, "Executing SQL");
        let Self { runtime, conn, .. } = self;
        let rows = runtime.block_on(sqlx::query(&sql).fetch_all(&mut *conn))?;
        rows.iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| decode_value(row, i))
                    .collect::<Result<Vec<Value>>>()
            })
            .collect()
    }

    fn catalog_fields(&mut self, table: &str) -> Result<Vec<FieldSchema>> {
        let Self { runtime, conn, .. } = self;
        let rows: Vec<(String, String)> = runtime.block_on(
            sqlx::query_as(SELECT_FIELDS_SQL)
                .bind(table)
                .fetch_all(&mut *conn),
        )?;
        rows.into_iter()
            .map(|(definition, extended)| -> Result<FieldSchema> {
                let mut field: FieldSchema = serde_json::from_str(&definition)?;
                field.extended = serde_json::from_str(&extended)?;
                Ok(field)
            })
            .collect()
    }

    fn write_catalog(&mut self, schema: &TableSchema) -> Result<()> {
        self.delete_catalog(&schema.name)?;
        for (position, field) in schema.fields.iter().enumerate() {
            let mut main = field.clone();
            main.extended = ExtendedProperties::default();
            let definition = serde_json::to_string(&main)?;
            let extended = serde_json::to_string(&field.extended)?;
            let position = i64::try_from(position)
                .map_err(|_| AlterError::InvalidSchema("too many fields".to_string()))?;

            let Self { runtime, conn, .. } = self;
            runtime.block_on(
                sqlx::query(INSERT_FIELD_SQL)
                    .bind(&schema.name)
                    .bind(position)
                    .bind(&field.name)
                    .bind(definition)
                    .bind(extended)
                    .execute(&mut *conn),
            )?;
        }
        Ok(())
    }

    fn delete_catalog(&mut self, table: &str) -> Result<()> {
        let Self { runtime, conn, .. } = self;
        runtime.block_on(
            sqlx::query(r#"DELETE FROM "oxide_alter_fields" WHERE "table_name" = ?"#)
                .bind(table)
                .execute(&mut *conn),
        )?;
        Ok(())
    }

    /// Reads a field list from SQLite's own schema.
    fn introspect(&mut self, table: &str) -> Result<Vec<FieldSchema>> {
        let Self { runtime, conn, .. } = self;
        let columns: Vec<(String, String, i64, Option<String>, i64)> = runtime.block_on(
            sqlx::query_as(
                r#"
                SELECT name, type, "notnull", dflt_value, pk
                FROM pragma_table_info(?) ORDER BY cid
                "#,
            )
            .bind(table)
            .fetch_all(&mut *conn),
        )?;
        let create_sql: Option<(Option<String>,)> = runtime.block_on(
            sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&mut *conn),
        )?;
        let indexes: Vec<(String, i64, String)> = runtime.block_on(
            sqlx::query_as(r#"SELECT name, "unique", origin FROM pragma_index_list(?)"#)
                .bind(table)
                .fetch_all(&mut *conn),
        )?;

        let mut single_column: Vec<(String, bool)> = Vec::new();
        for (index, unique, origin) in indexes {
            if origin == "pk" {
                continue;
            }
            let indexed: Vec<(String,)> = runtime.block_on(
                sqlx::query_as("SELECT name FROM pragma_index_info(?)")
                    .bind(&index)
                    .fetch_all(&mut *conn),
            )?;
            if let [(column,)] = indexed.as_slice() {
                single_column.push((column.clone(), unique != 0));
            }
        }

        let autoincrement = create_sql
            .and_then(|(sql,)| sql)
            .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));
        let pk_count = columns.iter().filter(|c| c.4 > 0).count();

        let fields = columns
            .into_iter()
            .map(|(name, declared, not_null, default, pk)| {
                let (field_type, max_length) = field_type_from_sql(&declared);
                let mut field = FieldSchema::new(name, field_type);
                field.max_length = max_length;
                field.not_null = not_null != 0;
                if pk > 0 {
                    field = field.primary_key();
                    field.auto_increment = autoincrement && pk_count == 1;
                }
                for (column, unique) in &single_column {
                    if *column == field.name {
                        if *unique {
                            field.unique = true;
                        } else {
                            field.indexed = true;
                        }
                    }
                }
                if let Some(literal) = default {
                    let raw = parse_default(&literal);
                    field.default_value = field.convert_value(&raw).unwrap_or(raw);
                }
                field
            })
            .collect();
        Ok(fields)
    }

    fn assign_uids(&mut self, schema: &mut TableSchema) {
        let Self {
            uids, known_uids, ..
        } = self;
        for field in &mut schema.fields {
            let key = (schema.name.clone(), field.name.clone());
            field.uid = *known_uids.entry(key).or_insert_with(|| uids.next_uid());
        }
    }

    fn register_uids(&mut self, schema: &TableSchema) {
        for field in schema.fields.iter().filter(|f| f.uid.is_assigned()) {
            self.known_uids
                .insert((schema.name.clone(), field.name.clone()), field.uid);
        }
    }

    fn forget_uids(&mut self, table: &str) {
        self.known_uids.retain(|(t, _), _| t != table);
    }
}

impl SchemaCatalog for SqliteCatalog {
    fn begin_transaction(&mut self) -> AlterResult<()> {
        self.execute_sql("BEGIN")?;
        self.snapshot = Some(self.known_uids.clone());
        Ok(())
    }

    fn commit(&mut self) -> AlterResult<()> {
        self.execute_sql("COMMIT")?;
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> AlterResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.known_uids = snapshot;
        }
        self.execute_sql("ROLLBACK")?;
        Ok(())
    }

    fn table_schema(&mut self, name: &str) -> AlterResult<TableSchema> {
        if !self.table_exists(name)? {
            return Err(AlterError::TableNotFound(name.to_string()));
        }
        let mut fields = self.catalog_fields(name)?;
        if fields.is_empty() {
            fields = self.introspect(name)?;
        }
        let mut schema = TableSchema {
            name: name.to_string(),
            caption: String::new(),
            fields,
        };
        self.assign_uids(&mut schema);
        Ok(schema)
    }

    fn table_exists(&mut self, name: &str) -> AlterResult<bool> {
        let Self { runtime, conn, .. } = self;
        let found: Option<(i64,)> = runtime
            .block_on(
                sqlx::query_as("SELECT 1 FROM sqlite_master WHERE name = ?")
                    .bind(name)
                    .fetch_optional(&mut *conn),
            )
            .map_err(SqliteCatalogError::from)?;
        Ok(found.is_some())
    }

    fn next_field_uid(&mut self) -> AlterResult<FieldUid> {
        Ok(self.uids.next_uid())
    }

    fn store_field_metadata(
        &mut self,
        table: &str,
        field: &FieldSchema,
        scope: CatalogScope,
    ) -> AlterResult<()> {
        if self.catalog_fields(table)?.is_empty() {
            let schema = self.table_schema(table)?;
            self.write_catalog(&schema)?;
        }

        let stored = self
            .catalog_fields(table)?
            .into_iter()
            .find(|f| f.name == field.name)
            .ok_or_else(|| AlterError::UnknownField {
                table: table.to_string(),
                uid: field.uid,
            })?;

        let (column, json) = match scope {
            CatalogScope::Main => {
                let mut main = stored;
                main.caption = field.caption.clone();
                main.description = field.description.clone();
                main.allow_empty = field.allow_empty;
                main.extended = ExtendedProperties::default();
                ("definition", serde_json::to_string(&main)?)
            }
            CatalogScope::Extended => ("extended", serde_json::to_string(&field.extended)?),
        };

        let sql = format!(
            "UPDATE \"oxide_alter_fields\" SET \"{column}\" = ? \
             WHERE \"table_name\" = ? AND \"field_name\" = ?"
        );
        debug!(sql = %sql, field = %field.name, "Executing SQL");
        let Self { runtime, conn, .. } = self;
        runtime
            .block_on(
                sqlx::query(&sql)
                    .bind(json)
                    .bind(table)
                    .bind(&field.name)
                    .execute(&mut *conn),
            )
            .map_err(SqliteCatalogError::from)?;
        Ok(())
    }

    fn create_physical_table(&mut self, schema: &TableSchema) -> AlterResult<()> {
        schema.validate()?;
        let sql = self.dialect.create_table_sql(schema);
        self.execute_sql(&sql)?;
        for field in &schema.fields {
            if field.indexed && !field.unique && !field.primary_key {
                let sql = self.dialect.create_index_sql(&schema.name, &field.name);
                self.execute_sql(&sql)?;
            }
        }
        self.write_catalog(schema)?;
        self.register_uids(schema);
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> AlterResult<()> {
        let sql = self.dialect.drop_table_sql(name);
        self.execute_sql(&sql)?;
        self.delete_catalog(name)?;
        self.forget_uids(name);
        Ok(())
    }

    fn rename_table(&mut self, old_name: &str, new_name: &str) -> AlterResult<()> {
        let sql = self.dialect.rename_table_sql(old_name, new_name);
        self.execute_sql(&sql)?;

        let Self { runtime, conn, .. } = self;
        runtime
            .block_on(
                sqlx::query(
                    r#"UPDATE "oxide_alter_fields" SET "table_name" = ? WHERE "table_name" = ?"#,
                )
                .bind(new_name)
                .bind(old_name)
                .execute(&mut *conn),
            )
            .map_err(SqliteCatalogError::from)?;

        // Index names embed the table name; move them along so the next
        // recreation of `new_name` does not collide.
        for field in self.catalog_fields(new_name)? {
            if field.indexed && !field.unique && !field.primary_key {
                let drop = self.dialect.drop_index_sql(old_name, &field.name);
                self.execute_sql(&drop)?;
                let create = self.dialect.create_index_sql(new_name, &field.name);
                self.execute_sql(&create)?;
            }
        }

        let moved: Vec<((String, String), FieldUid)> = self
            .known_uids
            .iter()
            .filter(|((table, _), _)| table == old_name)
            .map(|((_, field), uid)| ((new_name.to_string(), field.clone()), *uid))
            .collect();
        self.forget_uids(old_name);
        self.known_uids.extend(moved);
        Ok(())
    }

    fn copy_rows(
        &mut self,
        source: &str,
        destination: &str,
        plan: &ConversionPlan,
    ) -> AlterResult<CopyStats> {
        let source_columns = plan.source_columns();
        let rows = self.select_rows(source, &source_columns)?;
        let insert = self.dialect.insert_sql(destination, &plan.target_columns());
        debug!(sql = %insert, rows = rows.len(), "Copying rows");

        let mut stats = CopyStats::default();
        let Self { runtime, conn, .. } = self;
        for row in rows {
            let converted = plan.convert_row(&row);
            if converted.conversion_failed {
                stats.rows_with_conversion_failure += 1;
            }
            let query = converted
                .values
                .into_iter()
                .fold(sqlx::query(&insert), bind_value);
            runtime
                .block_on(query.execute(&mut *conn))
                .map_err(SqliteCatalogError::from)?;
            stats.rows_copied += 1;
        }
        Ok(stats)
    }
}

/// Binds a value with the SQLite storage class matching its variant.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Integer(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Blob(bytes) => query.bind(bytes),
        Value::Date(_) | Value::DateTime(_) | Value::Time(_) => query.bind(value.to_string()),
    }
}

/// Decodes column `index` by its runtime storage class.
fn decode_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

/// Parses a `dflt_value` literal from `pragma_table_info`.
fn parse_default(literal: &str) -> Value {
    let trimmed = literal.trim();
    if trimmed.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Value::Text(inner.replace("''", "'"));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    // Expressions such as CURRENT_TIMESTAMP have no stored value.
    Value::Null
}
