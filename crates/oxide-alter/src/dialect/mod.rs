//! SQL generation for catalog backends.
//!
//! A dialect turns [`FieldSchema`] and [`TableSchema`] definitions into the
//! DDL and DML statements a catalog adapter executes.

mod sqlite;

pub use sqlite::{field_type_from_sql, SqliteDialect};

use oxide_alter_core::schema::{FieldSchema, TableSchema};
use oxide_alter_core::value::Value;

/// Trait for database-specific SQL generation.
pub trait AlterDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the column type for a field.
    fn type_name(&self, field: &FieldSchema) -> String;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Renders a value as a SQL literal.
    fn literal(&self, value: &Value) -> String;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Generates column definition SQL.
    ///
    /// `inline_primary_key` is false when the table has a composite key,
    /// which is then declared as a table constraint.
    fn column_definition(&self, field: &FieldSchema, inline_primary_key: bool) -> String {
        let mut parts = vec![self.quote_identifier(&field.name), self.type_name(field)];

        let inline_pk = field.primary_key && inline_primary_key;
        if inline_pk {
            parts.push("PRIMARY KEY".to_string());
            if field.auto_increment {
                parts.push(self.auto_increment_keyword().to_string());
            }
        }

        if field.not_null && !inline_pk {
            parts.push("NOT NULL".to_string());
        }

        if field.unique && !field.primary_key {
            parts.push("UNIQUE".to_string());
        }

        if !field.default_value.is_null() {
            if let Ok(default) = field.convert_value(&field.default_value) {
                parts.push(format!("DEFAULT {}", self.literal(&default)));
            }
        }

        parts.join(" ")
    }

    /// Generates `CREATE TABLE` for a definition.
    fn create_table_sql(&self, table: &TableSchema) -> String {
        let primary_key: Vec<&FieldSchema> = table.primary_key_fields().collect();
        let inline = primary_key.len() == 1;

        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.quote_identifier(&table.name));
        sql.push_str(" (\n  ");
        let col_defs: Vec<String> = table
            .fields
            .iter()
            .map(|f| self.column_definition(f, inline))
            .collect();
        sql.push_str(&col_defs.join(",\n  "));

        if primary_key.len() > 1 {
            sql.push_str(",\n  PRIMARY KEY (");
            let quoted: Vec<String> = primary_key
                .iter()
                .map(|f| self.quote_identifier(&f.name))
                .collect();
            sql.push_str(&quoted.join(", "));
            sql.push(')');
        }

        sql.push_str("\n)");
        sql
    }

    /// Generates `DROP TABLE`.
    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates SQL for renaming a table.
    fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Name of the index backing an indexed field.
    fn index_name(&self, table: &str, field: &str) -> String {
        format!("{table}__{field}__idx")
    }

    /// Generates `CREATE INDEX` for an indexed field.
    fn create_index_sql(&self, table: &str, field: &str) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.quote_identifier(&self.index_name(table, field)),
            self.quote_identifier(table),
            self.quote_identifier(field)
        )
    }

    /// Generates `DROP INDEX`.
    fn drop_index_sql(&self, table: &str, field: &str) -> String {
        format!(
            "DROP INDEX IF EXISTS {}",
            self.quote_identifier(&self.index_name(table, field))
        )
    }

    /// Generates a parameterized `INSERT` for `columns`.
    fn insert_sql(&self, table: &str, columns: &[&str]) -> String {
        let names: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let params = vec!["?"; columns.len()];
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            names.join(", "),
            params.join(", ")
        )
    }

    /// Generates a `SELECT` of `columns` in rowid order.
    fn select_sql(&self, table: &str, columns: &[&str]) -> String {
        let projection = if columns.is_empty() {
            "1".to_string()
        } else {
            columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "SELECT {} FROM {} ORDER BY rowid",
            projection,
            self.quote_identifier(table)
        )
    }
}
