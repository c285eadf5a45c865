//! SQLite dialect.
//!
//! SQLite cannot alter column definitions in place, which is why every
//! physical change goes through table recreation. Declared types only set
//! column affinity; the declared name is kept so a table created by another
//! tool can be introspected back into a [`FieldType`].

use std::fmt::Write;

use oxide_alter_core::schema::{FieldSchema, FieldType};
use oxide_alter_core::value::Value;

use super::AlterDialect;

/// SQLite dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AlterDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, field: &FieldSchema) -> String {
        // AUTOINCREMENT is only accepted on a column declared exactly INTEGER.
        if field.auto_increment && field.primary_key {
            return "INTEGER".to_string();
        }
        match field.field_type {
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Byte => "TINYINT".to_string(),
            FieldType::ShortInteger => "SMALLINT".to_string(),
            FieldType::Integer => "INTEGER".to_string(),
            FieldType::BigInteger => "BIGINT".to_string(),
            FieldType::Float => "FLOAT".to_string(),
            FieldType::Double => "DOUBLE".to_string(),
            FieldType::Text if field.max_length > 0 => format!("VARCHAR({})", field.max_length),
            FieldType::Text => "VARCHAR".to_string(),
            FieldType::LongText => "TEXT".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::DateTime => "DATETIME".to_string(),
            FieldType::Time => "TIME".to_string(),
            FieldType::Blob => "BLOB".to_string(),
        }
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => u8::from(*b).to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2 + 3);
                hex.push_str("X'");
                for byte in bytes {
                    let _ = write!(hex, "{byte:02X}");
                }
                hex.push('\'');
                hex
            }
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) => format!("'{value}'"),
        }
    }
}

/// Maps a declared SQLite column type back to a field type and max length.
#[must_use]
pub fn field_type_from_sql(declared: &str) -> (FieldType, u32) {
    let upper = declared.trim().to_ascii_uppercase();
    let (base, length) = upper
        .split_once('(')
        .map_or((upper.as_str(), 0), |(base, rest)| {
            let length = rest
                .trim_end_matches(')')
                .split(',')
                .next()
                .and_then(|n| n.trim().parse::<u32>().ok())
                .unwrap_or(0);
            (base.trim(), length)
        });

    let field_type = match base {
        "BOOLEAN" | "BOOL" => FieldType::Boolean,
        "TINYINT" => FieldType::Byte,
        "SMALLINT" => FieldType::ShortInteger,
        "BIGINT" => FieldType::BigInteger,
        "FLOAT" => FieldType::Float,
        "DOUBLE" | "DOUBLE PRECISION" | "REAL" | "NUMERIC" | "DECIMAL" => FieldType::Double,
        "DATE" => FieldType::Date,
        "DATETIME" | "TIMESTAMP" => FieldType::DateTime,
        "TIME" => FieldType::Time,
        "BLOB" => FieldType::Blob,
        "VARCHAR" | "CHAR" | "CHARACTER" | "NVARCHAR" | "NCHAR" | "VARYING CHARACTER" => {
            FieldType::Text
        }
        other if other.contains("INT") => FieldType::Integer,
        other if other.contains("CHAR") => FieldType::Text,
        _ => FieldType::LongText,
    };
    let length = if field_type == FieldType::Text {
        length
    } else {
        0
    };
    (field_type, length)
}
