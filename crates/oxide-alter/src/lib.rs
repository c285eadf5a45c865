//! SQLite backend for `oxide-alter-core`.
//!
//! [`SqliteCatalog`] implements [`SchemaCatalog`](oxide_alter_core::catalog::SchemaCatalog)
//! over a single SQLite connection. Physical alterations recreate the table
//! under a temporary name, copy the rows, drop the original and rename the
//! copy, all inside one transaction.
//!
//! # Example
//!
//! ```rust
//! use oxide_alter::SqliteCatalog;
//! use oxide_alter_core::prelude::*;
//!
//! let mut catalog = SqliteCatalog::open_in_memory().unwrap();
//! catalog
//!     .execute_sql("CREATE TABLE persons (id INTEGER PRIMARY KEY, age TEXT)")
//!     .unwrap();
//! catalog.execute_sql("INSERT INTO persons VALUES (1, '36')").unwrap();
//!
//! let table = catalog.table_schema("persons").unwrap();
//! let age = table.get_field("age").unwrap();
//!
//! let mut handler = AlterTableHandler::new();
//! handler.add_action(Action::change_property(age, "type", "Integer"));
//! let report = handler.execute(&mut catalog, "persons", &AlterOptions::new());
//!
//! assert!(report.outcome.is_success());
//! assert_eq!(catalog.column("persons", "age").unwrap(), vec![Value::Integer(36)]);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the stored definition of a table
//! oxide-alter --database sqlite:app.db describe persons
//!
//! # Simplify a script and show what it requires
//! oxide-alter plan persons --script alter.json
//!
//! # Apply it
//! oxide-alter apply persons --script alter.json
//! ```

pub mod catalog;
pub mod dialect;
pub mod error;

pub use catalog::{SqliteCatalog, FIELDS_TABLE};
pub use dialect::{AlterDialect, SqliteDialect};
pub use error::{Result, SqliteCatalogError};
