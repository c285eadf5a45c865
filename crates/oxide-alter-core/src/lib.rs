//! Table schema alteration for Rust.
//!
//! `oxide-alter-core` applies a batch of definition changes to an existing
//! table while preserving its data:
//! - Redundant or mutually cancelling requests are simplified away first
//! - Each change is classified by what it needs from the backend
//! - Metadata-only changes update the schema catalog in place
//! - Everything else recreates the table and copies the rows, converting
//!   values where the field type changed
//!
//! # Architecture
//!
//! - **Actions** - `ChangeProperty`, `RemoveField`, `InsertField`, `MoveFieldPosition`
//! - **Classifier** - Maps each property name to its [`Requirements`](requirements::Requirements)
//! - **Simplifier** - Reduces a batch to an equivalent minimal one
//! - **Executor** - Runs the batch against a [`SchemaCatalog`](catalog::SchemaCatalog)
//!   inside one transaction
//! - **Catalog** - The backend seam; [`MemoryCatalog`](memory::MemoryCatalog) is
//!   the in-memory reference implementation
//!
//! # Example
//!
//! ```rust
//! use oxide_alter_core::prelude::*;
//!
//! let mut catalog = MemoryCatalog::new();
//! let table = catalog
//!     .create_table(
//!         TableSchema::new("persons")
//!             .field(FieldSchema::new("id", FieldType::Integer).primary_key())
//!             .field(FieldSchema::new("name", FieldType::Text)),
//!     )
//!     .unwrap();
//!
//! let mut handler = AlterTableHandler::new();
//! handler.add_action(Action::change_property(&table.fields[1], "caption", "Name"));
//! let report = handler.execute(&mut catalog, "persons", &AlterOptions::new());
//!
//! assert!(report.outcome.is_success());
//! assert_eq!(report.requirements, Requirements::MAIN_CATALOG_UPDATE);
//! ```

pub mod action;
pub mod catalog;
pub mod error;
pub mod executor;
pub mod memory;
pub mod notify;
pub mod property;
pub mod requirements;
pub mod schema;
pub mod script;
pub mod simplify;
pub mod trace;
pub mod value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::action::{Action, ActionBatch, ActionKind, FieldRef};
    pub use crate::catalog::{
        CatalogScope, ColumnMapping, ConversionPlan, ConvertedRow, CopyStats, SchemaCatalog,
        Transaction,
    };
    pub use crate::error::{AlterError, Outcome, Result};
    pub use crate::executor::{
        AlterOptions, AlterReport, AlterTableHandler, CancelToken, ExecutionState,
    };
    pub use crate::memory::{CatalogOperation, MemoryCatalog};
    pub use crate::notify::{ListenerId, ListenerRegistry, TableListener};
    pub use crate::property::{classify, FieldProperty};
    pub use crate::requirements::{AlterStrategy, Requirements};
    pub use crate::schema::{
        ExtendedProperties, FieldSchema, FieldType, FieldUid, LookupField, TableSchema,
        UidGenerator,
    };
    pub use crate::script::{AlterScript, ScriptAction};
    pub use crate::simplify::{simplify, Simplified};
    pub use crate::value::{ConversionError, Value};
}
