//! JSON alter scripts.
//!
//! A script names fields instead of uids:
//!
//! ```json
//! {
//!   "options": { "simulate": false },
//!   "actions": [
//!     { "action": "change_property", "field": "name", "property": "caption", "value": "Name" },
//!     { "action": "remove_field", "field": "city" },
//!     { "action": "insert_field", "position": 2, "field": { "name": "city", "field_type": "Text" } },
//!     { "action": "move_field", "field": "name", "position": 0 }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::action::{Action, ActionBatch, FieldRef};
use crate::catalog::SchemaCatalog;
use crate::error::{AlterError, Result};
use crate::executor::AlterOptions;
use crate::property::FieldProperty;
use crate::schema::{FieldSchema, TableSchema};
use crate::value::Value;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    ChangeProperty {
        field: String,
        property: String,
        #[serde(default)]
        value: Value,
    },
    RemoveField {
        field: String,
    },
    InsertField {
        position: usize,
        field: FieldSchema,
    },
    MoveField {
        field: String,
        position: usize,
    },
}

/// A parsed alter script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlterScript {
    pub options: AlterOptions,
    pub actions: Vec<ScriptAction>,
}

impl AlterScript {
    /// Parses a script.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::Serialization`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolves field names against `table` and builds the action batch.
    ///
    /// Renames earlier in the script are followed, so later actions may use
    /// the new name. Inserted fields receive fresh uids from `catalog`.
    ///
    /// # Errors
    ///
    /// Fails when a field name cannot be resolved or the catalog cannot
    /// issue a uid.
    pub fn resolve<C: SchemaCatalog + ?Sized>(
        &self,
        table: &TableSchema,
        catalog: &mut C,
    ) -> Result<ActionBatch> {
        let mut names: HashMap<String, FieldRef> = table
            .fields
            .iter()
            .map(|f| (f.name.clone(), FieldRef::from(f)))
            .collect();

        let mut batch = ActionBatch::new();
        for scripted in &self.actions {
            let action = match scripted {
                ScriptAction::ChangeProperty {
                    field,
                    property,
                    value,
                } => {
                    let target = lookup(&names, table, field)?;
                    if property == FieldProperty::Name.name() {
                        if let Some(new_name) = value.as_text() {
                            names.remove(field);
                            names.insert(
                                new_name.to_string(),
                                FieldRef::new(target.uid, new_name),
                            );
                        }
                    }
                    Action::change_property(target, property.clone(), value.clone())
                }
                ScriptAction::RemoveField { field } => {
                    let target = lookup(&names, table, field)?;
                    names.remove(field);
                    Action::remove_field(target)
                }
                ScriptAction::InsertField { position, field } => {
                    let mut new_field = field.clone();
                    new_field.uid = catalog.next_field_uid()?;
                    names.insert(new_field.name.clone(), FieldRef::from(&new_field));
                    Action::insert_field(*position, new_field)
                }
                ScriptAction::MoveField { field, position } => {
                    Action::move_field(lookup(&names, table, field)?, *position)
                }
            };
            batch.push(action);
        }
        Ok(batch)
    }
}

fn lookup(
    names: &HashMap<String, FieldRef>,
    table: &TableSchema,
    field: &str,
) -> Result<FieldRef> {
    names.get(field).cloned().ok_or_else(|| {
        AlterError::InvalidBatch(format!(
            "field '{field}' does not exist in table '{}'",
            table.name
        ))
    })
}
