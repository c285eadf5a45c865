//! Alteration actions.
//!
//! An [`Action`] is one requested change to a table definition. Actions are
//! collected into an [`ActionBatch`], which records the order they were
//! requested in; that order is what "later" means for the simplifier.

use std::fmt;

use crate::catalog::{CatalogScope, SchemaCatalog};
use crate::error::{AlterError, Result};
use crate::property::{classify, FieldProperty};
use crate::requirements::Requirements;
use crate::schema::{FieldSchema, FieldUid, TableSchema};
use crate::value::Value;

/// Reference to an existing field: its identity plus the name it had when
/// the action was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub uid: FieldUid,
    pub name: String,
}

impl FieldRef {
    #[must_use]
    pub fn new(uid: FieldUid, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
        }
    }
}

impl From<&FieldSchema> for FieldRef {
    fn from(field: &FieldSchema) -> Self {
        Self::new(field.uid, field.name.clone())
    }
}

/// The four kinds of change.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Change one property of a field.
    ChangeProperty {
        field: FieldRef,
        property: String,
        new_value: Value,
    },
    /// Remove a field.
    RemoveField { field: FieldRef },
    /// Insert a new field at `position`.
    InsertField {
        position: usize,
        new_field: FieldSchema,
    },
    /// Move a field to `position`.
    MoveFieldPosition { field: FieldRef, position: usize },
}

/// A single requested change.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    order: usize,
    is_null: bool,
    kind: ActionKind,
}

impl Action {
    const fn from_kind(kind: ActionKind) -> Self {
        Self {
            order: 0,
            is_null: false,
            kind,
        }
    }

    /// Changes `property` of `field` to `new_value`.
    #[must_use]
    pub fn change_property(
        field: impl Into<FieldRef>,
        property: impl Into<String>,
        new_value: impl Into<Value>,
    ) -> Self {
        Self::from_kind(ActionKind::ChangeProperty {
            field: field.into(),
            property: property.into(),
            new_value: new_value.into(),
        })
    }

    /// Removes `field`.
    #[must_use]
    pub fn remove_field(field: impl Into<FieldRef>) -> Self {
        Self::from_kind(ActionKind::RemoveField {
            field: field.into(),
        })
    }

    /// Inserts `new_field` at `position`. The field must already carry a uid.
    #[must_use]
    pub fn insert_field(position: usize, new_field: FieldSchema) -> Self {
        Self::from_kind(ActionKind::InsertField {
            position,
            new_field,
        })
    }

    /// Moves `field` to `position`.
    #[must_use]
    pub fn move_field(field: impl Into<FieldRef>, position: usize) -> Self {
        Self::from_kind(ActionKind::MoveFieldPosition {
            field: field.into(),
            position,
        })
    }

    /// Sequence number within the batch.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Returns true if this action was neutralized and has no effect.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.is_null
    }

    /// Neutralizes the action.
    pub const fn set_null(&mut self) {
        self.is_null = true;
    }

    #[must_use]
    pub const fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub(crate) const fn kind_mut(&mut self) -> &mut ActionKind {
        &mut self.kind
    }

    /// Identity of the field the action applies to.
    #[must_use]
    pub const fn field_uid(&self) -> FieldUid {
        match &self.kind {
            ActionKind::ChangeProperty { field, .. }
            | ActionKind::RemoveField { field }
            | ActionKind::MoveFieldPosition { field, .. } => field.uid,
            ActionKind::InsertField { new_field, .. } => new_field.uid,
        }
    }

    /// Name of the field the action applies to.
    #[must_use]
    pub fn field_name(&self) -> &str {
        match &self.kind {
            ActionKind::ChangeProperty { field, .. }
            | ActionKind::RemoveField { field }
            | ActionKind::MoveFieldPosition { field, .. } => &field.name,
            ActionKind::InsertField { new_field, .. } => &new_field.name,
        }
    }

    /// The property changed by a `ChangeProperty` action.
    ///
    /// Returns `Ok(None)` for other kinds.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::UnknownProperty`] for unknown names.
    pub fn property(&self) -> Result<Option<FieldProperty>> {
        match &self.kind {
            ActionKind::ChangeProperty { property, .. } => FieldProperty::from_name(property)
                .map(Some)
                .ok_or_else(|| AlterError::UnknownProperty(property.clone())),
            _ => Ok(None),
        }
    }

    /// Requirements of this action on its own.
    #[must_use]
    pub fn requirements(&self) -> Requirements {
        if self.is_null {
            return Requirements::empty();
        }
        match &self.kind {
            ActionKind::ChangeProperty { property, .. } => classify(property),
            ActionKind::RemoveField { .. } => {
                Requirements::PHYSICAL_ALTERATION | Requirements::DATA_CONVERSION
            }
            ActionKind::InsertField { .. } | ActionKind::MoveFieldPosition { .. } => {
                Requirements::PHYSICAL_ALTERATION
            }
        }
    }

    /// Applies the action to an in-memory table definition.
    ///
    /// # Errors
    ///
    /// Fails when the field is unknown, the position is out of range or the
    /// property value does not fit.
    pub fn apply_to_schema(&self, table: &mut TableSchema) -> Result<()> {
        if self.is_null {
            return Ok(());
        }
        match &self.kind {
            ActionKind::ChangeProperty { new_value, .. } => {
                let property = self.required_property()?;
                let field = field_mut(table, self.field_uid())?;
                field.set_property(property, new_value)
            }
            ActionKind::RemoveField { field } => {
                let pos = position(table, field.uid)?;
                table.fields.remove(pos);
                Ok(())
            }
            ActionKind::InsertField {
                position,
                new_field,
            } => {
                if !new_field.uid.is_assigned() {
                    return Err(AlterError::InvalidBatch(format!(
                        "inserted field '{}' has no uid",
                        new_field.name
                    )));
                }
                if table.field_by_uid(new_field.uid).is_some() {
                    return Err(AlterError::InvalidBatch(format!(
                        "field with uid {} already exists",
                        new_field.uid
                    )));
                }
                check_position(table, *position)?;
                table.fields.insert(*position, new_field.clone());
                Ok(())
            }
            ActionKind::MoveFieldPosition { field, position } => {
                let from = self::position(table, field.uid)?;
                let moved = table.fields.remove(from);
                if let Err(err) = check_position(table, *position) {
                    table.fields.insert(from, moved);
                    return Err(err);
                }
                table.fields.insert(*position, moved);
                Ok(())
            }
        }
    }

    /// Applies a metadata-only action to `table` and persists the changed
    /// field through `catalog`.
    ///
    /// # Errors
    ///
    /// Actions requiring a physical alteration are rejected. Catalog errors
    /// are passed through.
    pub fn apply_to_catalog<C: SchemaCatalog + ?Sized>(
        &self,
        table: &mut TableSchema,
        catalog: &mut C,
    ) -> Result<()> {
        if self.is_null {
            return Ok(());
        }
        let ActionKind::ChangeProperty { new_value, .. } = &self.kind else {
            return Err(AlterError::InvalidBatch(format!(
                "{} requires a physical alteration",
                self.kind_name()
            )));
        };
        let property = self.required_property()?;
        let requirements = property.requirements();
        if requirements.requires_physical() {
            return Err(AlterError::InvalidBatch(format!(
                "property '{property}' requires a physical alteration"
            )));
        }
        let scope = if requirements.contains(Requirements::MAIN_CATALOG_UPDATE) {
            CatalogScope::Main
        } else {
            CatalogScope::Extended
        };

        let table_name = table.name.clone();
        let field = field_mut(table, self.field_uid())?;
        field.set_property(property, new_value)?;
        catalog.store_field_metadata(&table_name, field, scope)
    }

    /// Name of the action kind, as used in traces.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match &self.kind {
            ActionKind::ChangeProperty { .. } => "ChangeProperty",
            ActionKind::RemoveField { .. } => "RemoveField",
            ActionKind::InsertField { .. } => "InsertField",
            ActionKind::MoveFieldPosition { .. } => "MoveFieldPosition",
        }
    }

    fn required_property(&self) -> Result<FieldProperty> {
        self.property()?.ok_or_else(|| {
            AlterError::InvalidBatch(format!("{} has no property", self.kind_name()))
        })
    }
}

fn field_mut(table: &mut TableSchema, uid: FieldUid) -> Result<&mut FieldSchema> {
    let name = table.name.clone();
    table
        .field_by_uid_mut(uid)
        .ok_or(AlterError::UnknownField { table: name, uid })
}

fn position(table: &TableSchema, uid: FieldUid) -> Result<usize> {
    table.position_of(uid).ok_or_else(|| AlterError::UnknownField {
        table: table.name.clone(),
        uid,
    })
}

fn check_position(table: &TableSchema, position: usize) -> Result<()> {
    if position > table.fields.len() {
        return Err(AlterError::InvalidBatch(format!(
            "position {position} is out of range for table '{}' with {} fields",
            table.name,
            table.fields.len()
        )));
    }
    Ok(())
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.order)?;
        if self.is_null {
            f.write_str("(null) ")?;
        }
        write!(
            f,
            "{} field={:?} uid={}",
            self.kind_name(),
            self.field_name(),
            self.field_uid()
        )?;
        match &self.kind {
            ActionKind::ChangeProperty {
                property,
                new_value,
                ..
            } => write!(f, " {property}={new_value}")?,
            ActionKind::RemoveField { .. } => {}
            ActionKind::InsertField {
                position,
                new_field,
            } => write!(f, " position={position} type={}", new_field.field_type)?,
            ActionKind::MoveFieldPosition { position, .. } => write!(f, " position={position}")?,
        }
        write!(f, " requires={}", self.requirements())
    }
}

/// Ordered collection of actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBatch {
    actions: Vec<Action>,
    next_order: usize,
}

impl ActionBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a batch from actions that already carry their order.
    pub(crate) const fn from_parts(actions: Vec<Action>, next_order: usize) -> Self {
        Self {
            actions,
            next_order,
        }
    }

    /// Appends an action, stamping it with the next sequence number.
    ///
    /// Returns the assigned order.
    pub fn push(&mut self, mut action: Action) -> usize {
        action.order = self.next_order;
        self.next_order += 1;
        self.actions.push(action);
        self.next_order - 1
    }

    /// Appends an action (builder style).
    #[must_use]
    pub fn with(mut self, action: Action) -> Self {
        self.push(action);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sequence number the next pushed action will receive.
    #[must_use]
    pub const fn next_order(&self) -> usize {
        self.next_order
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Action] {
        &self.actions
    }

    /// Removes every action and restarts numbering.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.next_order = 0;
    }

    /// Union of the requirements of every action.
    #[must_use]
    pub fn requirements(&self) -> Requirements {
        self.actions
            .iter()
            .fold(Requirements::empty(), |acc, a| acc | a.requirements())
    }
}

impl IntoIterator for ActionBatch {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ActionBatch {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl FromIterator<Action> for ActionBatch {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut batch = Self::new();
        for action in iter {
            batch.push(action);
        }
        batch
    }
}
