//! Batch simplification.
//!
//! Reduces a batch to an equivalent, minimal one:
//!
//! - for each (field, property) pair only the last change survives, and it is
//!   dropped when it restores the original value;
//! - property changes of an inserted field are folded into the insertion;
//! - a move is dropped when the next move or removal of the same field
//!   follows it with no layout change of another field in between;
//! - a move of an inserted field that follows the insertion the same way is
//!   folded into it, and a removal that does so cancels the whole group;
//! - removing a field discards its property changes.
//!
//! Layout changes are insertions, removals and moves. Positions are absolute,
//! so a layout change of another field pins the actions around it.
//!
//! Survivors keep their original order. Simplifying a simplified batch
//! returns it unchanged.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::action::{Action, ActionBatch, ActionKind};
use crate::error::{AlterError, Result};
use crate::property::FieldProperty;
use crate::requirements::Requirements;
use crate::schema::{FieldSchema, FieldUid, TableSchema};

/// Result of [`simplify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Simplified {
    /// The reduced batch.
    pub batch: ActionBatch,
    /// Union of the requirements of the reduced batch.
    pub requirements: Requirements,
    /// Actions ignored because their property is unknown.
    pub skipped: Vec<Action>,
}

impl Simplified {
    /// Uids of fields whose values must be converted when rows are copied.
    #[must_use]
    pub fn data_conversion_uids(&self) -> HashSet<FieldUid> {
        self.batch
            .iter()
            .filter(|a| a.requirements().contains(Requirements::DATA_CONVERSION))
            .map(Action::field_uid)
            .collect()
    }
}

/// Simplifies `batch` against the current definition of the table.
///
/// # Errors
///
/// Fails when an action references a field that neither exists nor is
/// inserted earlier in the batch, or when a property value has the wrong
/// shape.
pub fn simplify(batch: ActionBatch, table: &TableSchema) -> Result<Simplified> {
    let next_order = batch.next_order();
    let total = batch.len();

    let mut inserted: HashSet<FieldUid> = HashSet::new();
    let mut actions = Vec::new();
    let mut skipped = Vec::new();

    for mut action in batch {
        if action.is_null() {
            continue;
        }
        check_reference(&action, table, &inserted)?;
        if let ActionKind::InsertField { new_field, .. } = action.kind() {
            inserted.insert(new_field.uid);
        }
        if let ActionKind::ChangeProperty { property, .. } = action.kind() {
            if FieldProperty::from_name(property).is_none() {
                warn!(
                    property = %property,
                    field = %action.field_name(),
                    "Skipping change of unknown property"
                );
                skipped.push(action);
                continue;
            }
        }
        if let ActionKind::ChangeProperty {
            property,
            new_value,
            ..
        } = action.kind_mut()
        {
            if let Some(known) = FieldProperty::from_name(property) {
                *new_value = known.coerce(new_value)?;
            }
        }
        actions.push(action);
    }
    actions.sort_by_key(Action::order);

    // Every reduction drops at least one action, so this terminates.
    loop {
        let before = actions.len();
        actions = reduce(actions, table, &inserted)?;
        if actions.len() == before {
            break;
        }
        trace!(before, after = actions.len(), "Reduction pass");
    }

    let requirements = actions
        .iter()
        .fold(Requirements::empty(), |acc, a| acc | a.requirements());
    debug!(
        before = total,
        after = actions.len(),
        skipped = skipped.len(),
        requirements = %requirements,
        "Simplified action batch"
    );

    Ok(Simplified {
        batch: ActionBatch::from_parts(actions, next_order),
        requirements,
        skipped,
    })
}

fn check_reference(
    action: &Action,
    table: &TableSchema,
    inserted: &HashSet<FieldUid>,
) -> Result<()> {
    let uid = action.field_uid();
    if let ActionKind::InsertField { new_field, .. } = action.kind() {
        if !uid.is_assigned() {
            return Err(AlterError::InvalidBatch(format!(
                "inserted field '{}' has no uid",
                new_field.name
            )));
        }
        if table.field_by_uid(uid).is_some() || inserted.contains(&uid) {
            return Err(AlterError::InvalidBatch(format!(
                "field with uid {uid} is inserted but already exists"
            )));
        }
        return Ok(());
    }
    if table.field_by_uid(uid).is_some() || inserted.contains(&uid) {
        Ok(())
    } else {
        Err(AlterError::UnknownField {
            table: table.name.clone(),
            uid,
        })
    }
}

/// One reduction pass over `actions`, which are sorted by order.
fn reduce(
    actions: Vec<Action>,
    table: &TableSchema,
    inserted: &HashSet<FieldUid>,
) -> Result<Vec<Action>> {
    let layout = Layout::new(&actions);
    let mut groups: HashMap<FieldUid, Vec<Action>> = HashMap::new();
    for action in actions {
        groups.entry(action.field_uid()).or_default().push(action);
    }

    let mut survivors = Vec::new();
    for (uid, group) in groups {
        if inserted.contains(&uid) {
            survivors.extend(fold_inserted(group, &layout)?);
        } else if let Some(original) = table.field_by_uid(uid) {
            survivors.extend(reduce_existing(group, original, &layout));
        }
    }
    survivors.sort_by_key(Action::order);
    Ok(survivors)
}

/// Layout changes of a batch, as `(order, field)` pairs.
struct Layout {
    changes: Vec<(usize, FieldUid)>,
}

impl Layout {
    fn new(actions: &[Action]) -> Self {
        let changes = actions
            .iter()
            .filter(|a| changes_layout(a))
            .map(|a| (a.order(), a.field_uid()))
            .collect();
        Self { changes }
    }

    /// Whether a field other than `uid` changes layout strictly between the
    /// orders `from` and `to`.
    fn interleaved(&self, uid: FieldUid, from: usize, to: usize) -> bool {
        self.changes
            .iter()
            .any(|&(order, other)| other != uid && from < order && order < to)
    }
}

const fn changes_layout(action: &Action) -> bool {
    !matches!(action.kind(), ActionKind::ChangeProperty { .. })
}

const fn is_move(action: &Action) -> bool {
    matches!(action.kind(), ActionKind::MoveFieldPosition { .. })
}

/// Nulls the moves of a single field's group that a later move or removal
/// of the same field overrides.
fn drop_superseded_moves(group: &mut [Action], layout: &Layout) {
    let mut next_change: Option<usize> = None;
    for action in group.iter_mut().rev() {
        if action.is_null() || !changes_layout(action) {
            continue;
        }
        let (uid, order) = (action.field_uid(), action.order());
        let superseded = is_move(action)
            && next_change.is_some_and(|next| !layout.interleaved(uid, order, next));
        if superseded {
            action.set_null();
        } else {
            next_change = Some(order);
        }
    }
}

/// Reduces the actions on one existing field.
fn reduce_existing(
    mut group: Vec<Action>,
    original: &FieldSchema,
    layout: &Layout,
) -> Vec<Action> {
    let removal = group
        .iter()
        .rposition(|a| matches!(a.kind(), ActionKind::RemoveField { .. }));
    if let Some(keep) = removal {
        for (index, action) in group.iter_mut().enumerate() {
            if index > keep || (index < keep && !is_move(action)) {
                action.set_null();
            }
        }
        drop_superseded_moves(&mut group, layout);
        let survivors: Vec<Action> = group.into_iter().filter(|a| !a.is_null()).collect();
        if survivors.len() > 1 {
            debug!(
                field = %original.name,
                moves = survivors.len() - 1,
                "Field is removed; keeping moves pinned by other fields"
            );
        }
        return survivors;
    }

    let mut seen_properties = HashSet::new();
    for action in group.iter_mut().rev() {
        let superseded = match action.kind() {
            ActionKind::ChangeProperty {
                property,
                new_value,
                ..
            } => FieldProperty::from_name(property).is_some_and(|known| {
                !seen_properties.insert(known) || original.property(known) == *new_value
            }),
            ActionKind::MoveFieldPosition { .. }
            | ActionKind::RemoveField { .. }
            | ActionKind::InsertField { .. } => false,
        };
        if superseded {
            action.set_null();
        }
    }
    drop_superseded_moves(&mut group, layout);
    group.into_iter().filter(|a| !a.is_null()).collect()
}

/// Folds the actions on a field inserted by the batch into the insertion.
///
/// A move or removal is folded only while no other field changes layout
/// since the insertion. Later ones are kept as they are.
fn fold_inserted(mut group: Vec<Action>, layout: &Layout) -> Result<Vec<Action>> {
    drop_superseded_moves(&mut group, layout);
    let mut actions = group.into_iter().filter(|a| !a.is_null());
    let Some(mut insertion) = actions.next() else {
        return Ok(Vec::new());
    };
    let uid = insertion.field_uid();
    let inserted_at = insertion.order();

    let mut kept = Vec::new();
    let mut removed = false;
    for action in actions {
        if removed {
            continue;
        }
        let ActionKind::InsertField {
            position,
            new_field,
        } = insertion.kind_mut()
        else {
            break;
        };
        if let ActionKind::ChangeProperty {
            property,
            new_value,
            ..
        } = action.kind()
        {
            if let Some(known) = FieldProperty::from_name(property) {
                new_field.set_property(known, new_value)?;
            }
            continue;
        }
        let adjacent = kept.is_empty() && !layout.interleaved(uid, inserted_at, action.order());
        let is_removal = matches!(action.kind(), ActionKind::RemoveField { .. });
        if adjacent && is_removal {
            debug!(
                uid = %uid,
                "Inserted field is removed again; dropping all its actions"
            );
            return Ok(Vec::new());
        }
        if adjacent {
            if let ActionKind::MoveFieldPosition {
                position: target, ..
            } = action.kind()
            {
                *position = *target;
            }
            continue;
        }
        removed = is_removal;
        kept.push(action);
    }
    let mut survivors = vec![insertion];
    survivors.extend(kept);
    Ok(survivors)
}
