//! Field properties and the requirement classifier.
//!
//! Every property an action can change maps to a fixed set of
//! [`Requirements`]. The mapping is a pure function of the property name.

use std::fmt;

use crate::error::{AlterError, Result};
use crate::requirements::Requirements;
use crate::schema::FieldType;
use crate::value::Value;

const PHYSICAL: Requirements = Requirements::PHYSICAL_ALTERATION;
const PHYSICAL_DATA: Requirements =
    Requirements::PHYSICAL_ALTERATION.union(Requirements::DATA_CONVERSION);
const MAIN: Requirements = Requirements::MAIN_CATALOG_UPDATE;
const EXTENDED: Requirements = Requirements::EXTENDED_CATALOG_UPDATE;

/// A changeable field property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldProperty {
    Name,
    Type,
    Caption,
    Description,
    MaxLength,
    Precision,
    DefaultValue,
    PrimaryKey,
    Indexed,
    Unique,
    NotNull,
    AllowEmpty,
    Unsigned,
    AutoIncrement,
    VisibleDecimalPlaces,
    DefaultWidth,
    RowSource,
    RowSourceType,
    RowSourceValues,
    BoundColumn,
    VisibleColumn,
    ColumnWidths,
    ShowColumnHeaders,
    ListRows,
    LimitToList,
    DisplayWidget,
}

/// Shape of the values a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Integer,
    Boolean,
    FieldType,
    Any,
}

impl FieldProperty {
    /// Every property, in declaration order.
    pub const ALL: [Self; 26] = [
        Self::Name,
        Self::Type,
        Self::Caption,
        Self::Description,
        Self::MaxLength,
        Self::Precision,
        Self::DefaultValue,
        Self::PrimaryKey,
        Self::Indexed,
        Self::Unique,
        Self::NotNull,
        Self::AllowEmpty,
        Self::Unsigned,
        Self::AutoIncrement,
        Self::VisibleDecimalPlaces,
        Self::DefaultWidth,
        Self::RowSource,
        Self::RowSourceType,
        Self::RowSourceValues,
        Self::BoundColumn,
        Self::VisibleColumn,
        Self::ColumnWidths,
        Self::ShowColumnHeaders,
        Self::ListRows,
        Self::LimitToList,
        Self::DisplayWidget,
    ];

    /// Name used in actions and scripts.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Type => "type",
            Self::Caption => "caption",
            Self::Description => "description",
            Self::MaxLength => "maxLength",
            Self::Precision => "precision",
            Self::DefaultValue => "defaultValue",
            Self::PrimaryKey => "primaryKey",
            Self::Indexed => "indexed",
            Self::Unique => "unique",
            Self::NotNull => "notNull",
            Self::AllowEmpty => "allowEmpty",
            Self::Unsigned => "unsigned",
            Self::AutoIncrement => "autoIncrement",
            Self::VisibleDecimalPlaces => "visibleDecimalPlaces",
            Self::DefaultWidth => "defaultWidth",
            Self::RowSource => "rowSource",
            Self::RowSourceType => "rowSourceType",
            Self::RowSourceValues => "rowSourceValues",
            Self::BoundColumn => "boundColumn",
            Self::VisibleColumn => "visibleColumn",
            Self::ColumnWidths => "columnWidths",
            Self::ShowColumnHeaders => "showColumnHeaders",
            Self::ListRows => "listRows",
            Self::LimitToList => "limitToList",
            Self::DisplayWidget => "displayWidget",
        }
    }

    /// Looks a property up by its exact name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Requirements of changing this property.
    #[must_use]
    pub const fn requirements(self) -> Requirements {
        match self {
            Self::Name | Self::DefaultValue | Self::Indexed => PHYSICAL,
            Self::Type
            | Self::MaxLength
            | Self::Precision
            | Self::Unsigned
            | Self::PrimaryKey
            | Self::Unique
            | Self::NotNull
            | Self::AutoIncrement => PHYSICAL_DATA,
            Self::Caption | Self::Description | Self::AllowEmpty => MAIN,
            Self::VisibleDecimalPlaces
            | Self::DefaultWidth
            | Self::RowSource
            | Self::RowSourceType
            | Self::RowSourceValues
            | Self::BoundColumn
            | Self::VisibleColumn
            | Self::ColumnWidths
            | Self::ShowColumnHeaders
            | Self::ListRows
            | Self::LimitToList
            | Self::DisplayWidget => EXTENDED,
        }
    }

    /// Shape of the values this property accepts.
    #[must_use]
    pub const fn kind(self) -> PropertyKind {
        match self {
            Self::Name
            | Self::Caption
            | Self::Description
            | Self::RowSource
            | Self::RowSourceType
            | Self::RowSourceValues
            | Self::ColumnWidths
            | Self::DisplayWidget => PropertyKind::Text,
            Self::MaxLength
            | Self::Precision
            | Self::VisibleDecimalPlaces
            | Self::DefaultWidth
            | Self::BoundColumn
            | Self::VisibleColumn
            | Self::ListRows => PropertyKind::Integer,
            Self::PrimaryKey
            | Self::Indexed
            | Self::Unique
            | Self::NotNull
            | Self::AllowEmpty
            | Self::Unsigned
            | Self::AutoIncrement
            | Self::ShowColumnHeaders
            | Self::LimitToList => PropertyKind::Boolean,
            Self::Type => PropertyKind::FieldType,
            Self::DefaultValue => PropertyKind::Any,
        }
    }

    /// Returns true for the lookup-field properties.
    #[must_use]
    pub const fn is_lookup(self) -> bool {
        matches!(
            self,
            Self::RowSource
                | Self::RowSourceType
                | Self::RowSourceValues
                | Self::BoundColumn
                | Self::VisibleColumn
                | Self::ColumnWidths
                | Self::ShowColumnHeaders
                | Self::ListRows
                | Self::LimitToList
                | Self::DisplayWidget
        )
    }

    /// Coerces a value into the canonical shape for this property.
    ///
    /// NULL is accepted for text properties (as the empty string) and for the
    /// default value. Field types are normalized to their canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::InvalidPropertyValue`] when the value has the
    /// wrong shape.
    #[allow(clippy::cast_possible_truncation)]
    pub fn coerce(self, value: &Value) -> Result<Value> {
        let coerced = match (self.kind(), value) {
            (PropertyKind::Any, _)
            | (PropertyKind::Text, Value::Text(_))
            | (PropertyKind::Integer, Value::Integer(_))
            | (PropertyKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (PropertyKind::Text, Value::Null) => Some(Value::Text(String::new())),
            (PropertyKind::Integer, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                Some(Value::Integer(*f as i64))
            }
            (PropertyKind::Boolean, Value::Integer(0)) => Some(Value::Bool(false)),
            (PropertyKind::Boolean, Value::Integer(1)) => Some(Value::Bool(true)),
            (PropertyKind::FieldType, Value::Text(name)) => {
                FieldType::from_name(name).map(Value::from)
            }
            _ => None,
        };
        coerced.ok_or_else(|| AlterError::InvalidPropertyValue {
            property: self.name().to_string(),
            message: format!("{value} is not a valid {:?} value", self.kind()),
        })
    }
}

impl fmt::Display for FieldProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a property name.
///
/// Unknown names have no requirements; the action layer reports them.
#[must_use]
pub fn classify(property_name: &str) -> Requirements {
    FieldProperty::from_name(property_name)
        .map_or(Requirements::empty(), FieldProperty::requirements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        assert_eq!(classify("name"), Requirements::PHYSICAL_ALTERATION);
        assert_eq!(
            classify("type"),
            Requirements::PHYSICAL_ALTERATION | Requirements::DATA_CONVERSION
        );
        assert_eq!(classify("caption"), Requirements::MAIN_CATALOG_UPDATE);
        assert_eq!(classify("description"), Requirements::MAIN_CATALOG_UPDATE);
        assert_eq!(
            classify("visibleDecimalPlaces"),
            Requirements::EXTENDED_CATALOG_UPDATE
        );
        assert_eq!(classify("defaultValue"), Requirements::PHYSICAL_ALTERATION);
        assert_eq!(classify("colour"), Requirements::empty());
    }

    #[test]
    fn test_every_property_is_classified() {
        for property in FieldProperty::ALL {
            assert!(!property.requirements().is_empty(), "{property}");
            assert_eq!(FieldProperty::from_name(property.name()), Some(property));
        }
    }

    #[test]
    fn test_lookup_properties_are_extended() {
        for property in FieldProperty::ALL.into_iter().filter(|p| p.is_lookup()) {
            assert_eq!(
                property.requirements(),
                Requirements::EXTENDED_CATALOG_UPDATE,
                "{property}"
            );
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert_eq!(FieldProperty::from_name("Caption"), None);
        assert_eq!(FieldProperty::from_name("maxLength"), Some(FieldProperty::MaxLength));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(
            FieldProperty::Type.coerce(&Value::from("long_text")).unwrap(),
            Value::from("LongText")
        );
        assert_eq!(
            FieldProperty::NotNull.coerce(&Value::Integer(1)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            FieldProperty::MaxLength.coerce(&Value::Float(20.0)).unwrap(),
            Value::Integer(20)
        );
        assert_eq!(
            FieldProperty::Caption.coerce(&Value::Null).unwrap(),
            Value::from("")
        );
        assert!(FieldProperty::Caption.coerce(&Value::Integer(3)).is_err());
        assert!(FieldProperty::Type.coerce(&Value::from("Varchar")).is_err());
        assert_eq!(
            FieldProperty::DefaultValue.coerce(&Value::Integer(3)).unwrap(),
            Value::Integer(3)
        );
    }
}
