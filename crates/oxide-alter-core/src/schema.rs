//! Table and field definitions.
//!
//! These types describe a table as the schema catalog stores it. Every field
//! carries a [`FieldUid`] issued by the catalog when the table is loaded;
//! actions correlate fields by that identity, never by name.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AlterError, Result};
use crate::property::FieldProperty;
use crate::value::{ConversionError, Value};

/// Stable identity of a field, independent of its current name.
///
/// `0` means "not assigned yet".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct FieldUid(pub u64);

impl FieldUid {
    /// The unassigned identity.
    pub const UNASSIGNED: Self = Self(0);

    /// Returns true if a catalog has issued this identity.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for FieldUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues monotonically increasing field identities.
#[derive(Debug, Clone)]
pub struct UidGenerator {
    next: u64,
}

impl Default for UidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl UidGenerator {
    /// Creates a generator whose first identity is `1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Issues the next identity.
    pub const fn next_uid(&mut self) -> FieldUid {
        let uid = FieldUid(self.next);
        self.next += 1;
        uid
    }

    /// Assigns identities to every field of `table` that has none yet.
    pub fn assign(&mut self, table: &mut TableSchema) {
        for field in &mut table.fields {
            if !field.uid.is_assigned() {
                field.uid = self.next_uid();
            }
        }
    }
}

/// Field data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldType {
    /// Boolean.
    Boolean,
    /// 8-bit integer.
    Byte,
    /// 16-bit integer.
    ShortInteger,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Single precision floating point.
    Float,
    /// Double precision floating point.
    Double,
    /// Short text, bounded by `max_length` when set.
    #[default]
    Text,
    /// Long text.
    LongText,
    /// Date only.
    Date,
    /// Date and time.
    DateTime,
    /// Time only.
    Time,
    /// Binary large object.
    Blob,
}

impl FieldType {
    /// Every field type, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Boolean,
        Self::Byte,
        Self::ShortInteger,
        Self::Integer,
        Self::BigInteger,
        Self::Float,
        Self::Double,
        Self::Text,
        Self::LongText,
        Self::Date,
        Self::DateTime,
        Self::Time,
        Self::Blob,
    ];

    /// Returns the canonical type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::ShortInteger => "ShortInteger",
            Self::Integer => "Integer",
            Self::BigInteger => "BigInteger",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Text => "Text",
            Self::LongText => "LongText",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Time => "Time",
            Self::Blob => "Blob",
        }
    }

    /// Parses a type name, ignoring case and underscores (`long_text` works).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(&wanted))
    }

    /// Returns true for the integer family.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::ShortInteger | Self::Integer | Self::BigInteger
        )
    }

    /// Returns true for integer and floating point types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::Double)
    }

    /// Returns true for text types.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text | Self::LongText)
    }

    /// Signed range of an integer type.
    #[must_use]
    pub const fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::ShortInteger => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Integer => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::BigInteger => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Range of an integer type declared unsigned.
    #[must_use]
    pub const fn unsigned_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Byte => Some((0, u8::MAX as i64)),
            Self::ShortInteger => Some((0, u16::MAX as i64)),
            Self::Integer => Some((0, u32::MAX as i64)),
            Self::BigInteger => Some((0, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<FieldType> for Value {
    fn from(ty: FieldType) -> Self {
        Self::Text(ty.name().to_string())
    }
}

/// Lookup-field ("combo box") properties, kept in the extended catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupField {
    /// Name of the table or query providing the rows.
    pub row_source: String,
    /// Kind of row source (`table`, `query`, `valuelist`).
    pub row_source_type: String,
    /// Literal values when the row source is a value list.
    pub row_source_values: String,
    /// Column of the row source stored in this field.
    pub bound_column: i32,
    /// Column of the row source displayed to the user.
    pub visible_column: i32,
    /// Semicolon separated column widths.
    pub column_widths: String,
    /// Whether column headers are shown.
    pub show_column_headers: bool,
    /// Number of rows shown in the drop-down.
    pub list_rows: u32,
    /// Whether only listed values are accepted.
    pub limit_to_list: bool,
    /// Widget used to display the lookup.
    pub display_widget: String,
}

/// Properties stored in the extended catalog rather than the main one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedProperties {
    /// Decimal places shown for numeric fields; `-1` means automatic.
    pub visible_decimal_places: i32,
    /// Default display width.
    pub default_width: u32,
    /// Lookup-field settings.
    pub lookup: LookupField,
}

impl Default for ExtendedProperties {
    fn default() -> Self {
        Self {
            visible_decimal_places: -1,
            default_width: 0,
            lookup: LookupField::default(),
        }
    }
}

/// Definition of a single field.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSchema {
    /// Catalog-issued identity. Not persisted.
    #[serde(skip)]
    pub uid: FieldUid,
    /// Field name.
    pub name: String,
    /// Data type.
    pub field_type: FieldType,
    /// Human readable caption.
    pub caption: String,
    /// Description.
    pub description: String,
    /// Maximum text length; `0` means unlimited.
    pub max_length: u32,
    /// Numeric precision; `0` means the backend default.
    pub precision: u32,
    /// Default value; NULL means none.
    pub default_value: Value,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Has a non-unique index.
    pub indexed: bool,
    /// Has a unique constraint.
    pub unique: bool,
    /// Rejects NULL.
    pub not_null: bool,
    /// Accepts empty strings.
    pub allow_empty: bool,
    /// Rejects negative numbers.
    pub unsigned: bool,
    /// Values are generated by the backend.
    pub auto_increment: bool,
    /// Extended-catalog properties.
    pub extended: ExtendedProperties,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::new("", FieldType::Text)
    }
}

impl FieldSchema {
    /// Creates a nullable field without an identity.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            uid: FieldUid::UNASSIGNED,
            name: name.into(),
            field_type,
            caption: String::new(),
            description: String::new(),
            max_length: 0,
            precision: 0,
            default_value: Value::Null,
            primary_key: false,
            indexed: false,
            unique: false,
            not_null: false,
            allow_empty: true,
            unsigned: false,
            auto_increment: false,
            extended: ExtendedProperties::default(),
        }
    }

    /// Sets the identity.
    #[must_use]
    pub const fn with_uid(mut self, uid: FieldUid) -> Self {
        self.uid = uid;
        self
    }

    /// Marks the field as (part of) the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true; // Primary keys are always NOT NULL
        self
    }

    /// Sets the field to auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the field as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the field as unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a non-unique index on the field.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Sets the field as unsigned.
    #[must_use]
    pub const fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the maximum text length.
    #[must_use]
    pub const fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    /// Sets the caption.
    #[must_use]
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Returns the current value of a property.
    #[must_use]
    pub fn property(&self, property: FieldProperty) -> Value {
        let lookup = &self.extended.lookup;
        match property {
            FieldProperty::Name => Value::Text(self.name.clone()),
            FieldProperty::Type => Value::from(self.field_type),
            FieldProperty::Caption => Value::Text(self.caption.clone()),
            FieldProperty::Description => Value::Text(self.description.clone()),
            FieldProperty::MaxLength => Value::Integer(i64::from(self.max_length)),
            FieldProperty::Precision => Value::Integer(i64::from(self.precision)),
            FieldProperty::DefaultValue => self.default_value.clone(),
            FieldProperty::PrimaryKey => Value::Bool(self.primary_key),
            FieldProperty::Indexed => Value::Bool(self.indexed),
            FieldProperty::Unique => Value::Bool(self.unique),
            FieldProperty::NotNull => Value::Bool(self.not_null),
            FieldProperty::AllowEmpty => Value::Bool(self.allow_empty),
            FieldProperty::Unsigned => Value::Bool(self.unsigned),
            FieldProperty::AutoIncrement => Value::Bool(self.auto_increment),
            FieldProperty::VisibleDecimalPlaces => {
                Value::Integer(i64::from(self.extended.visible_decimal_places))
            }
            FieldProperty::DefaultWidth => Value::Integer(i64::from(self.extended.default_width)),
            FieldProperty::RowSource => Value::Text(lookup.row_source.clone()),
            FieldProperty::RowSourceType => Value::Text(lookup.row_source_type.clone()),
            FieldProperty::RowSourceValues => Value::Text(lookup.row_source_values.clone()),
            FieldProperty::BoundColumn => Value::Integer(i64::from(lookup.bound_column)),
            FieldProperty::VisibleColumn => Value::Integer(i64::from(lookup.visible_column)),
            FieldProperty::ColumnWidths => Value::Text(lookup.column_widths.clone()),
            FieldProperty::ShowColumnHeaders => Value::Bool(lookup.show_column_headers),
            FieldProperty::ListRows => Value::Integer(i64::from(lookup.list_rows)),
            FieldProperty::LimitToList => Value::Bool(lookup.limit_to_list),
            FieldProperty::DisplayWidget => Value::Text(lookup.display_widget.clone()),
        }
    }

    /// Sets a property from a dynamically typed value.
    ///
    /// The value is coerced to the property's kind first.
    ///
    /// # Errors
    ///
    /// Fails when the value does not fit the property.
    pub fn set_property(&mut self, property: FieldProperty, value: &Value) -> Result<()> {
        let value = property.coerce(value)?;
        let lookup = &mut self.extended.lookup;
        match property {
            FieldProperty::Name => self.name = text(&value),
            FieldProperty::Type => {
                self.field_type = FieldType::from_name(&text(&value)).ok_or_else(|| {
                    invalid(property, format!("unknown field type {value}"))
                })?;
            }
            FieldProperty::Caption => self.caption = text(&value),
            FieldProperty::Description => self.description = text(&value),
            FieldProperty::MaxLength => self.max_length = integer(property, &value)?,
            FieldProperty::Precision => self.precision = integer(property, &value)?,
            FieldProperty::DefaultValue => self.default_value = value,
            FieldProperty::PrimaryKey => {
                self.primary_key = flag(&value);
                if self.primary_key {
                    self.not_null = true;
                }
            }
            FieldProperty::Indexed => self.indexed = flag(&value),
            FieldProperty::Unique => self.unique = flag(&value),
            FieldProperty::NotNull => self.not_null = flag(&value),
            FieldProperty::AllowEmpty => self.allow_empty = flag(&value),
            FieldProperty::Unsigned => self.unsigned = flag(&value),
            FieldProperty::AutoIncrement => self.auto_increment = flag(&value),
            FieldProperty::VisibleDecimalPlaces => {
                self.extended.visible_decimal_places = integer(property, &value)?;
            }
            FieldProperty::DefaultWidth => {
                self.extended.default_width = integer(property, &value)?;
            }
            FieldProperty::RowSource => lookup.row_source = text(&value),
            FieldProperty::RowSourceType => lookup.row_source_type = text(&value),
            FieldProperty::RowSourceValues => lookup.row_source_values = text(&value),
            FieldProperty::BoundColumn => lookup.bound_column = integer(property, &value)?,
            FieldProperty::VisibleColumn => lookup.visible_column = integer(property, &value)?,
            FieldProperty::ColumnWidths => lookup.column_widths = text(&value),
            FieldProperty::ShowColumnHeaders => lookup.show_column_headers = flag(&value),
            FieldProperty::ListRows => lookup.list_rows = integer(property, &value)?,
            FieldProperty::LimitToList => lookup.limit_to_list = flag(&value),
            FieldProperty::DisplayWidget => lookup.display_widget = text(&value),
        }
        Ok(())
    }

    /// Converts a value into this field's representation, honouring the
    /// unsigned flag and truncating text to `max_length`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when the value cannot be represented.
    pub fn convert_value(&self, value: &Value) -> std::result::Result<Value, ConversionError> {
        let mut converted = value.convert_to(self.field_type)?;
        if self.unsigned {
            let negative = match &converted {
                Value::Integer(i) => self
                    .field_type
                    .unsigned_range()
                    .is_some_and(|(min, max)| !(min..=max).contains(i)),
                Value::Float(f) => *f < 0.0,
                _ => false,
            };
            if negative {
                return Err(ConversionError::OutOfRange {
                    value: value.to_string(),
                    target: self.field_type,
                });
            }
        }
        if self.max_length > 0 && self.field_type.is_text() {
            if let Value::Text(s) = &mut converted {
                let limit = self.max_length as usize;
                if s.chars().count() > limit {
                    *s = s.chars().take(limit).collect();
                }
            }
        }
        Ok(converted)
    }

    /// Value used when a row cannot provide one: the default value when it
    /// converts, otherwise the type's empty value.
    #[must_use]
    pub fn fallback_value(&self) -> Value {
        if self.default_value.is_null() {
            return Value::empty_for(self.field_type);
        }
        self.convert_value(&self.default_value)
            .unwrap_or_else(|_| Value::empty_for(self.field_type))
    }

    /// Value a newly added column holds in pre-existing rows.
    #[must_use]
    pub fn initial_value(&self) -> Value {
        if self.auto_increment {
            Value::Null
        } else if !self.default_value.is_null() || self.not_null {
            self.fallback_value()
        } else {
            Value::Null
        }
    }
}

impl fmt::Display for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} uid={} {}", self.name, self.uid, self.field_type)?;
        if self.max_length > 0 {
            write!(f, "({})", self.max_length)?;
        }
        let flags = [
            (self.primary_key, "PK"),
            (self.auto_increment, "AUTO"),
            (self.not_null, "NOT NULL"),
            (self.unique, "UNIQUE"),
            (self.indexed, "INDEXED"),
            (self.unsigned, "UNSIGNED"),
        ];
        for (set, label) in flags {
            if set {
                write!(f, " {label}")?;
            }
        }
        if !self.default_value.is_null() {
            write!(f, " DEFAULT {}", self.default_value)?;
        }
        if !self.caption.is_empty() {
            write!(f, " caption={:?}", self.caption)?;
        }
        Ok(())
    }
}

fn invalid(property: FieldProperty, message: impl Into<String>) -> AlterError {
    AlterError::InvalidPropertyValue {
        property: property.name().to_string(),
        message: message.into(),
    }
}

fn text(value: &Value) -> String {
    value.as_text().unwrap_or_default().to_string()
}

fn flag(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

fn integer<T: TryFrom<i64>>(property: FieldProperty, value: &Value) -> Result<T> {
    let raw = value
        .as_integer()
        .ok_or_else(|| invalid(property, format!("expected an integer, got {value}")))?;
    T::try_from(raw).map_err(|_| invalid(property, format!("{raw} is out of range")))
}

/// Complete definition of a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Human readable caption.
    pub caption: String,
    /// Fields in physical order.
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Creates a table without fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            caption: String::new(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Gets a field by identity.
    #[must_use]
    pub fn field_by_uid(&self, uid: FieldUid) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.uid == uid)
    }

    /// Gets a mutable field by identity.
    #[must_use]
    pub fn field_by_uid_mut(&mut self, uid: FieldUid) -> Option<&mut FieldSchema> {
        self.fields.iter_mut().find(|f| f.uid == uid)
    }

    /// Position of the field with the given identity.
    #[must_use]
    pub fn position_of(&self, uid: FieldUid) -> Option<usize> {
        self.fields.iter().position(|f| f.uid == uid)
    }

    /// Field names in physical order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields forming the primary key.
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    /// Checks that the definition can be created physically.
    ///
    /// # Errors
    ///
    /// Returns [`AlterError::InvalidSchema`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AlterError::InvalidSchema("table name is empty".into()));
        }
        if self.fields.is_empty() {
            return Err(AlterError::InvalidSchema(format!(
                "table '{}' has no fields",
                self.name
            )));
        }

        let mut names = HashSet::new();
        let mut uids = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(AlterError::InvalidSchema(format!(
                    "field with uid {} in table '{}' has an empty name",
                    field.uid, self.name
                )));
            }
            if !names.insert(field.name.to_ascii_lowercase()) {
                return Err(AlterError::InvalidSchema(format!(
                    "duplicate field name '{}' in table '{}'",
                    field.name, self.name
                )));
            }
            if !field.uid.is_assigned() || !uids.insert(field.uid) {
                return Err(AlterError::InvalidSchema(format!(
                    "field '{}' in table '{}' has no unique uid",
                    field.name, self.name
                )));
            }
            if field.auto_increment && !field.field_type.is_integer() {
                return Err(AlterError::InvalidSchema(format!(
                    "auto-increment field '{}' must have an integer type, not {}",
                    field.name, field.field_type
                )));
            }
            if !field.default_value.is_null() {
                field.convert_value(&field.default_value).map_err(|err| {
                    AlterError::InvalidSchema(format!(
                        "default value of field '{}': {}",
                        field.name, err
                    ))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persons() -> TableSchema {
        let mut table = TableSchema::new("persons")
            .field(
                FieldSchema::new("id", FieldType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .field(FieldSchema::new("name", FieldType::Text).max_length(10))
            .field(FieldSchema::new("age", FieldType::Integer).unsigned());
        UidGenerator::new().assign(&mut table);
        table
    }

    #[test]
    fn test_field_schema_builder() {
        let field = FieldSchema::new("id", FieldType::BigInteger)
            .primary_key()
            .auto_increment();

        assert_eq!(field.name, "id");
        assert!(field.primary_key);
        assert!(field.auto_increment);
        assert!(field.not_null); // Primary keys are NOT NULL
        assert!(!field.uid.is_assigned());
    }

    #[test]
    fn test_uid_generator_is_monotonic() {
        let table = persons();
        let uids: Vec<u64> = table.fields.iter().map(|f| f.uid.0).collect();
        assert_eq!(uids, vec![1, 2, 3]);
        assert_eq!(table.position_of(FieldUid(2)), Some(1));
        assert_eq!(table.field_by_uid(FieldUid(3)).unwrap().name, "age");
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::from_name("LongText"), Some(FieldType::LongText));
        assert_eq!(FieldType::from_name("long_text"), Some(FieldType::LongText));
        assert_eq!(FieldType::from_name("INTEGER"), Some(FieldType::Integer));
        assert_eq!(FieldType::from_name("varchar"), None);
        for ty in FieldType::ALL {
            assert_eq!(FieldType::from_name(ty.name()), Some(ty));
        }
    }

    #[test]
    fn test_property_roundtrip() {
        let mut field = FieldSchema::new("name", FieldType::Text);
        field
            .set_property(FieldProperty::Caption, &Value::from("Full name"))
            .unwrap();
        field
            .set_property(FieldProperty::Type, &Value::from("long_text"))
            .unwrap();
        field
            .set_property(FieldProperty::ListRows, &Value::Integer(12))
            .unwrap();

        assert_eq!(field.property(FieldProperty::Caption), Value::from("Full name"));
        assert_eq!(field.property(FieldProperty::Type), Value::from("LongText"));
        assert_eq!(field.extended.lookup.list_rows, 12);
    }

    #[test]
    fn test_set_property_rejects_bad_values() {
        let mut field = FieldSchema::new("name", FieldType::Text);
        assert!(matches!(
            field.set_property(FieldProperty::MaxLength, &Value::Integer(-1)),
            Err(AlterError::InvalidPropertyValue { .. })
        ));
        assert!(matches!(
            field.set_property(FieldProperty::Type, &Value::from("Varchar")),
            Err(AlterError::InvalidPropertyValue { .. })
        ));
        assert!(field
            .set_property(FieldProperty::NotNull, &Value::from("yes"))
            .is_err());
    }

    #[test]
    fn test_convert_value_honours_field_flags() {
        let table = persons();
        let name = table.get_field("name").unwrap();
        assert_eq!(
            name.convert_value(&Value::from("Bartholomew Smith")).unwrap(),
            Value::from("Bartholome")
        );

        let age = table.get_field("age").unwrap();
        assert!(age.convert_value(&Value::Integer(-3)).is_err());
        assert_eq!(age.convert_value(&Value::from("41")).unwrap(), Value::Integer(41));
    }

    #[test]
    fn test_fallback_value() {
        let plain = FieldSchema::new("n", FieldType::Integer);
        assert_eq!(plain.fallback_value(), Value::Integer(0));

        let with_default = FieldSchema::new("n", FieldType::Integer).default("7");
        assert_eq!(with_default.fallback_value(), Value::Integer(7));
        assert_eq!(with_default.initial_value(), Value::Integer(7));

        assert_eq!(plain.initial_value(), Value::Null);
        assert_eq!(plain.not_null().initial_value(), Value::Integer(0));
    }

    #[test]
    fn test_validate() {
        let table = persons();
        table.validate().unwrap();

        let mut duplicate = table.clone();
        duplicate.fields[2].name = "NAME".to_string();
        assert!(matches!(
            duplicate.validate(),
            Err(AlterError::InvalidSchema(_))
        ));

        let empty = TableSchema::new("empty");
        assert!(empty.validate().is_err());

        let mut bad_auto = table;
        bad_auto.fields[1].auto_increment = true;
        assert!(bad_auto.validate().is_err());
    }

    #[test]
    fn test_display() {
        let table = persons();
        assert_eq!(
            table.fields[0].to_string(),
            "\"id\" uid=1 Integer PK AUTO NOT NULL"
        );
        assert_eq!(table.fields[1].to_string(), "\"name\" uid=2 Text(10)");
    }
}
