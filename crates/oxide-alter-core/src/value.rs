//! Dynamically typed field values and conversion between field types.
//!
//! Conversion is the facility both catalog adapters use while copying rows
//! into a recreated table. It may be lossy (text is truncated, floats are
//! rounded into integer columns), but it never silently produces a value of
//! the wrong type: anything that cannot be represented is reported as a
//! [`ConversionError`].

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schema::FieldType;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

const DATE_TIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_INPUT_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// A single field value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any integer type.
    Integer(i64),
    /// Any floating point type.
    Float(f64),
    /// Text of any length.
    Text(String),
    /// Binary data.
    Blob(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without time zone.
    DateTime(NaiveDateTime),
    /// Time of day.
    Time(NaiveTime),
}

/// Error raised when a value cannot be represented in a target type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// The value has no representation in the target type.
    #[error("cannot convert {value} to {target}")]
    Incompatible {
        /// Rendered source value.
        value: String,
        /// Target type.
        target: FieldType,
    },

    /// The value is representable in kind but not in magnitude.
    #[error("{value} is out of range for {target}")]
    OutOfRange {
        /// Rendered source value.
        value: String,
        /// Target type.
        target: FieldType,
    },
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the "empty" value of a type: what a NOT NULL column holds when
    /// nothing better is known.
    #[must_use]
    pub fn empty_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Bool(false),
            FieldType::Byte
            | FieldType::ShortInteger
            | FieldType::Integer
            | FieldType::BigInteger => Self::Integer(0),
            FieldType::Float | FieldType::Double => Self::Float(0.0),
            FieldType::Text | FieldType::LongText => Self::Text(String::new()),
            FieldType::Blob => Self::Blob(Vec::new()),
            FieldType::Date => Self::Date(NaiveDate::default()),
            FieldType::DateTime => Self::DateTime(NaiveDateTime::default()),
            FieldType::Time => Self::Time(NaiveTime::default()),
        }
    }

    /// Converts this value into the representation used by `target`.
    ///
    /// NULL converts to NULL for every type.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when the value cannot be represented in
    /// `target`.
    pub fn convert_to(&self, target: FieldType) -> Result<Self, ConversionError> {
        if self.is_null() {
            return Ok(Self::Null);
        }
        match target {
            FieldType::Boolean => self.to_bool(target).map(Self::Bool),
            FieldType::Byte
            | FieldType::ShortInteger
            | FieldType::Integer
            | FieldType::BigInteger => self.to_integer(target).map(Self::Integer),
            FieldType::Float | FieldType::Double => self.to_float(target).map(Self::Float),
            FieldType::Text | FieldType::LongText => self.to_text(target).map(Self::Text),
            FieldType::Blob => match self {
                Self::Blob(bytes) => Ok(Self::Blob(bytes.clone())),
                Self::Text(s) => Ok(Self::Blob(s.as_bytes().to_vec())),
                _ => Err(self.incompatible(target)),
            },
            FieldType::Date => match self {
                Self::Date(d) => Ok(Self::Date(*d)),
                Self::DateTime(dt) => Ok(Self::Date(dt.date())),
                Self::Text(s) => parse_date(s.trim())
                    .map(Self::Date)
                    .ok_or_else(|| self.incompatible(target)),
                _ => Err(self.incompatible(target)),
            },
            FieldType::DateTime => match self {
                Self::DateTime(dt) => Ok(Self::DateTime(*dt)),
                Self::Date(d) => Ok(Self::DateTime(d.and_time(NaiveTime::default()))),
                Self::Text(s) => parse_date_time(s.trim())
                    .map(Self::DateTime)
                    .ok_or_else(|| self.incompatible(target)),
                _ => Err(self.incompatible(target)),
            },
            FieldType::Time => match self {
                Self::Time(t) => Ok(Self::Time(*t)),
                Self::DateTime(dt) => Ok(Self::Time(dt.time())),
                Self::Text(s) => parse_time(s.trim())
                    .map(Self::Time)
                    .ok_or_else(|| self.incompatible(target)),
                _ => Err(self.incompatible(target)),
            },
        }
    }

    fn to_bool(&self, target: FieldType) -> Result<bool, ConversionError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Integer(i) => Ok(*i != 0),
            Self::Float(f) => Ok(*f != 0.0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
                "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
                _ => Err(self.incompatible(target)),
            },
            _ => Err(self.incompatible(target)),
        }
    }

    fn to_integer(&self, target: FieldType) -> Result<i64, ConversionError> {
        let value = match self {
            Self::Bool(b) => i64::from(*b),
            Self::Integer(i) => *i,
            Self::Float(f) => self.float_to_integer(*f, target)?,
            Self::Text(s) => {
                let trimmed = s.trim();
                match trimmed.parse::<i64>() {
                    Ok(i) => i,
                    Err(_) => {
                        let f = trimmed
                            .parse::<f64>()
                            .map_err(|_| self.incompatible(target))?;
                        self.float_to_integer(f, target)?
                    }
                }
            }
            _ => return Err(self.incompatible(target)),
        };
        let (min, max) = target.integer_range().unwrap_or((i64::MIN, i64::MAX));
        if !(min..=max).contains(&value) {
            return Err(self.out_of_range(target));
        }
        Ok(value)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn float_to_integer(&self, f: f64, target: FieldType) -> Result<i64, ConversionError> {
        if !f.is_finite() {
            return Err(self.incompatible(target));
        }
        let rounded = f.round();
        if !(i64::MIN as f64..=i64::MAX as f64).contains(&rounded) {
            return Err(self.out_of_range(target));
        }
        Ok(rounded as i64)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn to_float(&self, target: FieldType) -> Result<f64, ConversionError> {
        let value = match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Integer(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.incompatible(target))?,
            _ => return Err(self.incompatible(target)),
        };
        if !value.is_finite() {
            return Err(self.incompatible(target));
        }
        if target == FieldType::Float && !(value as f32).is_finite() {
            return Err(self.out_of_range(target));
        }
        Ok(value)
    }

    fn to_text(&self, target: FieldType) -> Result<String, ConversionError> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            Self::Blob(bytes) => {
                String::from_utf8(bytes.clone()).map_err(|_| self.incompatible(target))
            }
            Self::Bool(b) => Ok(b.to_string()),
            Self::Integer(i) => Ok(i.to_string()),
            Self::Float(f) => Ok(f.to_string()),
            Self::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
            Self::DateTime(dt) => Ok(dt.format(DATE_TIME_FORMAT).to_string()),
            Self::Time(t) => Ok(t.format(TIME_FORMAT).to_string()),
            Self::Null => Err(self.incompatible(target)),
        }
    }

    fn incompatible(&self, target: FieldType) -> ConversionError {
        ConversionError::Incompatible {
            value: self.to_string(),
            target,
        }
    }

    fn out_of_range(&self, target: FieldType) -> ConversionError {
        ConversionError::OutOfRange {
            value: self.to_string(),
            target,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_date_time(s).map(|dt| dt.date()))
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    DATE_TIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::default()))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Blob(bytes) => write!(f, "<blob {} bytes>", bytes.len()),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATE_TIME_FORMAT)),
            Self::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Blob(bytes)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Self::Time(t)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
