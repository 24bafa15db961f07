//! Parameter coercion.
//!
//! Raw parameter values arrive as text. [`cast`] turns them into a typed
//! [`CastValue`] following the declared [`ParamType`]:
//!
//! - A date that cannot be parsed is a hard failure ([`ErrorCode::InvalidCast`]).
//! - Any other value that cannot be interpreted as its type is returned
//!   unchanged as a string. Coercion is advisory there; the parameter's
//!   constraint decides whether that is acceptable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, ValidationError};
use crate::Tainted;

/// Date-time layouts tried after RFC 3339 and RFC 2822, in order.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Date-only layouts, interpreted as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// A parameter value as read from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A single value.
    Text(String),
    /// A repeated value (e.g. `?tag=a&tag=b`).
    List(Vec<String>),
}

impl RawValue {
    /// Returns true for an empty single value or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Text(text) => text.is_empty(),
            RawValue::List(items) => items.is_empty(),
        }
    }

    /// Returns the value used for scalar types: the text, or the last repeated value.
    pub fn scalar(&self) -> Option<&str> {
        match self {
            RawValue::Text(text) => Some(text),
            RawValue::List(items) => items.last().map(String::as_str),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

/// Declared scalar type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ParamType {
    /// Free text.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// Floating point number.
    Number,
    /// `true`/`false` and their common spellings.
    Boolean,
    /// Calendar date or date-time.
    Date,
    /// List of strings.
    Array,
}

impl ParamType {
    /// Returns the lower-case type name.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Date => "date",
            ParamType::Array => "array",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(ParamType::String),
            "integer" | "int" => Ok(ParamType::Integer),
            "number" | "num" | "float" => Ok(ParamType::Number),
            "boolean" | "bool" => Ok(ParamType::Boolean),
            "date" | "datetime" => Ok(ParamType::Date),
            "array" => Ok(ParamType::Array),
            other => Err(format!("unknown parameter type '{other}'")),
        }
    }
}

impl TryFrom<String> for ParamType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CastValue {
    /// The parameter was absent.
    Null,
    /// Text, either declared as string or left unchanged by an inconclusive cast.
    String(String),
    /// An integer.
    Integer(i64),
    /// A number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
    /// A date-time with its offset.
    Date(DateTime<FixedOffset>),
    /// A list.
    Array(Vec<CastValue>),
}

impl CastValue {
    /// Returns true if the value has the shape of `kind`. Integers count as numbers.
    pub fn matches(&self, kind: ParamType) -> bool {
        matches!(
            (self, kind),
            (CastValue::String(_), ParamType::String)
                | (CastValue::Integer(_), ParamType::Integer)
                | (CastValue::Integer(_) | CastValue::Number(_), ParamType::Number)
                | (CastValue::Boolean(_), ParamType::Boolean)
                | (CastValue::Date(_), ParamType::Date)
                | (CastValue::Array(_), ParamType::Array)
        )
    }

    /// Returns true for [`CastValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, CastValue::Null)
    }

    /// Returns the integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CastValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a float for integers and numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CastValue::Integer(value) => Some(*value as f64),
            CastValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CastValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CastValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Converts to the generic JSON representation handlers work with.
    pub fn to_json(&self) -> Value {
        match self {
            CastValue::Null => Value::Null,
            CastValue::String(value) => Value::String(value.clone()),
            CastValue::Integer(value) => Value::from(*value),
            CastValue::Number(value) => Value::from(*value),
            CastValue::Boolean(value) => Value::Bool(*value),
            CastValue::Date(value) => Value::String(value.to_rfc3339()),
            CastValue::Array(items) => Value::Array(items.iter().map(CastValue::to_json).collect()),
        }
    }
}

impl fmt::Display for CastValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastValue::Null => f.write_str("null"),
            CastValue::String(value) => f.write_str(value),
            CastValue::Integer(value) => write!(f, "{value}"),
            CastValue::Number(value) => write!(f, "{value}"),
            CastValue::Boolean(value) => write!(f, "{value}"),
            CastValue::Date(value) => f.write_str(&value.to_rfc3339()),
            CastValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// Coerces a raw parameter value to `kind`.
///
/// An absent value casts to [`CastValue::Null`]; an empty value is returned
/// unchanged as an empty string.
///
/// # Errors
///
/// Returns an [`ErrorCode::InvalidCast`] error when a date cannot be parsed.
///
/// # Examples
///
/// ```
/// use contract_core::{cast, CastValue, ParamType, RawValue, Tainted};
///
/// let value = cast("id", Some(Tainted::new(RawValue::from("5"))), ParamType::Integer).unwrap();
/// assert_eq!(value, CastValue::Integer(5));
///
/// // Not an integer: left as-is for the constraint to judge.
/// let value = cast("id", Some(Tainted::new(RawValue::from("five"))), ParamType::Integer).unwrap();
/// assert_eq!(value, CastValue::String("five".to_string()));
///
/// assert!(cast("since", Some(Tainted::new(RawValue::from("someday"))), ParamType::Date).is_err());
/// ```
pub fn cast(
    name: &str,
    raw: Option<Tainted<RawValue>>,
    kind: ParamType,
) -> Result<CastValue, ValidationError> {
    let Some(raw) = raw else {
        return Ok(CastValue::Null);
    };
    let raw = raw.into_inner();

    if kind == ParamType::Array {
        return Ok(match raw {
            RawValue::Text(text) => CastValue::Array(vec![CastValue::String(text)]),
            RawValue::List(items) => {
                CastValue::Array(items.into_iter().map(CastValue::String).collect())
            }
        });
    }

    let Some(text) = raw.scalar() else {
        return Ok(CastValue::Null);
    };
    if text.is_empty() {
        return Ok(CastValue::String(String::new()));
    }

    let cast = match kind {
        ParamType::String => Some(CastValue::String(text.to_string())),
        ParamType::Integer => text.trim().parse::<i64>().ok().map(CastValue::Integer),
        ParamType::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(CastValue::Number),
        ParamType::Boolean => parse_bool(text).map(CastValue::Boolean),
        ParamType::Date => {
            let date = parse_date(text).ok_or_else(|| {
                ValidationError::sentence(
                    format!("parameter {name}: failed to parse time string ({text}) as a date"),
                    ErrorCode::InvalidCast,
                )
            })?;
            Some(CastValue::Date(date))
        }
        ParamType::Array => None,
    };

    // An inconclusive cast keeps the raw value.
    Ok(cast.unwrap_or_else(|| CastValue::String(text.to_string())))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses a calendar date or date-time. Values without an offset are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date);
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Some(date);
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive).into());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive).into());
        }
    }
    None
}
