//! # Form Schemas
//!
//! Declarative field rules shared by the form controller (client-side
//! validation) and the server actions (server-side validation).
//!
//! Raw input is a JSON object as produced by an HTML form or a JSON body:
//! values may arrive as strings and are coerced to the declared kind.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Raw, unvalidated form input.
pub type FormInput = Map<String, Value>;

/// The type (and constraints) a field is coerced to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text { min: usize, max: Option<usize> },
    Email,
    Url,
    Bool,
    Int { min: Option<i32>, max: Option<i32> },
    Float { min: Option<f64>, max: Option<f64> },
    Uuid,
    /// One of a fixed set of string values
    Choice(&'static [&'static str]),
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// RFC 3339, or a `datetime-local` value interpreted as UTC
    Timestamp,
}

impl FieldKind {
    /// Non-empty text with no upper bound.
    pub const TEXT: FieldKind = FieldKind::Text { min: 1, max: None };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// A typed, validated value ready to be bound into a statement.
///
/// Nullable kinds keep their type when empty so storage adapters can bind a
/// correctly typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Bool(bool),
    Int(Option<i32>),
    Float(Option<f64>),
    Uuid(Option<Uuid>),
    Date(Option<NaiveDate>),
    Timestamp(Option<DateTime<Utc>>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Bool(_) => false,
            FieldValue::Int(v) => v.is_none(),
            FieldValue::Float(v) => v.is_none(),
            FieldValue::Uuid(v) => v.is_none(),
            FieldValue::Date(v) => v.is_none(),
            FieldValue::Timestamp(v) => v.is_none(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(v) => v.clone().map_or(Value::Null, Value::String),
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Int(v) => v.map_or(Value::Null, Value::from),
            FieldValue::Float(v) => v.map_or(Value::Null, Value::from),
            FieldValue::Uuid(v) => v.map_or(Value::Null, |id| Value::String(id.to_string())),
            FieldValue::Date(v) => v.map_or(Value::Null, |d| Value::String(d.to_string())),
            FieldValue::Timestamp(v) => v.map_or(Value::Null, |t| Value::String(t.to_rfc3339())),
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(v) => *v,
            _ => None,
        }
    }
}

/// Validated values in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(Vec<(&'static str, FieldValue)>);

impl Values {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (*name, value))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.to_json()))
            .collect()
    }
}

/// Per-field error messages, first failure wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// An ordered list of field rules for one entity form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates and coerces `input`. Unknown keys are ignored.
    pub fn parse(&self, input: &FormInput) -> Result<Values, FieldErrors> {
        let mut values = Vec::with_capacity(self.fields.len());
        let mut errors = FieldErrors::default();

        for field in self.fields {
            match parse_field(field, input.get(field.name)) {
                Ok(value) => values.push((field.name, value)),
                Err(message) => errors.insert(field.name, message),
            }
        }

        if errors.is_empty() {
            Ok(Values(values))
        } else {
            Err(errors)
        }
    }
}

fn is_blank(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn empty_value(kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Text { .. } | FieldKind::Email | FieldKind::Url | FieldKind::Choice(_) => {
            FieldValue::Text(None)
        }
        FieldKind::Bool => FieldValue::Bool(false),
        FieldKind::Int { .. } => FieldValue::Int(None),
        FieldKind::Float { .. } => FieldValue::Float(None),
        FieldKind::Uuid => FieldValue::Uuid(None),
        FieldKind::Date => FieldValue::Date(None),
        FieldKind::Timestamp => FieldValue::Timestamp(None),
    }
}

fn parse_field(field: &Field, raw: Option<&Value>) -> Result<FieldValue, String> {
    // Unchecked checkboxes are simply absent from a submitted form.
    if field.kind == FieldKind::Bool {
        return match raw {
            None | Some(Value::Null) => Ok(FieldValue::Bool(false)),
            Some(value) => parse_bool(value).map(FieldValue::Bool),
        };
    }

    let value = match raw {
        Some(value) if !is_blank(raw) => value,
        _ if field.required => return Err("Required".to_string()),
        _ => return Ok(empty_value(field.kind)),
    };

    match field.kind {
        FieldKind::Text { min, max } => {
            let text = as_text(value)?;
            let len = text.chars().count();
            if len < min {
                return Err(format!("String must contain at least {min} character(s)"));
            }
            if let Some(max) = max.filter(|max| len > *max) {
                return Err(format!("String must contain at most {max} character(s)"));
            }
            Ok(FieldValue::Text(Some(text)))
        }
        FieldKind::Email => {
            let text = as_text(value)?;
            if is_email(&text) {
                Ok(FieldValue::Text(Some(text)))
            } else {
                Err("Invalid email".to_string())
            }
        }
        FieldKind::Url => {
            let text = as_text(value)?;
            match url::Url::parse(&text) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                    Ok(FieldValue::Text(Some(text)))
                }
                _ => Err("Invalid url".to_string()),
            }
        }
        FieldKind::Bool => parse_bool(value).map(FieldValue::Bool),
        FieldKind::Int { min, max } => {
            let number = parse_int(value)?;
            check_range(f64::from(number), min.map(f64::from), max.map(f64::from))?;
            Ok(FieldValue::Int(Some(number)))
        }
        FieldKind::Float { min, max } => {
            let number = parse_float(value)?;
            check_range(number, min, max)?;
            Ok(FieldValue::Float(Some(number)))
        }
        FieldKind::Uuid => as_text(value)?
            .trim()
            .parse::<Uuid>()
            .map(|id| FieldValue::Uuid(Some(id)))
            .map_err(|_| "Invalid uuid".to_string()),
        FieldKind::Choice(options) => {
            let text = as_text(value)?;
            if options.contains(&text.as_str()) {
                Ok(FieldValue::Text(Some(text)))
            } else {
                let expected = options
                    .iter()
                    .map(|o| format!("'{o}'"))
                    .collect::<Vec<_>>()
                    .join(" | ");
                Err(format!("Invalid enum value. Expected {expected}, received '{text}'"))
            }
        }
        FieldKind::Date => NaiveDate::parse_from_str(as_text(value)?.trim(), "%Y-%m-%d")
            .map(|d| FieldValue::Date(Some(d)))
            .map_err(|_| "Invalid date".to_string()),
        FieldKind::Timestamp => parse_timestamp(as_text(value)?.trim())
            .map(|t| FieldValue::Timestamp(Some(t)))
            .ok_or_else(|| "Invalid date".to_string()),
    }
}

fn as_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("Expected string, received {}", type_name(other))),
    }
}

fn parse_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim() {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" | "" => Ok(false),
            _ => Err("Expected boolean, received string".to_string()),
        },
        other => Err(format!("Expected boolean, received {}", type_name(other))),
    }
}

fn parse_int(value: &Value) -> Result<i32, String> {
    let number = parse_float(value)?;
    if number.fract() != 0.0 {
        return Err("Expected integer, received float".to_string());
    }
    if number < f64::from(i32::MIN) || number > f64::from(i32::MAX) {
        return Err("Number is out of range".to_string());
    }
    Ok(number as i32)
}

fn parse_float(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => return Err(format!("Expected number, received {}", type_name(other))),
    };
    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err("Expected number, received nan".to_string()),
    }
}

fn check_range(number: f64, min: Option<f64>, max: Option<f64>) -> Result<(), String> {
    if let Some(min) = min.filter(|min| number < *min) {
        return Err(format!("Number must be greater than or equal to {min}"));
    }
    if let Some(max) = max.filter(|max| number > *max) {
        return Err(format!("Number must be less than or equal to {max}"));
    }
    Ok(())
}

fn is_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
