use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::SiftError;

/// A single field value. Records coming from JSON never carry `Date`; it is
/// produced by the tabular loaders for date and datetime columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// String form used by every text comparison. Null renders as "".
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_text(n),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Secs, true),
            Value::List(items) => items
                .iter()
                .map(Value::as_text)
                .collect::<Vec<String>>()
                .join(","),
            Value::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Value::Date(_))
    }

    /// Milliseconds since the unix epoch. Anything that is not a date, a
    /// number or a parsable date string maps to 0.
    pub fn epoch_millis(&self) -> i64 {
        match self {
            Value::Date(d) => d.timestamp_millis(),
            Value::Number(n) => n.as_f64().map(|f| f as i64).unwrap_or(0),
            Value::Text(s) => parse_date_millis(s).unwrap_or(0),
            _ => 0,
        }
    }

    /// The calendar day part of the value, i.e. everything before the time
    /// separator.
    pub fn date_part(&self) -> String {
        match self {
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            other => {
                let text = other.as_text();
                match text.find(['T', ' ']) {
                    Some(pos) => text[..pos].to_string(),
                    None => text,
                }
            }
        }
    }
}

/// Whole floats render without the fraction, so a frame column widened to
/// f64 still reads `2` rather than `2.0`.
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

pub fn parse_date_millis(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// One row of data, fields kept in source order. Fields are addressed by dot
/// paths, numeric segments index into lists: `assigned_to_user_details.0.first_name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Walk a dot path. Any missing segment yields `None`.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// String form of the value at `path`, "" when absent.
    pub fn text(&self, path: &str) -> String {
        self.resolve(path).map(Value::as_text).unwrap_or_default()
    }

    /// All leaf values with their dot paths, in field order.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, value) in self.fields.iter() {
            flatten_into(key.clone(), value, &mut out);
        }
        out
    }

    pub fn to_json(&self) -> Result<String, SiftError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn flatten_into(path: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Map(map) if !map.is_empty() => {
            for (key, child) in map.iter() {
                flatten_into(format!("{path}.{key}"), child, out);
            }
        }
        Value::List(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                flatten_into(format!("{path}.{idx}"), child, out);
            }
        }
        leaf => out.push((path, leaf.as_text())),
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = SiftError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Record {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            other => Err(SiftError::InvalidRecord(format!(
                "expected an object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
