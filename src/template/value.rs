// ABOUTME: Runtime value model shared by the trusted and restricted template dialects
// ABOUTME: Wraps JSON-like data plus captured outputs and engine builtins, with text rendering rules

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::capture::Captured;

/// Per-call bindings visible to a template, in merge order.
pub type Locals = IndexMap<String, Value>;

/// Callables the engine binds into scope. Templates cannot define their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Expands a registered partial: `partial(name, locals?)`
    Partial,
    /// JSON-stringifies a value: `json(value, indent?)`
    Json,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Captured(Captured),
    Builtin(Builtin),
}

impl Value {
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Builtins and undefined members are dropped from
    /// objects and become `null` elsewhere; captured values become their text.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Undefined | Value::Null | Value::Builtin(_) => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => JsonValue::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined | Value::Builtin(_)))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Captured(captured) => JsonValue::String(captured.text().to_string()),
        }
    }

    /// Locals as a JSON object, for schema validation and `SELF` records
    pub fn locals_to_json(locals: &Locals) -> JsonValue {
        Value::Object(locals.clone()).to_json()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Captured(_) => "captured",
            Value::Builtin(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// Text inserted into rendered output for this value
    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => self.to_json().to_string(),
            Value::Captured(captured) => captured.text().to_string(),
            Value::Builtin(_) => "[builtin]".to_string(),
        }
    }

    /// Property lookup. `None` means the receiver cannot have properties.
    pub fn get_member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Undefined | Value::Null => None,
            Value::Object(map) => Some(map.get(name).cloned().unwrap_or_default()),
            Value::Array(items) if name == "length" => Some(Value::Number(items.len() as f64)),
            Value::String(s) if name == "length" => Some(Value::Number(s.chars().count() as f64)),
            _ => Some(Value::Undefined),
        }
    }

    /// Computed lookup (`a[b]`). `None` means the receiver cannot be indexed.
    pub fn get_index(&self, index: &Value) -> Option<Value> {
        match (self, index) {
            (Value::Undefined | Value::Null, _) => None,
            (Value::Array(items), Value::Number(n)) => Some(
                as_index(*n)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            ),
            (Value::String(s), Value::Number(n)) => Some(
                as_index(*n)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default(),
            ),
            (_, key) => self.get_member(&key.to_text()),
        }
    }

    /// `===` semantics
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// `==` semantics: nullish values are equal to each other, primitives
    /// of different kinds compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(_) | Value::Bool(_) | Value::String(_), Value::Number(_) | Value::Bool(_) | Value::String(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_eq(other),
        }
    }
}

fn as_index(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

/// Render numbers without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1.0e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from_json(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Captured> for Value {
    fn from(captured: Captured) -> Self {
        Value::Captured(captured)
    }
}

/// Build locals from a JSON object; non-object input yields empty locals.
pub fn locals_from_json(json: JsonValue) -> Locals {
    match json {
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect(),
        _ => Locals::new(),
    }
}
