//! Generic value model.
//!
//! Structured documents (settings files, profile blocks, injected variable
//! files) are all parsed into a [`Value`] tree before the engine looks at
//! them.  The engine itself only ever deals in strings, so the accessors
//! below coerce scalars loosely and fail with [`Error::TypeMismatch`] for
//! anything structural.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A parsed configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Map(BTreeMap<String, Value>),
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Value {
    /// Name of the variant, used in type-mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch { expected, found: self.type_name() }
    }

    /// Coerce to a string.  Any scalar is accepted and rendered in its
    /// display form; null, maps and arrays are a mismatch.
    pub fn as_string(&self) -> Result<String> {
        if self.is_scalar() {
            Ok(self.to_string())
        } else {
            Err(self.mismatch("string"))
        }
    }

    /// Coerce to a boolean: `true`/`1` and `false`/`0` are accepted in string
    /// form, integers are truthy when non-zero.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(self.mismatch("boolean")),
            },
            _ => Err(self.mismatch("boolean")),
        }
    }

    /// Coerce to `i64`; numeric-looking strings are parsed.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Str(s) => s.trim().parse().map_err(|_| self.mismatch("integer")),
            _ => Err(self.mismatch("integer")),
        }
    }

    /// Coerce to `f64`; integers widen and numeric-looking strings are parsed.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            Value::Int(n) => Ok(*n as f64),
            Value::Str(s) => s.trim().parse().map_err(|_| self.mismatch("float")),
            _ => Err(self.mismatch("float")),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Ok(m),
            _ => Err(self.mismatch("map")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value]> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(self.mismatch("array")),
        }
    }

    /// Look up `key` in a map value.  Returns `None` for missing keys and for
    /// non-map values alike.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
