//! Dynamic value tree for wire data of unknown shape.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::document::{Document, Module, NamedDocument, Reference};
use crate::page::Page;

/// Any value the wire format can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Date(NaiveDate),
    Time(DateTime<Utc>),
    Module(Module),
    Array(Vec<Value>),
    /// Keys keep their wire order.
    Object(IndexMap<String, Value>),
    Ref(Reference),
    Document(Document),
    NamedDocument(NamedDocument),
    Page(Page<Value>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::Module(_) => "Module",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Ref(_) => "Ref",
            Value::Document(_) => "Document",
            Value::NamedDocument(_) => "NamedDocument",
            Value::Page(_) => "Page",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Looks up `key` in an object or a document's data.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Document(doc) => doc.data.get(key),
            Value::NamedDocument(doc) => doc.data.get(key),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f64 => Double,
    String => String,
    NaiveDate => Date,
    DateTime<Utc> => Time,
    Module => Module,
    Vec<Value> => Array,
    IndexMap<String, Value> => Object,
    Reference => Ref,
    Document => Document,
    NamedDocument => NamedDocument,
    Page<Value> => Page,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Option<Value>> for Value {
    fn from(v: Option<Value>) -> Self {
        v.unwrap_or(Value::Null)
    }
}

/// Plain JSON maps onto the untagged variants; integers take the narrowest
/// of `Int`, `Long`, `Double` that holds them.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Value::Int(small),
                        Err(_) => Value::Long(i),
                    }
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Narrowing from a [`Value`] back to a native type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_value! {
    bool => Bool,
    i32 => Int,
    String => String,
    NaiveDate => Date,
    DateTime<Utc> => Time,
    Module => Module,
    Vec<Value> => Array,
    IndexMap<String, Value> => Object,
    Reference => Ref,
    Document => Document,
    NamedDocument => NamedDocument,
    Page<Value> => Page,
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(f64::from(*i)),
            Value::Long(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for Option<Value> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => Some(Some(other.clone())),
        }
    }
}
