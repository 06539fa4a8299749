//! Value model for persisted state.
//!
//! `Value` is the closed set of shapes the compact format can carry. Host
//! types outside that set travel as `Value::Object` and need a converter in
//! the [`TypeRegistry`](crate::TypeRegistry) to be written or read.

use crate::known::{Color, Unit};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A host object that can be persisted through a registered converter.
///
/// `type_name` is the identity used on the wire and as the registry key.
pub trait StateObject: Any + fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// Structural equality against another object of any type.
    fn state_eq(&self, other: &dyn StateObject) -> bool;
}

/// Shared handle to a host object.
#[derive(Clone, Debug)]
pub struct ObjectValue(Arc<dyn StateObject>);

impl ObjectValue {
    pub fn new<T: StateObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn StateObject>) -> Self {
        Self(object)
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn get(&self) -> &dyn StateObject {
        self.0.as_ref()
    }

    pub fn downcast_ref<T: StateObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.0.state_eq(other.0.as_ref())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Bool(bool),
    String(String),
    Int16(i16),
    Int64(i64),
    Unit(Unit),
    Color(Color),
    /// Homogeneous string array; elements are written untagged.
    StringArray(Vec<Option<String>>),
    /// Heterogeneous object array.
    Array(Vec<Value>),
    Pair(Box<Value>, Box<Value>),
    Triplet(Box<Value>, Box<Value>, Box<Value>),
    List(Vec<Value>),
    /// Ordered key/value map.
    Map(Vec<(Value, Value)>),
    Object(ObjectValue),
}

impl Value {
    pub fn pair(first: Value, second: Value) -> Value {
        Value::Pair(Box::new(first), Box::new(second))
    }

    pub fn triplet(first: Value, second: Value, third: Value) -> Value {
        Value::Triplet(Box::new(first), Box::new(second), Box::new(third))
    }

    pub fn object<T: StateObject>(object: T) -> Value {
        Value::Object(ObjectValue::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Short label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Int16(_) => "int16",
            Value::Int64(_) => "int64",
            Value::Unit(_) => "unit",
            Value::Color(_) => "color",
            Value::StringArray(_) => "string[]",
            Value::Array(_) => "object[]",
            Value::Pair(..) => "pair",
            Value::Triplet(..) => "triplet",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
