use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use redis_protocol::resp2::types::OwnedFrame as Frame;

use crate::error::{Error, Result};

/// A decoded server reply.
///
/// Error replies never become a `Value`; they surface as
/// [`Error::Response`](crate::Error::Response) or
/// [`Error::WrongType`](crate::Error::WrongType) instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Status(String),
    Bulk(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    pub(crate) fn from_frame(frame: Frame) -> Result<Value> {
        match frame {
            Frame::SimpleString(data) => Ok(Value::Status(
                String::from_utf8_lossy(&data).into_owned(),
            )),
            Frame::Error(message) => Err(Error::from_server(message)),
            Frame::Integer(n) => Ok(Value::Int(n)),
            Frame::BulkString(data) => Ok(Value::Bulk(data)),
            Frame::Null => Ok(Value::Nil),
            Frame::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(Value::from_frame(item)?);
                }
                Ok(Value::Array(values))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "integer",
            Value::Status(_) => "status",
            Value::Bulk(_) => "bulk string",
            Value::Array(_) => "array",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "(nil)"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Status(s) => write!(f, "{}", s),
            Value::Bulk(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, item)?;
                }
                if items.is_empty() {
                    write!(f, "(empty array)")?;
                }
                Ok(())
            }
        }
    }
}

/// Conversion of a [`Value`] into a caller-facing type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            // `OK` and friends count as success
            Value::Status(_) => Ok(true),
            Value::Int(n) => Ok(n != 0),
            Value::Nil => Ok(false),
            other => Err(other.mismatch("boolean")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(n),
            Value::Bulk(ref data) => {
                atoi::atoi::<i64>(data).ok_or_else(|| value.mismatch("integer"))
            }
            other => Err(other.mismatch("integer")),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(n) if n >= 0 => Ok(n as u64),
            Value::Bulk(ref data) => {
                atoi::atoi::<u64>(data).ok_or_else(|| value.mismatch("unsigned integer"))
            }
            other => Err(other.mismatch("unsigned integer")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(n as f64),
            Value::Bulk(ref data) => {
                let text = std::str::from_utf8(data).map_err(|_| value.mismatch("float"))?;
                match text {
                    "inf" | "+inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    _ => text.parse().map_err(|_| value.mismatch("float")),
                }
            }
            other => Err(other.mismatch("float")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Status(s) => Ok(s),
            Value::Bulk(data) => {
                String::from_utf8(data).map_err(|_| Error::TypeMismatch {
                    expected: "utf-8 string",
                    actual: "binary bulk string",
                })
            }
            other => Err(other.mismatch("string")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bulk(data) => Ok(data),
            Value::Status(s) => Ok(s.into_bytes()),
            other => Err(other.mismatch("bulk string")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => Ok(Some(T::from_value(other)?)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            Value::Nil => Ok(Vec::new()),
            other => Err(other.mismatch("array")),
        }
    }
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            Value::Nil => Ok(HashSet::new()),
            other => Err(other.mismatch("array")),
        }
    }
}

/// Flat field/value reply (e.g. HGETALL) into a map.
impl<V: FromValue> FromValue for HashMap<String, V> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => {
                if items.len() % 2 != 0 {
                    return Err(Error::TypeMismatch {
                        expected: "field/value array",
                        actual: "array of odd length",
                    });
                }
                let mut map = HashMap::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(field), Some(val)) = (iter.next(), iter.next()) {
                    map.insert(String::from_value(field)?, V::from_value(val)?);
                }
                Ok(map)
            }
            Value::Nil => Ok(HashMap::new()),
            other => Err(other.mismatch("field/value array")),
        }
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(mut items) => {
                if items.len() != 2 {
                    return Err(Error::TypeMismatch {
                        expected: "two-element array",
                        actual: "array",
                    });
                }
                let second = items.pop().expect("len checked");
                let first = items.pop().expect("len checked");
                Ok((A::from_value(first)?, B::from_value(second)?))
            }
            other => Err(other.mismatch("two-element array")),
        }
    }
}

pub(crate) fn from_value<T: FromValue>(value: Value) -> Result<T> {
    T::from_value(value)
}
