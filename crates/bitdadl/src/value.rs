//! Decoded object graph and the typed shapes it converts to and from.
//!
//! Unmarshalling produces a [Value] tree: one [Record] per composite node and one
//! scalar per leaf. Strongly typed records implement [Info] to name their schema
//! type and to convert field by field, so no runtime reflection is involved.

use std::collections::BTreeMap;

use crate::errors::ErrorKind;

/// A value produced by unmarshalling or consumed by marshalling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed integer, from signed binary fields and text numbers.
    I64(i64),
    /// Unsigned integer, from unsigned binary and BCD fields.
    U64(u64),
    Bool(bool),
    Text(String),
    /// Raw bytes of an opaque field.
    Bytes(Vec<u8>),
    /// Name of an enumeration constant.
    Enum(String),
    /// Items of a list field, in stream order.
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::I64(_) => "signed integer",
            Value::U64(_) => "unsigned integer",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enumeration constant",
            Value::Array(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Integer value widened so that both signed and unsigned 64-bit ranges fit.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::I64(v) => Some(i128::from(*v)),
            Value::U64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

/// Field values of one composite node, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Removes a required field and converts it.
    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T, ErrorKind> {
        let value = self
            .fields
            .remove(name)
            .ok_or_else(|| ErrorKind::MissingField(name.to_string()))?;
        T::from_value(value)
    }

    /// Removes an optional field and converts it if present.
    pub fn take_optional<T: FromValue>(&mut self, name: &str) -> Result<Option<T>, ErrorKind> {
        self.fields.remove(name).map(T::from_value).transpose()
    }

    /// Removes a list field and converts every item.
    pub fn take_array<T: FromValue>(&mut self, name: &str) -> Result<Vec<T>, ErrorKind> {
        match self.fields.remove(name) {
            Some(Value::Array(items)) => items.into_iter().map(T::from_value).collect(),
            Some(other) => Err(ErrorKind::shape("list", &other)),
            None => Err(ErrorKind::MissingField(name.to_string())),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Conversion out of a decoded [Value].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ErrorKind>;
}

/// Conversion into a [Value] ready to be marshalled.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// A strongly typed record bound to a named schema type.
///
/// ```
/// use bitdadl::value::{FromValue, Info, Record, ToValue, Value};
/// use bitdadl::errors::ErrorKind;
///
/// struct Header {
///     version: u8,
///     length: u16,
/// }
///
/// impl FromValue for Header {
///     fn from_value(value: Value) -> Result<Self, ErrorKind> {
///         let mut record = Record::from_value(value)?;
///         Ok(Header {
///             version: record.take("version")?,
///             length: record.take("length")?,
///         })
///     }
/// }
///
/// impl ToValue for Header {
///     fn to_value(&self) -> Value {
///         Record::new()
///             .with("version", self.version.to_value())
///             .with("length", self.length.to_value())
///             .into()
///     }
/// }
///
/// impl Info for Header {
///     const TYPE_NAME: &'static str = "Header";
/// }
/// ```
pub trait Info: FromValue + ToValue {
    /// Name of the schema type this shape corresponds to.
    const TYPE_NAME: &'static str;
}

// Narrowing to a smaller integer type is a truncating cast.
macro_rules! impl_integer {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, ErrorKind> {
                    match value {
                        Value::I64(v) => Ok(v as $t),
                        Value::U64(v) => Ok(v as $t),
                        other => Err(ErrorKind::shape(stringify!($t), &other)),
                    }
                }
            }

            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(*self as _)
                }
            }
        )*
    };
}

impl_integer!(
    i8 => I64,
    i16 => I64,
    i32 => I64,
    i64 => I64,
    u8 => U64,
    u16 => U64,
    u32 => U64,
    u64 => U64,
);

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(ErrorKind::shape("boolean", &other)),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ErrorKind::shape("text", &other)),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(ErrorKind::shape("bytes", &other)),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Record {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Record(record) => Ok(record),
            other => Err(ErrorKind::shape("record", &other)),
        }
    }
}

impl ToValue for Record {
    fn to_value(&self) -> Value {
        Value::Record(self.clone())
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        Ok(value)
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_narrowing_truncates() {
        assert_eq!(u8::from_value(Value::U64(0x1FF)).unwrap(), 0xFF);
        assert_eq!(i8::from_value(Value::I64(-1)).unwrap(), -1);
        assert_eq!(i16::from_value(Value::U64(0xFFFF)).unwrap(), -1);
        assert_eq!(u64::from_value(Value::I64(42)).unwrap(), 42);
    }

    #[test]
    fn test_integer_shape_mismatch() {
        assert_eq!(
            u16::from_value(Value::Text("7".into())).unwrap_err(),
            ErrorKind::ShapeMismatch {
                expected: "u16".into(),
                actual: "text".into()
            }
        );
    }

    #[test]
    fn test_record_take() {
        let mut record = Record::new()
            .with("id", 7u64)
            .with("name", "abc")
            .with("items", vec![Value::U64(1), Value::U64(2)]);

        assert_eq!(record.take::<u8>("id").unwrap(), 7);
        assert_eq!(record.take_optional::<String>("name").unwrap(), Some("abc".into()));
        assert_eq!(record.take_optional::<String>("name").unwrap(), None);
        assert_eq!(record.take_array::<u32>("items").unwrap(), vec![1, 2]);
        assert_eq!(
            record.take::<u8>("id").unwrap_err(),
            ErrorKind::MissingField("id".into())
        );
        assert!(record.is_empty());
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::U64(5).as_i64(), Some(5));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::U64(u64::MAX).as_i128(), Some(u64::MAX as i128));
        assert_eq!(Value::Text("x".into()).as_i64(), None);
    }
}
