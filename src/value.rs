use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::os::raw::c_int;

use libsqlite3_sys::{SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT};

/// The storage class of a single value, as reported by `sqlite3_column_type()`.
///
/// SQLite columns are dynamically typed: two rows of the same column may report different
/// classes, so this is decided per value and never cached per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Integer,
    Float,
    Text,
    Blob,
}

impl DataType {
    pub(crate) fn from_code(code: c_int) -> Self {
        match code {
            SQLITE_INTEGER => DataType::Integer,
            SQLITE_FLOAT => DataType::Float,
            SQLITE_TEXT => DataType::Text,
            SQLITE_BLOB => DataType::Blob,
            SQLITE_NULL => DataType::Null,

            _ => panic!("unknown data type code {code}"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Integer => "INTEGER",
            DataType::Float => "REAL",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A dynamically-typed SQLite value.
///
/// The variant fully determines which accessor succeeds; the `as_*` methods never convert
/// between storage classes. Use [`Decode`][crate::types::Decode] for host conversions.
#[derive(Debug, Clone, PartialEq)]
pub enum SqliteValue {
    Null,
    Integer(i64),
    Float(f64),
    /// UTF-8 text of explicit length; may contain NUL bytes.
    Text(String),
    Blob(Vec<u8>),
}

impl SqliteValue {
    pub fn data_type(&self) -> DataType {
        match self {
            SqliteValue::Null => DataType::Null,
            SqliteValue::Integer(_) => DataType::Integer,
            SqliteValue::Float(_) => DataType::Float,
            SqliteValue::Text(_) => DataType::Text,
            SqliteValue::Blob(_) => DataType::Blob,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqliteValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqliteValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqliteValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqliteValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqliteValue::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow this value for binding without copying TEXT or BLOB payloads.
    pub fn as_argument(&self) -> SqliteArgumentValue<'_> {
        match self {
            SqliteValue::Null => SqliteArgumentValue::Null,
            SqliteValue::Integer(v) => SqliteArgumentValue::Int64(*v),
            SqliteValue::Float(v) => SqliteArgumentValue::Double(*v),
            SqliteValue::Text(v) => SqliteArgumentValue::Text(Cow::Borrowed(v)),
            SqliteValue::Blob(v) => SqliteArgumentValue::Blob(Cow::Borrowed(v)),
        }
    }
}

impl Display for SqliteValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SqliteValue::Null => f.write_str("NULL"),
            SqliteValue::Integer(v) => write!(f, "{v}"),
            SqliteValue::Float(v) => write!(f, "{v}"),
            SqliteValue::Text(v) => write!(f, "{v:?}"),
            SqliteValue::Blob(v) => write!(f, "<{} byte blob>", v.len()),
        }
    }
}

/// A value ready to be bound to a statement parameter.
///
/// TEXT and BLOB payloads are borrowed where possible; SQLite copies them on bind
/// (`SQLITE_TRANSIENT`), so nothing needs to outlive the `bind` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SqliteArgumentValue<'q> {
    Null,
    Int64(i64),
    Double(f64),
    Text(Cow<'q, str>),
    Blob(Cow<'q, [u8]>),
}

impl SqliteArgumentValue<'_> {
    pub fn into_static(self) -> SqliteArgumentValue<'static> {
        match self {
            SqliteArgumentValue::Null => SqliteArgumentValue::Null,
            SqliteArgumentValue::Int64(v) => SqliteArgumentValue::Int64(v),
            SqliteArgumentValue::Double(v) => SqliteArgumentValue::Double(v),
            SqliteArgumentValue::Text(v) => SqliteArgumentValue::Text(Cow::Owned(v.into_owned())),
            SqliteArgumentValue::Blob(v) => SqliteArgumentValue::Blob(Cow::Owned(v.into_owned())),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            SqliteArgumentValue::Null => DataType::Null,
            SqliteArgumentValue::Int64(_) => DataType::Integer,
            SqliteArgumentValue::Double(_) => DataType::Float,
            SqliteArgumentValue::Text(_) => DataType::Text,
            SqliteArgumentValue::Blob(_) => DataType::Blob,
        }
    }
}

impl From<SqliteArgumentValue<'_>> for SqliteValue {
    fn from(value: SqliteArgumentValue<'_>) -> Self {
        match value {
            SqliteArgumentValue::Null => SqliteValue::Null,
            SqliteArgumentValue::Int64(v) => SqliteValue::Integer(v),
            SqliteArgumentValue::Double(v) => SqliteValue::Float(v),
            SqliteArgumentValue::Text(v) => SqliteValue::Text(v.into_owned()),
            SqliteArgumentValue::Blob(v) => SqliteValue::Blob(v.into_owned()),
        }
    }
}
