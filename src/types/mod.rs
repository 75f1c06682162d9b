//! Conversions between Rust and **SQLite** values.
//!
//! # Types
//!
//! | Rust type                             | SQLite storage class                                 |
//! |---------------------------------------|------------------------------------------------------|
//! | `bool`                                | INTEGER (0 or 1)                                     |
//! | `i8`, `i16`, `i32`, `i64`             | INTEGER                                              |
//! | `u8`, `u16`, `u32`                    | INTEGER                                              |
//! | `u64`                                 | INTEGER (values above `i64::MAX` fail to bind)       |
//! | `f32`, `f64`                          | REAL (decoding also accepts INTEGER)                 |
//! | `&str`, [`String`]                    | TEXT                                                 |
//! | `&[u8]`, `Vec<u8>`                    | BLOB                                                 |
//! | `Option<T>`                           | NULL when `None`                                     |
//! | [`SqliteValue`]                       | any                                                  |
//! | `serde_json::Value` (`json` feature)  | scalars only; arrays and objects fail to bind        |
//!
//! Decoding is driven by the storage class of each individual value, never by the declared
//! type of its column. An INTEGER will widen into an `f64`, but a REAL never narrows into an
//! integer and TEXT is never parsed as a number: those fail with [`Error::TypeMismatch`].
//!
//! #### Note: Integer width
//! Narrow integer types are decoded with a checked conversion from the 64-bit value, so a value
//! that does not fit fails with [`Error::Overflow`] instead of being truncated.
//! There is no wider integer storage in SQLite than `i64`, so a `u64` above `i64::MAX` also
//! fails with [`Error::Overflow`] when bound.

use crate::error::{Error, Result};
use crate::value::{SqliteArgumentValue, SqliteValue};

mod bool;
mod bytes;
mod float;
mod int;
#[cfg(feature = "json")]
mod json;
mod str;

/// A host value that can be bound to a statement parameter.
pub trait Encode {
    /// Produce the dynamic value to bind.
    ///
    /// Returns [`Error::TypeMismatch`] for values with no natural SQLite representation and
    /// [`Error::Overflow`] for values wider than SQLite can store.
    fn encode(&self) -> Result<SqliteArgumentValue<'_>>;
}

/// A host value that can be decoded from a [`SqliteValue`].
pub trait Decode<'r>: Sized {
    fn decode(value: &'r SqliteValue) -> Result<Self>;
}

impl<T: Encode + ?Sized> Encode for &T {
    #[inline]
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        (**self).encode()
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        match self {
            Some(value) => value.encode(),
            None => Ok(SqliteArgumentValue::Null),
        }
    }
}

impl<'r, T: Decode<'r>> Decode<'r> for Option<T> {
    fn decode(value: &'r SqliteValue) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::decode(value).map(Some)
        }
    }
}

impl Encode for SqliteValue {
    #[inline]
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(self.as_argument())
    }
}

impl Encode for SqliteArgumentValue<'_> {
    #[inline]
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(match self {
            SqliteArgumentValue::Null => SqliteArgumentValue::Null,
            SqliteArgumentValue::Int64(v) => SqliteArgumentValue::Int64(*v),
            SqliteArgumentValue::Double(v) => SqliteArgumentValue::Double(*v),
            SqliteArgumentValue::Text(v) => SqliteArgumentValue::Text(v.as_ref().into()),
            SqliteArgumentValue::Blob(v) => SqliteArgumentValue::Blob(v.as_ref().into()),
        })
    }
}

impl Decode<'_> for SqliteValue {
    #[inline]
    fn decode(value: &SqliteValue) -> Result<Self> {
        Ok(value.clone())
    }
}

pub(crate) fn mismatch<T>(value: &SqliteValue) -> Error {
    Error::mismatched_types(std::any::type_name::<T>(), value.data_type().name())
}
