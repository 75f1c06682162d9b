use std::borrow::Cow;

use crate::error::Result;
use crate::types::{mismatch, Decode, Encode};
use crate::value::{SqliteArgumentValue, SqliteValue};

impl Encode for [u8] {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Blob(Cow::Borrowed(self)))
    }
}

impl Encode for Vec<u8> {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Blob(Cow::Borrowed(self)))
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Blob(Cow::Borrowed(self)))
    }
}

impl<'r> Decode<'r> for &'r [u8] {
    fn decode(value: &'r SqliteValue) -> Result<Self> {
        match value {
            SqliteValue::Blob(v) => Ok(v),
            _ => Err(mismatch::<&[u8]>(value)),
        }
    }
}

impl Decode<'_> for Vec<u8> {
    fn decode(value: &SqliteValue) -> Result<Self> {
        <&[u8]>::decode(value).map(ToOwned::to_owned)
    }
}
