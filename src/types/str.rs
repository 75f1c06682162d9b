use std::borrow::Cow;

use crate::error::Result;
use crate::types::{mismatch, Decode, Encode};
use crate::value::{SqliteArgumentValue, SqliteValue};

impl Encode for str {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Text(Cow::Borrowed(self)))
    }
}

impl Encode for String {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Text(Cow::Borrowed(self)))
    }
}

impl Encode for Cow<'_, str> {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Text(Cow::Borrowed(self)))
    }
}

impl<'r> Decode<'r> for &'r str {
    fn decode(value: &'r SqliteValue) -> Result<Self> {
        match value {
            SqliteValue::Text(v) => Ok(v),
            _ => Err(mismatch::<&str>(value)),
        }
    }
}

impl Decode<'_> for String {
    fn decode(value: &SqliteValue) -> Result<Self> {
        <&str>::decode(value).map(ToOwned::to_owned)
    }
}
