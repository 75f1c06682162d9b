use crate::error::Result;
use crate::types::{mismatch, Decode, Encode};
use crate::value::{SqliteArgumentValue, SqliteValue};

impl Encode for bool {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Int64(i64::from(*self)))
    }
}

impl Decode<'_> for bool {
    fn decode(value: &SqliteValue) -> Result<Self> {
        match value {
            SqliteValue::Integer(v) => Ok(*v != 0),
            _ => Err(mismatch::<bool>(value)),
        }
    }
}
