use crate::error::{Error, Result};
use crate::types::{mismatch, Decode, Encode};
use crate::value::{SqliteArgumentValue, SqliteValue};

fn int64<T>(value: &SqliteValue) -> Result<i64> {
    match value {
        SqliteValue::Integer(v) => Ok(*v),
        _ => Err(mismatch::<T>(value)),
    }
}

macro_rules! impl_int {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
                Ok(SqliteArgumentValue::Int64(i64::from(*self)))
            }
        }

        impl Decode<'_> for $ty {
            fn decode(value: &SqliteValue) -> Result<Self> {
                // checked, never truncating
                let v = int64::<$ty>(value)?;
                <$ty>::try_from(v).map_err(|_| Error::Overflow {
                    value: i128::from(v),
                    target: stringify!($ty),
                })
            }
        }
    )*};
}

impl_int!(i8, i16, i32, u8, u16, u32);

impl Encode for i64 {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Int64(*self))
    }
}

impl Decode<'_> for i64 {
    fn decode(value: &SqliteValue) -> Result<Self> {
        int64::<i64>(value)
    }
}

impl Encode for u64 {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        // there is no wider integer storage than i64; reinterpreting the bits would change
        // the value as seen by SQL
        i64::try_from(*self)
            .map(SqliteArgumentValue::Int64)
            .map_err(|_| Error::Overflow {
                value: i128::from(*self),
                target: "i64",
            })
    }
}

impl Decode<'_> for u64 {
    fn decode(value: &SqliteValue) -> Result<Self> {
        let v = int64::<u64>(value)?;
        u64::try_from(v).map_err(|_| Error::Overflow {
            value: i128::from(v),
            target: "u64",
        })
    }
}
