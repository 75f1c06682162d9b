use std::borrow::Cow;

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::types::{Decode, Encode};
use crate::value::{SqliteArgumentValue, SqliteValue};

// Only scalars map onto a dynamic value. Arrays and objects are refused rather than
// serialized; store them as TEXT explicitly if that is what you want.
impl Encode for JsonValue {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        match self {
            JsonValue::Null => Ok(SqliteArgumentValue::Null),
            JsonValue::Bool(v) => Ok(SqliteArgumentValue::Int64(i64::from(*v))),
            JsonValue::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(SqliteArgumentValue::Int64(v))
                } else if let Some(v) = n.as_u64() {
                    Err(Error::Overflow {
                        value: i128::from(v),
                        target: "i64",
                    })
                } else {
                    n.as_f64()
                        .map(SqliteArgumentValue::Double)
                        .ok_or_else(|| Error::TypeMismatch(format!("unrepresentable number {n}")))
                }
            }
            JsonValue::String(v) => Ok(SqliteArgumentValue::Text(Cow::Borrowed(v))),
            JsonValue::Array(_) => Err(Error::TypeMismatch(
                "a JSON array has no SQLite representation".into(),
            )),
            JsonValue::Object(_) => Err(Error::TypeMismatch(
                "a JSON object has no SQLite representation".into(),
            )),
        }
    }
}

impl Decode<'_> for JsonValue {
    fn decode(value: &SqliteValue) -> Result<Self> {
        Ok(match value {
            SqliteValue::Null => JsonValue::Null,
            SqliteValue::Integer(v) => JsonValue::from(*v),
            SqliteValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .ok_or_else(|| Error::TypeMismatch(format!("{v} is not a JSON number")))?,
            SqliteValue::Text(v) => JsonValue::String(v.clone()),
            SqliteValue::Blob(_) => {
                return Err(Error::mismatched_types("serde_json::Value", "BLOB"));
            }
        })
    }
}
