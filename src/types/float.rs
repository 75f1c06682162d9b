use crate::error::{Error, Result};
use crate::types::{mismatch, Decode, Encode};
use crate::value::{SqliteArgumentValue, SqliteValue};

impl Encode for f32 {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Double(f64::from(*self)))
    }
}

impl Decode<'_> for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn decode(value: &SqliteValue) -> Result<Self> {
        let v = f64::decode(value)?;
        let narrowed = v as f32;

        if narrowed.is_infinite() && v.is_finite() {
            return Err(Error::TypeMismatch(format!(
                "REAL value {v:e} is out of range for f32"
            )));
        }

        Ok(narrowed)
    }
}

impl Encode for f64 {
    fn encode(&self) -> Result<SqliteArgumentValue<'_>> {
        Ok(SqliteArgumentValue::Double(*self))
    }
}

impl Decode<'_> for f64 {
    fn decode(value: &SqliteValue) -> Result<Self> {
        match value {
            SqliteValue::Float(v) => Ok(*v),
            // widening; precision loss above 2^53 is inherent to the target type
            #[allow(clippy::cast_precision_loss)]
            SqliteValue::Integer(v) => Ok(*v as f64),
            _ => Err(mismatch::<f64>(value)),
        }
    }
}
