use litebind::{ErrorKind, SqliteArgumentValue, SqliteValue};
use litebind_test::{new, test_type};

test_type!(null<Option<i32>>(
    "NULL" == None::<i32>
));

test_type!(bool("FALSE" == false, "TRUE" == true));

test_type!(i32("94101" == 94101_i32, "-1" == -1_i32));

test_type!(i64("9358295312" == 9358295312_i64));

test_type!(u32("4294967295" == u32::MAX));

// NOTE: This behavior can be surprising. Floating-point parameters are widening to double which can
//       result in strange rounding.
test_type!(f32("3.1410000324249268" == 3.141_f32));

test_type!(f64("939399419.1225182" == 939399419.1225182_f64));

test_type!(str<String>(
    "'this is foo'" == "this is foo",
    "cast(x'7468697320006973206E756C2D636F6E7461696E696E67' as text)" == "this \0is nul-containing",
    "''" == ""
));

test_type!(bytes<Vec<u8>>(
    "X'DEADBEEF'"
        == vec![0xDE_u8, 0xAD, 0xBE, 0xEF],
    "X''"
        == Vec::<u8>::new(),
    "X'0000000052'"
        == vec![0_u8, 0, 0, 0, 0x52]
));

#[cfg(feature = "json")]
mod json_tests {
    use serde_json::{json, Value as JsonValue};

    use litebind_test::test_type;

    test_type!(json<JsonValue>(
        "'Hello, World'" == json!("Hello, World"),
        "42" == json!(42),
        "1.5" == json!(1.5),
        "NULL" == JsonValue::Null
    ));
}

#[test]
fn it_round_trips_values_bit_exactly() -> anyhow::Result<()> {
    let conn = new()?;

    let values = [
        SqliteValue::Integer(i64::MIN),
        SqliteValue::Integer(i64::MAX),
        SqliteValue::Float(f64::MIN_POSITIVE),
        SqliteValue::Float(1.0e-300),
        SqliteValue::Float(f64::MAX),
        SqliteValue::Float(-0.0),
        SqliteValue::Float(f64::INFINITY),
        SqliteValue::Float(f64::NEG_INFINITY),
        SqliteValue::Text("🦀 crab\0tail".into()),
        SqliteValue::Blob(vec![0, 1, 2, 0xff]),
        SqliteValue::Null,
    ];

    let mut s = conn.prepare("SELECT ?")?;

    for value in values {
        s.reset()?;
        s.bind(1, &value)?;

        let row = s.step()?.into_row().expect("expected a row");
        let returned: SqliteValue = row.try_get(0)?;

        match (&value, &returned) {
            (SqliteValue::Float(a), SqliteValue::Float(b)) => assert_eq!(a.to_bits(), b.to_bits()),
            _ => assert_eq!(value, returned),
        }
    }

    // NaN would come back as NULL
    s.reset()?;
    let err = s.bind(1, f64::NAN).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(
        s.bind(1, SqliteValue::Float(f64::NAN)).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );

    Ok(())
}

#[test]
fn it_refuses_to_narrow_floats() -> anyhow::Result<()> {
    let conn = new()?;

    let mut s = conn.prepare("SELECT 1e300, 0.5")?;
    let row = s.step()?.into_row().expect("expected a row");

    assert_eq!(row.try_get::<f32, _>(0).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(row.try_get::<f64, _>(0)?, 1e300);
    assert_eq!(row.try_get::<f32, _>(1)?, 0.5);

    Ok(())
}

#[test]
fn it_binds_argument_values_directly() -> anyhow::Result<()> {
    let conn = new()?;

    let mut s = conn.prepare("SELECT ?, typeof(?)")?;
    s.bind(1, SqliteArgumentValue::Double(0.25))?;
    s.bind(2, SqliteArgumentValue::Blob(vec![1_u8].into()))?;

    let row = s.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<f64, _>(0), 0.25);
    assert_eq!(row.get::<&str, _>(1), "blob");

    Ok(())
}

#[test]
fn it_refuses_to_narrow_integers() -> anyhow::Result<()> {
    let conn = new()?;

    let mut s = conn.prepare("SELECT 256, -1, 3000000000")?;
    let row = s.step()?.into_row().expect("expected a row");

    let err = row.try_get::<u8, _>(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);
    assert_eq!(err.to_string(), "integer value 256 does not fit in `u8`");

    assert_eq!(row.try_get::<u64, _>(1).unwrap_err().kind(), ErrorKind::Overflow);
    assert_eq!(row.try_get::<i32, _>(2).unwrap_err().kind(), ErrorKind::Overflow);
    assert_eq!(row.try_get::<i64, _>(2)?, 3_000_000_000);

    // no wider storage than i64
    let mut s = conn.prepare("SELECT ?")?;
    assert_eq!(s.bind(1, u64::MAX).unwrap_err().kind(), ErrorKind::Overflow);
    s.bind(1, u64::try_from(i64::MAX)?)?;

    Ok(())
}

#[test]
fn it_never_converts_between_storage_classes() -> anyhow::Result<()> {
    let conn = new()?;

    let mut s = conn.prepare("SELECT '42', 4.5, 7, x'00'")?;
    let row = s.step()?.into_row().expect("expected a row");

    // TEXT is not parsed
    let err = row.try_get::<i64, _>(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(err.to_string(), "mismatched types: expected i64, found TEXT");

    // REAL does not narrow
    assert_eq!(row.try_get::<i64, _>(1).unwrap_err().kind(), ErrorKind::TypeMismatch);

    // INTEGER widens
    assert_eq!(row.try_get::<f64, _>(2)?, 7.0);
    assert_eq!(row.try_get::<String, _>(2).unwrap_err().kind(), ErrorKind::TypeMismatch);

    assert_eq!(row.try_get::<&str, _>(3).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(row.try_get::<&[u8], _>(3)?, &[0][..]);

    Ok(())
}
