use std::env;

use litebind::{SqliteConnectOptions, SqliteConnection};

pub fn setup_if_needed() {
    let _ = dotenvy::dotenv();
    let _ = env_logger::builder().is_test(true).try_init();
}

// Make a new connection to `DATABASE_URL`, or to a fresh in-memory database if unset
// Ensure [dotenvy] and [env_logger] have been setup
pub fn new() -> anyhow::Result<SqliteConnection> {
    setup_if_needed();

    let url = env::var("DATABASE_URL").unwrap_or_else(|_| String::from("sqlite::memory:"));

    Ok(SqliteConnection::open(&url)?)
}

// Always a private in-memory database, for tests that create tables
pub fn memory() -> anyhow::Result<SqliteConnection> {
    connect_with(&SqliteConnectOptions::new().in_memory(true))
}

pub fn connect_with(options: &SqliteConnectOptions) -> anyhow::Result<SqliteConnection> {
    setup_if_needed();

    Ok(SqliteConnection::connect_with(options)?)
}

// Test type encoding and decoding
#[macro_export]
macro_rules! test_type {
    ($name:ident<$ty:ty>($sql:literal, $($text:literal == $value:expr),+ $(,)?)) => {
        $crate::__test_prepared_type!($name<$ty>($sql, $($text == $value),+));
        $crate::test_decode_type!($name<$ty>($($text == $value),+));
    };

    ($name:ident<$ty:ty>($($text:literal == $value:expr),+ $(,)?)) => {
        $crate::__test_prepared_type!($name<$ty>("SELECT {0} is ?, {0}, ?", $($text == $value),+));
        $crate::test_decode_type!($name<$ty>($($text == $value),+));
    };

    ($name:ident($($text:literal == $value:expr),+ $(,)?)) => {
        $crate::test_type!($name<$name>($($text == $value),+));
    };
}

// Test type decoding only
#[macro_export]
macro_rules! test_decode_type {
    ($name:ident<$ty:ty>($($text:literal == $value:expr),+ $(,)?)) => {
        paste::item! {
            #[test]
            fn [< test_decode_type_ $name >] () -> anyhow::Result<()> {
                let conn = litebind_test::new()?;

                $(
                    let query = format!("SELECT {}", $text);

                    let mut s = conn.prepare(&query)?;
                    let row = s
                        .step()?
                        .into_row()
                        .ok_or_else(|| anyhow::anyhow!("no row for {:?}", query))?;

                    let rec: $ty = row.try_get(0)?;

                    assert!($value == rec, "decoded {:?} from {:?}", rec, query);
                )+

                Ok(())
            }
        }
    };

    ($name:ident($($text:literal == $value:expr),+ $(,)?)) => {
        $crate::test_decode_type!($name<$name>($($text == $value),+));
    };
}

// Test type encoding and decoding through bound parameters
#[macro_export]
macro_rules! __test_prepared_type {
    ($name:ident<$ty:ty>($sql:literal, $($text:literal == $value:expr),+ $(,)?)) => {
        paste::item! {
            #[test]
            fn [< test_prepared_type_ $name >] () -> anyhow::Result<()> {
                let conn = litebind_test::new()?;

                $(
                    let query = format!($sql, $text);
                    let value = $value;

                    let mut s = conn.prepare(&query)?;
                    s.bind(1, &value)?;
                    s.bind(2, &value)?;

                    let row = s
                        .step()?
                        .into_row()
                        .ok_or_else(|| anyhow::anyhow!("no row for {:?}", query))?;

                    let matches: i32 = row.try_get(0)?;
                    let returned: $ty = row.try_get(1)?;
                    let round_trip: $ty = row.try_get(2)?;

                    assert!(matches != 0,
                            "[1] DB value mismatch; given value: {:?}\n\
                             as returned: {:?}\n\
                             round-trip: {:?}",
                            value, returned, round_trip);

                    assert_eq!(value, returned,
                            "[2] DB value mismatch; given value: {:?}\n\
                                     as returned: {:?}\n\
                                     round-trip: {:?}",
                                    value, returned, round_trip);

                    assert_eq!(value, round_trip,
                            "[3] DB value mismatch; given value: {:?}\n\
                                     as returned: {:?}\n\
                                     round-trip: {:?}",
                                    value, returned, round_trip);
                )+

                Ok(())
            }
        }
    };
}
