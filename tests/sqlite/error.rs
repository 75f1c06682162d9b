use std::error::Error as _;

use litebind::{Error, ErrorKind, Resource, SqliteConnectOptions, SqliteConnection};
use litebind_test::memory;

#[test]
fn it_fails_with_unique_violation() -> anyhow::Result<()> {
    let conn = memory()?;
    conn.execute_batch("CREATE TABLE tweet (id INTEGER PRIMARY KEY, text TEXT NOT NULL)")?;
    conn.execute_batch("INSERT INTO tweet VALUES (1, 'Foo')")?;

    let res = conn.execute_batch("INSERT INTO tweet VALUES (1, 'Bar')");
    let err = res.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Engine);

    let err = err.as_sqlite_error().expect("an engine error");
    assert!(err.is_constraint_violation());
    assert!(!err.is_busy());
    // SQLITE_CONSTRAINT_PRIMARYKEY
    assert_eq!(err.code(), 1555);
    assert_eq!(err.primary_code(), 19);
    assert_eq!(err.message(), "UNIQUE constraint failed: tweet.id");
    assert_eq!(
        err.to_string(),
        "(code: 1555) UNIQUE constraint failed: tweet.id"
    );

    Ok(())
}

#[test]
fn it_fails_with_not_null_violation() -> anyhow::Result<()> {
    let conn = memory()?;
    conn.execute_batch("CREATE TABLE tweet (id INTEGER PRIMARY KEY, text TEXT NOT NULL)")?;

    let mut insert = conn.prepare("INSERT INTO tweet (text) VALUES (?)")?;
    insert.bind(1, Option::<&str>::None)?;

    let err = insert.execute().unwrap_err();
    let sqlite = err.as_sqlite_error().expect("an engine error");

    // SQLITE_CONSTRAINT_NOTNULL
    assert_eq!(sqlite.code(), 1299);
    assert_eq!(sqlite.message(), "NOT NULL constraint failed: tweet.text");

    Ok(())
}

#[test]
fn it_reports_extended_codes_only_when_asked() -> anyhow::Result<()> {
    let conn = litebind_test::connect_with(
        &SqliteConnectOptions::new()
            .in_memory(true)
            .extended_result_codes(false),
    )?;
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")?;
    conn.execute_batch("INSERT INTO t VALUES (1)")?;

    let mut insert = conn.prepare("INSERT INTO t VALUES (1)")?;
    let err = insert.step().unwrap_err();

    // the extended code is always reported, the primary one is what the engine returned
    assert_eq!(err.as_sqlite_error().map(|e| e.primary_code()), Some(19));

    Ok(())
}

#[test]
fn it_classifies_every_error() -> anyhow::Result<()> {
    let conn = memory()?;

    let err = conn.prepare("SELECT FROM").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.source().is_some());
    assert!(err.to_string().starts_with("failed to prepare statement: (code: 1) "));

    let mut s = conn.prepare("SELECT 1 AS one")?;
    let row = s.step()?.into_row().expect("expected a row");

    let err = row.try_get::<i64, _>(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    assert_eq!(
        err.to_string(),
        "column index out of bounds: the len is 1, but the index is 1"
    );

    let err = row.try_get::<i64, _>("two").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    assert!(matches!(&err, Error::ColumnNotFound(name) if name == "two"));

    let err = row.try_get::<String, _>("one").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(err.as_sqlite_error(), None);

    let mut wide = conn.prepare("SELECT 1000")?;
    let row = wide.step()?.into_row().expect("expected a row");
    assert!(matches!(
        row.try_get::<i8, _>(0),
        Err(Error::Overflow {
            value: 1000,
            target: "i8"
        })
    ));
    wide.finalize();

    s.finalize();
    let err = s.step().unwrap_err();
    assert!(matches!(err, Error::UseAfterDispose(Resource::Statement)));
    assert_eq!(err.to_string(), "statement used after it was closed");

    conn.close()?;
    let err = conn.prepare("SELECT 1").unwrap_err();
    assert!(matches!(err, Error::UseAfterDispose(Resource::Connection)));

    Ok(())
}

#[test]
fn it_fails_to_parse_options() {
    for url in [
        "",
        "sqlite://a.db?mode=bogus",
        "sqlite://a.db?cache=bogus",
        "sqlite://a.db?immutable=maybe",
        "sqlite://a.db?unknown=1",
    ] {
        let err = SqliteConnection::open(url).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{url:?}");
    }

    let err = "sqlite://a.db?mode=bogus"
        .parse::<SqliteConnectOptions>()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "error with configuration: unknown value \"bogus\" for `mode`"
    );

    for (url, message) in [
        (
            "sqlite://a.db?cache=bogus",
            "unknown value \"bogus\" for `cache`",
        ),
        (
            "sqlite://a.db?immutable=maybe",
            "unknown value \"maybe\" for `immutable`",
        ),
        (
            "sqlite://a.db?unknown=1",
            "unknown query parameter `unknown` while parsing connection URI",
        ),
    ] {
        let err = url.parse::<SqliteConnectOptions>().unwrap_err();
        assert_eq!(err.to_string(), format!("error with configuration: {message}"));
    }
}

#[test]
fn it_rejects_nul_bytes_in_names() -> anyhow::Result<()> {
    let conn = memory()?;
    conn.execute_batch("CREATE TABLE t (data BLOB)")?;

    let err = conn.open_blob("t\0", "data", 1, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(
        err.to_string(),
        "error with configuration: \"t\\0\" contains a nul byte"
    );

    let s = conn.prepare("SELECT :a")?;
    assert_eq!(s.parameter_index("a\0b")?, None);

    Ok(())
}

#[test]
fn it_keeps_the_engine_error_as_source() -> anyhow::Result<()> {
    let err = SqliteConnection::open("sqlite:///please_do_not_run_litebind_tests_as_root/x/y.db")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Open);

    let source = err.source().expect("a source error");
    assert!(source.to_string().starts_with("(code: 14) "));

    Ok(())
}
