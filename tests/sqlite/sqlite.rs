use std::sync::{Arc, Mutex};
use std::time::Duration;

use litebind::{
    Affinity, ColumnOrigin, ErrorKind, SqliteConnectOptions, SqliteConnection, SqliteValue,
    StatementState, Step, StringTap,
};
use litebind_test::{memory, new};

#[test]
fn it_connects() -> anyhow::Result<()> {
    let conn = new()?;
    assert!(!conn.is_closed());

    conn.close()?;
    assert!(conn.is_closed());

    Ok(())
}

#[test]
fn it_fails_to_connect() -> anyhow::Result<()> {
    // empty connection string
    assert!(SqliteConnection::open("").is_err());

    let err = SqliteConnection::open("sqlite:///please_do_not_run_litebind_tests_as_root/a.db")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);

    Ok(())
}

#[test]
fn it_runs_the_basic_scenario() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut create = conn.prepare("CREATE TABLE t(a INTEGER, b TEXT)")?;
    assert!(create.step()?.is_done());
    create.finalize();

    let mut insert = conn.prepare("INSERT INTO t VALUES (?, ?)")?;
    insert.bind(1, SqliteValue::Integer(42))?;
    insert.bind(2, SqliteValue::Text("hi".into()))?;
    assert!(insert.step()?.is_done());
    assert_eq!(conn.changes()?, 1);
    insert.finalize();

    let mut select = conn.prepare("SELECT a, b FROM t")?;

    let row = select.step()?.into_row().expect("expected a row");
    assert_eq!(row.len(), 2);
    assert_eq!(row.get::<SqliteValue, _>(0), SqliteValue::Integer(42));
    assert_eq!(row.get::<SqliteValue, _>(1), SqliteValue::Text("hi".into()));

    assert!(select.step()?.is_done());
    assert_eq!(select.state(), StatementState::Done);

    Ok(())
}

#[test]
fn it_executes_with_side_effects_once() -> anyhow::Result<()> {
    let conn = memory()?;

    conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY)")?;

    for index in 1..=10_i32 {
        let mut insert = conn.prepare("INSERT INTO users (id) VALUES (?)")?;
        insert.bind(1, index)?;

        assert_eq!(insert.execute()?, 1);
        assert_eq!(conn.last_insert_rowid()?, i64::from(index));
    }

    let rows = conn.prepare("SELECT id FROM users")?.fetch_all()?;
    let sum: i32 = rows.iter().map(|row| row.get::<i32, _>(0)).sum();

    assert_eq!(rows.len(), 10);
    assert_eq!(sum, 55);

    Ok(())
}

#[test]
fn it_can_execute_multiple_statements() -> anyhow::Result<()> {
    let conn = memory()?;

    conn.execute_batch(
        r#"
CREATE TABLE users (id INTEGER PRIMARY KEY, other INTEGER);
INSERT INTO users DEFAULT VALUES;
INSERT INTO users (other) VALUES (2);
        "#,
    )?;

    let mut count = conn.prepare("SELECT COUNT(*) FROM users")?;
    let row = count.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<i64, _>(0), 2);

    Ok(())
}

#[test]
fn it_reports_the_unconsumed_tail() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut s = conn.prepare("SELECT 1;  SELECT 2; ")?;
    assert_eq!(s.sql(), "SELECT 1;");
    assert_eq!(s.tail(), "SELECT 2;");

    assert_eq!(s.step()?.into_row().expect("row").get::<i64, _>(0), 1);

    let s = conn.prepare("SELECT 1")?;
    assert_eq!(s.tail(), "");

    Ok(())
}

#[test]
fn it_treats_empty_input_as_a_no_op() -> anyhow::Result<()> {
    let conn = memory()?;

    for sql in ["", "   ", "-- just a comment", "/* block */ "] {
        let mut s = conn.prepare(sql)?;

        assert_eq!(s.column_count()?, 0);
        assert_eq!(s.parameter_count()?, 0);
        assert!(s.read_only()?);

        assert!(s.step()?.is_done());
        assert_eq!(s.state(), StatementState::Done);

        // a bare `?` is not there to bind
        s.reset()?;
        assert_eq!(s.state(), StatementState::Ready);
        assert_eq!(s.bind(1, 1_i64).unwrap_err().kind(), ErrorKind::IndexOutOfRange);
    }

    Ok(())
}

#[test]
fn it_fails_to_prepare_invalid_sql() -> anyhow::Result<()> {
    let conn = memory()?;

    let err = conn.prepare("SEELCT 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(
        err.as_sqlite_error().map(|e| e.message()),
        Some("near \"SEELCT\": syntax error")
    );

    let err = conn.prepare("SELECT * FROM no_such_table").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);

    // nothing was created
    assert_eq!(conn.live_statements(), 0);

    Ok(())
}

#[test]
fn it_enforces_the_statement_state_machine() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut s = conn.prepare("SELECT ?1 UNION ALL SELECT ?1 + 1")?;
    assert_eq!(s.state(), StatementState::Ready);

    s.bind(1, 10_i64)?;
    assert_eq!(s.state(), StatementState::Bound);

    assert!(matches!(s.step()?, Step::Row(_)));
    assert_eq!(s.state(), StatementState::Executing);

    // binding while executing is illegal
    let err = s.bind(1, 20_i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(s.clear_bindings().unwrap_err().kind(), ErrorKind::InvalidState);

    assert!(matches!(s.step()?, Step::Row(_)));
    assert!(s.step()?.is_done());
    assert_eq!(s.state(), StatementState::Done);

    // must reset before stepping again
    let err = s.step().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(err.to_string(), "cannot step a statement in the Done state");
    assert_eq!(s.bind(1, 20_i64).unwrap_err().kind(), ErrorKind::InvalidState);

    // bindings survive a reset
    s.reset()?;
    assert_eq!(s.state(), StatementState::Bound);

    let row = s.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<i64, _>(0), 10);

    // and can be replaced after one
    s.reset()?;
    s.bind(1, 20_i64)?;
    let row = s.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<i64, _>(0), 20);

    s.reset()?;
    s.clear_bindings()?;
    assert_eq!(s.state(), StatementState::Ready);
    let row = s.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<Option<i64>, _>(0), None);

    Ok(())
}

#[test]
fn it_rejects_use_after_finalize() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut s = conn.prepare("SELECT ?")?;
    assert_eq!(conn.live_statements(), 1);

    s.finalize();
    assert_eq!(s.state(), StatementState::Finalized);
    assert_eq!(conn.live_statements(), 0);

    // idempotent
    s.finalize();
    assert_eq!(conn.live_statements(), 0);

    assert_eq!(s.step().unwrap_err().kind(), ErrorKind::UseAfterDispose);
    assert_eq!(s.bind(1, 1_i64).unwrap_err().kind(), ErrorKind::UseAfterDispose);
    assert_eq!(s.reset().unwrap_err().kind(), ErrorKind::UseAfterDispose);
    assert_eq!(s.column_count().unwrap_err().kind(), ErrorKind::UseAfterDispose);
    assert_eq!(s.parameter_count().unwrap_err().kind(), ErrorKind::UseAfterDispose);

    Ok(())
}

#[test]
fn it_resolves_parameters() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut s = conn.prepare("SELECT :a, @b, $c, ?")?;
    assert_eq!(s.parameter_count()?, 4);

    assert_eq!(s.parameter_name(1)?, Some(":a"));
    assert_eq!(s.parameter_name(4)?, None);

    assert_eq!(s.parameter_index(":a")?, Some(1));
    assert_eq!(s.parameter_index("a")?, Some(1));
    assert_eq!(s.parameter_index("b")?, Some(2));
    assert_eq!(s.parameter_index("$c")?, Some(3));
    assert_eq!(s.parameter_index("d")?, None);

    s.bind("a", 1_i64)?;
    s.bind("@b", "two")?;
    s.bind(String::from("c"), 3.5_f64)?;
    s.bind(4, Option::<i64>::None)?;

    let err = s.bind(0, 1_i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);

    let err = s.bind(5, 1_i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    assert_eq!(
        err.to_string(),
        "parameter index out of range: the count is 4, but the index is 5"
    );

    let err = s.bind("nope", 1_i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);

    let row = s.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<i64, _>(":a"), 1);
    assert_eq!(row.get::<&str, _>(1), "two");
    assert_eq!(row.get::<f64, _>(2), 3.5);
    assert_eq!(row.get::<Option<i64>, _>(3), None);

    Ok(())
}

#[test]
fn it_decodes_per_value_not_per_column() -> anyhow::Result<()> {
    let conn = memory()?;

    conn.execute_batch(
        r#"
CREATE TABLE mixed (v INTEGER);
INSERT INTO mixed VALUES (1), (2.5), ('three'), (x'04'), (NULL);
        "#,
    )?;

    let rows = conn.prepare("SELECT v FROM mixed ORDER BY rowid")?.fetch_all()?;

    let values: Vec<SqliteValue> = rows.iter().map(|row| row.get(0)).collect();

    assert_eq!(
        values,
        vec![
            SqliteValue::Integer(1),
            SqliteValue::Float(2.5),
            SqliteValue::Text("three".into()),
            SqliteValue::Blob(vec![4]),
            SqliteValue::Null,
        ]
    );

    // the declared type does not change the storage class of a value
    assert_eq!(rows[2].try_get::<i64, _>(0).unwrap_err().kind(), ErrorKind::TypeMismatch);

    Ok(())
}

#[test]
fn it_describes_columns() -> anyhow::Result<()> {
    let conn = memory()?;

    conn.execute_batch(
        r#"
CREATE TABLE describe_test (
    _1 int primary key,
    _2 text not null,
    _3 blob,
    _4 boolean,
    _5 float,
    _6 varchar(255)
);
        "#,
    )?;

    let s = conn.prepare("SELECT *, _1 + 1 AS expr FROM describe_test")?;
    assert_eq!(s.column_count()?, 7);

    let columns = s.columns()?;

    assert_eq!(columns[0].name(), "_1");
    assert_eq!(columns[0].ordinal(), 0);
    // the engine may normalize the case of the declared type
    assert!(columns[0]
        .decl_type()
        .is_some_and(|decl| decl.eq_ignore_ascii_case("int")));
    assert_eq!(columns[0].affinity(), Affinity::Integer);
    assert_eq!(
        columns[0].origin(),
        Some(&ColumnOrigin {
            database: "main".into(),
            table: "describe_test".into(),
            column: "_1".into(),
        })
    );

    assert_eq!(columns[1].affinity(), Affinity::Text);
    assert_eq!(columns[2].affinity(), Affinity::Blob);
    assert_eq!(columns[3].affinity(), Affinity::Numeric);
    assert_eq!(columns[4].affinity(), Affinity::Real);
    assert_eq!(s.column_decltype(5)?, Some("varchar(255)"));

    assert_eq!(s.column_name(6)?, "expr");
    assert_eq!(s.column_decltype(6)?, None);
    assert_eq!(columns[6].origin(), None);

    let err = s.column_name(7).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);

    Ok(())
}

#[test]
fn it_reports_read_only_statements() -> anyhow::Result<()> {
    let conn = memory()?;
    conn.execute_batch("CREATE TABLE t (a)")?;

    assert!(conn.prepare("SELECT * FROM t")?.read_only()?);
    assert!(!conn.prepare("INSERT INTO t VALUES (1)")?.read_only()?);

    Ok(())
}

#[test]
fn it_fails_to_decode_invalid_utf8() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut s = conn.prepare("SELECT CAST(x'ff' AS TEXT) UNION ALL SELECT 'ok'")?;

    let err = s.step().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);

    // the cursor moved past the bad row
    assert_eq!(s.state(), StatementState::Executing);

    let row = s.step()?.into_row().expect("expected a row");
    assert_eq!(row.get::<&str, _>(0), "ok");

    Ok(())
}

#[test]
fn it_surfaces_engine_errors_without_retrying() -> anyhow::Result<()> {
    let conn = memory()?;
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE)")?;

    let mut insert = conn.prepare("INSERT INTO t (name) VALUES (?)")?;
    insert.bind(1, "a")?;
    insert.execute()?;

    insert.reset()?;
    let err = insert.step().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);

    let sqlite = err.as_sqlite_error().expect("an engine error");
    assert!(sqlite.is_constraint_violation());
    // SQLITE_CONSTRAINT_UNIQUE
    assert_eq!(sqlite.code(), 2067);
    assert_eq!(insert.state(), StatementState::Done);

    // reset reports the failure of the last run but still rewinds
    assert!(insert.reset().is_err());
    assert_eq!(insert.state(), StatementState::Bound);

    insert.bind(1, "b")?;
    assert_eq!(insert.execute()?, 1);

    Ok(())
}

#[test]
fn it_counts_changed_rows() -> anyhow::Result<()> {
    let conn = memory()?;
    conn.execute_batch(
        r#"
CREATE TABLE t (a INTEGER);
INSERT INTO t VALUES (1), (2), (3);
        "#,
    )?;

    let mut update = conn.prepare("UPDATE t SET a = a + 1 WHERE a > 1")?;
    assert!(update.step()?.is_done());
    assert_eq!(conn.changes()?, 2);

    update.reset()?;
    assert_eq!(update.execute()?, 2);

    // queries leave the count of the last change alone
    let mut select = conn.prepare("SELECT a FROM t")?;
    assert_eq!(select.execute()?, 0);
    assert_eq!(conn.changes()?, 2);

    Ok(())
}

#[test]
fn it_refuses_to_close_with_open_statements() -> anyhow::Result<()> {
    let conn = memory()?;

    let mut s = conn.prepare("SELECT 1")?;

    let err = conn.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourcesStillOpen);
    assert!(!conn.is_closed());

    // still usable
    assert!(matches!(s.step()?, Step::Row(_)));

    s.finalize();
    conn.close()?;

    // idempotent
    conn.close()?;

    assert_eq!(conn.prepare("SELECT 1").unwrap_err().kind(), ErrorKind::UseAfterDispose);
    assert_eq!(conn.execute_batch("SELECT 1").unwrap_err().kind(), ErrorKind::UseAfterDispose);
    assert_eq!(conn.changes().unwrap_err().kind(), ErrorKind::UseAfterDispose);

    Ok(())
}

#[test]
fn it_tracks_transactions() -> anyhow::Result<()> {
    let conn = memory()?;

    assert!(!conn.in_transaction()?);

    conn.execute_batch("BEGIN")?;
    assert!(conn.in_transaction()?);

    conn.execute_batch("ROLLBACK")?;
    assert!(!conn.in_transaction()?);

    Ok(())
}

#[test]
fn it_applies_pragmas_on_connect() -> anyhow::Result<()> {
    let conn = litebind_test::connect_with(
        &SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true)
            .pragma("user_version", "7"),
    )?;

    let mut s = conn.prepare("PRAGMA foreign_keys")?;
    assert_eq!(s.step()?.into_row().expect("row").get::<i64, _>(0), 1);

    let mut s = conn.prepare("PRAGMA user_version")?;
    assert_eq!(s.step()?.into_row().expect("row").get::<i64, _>(0), 7);

    Ok(())
}

#[test]
fn it_opens_files_with_modes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("modes.db");
    let url = format!("sqlite://{}", path.display());

    // `mode=rw` does not create the file
    let err = SqliteConnection::open(&format!("{url}?mode=rw")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);

    let conn = SqliteConnection::open(&url)?;
    conn.execute_batch("CREATE TABLE t (a); INSERT INTO t VALUES (1);")?;
    conn.close()?;

    let conn = SqliteConnection::open(&format!("{url}?mode=ro"))?;

    let mut s = conn.prepare("SELECT a FROM t")?;
    assert_eq!(s.step()?.into_row().expect("row").get::<i64, _>(0), 1);
    s.finalize();

    let err = conn.execute_batch("INSERT INTO t VALUES (2)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);

    Ok(())
}

#[test]
fn it_profiles_statements() -> anyhow::Result<()> {
    let conn = litebind_test::connect_with(
        &SqliteConnectOptions::new()
            .in_memory(true)
            .log_statements(log::LevelFilter::Trace)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(30)),
    )?;

    let tap = Arc::new(Mutex::new(StringTap::default()));
    conn.set_profile_tap(Arc::clone(&tap));

    for _ in 0..3 {
        let mut s = conn.prepare("SELECT 1")?;
        while let Step::Row(_) = s.step()? {}
    }

    // a statement that is finalized before it finishes still reports
    let mut s = conn.prepare("SELECT 2 UNION ALL SELECT 3")?;
    s.step()?;
    s.finalize();

    assert!(conn.clear_profile_tap().is_some());

    // no longer observed
    conn.prepare("SELECT 4")?.execute()?;

    let mut tap = tap.lock().unwrap();

    assert_eq!(tap.sampler("SELECT 1").map(|s| s.count()), Some(3));
    assert_eq!(
        tap.sampler("SELECT 2 UNION ALL SELECT 3").map(|s| s.count()),
        Some(1)
    );
    assert!(tap.sampler("SELECT 4").is_none());

    tap.dump_profile()?;

    let contents = tap.contents();
    assert_eq!(contents.lines().filter(|l| l.ends_with(" : SELECT 1")).count(), 3);
    assert!(contents.contains("[SELECT 1] => sum: "));

    Ok(())
}
