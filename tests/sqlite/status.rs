use litebind::{DbStatusOp, ErrorKind, SqliteDbStat, SqliteStat, StatusOp};
use litebind_test::memory;

#[test]
fn it_reads_process_counters() -> anyhow::Result<()> {
    let _conn = memory()?;

    for op in StatusOp::ALL {
        let mut stat = SqliteStat::new(*op);
        assert_eq!(stat.name(), op.name());

        stat.update(false)?;
        assert!(stat.highwater() >= stat.current(), "{stat:?}");

        stat.update(true)?;
        assert!(stat.highwater() >= stat.current(), "{stat:?}");
    }

    let mut stat = SqliteStat::new(StatusOp::MallocCount);
    stat.update(false)?;
    assert!(stat.current() >= 0);

    Ok(())
}

#[test]
fn it_reads_connection_counters() -> anyhow::Result<()> {
    let conn = memory()?;

    conn.execute_batch(
        r#"
CREATE TABLE t (a);
INSERT INTO t VALUES (1), (2), (3);
        "#,
    )?;

    let mut s = conn.prepare("SELECT * FROM t")?;
    s.fetch_all()?;

    let mut stmt_used = SqliteDbStat::new(DbStatusOp::StmtUsed);
    stmt_used.update(&conn, false)?;
    // one statement is still live
    assert!(stmt_used.current() > 0);

    let mut schema_used = SqliteDbStat::new(DbStatusOp::SchemaUsed);
    schema_used.update(&conn, false)?;
    assert!(schema_used.current() > 0);

    let mut lookaside = SqliteDbStat::new(DbStatusOp::LookasideUsed);
    lookaside.update(&conn, false)?;
    let before = lookaside.clone();

    lookaside.update(&conn, true)?;
    assert!(lookaside.highwater() <= before.highwater());
    assert!(lookaside.highwater() >= lookaside.current());

    // an unknown operation leaves the previous snapshot in place
    let mut bogus = SqliteDbStat::with_code("bogus", 12345);
    let err = bogus.update(&conn, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!((bogus.current(), bogus.highwater()), (0, 0));

    s.finalize();
    conn.close()?;

    let err = stmt_used.update(&conn, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UseAfterDispose);
    assert!(stmt_used.current() > 0);

    Ok(())
}
