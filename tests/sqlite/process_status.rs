//! Process-wide counters are shared by every connection in the process, so these run in a test
//! binary of their own with a single test.

use litebind::{SqliteStat, StatusOp};
use litebind_test::memory;

#[test]
fn it_resets_the_process_highwater_mark() -> anyhow::Result<()> {
    // push the peak well above what stays allocated
    {
        let conn = memory()?;
        conn.execute_batch(
            r#"
CREATE TABLE t (data BLOB);
INSERT INTO t VALUES (zeroblob(65536));
SELECT * FROM t;
            "#,
        )?;
        conn.close()?;
    }

    for op in [StatusOp::MemoryUsed, StatusOp::MallocCount] {
        let mut stat = SqliteStat::new(op);

        stat.update(false)?;
        let before = stat.clone();
        assert!(before.highwater() >= before.current(), "{before:?}");

        stat.update(true)?;
        assert!(stat.highwater() <= before.highwater(), "{before:?} -> {stat:?}");
        assert!(stat.highwater() >= stat.current(), "{stat:?}");
    }

    Ok(())
}
