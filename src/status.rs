//! Runtime counters maintained by SQLite.
//!
//! A counter is a snapshot: it only changes when [`update()`][SqliteStat::update] is called.
//!
//! <https://www.sqlite.org/c3ref/status.html>
//! <https://www.sqlite.org/c3ref/db_status.html>

use std::borrow::Cow;
use std::os::raw::c_int;

use libsqlite3_sys::{
    sqlite3_db_status, sqlite3_status64, SQLITE_DBSTATUS_CACHE_HIT, SQLITE_DBSTATUS_CACHE_MISS,
    SQLITE_DBSTATUS_CACHE_USED, SQLITE_DBSTATUS_CACHE_WRITE, SQLITE_DBSTATUS_DEFERRED_FKS,
    SQLITE_DBSTATUS_LOOKASIDE_HIT, SQLITE_DBSTATUS_LOOKASIDE_MISS_FULL,
    SQLITE_DBSTATUS_LOOKASIDE_MISS_SIZE, SQLITE_DBSTATUS_LOOKASIDE_USED,
    SQLITE_DBSTATUS_SCHEMA_USED, SQLITE_DBSTATUS_STMT_USED, SQLITE_OK,
    SQLITE_STATUS_MALLOC_COUNT, SQLITE_STATUS_MALLOC_SIZE, SQLITE_STATUS_MEMORY_USED,
    SQLITE_STATUS_PAGECACHE_OVERFLOW, SQLITE_STATUS_PAGECACHE_SIZE, SQLITE_STATUS_PAGECACHE_USED,
    SQLITE_STATUS_PARSER_STACK,
};

use crate::error::{Error, Result};
use crate::{SqliteConnection, SqliteError};

macro_rules! status_ops {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($label:literal, $code:ident),)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                }
            }

            pub fn code(&self) -> i32 {
                match self {
                    $($name::$variant => $code,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some($name::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

status_ops! {
    /// Process-wide counters, read with `sqlite3_status64()`.
    pub enum StatusOp {
        MemoryUsed => ("memory_used", SQLITE_STATUS_MEMORY_USED),
        PagecacheUsed => ("pagecache_used", SQLITE_STATUS_PAGECACHE_USED),
        PagecacheOverflow => ("pagecache_overflow", SQLITE_STATUS_PAGECACHE_OVERFLOW),
        MallocSize => ("malloc_size", SQLITE_STATUS_MALLOC_SIZE),
        ParserStack => ("parser_stack", SQLITE_STATUS_PARSER_STACK),
        PagecacheSize => ("pagecache_size", SQLITE_STATUS_PAGECACHE_SIZE),
        MallocCount => ("malloc_count", SQLITE_STATUS_MALLOC_COUNT),
    }
}

status_ops! {
    /// Per-connection counters, read with `sqlite3_db_status()`.
    pub enum DbStatusOp {
        LookasideUsed => ("lookaside_used", SQLITE_DBSTATUS_LOOKASIDE_USED),
        CacheUsed => ("cache_used", SQLITE_DBSTATUS_CACHE_USED),
        SchemaUsed => ("schema_used", SQLITE_DBSTATUS_SCHEMA_USED),
        StmtUsed => ("stmt_used", SQLITE_DBSTATUS_STMT_USED),
        LookasideHit => ("lookaside_hit", SQLITE_DBSTATUS_LOOKASIDE_HIT),
        LookasideMissSize => ("lookaside_miss_size", SQLITE_DBSTATUS_LOOKASIDE_MISS_SIZE),
        LookasideMissFull => ("lookaside_miss_full", SQLITE_DBSTATUS_LOOKASIDE_MISS_FULL),
        CacheHit => ("cache_hit", SQLITE_DBSTATUS_CACHE_HIT),
        CacheMiss => ("cache_miss", SQLITE_DBSTATUS_CACHE_MISS),
        CacheWrite => ("cache_write", SQLITE_DBSTATUS_CACHE_WRITE),
        DeferredFks => ("deferred_fks", SQLITE_DBSTATUS_DEFERRED_FKS),
    }
}

/// A process-wide SQLite counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStat {
    name: Cow<'static, str>,
    code: c_int,
    current: i64,
    highwater: i64,
}

impl SqliteStat {
    pub fn new(op: StatusOp) -> Self {
        Self::with_code(op.name(), op.code())
    }

    /// A counter for any `SQLITE_STATUS_*` code, including ones not in [`StatusOp`].
    pub fn with_code(name: impl Into<Cow<'static, str>>, code: i32) -> Self {
        Self {
            name: name.into(),
            code,
            current: 0,
            highwater: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    /// The value observed by the last successful update.
    pub fn current(&self) -> i64 {
        self.current
    }

    /// The highwater mark observed by the last successful update.
    pub fn highwater(&self) -> i64 {
        self.highwater
    }

    /// Read the counter.
    ///
    /// With `reset_highwater`, SQLite resets the highwater mark to the current value and the
    /// mark stored here is the one after the reset. On failure neither field changes.
    pub fn update(&mut self, reset_highwater: bool) -> Result<()> {
        let (current, highwater) = status64(self.code, reset_highwater)?;

        let (current, highwater) = if reset_highwater {
            status64(self.code, false)?
        } else {
            (current, highwater)
        };

        self.current = current;
        self.highwater = highwater;

        Ok(())
    }
}

fn status64(code: c_int, reset: bool) -> Result<(i64, i64)> {
    let mut current = 0;
    let mut highwater = 0;

    // https://www.sqlite.org/c3ref/status.html
    let status =
        unsafe { sqlite3_status64(code, &mut current, &mut highwater, c_int::from(reset)) };

    if status != SQLITE_OK {
        return Err(Error::Engine(SqliteError::from_code(status)));
    }

    Ok((current, highwater))
}

/// A per-connection SQLite counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteDbStat {
    name: Cow<'static, str>,
    code: c_int,
    current: i64,
    highwater: i64,
}

impl SqliteDbStat {
    pub fn new(op: DbStatusOp) -> Self {
        Self::with_code(op.name(), op.code())
    }

    pub fn with_code(name: impl Into<Cow<'static, str>>, code: i32) -> Self {
        Self {
            name: name.into(),
            code,
            current: 0,
            highwater: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    /// Not every counter has a highwater mark; those report 0.
    pub fn highwater(&self) -> i64 {
        self.highwater
    }

    /// Read the counter for `conn`, with the same reset contract as [`SqliteStat::update`].
    pub fn update(&mut self, conn: &SqliteConnection, reset_highwater: bool) -> Result<()> {
        let db = conn.as_ptr()?;

        let read = |reset: bool| -> Result<(i64, i64)> {
            let mut current: c_int = 0;
            let mut highwater: c_int = 0;

            // https://www.sqlite.org/c3ref/db_status.html
            let status = unsafe {
                sqlite3_db_status(
                    db,
                    self.code,
                    &mut current,
                    &mut highwater,
                    c_int::from(reset),
                )
            };

            if status != SQLITE_OK {
                return Err(Error::Engine(SqliteError::from_code(status)));
            }

            Ok((i64::from(current), i64::from(highwater)))
        };

        let (current, highwater) = read(reset_highwater)?;

        let (current, highwater) = if reset_highwater {
            read(false)?
        } else {
            (current, highwater)
        };

        self.current = current;
        self.highwater = highwater;

        Ok(())
    }
}
