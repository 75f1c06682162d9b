use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use libsqlite3_sys::sqlite3;

use crate::blob::SqliteBlob;
use crate::error::{Error, Resource, Result};
use crate::logger::LogSettings;
use crate::profile::ProfileTap;
use crate::statement::SqliteStatement;
use crate::SqliteConnectOptions;

pub(crate) use handle::ConnectionHandle;

mod establish;
mod handle;

/// A connection to an open [Sqlite] database.
///
/// The connection is the owner of every [`SqliteStatement`] and [`SqliteBlob`] created from
/// it; both borrow the connection, so neither can outlive it. [`close()`][Self::close] refuses
/// to release the database while any of them is still open.
///
/// A connection is `Send` but not `Sync`: it may move between threads, but it must only be
/// used by one thread at a time.
///
/// [Sqlite]: https://www.sqlite.org/index.html
pub struct SqliteConnection {
    handle: RefCell<Option<ConnectionHandle>>,
    live_statements: Cell<usize>,
    live_blobs: Cell<usize>,
    log_settings: LogSettings,
    blob_inline_threshold: usize,
    profile_tap: RefCell<Option<Box<dyn ProfileTap>>>,
}

impl SqliteConnection {
    /// Open a database from a path, `:memory:` or a `sqlite:` URI.
    ///
    /// See [`SqliteConnectOptions`] for the accepted syntax.
    pub fn open(url: &str) -> Result<Self> {
        Self::connect_with(&SqliteConnectOptions::from_str(url)?)
    }

    pub fn connect_with(options: &SqliteConnectOptions) -> Result<Self> {
        let params = establish::EstablishParams::from_options(options)?;
        let handle = params.establish()?;

        Ok(Self {
            handle: RefCell::new(Some(handle)),
            live_statements: Cell::new(0),
            live_blobs: Cell::new(0),
            log_settings: options.log_settings.clone(),
            blob_inline_threshold: options.blob_inline_threshold,
            profile_tap: RefCell::new(None),
        })
    }

    /// Compile the first statement in `sql`.
    ///
    /// Text after the first statement is not compiled; see [`SqliteStatement::tail()`].
    /// Empty or comment-only input produces a statement that completes immediately.
    pub fn prepare(&self, sql: &str) -> Result<SqliteStatement<'_>> {
        let db = self.as_ptr()?;
        let statement = SqliteStatement::prepare(self, db, sql)?;

        self.live_statements.set(self.live_statements.get() + 1);

        Ok(statement)
    }

    /// Open an incremental I/O stream on a BLOB (or TEXT) cell of the `main` database.
    pub fn open_blob(
        &self,
        table: &str,
        column: &str,
        row_id: i64,
        writable: bool,
    ) -> Result<SqliteBlob<'_>> {
        self.open_blob_in("main", table, column, row_id, writable)
    }

    /// Open an incremental I/O stream on a cell of an attached database.
    pub fn open_blob_in(
        &self,
        database: &str,
        table: &str,
        column: &str,
        row_id: i64,
        writable: bool,
    ) -> Result<SqliteBlob<'_>> {
        let db = self.as_ptr()?;
        let blob = SqliteBlob::open(self, db, database, table, column, row_id, writable)?;

        self.live_blobs.set(self.live_blobs.get() + 1);

        Ok(blob)
    }

    /// Execute every statement in `sql`, discarding any rows.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.trace(sql);

        self.with_handle(|handle| handle.exec(sql))
    }

    /// The rowid of the most recent successful `INSERT` on this connection.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        self.with_handle(|handle| Ok(handle.last_insert_rowid()))
    }

    /// The number of rows changed by the most recently completed `INSERT`, `UPDATE`
    /// or `DELETE` on this connection.
    pub fn changes(&self) -> Result<u64> {
        self.with_handle(|handle| Ok(handle.changes()))
    }

    pub fn in_transaction(&self) -> Result<bool> {
        self.with_handle(|handle| Ok(handle.in_transaction()))
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.handle.borrow().is_none()
    }

    /// Number of statements prepared on this connection and not yet finalized.
    #[inline]
    pub fn live_statements(&self) -> usize {
        self.live_statements.get()
    }

    /// Number of blob streams opened on this connection and not yet closed.
    #[inline]
    pub fn live_blobs(&self) -> usize {
        self.live_blobs.get()
    }

    /// Install a tap that receives the text and execution time of every statement run on
    /// this connection, replacing any previous tap.
    pub fn set_profile_tap(&self, tap: impl ProfileTap + 'static) {
        *self.profile_tap.borrow_mut() = Some(Box::new(tap));
    }

    /// Remove the installed profile tap, returning it.
    pub fn clear_profile_tap(&self) -> Option<Box<dyn ProfileTap>> {
        self.profile_tap.borrow_mut().take()
    }

    /// Close the database.
    ///
    /// Fails with [`Error::ResourcesStillOpen`] while statements or blob streams created from
    /// this connection are still open; the connection stays usable in that case.
    /// Closing an already closed connection is a no-op.
    ///
    /// Dropping the connection closes it as well, but any error is only logged.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.handle.borrow_mut();

        if slot.is_none() {
            return Ok(());
        }

        let statements = self.live_statements.get();
        let blobs = self.live_blobs.get();

        if statements > 0 || blobs > 0 {
            return Err(Error::ResourcesStillOpen { statements, blobs });
        }

        let Some(handle) = slot.take() else {
            return Ok(());
        };

        match handle.close() {
            Ok(()) => {
                tracing::debug!("closed database");
                Ok(())
            }

            Err((handle, error)) => {
                *slot = Some(handle);
                Err(Error::Engine(error))
            }
        }
    }

    pub(crate) fn as_ptr(&self) -> Result<*mut sqlite3> {
        self.with_handle(|handle| Ok(handle.as_ptr()))
    }

    pub(crate) fn with_handle<T>(
        &self,
        f: impl FnOnce(&ConnectionHandle) -> Result<T>,
    ) -> Result<T> {
        match &*self.handle.borrow() {
            Some(handle) => f(handle),
            None => Err(Error::UseAfterDispose(Resource::Connection)),
        }
    }

    pub(crate) fn log_settings(&self) -> &LogSettings {
        &self.log_settings
    }

    pub(crate) fn blob_inline_threshold(&self) -> usize {
        self.blob_inline_threshold
    }

    pub(crate) fn statement_finalized(&self) {
        self.live_statements
            .set(self.live_statements.get().saturating_sub(1));
    }

    pub(crate) fn blob_closed(&self) {
        self.live_blobs.set(self.live_blobs.get().saturating_sub(1));
    }

    pub(crate) fn trace(&self, sql: &str) {
        if let Some(tap) = self.profile_tap.borrow_mut().as_mut() {
            tap.trace(sql);
        }
    }

    pub(crate) fn profile(&self, sql: &str, elapsed: Duration) {
        if let Some(tap) = self.profile_tap.borrow_mut().as_mut() {
            tap.profile(sql, u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
        }
    }
}

impl Debug for SqliteConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("closed", &self.is_closed())
            .field("live_statements", &self.live_statements.get())
            .field("live_blobs", &self.live_blobs.get())
            .field("blob_inline_threshold", &self.blob_inline_threshold)
            .finish()
    }
}
