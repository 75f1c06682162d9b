//! Incremental BLOB I/O.
//!
//! A [`SqliteBlob`] reads and writes one cell in place, without materializing the value.
//! Its length is fixed when it is opened; writes can never grow the value.
//!
//! <https://www.sqlite.org/c3ref/blob_open.html>

use std::ffi::{c_void, CString};
use std::fmt::{self, Debug, Formatter};
use std::io;
use std::os::raw::c_int;
use std::ptr::{self, NonNull};

use libsqlite3_sys::{
    sqlite3, sqlite3_blob, sqlite3_blob_bytes, sqlite3_blob_close, sqlite3_blob_open,
    sqlite3_blob_read, sqlite3_blob_write, SQLITE_ABORT, SQLITE_OK, SQLITE_READONLY,
};

use crate::error::{err_config, Error, ErrorKind, Resource, Result};
use crate::{SqliteConnection, SqliteError};

/// The location of a BLOB value that was too large to copy into a row.
///
/// Open it with [`open()`](Self::open) to stream the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    pub(crate) database: String,
    pub(crate) table: String,
    pub(crate) column: String,
    pub(crate) row_id: i64,
    pub(crate) len: usize,
}

impl BlobDescriptor {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn row_id(&self) -> i64 {
        self.row_id
    }

    /// The size of the value when the row was read.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn open<'c>(&self, conn: &'c SqliteConnection, writable: bool) -> Result<SqliteBlob<'c>> {
        conn.open_blob_in(
            &self.database,
            &self.table,
            &self.column,
            self.row_id,
            writable,
        )
    }
}

/// An open incremental I/O stream on one BLOB cell.
///
/// Closed on drop. Any change to the row under the stream, other than through the stream
/// itself, makes it stale: further reads and writes fail with [`Error::StaleHandle`].
pub struct SqliteBlob<'c> {
    conn: &'c SqliteConnection,
    db: *mut sqlite3,
    handle: Option<NonNull<sqlite3_blob>>,
    len: usize,
    position: usize,
    writable: bool,
}

impl<'c> SqliteBlob<'c> {
    pub(crate) fn open(
        conn: &'c SqliteConnection,
        db: *mut sqlite3,
        database: &str,
        table: &str,
        column: &str,
        row_id: i64,
        writable: bool,
    ) -> Result<Self> {
        let database = c_string(database)?;
        let table = c_string(table)?;
        let column = c_string(column)?;

        let mut handle: *mut sqlite3_blob = ptr::null_mut();

        let status = unsafe {
            sqlite3_blob_open(
                db,
                database.as_ptr(),
                table.as_ptr(),
                column.as_ptr(),
                row_id,
                c_int::from(writable),
                &mut handle,
            )
        };

        if status != SQLITE_OK {
            // on failure the out-pointer is set to NULL, there is nothing to close
            return Err(open_error(SqliteError::new(db)));
        }

        let Some(handle) = NonNull::new(handle) else {
            return Err(Error::Engine(SqliteError::from_code(status)));
        };

        let len = unsafe { sqlite3_blob_bytes(handle.as_ptr()) };

        tracing::debug!(?table, ?column, row_id, len, writable, "opened blob stream");

        Ok(Self {
            conn,
            db,
            handle: Some(handle),
            len: usize::try_from(len).unwrap_or_default(),
            position: 0,
            writable,
        })
    }

    /// Total size of the value in bytes, fixed for the lifetime of the stream.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The current offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Read up to `max_bytes` from the current offset.
    ///
    /// At the end of the value this returns an empty vector.
    pub fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; max_bytes.min(self.remaining())];
        let n = self.read_into(&mut buf)?;
        buf.truncate(n);

        Ok(buf)
    }

    /// Read into `buf` from the current offset, returning the number of bytes read.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let handle = self.handle()?;

        let n = buf.len().min(self.remaining());

        if n == 0 {
            return Ok(0);
        }

        let status = unsafe {
            sqlite3_blob_read(
                handle.as_ptr(),
                buf.as_mut_ptr().cast::<c_void>(),
                self.c_int(n)?,
                self.c_int(self.position)?,
            )
        };

        if status != SQLITE_OK {
            return Err(self.io_error(status));
        }

        self.position += n;

        Ok(n)
    }

    /// Read everything from the current offset to the end.
    pub fn read_to_end_vec(&mut self) -> Result<Vec<u8>> {
        self.read(self.remaining())
    }

    /// Write all of `data` at the current offset.
    ///
    /// Fails with [`Error::OffsetOutOfRange`] if the write would extend past the end of the
    /// value; nothing is written in that case.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.handle()?;

        if !self.writable {
            return Err(Error::ReadOnlyStream);
        }

        if data.len() > self.remaining() {
            return Err(Error::OffsetOutOfRange {
                offset: (self.position + data.len()) as u64,
                len: self.len,
            });
        }

        if data.is_empty() {
            return Ok(());
        }

        let status = unsafe {
            sqlite3_blob_write(
                handle.as_ptr(),
                data.as_ptr().cast::<c_void>(),
                self.c_int(data.len())?,
                self.c_int(self.position)?,
            )
        };

        if status != SQLITE_OK {
            return Err(self.io_error(status));
        }

        self.position += data.len();

        Ok(())
    }

    /// Move to an absolute offset. Seeking to exactly the end is allowed.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.handle()?;

        match usize::try_from(offset) {
            Ok(position) if position <= self.len => {
                self.position = position;
                Ok(())
            }

            _ => Err(Error::OffsetOutOfRange {
                offset,
                len: self.len,
            }),
        }
    }

    /// Release the stream. Calling this more than once is a no-op.
    ///
    /// A failure reported by SQLite while closing is logged, not returned; the stream is
    /// closed either way.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // https://www.sqlite.org/c3ref/blob_close.html
        let status = unsafe { sqlite3_blob_close(handle.as_ptr()) };

        if status != SQLITE_OK {
            tracing::warn!(
                "error while closing blob stream: {}",
                SqliteError::new(self.db)
            );
        }

        self.conn.blob_closed();
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.len.saturating_sub(self.position)
    }

    fn handle(&self) -> Result<NonNull<sqlite3_blob>> {
        self.handle.ok_or(Error::UseAfterDispose(Resource::Blob))
    }

    fn c_int(&self, n: usize) -> Result<c_int> {
        // both are bounded by `len`, which came from a `c_int`
        c_int::try_from(n).map_err(|_| Error::OffsetOutOfRange {
            offset: n as u64,
            len: self.len,
        })
    }

    fn io_error(&self, status: c_int) -> Error {
        match status & 0xff {
            // the row was changed or deleted under the open handle
            SQLITE_ABORT => Error::StaleHandle,
            SQLITE_READONLY => Error::ReadOnlyStream,
            _ => Error::Engine(SqliteError::new(self.db)),
        }
    }
}

impl Drop for SqliteBlob<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl Debug for SqliteBlob<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBlob")
            .field("len", &self.len)
            .field("position", &self.position)
            .field("writable", &self.writable)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl io::Read for SqliteBlob<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(into_io_error)
    }
}

impl io::Write for SqliteBlob<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SqliteBlob::write(self, buf).map_err(into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for SqliteBlob<'_> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            io::SeekFrom::Start(n) => {
                SqliteBlob::seek(self, n).map_err(into_io_error)?;
                return Ok(n);
            }
            io::SeekFrom::End(n) => (self.len, n),
            io::SeekFrom::Current(n) => (self.position, n),
        };

        let target = i128::try_from(base).unwrap_or(i128::MAX) + i128::from(offset);

        let target = u64::try_from(target).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative position",
            )
        })?;

        SqliteBlob::seek(self, target).map_err(into_io_error)?;

        Ok(target)
    }
}

fn into_io_error(error: Error) -> io::Error {
    let kind = match error.kind() {
        ErrorKind::OffsetOutOfRange => io::ErrorKind::InvalidInput,
        ErrorKind::ReadOnlyStream => io::ErrorKind::PermissionDenied,
        ErrorKind::UseAfterDispose => io::ErrorKind::NotConnected,
        _ => io::ErrorKind::Other,
    };

    io::Error::new(kind, error)
}

fn c_string(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| err_config!("{s:?} contains a nul byte"))
}

// `sqlite3_blob_open()` reports every failure as SQLITE_ERROR; only the message tells them apart
fn open_error(error: SqliteError) -> Error {
    let message = error.message();

    if message.starts_with("no such table")
        || message.starts_with("no such column")
        || message.starts_with("no such rowid")
    {
        Error::NotFound(error)
    } else if message.starts_with("cannot open value of type") {
        Error::NotABlobColumn(error)
    } else {
        Error::Engine(error)
    }
}
