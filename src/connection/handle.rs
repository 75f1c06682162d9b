use std::ffi::{c_int, CStr, CString};
use std::mem;
use std::ptr::{self, NonNull};

use libsqlite3_sys::{
    sqlite3, sqlite3_changes64, sqlite3_close, sqlite3_exec, sqlite3_extended_result_codes,
    sqlite3_get_autocommit, sqlite3_last_insert_rowid, sqlite3_open_v2, SQLITE_OK,
};

// `libsqlite3-sys` does not export `sqlite3_close_v2`; the symbol is present in the linked library.
extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

use crate::error::{err_config, Error};
use crate::SqliteError;

/// Managed SQLite3 database handle.
/// The database handle will be closed when this is dropped.
#[derive(Debug)]
pub(crate) struct ConnectionHandle(NonNull<sqlite3>);

// A SQLite3 handle is safe to send between threads, provided not more than
// one is accessing it at the same time. This is upheld as long as [SQLITE_THREADSAFE] was
// enabled when sqlite was compiled; `establish` refuses to open a connection otherwise.
//
// <https://www.sqlite.org/c3ref/threadsafe.html>

unsafe impl Send for ConnectionHandle {}

impl ConnectionHandle {
    pub(crate) fn open(
        filename: &CStr,
        flags: c_int,
        extended_result_codes: bool,
    ) -> Result<Self, Error> {
        let mut handle = ptr::null_mut();

        // <https://www.sqlite.org/c3ref/open.html>
        let status = unsafe { sqlite3_open_v2(filename.as_ptr(), &mut handle, flags, ptr::null()) };

        // SAFETY: the database is still initialized as long as the pointer is not `NULL`.
        // We need to close it even if there's an error.
        let handle = Self(NonNull::new(handle).ok_or_else(|| {
            Error::Open(SqliteError::from_code(status))
        })?);

        if status != SQLITE_OK {
            // `handle` is closed on drop
            return Err(Error::Open(SqliteError::new(handle.as_ptr())));
        }

        // https://www.sqlite.org/c3ref/extended_result_codes.html
        unsafe {
            // This only returns a non-OK code if SQLite is built with `SQLITE_ENABLE_API_ARMOR`
            // and the database pointer is `NULL` or already closed.
            //
            // The invariants of this type guarantee that neither is true.
            sqlite3_extended_result_codes(handle.as_ptr(), c_int::from(extended_result_codes));
        }

        Ok(handle)
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut sqlite3 {
        self.0.as_ptr()
    }

    pub(crate) fn call_with_result(
        &self,
        call: impl FnOnce(*mut sqlite3) -> c_int,
    ) -> Result<(), SqliteError> {
        if call(self.as_ptr()) == SQLITE_OK {
            Ok(())
        } else {
            Err(SqliteError::new(self.as_ptr()))
        }
    }

    pub(crate) fn in_transaction(&self) -> bool {
        // SAFETY: the handle is open for as long as `self` exists
        let ret = unsafe { sqlite3_get_autocommit(self.as_ptr()) };
        ret == 0
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        // https://www.sqlite.org/c3ref/last_insert_rowid.html
        unsafe { sqlite3_last_insert_rowid(self.as_ptr()) }
    }

    pub(crate) fn changes(&self) -> u64 {
        // returns the number of changes of the most recently completed
        // INSERT, UPDATE or DELETE on this connection
        // https://sqlite.org/c3ref/changes.html
        let changes = unsafe { sqlite3_changes64(self.as_ptr()) };
        u64::try_from(changes).unwrap_or_default()
    }

    pub(crate) fn exec(&self, query: &str) -> Result<(), Error> {
        let query = CString::new(query).map_err(|_| err_config!("query contains nul bytes"))?;

        // https://www.sqlite.org/c3ref/exec.html
        let status = unsafe {
            sqlite3_exec(
                self.as_ptr(),
                query.as_ptr(),
                // callback if we wanted result rows
                None,
                // callback data
                ptr::null_mut(),
                // out-pointer for the error message, we just use `SqliteError::new()`
                ptr::null_mut(),
            )
        };

        match status {
            SQLITE_OK => Ok(()),
            _ => Err(Error::Engine(SqliteError::new(self.as_ptr()))),
        }
    }

    /// Close the handle, reporting failure instead of deferring it.
    ///
    /// On failure the handle is handed back still open.
    pub(crate) fn close(self) -> Result<(), (Self, SqliteError)> {
        // https://sqlite.org/c3ref/close.html
        let status = unsafe { sqlite3_close(self.as_ptr()) };

        if status != SQLITE_OK {
            let err = SqliteError::new(self.as_ptr());
            return Err((self, err));
        }

        mem::forget(self);
        Ok(())
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        unsafe {
            // https://sqlite.org/c3ref/close.html
            // `close_v2` defers deallocation until any leaked statements are finalized
            // instead of failing
            let status = sqlite3_close_v2(self.0.as_ptr());
            if status != SQLITE_OK {
                tracing::error!(
                    "failed to close database handle: {}",
                    SqliteError::from_code(status)
                );
            }
        }
    }
}
