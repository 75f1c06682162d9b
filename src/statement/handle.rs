use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};
use std::slice::from_raw_parts;
use std::str::{from_utf8, from_utf8_unchecked, Utf8Error};

use libsqlite3_sys::{
    sqlite3, sqlite3_bind_blob64, sqlite3_bind_double, sqlite3_bind_int64, sqlite3_bind_null,
    sqlite3_bind_parameter_count, sqlite3_bind_parameter_index, sqlite3_bind_parameter_name,
    sqlite3_bind_text64, sqlite3_changes64, sqlite3_clear_bindings, sqlite3_column_blob, sqlite3_column_bytes,
    sqlite3_column_count, sqlite3_column_database_name, sqlite3_column_decltype,
    sqlite3_column_double, sqlite3_column_int64, sqlite3_column_name, sqlite3_column_origin_name,
    sqlite3_column_table_name, sqlite3_column_type, sqlite3_db_handle, sqlite3_finalize,
    sqlite3_prepare_v3, sqlite3_reset, sqlite3_sql, sqlite3_step, sqlite3_stmt,
    sqlite3_stmt_readonly, sqlite3_table_column_metadata, SQLITE_DONE, SQLITE_ERROR,
    SQLITE_MISUSE, SQLITE_OK, SQLITE_ROW, SQLITE_TRANSIENT, SQLITE_UTF8,
};

use crate::column::ColumnOrigin;
use crate::error::{err_config, Error};
use crate::SqliteError;

#[derive(Debug)]
pub(crate) struct StatementHandle(NonNull<sqlite3_stmt>);

// access to SQLite3 statement handles are safe to send between threads
// as long as the `sqlite3_step` call is serialized.

unsafe impl Send for StatementHandle {}

macro_rules! expect_ret_valid {
    ($fn_name:ident($($args:tt)*)) => {{
        let val = $fn_name($($args)*);

        TryFrom::try_from(val)
            // This likely means UB in SQLite itself or our usage of it;
            // signed integer overflow is UB in the C standard.
            .unwrap_or_else(|_| panic!("{}() returned invalid value: {val:?}", stringify!($fn_name)))
    }}
}

macro_rules! check_col_idx {
    ($idx:ident) => {
        c_int::try_from($idx).unwrap_or_else(|_| panic!("invalid column index: {}", $idx))
    };
}

impl StatementHandle {
    /// Compile the first statement of `query`.
    ///
    /// Returns `None` for the handle if `query` holds no statement (empty, whitespace or
    /// comments), along with the byte offset where the unconsumed tail begins.
    pub(crate) fn prepare(db: *mut sqlite3, query: &str) -> Result<(Option<Self>, usize), Error> {
        let query_ptr = query.as_ptr().cast::<c_char>();
        let query_len = c_int::try_from(query.len())
            .map_err(|_| err_config!("query string of {} bytes is too large", query.len()))?;

        let mut statement_handle: *mut sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();

        // <https://www.sqlite.org/c3ref/prepare.html>
        let status = unsafe {
            sqlite3_prepare_v3(
                db,
                query_ptr,
                query_len,
                0,
                &mut statement_handle,
                &mut tail,
            )
        };

        if status != SQLITE_OK {
            let error = SqliteError::new(db);

            // compile errors (unknown tables, bad syntax) are all reported as SQLITE_ERROR
            return Err(if error.primary_code() == SQLITE_ERROR {
                Error::Syntax(error)
            } else {
                Error::Engine(error)
            });
        }

        // If pzTail is not NULL then *pzTail is made to point to the first byte
        // past the end of the first SQL statement in zSql.
        let tail = if tail.is_null() {
            query.len()
        } else {
            (tail as usize).saturating_sub(query_ptr as usize)
        };

        Ok((NonNull::new(statement_handle).map(Self), tail))
    }

    #[inline]
    pub(crate) fn db_handle(&self) -> *mut sqlite3 {
        // O(c) access to the connection handle for this statement handle
        // https://sqlite.org/c3ref/db_handle.html
        unsafe { sqlite3_db_handle(self.0.as_ptr()) }
    }

    /// Rows changed by the most recently completed INSERT, UPDATE or DELETE on the connection
    /// owning this statement.
    pub(crate) fn changes(&self) -> u64 {
        // https://sqlite.org/c3ref/changes.html
        let changes = unsafe { sqlite3_changes64(self.db_handle()) };
        u64::try_from(changes).unwrap_or_default()
    }

    pub(crate) fn read_only(&self) -> bool {
        // https://sqlite.org/c3ref/stmt_readonly.html
        unsafe { sqlite3_stmt_readonly(self.0.as_ptr()) != 0 }
    }

    pub(crate) fn sql(&self) -> &str {
        // https://sqlite.org/c3ref/expanded_sql.html
        unsafe {
            let raw = sqlite3_sql(self.0.as_ptr());
            debug_assert!(!raw.is_null());

            from_utf8_unchecked(CStr::from_ptr(raw).to_bytes())
        }
    }

    #[inline]
    pub(crate) fn last_error(&self) -> SqliteError {
        SqliteError::new(self.db_handle())
    }

    #[inline]
    pub(crate) fn column_count(&self) -> usize {
        // https://sqlite.org/c3ref/column_count.html
        unsafe { expect_ret_valid!(sqlite3_column_count(self.0.as_ptr())) }
    }

    #[inline]
    pub(crate) fn column_name(&self, index: usize) -> String {
        // https://sqlite.org/c3ref/column_name.html
        unsafe {
            let name = sqlite3_column_name(self.0.as_ptr(), check_col_idx!(index));
            debug_assert!(!name.is_null());

            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }

    pub(crate) fn column_decltype(&self, index: usize) -> Option<String> {
        unsafe {
            let decl = sqlite3_column_decltype(self.0.as_ptr(), check_col_idx!(index));
            if decl.is_null() {
                // If the Nth column of the result set is an expression or subquery,
                // then a NULL pointer is returned.
                return None;
            }

            Some(CStr::from_ptr(decl).to_string_lossy().into_owned())
        }
    }

    /// The database, table and table column a result column was read from, if it is a plain
    /// column reference.
    pub(crate) fn column_origin(&self, index: usize) -> Option<ColumnOrigin> {
        unsafe {
            let index = check_col_idx!(index);

            // https://sqlite.org/c3ref/column_database_name.html
            //
            // ### Note
            // The returned string is valid until the prepared statement is destroyed using
            // sqlite3_finalize() or until the statement is automatically reprepared by the
            // first call to sqlite3_step() for a particular run or until the same information
            // is requested again in a different encoding.
            let db_name = sqlite3_column_database_name(self.0.as_ptr(), index);
            let table_name = sqlite3_column_table_name(self.0.as_ptr(), index);
            let origin_name = sqlite3_column_origin_name(self.0.as_ptr(), index);

            if db_name.is_null() || table_name.is_null() || origin_name.is_null() {
                return None;
            }

            Some(ColumnOrigin {
                database: CStr::from_ptr(db_name).to_string_lossy().into_owned(),
                table: CStr::from_ptr(table_name).to_string_lossy().into_owned(),
                column: CStr::from_ptr(origin_name).to_string_lossy().into_owned(),
            })
        }
    }

    /// Whether the column a result column was read from holds the row id of its table.
    pub(crate) fn is_rowid_column(&self, index: usize) -> bool {
        unsafe {
            let index = check_col_idx!(index);

            let db_name = sqlite3_column_database_name(self.0.as_ptr(), index);
            let table_name = sqlite3_column_table_name(self.0.as_ptr(), index);
            let origin_name = sqlite3_column_origin_name(self.0.as_ptr(), index);

            if db_name.is_null() || table_name.is_null() || origin_name.is_null() {
                return false;
            }

            let db_name = CStr::from_ptr(db_name);
            let table_name = CStr::from_ptr(table_name);
            let origin_name = CStr::from_ptr(origin_name);

            // WITHOUT ROWID tables do not resolve the `rowid` alias
            if self.table_column_metadata(db_name, table_name, c"rowid").is_none() {
                return false;
            }

            // a bare `rowid` (or `oid`, `_rowid_`) reference reports its origin as "rowid"
            if origin_name.to_bytes().eq_ignore_ascii_case(b"rowid") {
                return true;
            }

            let Some((decl_type, primary_key)) =
                self.table_column_metadata(db_name, table_name, origin_name)
            else {
                // view columns and virtual tables are not addressable by rowid anyway
                return false;
            };

            // only an `INTEGER PRIMARY KEY` aliases the rowid, never a member of a composite key
            primary_key
                && decl_type.is_some_and(|decl| decl.eq_ignore_ascii_case("INTEGER"))
                && self.primary_key_len(db_name, table_name) == Some(1)
        }
    }

    /// The declared type and primary key flag of a table column, `None` if there is no such
    /// column.
    fn table_column_metadata(
        &self,
        db_name: &CStr,
        table_name: &CStr,
        column_name: &CStr,
    ) -> Option<(Option<String>, bool)> {
        let mut decl_type: *const c_char = ptr::null();
        let mut primary_key: c_int = 0;

        // https://sqlite.org/c3ref/table_column_metadata.html
        let status = unsafe {
            sqlite3_table_column_metadata(
                self.db_handle(),
                db_name.as_ptr(),
                table_name.as_ptr(),
                column_name.as_ptr(),
                &mut decl_type,
                // function docs state to provide NULL for return values you don't care about
                ptr::null_mut(),
                ptr::null_mut(),
                &mut primary_key,
                ptr::null_mut(),
            )
        };

        if status != SQLITE_OK {
            return None;
        }

        let decl_type = (!decl_type.is_null())
            .then(|| unsafe { CStr::from_ptr(decl_type) }.to_string_lossy().into_owned());

        Some((decl_type, primary_key != 0))
    }

    /// Number of columns making up the primary key of a table.
    fn primary_key_len(&self, db_name: &CStr, table_name: &CStr) -> Option<i64> {
        let (Ok(db_name), Ok(table_name)) = (db_name.to_str(), table_name.to_str()) else {
            return None;
        };

        let (handle, _) = Self::prepare(
            self.db_handle(),
            "SELECT count(*) FROM pragma_table_info(?1, ?2) WHERE pk > 0",
        )
        .ok()?;
        let mut handle = handle?;

        if handle.bind_text(1, table_name) != SQLITE_OK
            || handle.bind_text(2, db_name) != SQLITE_OK
        {
            return None;
        }

        match handle.step() {
            Ok(true) => Some(handle.column_int64(0)),
            _ => None,
        }
    }

    // Number Of SQL Parameters
    #[inline]
    pub(crate) fn bind_parameter_count(&self) -> usize {
        // https://www.sqlite.org/c3ref/bind_parameter_count.html
        unsafe { expect_ret_valid!(sqlite3_bind_parameter_count(self.0.as_ptr())) }
    }

    // Name Of A Host Parameter
    // NOTE: The first host parameter has an index of 1, not 0.
    #[inline]
    pub(crate) fn bind_parameter_name(&self, index: usize) -> Option<&str> {
        unsafe {
            // https://www.sqlite.org/c3ref/bind_parameter_name.html
            let name = sqlite3_bind_parameter_name(self.0.as_ptr(), check_col_idx!(index));
            if name.is_null() {
                return None;
            }

            Some(from_utf8_unchecked(CStr::from_ptr(name).to_bytes()))
        }
    }

    /// Returns 0 if no parameter has this exact name (prefix included).
    pub(crate) fn bind_parameter_index(&self, name: &CStr) -> usize {
        // https://www.sqlite.org/c3ref/bind_parameter_index.html
        unsafe {
            expect_ret_valid!(sqlite3_bind_parameter_index(
                self.0.as_ptr(),
                name.as_ptr()
            ))
        }
    }

    // Binding Values To Prepared Statements
    // https://www.sqlite.org/c3ref/bind_blob.html

    #[inline]
    pub(crate) fn bind_blob(&self, index: usize, v: &[u8]) -> c_int {
        unsafe {
            sqlite3_bind_blob64(
                self.0.as_ptr(),
                check_col_idx!(index),
                v.as_ptr().cast::<c_void>(),
                v.len() as u64,
                SQLITE_TRANSIENT(),
            )
        }
    }

    #[inline]
    pub(crate) fn bind_text(&self, index: usize, v: &str) -> c_int {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let encoding = SQLITE_UTF8 as u8;

        // the explicit length keeps embedded NUL bytes
        unsafe {
            sqlite3_bind_text64(
                self.0.as_ptr(),
                check_col_idx!(index),
                v.as_ptr().cast::<c_char>(),
                v.len() as u64,
                SQLITE_TRANSIENT(),
                encoding,
            )
        }
    }

    #[inline]
    pub(crate) fn bind_int64(&self, index: usize, v: i64) -> c_int {
        unsafe { sqlite3_bind_int64(self.0.as_ptr(), check_col_idx!(index), v) }
    }

    #[inline]
    pub(crate) fn bind_double(&self, index: usize, v: f64) -> c_int {
        unsafe { sqlite3_bind_double(self.0.as_ptr(), check_col_idx!(index), v) }
    }

    #[inline]
    pub(crate) fn bind_null(&self, index: usize) -> c_int {
        unsafe { sqlite3_bind_null(self.0.as_ptr(), check_col_idx!(index)) }
    }

    // result values from the query
    // https://www.sqlite.org/c3ref/column_blob.html

    #[inline]
    pub(crate) fn column_type(&self, index: usize) -> c_int {
        unsafe { sqlite3_column_type(self.0.as_ptr(), check_col_idx!(index)) }
    }

    #[inline]
    pub(crate) fn column_int64(&self, index: usize) -> i64 {
        unsafe { sqlite3_column_int64(self.0.as_ptr(), check_col_idx!(index)) }
    }

    #[inline]
    pub(crate) fn column_double(&self, index: usize) -> f64 {
        unsafe { sqlite3_column_double(self.0.as_ptr(), check_col_idx!(index)) }
    }

    pub(crate) fn column_blob(&self, index: usize) -> &[u8] {
        let len = unsafe {
            expect_ret_valid!(sqlite3_column_bytes(self.0.as_ptr(), check_col_idx!(index)))
        };

        if len == 0 {
            // empty blobs are NULL so just return an empty slice
            return &[];
        }

        let ptr = unsafe { sqlite3_column_blob(self.0.as_ptr(), check_col_idx!(index)) }
            .cast::<u8>();
        debug_assert!(!ptr.is_null());

        unsafe { from_raw_parts(ptr, len) }
    }

    pub(crate) fn column_text(&self, index: usize) -> Result<&str, Utf8Error> {
        from_utf8(self.column_blob(index))
    }

    pub(crate) fn clear_bindings(&self) {
        unsafe { sqlite3_clear_bindings(self.0.as_ptr()) };
    }

    pub(crate) fn reset(&mut self) -> Result<(), SqliteError> {
        // SAFETY: we have exclusive access to the handle
        unsafe {
            if sqlite3_reset(self.0.as_ptr()) != SQLITE_OK {
                return Err(SqliteError::new(self.db_handle()));
            }
        }

        Ok(())
    }

    /// Returns `true` if a row is available.
    pub(crate) fn step(&mut self) -> Result<bool, SqliteError> {
        // SAFETY: we have exclusive access to the handle
        unsafe {
            match sqlite3_step(self.0.as_ptr()) {
                SQLITE_ROW => Ok(true),
                SQLITE_DONE => Ok(false),
                _ => Err(SqliteError::new(self.db_handle())),
            }
        }
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        // SAFETY: we have exclusive access to the `StatementHandle` here
        unsafe {
            // https://sqlite.org/c3ref/finalize.html
            //
            // Any other error code is the one from the most recent evaluation, which has
            // already been reported by `step()`.
            let status = sqlite3_finalize(self.0.as_ptr());
            if status == SQLITE_MISUSE {
                tracing::error!("detected sqlite3_finalize misuse");
            }
        }
    }
}
