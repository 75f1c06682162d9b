//! Prepared statements.
//!
//! A [`SqliteStatement`] moves through the states of [`StatementState`]:
//!
//! ```text
//!          bind              step                step -> Done
//! Ready ---------> Bound ------------> Executing ---------------> Done
//!   |                                                                |
//!   +------------------------ reset (bindings kept) <---------------+
//! ```
//!
//! `finalize` is legal from every state and moves to `Finalized`, after which every operation
//! fails with [`Error::UseAfterDispose`]. An operation attempted outside its legal states
//! fails with [`Error::InvalidState`] without calling into SQLite.

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use libsqlite3_sys::{sqlite3, SQLITE_OK, SQLITE_RANGE};

use crate::blob::BlobDescriptor;
use crate::column::SqliteColumn;
use crate::connection::SqliteConnection;
use crate::error::{Error, Resource, Result};
use crate::logger::QueryLogger;
use crate::row::{ColumnValue, SqliteRow};
use crate::types::Encode;
use crate::value::{DataType, SqliteArgumentValue, SqliteValue};

use handle::StatementHandle;

mod handle;

/// The lifecycle state of a [`SqliteStatement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementState {
    /// Freshly prepared or reset, with no values bound since.
    Ready,
    /// At least one parameter is bound; not stepped yet.
    Bound,
    /// Stepped at least once and more rows may follow.
    Executing,
    /// The last step returned no row, or failed. Must be reset before stepping again.
    Done,
    /// Released; terminal.
    Finalized,
}

/// The outcome of one [`SqliteStatement::step()`].
#[derive(Debug, Clone)]
pub enum Step {
    Row(SqliteRow),
    Done,
}

impl Step {
    pub fn into_row(self) -> Option<SqliteRow> {
        match self {
            Step::Row(row) => Some(row),
            Step::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done)
    }
}

/// One compiled SQL statement, created by [`SqliteConnection::prepare()`].
///
/// Dropping the statement finalizes it.
pub struct SqliteStatement<'c> {
    conn: &'c SqliteConnection,
    // `None` for input without any statement, and after finalize
    handle: Option<StatementHandle>,
    state: StatementState,
    sql: String,
    tail: String,
    columns: Arc<Vec<SqliteColumn>>,
    column_names: Arc<HashMap<String, usize>>,
    // for each column, the column of the same row that holds its table's row id
    rowid_columns: Box<[Option<usize>]>,
    has_bindings: bool,
    blob_inline_threshold: usize,
    logger: Option<QueryLogger>,
}

impl<'c> SqliteStatement<'c> {
    pub(crate) fn prepare(conn: &'c SqliteConnection, db: *mut sqlite3, query: &str) -> Result<Self> {
        let (handle, tail) = StatementHandle::prepare(db, query)?;

        let (sql, tail) = query.split_at(tail.min(query.len()));

        let mut columns = Vec::new();
        let mut column_names = HashMap::new();
        let mut rowid_columns = Vec::new();

        if let Some(handle) = &handle {
            let num = handle.column_count();

            columns.reserve(num);
            column_names.reserve(num);

            for i in 0..num {
                let name = handle.column_name(i);

                columns.push(SqliteColumn {
                    ordinal: i,
                    name: name.clone(),
                    decl_type: handle.column_decltype(i),
                    origin: handle.column_origin(i),
                });

                // the first of two identically named columns wins
                column_names.entry(name).or_insert(i);
            }

            let rowids: Vec<usize> = (0..num).filter(|&i| handle.is_rowid_column(i)).collect();

            rowid_columns = columns
                .iter()
                .map(|column| {
                    let origin = column.origin.as_ref()?;

                    rowids.iter().copied().find(|&r| {
                        columns[r].origin.as_ref().is_some_and(|rowid| {
                            rowid.database == origin.database && rowid.table == origin.table
                        })
                    })
                })
                .collect();
        }

        Ok(Self {
            conn,
            handle,
            state: StatementState::Ready,
            sql: sql.trim().to_owned(),
            tail: tail.trim().to_owned(),
            columns: Arc::new(columns),
            column_names: Arc::new(column_names),
            rowid_columns: rowid_columns.into_boxed_slice(),
            has_bindings: false,
            blob_inline_threshold: conn.blob_inline_threshold(),
            logger: None,
        })
    }

    #[inline]
    pub fn state(&self) -> StatementState {
        self.state
    }

    /// The text of the compiled statement.
    pub fn sql(&self) -> &str {
        match &self.handle {
            Some(handle) => handle.sql(),
            None => &self.sql,
        }
    }

    /// Any SQL that followed the first statement of the prepared text and was not compiled.
    pub fn tail(&self) -> &str {
        &self.tail
    }

    /// Whether executing this statement leaves the database unchanged.
    pub fn read_only(&self) -> Result<bool> {
        self.check_live()?;

        Ok(self.handle.as_ref().map_or(true, StatementHandle::read_only))
    }

    /// Rows larger than this many bytes in a BLOB column are returned as a
    /// [`BlobDescriptor`] when possible. Defaults to the connection setting.
    pub fn set_blob_inline_threshold(&mut self, bytes: usize) {
        self.blob_inline_threshold = bytes;
    }

    pub fn parameter_count(&self) -> Result<usize> {
        self.check_live()?;

        Ok(self
            .handle
            .as_ref()
            .map_or(0, StatementHandle::bind_parameter_count))
    }

    /// The name of the 1-based parameter `index`, including its prefix character.
    ///
    /// Returns `Ok(None)` for anonymous `?` parameters.
    pub fn parameter_name(&self, index: usize) -> Result<Option<&str>> {
        let index = index.index(self)?;

        Ok(self
            .handle
            .as_ref()
            .and_then(|handle| handle.bind_parameter_name(index)))
    }

    /// Look up the 1-based index of a named parameter.
    ///
    /// `name` may carry its `:`, `@`, `$` or `?` prefix; without one, each prefix is tried.
    pub fn parameter_index(&self, name: &str) -> Result<Option<usize>> {
        self.check_live()?;

        let Some(handle) = &self.handle else {
            return Ok(None);
        };

        let candidates: Vec<String> = if name.starts_with([':', '@', '$', '?']) {
            vec![name.to_owned()]
        } else {
            [':', '@', '$']
                .iter()
                .map(|prefix| format!("{prefix}{name}"))
                .collect()
        };

        for candidate in candidates {
            // a name with a NUL byte can not match anything
            let Ok(candidate) = CString::new(candidate) else {
                return Ok(None);
            };

            match handle.bind_parameter_index(&candidate) {
                0 => continue,
                index => return Ok(Some(index)),
            }
        }

        Ok(None)
    }

    pub fn column_count(&self) -> Result<usize> {
        self.check_live()?;
        Ok(self.columns.len())
    }

    pub fn column_name(&self, index: usize) -> Result<&str> {
        Ok(self.column(index)?.name())
    }

    /// The declared type of a result column, `None` for expressions.
    pub fn column_decltype(&self, index: usize) -> Result<Option<&str>> {
        Ok(self.column(index)?.decl_type())
    }

    pub fn columns(&self) -> Result<&[SqliteColumn]> {
        self.check_live()?;
        Ok(&self.columns)
    }

    fn column(&self, index: usize) -> Result<&SqliteColumn> {
        self.check_live()?;

        self.columns
            .get(index)
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                len: self.columns.len(),
            })
    }

    /// Bind a value to a parameter, by 1-based index or by name.
    ///
    /// Only legal before the statement is stepped; [`reset()`](Self::reset) first to re-bind
    /// an executing statement.
    pub fn bind<I, T>(&mut self, index: I, value: T) -> Result<()>
    where
        I: ParameterIndex,
        T: Encode,
    {
        self.check("bind", &[StatementState::Ready, StatementState::Bound])?;

        let index = index.index(self)?;
        let value = value.encode()?;

        let Some(handle) = &self.handle else {
            return Err(Error::ParameterIndexOutOfRange { index, len: 0 });
        };

        let status = match &value {
            // the engine would store NULL in its place
            SqliteArgumentValue::Double(v) if v.is_nan() => {
                return Err(Error::TypeMismatch(format!(
                    "cannot bind NaN to parameter {index}"
                )));
            }

            SqliteArgumentValue::Null => handle.bind_null(index),
            SqliteArgumentValue::Int64(v) => handle.bind_int64(index, *v),
            SqliteArgumentValue::Double(v) => handle.bind_double(index, *v),
            SqliteArgumentValue::Text(v) => handle.bind_text(index, v),
            SqliteArgumentValue::Blob(v) => handle.bind_blob(index, v),
        };

        match status {
            SQLITE_OK => {
                self.has_bindings = true;
                self.state = StatementState::Bound;
                Ok(())
            }

            SQLITE_RANGE => Err(Error::ParameterIndexOutOfRange {
                index,
                len: handle.bind_parameter_count(),
            }),

            _ => Err(Error::Engine(handle.last_error())),
        }
    }

    /// Reset every parameter to `NULL`.
    pub fn clear_bindings(&mut self) -> Result<()> {
        self.check(
            "clear the bindings of",
            &[StatementState::Ready, StatementState::Bound],
        )?;

        if let Some(handle) = &self.handle {
            handle.clear_bindings();
        }

        self.has_bindings = false;
        self.state = StatementState::Ready;

        Ok(())
    }

    /// Advance to the next row.
    ///
    /// A statement without result columns runs to completion on its first step and returns
    /// [`Step::Done`].
    ///
    /// If a TEXT value of the row is not valid UTF-8 this fails with [`Error::Encoding`]; the
    /// cursor has still moved past that row and the statement may be stepped again.
    pub fn step(&mut self) -> Result<Step> {
        self.check(
            "step",
            &[
                StatementState::Ready,
                StatementState::Bound,
                StatementState::Executing,
            ],
        )?;

        let Some(handle) = &mut self.handle else {
            self.state = StatementState::Done;
            return Ok(Step::Done);
        };

        if self.logger.is_none() {
            self.conn.trace(handle.sql());
            self.logger = Some(QueryLogger::new(self.conn.log_settings().clone()));
        }

        match handle.step() {
            Ok(true) => {
                self.state = StatementState::Executing;

                if let Some(logger) = &mut self.logger {
                    logger.increment_rows_returned();
                }

                self.read_row().map(Step::Row)
            }

            Ok(false) => {
                self.state = StatementState::Done;

                if !handle.read_only() {
                    if let Some(logger) = &mut self.logger {
                        logger.increase_rows_affected(handle.changes());
                    }
                }

                self.finish_logger();

                Ok(Step::Done)
            }

            Err(error) => {
                self.state = StatementState::Done;
                self.finish_logger();

                Err(Error::Engine(error))
            }
        }
    }

    /// Step to completion, returning the number of rows changed.
    pub fn execute(&mut self) -> Result<u64> {
        while let Step::Row(_) = self.step()? {}

        if self.read_only()? {
            return Ok(0);
        }

        self.conn.changes()
    }

    /// Step to completion, collecting every row.
    pub fn fetch_all(&mut self) -> Result<Vec<SqliteRow>> {
        let mut rows = Vec::new();

        while let Step::Row(row) = self.step()? {
            rows.push(row);
        }

        Ok(rows)
    }

    /// Rewind the statement so it can be executed again. Bound values are kept.
    ///
    /// Afterwards the statement is `Bound` if it holds bindings and `Ready` otherwise, even
    /// if SQLite reports an error; that error belongs to the execution that just ended.
    pub fn reset(&mut self) -> Result<()> {
        self.check_live()?;

        self.finish_logger();

        self.state = if self.has_bindings {
            StatementState::Bound
        } else {
            StatementState::Ready
        };

        match &mut self.handle {
            Some(handle) => handle.reset().map_err(Error::Engine),
            None => Ok(()),
        }
    }

    /// Release the compiled program. Calling this more than once is a no-op.
    pub fn finalize(&mut self) {
        if self.state == StatementState::Finalized {
            return;
        }

        self.finish_logger();

        // finalized in `Drop`
        self.handle = None;
        self.state = StatementState::Finalized;

        self.conn.statement_finalized();
    }

    #[inline]
    fn check_live(&self) -> Result<()> {
        if self.state == StatementState::Finalized {
            return Err(Error::UseAfterDispose(Resource::Statement));
        }

        Ok(())
    }

    fn check(&self, operation: &'static str, legal: &[StatementState]) -> Result<()> {
        self.check_live()?;

        if !legal.contains(&self.state) {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }

        Ok(())
    }

    fn finish_logger(&mut self) {
        if let Some(logger) = self.logger.take() {
            let sql = self.sql().to_owned();
            let elapsed = logger.finish(&sql);

            self.conn.profile(&sql, elapsed);
        }
    }

    fn read_row(&self) -> Result<SqliteRow> {
        let Some(handle) = &self.handle else {
            return Err(Error::UseAfterDispose(Resource::Statement));
        };

        let mut values = Vec::with_capacity(self.columns.len());

        for i in 0..self.columns.len() {
            // decided per value: the same column may hold a different class in every row
            let value = match DataType::from_code(handle.column_type(i)) {
                DataType::Null => SqliteValue::Null,
                DataType::Integer => SqliteValue::Integer(handle.column_int64(i)),
                DataType::Float => SqliteValue::Float(handle.column_double(i)),

                DataType::Text => match handle.column_text(i) {
                    Ok(text) => SqliteValue::Text(text.to_owned()),
                    Err(source) => return Err(Error::Encoding { index: i, source }),
                },

                DataType::Blob => {
                    let bytes = handle.column_blob(i);

                    if bytes.len() > self.blob_inline_threshold {
                        if let Some(descriptor) = self.blob_descriptor(handle, i, bytes.len()) {
                            values.push(ColumnValue::Stream(descriptor));
                            continue;
                        }
                    }

                    SqliteValue::Blob(bytes.to_vec())
                }
            };

            values.push(ColumnValue::Inline(value));
        }

        Ok(SqliteRow {
            values: values.into_boxed_slice(),
            columns: Arc::clone(&self.columns),
            column_names: Arc::clone(&self.column_names),
        })
    }

    fn blob_descriptor(
        &self,
        handle: &StatementHandle,
        index: usize,
        len: usize,
    ) -> Option<BlobDescriptor> {
        let origin = self.columns[index].origin.as_ref()?;
        let rowid = self.rowid_columns[index]?;

        if DataType::from_code(handle.column_type(rowid)) != DataType::Integer {
            return None;
        }

        Some(BlobDescriptor {
            database: origin.database.clone(),
            table: origin.table.clone(),
            column: origin.column.clone(),
            row_id: handle.column_int64(rowid),
            len,
        })
    }
}

impl Drop for SqliteStatement<'_> {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl Debug for SqliteStatement<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("columns", &self.columns)
            .finish()
    }
}

/// A type that can be used to select a parameter of a [`SqliteStatement`]: a 1-based `usize`
/// position, or a parameter name.
pub trait ParameterIndex: Debug {
    /// Returns a valid 1-based parameter index, [`ParameterIndexOutOfRange`], or
    /// [`ParameterNotFound`].
    ///
    /// [`ParameterIndexOutOfRange`]: Error::ParameterIndexOutOfRange
    /// [`ParameterNotFound`]: Error::ParameterNotFound
    fn index(&self, statement: &SqliteStatement<'_>) -> Result<usize>;
}

impl ParameterIndex for usize {
    fn index(&self, statement: &SqliteStatement<'_>) -> Result<usize> {
        let len = statement.parameter_count()?;

        if *self == 0 || *self > len {
            return Err(Error::ParameterIndexOutOfRange { index: *self, len });
        }

        Ok(*self)
    }
}

impl ParameterIndex for &'_ str {
    fn index(&self, statement: &SqliteStatement<'_>) -> Result<usize> {
        statement
            .parameter_index(self)?
            .ok_or_else(|| Error::ParameterNotFound((*self).into()))
    }
}

impl ParameterIndex for String {
    fn index(&self, statement: &SqliteStatement<'_>) -> Result<usize> {
        self.as_str().index(statement)
    }
}
