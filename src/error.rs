//! Errors returned by the binding layer.
//!
//! Every engine call site checks its result code and converts a failure into an [`Error`]
//! immediately. Nothing in this crate retries: a `SQLITE_BUSY` or `SQLITE_LOCKED` result is
//! surfaced as [`Error::Engine`] and it is up to the caller to decide whether (and when) to try
//! again, see [`SqliteError::is_busy()`].

use std::error::Error as StdError;
use std::ffi::CStr;
use std::fmt::{self, Display, Formatter};
use std::os::raw::c_int;
use std::str::Utf8Error;

use libsqlite3_sys::{
    sqlite3, sqlite3_errmsg, sqlite3_errstr, sqlite3_extended_errcode, SQLITE_BUSY,
    SQLITE_CONSTRAINT, SQLITE_LOCKED,
};

use crate::statement::StatementState;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// Convenience type alias for usage within the crate.
pub(crate) type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

// Error Codes And Messages
// https://www.sqlite.org/c3ref/errcode.html

/// An error code and message reported by SQLite itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteError {
    code: c_int,
    message: String,
}

impl SqliteError {
    pub(crate) fn new(handle: *mut sqlite3) -> Self {
        // returns the extended result code even when extended result codes are disabled
        let code: c_int = unsafe { sqlite3_extended_errcode(handle) };

        // return English-language text that describes the error
        let message = unsafe {
            let msg = sqlite3_errmsg(handle);
            debug_assert!(!msg.is_null());

            CStr::from_ptr(msg).to_string_lossy().into_owned()
        };

        Self { code, message }
    }

    /// For calls that have no connection to ask, describe the bare result code.
    pub(crate) fn from_code(code: c_int) -> Self {
        // https://www.sqlite.org/c3ref/errcode.html
        let message = unsafe {
            let msg = sqlite3_errstr(code);

            if msg.is_null() {
                String::from("unknown error")
            } else {
                CStr::from_ptr(msg).to_string_lossy().into_owned()
            }
        };

        Self { code, message }
    }

    /// The extended result code.
    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The primary result code, i.e. the low 8 bits of [`code()`][Self::code].
    #[inline]
    pub fn primary_code(&self) -> i32 {
        self.code & 0xff
    }

    /// The English-language message produced by `sqlite3_errmsg()`.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The database file could not be locked; the operation may succeed if retried.
    pub fn is_busy(&self) -> bool {
        self.primary_code() == SQLITE_BUSY
    }

    /// A table was locked by another statement on a shared cache.
    pub fn is_locked(&self) -> bool {
        self.primary_code() == SQLITE_LOCKED
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.primary_code() == SQLITE_CONSTRAINT
    }
}

impl Display for SqliteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // We include the code as some produce ambiguous messages:
        // SQLITE_BUSY: "database is locked"
        // SQLITE_LOCKED: "database table is locked"
        // Sadly there's no function to get the string label back from an error code.
        write!(f, "(code: {}) {}", self.code, self.message)
    }
}

impl StdError for SqliteError {}

/// The flat classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    Open,
    Syntax,
    InvalidState,
    UseAfterDispose,
    IndexOutOfRange,
    TypeMismatch,
    Overflow,
    Encoding,
    NotFound,
    NotABlobColumn,
    ResourcesStillOpen,
    OffsetOutOfRange,
    ReadOnlyStream,
    StaleHandle,
    Engine,
    Configuration,
}

/// A disposable resource, for reporting use-after-dispose errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Connection,
    Statement,
    Blob,
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Connection => "connection",
            Resource::Statement => "statement",
            Resource::Blob => "blob stream",
        })
    }
}

/// Represents all the ways a method can fail within this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The database could not be opened.
    #[error("unable to open database: {0}")]
    Open(#[source] SqliteError),

    /// SQL text failed to compile.
    #[error("failed to prepare statement: {0}")]
    Syntax(#[source] SqliteError),

    /// The operation is not legal in the current statement state.
    #[error("cannot {operation} a statement in the {state:?} state")]
    InvalidState {
        operation: &'static str,
        state: StatementState,
    },

    /// The resource has already been closed or finalized.
    #[error("{0} used after it was closed")]
    UseAfterDispose(Resource),

    /// A parameter index was 0 or larger than the number of parameters.
    #[error("parameter index out of range: the count is {len}, but the index is {index}")]
    ParameterIndexOutOfRange { index: usize, len: usize },

    /// No parameter with the given name exists in the statement.
    #[error("no parameter found for name: {0}")]
    ParameterNotFound(String),

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// No column found for the given name.
    #[error("no column found for name: {0}")]
    ColumnNotFound(String),

    /// The value has no conversion to or from the requested type.
    #[error("mismatched types: {0}")]
    TypeMismatch(String),

    /// An integer did not fit in the requested type.
    #[error("integer value {value} does not fit in `{target}`")]
    Overflow { value: i128, target: &'static str },

    /// A TEXT value was not valid UTF-8.
    #[error("TEXT value in column {index} is not valid UTF-8: {source}")]
    Encoding {
        index: usize,
        #[source]
        source: Utf8Error,
    },

    /// The target of a blob open does not exist.
    #[error("blob target not found: {0}")]
    NotFound(#[source] SqliteError),

    /// The target of a blob open is not a BLOB (or TEXT) value.
    #[error("cannot open blob stream: {0}")]
    NotABlobColumn(#[source] SqliteError),

    /// A connection was closed while statements or blob streams were still open on it.
    #[error("cannot close connection: {statements} statement(s) and {blobs} blob stream(s) still open")]
    ResourcesStillOpen { statements: usize, blobs: usize },

    /// A blob offset or write extent falls outside the blob.
    #[error("offset {offset} is out of range for a blob of {len} bytes")]
    OffsetOutOfRange { offset: u64, len: usize },

    /// A write was attempted on a blob stream opened read-only.
    #[error("blob stream was opened read-only")]
    ReadOnlyStream,

    /// The row under a blob stream was modified or deleted.
    #[error("blob stream is stale: the underlying row was modified")]
    StaleHandle,

    /// Any other failure reported by SQLite.
    #[error("error returned from database: {0}")]
    Engine(#[source] SqliteError),

    /// Invalid options or arguments.
    #[error("error with configuration: {0}")]
    Configuration(#[source] BoxDynError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open(_) => ErrorKind::Open,
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::UseAfterDispose(_) => ErrorKind::UseAfterDispose,
            Error::ParameterIndexOutOfRange { .. }
            | Error::ParameterNotFound(_)
            | Error::ColumnIndexOutOfBounds { .. }
            | Error::ColumnNotFound(_) => ErrorKind::IndexOutOfRange,
            Error::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::Encoding { .. } => ErrorKind::Encoding,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotABlobColumn(_) => ErrorKind::NotABlobColumn,
            Error::ResourcesStillOpen { .. } => ErrorKind::ResourcesStillOpen,
            Error::OffsetOutOfRange { .. } => ErrorKind::OffsetOutOfRange,
            Error::ReadOnlyStream => ErrorKind::ReadOnlyStream,
            Error::StaleHandle => ErrorKind::StaleHandle,
            Error::Engine(_) => ErrorKind::Engine,
            Error::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The error reported by SQLite, if this error came from the engine.
    pub fn as_sqlite_error(&self) -> Option<&SqliteError> {
        match self {
            Error::Open(e)
            | Error::Syntax(e)
            | Error::NotFound(e)
            | Error::NotABlobColumn(e)
            | Error::Engine(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn config(err: impl StdError + Send + Sync + 'static) -> Self {
        Error::Configuration(err.into())
    }

    pub(crate) fn mismatched_types(expected: &str, found: &str) -> Self {
        Error::TypeMismatch(format!("expected {expected}, found {found}"))
    }
}

impl From<SqliteError> for Error {
    #[inline]
    fn from(error: SqliteError) -> Self {
        Error::Engine(error)
    }
}

// Format an error message as a `Configuration` error
macro_rules! err_config {
    ($fmt:literal) => {
        $crate::error::Error::Configuration(format!($fmt).into())
    };

    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Configuration(format!($fmt, $($arg)*).into())
    };
}

pub(crate) use err_config;
