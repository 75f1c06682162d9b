//! Synchronous bindings to **SQLite**.
//!
//! ```rust,no_run
//! use litebind::{SqliteConnection, Step};
//!
//! # fn main() -> Result<(), litebind::Error> {
//! let conn = SqliteConnection::open("sqlite::memory:")?;
//! conn.execute_batch("CREATE TABLE t(a INTEGER, b TEXT)")?;
//!
//! let mut insert = conn.prepare("INSERT INTO t VALUES (?, ?)")?;
//! insert.bind(1, 42_i64)?;
//! insert.bind(2, "hi")?;
//! insert.execute()?;
//!
//! let mut select = conn.prepare("SELECT a, b FROM t")?;
//! while let Step::Row(row) = select.step()? {
//!     let a: i64 = row.try_get(0)?;
//!     let b: &str = row.try_get("b")?;
//!     println!("{a} {b}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Ownership
//! Statements and blob streams borrow the [`SqliteConnection`] they were created from, so they
//! can never outlive it. Nothing here locks: a connection is `Send` but not `Sync`.
//!
//! ### Linkage
//! This crate uses the `libsqlite3-sys` crate which links the native library for SQLite 3.
//! The default `bundled` feature builds and links SQLite from source; the `unbundled` feature
//! links the system library instead. Version `3.37.0` or newer is required.

// SQLite is a C library. All interactions require FFI which is unsafe.
// All unsafe blocks should have comments pointing to SQLite docs and ensuring that we maintain
// invariants.
#![allow(unsafe_code)]

pub use blob::{BlobDescriptor, SqliteBlob};
pub use column::{Affinity, ColumnOrigin, SqliteColumn};
pub use connection::SqliteConnection;
pub use error::{Error, ErrorKind, Resource, Result, SqliteError};
pub use logger::LogSettings;
pub use options::{SqliteConnectOptions, DEFAULT_BLOB_INLINE_THRESHOLD};
pub use profile::{IoTap, ProfileSampler, ProfileTap, StringTap};
pub use row::{ColumnIndex, ColumnValue, SqliteRow};
pub use statement::{ParameterIndex, SqliteStatement, StatementState, Step};
pub use status::{DbStatusOp, SqliteDbStat, SqliteStat, StatusOp};
pub use value::{DataType, SqliteArgumentValue, SqliteValue};

pub mod engine;
pub mod types;

mod blob;
mod column;
mod connection;
mod error;
mod logger;
mod options;
mod profile;
mod row;
mod statement;
mod status;
mod value;
