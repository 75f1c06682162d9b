use std::collections::BTreeMap;
use std::ffi::CString;
use std::io;
use std::time::Duration;

use libsqlite3_sys::{
    sqlite3_busy_timeout, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_MEMORY,
    SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_PRIVATECACHE, SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE,
    SQLITE_OPEN_SHAREDCACHE, SQLITE_OPEN_URI,
};
use percent_encoding::NON_ALPHANUMERIC;

use crate::connection::handle::ConnectionHandle;
use crate::engine;
use crate::error::{err_config, Error};
use crate::SqliteConnectOptions;

/// Everything needed to open a connection, resolved from [`SqliteConnectOptions`].
#[derive(Debug)]
pub(crate) struct EstablishParams {
    filename: CString,
    open_flags: i32,
    busy_timeout: Duration,
    extended_result_codes: bool,
    pragmas: String,
}

impl EstablishParams {
    pub(crate) fn from_options(options: &SqliteConnectOptions) -> Result<Self, Error> {
        let mut filename = if options.in_memory {
            String::from(":memory:")
        } else {
            options
                .filename
                .to_str()
                .ok_or_else(|| {
                    Error::config(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "filename passed to SQLite must be valid UTF-8",
                    ))
                })?
                .to_owned()
        };

        // Set common flags we expect to have in sqlite
        let mut flags = SQLITE_OPEN_URI;

        // [SQLITE_OPEN_NOMUTEX] will instruct [sqlite3_open_v2] to return an error if it
        // cannot satisfy our wish for a thread-safe, lock-free connection object

        flags |= if options.serialized {
            SQLITE_OPEN_FULLMUTEX
        } else {
            SQLITE_OPEN_NOMUTEX
        };

        flags |= if options.read_only {
            SQLITE_OPEN_READONLY
        } else if options.create_if_missing {
            SQLITE_OPEN_CREATE | SQLITE_OPEN_READWRITE
        } else {
            SQLITE_OPEN_READWRITE
        };

        if options.in_memory {
            flags |= SQLITE_OPEN_MEMORY;
        }

        flags |= if options.shared_cache {
            SQLITE_OPEN_SHAREDCACHE
        } else {
            SQLITE_OPEN_PRIVATECACHE
        };

        let mut query_params = BTreeMap::new();

        if options.immutable {
            query_params.insert("immutable", "true");
        }

        if let Some(vfs) = options.vfs.as_deref() {
            query_params.insert("vfs", vfs);
        }

        if !query_params.is_empty() {
            filename = format!(
                "file:{}?{}",
                percent_encoding::percent_encode(filename.as_bytes(), NON_ALPHANUMERIC),
                serde_urlencoded::to_string(&query_params).map_err(Error::config)?
            );
        }

        let filename = CString::new(filename).map_err(|_| {
            Error::config(io::Error::new(
                io::ErrorKind::InvalidData,
                "filename passed to SQLite must not contain nul bytes",
            ))
        })?;

        Ok(Self {
            filename,
            open_flags: flags,
            busy_timeout: options.busy_timeout,
            extended_result_codes: options.extended_result_codes,
            pragmas: options.pragma_string(),
        })
    }

    pub(crate) fn establish(&self) -> Result<ConnectionHandle, Error> {
        // a library built with SQLITE_THREADSAFE=0 ignores the mutex flags entirely
        if !engine::threadsafe() {
            return Err(err_config!(
                "the linked SQLite library was compiled without thread safety"
            ));
        }

        let handle =
            ConnectionHandle::open(&self.filename, self.open_flags, self.extended_result_codes)?;

        // Configure a busy timeout
        // This causes SQLite to automatically sleep in increasing intervals until the time
        // when there is something locked during [sqlite3_step].
        let ms = i32::try_from(self.busy_timeout.as_millis())
            .map_err(|_| err_config!("busy timeout {:?} is too large", self.busy_timeout))?;

        handle.call_with_result(|db| unsafe { sqlite3_busy_timeout(db, ms) })?;

        if !self.pragmas.is_empty() {
            handle.exec(&self.pragmas)?;
        }

        tracing::debug!(
            filename = ?self.filename,
            flags = self.open_flags,
            "opened database"
        );

        Ok(handle)
    }
}
