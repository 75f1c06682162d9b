//! Calls that need no connection.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_int;

use libsqlite3_sys::{
    sqlite3_complete, sqlite3_libversion, sqlite3_libversion_number, sqlite3_randomness,
    sqlite3_threadsafe,
};

// `libsqlite3-sys` does not export the UTF-16 API; the symbol is present in the linked library.
extern "C" {
    fn sqlite3_complete16(sql: *const c_void) -> c_int;
}

/// Whether the linked SQLite library was compiled with mutexes.
///
/// This is fixed at compile time. A connection can only be shared between threads (with
/// [`serialized`](crate::SqliteConnectOptions::serialized)) when this is `true`.
///
/// <https://www.sqlite.org/c3ref/threadsafe.html>
pub fn threadsafe() -> bool {
    unsafe { sqlite3_threadsafe() != 0 }
}

/// Whether `sql` ends with a complete statement, i.e. a semicolon outside of any
/// string literal, identifier, comment or trigger body.
///
/// This does not check that the statement is valid.
pub fn complete(sql: &str) -> bool {
    let Ok(sql) = CString::new(sql) else {
        // SQLite would stop at the NUL
        return false;
    };

    unsafe { sqlite3_complete(sql.as_ptr()) != 0 }
}

/// [`complete()`] for UTF-16 text in native byte order.
pub fn complete16(sql: &[u16]) -> bool {
    let mut buf = Vec::with_capacity(sql.len() + 1);
    buf.extend_from_slice(sql);
    buf.push(0);

    unsafe { sqlite3_complete16(buf.as_ptr().cast::<c_void>()) != 0 }
}

/// `n` bytes from SQLite's pseudo-random number generator.
pub fn randomness(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    let max_chunk = usize::try_from(c_int::MAX).unwrap_or(usize::MAX);

    for chunk in buf.chunks_mut(max_chunk) {
        let len = c_int::try_from(chunk.len()).unwrap_or(c_int::MAX);

        unsafe { sqlite3_randomness(len, chunk.as_mut_ptr().cast::<c_void>()) };
    }

    buf
}

/// The version of the linked SQLite library, e.g. `"3.46.0"`.
pub fn version() -> &'static str {
    // https://www.sqlite.org/c3ref/libversion.html
    unsafe { CStr::from_ptr(sqlite3_libversion()) }
        .to_str()
        .unwrap_or_default()
}

/// The version of the linked SQLite library as a number, e.g. `3046000`.
pub fn version_number() -> i32 {
    unsafe { sqlite3_libversion_number() }
}
