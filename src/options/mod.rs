use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use log::LevelFilter;

use crate::logger::LogSettings;

mod parse;

/// Default size above which BLOB columns are exposed as streams instead of copied.
pub const DEFAULT_BLOB_INLINE_THRESHOLD: usize = 1024 * 1024;

/// Options and flags which can be used to configure a SQLite connection.
///
/// A value of `SqliteConnectOptions` can be parsed from a connection URI,
/// as described by [SQLite](https://www.sqlite.org/uri.html).
///
/// | URI | Description |
/// | -- | -- |
/// `sqlite::memory:` | Open an in-memory database. |
/// `sqlite:data.db` | Open the file `data.db` in the current directory. |
/// `sqlite://data.db` | Open the file `data.db` in the current directory. |
/// `sqlite:///data.db` | Open the file `data.db` from the root (`/`) directory. |
/// `sqlite://data.db?mode=ro` | Open the file `data.db` for read-only access. |
///
/// A bare path, or `:memory:`, is accepted as well.
///
/// # Example
///
/// ```rust,no_run
/// use litebind::{SqliteConnectOptions, SqliteConnection};
/// use std::str::FromStr;
///
/// # fn main() -> Result<(), litebind::Error> {
/// let options = SqliteConnectOptions::from_str("sqlite://data.db")?
///     .create_if_missing(true)
///     .blob_inline_threshold(64 * 1024)
///     .pragma("foreign_keys", "ON");
///
/// let conn = SqliteConnection::connect_with(&options)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SqliteConnectOptions {
    pub(crate) filename: Cow<'static, Path>,
    pub(crate) in_memory: bool,
    pub(crate) read_only: bool,
    pub(crate) create_if_missing: bool,
    pub(crate) shared_cache: bool,
    pub(crate) serialized: bool,
    pub(crate) immutable: bool,
    pub(crate) vfs: Option<Cow<'static, str>>,
    pub(crate) busy_timeout: Duration,
    pub(crate) extended_result_codes: bool,
    pub(crate) blob_inline_threshold: usize,
    pub(crate) log_settings: LogSettings,
    pub(crate) pragmas: IndexMap<Cow<'static, str>, Cow<'static, str>>,
}

impl Default for SqliteConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteConnectOptions {
    /// Construct `Self` with default options.
    ///
    /// The default database is an anonymous in-memory database.
    pub fn new() -> Self {
        Self {
            filename: Cow::Borrowed(Path::new(":memory:")),
            in_memory: false,
            read_only: false,
            create_if_missing: true,
            shared_cache: false,
            serialized: false,
            immutable: false,
            vfs: None,
            busy_timeout: Duration::from_secs(5),
            extended_result_codes: true,
            blob_inline_threshold: DEFAULT_BLOB_INLINE_THRESHOLD,
            log_settings: Default::default(),
            pragmas: IndexMap::new(),
        }
    }

    /// Sets the name of the database file.
    pub fn filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.filename = Cow::Owned(filename.as_ref().to_owned());
        self
    }

    /// Open a private in-memory database; the filename is ignored.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// Sets the [access mode](https://www.sqlite.org/c3ref/open.html) to open the database
    /// for read-only access.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the [access mode](https://www.sqlite.org/c3ref/open.html) to create the database file
    /// if the file does not exist.
    ///
    /// By default, a new file **will be** created if one is not found.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the [`SQLITE_OPEN_SHAREDCACHE` flag](https://sqlite.org/sharedcache.html).
    ///
    /// By default, this is disabled.
    pub fn shared_cache(mut self, on: bool) -> Self {
        self.shared_cache = on;
        self
    }

    /// Sets the [threading mode](https://www.sqlite.org/threadsafe.html) for the database connection.
    ///
    /// The default setting is `false` corresponding to using `OPEN_NOMUTEX`, if `true` then `OPEN_FULLMUTEX`.
    ///
    /// This crate adds no locking of its own; with `OPEN_NOMUTEX` a connection must only be used
    /// from one thread at a time.
    pub fn serialized(mut self, serialized: bool) -> Self {
        self.serialized = serialized;
        self
    }

    /// Open the file as [immutable](https://www.sqlite.org/uri.html#uriimmutable).
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    /// Sets the [`vfs`](https://www.sqlite.org/vfs.html) parameter of the database connection.
    ///
    /// The default value is empty, and sqlite will use the default VFS object depending on the
    /// operating system.
    pub fn vfs(mut self, vfs_name: impl Into<Cow<'static, str>>) -> Self {
        self.vfs = Some(vfs_name.into());
        self
    }

    /// Sets a timeout value to wait when the database is locked, before
    /// returning a busy timeout error.
    ///
    /// The default busy timeout is 5 seconds.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Report [extended result codes](https://www.sqlite.org/rescode.html#extrc) from the
    /// connection. Enabled by default.
    pub fn extended_result_codes(mut self, on: bool) -> Self {
        self.extended_result_codes = on;
        self
    }

    /// BLOB values larger than this many bytes are not copied into rows; when the row carries
    /// enough information to locate the cell, a [`BlobDescriptor`][crate::BlobDescriptor] is
    /// returned instead.
    ///
    /// The default is 1 MiB.
    pub fn blob_inline_threshold(mut self, bytes: usize) -> Self {
        self.blob_inline_threshold = bytes;
        self
    }

    /// Sets custom initial pragma for the database connection.
    ///
    /// Pragmas are applied in insertion order right after the database is opened.
    pub fn pragma<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        self.pragmas.insert(key.into(), value.into());
        self
    }

    /// Set the enforcement of [foreign key constraints](https://www.sqlite.org/pragma.html#pragma_foreign_keys).
    pub fn foreign_keys(self, on: bool) -> Self {
        self.pragma("foreign_keys", if on { "ON" } else { "OFF" })
    }

    /// Log every completed statement at the given level.
    pub fn log_statements(mut self, level: LevelFilter) -> Self {
        self.log_settings.log_statements(level);
        self
    }

    /// Log statements that take at least `duration` at the given level.
    pub fn log_slow_statements(mut self, level: LevelFilter, duration: Duration) -> Self {
        self.log_settings.log_slow_statements(level, duration);
        self
    }

    pub(crate) fn pragma_string(&self) -> String {
        let mut string = String::new();

        for (key, value) in &self.pragmas {
            use std::fmt::Write;
            let _ = write!(string, "PRAGMA {key} = {value}; ");
        }

        string
    }
}
