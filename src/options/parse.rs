use std::borrow::Cow;
use std::path::Path;
use std::str::FromStr;

use percent_encoding::percent_decode_str;

use crate::error::{err_config, Error};
use crate::SqliteConnectOptions;

// https://www.sqlite.org/uri.html

impl FromStr for SqliteConnectOptions {
    type Err = Error;

    fn from_str(mut uri: &str) -> Result<Self, Self::Err> {
        let mut options = Self::new();

        if uri.is_empty() {
            return Err(err_config!("empty database path"));
        }

        // remove scheme from the URI
        uri = uri
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        let mut database_and_params = uri.splitn(2, '?');

        let database = database_and_params.next().unwrap_or_default();

        if database == ":memory:" {
            options.in_memory = true;
        } else if !database.is_empty() {
            // % decode to allow for `?` or `#` in the filename
            options.filename = Cow::Owned(
                Path::new(
                    &*percent_decode_str(database)
                        .decode_utf8()
                        .map_err(Error::config)?,
                )
                .to_path_buf(),
            );
        }

        if let Some(params) = database_and_params.next() {
            for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
                match &*key {
                    // The mode query parameter determines if the new database is opened read-only,
                    // read-write, read-write and created if it does not exist, or that the
                    // database is a pure in-memory database that never interacts with disk,
                    // respectively.
                    "mode" => match &*value {
                        "ro" => {
                            options.read_only = true;
                            options.create_if_missing = false;
                        }

                        "rw" => {
                            options.create_if_missing = false;
                        }

                        "rwc" => {
                            options.create_if_missing = true;
                        }

                        "memory" => {
                            options.in_memory = true;
                        }

                        _ => {
                            return Err(err_config!("unknown value {value:?} for `mode`"));
                        }
                    },

                    // The cache query parameter specifies the cache behaviour across multiple
                    // connections to the same database within the process. A shared cache is
                    // essential for persisting data across connections to an in-memory database.
                    "cache" => match &*value {
                        "private" => {
                            options.shared_cache = false;
                        }

                        "shared" => {
                            options.shared_cache = true;
                        }

                        _ => {
                            return Err(err_config!("unknown value {value:?} for `cache`"));
                        }
                    },

                    "immutable" => match &*value {
                        "true" | "1" => {
                            options.immutable = true;
                        }
                        "false" | "0" => {
                            options.immutable = false;
                        }
                        _ => {
                            return Err(err_config!("unknown value {value:?} for `immutable`"));
                        }
                    },

                    "vfs" => options.vfs = Some(Cow::Owned(value.into_owned())),

                    _ => {
                        return Err(err_config!(
                            "unknown query parameter `{key}` while parsing connection URI"
                        ));
                    }
                }
            }
        }

        Ok(options)
    }
}

#[test]
fn test_parse_in_memory() -> Result<(), Error> {
    let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
    assert!(options.in_memory);

    let options: SqliteConnectOptions = "sqlite://?mode=memory".parse()?;
    assert!(options.in_memory);

    let options: SqliteConnectOptions = "sqlite://:memory:".parse()?;
    assert!(options.in_memory);

    let options: SqliteConnectOptions = ":memory:".parse()?;
    assert!(options.in_memory);

    Ok(())
}

#[test]
fn test_parse_read_only() -> Result<(), Error> {
    let options: SqliteConnectOptions = "sqlite://a.db?mode=ro".parse()?;
    assert!(options.read_only);
    assert!(!options.create_if_missing);
    assert_eq!(&*options.filename.to_string_lossy(), "a.db");

    Ok(())
}

#[test]
fn test_parse_shared_in_memory() -> Result<(), Error> {
    let options: SqliteConnectOptions = "sqlite://a.db?cache=shared".parse()?;
    assert!(options.shared_cache);
    assert_eq!(&*options.filename.to_string_lossy(), "a.db");

    Ok(())
}

#[test]
fn test_parse_bare_path_and_vfs() -> Result<(), Error> {
    let options: SqliteConnectOptions = "/tmp/some%3Fname.db?vfs=unix-none&immutable=1".parse()?;
    assert_eq!(&*options.filename.to_string_lossy(), "/tmp/some?name.db");
    assert_eq!(options.vfs.as_deref(), Some("unix-none"));
    assert!(options.immutable);
    assert!(!options.in_memory);

    Ok(())
}

#[test]
fn test_parse_rejects_unknown_parameters() {
    let err = "sqlite://a.db?journal=wal"
        .parse::<SqliteConnectOptions>()
        .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::Configuration);

    let err = "sqlite://a.db?mode=rx"
        .parse::<SqliteConnectOptions>()
        .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::Configuration);

    assert!("".parse::<SqliteConnectOptions>().is_err());
}
