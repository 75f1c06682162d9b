use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::blob::BlobDescriptor;
use crate::column::SqliteColumn;
use crate::error::{Error, Result};
use crate::types::Decode;
use crate::value::SqliteValue;

/// One value of a row: either copied out of the engine, or left in place because it is a
/// large BLOB that can be streamed instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Inline(SqliteValue),
    Stream(BlobDescriptor),
}

/// A single row produced by [`SqliteStatement::step()`][crate::SqliteStatement::step].
///
/// The row owns its values; it stays valid after the statement moves on.
#[derive(Debug, Clone)]
pub struct SqliteRow {
    pub(crate) values: Box<[ColumnValue]>,
    pub(crate) columns: Arc<Vec<SqliteColumn>>,
    pub(crate) column_names: Arc<HashMap<String, usize>>,
}

impl SqliteRow {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[SqliteColumn] {
        &self.columns
    }

    /// Index into the row and decode a single value.
    ///
    /// # Panics
    ///
    /// Panics if the column does not exist or its value cannot be decoded into the requested
    /// type. See [`try_get`](Self::try_get) for a non-panicking version.
    #[track_caller]
    pub fn get<'r, T, I>(&'r self, index: I) -> T
    where
        I: ColumnIndex<Self>,
        T: Decode<'r>,
    {
        self.try_get::<T, I>(index).unwrap_or_else(|error| panic!("{error}"))
    }

    /// Index into the row and decode a single value.
    ///
    /// A streamed BLOB column has no inline value; decoding it fails with
    /// [`Error::TypeMismatch`]. Use [`blob_stream()`](Self::blob_stream) for those.
    pub fn try_get<'r, T, I>(&'r self, index: I) -> Result<T>
    where
        I: ColumnIndex<Self>,
        T: Decode<'r>,
    {
        let index = index.index(self)?;

        match &self.values[index] {
            ColumnValue::Inline(value) => T::decode(value),
            ColumnValue::Stream(blob) => Err(Error::mismatched_types(
                std::any::type_name::<T>(),
                &format!("streamed BLOB of {} bytes", blob.len()),
            )),
        }
    }

    /// The raw value of a column.
    pub fn value<I: ColumnIndex<Self>>(&self, index: I) -> Result<&ColumnValue> {
        let index = index.index(self)?;
        Ok(&self.values[index])
    }

    /// The stream descriptor of a large BLOB column, or `None` if the value was copied
    /// into the row.
    pub fn blob_stream<I: ColumnIndex<Self>>(&self, index: I) -> Result<Option<&BlobDescriptor>> {
        match self.value(index)? {
            ColumnValue::Stream(blob) => Ok(Some(blob)),
            ColumnValue::Inline(_) => Ok(None),
        }
    }

    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }
}

/// A type that can be used to index into a [`SqliteRow`].
///
/// The [`get`] and [`try_get`] methods of [`SqliteRow`] accept any type that implements
/// `ColumnIndex`. This trait is implemented for strings which are used to look up a column by
/// name, and for `usize` which is used as a positional index into the row.
///
/// [`get`]: SqliteRow::get
/// [`try_get`]: SqliteRow::try_get
pub trait ColumnIndex<T: ?Sized>: Debug {
    /// Returns a valid positional index into the row, [`ColumnIndexOutOfBounds`], or,
    /// [`ColumnNotFound`].
    ///
    /// [`ColumnNotFound`]: Error::ColumnNotFound
    /// [`ColumnIndexOutOfBounds`]: Error::ColumnIndexOutOfBounds
    fn index(&self, container: &T) -> Result<usize>;
}

impl ColumnIndex<SqliteRow> for usize {
    fn index(&self, row: &SqliteRow) -> Result<usize> {
        let len = row.len();

        if *self >= len {
            return Err(Error::ColumnIndexOutOfBounds { len, index: *self });
        }

        Ok(*self)
    }
}

impl ColumnIndex<SqliteRow> for &'_ str {
    fn index(&self, row: &SqliteRow) -> Result<usize> {
        row.column_names
            .get(*self)
            .ok_or_else(|| Error::ColumnNotFound((*self).into()))
            .copied()
    }
}
