use std::fmt::{self, Display, Formatter};

/// Metadata for one result column of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteColumn {
    pub(crate) name: String,
    pub(crate) ordinal: usize,
    pub(crate) decl_type: Option<String>,
    pub(crate) origin: Option<ColumnOrigin>,
}

impl SqliteColumn {
    /// Gets the column ordinal.
    ///
    /// This can be used to unambiguously refer to this column within a row in case more than
    /// one column have the same name
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Gets the column name or alias.
    ///
    /// The column name is unreliable (and can change between database minor versions) if this
    /// column is an expression that has not been aliased.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type this column was declared with in `CREATE TABLE`, as the engine reports it.
    ///
    /// The spelling is kept but the case may not be; compare case-insensitively.
    ///
    /// `None` for expressions and subqueries.
    pub fn decl_type(&self) -> Option<&str> {
        self.decl_type.as_deref()
    }

    /// The table column this result column reads from, if it is a plain column reference.
    pub fn origin(&self) -> Option<&ColumnOrigin> {
        self.origin.as_ref()
    }

    /// The type affinity implied by the declared type.
    ///
    /// This is a property of the column; the values in a given row may still have any
    /// storage class.
    pub fn affinity(&self) -> Affinity {
        self.decl_type
            .as_deref()
            .map_or(Affinity::Blob, Affinity::from_decl_type)
    }
}

/// Where a result column came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOrigin {
    pub database: String,
    pub table: String,
    pub column: String,
}

/// Column type affinity.
///
/// <https://www.sqlite.org/datatype3.html#type_affinity>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    Text,
    Numeric,
    Integer,
    Real,
    Blob,
}

impl Affinity {
    // <https://www.sqlite.org/datatype3.html#determination_of_column_affinity>
    pub fn from_decl_type(decl: &str) -> Self {
        let s = decl.to_ascii_lowercase();

        match &*s {
            _ if s.contains("int") => Affinity::Integer,

            _ if s.contains("char") || s.contains("clob") || s.contains("text") => Affinity::Text,

            _ if s.contains("blob") || s.trim().is_empty() => Affinity::Blob,

            _ if s.contains("real") || s.contains("floa") || s.contains("doub") => Affinity::Real,

            _ => Affinity::Numeric,
        }
    }
}

impl Display for Affinity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Affinity::Text => "TEXT",
            Affinity::Numeric => "NUMERIC",
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Blob => "BLOB",
        })
    }
}

#[test]
fn test_affinity_from_decl_type() {
    assert_eq!(Affinity::Integer, Affinity::from_decl_type("INT"));
    assert_eq!(Affinity::Integer, Affinity::from_decl_type("INTEGER"));
    assert_eq!(Affinity::Integer, Affinity::from_decl_type("UNSIGNED BIG INT"));
    assert_eq!(Affinity::Integer, Affinity::from_decl_type("MEDIUMINT"));
    // "int" wins over "point"
    assert_eq!(Affinity::Integer, Affinity::from_decl_type("FLOATING POINT"));

    assert_eq!(Affinity::Text, Affinity::from_decl_type("CHARACTER(20)"));
    assert_eq!(Affinity::Text, Affinity::from_decl_type("NCHAR(55)"));
    assert_eq!(Affinity::Text, Affinity::from_decl_type("text"));
    assert_eq!(Affinity::Text, Affinity::from_decl_type("CLOB"));

    assert_eq!(Affinity::Blob, Affinity::from_decl_type("BLOB"));
    assert_eq!(Affinity::Blob, Affinity::from_decl_type(""));

    assert_eq!(Affinity::Real, Affinity::from_decl_type("REAL"));
    assert_eq!(Affinity::Real, Affinity::from_decl_type("DOUBLE PRECISION"));

    assert_eq!(Affinity::Numeric, Affinity::from_decl_type("DECIMAL(10,5)"));
    assert_eq!(Affinity::Numeric, Affinity::from_decl_type("BOOLEAN"));
    assert_eq!(Affinity::Numeric, Affinity::from_decl_type("STRING"));
}
