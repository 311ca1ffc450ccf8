//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`quick_xml::Error`]
    #[error(transparent)]
    XmlError(#[from] quick_xml::Error),

    /// a container level failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pack(tw_pack::error::Error),

    /// fewer bytes remain than a field needs
    #[error("field needs {needed} bytes at offset {position} but only {remaining} remain")]
    TruncatedField {
        needed: u64,
        remaining: u64,
        position: u64,
    },

    /// a stored or assigned value is not valid for its field
    #[error("invalid value {value:?} for {kind} field: {reason}")]
    InvalidFieldValue {
        kind: String,
        value: String,
        reason: String,
    },

    /// a candidate schema did not fit the data
    #[error("{0}")]
    SchemaMismatch(String),

    /// no known schema decodes the table
    #[error("no applicable type definition for {table} version {version}")]
    NoApplicableSchema {
        table: String,
        version: i32,
        /// Failure of each candidate, in the order they were tried
        failures: Vec<String>,
    },

    /// a schema document names a type that does not exist
    #[error("unknown field type {0:?}")]
    UnknownFieldType(String),

    /// a foreign key is not of the form `table.field`
    #[error("invalid field reference {0:?}")]
    #[diagnostic(help("references are written as table.field"))]
    InvalidReference(String),

    /// a schema document is structurally broken
    #[error("invalid schema document: {0}")]
    SchemaDocument(String),

    /// a row has no field of that name
    #[error("no field named {0:?}")]
    FieldNotFound(String),

    /// the registry knows nothing about a table
    #[error("no type definition available for {0}")]
    UnknownTable(String),
}

impl From<tw_pack::error::Error> for Error {
    fn from(value: tw_pack::error::Error) -> Self {
        match value {
            tw_pack::error::Error::TruncatedData {
                needed,
                remaining,
                position,
            } => Error::TruncatedField {
                needed,
                remaining,
                position,
            },
            other => Error::Pack(other),
        }
    }
}

impl Error {
    pub(crate) fn invalid_value(
        kind: impl ToString,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Error::InvalidFieldValue {
            kind: kind.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
