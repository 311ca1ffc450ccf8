//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file does not start with a known pack tag
    #[error("unknown container format {0:?}")]
    #[diagnostic(help("supported tags are PFH0, PFH2, PFH3, PFH4 and PFH5"))]
    UnknownContainerFormat(String),

    /// the fixed part of the header could not be read
    #[error("malformed pack header: {0}")]
    MalformedHeader(String),

    /// an index record could not be read
    #[error("malformed index record {entry}")]
    MalformedIndex {
        /// Position of the record in the index
        entry: u32,
        #[source]
        source: binrw::Error,
    },

    /// fewer bytes remain in the stream than a read requires
    #[error("needed {needed} bytes at offset {position} but only {remaining} remain")]
    TruncatedData {
        needed: u64,
        remaining: u64,
        position: u64,
    },

    /// a string is too long for its 16-bit length prefix
    #[error("string of {length} units does not fit a 16-bit length prefix")]
    StringTooLong { length: usize },

    /// an entry does not fit the 32-bit size field of the index
    #[error("entry {path} is too large to be packed ({size} bytes)")]
    EntryTooLarge { path: String, size: u64 },

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by path {0}
    #[error("by path {0}")]
    Path(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
