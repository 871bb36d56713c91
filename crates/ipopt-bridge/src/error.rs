//! Error types for the bridge.

use std::path::PathBuf;
use thiserror::Error;

use crate::status::StatusError;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which bounds pair a construction error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsKind {
    Variables,
    Constraints,
}

impl std::fmt::Display for BoundsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundsKind::Variables => write!(f, "variable"),
            BoundsKind::Constraints => write!(f, "constraint"),
        }
    }
}

/// Errors from bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Lower and upper bounds of one pair differ in length.
    #[error("{kind} bounds have {lower} lower and {upper} upper entries")]
    DimensionMismatch {
        kind: BoundsKind,
        lower: usize,
        upper: usize,
    },

    /// A dimension or nonzero count does not fit the native index type.
    #[error("{what} = {value} exceeds the native index range")]
    SizeOverflow { what: &'static str, value: usize },

    /// The native solver returned a null problem.
    #[error("native solver could not create a problem")]
    CreateFailed,

    /// Option key or value cannot be passed as a C string.
    #[error("option text {text:?} contains an interior NUL byte")]
    InvalidOptionText { text: String },

    /// The native solver could not open an output file.
    #[error("native solver could not open output file {path}")]
    OutputFile { path: PathBuf },

    /// A scaling vector has the wrong length.
    #[error("{what} scaling has {actual} entries, expected {expected}")]
    ScalingLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A working buffer passed to solve has the wrong length.
    #[error("{buffer} buffer has {actual} entries, expected {expected}")]
    BufferLength {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The native solver terminated with a non-success status.
    #[error(transparent)]
    Terminated(#[from] StatusError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// The termination status, if this error came from a solve.
    pub fn status(&self) -> Option<&StatusError> {
        match self {
            Error::Terminated(status) => Some(status),
            _ => None,
        }
    }
}
