//! Common `colpart` errors.

use std::path::PathBuf;

/// Errors produced while assembling or appending to a part.
#[derive(Debug)]
pub enum Error {
    /// The same logical column was named twice in a sort key.
    DuplicateSortKeyColumn(String),
    /// `writeSuffix` is explicitly unsupported; only `finalize_and_get_manifest` commits a part.
    NotImplemented(&'static str),
    /// Rejected at construction: zero granularity, or `min_frame_bytes > max_frame_bytes`.
    InvalidConfig(String),
    /// `finalize_and_get_manifest` was called more than once, or a write happened after commit.
    AlreadyFinalized,
    /// The configured compression method has no codec available (feature not enabled).
    Compression(String),
    /// An I/O failure, with the file path it occurred against.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::DuplicateSortKeyColumn(name) => {
                write!(fmt, "duplicate sort key column: {}", name)
            }
            Error::NotImplemented(what) => write!(fmt, "not implemented: {}", what),
            Error::InvalidConfig(message) => write!(fmt, "invalid configuration: {}", message),
            Error::AlreadyFinalized => write!(fmt, "part was already finalized"),
            Error::Compression(message) => write!(fmt, "compression error: {}", message),
            Error::Io { path, source } => {
                write!(fmt, "I/O error at {}: {}", path.display(), source)
            }
        }
    }
}

/// Attaches a file path to an [`std::io::Error`], so callers get file context for free.
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
    Error::Io {
        path: path.into(),
        source,
    }
}

/// A specialized `Result` for `colpart` errors.
pub type Result<T> = std::result::Result<T, Error>;

macro_rules! bad_config {
    ($fmt:expr) => (crate::error::Error::InvalidConfig($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (crate::error::Error::InvalidConfig(format!($fmt, $($args),*)));
}
