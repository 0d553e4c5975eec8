//! Crate-wide error type.
//!
//! Every fallible core entry point returns `Result<T, Error>`. The kinds
//! below are the language-neutral set the core is specified against; none
//! of them carry a recovery path, so callers should treat all of them as
//! terminal for the operation that raised them.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },

    #[snafu(display("{what} is already set"))]
    AlreadySet { what: String },

    #[snafu(display("label signature not found in first four sectors"))]
    NotFound,

    #[snafu(display("invalid data: {message}"))]
    InvalidData { message: String },

    #[snafu(display("unsupported: {message}"))]
    Unsupported { message: String },

    #[snafu(display("I/O error on {}: {source}", path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()))]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[snafu(display("offset out of bounds: {message}"))]
    OutOfBounds { message: String },

    #[snafu(display("arithmetic overflow: {message}"))]
    Overflow { message: String },
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn already_set(what: impl Into<String>) -> Self {
        Error::AlreadySet { what: what.into() }
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    pub(crate) fn out_of_bounds(message: impl Into<String>) -> Self {
        Error::OutOfBounds {
            message: message.into(),
        }
    }

    pub(crate) fn overflow(message: impl Into<String>) -> Self {
        Error::Overflow {
            message: message.into(),
        }
    }

    pub(crate) fn io(source: std::io::Error) -> Self {
        Error::Io { source, path: None }
    }

    pub(crate) fn io_at(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            source,
            path: Some(path.into()),
        }
    }
}
