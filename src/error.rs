use std::path::PathBuf;
use thiserror::Error;

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a cleaning pass, an archive job or the server.
///
/// Failures on a single file are caught by the pipeline and recorded as
/// an errored outcome; only the remaining cases reach the caller.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Filesystem failure on a specific path.
    #[error("Cannot access '{path}': {message}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Rejected settings.
    #[error("Bad configuration: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// A source file that is not UTF-8 text.
    #[error("'{path}' is not valid UTF-8 source")]
    InvalidUtf8 {
        /// Source file
        path: PathBuf,
    },

    /// The archive could not be read, extracted or written.
    #[error("Archive error in '{path}': {message}")]
    Archive {
        /// Archive path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The dead-code oracle failed or returned an unusable answer.
    #[error("Oracle '{oracle}' failed: {message}")]
    Oracle {
        /// Oracle name
        oracle: String,
        /// Error message
        message: String,
    },

    /// An uploaded file was rejected before a job was created.
    #[error("{message}")]
    InvalidUpload {
        /// Message shown to the client
        message: String,
    },

    /// The HTTP service could not start or stopped unexpectedly.
    #[error("Server error: {message}")]
    Server {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Wraps an IO failure on `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Configuration rejected for `message`.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// `path` did not decode as UTF-8.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates an archive error.
    #[must_use]
    pub fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates an oracle error.
    #[must_use]
    pub fn oracle(oracle: impl Into<String>, message: impl ToString) -> Self {
        Self::Oracle {
            oracle: oracle.into(),
            message: message.to_string(),
        }
    }

    /// Creates an upload validation error.
    #[must_use]
    pub fn invalid_upload(message: impl Into<String>) -> Self {
        Self::InvalidUpload {
            message: message.into(),
        }
    }

    /// Creates a server error.
    #[must_use]
    pub fn server(message: impl ToString) -> Self {
        Self::Server {
            message: message.to_string(),
        }
    }

    /// Returns true for filesystem failures.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true for rejected settings.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is an archive error.
    #[must_use]
    pub const fn is_archive(&self) -> bool {
        matches!(self, Self::Archive { .. })
    }

    /// Returns true if the error was caused by client input.
    #[must_use]
    pub const fn is_invalid_upload(&self) -> bool {
        matches!(self, Self::InvalidUpload { .. })
    }
}
