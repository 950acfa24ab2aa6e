/*!
Error types for Depot repositories.

Every backend reports failures through the same three kinds so that callers
can handle a missing artifact, a failed read and a failed write uniformly,
whatever the storage behind the repository.
*/

use std::io;
use thiserror::Error;

/// Result type used throughout Depot.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors returned by repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The operation required an existing resource that is absent
    #[error("Does not exist: {0}")]
    NotFound(String),

    /// Reading, copying or traversing existing content failed
    #[error("Read error: {0}")]
    Read(String),

    /// Creating, writing, packing or deleting content failed
    #[error("Write error: {0}")]
    Write(String),

    /// The repository could not be constructed from its configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`RepositoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Read,
    Write,
    Config,
}

impl RepositoryError {
    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new read error
    pub fn read<S: Into<String>>(msg: S) -> Self {
        Self::Read(msg.into())
    }

    /// Create a new write error
    pub fn write<S: Into<String>>(msg: S) -> Self {
        Self::Write(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Classify an I/O failure that happened while reading a resource which
    /// is expected to exist. Absence maps to `NotFound`, anything else to `Read`.
    pub fn on_read(context: impl std::fmt::Display, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(format!("{context}: {err}"))
        } else {
            Self::Read(format!("{context}: {err}"))
        }
    }

    /// Classify an I/O failure that happened while creating, writing or
    /// deleting. Always a `Write` error.
    pub fn on_write(context: impl std::fmt::Display, err: io::Error) -> Self {
        Self::Write(format!("{context}: {err}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Read(_) => ErrorKind::Read,
            Self::Write(_) => ErrorKind::Write,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
