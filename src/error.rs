//! Error types.

use std::fmt;
use std::net::AddrParseError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for hosts synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Boxed error returned by cluster query implementations.
pub type QueryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by hosts synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No pod matching the selector reported a ready condition.
    #[error("registry address not found (namespace {namespace}, selector {selector})")]
    ResolutionNotFound {
        /// Namespace that was queried.
        namespace: String,
        /// Rendered label selector.
        selector: String,
    },

    /// The cluster query itself failed.
    #[error("cluster query failed: {0}")]
    Query(#[source] QueryError),

    /// The cluster query did not answer within the configured deadline.
    #[error("cluster query timed out after {timeout:?}")]
    QueryTimeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// A start marker was found without a matching end marker.
    #[error("wrong hosts file {path}: found start of section, but no end of section")]
    StructuralIntegrity {
        /// The hosts file carrying the broken section.
        path: PathBuf,
    },

    /// Filesystem I/O failed (typically `PermissionDenied` on `/etc/hosts`).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A label selector could not be parsed.
    #[error("invalid label selector: {0}")]
    InvalidSelector(String),

    /// Invalid configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Stable classification used as the `kind` field of log records.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ResolutionNotFound { .. } => ErrorKind::ResolutionNotFound,
            Self::Query(_) | Self::QueryTimeout { .. } => ErrorKind::QueryFailure,
            Self::StructuralIntegrity { .. } => ErrorKind::StructuralIntegrity,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::InvalidSelector(_) | Self::InvalidConfig(_) => ErrorKind::InvalidInput,
        }
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied
        )
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Coarse error categories, one per recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ResolutionNotFound,
    QueryFailure,
    StructuralIntegrity,
    IoFailure,
    InvalidInput,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolutionNotFound => "resolution_not_found",
            Self::QueryFailure => "query_failure",
            Self::StructuralIntegrity => "structural_integrity",
            Self::IoFailure => "io_failure",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-comment hosts line whose first field is not an IP address.
///
/// Stored on the offending [`HostsLine`](crate::HostsLine); the line itself
/// is kept verbatim and never fails a load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bad hosts line: {raw:?}")]
pub struct LineParseError {
    /// The full line as read.
    pub raw: String,
    #[source]
    pub source: AddrParseError,
}
