//! Error taxonomy for the self-update engine

use std::path::PathBuf;

use apictl_core::retry::HttpStatusPredicate;
use thiserror::Error;

use crate::descriptor::Platform;
use crate::version::{ParseError, Version};

/// Result type alias for update operations
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Every way an update can fail
///
/// The coordinator stops at the first failure and hands the error back
/// unchanged, so callers can match on the exact kind.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Version text or fields were malformed
    #[error("invalid version: {0}")]
    Parse(#[from] ParseError),

    /// The update service answered with an error
    #[error("update service error ({code}): {message}")]
    Oracle { code: String, message: String },

    /// Transport failure or truncated body
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status while fetching
    #[error("server returned HTTP {status} for {url}")]
    Server { status: u16, url: String },

    /// The operation was cancelled by the caller
    #[error("update cancelled")]
    Cancelled,

    /// The staging area could not be written
    #[error("failed to write staging file {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Downloaded bytes do not hash to the advertised digest
    #[error("sha256 mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// A signature is required but the artifact carries none
    #[error("artifact is not signed and unsigned updates are not allowed")]
    SignatureMissing,

    /// The artifact signature could not be checked or did not verify
    #[error("artifact signature rejected: {0}")]
    SignatureInvalid(String),

    /// The configured trusted public key is unusable
    #[error("invalid trusted public key: {0}")]
    InvalidPublicKey(String),

    /// The artifact was built for another platform
    #[error("artifact is for {actual}, this machine is {expected}")]
    PlatformMismatch { expected: Platform, actual: Platform },

    /// The candidate does not have strictly higher precedence
    #[error("refusing to install {candidate}: not newer than {current}")]
    NotNewer { current: Version, candidate: Version },

    /// Another update holds the lock
    #[error("another update is in progress (lock held at {})", path.display())]
    Locked { path: PathBuf },

    /// The live binary could not be moved aside; it is untouched
    #[error("failed to back up {}: {source}", target.display())]
    BackupFailed {
        target: PathBuf,
        source: std::io::Error,
    },

    /// The swap failed and the previous binary was restored
    #[error("update of {} failed and was rolled back: {reason}", target.display())]
    SwapFailed { target: PathBuf, reason: String },

    /// The swap failed and the previous binary could not be restored
    #[error(
        "update of {} failed and rollback did not complete: {reason}; the previous binary is at {}",
        target.display(),
        backup.display()
    )]
    Fatal {
        target: PathBuf,
        backup: PathBuf,
        reason: String,
    },
}

impl UpdateError {
    pub(crate) fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt at the fetch could succeed
    ///
    /// Only transport failures and transient HTTP statuses qualify.
    /// Integrity and install failures are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpdateError::Network(_) => true,
            UpdateError::Server { status, .. } => {
                HttpStatusPredicate::default_http().is_retryable_code(*status)
            }
            _ => false,
        }
    }

    /// The installation may be broken and needs manual recovery
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpdateError::Fatal { .. })
    }
}
