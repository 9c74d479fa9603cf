//! Error types for the access-coordination layer

use crate::locking::LockKind;
use thiserror::Error;

/// Result type alias using the crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Coordination errors, grouped by failure stage
#[derive(Error, Debug)]
pub enum Error {
    // Precondition errors (E000-E099): raised before any lock is requested
    #[error("Precondition violated: {0}")]
    Precondition(String),

    // Acquisition errors (E100-E199): raised while waiting for a lock
    #[error("Cancelled while waiting for {kind} lock")]
    Cancelled { kind: LockKind },

    #[error("Timed out waiting for {kind} lock after {waited_ms} ms")]
    Timeout { kind: LockKind, waited_ms: u64 },

    // Protocol errors (E200-E299): raised under a held lock
    #[error("Document '{path}' is not checked out in this write scope")]
    NotCheckedOut { path: String },

    #[error("Document scope is no longer held: {0}")]
    ScopeReleased(String),

    // Resolution errors (E300-E399): external collaborator failures
    #[error("Failed to load document '{path}': {source}")]
    DocumentLoad {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Checkout of '{path}' failed: {source}")]
    Checkout {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Evaluation of '{path}' ({configuration}) failed: {source}")]
    Evaluation {
        path: String,
        configuration: String,
        #[source]
        source: anyhow::Error,
    },

    // Dispatch errors (E400-E499)
    #[error("Locked operation was aborted by the runtime: {0}")]
    Dispatch(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the stable error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "E001",
            Self::Cancelled { .. } => "E100",
            Self::Timeout { .. } => "E101",
            Self::NotCheckedOut { .. } => "E200",
            Self::ScopeReleased(_) => "E201",
            Self::DocumentLoad { .. } => "E300",
            Self::Checkout { .. } => "E301",
            Self::Evaluation { .. } => "E302",
            Self::Dispatch(_) => "E400",
            Self::Other(_) => "E900",
        }
    }

    /// Shorthand for a precondition violation
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Shorthand for a caller-supplied failure
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether this error is a cancelled lock wait (safe to retry)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::precondition("missing path").code(), "E001");
        assert_eq!(Error::Cancelled { kind: LockKind::Read }.code(), "E100");
        assert_eq!(
            Error::Timeout {
                kind: LockKind::Write,
                waited_ms: 30_000
            }
            .code(),
            "E101"
        );
        assert_eq!(
            Error::NotCheckedOut {
                path: "a.proj".to_string()
            }
            .code(),
            "E200"
        );
        assert_eq!(Error::other("boom").code(), "E900");
    }

    #[test]
    fn test_cancelled_display_names_the_kind() {
        let err = Error::Cancelled {
            kind: LockKind::UpgradeableRead,
        };
        assert!(err.to_string().contains("upgradeable_read"));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_resolution_error_carries_source() {
        let err = Error::DocumentLoad {
            path: "app/app.proj".to_string(),
            source: anyhow::anyhow!("no such file"),
        };
        assert_eq!(err.code(), "E300");
        assert!(err.to_string().contains("app/app.proj"));
        assert!(err.to_string().contains("no such file"));
    }
}
