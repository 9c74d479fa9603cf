//! Lock lifecycle events
//!
//! Events for observing lock activity: acquisitions, upgrades, checkouts,
//! releases, and aborted waits. Published on a broadcast channel; see
//! [`crate::coordinator::ProjectCoordinator::subscribe`].

use crate::locking::types::{LockKind, ScopeId};
use crate::model::ProjectPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of lock event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockEventKind {
    /// A read lock was acquired
    ReadAcquired,
    /// An upgradeable-read lock was acquired
    UpgradeableReadAcquired,
    /// A write lock was acquired
    WriteAcquired,
    /// An upgradeable-read scope was upgraded to a write scope
    Upgraded,
    /// A lock scope was released
    Released,
    /// A document was checked out for write
    CheckedOut,
    /// A lock wait was aborted by cancellation
    WaitCancelled,
    /// A lock wait was aborted by the acquire timeout
    WaitTimedOut,
}

impl LockEventKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadAcquired => "read_acquired",
            Self::UpgradeableReadAcquired => "upgradeable_read_acquired",
            Self::WriteAcquired => "write_acquired",
            Self::Upgraded => "upgraded",
            Self::Released => "released",
            Self::CheckedOut => "checked_out",
            Self::WaitCancelled => "wait_cancelled",
            Self::WaitTimedOut => "wait_timed_out",
        }
    }
}

impl std::fmt::Display for LockEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lock lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEvent {
    /// Unique event identifier
    pub id: Uuid,
    /// The lock scope this event belongs to
    pub scope: ScopeId,
    /// Type of event
    pub kind: LockEventKind,
    /// Document path, for document-scoped events
    pub path: Option<String>,
    /// Event data
    pub data: Option<serde_json::Value>,
    /// When the event occurred
    pub created_at: DateTime<Utc>,
}

impl LockEvent {
    /// Create a new lock event
    pub fn new(scope: ScopeId, kind: LockEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            kind,
            path: None,
            data: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a document path
    pub fn with_path(mut self, path: &ProjectPath) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Attach event data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Create an acquisition event for the given lock kind
    pub fn acquired(scope: ScopeId, kind: LockKind) -> Self {
        let event_kind = match kind {
            LockKind::Read => LockEventKind::ReadAcquired,
            LockKind::UpgradeableRead => LockEventKind::UpgradeableReadAcquired,
            LockKind::Write => LockEventKind::WriteAcquired,
        };
        Self::new(scope, event_kind)
    }

    /// Create a release event
    pub fn released(scope: ScopeId, explicit: bool) -> Self {
        Self::new(scope, LockEventKind::Released)
            .with_data(serde_json::json!({ "explicit": explicit }))
    }

    /// Create an upgrade event
    pub fn upgraded(scope: ScopeId) -> Self {
        Self::new(scope, LockEventKind::Upgraded)
    }

    /// Create a checkout event
    pub fn checked_out(scope: ScopeId, path: &ProjectPath) -> Self {
        Self::new(scope, LockEventKind::CheckedOut).with_path(path)
    }

    /// Create a cancelled-wait event
    pub fn wait_cancelled(scope: ScopeId, kind: LockKind) -> Self {
        Self::new(scope, LockEventKind::WaitCancelled)
            .with_data(serde_json::json!({ "kind": kind.as_str() }))
    }

    /// Create a timed-out-wait event
    pub fn wait_timed_out(scope: ScopeId, kind: LockKind) -> Self {
        Self::new(scope, LockEventKind::WaitTimedOut)
            .with_data(serde_json::json!({ "kind": kind.as_str() }))
    }
}
