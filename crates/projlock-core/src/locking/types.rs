//! Lock kinds, scope identifiers, and lock metrics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one lock scope, monotonically increasing per manager
pub type ScopeId = u64;

/// Kind of lock a scope holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Shared read access
    Read,
    /// Shared read access with the exclusive right to upgrade
    UpgradeableRead,
    /// Exclusive write access
    Write,
}

impl LockKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::UpgradeableRead => "upgradeable_read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lock-free counters for lock activity
#[derive(Debug, Default)]
pub struct LockMetrics {
    read_requests: AtomicU64,
    upgradeable_requests: AtomicU64,
    write_requests: AtomicU64,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    cancelled_waits: AtomicU64,
    timeouts: AtomicU64,
    upgrades: AtomicU64,
    checkouts: AtomicU64,
}

impl LockMetrics {
    /// Create a zeroed metrics tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self, kind: LockKind) {
        let counter = match kind {
            LockKind::Read => &self.read_requests,
            LockKind::UpgradeableRead => &self.upgradeable_requests,
            LockKind::Write => &self.write_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled_wait(&self) {
        self.cancelled_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upgrade(&self) {
        self.upgrades.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_checkout(&self) {
        self.checkouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an immutable snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            read_requests: self.read_requests.load(Ordering::Relaxed),
            upgradeable_requests: self.upgradeable_requests.load(Ordering::Relaxed),
            write_requests: self.write_requests.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            cancelled_waits: self.cancelled_waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            upgrades: self.upgrades.load(Ordering::Relaxed),
            checkouts: self.checkouts.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of lock metrics for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Read-lock acquisition requests
    pub read_requests: u64,
    /// Upgradeable-read acquisition requests
    pub upgradeable_requests: u64,
    /// Write-lock acquisition requests
    pub write_requests: u64,
    /// Successful acquisitions across all kinds
    pub acquisitions: u64,
    /// Releases across all kinds
    pub releases: u64,
    /// Waits aborted by cancellation
    pub cancelled_waits: u64,
    /// Waits aborted by the acquire timeout
    pub timeouts: u64,
    /// Upgradeable-read scopes upgraded to write
    pub upgrades: u64,
    /// Documents checked out for write
    pub checkouts: u64,
}

impl MetricsSnapshot {
    /// Total acquisition requests across all lock kinds
    pub fn acquire_requests(&self) -> u64 {
        self.read_requests + self.upgradeable_requests + self.write_requests
    }
}
