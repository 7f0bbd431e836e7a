// # Tracked Store Trait
//
// Defines the interface for persistent identity tracking.
//
// ## Purpose
//
// Remote identifiers are assigned at creation and are the only handle
// for read/update/delete calls. The tracked store persists, per
// declared resource name:
// - The remote-assigned identifier
// - The zone it belongs to (for records)
// - The timestamp of the last successful convergence
//
// This is what lets a restarted daemon pick up resources it created
// in an earlier run instead of creating duplicates.
//
// ## Identity Contract
//
// Identity is recorded only after a successful create and removed
// only after a confirmed delete. A failed delete keeps the entry so
// the next convergence can retry; a failed lookup evicts it, handing
// the resource back to the create path.
//
// ## Implementations
//
// - Memory: non-persistent, for tests and disposable deployments
// - File: JSON with atomic writes and backup recovery
//
// ## Implementation Guidelines
//
// - **Async I/O only**: never block the runtime
// - **Explicit flush**: `flush()` must persist all pending changes
// - **Thread-safe**: all methods safe to call concurrently
// - **No background tasks**: periodic flushing belongs to the engine

use async_trait::async_trait;

/// Tracked identity for a declared DNS record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrackedRecord {
    /// Remote-assigned record identifier
    pub id: i64,
    /// Zone the record belongs to
    pub domain: String,
    /// Hostname as last projected
    pub hostname: String,
    /// Timestamp of the last successful convergence
    pub last_synced: chrono::DateTime<chrono::Utc>,
}

impl TrackedRecord {
    pub fn new(id: i64, domain: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            id,
            domain: domain.into(),
            hostname: hostname.into(),
            last_synced: chrono::Utc::now(),
        }
    }
}

/// Tracked identity for a declared security group
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrackedGroup {
    /// Remote-assigned group identifier
    pub id: String,
    /// Timestamp of the last successful convergence
    pub last_synced: chrono::DateTime<chrono::Utc>,
}

impl TrackedGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_synced: chrono::Utc::now(),
        }
    }
}

/// Trait for tracked-identity store implementations
///
/// Entries are keyed by the declared resource name from configuration,
/// not by remote identifier: the declared name is the stable handle
/// across runs, the remote id is what gets looked up.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait TrackedStore: Send + Sync {
    /// Get the tracked identity for a declared record
    async fn get_record(&self, name: &str) -> Result<Option<TrackedRecord>, crate::Error>;

    /// Record identity after a successful create or refresh
    async fn set_record(&self, name: &str, record: &TrackedRecord) -> Result<(), crate::Error>;

    /// Drop a record's identity (confirmed delete or failed lookup)
    async fn delete_record(&self, name: &str) -> Result<(), crate::Error>;

    /// List all tracked record names
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Get the tracked identity for a declared security group
    async fn get_group(&self, name: &str) -> Result<Option<TrackedGroup>, crate::Error>;

    /// Record group identity after a successful create
    async fn set_group(&self, name: &str, group: &TrackedGroup) -> Result<(), crate::Error>;

    /// Drop a group's identity
    async fn delete_group(&self, name: &str) -> Result<(), crate::Error>;

    /// List all tracked group names
    async fn list_groups(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations buffer writes. This ensures all changes
    /// are flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing tracked stores from configuration
///
/// Construction is async because file-backed stores load and recover
/// their state on open.
#[async_trait]
pub trait TrackedStoreFactory: Send + Sync {
    /// Create a TrackedStore instance from configuration
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<Box<dyn TrackedStore>, crate::Error>;
}
