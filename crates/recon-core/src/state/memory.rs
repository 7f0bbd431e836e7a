// # Memory Tracked Store
//
// In-memory implementation of TrackedStore.
//
// ## Crash Behavior
//
// - All tracked identity is lost on restart/crash
// - The first convergence after a restart will re-create every
//   declared resource, potentially duplicating records the previous
//   run already created
//
// ## When to Use
//
// - Testing environments
// - One-shot convergence runs against an empty account

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::state_store::{TrackedGroup, TrackedRecord, TrackedStore, TrackedStoreFactory};
use crate::Error;

/// In-memory tracked store implementation
///
/// Stores all tracked identity in HashMaps protected by a RwLock.
/// Provides no persistence across restarts.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrackedStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, TrackedRecord>,
    groups: HashMap<String, TrackedGroup>,
}

impl MemoryTrackedStore {
    /// Create a new empty memory tracked store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of tracked entries (records + groups)
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.records.len() + guard.groups.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clear all tracked identity
    pub async fn clear(&self) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.records.clear();
        guard.groups.clear();
        Ok(())
    }
}

#[async_trait]
impl TrackedStore for MemoryTrackedStore {
    async fn get_record(&self, name: &str) -> Result<Option<TrackedRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.records.get(name).cloned())
    }

    async fn set_record(&self, name: &str, record: &TrackedRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.records.insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, name: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.records.remove(name);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.records.keys().cloned().collect())
    }

    async fn get_group(&self, name: &str) -> Result<Option<TrackedGroup>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.groups.get(name).cloned())
    }

    async fn set_group(&self, name: &str, group: &TrackedGroup) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.groups.insert(name.to_string(), group.clone());
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.groups.remove(name);
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.groups.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for memory tracked stores
pub struct MemoryTrackedStoreFactory;

#[async_trait]
impl TrackedStoreFactory for MemoryTrackedStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn TrackedStore>, Error> {
        Ok(Box::new(MemoryTrackedStore::new()))
    }
}
