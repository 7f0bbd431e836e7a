//! Test doubles and common utilities for architecture contract tests
//!
//! The mock clients keep an in-memory rendition of the remote system
//! so tests can assert on call counts, recorded payloads, and the
//! state the remote would end up in.

#![allow(dead_code)]

use recon_core::config::{EngineConfig, ReconConfig, RecordSpec, StateStoreConfig};
use recon_core::error::{Error, Result};
use recon_core::resource::{
    DesiredRecord, ObservedSecurityGroup, RecordPayload, RecordResponse, RecordType,
    SecurityGroupSpec,
};
use recon_core::traits::{ComputeApi, DnsApi, TrackedGroup, TrackedRecord, TrackedStore};
use recon_core::{ClientConfig, MemoryTrackedStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Remote-side TTL default applied when a create omits it
pub const REMOTE_DEFAULT_TTL: i64 = 3600;

/// A mock DnsApi backed by an in-memory record table
///
/// Cloning shares all interior state, so one clone can be boxed into
/// an engine while the test keeps another to inspect.
#[derive(Clone, Default)]
pub struct MockDnsApi {
    /// The "remote" record table, keyed by assigned id
    records: Arc<Mutex<HashMap<i64, RecordResponse>>>,
    /// Next id the remote assigns
    next_id: Arc<AtomicI64>,
    /// Call counters per verb
    create_call_count: Arc<AtomicUsize>,
    get_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    delete_call_count: Arc<AtomicUsize>,
    /// Recorded outbound payloads
    created_payloads: Arc<Mutex<Vec<RecordPayload>>>,
    updated_payloads: Arc<Mutex<Vec<RecordPayload>>>,
    /// When set, deletes fail with a remote error
    fail_deletes: Arc<AtomicBool>,
    /// When set, deletes are acknowledged but the record stays put
    ghost_deletes: Arc<AtomicBool>,
    /// When set, lookups fail with an indeterminate remote error
    fail_lookups: Arc<AtomicBool>,
}

impl MockDnsApi {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.next_id.store(1000, Ordering::SeqCst);
        mock
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    /// Outbound payloads recorded from create calls
    pub fn created_payloads(&self) -> Vec<RecordPayload> {
        self.created_payloads.lock().unwrap().clone()
    }

    /// Outbound payloads recorded from update calls
    pub fn updated_payloads(&self) -> Vec<RecordPayload> {
        self.updated_payloads.lock().unwrap().clone()
    }

    /// Make every delete fail with a remote error
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Acknowledge deletes without actually removing the record
    pub fn ghost_deletes(&self, ghost: bool) {
        self.ghost_deletes.store(ghost, Ordering::SeqCst);
    }

    /// Make every lookup fail with an indeterminate remote error
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Plant a record directly in the "remote" table
    pub fn seed_record(&self, record: RecordResponse) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    /// Mutate a remote record's content out from under the engine
    pub fn alter_record_content(&self, id: i64, content: &str) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.content = content.to_string();
        }
    }

    /// Drop a record from the "remote" table without going through
    /// the API (simulates out-of-band deletion)
    pub fn remove_record(&self, id: i64) {
        self.records.lock().unwrap().remove(&id);
    }

    /// True if the "remote" table holds a record with this id
    pub fn has_record(&self, id: i64) -> bool {
        self.records.lock().unwrap().contains_key(&id)
    }

    /// All remote record ids, for locating what a create assigned
    pub fn record_ids(&self) -> Vec<i64> {
        self.records.lock().unwrap().keys().copied().collect()
    }
}

#[async_trait::async_trait]
impl DnsApi for MockDnsApi {
    async fn create_record(&self, _domain: &str, payload: &RecordPayload) -> Result<RecordResponse> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        self.created_payloads.lock().unwrap().push(payload.clone());

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = RecordResponse {
            id,
            name: payload.name.clone(),
            record_type: payload.record_type,
            content: payload.content.clone(),
            ttl: payload.ttl.unwrap_or(REMOTE_DEFAULT_TTL),
            prio: payload.prio.unwrap_or(0),
        };

        self.records.lock().unwrap().insert(id, response.clone());
        Ok(response)
    }

    async fn get_record(&self, _domain: &str, id: i64) -> Result<RecordResponse> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::remote("mock", "lookup outage"));
        }

        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("record {}", id)))
    }

    async fn update_record(&self, _domain: &str, payload: &RecordPayload) -> Result<RecordResponse> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.updated_payloads.lock().unwrap().push(payload.clone());

        let id = payload
            .id
            .ok_or_else(|| Error::validation("update payload must carry the record id"))?;

        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&id) {
            return Err(Error::not_found(format!("record {}", id)));
        }

        let response = RecordResponse {
            id,
            name: payload.name.clone(),
            record_type: payload.record_type,
            content: payload.content.clone(),
            ttl: payload.ttl.unwrap_or(REMOTE_DEFAULT_TTL),
            prio: payload.prio.unwrap_or(0),
        };

        records.insert(id, response.clone());
        Ok(response)
    }

    async fn delete_record(&self, _domain: &str, id: i64) -> Result<()> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::remote("mock", "delete outage"));
        }

        if self.ghost_deletes.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.records
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("record {}", id)))
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock ComputeApi backed by an in-memory group table
#[derive(Clone, Default)]
pub struct MockComputeApi {
    /// The "remote" group table, keyed by assigned id
    groups: Arc<Mutex<HashMap<String, ObservedSecurityGroup>>>,
    /// Next id suffix the remote assigns
    next_id: Arc<AtomicI64>,
    create_call_count: Arc<AtomicUsize>,
    get_call_count: Arc<AtomicUsize>,
    delete_call_count: Arc<AtomicUsize>,
    fail_deletes: Arc<AtomicBool>,
    ghost_deletes: Arc<AtomicBool>,
}

impl MockComputeApi {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.next_id.store(1, Ordering::SeqCst);
        mock
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Acknowledge deletes without actually removing the group
    pub fn ghost_deletes(&self, ghost: bool) {
        self.ghost_deletes.store(ghost, Ordering::SeqCst);
    }

    /// Mutate a remote group's description out from under the engine
    pub fn alter_group_description(&self, id: &str, description: &str) {
        if let Some(group) = self.groups.lock().unwrap().get_mut(id) {
            group.description = description.to_string();
        }
    }

    /// Drop a group without going through the API
    pub fn remove_group(&self, id: &str) {
        self.groups.lock().unwrap().remove(id);
    }

    pub fn has_group(&self, id: &str) -> bool {
        self.groups.lock().unwrap().contains_key(id)
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.groups.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ComputeApi for MockComputeApi {
    async fn create_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> Result<ObservedSecurityGroup> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);

        let id = format!("sg-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let group = ObservedSecurityGroup {
            id: id.clone(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            tags: spec.tags.clone(),
        };

        self.groups.lock().unwrap().insert(id, group.clone());
        Ok(group)
    }

    async fn get_security_group(&self, id: &str) -> Result<ObservedSecurityGroup> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);

        self.groups
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("security group {}", id)))
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::remote("mock", "delete outage"));
        }

        if self.ghost_deletes.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.groups
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("security group {}", id)))
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// A memory-backed store that counts flushes
///
/// Used to observe that shutdown paths persist tracked state. Cloning
/// shares the underlying store and the counter.
#[derive(Clone, Default)]
pub struct FlushCountingStore {
    inner: MemoryTrackedStore,
    flush_count: Arc<AtomicUsize>,
}

impl FlushCountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TrackedStore for FlushCountingStore {
    async fn get_record(&self, name: &str) -> Result<Option<TrackedRecord>> {
        self.inner.get_record(name).await
    }

    async fn set_record(&self, name: &str, record: &TrackedRecord) -> Result<()> {
        self.inner.set_record(name, record).await
    }

    async fn delete_record(&self, name: &str) -> Result<()> {
        self.inner.delete_record(name).await
    }

    async fn list_records(&self) -> Result<Vec<String>> {
        self.inner.list_records().await
    }

    async fn get_group(&self, name: &str) -> Result<Option<TrackedGroup>> {
        self.inner.get_group(name).await
    }

    async fn set_group(&self, name: &str, group: &TrackedGroup) -> Result<()> {
        self.inner.set_group(name, group).await
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        self.inner.delete_group(name).await
    }

    async fn list_groups(&self) -> Result<Vec<String>> {
        self.inner.list_groups().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// A desired A record for `www.example.com`
pub fn www_record() -> DesiredRecord {
    DesiredRecord {
        domain: "example.com".to_string(),
        name: "www".to_string(),
        record_type: RecordType::A,
        content: "192.0.2.1".to_string(),
        ttl: None,
        prio: None,
    }
}

/// Engine settings tuned for tests: one attempt, no pauses, one-shot
pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        max_retries: 0,
        retry_delay_secs: 1,
        converge_interval_secs: 0,
        prune_undeclared: true,
        event_channel_capacity: 100,
    }
}

/// Helper to create a minimal ReconConfig for testing
pub fn minimal_config(records: Vec<DesiredRecord>, groups: Vec<SecurityGroupSpec>) -> ReconConfig {
    ReconConfig {
        client: ClientConfig::Exoscale {
            api_key: "EXO-test-key".to_string(),
            api_secret: "test-secret".to_string(),
            dns_endpoint: None,
            compute_endpoint: None,
        },
        state_store: StateStoreConfig::Memory,
        records: records.into_iter().map(RecordSpec::new).collect(),
        security_groups: groups,
        engine: test_engine_config(),
    }
}
