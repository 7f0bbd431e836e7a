//! Resource reconcilers
//!
//! One operation per lifecycle verb, uniform shape:
//! `(desired state) -> (observed state | error)`. Every verb issues
//! exactly one remote call through an explicitly injected client and
//! projects the response back into observed state.
//!
//! ## Lifecycle
//!
//! ```text
//! Absent → Creating → Present → Updating → Present → Deleting → Absent
//! ```
//!
//! A failed lookup drives the `Present → Absent` eviction path; the
//! engine owns that bookkeeping, the reconciler only reports.
//!
//! ## Error policy
//!
//! Remote errors surface unmodified; nothing is retried or swallowed
//! here. The single special case is existence checks, where a
//! determinate not-found answer maps to [`Presence::Absent`] instead
//! of an error. That is what destroy verification relies on.

use tracing::debug;

use crate::error::Result;
use crate::resource::{DesiredRecord, ObservedRecord, ObservedSecurityGroup, SecurityGroupSpec};
use crate::traits::{ComputeApi, DnsApi};

/// Determinate answer from an existence check
///
/// A lookup that cannot complete (network, auth) is *not* a
/// `Presence`: it returns as an error, so callers never mistake an
/// indeterminate failure for confirmed absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The remote system confirmed the resource exists
    Present,
    /// The remote system confirmed the resource does not exist
    Absent,
}

impl Presence {
    pub fn is_present(self) -> bool {
        matches!(self, Presence::Present)
    }
}

/// Reconciler for DNS records
///
/// Holds a borrowed client; each invocation owns its desired and
/// observed records exclusively. There is no cache and no shared
/// mutable state across operations.
pub struct RecordReconciler<'a> {
    client: &'a dyn DnsApi,
}

impl<'a> RecordReconciler<'a> {
    pub fn new(client: &'a dyn DnsApi) -> Self {
        Self { client }
    }

    /// Create a record from desired state
    ///
    /// Desired state is validated before any remote side effect. On
    /// success the remote system assigns an identifier and the
    /// observed state is fully re-derived from the response, so
    /// server-side normalization (TTL defaulting) is reflected
    /// locally. On failure no local state is recorded.
    pub async fn create(&self, desired: &DesiredRecord) -> Result<ObservedRecord> {
        desired.validate()?;

        debug!(
            domain = %desired.domain,
            record_type = %desired.record_type,
            "creating record"
        );

        let response = self
            .client
            .create_record(&desired.domain, &desired.to_payload())
            .await?;

        Ok(ObservedRecord::project(&desired.domain, &response))
    }

    /// Refresh observed state by identifier
    ///
    /// Uses the same projection as create; errors surface unmodified
    /// so the caller can decide whether to evict.
    pub async fn read(&self, domain: &str, id: i64) -> Result<ObservedRecord> {
        let response = self.client.get_record(domain, id).await?;
        Ok(ObservedRecord::project(domain, &response))
    }

    /// Check whether a record exists
    ///
    /// Splits the two outcomes the lookup can conflate: a not-found
    /// response is `Ok(Absent)` (confirmed), anything else that fails
    /// is `Err` (indeterminate).
    pub async fn exists(&self, domain: &str, id: i64) -> Result<Presence> {
        match self.client.get_record(domain, id).await {
            Ok(_) => Ok(Presence::Present),
            Err(e) if e.is_not_found() => Ok(Presence::Absent),
            Err(e) => Err(e),
        }
    }

    /// Replace a record with desired state
    ///
    /// The remote system performs a full replace, so the outbound
    /// payload carries every field at its desired value alongside the
    /// existing identifier; a partial diff would reset omitted fields
    /// to remote defaults. The response is projected identically to
    /// create/read.
    pub async fn update(&self, id: i64, desired: &DesiredRecord) -> Result<ObservedRecord> {
        desired.validate()?;

        debug!(domain = %desired.domain, id, "updating record");

        let response = self
            .client
            .update_record(&desired.domain, &desired.to_payload_with_id(id))
            .await?;

        Ok(ObservedRecord::project(&desired.domain, &response))
    }

    /// Delete a record by identifier
    ///
    /// Identity bookkeeping belongs to the caller: tracked identity
    /// must be cleared only when this returns `Ok`, and retained on
    /// failure so the delete can be retried.
    pub async fn delete(&self, domain: &str, id: i64) -> Result<()> {
        debug!(domain, id, "deleting record");
        self.client.delete_record(domain, id).await
    }

    /// Verify a deletion took effect
    ///
    /// Confirmed absence is success; a record still present or an
    /// indeterminate lookup is not.
    pub async fn verify_destroyed(&self, domain: &str, id: i64) -> Result<bool> {
        Ok(!self.exists(domain, id).await?.is_present())
    }
}

/// Reconciler for security groups
///
/// Groups have no update verb on the remote system: create,
/// check-exists, destroy only.
pub struct GroupReconciler<'a> {
    client: &'a dyn ComputeApi,
}

impl<'a> GroupReconciler<'a> {
    pub fn new(client: &'a dyn ComputeApi) -> Self {
        Self { client }
    }

    /// Create a security group from desired state
    pub async fn create(&self, spec: &SecurityGroupSpec) -> Result<ObservedSecurityGroup> {
        spec.validate()?;

        debug!(name = %spec.name, "creating security group");
        self.client.create_security_group(spec).await
    }

    /// Refresh a group by identifier
    pub async fn read(&self, id: &str) -> Result<ObservedSecurityGroup> {
        self.client.get_security_group(id).await
    }

    /// Check whether a group exists, with the same determinate/
    /// indeterminate split as record existence checks
    pub async fn exists(&self, id: &str) -> Result<Presence> {
        match self.client.get_security_group(id).await {
            Ok(_) => Ok(Presence::Present),
            Err(e) if e.is_not_found() => Ok(Presence::Absent),
            Err(e) => Err(e),
        }
    }

    /// Delete a group by identifier
    ///
    /// Same identity contract as record deletes: the caller clears
    /// tracked identity only on success.
    pub async fn delete(&self, id: &str) -> Result<()> {
        debug!(id, "deleting security group");
        self.client.delete_security_group(id).await
    }

    /// Verify a deletion took effect: not-found is the success case
    pub async fn verify_destroyed(&self, id: &str) -> Result<bool> {
        Ok(!self.exists(id).await?.is_present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resource::{RecordPayload, RecordResponse, RecordType};
    use async_trait::async_trait;

    /// Stub client answering every lookup with one fixed outcome
    struct FixedOutcome(Result<()>);

    #[async_trait]
    impl DnsApi for FixedOutcome {
        async fn create_record(
            &self,
            _domain: &str,
            payload: &RecordPayload,
        ) -> Result<RecordResponse> {
            Ok(RecordResponse {
                id: 99,
                name: payload.name.clone(),
                record_type: payload.record_type,
                content: payload.content.clone(),
                ttl: payload.ttl.unwrap_or(3600),
                prio: payload.prio.unwrap_or(0),
            })
        }

        async fn get_record(&self, _domain: &str, id: i64) -> Result<RecordResponse> {
            match &self.0 {
                Ok(()) => Ok(RecordResponse {
                    id,
                    name: "www".to_string(),
                    record_type: RecordType::A,
                    content: "192.0.2.1".to_string(),
                    ttl: 3600,
                    prio: 0,
                }),
                Err(Error::NotFound(msg)) => Err(Error::not_found(msg.clone())),
                Err(_) => Err(Error::remote("stub", "lookup failed")),
            }
        }

        async fn update_record(
            &self,
            domain: &str,
            payload: &RecordPayload,
        ) -> Result<RecordResponse> {
            self.create_record(domain, payload).await
        }

        async fn delete_record(&self, _domain: &str, _id: i64) -> Result<()> {
            Ok(())
        }

        fn client_name(&self) -> &'static str {
            "stub"
        }
    }

    #[tokio::test]
    async fn exists_maps_not_found_to_absent() {
        let client = FixedOutcome(Err(Error::not_found("record 7")));
        let reconciler = RecordReconciler::new(&client);

        let presence = reconciler.exists("example.com", 7).await.unwrap();
        assert_eq!(presence, Presence::Absent);
    }

    #[tokio::test]
    async fn exists_keeps_transport_failures_as_errors() {
        let client = FixedOutcome(Err(Error::remote("stub", "timeout")));
        let reconciler = RecordReconciler::new(&client);

        let err = reconciler.exists("example.com", 7).await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn exists_reports_present_on_success() {
        let client = FixedOutcome(Ok(()));
        let reconciler = RecordReconciler::new(&client);

        let presence = reconciler.exists("example.com", 7).await.unwrap();
        assert!(presence.is_present());
    }

    #[tokio::test]
    async fn create_reflects_server_side_defaults() {
        let client = FixedOutcome(Ok(()));
        let reconciler = RecordReconciler::new(&client);

        let desired = DesiredRecord {
            domain: "example.com".to_string(),
            name: "www".to_string(),
            record_type: RecordType::A,
            content: "192.0.2.1".to_string(),
            ttl: None,
            prio: None,
        };

        let observed = reconciler.create(&desired).await.unwrap();
        // Defaults supplied by the remote, not the input
        assert_eq!(observed.ttl, 3600);
        assert_eq!(observed.prio, 0);
        assert_eq!(observed.id, 99);
        assert_eq!(observed.hostname, "www.example.com");
    }

    #[tokio::test]
    async fn create_rejects_invalid_desired_state_before_any_call() {
        let client = FixedOutcome(Ok(()));
        let reconciler = RecordReconciler::new(&client);

        let desired = DesiredRecord {
            domain: "example.com".to_string(),
            name: "www".to_string(),
            record_type: RecordType::A,
            content: String::new(),
            ttl: None,
            prio: None,
        };

        let err = reconciler.create(&desired).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
