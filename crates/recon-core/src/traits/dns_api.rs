// # DNS API Trait
//
// Defines the interface for the remote DNS record API.
//
// ## Implementations
//
// - Exoscale: `recon-provider-exoscale` crate
// - Future: DNSimple, Cloudflare, etc.
//
// ## Trust Level: Untrusted
//
// API clients are external integrations with strict limitations:
//
// - They perform exactly one request per method call
// - They parse their provider's responses into the core wire types
// - They return success or failure; the engine owns retry and backoff
// - They hold no state beyond connection configuration and never
//   spawn tasks, cache responses, or touch the tracked-state store
//
// If a client implemented its own retries, the engine could not
// control the retry rate and shutdown determinism would be lost.
// Returning the error is always correct: `ConvergeEngine` retries
// according to its configured policy.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::{RecordPayload, RecordResponse};

/// Trait for remote DNS record API clients
///
/// Each method issues exactly one blocking remote call and waits for
/// its full response. The zone (`domain`) scopes every call; record
/// identifiers are only meaningful within their zone.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Create a record in a zone
    ///
    /// The payload carries no identifier; the remote system assigns
    /// one and returns the record with every field populated,
    /// including server-side defaults for ttl/prio.
    async fn create_record(&self, domain: &str, payload: &RecordPayload)
    -> Result<RecordResponse>;

    /// Fetch a record by identifier
    ///
    /// Returns `Error::NotFound` when the remote system answers
    /// determinately that the record does not exist, and other error
    /// variants when the lookup itself failed.
    async fn get_record(&self, domain: &str, id: i64) -> Result<RecordResponse>;

    /// Replace a record
    ///
    /// The remote system performs a full replace, not a partial
    /// patch: the payload must carry every field alongside the
    /// existing identifier, otherwise omitted fields may be reset to
    /// defaults.
    async fn update_record(&self, domain: &str, payload: &RecordPayload)
    -> Result<RecordResponse>;

    /// Delete a record by identifier
    async fn delete_record(&self, domain: &str, id: i64) -> Result<()>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing API clients from configuration
///
/// A factory produces both halves of a provider's API surface (DNS
/// and compute) from one configuration record, so a single credential
/// set covers both resource kinds.
pub trait ApiClientFactory: Send + Sync {
    /// Create a DnsApi instance from configuration
    fn create_dns(
        &self,
        config: &crate::config::ClientConfig,
    ) -> Result<Box<dyn DnsApi>>;

    /// Create a ComputeApi instance from configuration
    fn create_compute(
        &self,
        config: &crate::config::ClientConfig,
    ) -> Result<Box<dyn super::ComputeApi>>;
}
