// # Compute API Trait
//
// Defines the interface for the remote security-group API.
//
// The remote system exposes no update verb for security groups:
// they are created, checked for existence, and destroyed. A changed
// description is drift the engine can report but not repair.
//
// The same single-shot rules as [`DnsApi`](super::DnsApi) apply:
// one request per call, no retries, no caching, no spawned tasks.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::{ObservedSecurityGroup, SecurityGroupSpec};

/// Trait for remote security-group API clients
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Create a security group
    ///
    /// The remote system assigns the identifier and returns the group
    /// with every field populated.
    async fn create_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> Result<ObservedSecurityGroup>;

    /// Fetch a security group by identifier
    ///
    /// Returns `Error::NotFound` when the remote system answers
    /// determinately that no such group exists; any other failure
    /// means the lookup could not complete.
    async fn get_security_group(&self, id: &str) -> Result<ObservedSecurityGroup>;

    /// Delete a security group by identifier
    async fn delete_security_group(&self, id: &str) -> Result<()>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
