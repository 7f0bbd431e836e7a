// # Exoscale API Client
//
// This crate provides the Exoscale implementation of the reconciler's
// client traits:
//
// - `DnsApi` over the Exoscale DNS v1 API (`{"record": {...}}`
//   envelope, one record per call)
// - `ComputeApi` over the security-group endpoints of the compute API
//
// ## Architectural Constraints
//
// Clients are single-shot:
//
// - One HTTP request per trait method call
// - Full error propagation to the engine (the engine owns retries,
//   backoff, and identity bookkeeping)
// - NO retry logic, NO caching, NO background tasks here
//
// ## Security Requirements
//
// - API credentials NEVER appear in logs
// - The client MUST fail fast if credentials are empty
//
// ## API Reference
//
// - DNS: GET/POST `/v1/domains/:domain/records`,
//        GET/PUT/DELETE `/v1/domains/:domain/records/:id`
// - Compute: POST `/v2/security-group`,
//            GET/DELETE `/v2/security-group/:id`

use async_trait::async_trait;
use recon_core::config::ClientConfig;
use recon_core::resource::{ObservedSecurityGroup, RecordPayload, RecordResponse, SecurityGroupSpec};
use recon_core::traits::{ApiClientFactory, ComputeApi, DnsApi};
use recon_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Exoscale DNS API base URL
const EXOSCALE_DNS_API_BASE: &str = "https://api.exoscale.com/dns/v1";

/// Exoscale compute API base URL
const EXOSCALE_COMPUTE_API_BASE: &str = "https://api.exoscale.com/v2";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Request/response envelope used by the DNS v1 API
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    record: RecordResponse,
}

/// Outbound envelope for create/update calls
#[derive(Debug, Serialize)]
struct PayloadEnvelope<'a> {
    record: &'a RecordPayload,
}

/// Security group as returned by the compute API
#[derive(Debug, Serialize, Deserialize)]
struct WireSecurityGroup {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl From<WireSecurityGroup> for ObservedSecurityGroup {
    fn from(wire: WireSecurityGroup) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            description: wire.description,
            tags: wire.tags,
        }
    }
}

/// Outbound body for security group creation
#[derive(Debug, Serialize)]
struct CreateSecurityGroupBody<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    tags: &'a HashMap<String, String>,
}

/// Exoscale API client
///
/// Implements both halves of the API surface from one credential set.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform all GET requests (lookups)
/// - Log the intended mutation payload
/// - **NOT** actually create, update, or delete anything; mutations
///   echo the payload back as if the remote accepted it unchanged
///
/// This allows safe testing without making changes.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose credentials.
pub struct ExoscaleClient {
    /// API key, sent in the auth header. Never log this value.
    api_key: String,

    /// API secret, sent in the auth header. Never log this value.
    api_secret: String,

    /// DNS API base URL
    dns_base: String,

    /// Compute API base URL
    compute_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip mutations
    dry_run: bool,
}

impl std::fmt::Debug for ExoscaleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExoscaleClient")
            .field("api_key", &"<REDACTED>")
            .field("api_secret", &"<REDACTED>")
            .field("dns_base", &self.dns_base)
            .field("compute_base", &self.compute_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ExoscaleClient {
    /// Create a new Exoscale client
    ///
    /// # Parameters
    ///
    /// - `api_key` / `api_secret`: Exoscale API credentials
    /// - `dns_endpoint` / `compute_endpoint`: optional base URL
    ///   overrides (used against test servers)
    /// - `dry_run`: if true, perform GET requests but skip mutations
    ///
    /// # Panics
    ///
    /// Panics if either credential is empty; the factory validates
    /// configuration before reaching this point.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        dns_endpoint: Option<String>,
        compute_endpoint: Option<String>,
        dry_run: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.is_empty() || api_secret.is_empty() {
            panic!("Exoscale API credentials cannot be empty");
        }

        Self {
            api_key,
            api_secret,
            dns_base: dns_endpoint.unwrap_or_else(|| EXOSCALE_DNS_API_BASE.to_string()),
            compute_base: compute_endpoint
                .unwrap_or_else(|| EXOSCALE_COMPUTE_API_BASE.to_string()),
            client,
            dry_run,
        }
    }

    /// Create a client in live mode
    pub fn new_live(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        dns_endpoint: Option<String>,
        compute_endpoint: Option<String>,
    ) -> Self {
        Self::new(api_key, api_secret, dns_endpoint, compute_endpoint, false)
    }

    /// Create a client in dry-run mode
    ///
    /// Lookups run for real; mutations are logged and skipped.
    pub fn new_dry_run(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        dns_endpoint: Option<String>,
        compute_endpoint: Option<String>,
    ) -> Self {
        Self::new(api_key, api_secret, dns_endpoint, compute_endpoint, true)
    }

    /// The DNS v1 token header value
    fn dns_token(&self) -> String {
        format!("{}:{}", self.api_key, self.api_secret)
    }

    /// Map a non-success HTTP response onto the core error taxonomy
    ///
    /// 404 becomes `NotFound` so existence checks can treat it as a
    /// determinate answer; everything else stays a remote failure.
    async fn check_status(&self, response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        match status.as_u16() {
            401 | 403 => Err(Error::auth(format!(
                "Invalid API credentials or insufficient permissions ({}). Status: {}",
                what, status
            ))),
            404 => Err(Error::not_found(what)),
            429 => Err(Error::rate_limited(format!(
                "Rate limit exceeded ({}). Please retry later.",
                what
            ))),
            500..=599 => Err(Error::remote(
                "exoscale",
                format!("Server error (transient) on {}: {} - {}", what, status, error_text),
            )),
            _ => Err(Error::remote(
                "exoscale",
                format!("{} failed: {} - {}", what, status, error_text),
            )),
        }
    }

    async fn parse_record(&self, response: reqwest::Response) -> Result<RecordResponse> {
        let envelope: RecordEnvelope = response
            .json()
            .await
            .map_err(|e| Error::remote("exoscale", format!("Failed to parse response: {}", e)))?;
        Ok(envelope.record)
    }

    /// Echo a payload back as a response, used by dry-run mutations
    fn echo_payload(payload: &RecordPayload) -> RecordResponse {
        RecordResponse {
            id: payload.id.unwrap_or(0),
            name: payload.name.clone(),
            record_type: payload.record_type,
            content: payload.content.clone(),
            ttl: payload.ttl.unwrap_or(3600),
            prio: payload.prio.unwrap_or(0),
        }
    }
}

#[async_trait]
impl DnsApi for ExoscaleClient {
    async fn create_record(
        &self,
        domain: &str,
        payload: &RecordPayload,
    ) -> Result<RecordResponse> {
        let url = format!("{}/domains/{}/records", self.dns_base, domain);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST {} with payload: {}",
                url,
                serde_json::json!(PayloadEnvelope { record: payload })
            );
            return Ok(Self::echo_payload(payload));
        }

        tracing::debug!(domain, record_type = %payload.record_type, "creating record");

        let response = self
            .client
            .post(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .json(&PayloadEnvelope { record: payload })
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        let response = self.check_status(response, "Record create").await?;
        self.parse_record(response).await
    }

    async fn get_record(&self, domain: &str, id: i64) -> Result<RecordResponse> {
        let url = format!("{}/domains/{}/records/{}", self.dns_base, domain, id);

        let response = self
            .client
            .get(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        let response = self
            .check_status(response, &format!("Record {} in {}", id, domain))
            .await?;
        self.parse_record(response).await
    }

    async fn update_record(
        &self,
        domain: &str,
        payload: &RecordPayload,
    ) -> Result<RecordResponse> {
        let id = payload
            .id
            .ok_or_else(|| Error::validation("update payload must carry the record id"))?;
        let url = format!("{}/domains/{}/records/{}", self.dns_base, domain, id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PUT {} with payload: {}",
                url,
                serde_json::json!(PayloadEnvelope { record: payload })
            );
            return Ok(Self::echo_payload(payload));
        }

        tracing::debug!(domain, id, "updating record");

        let response = self
            .client
            .put(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .json(&PayloadEnvelope { record: payload })
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        let response = self.check_status(response, "Record update").await?;
        self.parse_record(response).await
    }

    async fn delete_record(&self, domain: &str, id: i64) -> Result<()> {
        let url = format!("{}/domains/{}/records/{}", self.dns_base, domain, id);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", url);
            return Ok(());
        }

        tracing::debug!(domain, id, "deleting record");

        let response = self
            .client
            .delete(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        self.check_status(response, &format!("Record {} delete", id))
            .await?;
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "exoscale"
    }
}

#[async_trait]
impl ComputeApi for ExoscaleClient {
    async fn create_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> Result<ObservedSecurityGroup> {
        let url = format!("{}/security-group", self.compute_base);
        let body = CreateSecurityGroupBody {
            name: &spec.name,
            description: &spec.description,
            tags: &spec.tags,
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST {} with payload: {}",
                url,
                serde_json::json!(body)
            );
            return Ok(ObservedSecurityGroup {
                id: String::new(),
                name: spec.name.clone(),
                description: spec.description.clone(),
                tags: spec.tags.clone(),
            });
        }

        tracing::debug!(name = %spec.name, "creating security group");

        let response = self
            .client
            .post(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        let response = self.check_status(response, "Security group create").await?;

        let wire: WireSecurityGroup = response
            .json()
            .await
            .map_err(|e| Error::remote("exoscale", format!("Failed to parse response: {}", e)))?;
        Ok(wire.into())
    }

    async fn get_security_group(&self, id: &str) -> Result<ObservedSecurityGroup> {
        let url = format!("{}/security-group/{}", self.compute_base, id);

        let response = self
            .client
            .get(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        let response = self
            .check_status(response, &format!("Security group {}", id))
            .await?;

        let wire: WireSecurityGroup = response
            .json()
            .await
            .map_err(|e| Error::remote("exoscale", format!("Failed to parse response: {}", e)))?;
        Ok(wire.into())
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        let url = format!("{}/security-group/{}", self.compute_base, id);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", url);
            return Ok(());
        }

        tracing::debug!(id, "deleting security group");

        let response = self
            .client
            .delete(&url)
            .header("X-DNS-Token", self.dns_token())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::remote("exoscale", format!("HTTP request failed: {}", e)))?;

        self.check_status(response, &format!("Security group {} delete", id))
            .await?;
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "exoscale"
    }
}

/// Factory for creating Exoscale clients
pub struct ExoscaleFactory;

impl ExoscaleFactory {
    fn build(&self, config: &ClientConfig) -> Result<ExoscaleClient> {
        match config {
            ClientConfig::Exoscale {
                api_key,
                api_secret,
                dns_endpoint,
                compute_endpoint,
            } => {
                if api_key.is_empty() || api_secret.is_empty() {
                    return Err(Error::config("Exoscale API credentials are required"));
                }

                // Dry-run is an environment switch so a deployment can
                // be rehearsed without touching its configuration
                let dry_run = std::env::var("RECON_MODE")
                    .unwrap_or_default()
                    .to_lowercase()
                    == "dry-run";

                if dry_run {
                    tracing::warn!(
                        "Exoscale client running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(ExoscaleClient::new(
                    api_key.clone(),
                    api_secret.clone(),
                    dns_endpoint.clone(),
                    compute_endpoint.clone(),
                    dry_run,
                ))
            }
            _ => Err(Error::config("Invalid config for Exoscale client")),
        }
    }
}

impl ApiClientFactory for ExoscaleFactory {
    fn create_dns(&self, config: &ClientConfig) -> Result<Box<dyn DnsApi>> {
        Ok(Box::new(self.build(config)?))
    }

    fn create_compute(&self, config: &ClientConfig) -> Result<Box<dyn ComputeApi>> {
        Ok(Box::new(self.build(config)?))
    }
}

/// Register the Exoscale client with a registry
///
/// This function should be called during initialization to make the
/// Exoscale client available.
pub fn register(registry: &recon_core::ClientRegistry) {
    registry.register_client("exoscale", Box::new(ExoscaleFactory));
}
