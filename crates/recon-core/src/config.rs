//! Configuration types for the reconciler
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::resource::{hostname_for, DesiredRecord, SecurityGroupSpec};

/// Main reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Remote API client configuration
    pub client: ClientConfig,

    /// Tracked-identity store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// DNS records to converge
    #[serde(default)]
    pub records: Vec<RecordSpec>,

    /// Security groups to converge
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupSpec>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ReconConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.records.is_empty() && self.security_groups.is_empty() {
            return Err(crate::Error::config("No resources configured"));
        }

        self.client.validate()?;

        // A zero-capacity channel cannot be constructed
        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "event_channel_capacity must be at least 1",
            ));
        }

        let mut keys = HashSet::new();
        for spec in &self.records {
            spec.record.validate()?;
            if !keys.insert(spec.tracking_key()) {
                return Err(crate::Error::config(format!(
                    "Duplicate record declaration: {}",
                    spec.tracking_key()
                )));
            }
        }

        let mut group_names = HashSet::new();
        for group in &self.security_groups {
            group.validate()?;
            if !group_names.insert(group.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate security group declaration: {}",
                    group.name
                )));
            }
        }

        Ok(())
    }
}

/// A declared DNS record plus its tracking metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Stable key identifying this declaration in the tracked store.
    /// Defaults to `hostname:type` when unset.
    #[serde(default)]
    pub key: Option<String>,

    /// Desired record attributes
    #[serde(flatten)]
    pub record: DesiredRecord,

    /// Whether this record participates in convergence
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RecordSpec {
    /// Create a spec with the default tracking key
    pub fn new(record: DesiredRecord) -> Self {
        Self {
            key: None,
            record,
            enabled: true,
        }
    }

    /// The key this declaration is tracked under
    pub fn tracking_key(&self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None => format!(
                "{}:{}",
                hostname_for(&self.record.name, &self.record.domain),
                self.record.record_type
            ),
        }
    }
}

/// Remote API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientConfig {
    /// Exoscale client
    Exoscale {
        /// API key
        api_key: String,
        /// API secret
        api_secret: String,
        /// DNS API endpoint override (optional)
        dns_endpoint: Option<String>,
        /// Compute API endpoint override (optional)
        compute_endpoint: Option<String>,
    },

    /// Custom client
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ClientConfig {
    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ClientConfig::Exoscale {
                api_key,
                api_secret,
                ..
            } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Exoscale API key cannot be empty"));
                }
                if api_secret.is_empty() {
                    return Err(crate::Error::config("Exoscale API secret cannot be empty"));
                }
                Ok(())
            }
            ClientConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom client factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom client config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the client type name
    pub fn type_name(&self) -> &str {
        match self {
            ClientConfig::Exoscale { .. } => "exoscale",
            ClientConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::Exoscale {
            api_key: String::new(),
            api_secret: String::new(),
            dns_endpoint: None,
            compute_endpoint: None,
        }
    }
}

/// Tracked-identity store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based tracked store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory tracked store (not persistent)
    #[default]
    Memory,

    /// Custom tracked store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of attempts for a failed remote call
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay between retry attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Interval between convergence passes (in seconds)
    ///
    /// Set to 0 for a single one-shot pass.
    #[serde(default = "default_converge_interval_secs")]
    pub converge_interval_secs: u64,

    /// Whether tracked resources no longer declared get deleted
    ///
    /// When false, undeclared resources are reported but left alone.
    #[serde(default = "default_prune_undeclared")]
    pub prune_undeclared: bool,

    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    /// This prevents unbounded memory growth when no consumer drains
    /// the channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            converge_interval_secs: default_converge_interval_secs(),
            prune_undeclared: default_prune_undeclared(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_converge_interval_secs() -> u64 {
    0
}

fn default_prune_undeclared() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    1000
}
