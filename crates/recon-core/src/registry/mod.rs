//! Plugin-based client registry
//!
//! The registry allows API clients and tracked stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Registration
//!
//! Client crates should register themselves during initialization:
//!
//! ```rust,ignore
//! // In recon-provider-exoscale
//! pub fn register(registry: &ClientRegistry) {
//!     registry.register_client("exoscale", Box::new(ExoscaleFactory));
//! }
//! ```

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::traits::{ApiClientFactory, ComputeApi, DnsApi, TrackedStore, TrackedStoreFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry for plugin-based API client and store creation
///
/// Maintains maps of type names to factory objects, allowing dynamic
/// instantiation based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing
/// concurrent reads and exclusive writes.
#[derive(Default)]
pub struct ClientRegistry {
    /// Registered API client factories
    clients: RwLock<HashMap<String, std::sync::Arc<dyn ApiClientFactory>>>,

    /// Registered tracked-store factories
    state_stores: RwLock<HashMap<String, std::sync::Arc<dyn TrackedStoreFactory>>>,
}

impl ClientRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Client type name (e.g., "exoscale")
    /// - `factory`: Factory object for creating client instances
    pub fn register_client(&self, name: impl Into<String>, factory: Box<dyn ApiClientFactory>) {
        let name = name.into();
        let mut clients = self.clients.write().unwrap();
        clients.insert(name, std::sync::Arc::from(factory));
    }

    /// Register a tracked-store factory
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn TrackedStoreFactory>,
    ) {
        let name = name.into();
        let mut stores = self.state_stores.write().unwrap();
        stores.insert(name, std::sync::Arc::from(factory));
    }

    /// Create a DNS API client from configuration
    pub fn create_dns_client(&self, config: &ClientConfig) -> Result<Box<dyn DnsApi>> {
        self.client_factory(config)?.create_dns(config)
    }

    /// Create a compute API client from configuration
    pub fn create_compute_client(&self, config: &ClientConfig) -> Result<Box<dyn ComputeApi>> {
        self.client_factory(config)?.create_compute(config)
    }

    fn client_factory(&self, config: &ClientConfig) -> Result<std::sync::Arc<dyn ApiClientFactory>> {
        let client_type = config.type_name();
        let clients = self.clients.read().unwrap();

        clients
            .get(client_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown client type: {}", client_type)))
    }

    /// Create a tracked store from configuration
    pub async fn create_state_store(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn TrackedStore>> {
        let store_type = match config {
            crate::config::StateStoreConfig::File { .. } => "file",
            crate::config::StateStoreConfig::Memory => "memory",
            crate::config::StateStoreConfig::Custom { factory, .. } => factory,
        };

        let stores = self.state_stores.read().unwrap();

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?
            .clone();

        // Release the lock before calling async create
        drop(stores);

        let config_json = serde_json::to_value(config)?;
        factory.create(&config_json).await
    }

    /// List all registered client types
    pub fn list_clients(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap();
        clients.keys().cloned().collect()
    }

    /// List all registered tracked-store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self.state_stores.read().unwrap();
        stores.keys().cloned().collect()
    }

    /// Check if a client type is registered
    pub fn has_client(&self, name: &str) -> bool {
        let clients = self.clients.read().unwrap();
        clients.contains_key(name)
    }

    /// Check if a tracked-store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        let stores = self.state_stores.read().unwrap();
        stores.contains_key(name)
    }
}
