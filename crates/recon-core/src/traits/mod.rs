//! Core traits for the reconciler
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsApi`]: Remote DNS record API client
//! - [`ComputeApi`]: Remote security-group API client
//! - [`TrackedStore`]: Persistent identity tracking for declared resources

pub mod compute_api;
pub mod dns_api;
pub mod state_store;

pub use compute_api::ComputeApi;
pub use dns_api::{ApiClientFactory, DnsApi};
pub use state_store::{TrackedGroup, TrackedRecord, TrackedStore, TrackedStoreFactory};
