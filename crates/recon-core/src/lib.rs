// # recon-core
//
// Core library for the declarative cloud-resource reconciler.
//
// ## Architecture Overview
//
// This library converges declared DNS records and security groups
// against a remote cloud API:
// - **DnsApi / ComputeApi**: Traits for the remote API client
// - **RecordReconciler / GroupReconciler**: One remote call per
//   lifecycle verb, observed state projected back from the response
// - **TrackedStore**: Trait for persisting remote-assigned identity
// - **ConvergeEngine**: Walks declared resources and drives the
//   reconcilers, owning retry policy and identity transitions
// - **ClientRegistry**: Plugin-based registry for API clients
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from client
//    implementations
// 2. **Single-Shot Clients**: Clients issue exactly one request per
//    verb; retry and backoff live in the engine
// 3. **Plugin-Based**: Clients are registered dynamically, no
//    hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Typed Boundaries**: Desired state is validated once at the
//    configuration boundary, not per field access

pub mod config;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ClientConfig, EngineConfig, ReconConfig, StateStoreConfig};
pub use engine::ConvergeEngine;
pub use error::{Error, Result};
pub use reconciler::{GroupReconciler, Presence, RecordReconciler};
pub use registry::ClientRegistry;
pub use resource::{DesiredRecord, ObservedRecord, RecordType, SecurityGroupSpec};
pub use state::{FileTrackedStore, MemoryTrackedStore};
pub use traits::{ComputeApi, DnsApi, TrackedStore};
