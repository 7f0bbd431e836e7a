// # Tracked Store Implementations
//
// This module provides implementations of the TrackedStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileTrackedStore, FileTrackedStoreFactory};
pub use memory::{MemoryTrackedStore, MemoryTrackedStoreFactory};
