//! [`FallbackStore`](stratum_core::FallbackStore) implementations.
//!
//! Provides the in-memory table used by tests and demos, the HTTP table
//! used in production, and [`NullFallbackStore`] for deployments without
//! a fallback table.

mod memory;
mod null;
mod rest;

pub use memory::MemoryFallbackStore;
pub use null::NullFallbackStore;
pub use rest::{RestFallbackConfig, RestFallbackStore};
