//! Tier implementations for the three-tier persistence stack.
//!
//! - **Durable** ([`adapters`]): entity-specific remote tables, one
//!   [`DurableAdapter`](stratum_core::DurableAdapter) per storage key
//! - **Fallback** ([`datastores`]): a single generic remote key/value table
//! - **Local** ([`engines`]): client-resident cache, always available
//!
//! [`rest`] holds the HTTP client shared by the remote REST tiers, and
//! [`fault`] provides switchable failure injection for the in-process tiers.

pub mod adapters;
pub mod datastores;
pub mod engines;
pub mod fault;
pub mod rest;

pub use adapters::{AdapterRegistry, MemoryDurableAdapter, RestEntityAdapter};
pub use datastores::{MemoryFallbackStore, NullFallbackStore, RestFallbackConfig, RestFallbackStore};
pub use engines::{JsonFileCache, MemoryLocalCache};
pub use fault::{Fault, FaultOp, FaultSwitch};
pub use rest::{RestClient, RestEndpoint};
