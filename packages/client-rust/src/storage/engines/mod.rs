//! [`LocalCache`](stratum_core::LocalCache) implementations.

mod json_file;
mod memory;

pub use json_file::JsonFileCache;
pub use memory::MemoryLocalCache;
