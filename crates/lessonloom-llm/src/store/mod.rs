//! Persistence for router state
//!
//! # Module Structure
//!
//! - `config_store`: `ConfigStore` (backends in declaration order + settings)
//! - `kv`: `KeyValueStore` trait with memory and file backends

mod config_store;
mod kv;

pub use config_store::ConfigStore;
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};

#[cfg(test)]
pub use kv::MockKeyValueStore;

/// Key of the backends + settings blob
pub const ROUTER_STATE_KEY: &str = "lessonloom.router";

/// Key of the usage statistics blob
pub const USAGE_STATS_KEY: &str = "lessonloom.usage";
