//! adaptest-store: Storage backends for the adaptive testing engine.
//!
//! Implements the `ItemBank`, `ResponseLog`, `SessionStore` and
//! `LearnerStore` traits in memory and over a JSON state file, and loads
//! the top-level `adaptest.toml` configuration.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod snapshot;

pub use config::{create_store, load_config, load_config_from, AdaptestConfig, StoreConfig};
pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::InMemoryStore;
pub use snapshot::StoreSnapshot;
