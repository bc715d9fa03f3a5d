// Persistent key-value store abstraction.
// The cache only ever talks to durable storage through these four operations.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Asynchronous string-to-string store that survives process restarts.
///
/// Implementations are expected to be consistent per key only. Nothing in
/// the cache relies on atomicity across two different keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List every key currently held by the store.
    async fn list_keys(&self) -> Result<Vec<String>>;
}
