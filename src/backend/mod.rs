//! Storage capabilities an [`AudioBufferStore`] can be built over.
//!
//! A [`StorageBackend`] decides whether durable storage exists at all, and
//! opens named, versioned [`Database`]s. A database holds a single collection
//! of encoded records addressed by [`CacheKey`]; each of its methods is one
//! independent transaction.
//!
//! The crate ships three backends:
//!  * [`FsBackend`] (feature `"fs"`): durable records on the local filesystem.
//!  * [`MemoryBackend`]: process-local records, lost on exit.
//!  * [`NullBackend`]: no storage at all. Every lookup misses.
//!
//! [`AudioBufferStore`]: crate::AudioBufferStore

#[cfg(feature = "fs")]
mod fs;
mod memory;
mod null;

#[cfg(feature = "fs")]
pub use self::fs::FsBackend;
pub use self::{memory::MemoryBackend, null::NullBackend};

use crate::{error::StoreResult, key::CacheKey};
use async_trait::async_trait;
use std::sync::Arc;

/// A source of durable (or not so durable) databases.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Whether this backend can store anything in the current environment.
    ///
    /// Stores never call [`open`] on an unavailable backend.
    ///
    /// [`open`]: StorageBackend::open
    fn is_available(&self) -> bool {
        true
    }

    /// Opens the database `name`, creating or upgrading it to `version`.
    ///
    /// Creation and upgrade must be idempotent: opening an existing database
    /// at its current version, or re-running an upgrade which was already
    /// applied, must succeed without touching stored records.
    async fn open(&self, name: &str, version: u32) -> StoreResult<Arc<dyn Database>>;
}

/// One opened database, holding a single collection of encoded records.
///
/// Every method is its own transaction. Implementations must make `write`
/// atomic: a concurrent or later `read` sees either the previous record or the
/// new one, never a mixture. `write` must only return once the record is as
/// durable as the backend can make it.
#[async_trait]
pub trait Database: Send + Sync {
    /// Fetches the encoded record stored under `key`.
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>>;

    /// Stores an encoded record under `key`, replacing any previous one.
    async fn write(&self, key: &CacheKey, record: Vec<u8>) -> StoreResult<()>;

    /// Removes the record under `key`, returning whether one existed.
    async fn delete(&self, key: &CacheKey) -> StoreResult<bool>;

    /// Removes every record.
    async fn clear(&self) -> StoreResult<()>;

    /// Fetches every encoded record, in no particular order.
    async fn scan(&self) -> StoreResult<Vec<Vec<u8>>>;
}
