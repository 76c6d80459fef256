use super::{Database, StorageBackend};
use crate::error::{Error, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A backend for environments without any durable storage.
///
/// Stores over this backend never open a database: lookups miss and writes
/// are skipped, without any error being logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

#[async_trait]
impl StorageBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn open(&self, _name: &str, _version: u32) -> StoreResult<Arc<dyn Database>> {
        Err(Error::Unavailable)
    }
}
