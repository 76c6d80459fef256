use super::{Database, StorageBackend};
use crate::{
    error::{Error, StoreResult},
    key::CacheKey,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::{collections::HashMap, sync::Arc};

/// A backend holding records in process memory.
///
/// Databases are shared by name between all clones of one `MemoryBackend`, so
/// two stores built from clones see the same records, much as two stores over
/// one directory would. Nothing survives the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    databases: Arc<Mutex<HashMap<String, Arc<MemoryDatabase>>>>,
}

impl MemoryBackend {
    /// Creates a backend with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, name: &str, version: u32) -> StoreResult<Arc<dyn Database>> {
        let mut databases = self.databases.lock();
        let db = databases
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(MemoryDatabase::new(version)));

        let mut current = db.version.lock();
        if *current > version {
            return Err(Error::VersionConflict {
                requested: version,
                found: *current,
            });
        }
        *current = version;
        drop(current);

        let db: Arc<dyn Database> = db.clone();
        Ok(db)
    }
}

#[derive(Debug)]
struct MemoryDatabase {
    version: Mutex<u32>,
    records: RwLock<HashMap<CacheKey, Arc<Vec<u8>>>>,
}

impl MemoryDatabase {
    fn new(version: u32) -> Self {
        Self {
            version: Mutex::new(version),
            records: RwLock::default(),
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).map(|r| r.as_ref().clone()))
    }

    async fn write(&self, key: &CacheKey, record: Vec<u8>) -> StoreResult<()> {
        self.records.write().insert(key.clone(), Arc::new(record));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> StoreResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.records.write().clear();
        Ok(())
    }

    async fn scan(&self) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .records
            .read()
            .values()
            .map(|r| r.as_ref().clone())
            .collect())
    }
}
