use super::{Database, StorageBackend};
use crate::{
    constants::{MANIFEST_FILE, RECORDS_DIR, RECORD_EXTENSION, STALE_TEMP_AGE, TEMP_EXTENSION},
    error::{Error, StoreResult},
    key::CacheKey,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsStr,
    io::{Error as IoError, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};
use uuid::Uuid;

/// A durable backend keeping each database in a directory under `root`.
///
/// ```text
/// <root>/<name>/schema.json         { "name": ..., "version": ... }
/// <root>/<name>/records/<sha256>.rec one file per record
/// ```
///
/// Records are written to a uniquely named temporary file, flushed to disk,
/// and then renamed over their target. Renames within a directory are atomic,
/// so readers only ever see whole records, and the last writer to rename wins.
#[derive(Clone, Debug)]
pub struct FsBackend {
    root: PathBuf,
    sync_writes: bool,
}

impl FsBackend {
    /// Creates a backend storing databases beneath `root`.
    ///
    /// Nothing is created on disk until a database is opened.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sync_writes: true,
        }
    }

    /// Sets whether writes are `fsync`ed before they are reported as committed.
    ///
    /// Defaults to `true`. Disabling this trades crash safety for speed:
    /// records remain atomic, but a power loss may forget recent writes.
    #[must_use]
    pub fn sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// The directory databases are created in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Manifest {
    name: String,
    version: u32,
}

#[async_trait]
impl StorageBackend for FsBackend {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn open(&self, name: &str, version: u32) -> StoreResult<Arc<dyn Database>> {
        if !is_plain_name(name) {
            return Err(Error::Io(IoError::new(
                ErrorKind::InvalidInput,
                format!("database name {:?} is not a plain directory name", name),
            )));
        }

        let dir = self.root.join(name);
        let records = dir.join(RECORDS_DIR);

        // Creating the collection is idempotent, so this doubles as the upgrade step.
        fs::create_dir_all(&records).await?;

        let manifest_path = dir.join(MANIFEST_FILE);
        match fs::read(&manifest_path).await {
            Ok(raw) => {
                let manifest: Manifest =
                    serde_json::from_slice(&raw).map_err(Error::CorruptManifest)?;

                if manifest.version > version {
                    return Err(Error::VersionConflict {
                        requested: version,
                        found: manifest.version,
                    });
                }

                if manifest.version < version {
                    info!(
                        "Upgrading audio buffer database {:?} from v{} to v{}.",
                        manifest.name, manifest.version, version
                    );
                    self.write_manifest(&dir, name, version).await?;
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Creating audio buffer database {:?} (v{}).", name, version);
                self.write_manifest(&dir, name, version).await?;
            },
            Err(e) => return Err(e.into()),
        }

        sweep_stale_temps(&records, STALE_TEMP_AGE).await;

        let db: Arc<dyn Database> = Arc::new(FsDatabase {
            records,
            sync_writes: self.sync_writes,
        });
        Ok(db)
    }
}

impl FsBackend {
    async fn write_manifest(&self, dir: &Path, name: &str, version: u32) -> StoreResult<()> {
        let manifest = Manifest {
            name: name.to_owned(),
            version,
        };
        let raw = serde_json::to_vec_pretty(&manifest).map_err(Error::Encode)?;

        // Staged beside the records, where interrupted writes are swept up.
        write_atomic(
            &dir.join(RECORDS_DIR),
            &dir.join(MANIFEST_FILE),
            &raw,
            self.sync_writes,
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug)]
struct FsDatabase {
    records: PathBuf,
    sync_writes: bool,
}

impl FsDatabase {
    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.records
            .join(format!("{}.{}", key.digest(), RECORD_EXTENSION))
    }

    async fn files_with_extension(&self, ext: &str) -> StoreResult<Vec<PathBuf>> {
        let mut out = vec![];
        let mut dir = match fs::read_dir(&self.records).await {
            Ok(dir) => dir,
            // Someone removed the whole database: nothing to list.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension() == Some(OsStr::new(ext)) {
                out.push(path);
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl Database for FsDatabase {
    async fn read(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &CacheKey, record: Vec<u8>) -> StoreResult<()> {
        write_atomic(&self.records, &self.path_for(key), &record, self.sync_writes).await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> StoreResult<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut doomed = self.files_with_extension(RECORD_EXTENSION).await?;
        doomed.extend(self.files_with_extension(TEMP_EXTENSION).await?);

        for path in doomed {
            match fs::remove_file(&path).await {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn scan(&self) -> StoreResult<Vec<Vec<u8>>> {
        let mut out = vec![];

        for path in self.files_with_extension(RECORD_EXTENSION).await? {
            match fs::read(&path).await {
                Ok(raw) => out.push(raw),
                // Deleted between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => return Err(e.into()),
            }
        }

        Ok(out)
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

/// Writes `bytes` to `target` via a temporary file in `staging`, which must be
/// on the same filesystem.
async fn write_atomic(
    staging: &Path,
    target: &Path,
    bytes: &[u8],
    sync: bool,
) -> Result<(), IoError> {
    let temp = staging.join(format!("{}.{}", Uuid::new_v4(), TEMP_EXTENSION));

    let result = async {
        let mut file = fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        if sync {
            file.sync_all().await?;
        }
        drop(file);

        fs::rename(&temp, target).await?;

        if sync {
            if let Some(dir) = target.parent() {
                sync_dir(dir).await?;
            }
        }

        Ok::<(), IoError>(())
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp).await;
    }

    result
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), IoError> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), IoError> {
    Ok(())
}

/// Removes temporary files abandoned by interrupted writes.
///
/// Young files may belong to a writer in another process, so only files at
/// least `max_age` old are removed. Failures here are never fatal.
async fn sweep_stale_temps(records: &Path, max_age: Duration) {
    let mut dir = match fs::read_dir(records).await {
        Ok(dir) => dir,
        Err(e) => {
            debug!("Could not list {:?} for stale writes: {}.", records, e);
            return;
        },
    };

    let now = SystemTime::now();

    while let Ok(Some(entry)) = dir.next_entry().await {
        let path = entry.path();
        if path.extension() != Some(OsStr::new(TEMP_EXTENSION)) {
            continue;
        }

        let stale = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => now
                .duration_since(modified)
                .map_or(false, |age| age >= max_age),
            Err(_) => false,
        };

        if stale {
            debug!("Removing abandoned write {:?}.", path);
            let _ = fs::remove_file(&path).await;
        }
    }
}
