#[cfg(feature = "fs")]
use crate::backend::FsBackend;
use crate::{
    backend::{NullBackend, StorageBackend},
    constants::DEFAULT_DATABASE_NAME,
};
use std::{path::PathBuf, sync::Arc};
#[cfg(not(feature = "fs"))]
use tracing::debug;

/// Configuration for an [`AudioBufferStore`].
///
/// [`AudioBufferStore`]: crate::AudioBufferStore
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Name of the database backing the store.
    ///
    /// Stores sharing a name and location share records. Two stores of
    /// different payload shapes should use different names: each will treat
    /// the other's records as malformed.
    ///
    /// Defaults to [`DEFAULT_DATABASE_NAME`].
    pub name: String,

    /// Directory in which durable databases are kept.
    ///
    /// If `None`, there is no durable storage: the store uses a
    /// [`NullBackend`], never touches the filesystem, and every lookup misses.
    /// This is the expected setting for hosts without a writable disk.
    ///
    /// Defaults to `None`.
    pub location: Option<PathBuf>,

    /// Configures whether committed records are `fsync`ed before a `put`
    /// resolves.
    ///
    /// Defaults to `true`, so that a resolved `put` survives a crash or power
    /// loss. Records are written atomically either way.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE_NAME.to_owned(),
            location: None,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Sets this `Config`'s database name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets this `Config`'s storage directory.
    #[must_use]
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Removes this `Config`'s storage directory, disabling durable storage.
    #[must_use]
    pub fn no_location(mut self) -> Self {
        self.location = None;
        self
    }

    /// Sets whether this `Config` flushes each write to disk before reporting it.
    #[must_use]
    pub fn sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Builds the storage backend this `Config` describes.
    #[must_use]
    pub(crate) fn backend(&self) -> Arc<dyn StorageBackend> {
        match &self.location {
            #[cfg(feature = "fs")]
            Some(root) => Arc::new(FsBackend::new(root.clone()).sync_writes(self.sync_writes)),
            #[cfg(not(feature = "fs"))]
            Some(root) => {
                debug!(
                    "Ignoring storage location {:?}: built without the \"fs\" feature.",
                    root
                );
                Arc::new(NullBackend)
            },
            None => Arc::new(NullBackend),
        }
    }
}
