//! Keys addressing one cached audio asset.

use crate::error::{Error, StoreResult};
use std::{
    borrow::Borrow,
    convert::TryFrom,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// A non-empty string identifying one audio asset within a store.
///
/// Keys are opaque to the store: a content hash, a session-scoped id, or a
/// source file name are all fine, so long as the caller uses them
/// consistently. Writing twice under one key replaces the earlier record.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates and wraps a key.
    pub fn new(key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();

        if key.is_empty() {
            Err(Error::EmptyKey)
        } else {
            Ok(Self(key))
        }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Hex-encoded SHA-256 digest of the key, used to name its record on disk.
    ///
    /// Digests keep arbitrary keys (slashes, very long file names) from
    /// escaping or overflowing the record directory.
    #[cfg(feature = "fs")]
    pub(crate) fn digest(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = Error;

    fn try_from(val: String) -> StoreResult<Self> {
        Self::new(val)
    }
}

impl TryFrom<&str> for CacheKey {
    type Error = Error;

    fn try_from(val: &str) -> StoreResult<Self> {
        Self::new(val)
    }
}
