use crate::{error::Error, record::CacheRecord};

/// Result of looking up a key in an [`AudioBufferStore`].
///
/// Every failure is a [`Miss`]; the reason is kept so callers and tests can
/// tell an empty cache from a broken one, but the expected reaction is the
/// same in all cases: decode or fetch the audio again.
///
/// [`AudioBufferStore`]: super::AudioBufferStore
#[derive(Debug)]
pub enum Lookup<P> {
    /// A well-formed record was found.
    Hit(CacheRecord<P>),
    /// No usable record was found.
    Miss(Miss),
}

impl<P> Lookup<P> {
    /// Whether a record was found.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The cached payload, if any.
    pub fn payload(&self) -> Option<&P> {
        match self {
            Self::Hit(record) => Some(&record.payload),
            Self::Miss(_) => None,
        }
    }

    /// The reason for a miss, if this lookup missed.
    pub fn miss(&self) -> Option<&Miss> {
        match self {
            Self::Hit(_) => None,
            Self::Miss(miss) => Some(miss),
        }
    }

    /// Converts this lookup into the found record, if any.
    pub fn into_record(self) -> Option<CacheRecord<P>> {
        match self {
            Self::Hit(record) => Some(record),
            Self::Miss(_) => None,
        }
    }

    /// Converts this lookup into the cached payload, if any.
    pub fn into_payload(self) -> Option<P> {
        self.into_record().map(CacheRecord::into_payload)
    }
}

/// Why a lookup found nothing.
#[derive(Debug)]
#[non_exhaustive]
pub enum Miss {
    /// Nothing is stored under the key.
    Absent,
    /// No durable storage exists in this environment.
    Unavailable,
    /// The database failed to open earlier, and caching is off for the
    /// lifetime of this store.
    Disabled,
    /// A record exists but is not a well-formed record of this store's shape.
    Malformed(Error),
    /// The storage layer failed, or the key was invalid.
    Failed(Error),
}

/// Result of a write or removal on an [`AudioBufferStore`].
///
/// Only [`Commit::Committed`] means the change is durable; every other
/// variant means the store is unchanged as far as the caller can rely on.
///
/// [`AudioBufferStore`]: super::AudioBufferStore
#[derive(Debug)]
#[non_exhaustive]
pub enum Commit {
    /// The change was committed.
    Committed,
    /// No durable storage exists in this environment; nothing was done.
    Unavailable,
    /// The database failed to open earlier; nothing was done.
    Disabled,
    /// The storage layer failed, or the key was invalid.
    Failed(Error),
}

impl Commit {
    /// Whether the change was committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}
