//! Storage and record error handling.

use crate::payload::{PayloadError, PayloadShape};
use serde_json::Error as JsonError;
use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
};

/// Errors encountered by a storage backend or while decoding a stored record.
///
/// These never escape an [`AudioBufferStore`] operation as an `Err`: the store
/// folds them into a [`Miss`] or [`Commit`], so that a broken cache only ever
/// makes the host re-decode its audio.
///
/// [`AudioBufferStore`]: crate::AudioBufferStore
/// [`Miss`]: crate::Miss
/// [`Commit`]: crate::Commit
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// No durable storage exists in this environment.
    Unavailable,
    /// The supplied cache key was empty.
    EmptyKey,
    /// The storage layer failed to read, write, or remove data.
    Io(IoError),
    /// The database on disk was created by a newer schema than this crate knows.
    VersionConflict {
        /// The schema version this crate asked for.
        requested: u32,
        /// The schema version found in the database.
        found: u32,
    },
    /// The database's schema manifest could not be parsed.
    CorruptManifest(JsonError),
    /// A record header or manifest could not be serialised.
    Encode(JsonError),
    /// A stored record was not a well-formed record for this store.
    Malformed(RecordError),
}

impl Error {
    /// Indicates whether this failure came from a stored record rather than
    /// from the storage layer itself.
    ///
    /// Malformed records are ordinary misses: overwriting the key with a fresh
    /// `put` replaces them.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unavailable => f.write_str("no durable storage is available"),
            Self::EmptyKey => f.write_str("cache keys must not be empty"),
            Self::Io(e) => f.write_fmt(format_args!("storage i/o failed: {e}")),
            Self::VersionConflict { requested, found } => f.write_fmt(format_args!(
                "database schema is version {found}, newer than requested version {requested}"
            )),
            Self::CorruptManifest(e) =>
                f.write_fmt(format_args!("database schema manifest is corrupt: {e}")),
            Self::Encode(e) => f.write_fmt(format_args!("failed to encode record header: {e}")),
            Self::Malformed(e) => f.write_fmt(format_args!("stored record is malformed: {e}")),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::CorruptManifest(e) | Self::Encode(e) => Some(e),
            Self::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(val: IoError) -> Self {
        Self::Io(val)
    }
}

impl From<RecordError> for Error {
    fn from(val: RecordError) -> Self {
        Self::Malformed(val)
    }
}

/// Convenience type for fallible storage operations.
pub type StoreResult<T> = Result<T, Error>;

/// Reasons a persisted record was rejected while being read back.
#[derive(Debug)]
#[non_exhaustive]
pub enum RecordError {
    /// The record ended before its fixed prefix, header, or body was complete.
    Truncated,
    /// The record did not begin with the expected magic number.
    BadMagic,
    /// The record container version is not understood by this crate.
    UnsupportedVersion(u32),
    /// The declared header length exceeds the sanity limit.
    HeaderTooLarge(u32),
    /// The JSON header could not be parsed.
    Header(JsonError),
    /// The record header names an empty key.
    MissingKey,
    /// The record was stored under a different key than the one requested.
    KeyMismatch {
        /// Key used for the lookup.
        expected: String,
        /// Key found inside the record.
        found: String,
    },
    /// The record holds a different payload shape than this store serves.
    ShapeMismatch {
        /// Shape served by the store.
        expected: PayloadShape,
        /// Shape found inside the record.
        found: PayloadShape,
    },
    /// The body length disagrees with the header's description of it.
    BodyLength {
        /// Length implied by the header.
        expected: u64,
        /// Length actually present.
        found: u64,
    },
    /// The decoded payload violated its own invariants.
    Payload(PayloadError),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Truncated => f.write_str("record is truncated"),
            Self::BadMagic => f.write_str("record magic number is missing"),
            Self::UnsupportedVersion(v) =>
                f.write_fmt(format_args!("record container version {v} is unsupported")),
            Self::HeaderTooLarge(len) =>
                f.write_fmt(format_args!("record header of {len} bytes is too large")),
            Self::Header(e) => f.write_fmt(format_args!("record header is invalid: {e}")),
            Self::MissingKey => f.write_str("record header names no key"),
            Self::KeyMismatch { expected, found } => f.write_fmt(format_args!(
                "record belongs to key {found:?}, not {expected:?}"
            )),
            Self::ShapeMismatch { expected, found } => f.write_fmt(format_args!(
                "record holds {found} audio, store serves {expected} audio"
            )),
            Self::BodyLength { expected, found } => f.write_fmt(format_args!(
                "record body is {found} bytes, header describes {expected}"
            )),
            Self::Payload(e) => f.write_fmt(format_args!("record payload is invalid: {e}")),
        }
    }
}

impl StdError for RecordError {}

impl From<JsonError> for RecordError {
    fn from(val: JsonError) -> Self {
        Self::Header(val)
    }
}

impl From<PayloadError> for RecordError {
    fn from(val: PayloadError) -> Self {
        Self::Payload(val)
    }
}
