//! Constants describing the persisted layout of an audio buffer database.

#[cfg(feature = "fs")]
use std::time::Duration;

/// Schema version of every database created by this crate.
///
/// Opening a database written with a newer version fails, and the store
/// then behaves as though it were empty.
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the database used when [`Config::name`] is not set.
///
/// [`Config::name`]: crate::Config::name
pub const DEFAULT_DATABASE_NAME: &str = "audio-buffer-store";

/// Magic number at the start of every persisted record.
pub const RECORD_MAGIC: &[u8; 4] = b"ABS1";

/// Version of the record container following [`RECORD_MAGIC`].
pub const RECORD_VERSION: u32 = 1;

/// Size of the fixed prefix of a record: magic plus header length.
pub const RECORD_PREFIX_LEN: usize = RECORD_MAGIC.len() + std::mem::size_of::<u32>();

/// Upper bound on the JSON header of a record.
///
/// Headers are a handful of fields; anything larger is treated as corruption.
pub const MAX_HEADER_LEN: u32 = 64 * 1024;

/// Number of bytes in one `f32` sample.
pub const SAMPLE_LEN: usize = std::mem::size_of::<f32>();

/// Largest accepted difference, in seconds, between a decoded payload's
/// stored duration and `length / sample_rate`.
pub const DURATION_TOLERANCE: f64 = 1e-6;

/// File holding the schema manifest of an on-disk database.
#[cfg(feature = "fs")]
pub(crate) const MANIFEST_FILE: &str = "schema.json";

/// Directory holding the single record collection of an on-disk database.
#[cfg(feature = "fs")]
pub(crate) const RECORDS_DIR: &str = "records";

/// Extension of committed record files.
#[cfg(feature = "fs")]
pub(crate) const RECORD_EXTENSION: &str = "rec";

/// Extension of in-flight record files, renamed into place on commit.
#[cfg(feature = "fs")]
pub(crate) const TEMP_EXTENSION: &str = "tmp";

/// Age after which an in-flight record file is considered abandoned.
#[cfg(feature = "fs")]
pub(crate) const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);
