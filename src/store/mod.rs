//! The best-effort audio buffer cache.

mod outcome;

pub use self::outcome::*;

use crate::{
    backend::{Database, StorageBackend},
    config::Config,
    constants::SCHEMA_VERSION,
    key::CacheKey,
    payload::{DecodedAudio, Payload, RawAudio},
    record::{self, EntryInfo},
};
use derivative::Derivative;
use std::{marker::PhantomData, sync::Arc, time::SystemTime};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, trace, warn};

/// A store of undecoded audio file bytes.
pub type RawAudioStore = AudioBufferStore<RawAudio>;

/// A store of decoded, planar `f32` audio.
pub type DecodedAudioStore = AudioBufferStore<DecodedAudio>;

/// A persistent, asynchronous cache of audio payloads keyed by [`CacheKey`].
///
/// The store exists to spare its owner from re-decoding or re-fetching large
/// audio files, so it never gets in that owner's way: no operation returns an
/// `Err` or panics. Storage which is missing, broken, or full simply makes
/// lookups miss, with the reason reported in the returned [`Lookup`] or
/// [`Commit`].
///
/// The backing database is opened on first use and the handle is shared by
/// every later call. If opening fails, the failure is logged once and the
/// store stays empty for the rest of its life.
///
/// Each operation is an independent transaction. Concurrent `put`s to one key
/// race, and the last to commit wins; a `get` racing a `put` sees either the
/// old or the new record, never part of one.
///
/// ```rust,no_run
/// # async fn demo() {
/// use stemstore::{Config, DecodedAudio, DecodedAudioStore};
///
/// let store = DecodedAudioStore::new(Config::default().location("/var/cache/stems"));
/// let kick = DecodedAudio::new(44_100, vec![vec![0.0; 88_200]]).unwrap();
///
/// store.put("kick.wav", &kick).await;
///
/// if let Some(cached) = store.get_payload("kick.wav").await {
///     assert_eq!(cached.sample_rate(), 44_100);
/// }
/// # }
/// ```
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct AudioBufferStore<P> {
    config: Config,
    #[derivative(Debug = "ignore")]
    backend: Arc<dyn StorageBackend>,
    #[derivative(Debug = "ignore")]
    db: OnceCell<Option<Arc<dyn Database>>>,
    #[derivative(Debug = "ignore")]
    shape: PhantomData<fn() -> P>,
}

enum Handle<'a> {
    Unavailable,
    Disabled,
    Open(&'a Arc<dyn Database>),
}

impl<P: Payload> AudioBufferStore<P> {
    /// Creates a store over the backend described by `config`.
    ///
    /// No I/O happens until the first operation.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let backend = config.backend();
        Self::from_parts(config, backend)
    }

    /// Creates a store over an explicit backend.
    ///
    /// `config.location` is ignored; `config.name` still names the database.
    pub fn with_backend<B: StorageBackend + 'static>(config: Config, backend: B) -> Self {
        Self::from_parts(config, Arc::new(backend))
    }

    fn from_parts(config: Config, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            config,
            backend,
            db: OnceCell::new(),
            shape: PhantomData,
        }
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether this store's backend has any storage to offer.
    ///
    /// A store can be available and still miss on everything, e.g. if its
    /// database failed to open.
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    async fn handle(&self) -> Handle<'_> {
        if !self.backend.is_available() {
            trace!(
                "No durable storage behind {:?}, skipping.",
                self.config.name
            );
            return Handle::Unavailable;
        }

        let db = self
            .db
            .get_or_init(|| async {
                match self.backend.open(&self.config.name, SCHEMA_VERSION).await {
                    Ok(db) => {
                        debug!(
                            "Opened audio buffer database {:?} ({} backend).",
                            self.config.name,
                            self.backend.name()
                        );
                        Some(db)
                    },
                    Err(e) => {
                        warn!(
                            "Audio buffer database {:?} could not be opened, caching disabled: {}.",
                            self.config.name, e
                        );
                        None
                    },
                }
            })
            .await;

        match db {
            Some(db) => Handle::Open(db),
            None => Handle::Disabled,
        }
    }

    /// Looks up the record stored under `key`.
    ///
    /// This never changes the store: there is no notion of recency.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Lookup<P> {
        let db = match self.handle().await {
            Handle::Open(db) => db,
            Handle::Unavailable => return Lookup::Miss(Miss::Unavailable),
            Handle::Disabled => return Lookup::Miss(Miss::Disabled),
        };

        let key = match CacheKey::new(key) {
            Ok(key) => key,
            Err(e) => {
                warn!("Refusing lookup: {}.", e);
                return Lookup::Miss(Miss::Failed(e));
            },
        };

        let raw = match db.read(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Lookup::Miss(Miss::Absent),
            Err(e) => {
                warn!("Failed to read cached audio for {:?}: {}.", key.as_str(), e);
                return Lookup::Miss(Miss::Failed(e));
            },
        };

        match record::decode::<P>(&key, &raw) {
            Ok(record) => Lookup::Hit(record),
            Err(e) => {
                debug!("Ignoring malformed record for {:?}: {}.", key.as_str(), e);
                Lookup::Miss(Miss::Malformed(e.into()))
            },
        }
    }

    /// Looks up the payload stored under `key`, discarding the reason for a miss.
    pub async fn get_payload(&self, key: &str) -> Option<P> {
        self.get(key).await.into_payload()
    }

    /// Whether a well-formed record is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.is_hit()
    }

    /// Stores `payload` under `key`, replacing any earlier record.
    ///
    /// Returns once the record is committed as durably as the backend allows,
    /// so a [`Commit::Committed`] result survives a restart. Failures are
    /// logged and reported, never raised.
    #[instrument(skip(self, payload))]
    pub async fn put(&self, key: &str, payload: &P) -> Commit {
        let db = match self.handle().await {
            Handle::Open(db) => db,
            Handle::Unavailable => return Commit::Unavailable,
            Handle::Disabled => return Commit::Disabled,
        };

        let key = match CacheKey::new(key) {
            Ok(key) => key,
            Err(e) => {
                warn!("Refusing to cache audio: {}.", e);
                return Commit::Failed(e);
            },
        };

        let encoded = match record::encode(&key, payload, SystemTime::now()) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode audio for {:?}: {}.", key.as_str(), e);
                return Commit::Failed(e);
            },
        };
        let len = encoded.len();

        match db.write(&key, encoded).await {
            Ok(()) => {
                trace!("Cached {} bytes for {:?}.", len, key.as_str());
                Commit::Committed
            },
            Err(e) => {
                warn!("Failed to cache audio for {:?}: {}.", key.as_str(), e);
                Commit::Failed(e)
            },
        }
    }

    /// Removes the record stored under `key`, if there is one.
    ///
    /// Removing an absent key is committed as a no-op.
    #[instrument(skip(self))]
    pub async fn remove(&self, key: &str) -> Commit {
        let db = match self.handle().await {
            Handle::Open(db) => db,
            Handle::Unavailable => return Commit::Unavailable,
            Handle::Disabled => return Commit::Disabled,
        };

        let key = match CacheKey::new(key) {
            Ok(key) => key,
            Err(e) => {
                warn!("Refusing removal: {}.", e);
                return Commit::Failed(e);
            },
        };

        match db.delete(&key).await {
            Ok(existed) => {
                trace!("Removed {:?} (present: {}).", key.as_str(), existed);
                Commit::Committed
            },
            Err(e) => {
                warn!("Failed to remove cached audio for {:?}: {}.", key.as_str(), e);
                Commit::Failed(e)
            },
        }
    }

    /// Removes every record in the store.
    ///
    /// Clearing an empty or freshly created store is committed as a no-op.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Commit {
        let db = match self.handle().await {
            Handle::Open(db) => db,
            Handle::Unavailable => return Commit::Unavailable,
            Handle::Disabled => return Commit::Disabled,
        };

        match db.clear().await {
            Ok(()) => {
                debug!("Cleared audio buffer database {:?}.", self.config.name);
                Commit::Committed
            },
            Err(e) => {
                warn!(
                    "Failed to clear audio buffer database {:?}: {}.",
                    self.config.name, e
                );
                Commit::Failed(e)
            },
        }
    }

    /// Lists every well-formed record in the store, in no particular order.
    ///
    /// This reads every record in full, and is meant for maintenance such as
    /// evicting by [`EntryInfo::stored_at`]. Records of the other payload
    /// shape are listed too; malformed records are skipped.
    #[instrument(skip(self))]
    pub async fn entries(&self) -> Vec<EntryInfo> {
        let db = match self.handle().await {
            Handle::Open(db) => db,
            Handle::Unavailable | Handle::Disabled => return vec![],
        };

        let raw = match db.scan().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Failed to list audio buffer database {:?}: {}.",
                    self.config.name, e
                );
                return vec![];
            },
        };

        raw.iter()
            .filter_map(|bytes| match record::inspect(bytes) {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!("Skipping malformed record: {}.", e);
                    None
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MemoryBackend, NullBackend},
        constants::DURATION_TOLERANCE,
        error::{Error, RecordError, StoreResult},
        payload::PayloadShape,
    };
    use async_trait::async_trait;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::{
        io::{Error as IoError, ErrorKind},
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn bits(audio: &DecodedAudio) -> Vec<Vec<u32>> {
        audio
            .channels()
            .iter()
            .map(|plane| plane.iter().map(|s| s.to_bits()).collect())
            .collect()
    }

    fn memory_store() -> DecodedAudioStore {
        AudioBufferStore::with_backend(Config::default(), MemoryBackend::new())
    }

    /// Counts how often the database is opened.
    #[derive(Clone, Default)]
    struct Counting {
        inner: MemoryBackend,
        opens: Arc<AtomicUsize>,
        unavailable: bool,
        newer_schema: bool,
    }

    #[async_trait]
    impl StorageBackend for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn is_available(&self) -> bool {
            !self.unavailable
        }

        async fn open(&self, name: &str, version: u32) -> StoreResult<Arc<dyn Database>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.newer_schema {
                Err(Error::VersionConflict {
                    requested: version,
                    found: version + 1,
                })
            } else {
                self.inner.open(name, version).await
            }
        }
    }

    /// A disk on which every transaction fails.
    struct BrokenDisk;

    struct BrokenDb;

    fn disk_full() -> Error {
        Error::Io(IoError::new(ErrorKind::Other, "no space left on device"))
    }

    #[async_trait]
    impl StorageBackend for BrokenDisk {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn open(&self, _name: &str, _version: u32) -> StoreResult<Arc<dyn Database>> {
            let db: Arc<dyn Database> = Arc::new(BrokenDb);
            Ok(db)
        }
    }

    #[async_trait]
    impl Database for BrokenDb {
        async fn read(&self, _key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
            Err(disk_full())
        }

        async fn write(&self, _key: &CacheKey, _record: Vec<u8>) -> StoreResult<()> {
            Err(disk_full())
        }

        async fn delete(&self, _key: &CacheKey) -> StoreResult<bool> {
            Err(disk_full())
        }

        async fn clear(&self) -> StoreResult<()> {
            Err(disk_full())
        }

        async fn scan(&self) -> StoreResult<Vec<Vec<u8>>> {
            Err(disk_full())
        }
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn kick_round_trips_through_disk() {
        let root = tempfile::tempdir().unwrap();
        let store = DecodedAudioStore::new(Config::default().location(root.path()));

        let kick = DecodedAudio::from_parts(44_100, 88_200, 2.0, vec![vec![0.0; 88_200]]).unwrap();
        assert!(store.put("kick.wav", &kick).await.is_committed());

        let cached = store.get_payload("kick.wav").await.unwrap();
        assert_eq!(cached.sample_rate(), 44_100);
        assert_eq!(cached.channels().len(), 1);
        assert_eq!(cached.channels()[0].len(), 88_200);
        assert_eq!(cached, kick);
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn keys_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let store = DecodedAudioStore::new(Config::default().location(root.path()));

        let a = DecodedAudio::new(48_000, vec![utils::sine(440.0, 48_000, 4_800)]).unwrap();
        let b = DecodedAudio::new(44_100, utils::stereo_sine(220.0, 44_100, 2_205)).unwrap();

        assert!(store.put("a.wav", &a).await.is_committed());
        assert!(store.put("b.wav", &b).await.is_committed());

        assert_eq!(store.get_payload("a.wav").await, Some(a));
        assert_eq!(store.get_payload("b.wav").await, Some(b));
        assert!(matches!(
            store.get("c.wav").await,
            Lookup::Miss(Miss::Absent)
        ));
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn samples_round_trip_bit_exact() {
        let root = tempfile::tempdir().unwrap();
        let store = DecodedAudioStore::new(Config::default().location(root.path()));

        let mut left = utils::noise(7, 1_024);
        left[0] = f32::from_bits(0x7fc0_0bad);
        left[1] = -0.0;
        left[2] = f32::MIN_POSITIVE / 4.0;
        let right = utils::noise(8, 1_024);
        let audio = DecodedAudio::new(96_000, vec![left, right]).unwrap();

        store.put("pad.wav", &audio).await;
        let record = store.get("pad.wav").await.into_record().unwrap();

        assert_eq!(record.key.as_str(), "pad.wav");
        assert_eq!(record.payload.sample_rate(), 96_000);
        assert_eq!(record.payload.length(), 1_024);
        assert_eq!(record.payload.number_of_channels(), 2);
        assert_eq!(
            record.payload.duration().to_bits(),
            audio.duration().to_bits()
        );
        assert_eq!(bits(&record.payload), bits(&audio));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn later_puts_replace_earlier_ones() {
        let store = memory_store();
        let first = DecodedAudio::new(8_000, vec![vec![0.1; 100], vec![0.2; 100]]).unwrap();
        let second = DecodedAudio::new(16_000, vec![vec![0.3; 50]]).unwrap();

        store.put("loop.wav", &first).await;
        store.put("loop.wav", &second).await;

        assert_eq!(store.get_payload("loop.wav").await, Some(second));
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn clear_empties_the_store() {
        let root = tempfile::tempdir().unwrap();
        let store = DecodedAudioStore::new(Config::default().location(root.path()));

        // Clearing before anything was ever written is a no-op.
        assert!(store.clear().await.is_committed());

        let audio = DecodedAudio::new(22_050, vec![vec![0.5; 10]]).unwrap();
        store.put("a.wav", &audio).await;
        store.put("b.wav", &audio).await;

        assert!(store.clear().await.is_committed());
        assert!(matches!(store.get("a.wav").await, Lookup::Miss(Miss::Absent)));
        assert!(matches!(store.get("b.wav").await, Lookup::Miss(Miss::Absent)));
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn remove_deletes_one_key() {
        let store = memory_store();
        let audio = DecodedAudio::new(22_050, vec![vec![0.5; 10]]).unwrap();

        store.put("a.wav", &audio).await;
        store.put("b.wav", &audio).await;

        assert!(store.remove("a.wav").await.is_committed());
        assert!(store.remove("never.wav").await.is_committed());
        assert!(!store.contains("a.wav").await);
        assert!(store.contains("b.wav").await);
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn records_survive_a_new_store() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::default().name("session").location(root.path());
        let audio = DecodedAudio::new(44_100, utils::stereo_sine(110.0, 44_100, 4_410)).unwrap();

        {
            let store = DecodedAudioStore::new(config.clone());
            assert!(store.put("bass.wav", &audio).await.is_committed());
        }

        let reopened = DecodedAudioStore::new(config);
        assert_eq!(reopened.get_payload("bass.wav").await, Some(audio));
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn raw_bytes_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let store = RawAudioStore::new(Config::default().location(root.path()));
        let wav = RawAudio::new(utils::wav_bytes(44_100, &utils::stereo_sine(330.0, 44_100, 441)));

        assert!(store.put("snare.wav", &wav).await.is_committed());
        assert_eq!(store.get_payload("snare.wav").await, Some(wav));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn unavailable_storage_is_a_silent_no_op() {
        let backend = Counting {
            unavailable: true,
            ..Default::default()
        };
        let opens = backend.opens.clone();
        let store = DecodedAudioStore::with_backend(Config::default(), backend);
        let audio = DecodedAudio::new(8_000, vec![vec![0.0; 8]]).unwrap();

        assert!(!store.is_available());
        assert!(matches!(store.put("a.wav", &audio).await, Commit::Unavailable));
        assert!(matches!(store.get("a.wav").await, Lookup::Miss(Miss::Unavailable)));
        assert!(matches!(store.remove("a.wav").await, Commit::Unavailable));
        assert!(matches!(store.clear().await, Commit::Unavailable));
        assert!(store.entries().await.is_empty());
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn default_config_has_no_storage() {
        let root = tempfile::tempdir().unwrap();
        let store = RawAudioStore::new(Config::default());

        assert!(!store.is_available());
        assert!(matches!(
            store.put("a.wav", &RawAudio::new(vec![1, 2, 3])).await,
            Commit::Unavailable
        ));
        assert!(store.get_payload("a.wav").await.is_none());

        let explicit = RawAudioStore::with_backend(Config::default(), NullBackend);
        assert!(matches!(explicit.clear().await, Commit::Unavailable));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10_000)]
    async fn concurrent_first_use_opens_once() {
        let backend = Counting::default();
        let opens = backend.opens.clone();
        let store = Arc::new(DecodedAudioStore::with_backend(Config::default(), backend));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let audio = DecodedAudio::new(8_000, vec![vec![i as f32; 8]]).unwrap();
                    store.put(&format!("{}.wav", i), &audio).await.is_committed()
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(store.entries().await.len(), 16);
    }

    #[cfg(feature = "fs")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10_000)]
    async fn racing_puts_leave_one_whole_record() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(DecodedAudioStore::new(
            Config::default().location(root.path()),
        ));

        let a = DecodedAudio::new(48_000, vec![vec![0.25; 4_800], vec![0.5; 4_800]]).unwrap();
        let b = DecodedAudio::new(44_100, vec![vec![-0.75; 9_000]]).unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let payload = if i % 2 == 0 { a.clone() } else { b.clone() };
                tokio::spawn(async move { store.put("mix.wav", &payload).await.is_committed() })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap());
        }

        let winner = store.get_payload("mix.wav").await.unwrap();
        assert!(winner == a || winner == b);
        assert_eq!(store.entries().await.len(), 1);
    }

    #[cfg(feature = "fs")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn reads_during_puts_see_whole_records() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(DecodedAudioStore::new(
            Config::default().location(root.path()).sync_writes(false),
        ));

        let a = DecodedAudio::new(48_000, utils::stereo_sine(220.0, 48_000, 24_000)).unwrap();
        let b = DecodedAudio::new(44_100, vec![utils::noise(3, 44_100)]).unwrap();
        assert!(store.put("mix.wav", &a).await.is_committed());

        let writer = {
            let store = store.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move {
                for i in 0..64 {
                    let payload = if i % 2 == 0 { &b } else { &a };
                    assert!(store.put("mix.wav", payload).await.is_committed());
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                let (a, b) = (a.clone(), b.clone());
                tokio::spawn(async move {
                    let mut hits = 0;
                    for _ in 0..64 {
                        match store.get("mix.wav").await {
                            Lookup::Hit(record) => {
                                assert!(record.payload == a || record.payload == b);
                                hits += 1;
                            },
                            Lookup::Miss(miss) => panic!("reader saw {:?}", miss),
                        }
                        tokio::task::yield_now().await;
                    }
                    hits
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            assert_eq!(reader.await.unwrap(), 64);
        }
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn malformed_records_are_misses() {
        let root = tempfile::tempdir().unwrap();
        let store = DecodedAudioStore::new(Config::default().name("stems").location(root.path()));
        let audio = DecodedAudio::new(8_000, vec![vec![0.5; 64]]).unwrap();

        store.put("vox.wav", &audio).await;

        let path = root
            .path()
            .join("stems")
            .join(crate::constants::RECORDS_DIR)
            .join(format!(
                "{}.{}",
                CacheKey::new("vox.wav").unwrap().digest(),
                crate::constants::RECORD_EXTENSION
            ));
        let mut raw = std::fs::read(&path).unwrap();
        raw.truncate(raw.len() - 3);
        std::fs::write(&path, &raw).unwrap();

        match store.get("vox.wav").await {
            Lookup::Miss(Miss::Malformed(e)) => assert!(e.is_malformed()),
            other => panic!("expected a malformed miss, got {:?}", other.miss()),
        }
        assert!(store.entries().await.is_empty());

        // A fresh put repairs the key.
        assert!(store.put("vox.wav", &audio).await.is_committed());
        assert!(store.contains("vox.wav").await);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn other_shapes_are_misses() {
        let backend = MemoryBackend::new();
        let decoded = DecodedAudioStore::with_backend(Config::default(), backend.clone());
        let raw = RawAudioStore::with_backend(Config::default(), backend);

        decoded
            .put("a.wav", &DecodedAudio::new(8_000, vec![vec![0.0; 8]]).unwrap())
            .await;

        assert!(matches!(
            raw.get("a.wav").await,
            Lookup::Miss(Miss::Malformed(Error::Malformed(RecordError::ShapeMismatch {
                expected: PayloadShape::Raw,
                found: PayloadShape::Decoded,
            })))
        ));

        let entries = raw.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].shape(), PayloadShape::Decoded);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn failed_open_disables_the_store() {
        let backend = Counting {
            newer_schema: true,
            ..Default::default()
        };
        let opens = backend.opens.clone();
        let store = DecodedAudioStore::with_backend(Config::default(), backend);
        let audio = DecodedAudio::new(8_000, vec![vec![0.0; 8]]).unwrap();

        assert!(store.is_available());
        assert!(matches!(store.put("a.wav", &audio).await, Commit::Disabled));
        assert!(matches!(store.get("a.wav").await, Lookup::Miss(Miss::Disabled)));
        assert!(matches!(store.clear().await, Commit::Disabled));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn newer_schema_on_disk_disables_the_store() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("stems");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(crate::constants::MANIFEST_FILE),
            br#"{ "name": "stems", "version": 99 }"#,
        )
        .unwrap();

        let store = RawAudioStore::new(Config::default().name("stems").location(root.path()));

        assert!(matches!(
            store.put("a.wav", &RawAudio::new(vec![0; 4])).await,
            Commit::Disabled
        ));
        assert!(matches!(store.get("a.wav").await, Lookup::Miss(Miss::Disabled)));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn transaction_failures_degrade_to_misses() {
        let store = DecodedAudioStore::with_backend(Config::default(), BrokenDisk);
        let audio = DecodedAudio::new(8_000, vec![vec![0.0; 8]]).unwrap();

        assert!(matches!(
            store.put("a.wav", &audio).await,
            Commit::Failed(Error::Io(_))
        ));
        assert!(matches!(
            store.get("a.wav").await,
            Lookup::Miss(Miss::Failed(Error::Io(_)))
        ));
        assert!(matches!(store.remove("a.wav").await, Commit::Failed(_)));
        assert!(matches!(store.clear().await, Commit::Failed(_)));
        assert!(store.entries().await.is_empty());
        assert!(!store.contains("a.wav").await);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn empty_keys_are_refused() {
        let store = memory_store();
        let audio = DecodedAudio::new(8_000, vec![vec![0.0; 8]]).unwrap();

        assert!(matches!(
            store.put("", &audio).await,
            Commit::Failed(Error::EmptyKey)
        ));
        assert!(matches!(
            store.get("").await,
            Lookup::Miss(Miss::Failed(Error::EmptyKey))
        ));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn entries_report_keys_and_commit_times() {
        let store = memory_store();
        let before = SystemTime::now() - std::time::Duration::from_secs(1);
        let audio = DecodedAudio::new(8_000, vec![vec![0.0; 8], vec![1.0; 8]]).unwrap();

        store.put("a.wav", &audio).await;
        store.put("b.wav", &audio).await;

        let mut entries = store.entries().await;
        entries.sort_by(|x, y| x.key.cmp(&y.key));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_str(), "a.wav");
        assert_eq!(entries[1].key.as_str(), "b.wav");
        for entry in &entries {
            assert!(entry.stored_at >= before);
            assert_eq!(entry.layout.body_len(), Some(2 * 8 * 4));
        }
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn random_buffers_keep_their_duration() {
        let store = memory_store();
        let mut rng = StdRng::seed_from_u64(0x5eed_cafe);

        for i in 0..64 {
            let sample_rate = rng.gen_range(8_000..=192_000u32);
            let length = rng.gen_range(1..=4_096usize);
            let number_of_channels = rng.gen_range(1..=4usize);
            let duration = length as f64 / f64::from(sample_rate);

            let channels: Vec<Vec<f32>> = (0..number_of_channels)
                .map(|_| (0..length).map(|_| rng.gen_range(-1.0f32..=1.0)).collect())
                .collect();
            let audio = DecodedAudio::from_parts(sample_rate, length, duration, channels).unwrap();

            let key = format!("fuzz-{}", i);
            assert!(store.put(&key, &audio).await.is_committed());

            let cached = store.get_payload(&key).await.unwrap();
            let expected = cached.length() as f64 / f64::from(cached.sample_rate());
            assert!((cached.duration() - expected).abs() <= DURATION_TOLERANCE);
            assert_eq!(cached.duration().to_bits(), audio.duration().to_bits());
            assert_eq!(bits(&cached), bits(&audio));
            assert_eq!(cached, audio);
        }
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn short_buffers_keep_exact_durations() {
        let store = memory_store();

        for &sample_rate in &[11_025, 22_050, 44_100, 48_000, 96_000] {
            for length in 1..2_000 {
                let audio = DecodedAudio::new(sample_rate, vec![vec![0.0; length]]).unwrap();
                assert!(store.put("tick.wav", &audio).await.is_committed());

                let cached = store.get_payload("tick.wav").await.unwrap();
                assert_eq!(
                    cached.duration().to_bits(),
                    audio.duration().to_bits(),
                    "{} frames at {} Hz",
                    length,
                    sample_rate
                );
                assert_eq!(cached, audio);
            }
        }
    }
}
