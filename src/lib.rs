#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Stemstore is a persistent, best-effort, async cache for audio buffers, written in Rust.
//!
//! Decoding a multi-minute stem takes far longer than reading it back from disk,
//! so applications which load the same files session after session can keep
//! their decoded (or freshly downloaded) audio here. The library offers:
//!  * An [`AudioBufferStore`] holding either [`RawAudio`] (undecoded file bytes)
//!  or [`DecodedAudio`] (planar `f32` channels with their sample rate), keyed by
//!  an opaque string of the caller's choosing.
//!  * Bit-exact storage: every sample comes back with the same bits it went in with.
//!  * Lazy, shared access to a named and versioned database, opened on first use.
//!  * Pluggable [`backend`]s: the local filesystem via the `"fs"` feature (on by
//!  default), process memory, or nothing at all.
//!
//! ## Failure is a miss
//! A cache must never be the reason an application fails. No store operation
//! returns an `Err` or panics: missing storage, a database from a newer
//! version, corrupt records, and I/O failures all surface as a [`Lookup::Miss`]
//! or a non-committed [`Commit`], and are logged through [`tracing`].
//! Callers react to all of them the same way, by doing the expensive work again.
//!
//! If no storage location is configured, the store is built over a
//! [`NullBackend`] and every operation is a cheap no-op.
//!
//! ## Example
//! ```rust,no_run
//! use stemstore::{Config, DecodedAudio, DecodedAudioStore};
//!
//! # async fn load(store: &DecodedAudioStore, decode: impl Fn() -> DecodedAudio) {
//! let audio = match store.get_payload("stems/bass.flac").await {
//!     Some(audio) => audio,
//!     None => {
//!         let audio = decode();
//!         store.put("stems/bass.flac", &audio).await;
//!         audio
//!     },
//! };
//! # }
//! ```
//!
//! [`tracing`]: https://docs.rs/tracing

#![warn(clippy::pedantic)]
#![allow(
    // Allowed as they are too pedantic
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::too_many_lines,
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    // No operation on the store itself can fail.
    clippy::missing_errors_doc,
)]

pub mod backend;
mod config;
pub mod constants;
pub mod error;
mod key;
pub mod payload;
mod record;
mod store;

pub use crate::{
    backend::{MemoryBackend, NullBackend, StorageBackend},
    config::Config,
    error::{Error, StoreResult},
    key::CacheKey,
    payload::{DecodedAudio, Layout, Payload, PayloadShape, RawAudio},
    record::{CacheRecord, EntryInfo},
    store::*,
};

#[cfg(feature = "fs")]
pub use crate::backend::FsBackend;
