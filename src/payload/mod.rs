//! The two shapes of audio a store can hold.
//!
//! A store is typed over exactly one of these: [`RawAudio`] for undecoded
//! file bytes, or [`DecodedAudio`] for planar `f32` PCM ready for playback.
//! Both describe themselves to the record codec through a [`Layout`], which is
//! persisted in every record's header.

mod decoded;
mod error;
mod raw;

pub use self::{decoded::*, error::*, raw::*};

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::{
    convert::TryFrom,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Which of the two payload shapes a record holds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PayloadShape {
    /// Undecoded file bytes.
    Raw,
    /// Decoded, planar `f32` samples.
    Decoded,
}

impl Display for PayloadShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Decoded => f.write_str("decoded"),
        }
    }
}

/// Header-level description of a payload, stored ahead of its body.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum Layout {
    /// An opaque byte buffer.
    #[serde(rename_all = "camelCase")]
    Raw {
        /// Number of bytes in the body.
        byte_length: u64,
    },
    /// Planar `f32` channels.
    #[serde(rename_all = "camelCase")]
    Decoded {
        /// Sample rate, in Hz.
        sample_rate: u32,
        /// Frames per channel.
        length: u64,
        /// Redundant duration in seconds, equal to `length / sample_rate`.
        duration: f64,
        /// Number of channels in the body.
        number_of_channels: u32,
    },
}

impl Layout {
    /// The payload shape this layout describes.
    #[must_use]
    pub fn shape(&self) -> PayloadShape {
        match self {
            Self::Raw { .. } => PayloadShape::Raw,
            Self::Decoded { .. } => PayloadShape::Decoded,
        }
    }

    /// Size of the body this layout describes, or `None` if it cannot be
    /// represented (corrupt headers can claim absurd sizes).
    #[must_use]
    pub fn body_len(&self) -> Option<u64> {
        match self {
            Self::Raw { byte_length } => Some(*byte_length),
            Self::Decoded {
                length,
                number_of_channels,
                ..
            } => length
                .checked_mul(u64::from(*number_of_channels))?
                .checked_mul(crate::constants::SAMPLE_LEN as u64),
        }
    }

    /// Checks the invariants a payload of this layout must hold, short of
    /// reading its body.
    pub(crate) fn validate(&self) -> Result<(), PayloadError> {
        match self {
            Self::Raw { .. } => Ok(()),
            Self::Decoded {
                sample_rate,
                length,
                duration,
                number_of_channels,
            } => decoded::validate_dimensions(
                *sample_rate,
                usize::try_from(*length).unwrap_or(usize::MAX),
                *duration,
                *number_of_channels as usize,
            ),
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// An audio payload which can be persisted by an [`AudioBufferStore`].
///
/// This trait is sealed: [`RawAudio`] and [`DecodedAudio`] are the only shapes.
///
/// [`AudioBufferStore`]: crate::AudioBufferStore
pub trait Payload: private::Sealed + Sized + Send + Sync + 'static {
    /// The shape every record of this payload type carries.
    const SHAPE: PayloadShape;

    /// Describes this payload for the record header.
    fn layout(&self) -> Layout;

    /// Appends this payload's body to `out`.
    fn write_body(&self, out: &mut Vec<u8>);

    /// Rebuilds a payload from a header layout and a body whose length has
    /// already been checked against [`Layout::body_len`].
    fn read_body(layout: &Layout, body: &[u8]) -> Result<Self, RecordError>;
}

impl private::Sealed for RawAudio {}
impl private::Sealed for DecodedAudio {}
