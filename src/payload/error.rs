use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Reasons a [`DecodedAudio`] buffer was refused at construction.
///
/// [`DecodedAudio`]: super::DecodedAudio
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum PayloadError {
    /// The sample rate was zero.
    ZeroSampleRate,
    /// No channels were supplied.
    NoChannels,
    /// The channels held no frames.
    NoFrames,
    /// A channel's length differed from the buffer's frame count.
    ChannelLength {
        /// Index of the offending channel.
        channel: usize,
        /// Frame count of the buffer.
        expected: usize,
        /// Length of the offending channel.
        found: usize,
    },
    /// The stated duration disagreed with `length / sample_rate`.
    DurationMismatch {
        /// Duration implied by the length and sample rate, in seconds.
        expected: f64,
        /// Duration supplied, in seconds.
        found: f64,
    },
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ZeroSampleRate => f.write_str("sample rate must be positive"),
            Self::NoChannels => f.write_str("audio must have at least one channel"),
            Self::NoFrames => f.write_str("audio must have at least one frame"),
            Self::ChannelLength {
                channel,
                expected,
                found,
            } => f.write_fmt(format_args!(
                "channel {channel} has {found} samples, expected {expected}"
            )),
            Self::DurationMismatch { expected, found } => f.write_fmt(format_args!(
                "duration {found}s does not match length / sample rate ({expected}s)"
            )),
        }
    }
}

impl StdError for PayloadError {}
