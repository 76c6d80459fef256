use super::{Layout, Payload, PayloadError, PayloadShape};
use crate::{
    constants::{DURATION_TOLERANCE, SAMPLE_LEN},
    error::RecordError,
};
use byteorder::{ByteOrder, LittleEndian};
use std::convert::TryFrom;

/// Decoded multi-channel audio, held as one `f32` plane per channel.
///
/// Every `DecodedAudio` satisfies:
///  * `sample_rate > 0`,
///  * at least one channel and at least one frame,
///  * every channel holds exactly [`length`] samples,
///  * [`duration`] equals `length / sample_rate` to within
///    [`DURATION_TOLERANCE`].
///
/// These are checked on construction, so a store can never persist a buffer
/// which breaks them.
///
/// [`length`]: DecodedAudio::length
/// [`duration`]: DecodedAudio::duration
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    length: usize,
    duration: f64,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Builds a buffer from its channel planes, deriving length and duration.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, PayloadError> {
        let length = channels.first().map_or(0, Vec::len);
        let duration = duration_of(length, sample_rate);

        Self::from_parts(sample_rate, length, duration, channels)
    }

    /// Builds a buffer from all of its fields, as handed over by a decoder
    /// which reports length and duration itself.
    pub fn from_parts(
        sample_rate: u32,
        length: usize,
        duration: f64,
        channels: Vec<Vec<f32>>,
    ) -> Result<Self, PayloadError> {
        validate(sample_rate, length, duration, &channels)?;

        Ok(Self {
            sample_rate,
            length,
            duration,
            channels,
        })
    }

    /// Sample rate, in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per channel.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of channels.
    #[must_use]
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// All channel planes, in channel order.
    #[must_use]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// One channel plane, if it exists.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Consumes the buffer, returning its channel planes.
    #[must_use]
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

/// Duration, in seconds, of `length` frames at `sample_rate`.
#[must_use]
pub fn duration_of(length: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        0.0
    } else {
        length as f64 / f64::from(sample_rate)
    }
}

fn validate(
    sample_rate: u32,
    length: usize,
    duration: f64,
    channels: &[Vec<f32>],
) -> Result<(), PayloadError> {
    validate_dimensions(sample_rate, length, duration, channels.len())?;

    if let Some((channel, plane)) = channels
        .iter()
        .enumerate()
        .find(|(_, plane)| plane.len() != length)
    {
        return Err(PayloadError::ChannelLength {
            channel,
            expected: length,
            found: plane.len(),
        });
    }

    Ok(())
}

/// Checks everything about a buffer which its header alone describes.
pub(super) fn validate_dimensions(
    sample_rate: u32,
    length: usize,
    duration: f64,
    number_of_channels: usize,
) -> Result<(), PayloadError> {
    if sample_rate == 0 {
        return Err(PayloadError::ZeroSampleRate);
    }

    if number_of_channels == 0 {
        return Err(PayloadError::NoChannels);
    }

    if length == 0 {
        return Err(PayloadError::NoFrames);
    }

    let expected = duration_of(length, sample_rate);
    // NaN fails this comparison too.
    let within = (duration - expected).abs() <= DURATION_TOLERANCE;
    if !within {
        return Err(PayloadError::DurationMismatch {
            expected,
            found: duration,
        });
    }

    Ok(())
}

impl Payload for DecodedAudio {
    const SHAPE: PayloadShape = PayloadShape::Decoded;

    fn layout(&self) -> Layout {
        Layout::Decoded {
            sample_rate: self.sample_rate,
            length: self.length as u64,
            duration: self.duration,
            number_of_channels: self.channels.len() as u32,
        }
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        out.reserve(self.channels.len() * self.length * SAMPLE_LEN);

        for plane in &self.channels {
            let start = out.len();
            out.resize(start + plane.len() * SAMPLE_LEN, 0);
            LittleEndian::write_f32_into(plane, &mut out[start..]);
        }
    }

    fn read_body(layout: &Layout, body: &[u8]) -> Result<Self, RecordError> {
        let (sample_rate, length, duration, number_of_channels) = match layout {
            Layout::Decoded {
                sample_rate,
                length,
                duration,
                number_of_channels,
            } => (*sample_rate, *length, *duration, *number_of_channels),
            other =>
                return Err(RecordError::ShapeMismatch {
                    expected: Self::SHAPE,
                    found: other.shape(),
                }),
        };

        let expected = layout.body_len();
        if expected != Some(body.len() as u64) {
            return Err(RecordError::BodyLength {
                expected: expected.unwrap_or(u64::MAX),
                found: body.len() as u64,
            });
        }

        // The body is in memory, so a length which passed the check above fits.
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        let plane_len = length.saturating_mul(SAMPLE_LEN);

        let channels = if plane_len == 0 {
            vec![Vec::new(); number_of_channels as usize]
        } else {
            body.chunks_exact(plane_len)
                .map(|raw| {
                    let mut plane = vec![0.0f32; length];
                    LittleEndian::read_f32_into(raw, &mut plane);
                    plane
                })
                .collect()
        };

        Ok(Self::from_parts(sample_rate, length, duration, channels)?)
    }
}
