//! Audio fixtures shared by tests and benches.

use byteorder::{LittleEndian, WriteBytesExt};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::PI;

/// `length` frames of a unit sine wave at `freq` Hz.
pub fn sine(freq: f32, sample_rate: u32, length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// A stereo sine, with the right channel an octave above the left.
pub fn stereo_sine(freq: f32, sample_rate: u32, length: usize) -> Vec<Vec<f32>> {
    vec![
        sine(freq, sample_rate, length),
        sine(2.0 * freq, sample_rate, length),
    ]
}

/// `length` samples of seeded white noise in `[-1, 1]`.
pub fn noise(seed: u64, length: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..length).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Encodes planar channels as a 16-bit PCM WAV file.
pub fn wav_bytes(sample_rate: u32, channels: &[Vec<f32>]) -> Vec<u8> {
    let n_channels = channels.len() as u16;
    let frames = channels.first().map_or(0, Vec::len);
    let data_len = (frames * channels.len() * 2) as u32;
    let block_align = n_channels * 2;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.write_u32::<LittleEndian>(36 + data_len).unwrap();
    out.extend_from_slice(b"WAVEfmt ");
    out.write_u32::<LittleEndian>(16).unwrap();
    out.write_u16::<LittleEndian>(1).unwrap();
    out.write_u16::<LittleEndian>(n_channels).unwrap();
    out.write_u32::<LittleEndian>(sample_rate).unwrap();
    out.write_u32::<LittleEndian>(sample_rate * u32::from(block_align))
        .unwrap();
    out.write_u16::<LittleEndian>(block_align).unwrap();
    out.write_u16::<LittleEndian>(16).unwrap();
    out.extend_from_slice(b"data");
    out.write_u32::<LittleEndian>(data_len).unwrap();

    for frame in 0..frames {
        for plane in channels {
            let sample = (plane[frame].max(-1.0).min(1.0) * f32::from(i16::MAX)) as i16;
            out.write_i16::<LittleEndian>(sample).unwrap();
        }
    }

    out
}
