#![allow(dead_code)]
/// in separate folder so its not ran as integration test
use std::f64::consts::TAU;

use submix::fixed::accumulator_to_i16;
use submix::provider::{BufferProvider, FrameProvider};
use submix::{ChannelCount, ConverterBuilder, CpuBudget, Quality, SampleRate, SampleRateConverter};

/// Interleaved sine at `freq` Hz with the same value on every channel.
pub fn sine(
    freq: f64,
    amplitude: i16,
    sample_rate: SampleRate,
    channels: ChannelCount,
    frames: usize,
) -> Vec<i16> {
    (0..frames)
        .flat_map(|n| {
            let t = n as f64 / f64::from(sample_rate);
            let value = (f64::from(amplitude) * (TAU * freq * t).sin()).round() as i16;
            std::iter::repeat(value).take(usize::from(channels))
        })
        .collect()
}

/// Interleaved frames where frame `n` holds `n * step` on every channel.
pub fn ramp(step: i16, channels: ChannelCount, frames: usize) -> Vec<i16> {
    (0..frames)
        .flat_map(|n| std::iter::repeat(step.wrapping_mul(n as i16)).take(usize::from(channels)))
        .collect()
}

/// Converter on its own CPU budget so tests never downgrade each other.
pub fn converter(
    quality: Quality,
    channels: ChannelCount,
    input_rate: SampleRate,
    output_rate: SampleRate,
) -> SampleRateConverter {
    ConverterBuilder::new(output_rate)
        .input_rate(input_rate)
        .channels(channels)
        .quality(quality)
        .cpu_budget(CpuBudget::unlimited())
        .build()
        .expect("valid converter configuration")
}

/// Runs `converter` into a zeroed buffer of `frames` stereo frames, in calls
/// of at most `chunk` frames, and returns the Q19.12 output.
pub fn render(
    converter: &mut SampleRateConverter,
    provider: &mut impl FrameProvider,
    frames: usize,
    chunk: usize,
) -> Vec<i32> {
    let mut out = vec![0i32; 2 * frames];
    for piece in out.chunks_mut(2 * chunk) {
        converter.resample(piece, provider);
    }
    out
}

/// Same as [`render`] but converted back to 16-bit samples.
pub fn render_i16(
    converter: &mut SampleRateConverter,
    provider: &mut impl FrameProvider,
    frames: usize,
    chunk: usize,
) -> Vec<i16> {
    render(converter, provider, frames, chunk)
        .into_iter()
        .map(accumulator_to_i16)
        .collect()
}

/// Converts a whole buffer in one go.
pub fn convert(
    quality: Quality,
    channels: ChannelCount,
    input_rate: SampleRate,
    output_rate: SampleRate,
    input: Vec<i16>,
    output_frames: usize,
) -> Vec<i16> {
    let mut converter = converter(quality, channels, input_rate, output_rate);
    let mut provider = BufferProvider::new(channels, input);
    render_i16(&mut converter, &mut provider, output_frames, output_frames)
}

/// Left channel of interleaved stereo output.
pub fn left(stereo: &[i16]) -> Vec<i16> {
    stereo.iter().step_by(2).copied().collect()
}

/// Root mean square of the difference between two signals, in LSBs.
pub fn rms_error(actual: &[f64], expected: &[f64]) -> f64 {
    let sum: f64 = actual
        .iter()
        .zip(expected)
        .map(|(a, e)| (a - e).powi(2))
        .sum();
    (sum / actual.len() as f64).sqrt()
}
