//! Reading and writing 16-bit PCM WAV files, for inspecting converter output
//! without an audio device.

use crate::common::{assert_error_traits, ChannelCount, SampleRate};
use hound::{SampleFormat, WavSpec};
use std::io::{self, Write};
use std::path;
use std::sync::Arc;

/// Errors while writing a WAV file.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ToWavError {
    /// The output file could not be created.
    #[error("Opening file for writing")]
    OpenFile(#[source] Arc<std::io::Error>),
    /// hound refused the header.
    #[error("Could not create wav writer")]
    Creating(#[source] Arc<hound::Error>),
    /// A sample could not be written.
    #[error("Failed to write samples writer")]
    Writing(#[source] Arc<hound::Error>),
    /// The header could not be updated with the final length.
    #[error("Failed to update the wav header")]
    Finishing(#[source] Arc<hound::Error>),
    /// Buffered bytes could not be flushed.
    #[error("Failed to flush all bytes to writer")]
    Flushing(#[source] Arc<std::io::Error>),
}
assert_error_traits!(ToWavError);

/// Errors while reading a WAV file.
#[derive(Debug, thiserror::Error, Clone)]
pub enum FromWavError {
    /// The file is missing or not a WAV file.
    #[error("Could not open wav file")]
    Opening(#[source] Arc<hound::Error>),
    /// Only 16-bit integer PCM is read.
    #[error("Expected 16-bit integer PCM, found {bits}-bit {format:?}")]
    UnsupportedFormat {
        /// Bits per sample in the file.
        bits: u16,
        /// Sample encoding of the file.
        format: SampleFormat,
    },
    /// A sample could not be decoded.
    #[error("Failed to read samples")]
    Reading(#[source] Arc<hound::Error>),
}
assert_error_traits!(FromWavError);

/// Interleaved 16-bit PCM loaded from a WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavData {
    /// Channels per frame.
    pub channels: ChannelCount,
    /// Frames per second.
    pub sample_rate: SampleRate,
    /// Interleaved samples.
    pub samples: Vec<i16>,
}

/// Saves interleaved 16-bit samples into a wav file.
///
/// If the file already exists it will be overwritten.
///
/// # Note
/// This is a convenience wrapper around `wav_to_writer`
pub fn wav_to_file(
    sample_rate: SampleRate,
    channels: ChannelCount,
    samples: &[i16],
    wav_file: impl AsRef<path::Path>,
) -> Result<(), ToWavError> {
    let mut file = std::fs::File::create(wav_file)
        .map_err(Arc::new)
        .map_err(ToWavError::OpenFile)?;
    wav_to_writer(sample_rate, channels, samples, &mut file)
}

/// Saves interleaved 16-bit samples into a writer.
///
/// # Example
/// ```rust
/// # use submix::wav_to_writer;
/// let mut writer = std::io::Cursor::new(Vec::new());
/// wav_to_writer(48_000, 2, &[0, 0, 100, -100], &mut writer)?;
/// let wav_bytes: Vec<u8> = writer.into_inner();
/// assert_eq!(wav_bytes.len(), 44 + 8);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn wav_to_writer(
    sample_rate: SampleRate,
    channels: ChannelCount,
    samples: &[i16],
    writer: &mut (impl io::Write + io::Seek),
) -> Result<(), ToWavError> {
    let format = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = io::BufWriter::new(writer);
    {
        let mut writer = hound::WavWriter::new(&mut writer, format)
            .map_err(Arc::new)
            .map_err(ToWavError::Creating)?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(Arc::new)
                .map_err(ToWavError::Writing)?;
        }
        writer
            .finalize()
            .map_err(Arc::new)
            .map_err(ToWavError::Finishing)?;
    }
    writer
        .flush()
        .map_err(Arc::new)
        .map_err(ToWavError::Flushing)?;
    Ok(())
}

/// Loads a 16-bit integer PCM wav file.
pub fn wav_from_file(wav_file: impl AsRef<path::Path>) -> Result<WavData, FromWavError> {
    let reader = hound::WavReader::open(wav_file)
        .map_err(Arc::new)
        .map_err(FromWavError::Opening)?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(FromWavError::UnsupportedFormat {
            bits: spec.bits_per_sample,
            format: spec.sample_format,
        });
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(Arc::new)
        .map_err(FromWavError::Reading)?;
    Ok(WavData {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        samples,
    })
}
