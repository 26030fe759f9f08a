//! Real-time PCM plumbing for software mixers.
//!
//! Two independent building blocks:
//!
//! - [`pipe`]: a lock-free single-producer/single-consumer pipe that moves
//!   interleaved frames from one thread to another, for instance from an
//!   application thread into a mixer.
//! - [`resampler`]: a fixed-point [`SampleRateConverter`] that pulls 16-bit
//!   frames from a [`FrameProvider`] and mixes them, with per-channel gain,
//!   into a stereo output buffer at the mixer's rate.
//!
//! [`PipeProvider`](pipe::PipeProvider) connects the two.
//!
//! ```
//! use submix::pipe::{ring_pipe, PipeFormat, PipeProvider, WriteMode};
//! use submix::{fixed, Quality, SampleRateConverter};
//!
//! let format = PipeFormat::new(2, 24_000);
//! let (mut writer, reader, _control) = ring_pipe::<i16>(256, format, WriteMode::NonBlocking);
//! writer.write(&[500; 2 * 64])?;
//!
//! let mut provider = PipeProvider::new(reader, format)?;
//! let mut converter = SampleRateConverter::new(16, 2, 48_000, Quality::Low)?;
//! converter.set_sample_rate(24_000)?;
//!
//! let mut mix = vec![0i32; 2 * 100];
//! converter.resample(&mut mix, &mut provider);
//! assert!(mix.iter().all(|&s| fixed::accumulator_to_i16(s) == 500));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Optional features
//!
//! - `tracing`: structured events through the `tracing` crate (on by default).
//! - `wav_output`: write converted audio to WAV files (on by default).

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod common;

pub mod fixed;
pub mod pipe;
pub mod provider;
pub mod resampler;
#[cfg(feature = "wav_output")]
#[cfg_attr(docsrs, doc(cfg(feature = "wav_output")))]
pub mod wav_output;

pub use common::{ChannelCount, SampleRate};
pub use pipe::{ring_pipe, PipeControl, PipeError, PipeFormat, PipeReader, PipeWriter, WriteMode};
pub use provider::FrameProvider;
pub use resampler::{ConfigError, ConverterBuilder, CpuBudget, Quality, SampleRateConverter};
#[cfg(feature = "wav_output")]
pub use wav_output::{wav_from_file, wav_to_file, wav_to_writer, FromWavError, ToWavError, WavData};
