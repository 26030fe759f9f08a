//! Fixed-point sample rate conversion.
//!
//! # Quick Start
//!
//! ```
//! use submix::provider::BufferProvider;
//! use submix::{Quality, SampleRateConverter};
//!
//! let mut converter = SampleRateConverter::new(16, 1, 16_000, Quality::Low)?;
//! converter.set_sample_rate(8_000)?;
//!
//! let mut provider = BufferProvider::constant(1, 1000, 1000);
//! let mut out = vec![0i32; 2 * 2000];
//! converter.resample(&mut out, &mut provider);
//! assert!(out.iter().all(|&s| submix::fixed::accumulator_to_i16(s) == 1000));
//! # Ok::<(), submix::ConfigError>(())
//! ```
//!
//! # How it works
//!
//! A converter turns input frames at a configurable rate into stereo output
//! frames at a rate fixed at construction. The position between input frames
//! is tracked by a phase accumulator with
//! [`PHASE_FRACTION_BITS`](crate::fixed::PHASE_FRACTION_BITS) fractional
//! bits that advances by `input_rate / output_rate` per output frame. Its
//! integer part counts input frames still owed to the interpolation kernel,
//! and carries over from one call to the next, so splitting a conversion into
//! several calls gives exactly the output of a single call.
//!
//! Output is *added* to the caller's buffer in Q19.12. Several converters can
//! mix into the same buffer; the caller zeroes it first.
//!
//! # Quality tiers
//!
//! | Tier | Kernel | Latency | Rates |
//! |---|---|---|---|
//! | [`Low`](Quality::Low) | linear | 1 frame | any |
//! | [`Medium`](Quality::Medium) | Catmull-Rom cubic | 2 frames | any |
//! | [`High`](Quality::High) | 16-tap windowed sinc | 8 frames | [`FIXED_RATE_PAIRS`] |
//! | [`VeryHigh`](Quality::VeryHigh) | 64-tap windowed sinc | 32 frames | [`FIXED_RATE_PAIRS`] |

use std::fmt;

use num_rational::Ratio;

use crate::common::{assert_error_traits, ChannelCount, SampleRate};
use crate::fixed::{self, phase_fraction, PHASE_ONE};
use crate::provider::FrameProvider;

mod builder;
mod cubic;
mod linear;
mod quality;
mod sinc;
mod volume;

pub use builder::ConverterBuilder;
pub use quality::{
    default_quality, CpuBudget, ParseQualityError, Quality, FIXED_RATE_PAIRS, MAX_CPU_MHZ,
    QUALITY_ENV,
};
pub use volume::VOLUME_RAMP_FRAMES;

use quality::Reservation;
use volume::VolumeRamp;

/// Input may be at most this many times faster than the output.
pub const MAX_RATIO: u32 = 16;

/// Bit depth of the input samples. The only one supported.
pub const SUPPORTED_BIT_DEPTH: u16 = 16;

/// Configurations a converter cannot be built with.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Only 16-bit input is supported.
    #[error("unsupported bit depth {0}, only 16-bit input is supported")]
    UnsupportedBitDepth(u16),
    /// Input must be mono or stereo.
    #[error("unsupported channel count {0}, expected 1 or 2")]
    UnsupportedChannelCount(ChannelCount),
    /// A sample rate of zero.
    #[error("sample rates must be above zero")]
    ZeroSampleRate,
    /// The fixed-tap tiers only convert between the rates in [`FIXED_RATE_PAIRS`].
    #[error("{quality} quality cannot convert {input} Hz to {output} Hz")]
    UnsupportedRatePair {
        /// Tier that refused the pair.
        quality: Quality,
        /// Requested input rate.
        input: SampleRate,
        /// Output rate of the converter.
        output: SampleRate,
    },
    /// Input faster than [`MAX_RATIO`] times the output.
    #[error("cannot convert {input} Hz down to {output} Hz, the ratio exceeds {MAX_RATIO}")]
    RatioTooLarge {
        /// Requested input rate.
        input: SampleRate,
        /// Output rate of the converter.
        output: SampleRate,
    },
}
assert_error_traits!(ConfigError);

/// Whether a converter holds part of a provider buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterState {
    /// No provider frames are held; the phase carries over.
    Idle,
    /// Some frames of the provider's current buffer were consumed but not
    /// released yet.
    Draining,
}

/// Interpolation strategy of one quality tier.
///
/// A kernel keeps the recent input history. Output is interpolated between
/// two adjacent frames of that history, `latency_frames` behind the newest.
pub(crate) trait ResamplerKernel: fmt::Debug + Send {
    /// Appends the newest input frame. The first frame after creation or
    /// [`clear`](Self::clear) fills the whole history.
    fn push(&mut self, frame: [i16; 2]);

    /// Value at `fraction` (out of [`PHASE_ONE`]) between the two frames the
    /// kernel is centred on, in the 16-bit domain.
    fn interpolate(&self, fraction: u32) -> [i32; 2];

    /// Forgets the history.
    fn clear(&mut self);

    /// Called after the input rate changed.
    fn rates_changed(&mut self, _input: SampleRate, _output: SampleRate) {}

    /// Frames between the newest pushed frame and the interpolation point.
    fn latency_frames(&self) -> usize;
}

/// Converts 16-bit mono or stereo input to stereo Q19.12 output at a fixed
/// rate.
///
/// Owned by one audio thread; nothing in here locks.
pub struct SampleRateConverter {
    kernel: Box<dyn ResamplerKernel>,
    reservation: Reservation,
    channels: ChannelCount,
    input_rate: SampleRate,
    output_rate: SampleRate,
    /// Integer part: input frames owed to the kernel before the next output.
    phase: u64,
    increment: u64,
    volume: VolumeRamp,
    /// Set by the first `resample` call; volume changes ramp from then on.
    started: bool,
    /// Frames of the provider's current buffer consumed but not released.
    consumed: usize,
}

impl fmt::Debug for SampleRateConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleRateConverter")
            .field("quality", &self.quality())
            .field("channels", &self.channels)
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate)
            .field("phase", &self.phase)
            .field("increment", &self.increment)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

impl SampleRateConverter {
    /// Builds a converter for `bit_depth`-bit input with `channels` channels,
    /// producing stereo at `output_rate`.
    ///
    /// The input rate starts out equal to the output rate; change it with
    /// [`set_sample_rate`](Self::set_sample_rate). Use [`ConverterBuilder`]
    /// to set the input rate up front, which the fixed-tap tiers need.
    ///
    /// # Errors
    ///
    /// A [`ConfigError`] for an unsupported bit depth, channel count or rate.
    pub fn new(
        bit_depth: u16,
        channels: ChannelCount,
        output_rate: SampleRate,
        quality: Quality,
    ) -> Result<Self, ConfigError> {
        ConverterBuilder::new(output_rate)
            .bit_depth(bit_depth)
            .channels(channels)
            .quality(quality)
            .build()
    }

    /// Shorthand for [`ConverterBuilder::new`].
    pub fn builder(output_rate: SampleRate) -> ConverterBuilder {
        ConverterBuilder::new(output_rate)
    }

    pub(crate) fn from_parts(
        reservation: Reservation,
        channels: ChannelCount,
        input_rate: SampleRate,
        output_rate: SampleRate,
    ) -> Self {
        let kernel: Box<dyn ResamplerKernel> = match reservation.quality() {
            Quality::Low => Box::<linear::Linear>::default(),
            Quality::Medium => Box::<cubic::Cubic>::default(),
            Quality::High => Box::new(sinc::Sinc::new(
                sinc::FirSet::high(),
                input_rate,
                output_rate,
            )),
            Quality::VeryHigh => Box::new(sinc::Sinc::new(
                sinc::FirSet::very_high(),
                input_rate,
                output_rate,
            )),
            Quality::Default => unreachable!("reservations hold a resolved tier"),
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            quality = %reservation.quality(),
            channels,
            input_rate,
            output_rate,
            "sample rate converter created"
        );
        Self {
            kernel,
            reservation,
            channels,
            input_rate,
            output_rate,
            phase: PHASE_ONE,
            increment: fixed::phase_increment(input_rate, output_rate),
            volume: VolumeRamp::default(),
            started: false,
            consumed: 0,
        }
    }

    /// Changes the input rate without touching the phase, so a small change
    /// is inaudible.
    ///
    /// # Errors
    ///
    /// The converter keeps its previous rate and returns
    /// - [`ConfigError::ZeroSampleRate`] for zero,
    /// - [`ConfigError::RatioTooLarge`] beyond [`MAX_RATIO`],
    /// - [`ConfigError::UnsupportedRatePair`] if a fixed-tap tier was not
    ///   designed for the new pair.
    pub fn set_sample_rate(&mut self, input_rate: SampleRate) -> Result<(), ConfigError> {
        if let Err(err) = check_rates(self.quality(), input_rate, self.output_rate) {
            #[cfg(feature = "tracing")]
            tracing::warn!(%err, "rejected input rate change");
            return Err(err);
        }
        self.input_rate = input_rate;
        self.increment = fixed::phase_increment(input_rate, self.output_rate);
        self.kernel.rates_changed(input_rate, self.output_rate);
        Ok(())
    }

    /// Sets the Q4.12 gains ([`UNITY_GAIN`](crate::fixed::UNITY_GAIN) is 1.0).
    ///
    /// Before the first [`resample`](Self::resample) the gains apply at once.
    /// Afterwards the current gains ramp toward the new ones over
    /// [`VOLUME_RAMP_FRAMES`] output frames. Negative gains count as zero.
    pub fn set_volume(&mut self, left: i16, right: i16) {
        if self.started {
            self.volume.set_target(left, right);
        } else {
            self.volume.set_immediate(left, right);
        }
    }

    /// Gains the next output frame will use.
    pub fn volume(&self) -> [i16; 2] {
        self.volume.current()
    }

    /// Gains the volume is ramping toward.
    pub fn target_volume(&self) -> [i16; 2] {
        self.volume.target()
    }

    /// Whether a volume ramp is still in progress.
    pub fn is_volume_ramping(&self) -> bool {
        self.volume.is_ramping()
    }

    /// Adds `out.len() / 2` stereo Q19.12 frames to `out`, pulling input from
    /// `provider` as needed.
    ///
    /// Input is only requested when the next output frame needs it. If the
    /// provider runs dry, the remaining frames are left untouched, which is
    /// silence in a zeroed buffer, and the call still returns normally.
    ///
    /// # Panics
    ///
    /// Panics if `out` holds an odd number of samples.
    pub fn resample<P>(&mut self, out: &mut [i32], provider: &mut P)
    where
        P: FrameProvider + ?Sized,
    {
        assert!(
            out.len() % 2 == 0,
            "output buffer must hold whole stereo frames"
        );
        self.started = true;
        let frames = out.len() / 2;
        let channels = usize::from(self.channels);
        let mut produced = 0;

        while produced < frames {
            if self.phase < PHASE_ONE {
                produced += self.render(&[], &mut out[2 * produced..]);
                continue;
            }

            let request = self.consumed + self.input_needed(frames - produced);
            let buffer = provider.next_buffer(request);
            let available = buffer.len() / channels;
            if available <= self.consumed {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    missing = frames - produced,
                    "provider ran dry, rest of the buffer stays silent"
                );
                break;
            }
            produced += self.render(&buffer[..available * channels], &mut out[2 * produced..]);
            if self.consumed == available {
                provider.release_buffer(available);
                self.consumed = 0;
            }
        }
    }

    /// Produces output frames until `out` is full or the kernel needs a frame
    /// `input` does not have. Returns the frames produced.
    fn render(&mut self, input: &[i16], out: &mut [i32]) -> usize {
        let channels = usize::from(self.channels);
        let available = input.len() / channels;
        let mut produced = 0;

        for frame in out.chunks_exact_mut(2) {
            while self.phase >= PHASE_ONE {
                if self.consumed >= available {
                    return produced;
                }
                let at = self.consumed * channels;
                let next = if channels == 1 {
                    [input[at]; 2]
                } else {
                    [input[at], input[at + 1]]
                };
                self.kernel.push(next);
                self.consumed += 1;
                self.phase -= PHASE_ONE;
            }

            let samples = self.kernel.interpolate(phase_fraction(self.phase));
            let gains = self.volume.next_gains();
            for ch in 0..2 {
                let value = fixed::apply_gain(samples[ch], gains[ch]);
                frame[ch] = frame[ch].saturating_add(value);
            }
            produced += 1;
            self.phase += self.increment;
        }
        produced
    }

    /// Input frames needed for `frames` more output frames.
    fn input_needed(&self, frames: usize) -> usize {
        let last = self
            .increment
            .saturating_mul((frames as u64).saturating_sub(1))
            .saturating_add(self.phase);
        usize::try_from(fixed::phase_frames(last))
            .unwrap_or(usize::MAX)
            .max(1)
    }

    /// Drops the interpolation history and any held provider frames, and
    /// rewinds the phase. Used when seeking; the provider is repositioned by
    /// its owner.
    pub fn reset(&mut self) {
        self.kernel.clear();
        self.phase = PHASE_ONE;
        self.consumed = 0;
    }

    /// Frames of the provider's current buffer consumed but not yet released.
    pub fn unreleased_frames(&self) -> usize {
        self.consumed
    }

    /// Whether part of a provider buffer is held.
    pub fn state(&self) -> ConverterState {
        if self.consumed > 0 {
            ConverterState::Draining
        } else {
            ConverterState::Idle
        }
    }

    /// The tier in use. May be below the requested one if the CPU budget was
    /// short at construction.
    pub fn quality(&self) -> Quality {
        self.reservation.quality()
    }

    /// Channels per input frame.
    pub fn channels(&self) -> ChannelCount {
        self.channels
    }

    /// Current input rate.
    pub fn input_rate(&self) -> SampleRate {
        self.input_rate
    }

    /// Output rate, fixed at construction.
    pub fn output_rate(&self) -> SampleRate {
        self.output_rate
    }

    /// Input frames per output frame, reduced.
    pub fn ratio(&self) -> Ratio<SampleRate> {
        Ratio::new(self.input_rate, self.output_rate)
    }

    /// Current phase increment per output frame.
    pub fn phase_increment(&self) -> u64 {
        self.increment
    }

    /// Input frames between the newest one consumed and the one being output.
    pub fn latency_frames(&self) -> usize {
        self.kernel.latency_frames()
    }
}

/// Validates an `input` to `output` conversion for `quality`.
pub(crate) fn check_rates(
    quality: Quality,
    input: SampleRate,
    output: SampleRate,
) -> Result<(), ConfigError> {
    if input == 0 || output == 0 {
        return Err(ConfigError::ZeroSampleRate);
    }
    if u64::from(input) > u64::from(output) * u64::from(MAX_RATIO) {
        return Err(ConfigError::RatioTooLarge { input, output });
    }
    if !quality.supports_rates(input, output) {
        return Err(ConfigError::UnsupportedRatePair {
            quality: quality.resolve(),
            input,
            output,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixed::{accumulator_to_i16, UNITY_GAIN};
    use crate::provider::BufferProvider;

    fn low(channels: ChannelCount, input: u32, output: u32) -> SampleRateConverter {
        ConverterBuilder::new(output)
            .channels(channels)
            .input_rate(input)
            .quality(Quality::Low)
            .cpu_budget(CpuBudget::unlimited())
            .build()
            .unwrap()
    }

    #[test]
    fn mono_is_copied_to_both_channels() {
        let mut converter = low(1, 48_000, 48_000);
        let mut provider = BufferProvider::new(1, vec![100, 200, 300]);
        let mut out = vec![0; 6];
        converter.resample(&mut out, &mut provider);
        let out: Vec<i16> = out.into_iter().map(accumulator_to_i16).collect();
        // One frame of latency, the first frame primes the history.
        assert_eq!(out, [100, 100, 100, 100, 200, 200]);
    }

    #[test]
    fn output_accumulates() {
        let mut converter = low(2, 48_000, 48_000);
        let mut provider = BufferProvider::constant(2, 10, 4);
        let mut out = vec![5 << 12; 8];
        converter.resample(&mut out, &mut provider);
        assert!(out.iter().all(|&s| s == 15 << 12));
    }

    /// Hands out everything it has, whatever the request.
    struct Greedy(BufferProvider);

    impl FrameProvider for Greedy {
        fn next_buffer(&mut self, _requested: usize) -> &[i16] {
            self.0.next_buffer(usize::MAX)
        }

        fn release_buffer(&mut self, frames: usize) {
            self.0.release_buffer(frames)
        }
    }

    #[test]
    fn state_follows_provider_buffer() {
        let mut converter = low(1, 48_000, 48_000);
        let mut provider = Greedy(BufferProvider::constant(1, 1, 10));
        assert_eq!(converter.state(), ConverterState::Idle);

        let mut out = vec![0; 2 * 4];
        converter.resample(&mut out, &mut provider);
        assert_eq!(converter.state(), ConverterState::Draining);
        assert_eq!(converter.unreleased_frames(), 4);
        assert_eq!(provider.0.released_frames(), 0);

        let mut out = vec![0; 2 * 6];
        converter.resample(&mut out, &mut provider);
        assert_eq!(converter.state(), ConverterState::Idle);
        assert_eq!(provider.0.released_frames(), 10);
    }

    #[test]
    fn reset_forgets_held_frames() {
        let mut converter = low(1, 48_000, 48_000);
        let mut provider = Greedy(BufferProvider::new(1, (0..10).collect()));
        let mut out = vec![0; 2 * 3];
        converter.resample(&mut out, &mut provider);
        assert_eq!(converter.unreleased_frames(), 3);
        converter.reset();
        assert_eq!(converter.state(), ConverterState::Idle);
        assert_eq!(converter.unreleased_frames(), 0);

        // The owner repositions the provider after a seek.
        provider.0.seek(7);
        let mut out = vec![0; 2];
        converter.resample(&mut out, &mut provider);
        assert_eq!(accumulator_to_i16(out[0]), 7);
    }

    #[test]
    fn volume_applies_immediately_before_start() {
        let mut converter = low(1, 8_000, 8_000);
        converter.set_volume(UNITY_GAIN / 2, 0);
        assert!(!converter.is_volume_ramping());
        let mut provider = BufferProvider::constant(1, 1000, 4);
        let mut out = vec![0; 8];
        converter.resample(&mut out, &mut provider);
        assert_eq!(accumulator_to_i16(out[0]), 500);
        assert_eq!(out[1], 0);
    }

    #[test]
    fn volume_ramps_once_started() {
        let mut converter = low(1, 8_000, 8_000);
        let mut provider = BufferProvider::constant(1, 1000, 4096);
        let mut out = vec![0; 2];
        converter.resample(&mut out, &mut provider);
        converter.set_volume(0, 0);
        assert!(converter.is_volume_ramping());
        assert_eq!(converter.target_volume(), [0, 0]);

        let mut out = vec![0; 2 * VOLUME_RAMP_FRAMES as usize];
        converter.resample(&mut out, &mut provider);
        assert!(out[0] > out[out.len() - 2]);
        assert_eq!(converter.volume(), [0, 0]);
    }

    #[test]
    fn rejected_rate_keeps_previous_one() {
        let mut converter = ConverterBuilder::new(48_000)
            .input_rate(44_100)
            .quality(Quality::High)
            .cpu_budget(CpuBudget::unlimited())
            .build()
            .unwrap();
        let before = converter.phase_increment();
        assert_eq!(
            converter.set_sample_rate(47_000),
            Err(ConfigError::UnsupportedRatePair {
                quality: Quality::High,
                input: 47_000,
                output: 48_000
            })
        );
        assert_eq!(converter.input_rate(), 44_100);
        assert_eq!(converter.phase_increment(), before);
        assert_eq!(converter.set_sample_rate(32_000), Ok(()));
    }

    #[test]
    fn ratio_is_bounded() {
        let mut converter = low(2, 48_000, 8_000);
        assert_eq!(
            converter.set_sample_rate(8_000 * MAX_RATIO + 1),
            Err(ConfigError::RatioTooLarge {
                input: 8_000 * MAX_RATIO + 1,
                output: 8_000
            })
        );
        assert_eq!(converter.set_sample_rate(0), Err(ConfigError::ZeroSampleRate));
        assert_eq!(*converter.ratio().numer(), 6);
    }

    #[test]
    fn ratio_is_reduced() {
        let converter = low(2, 44_100, 48_000);
        assert_eq!(converter.ratio(), Ratio::new(147, 160));
    }

    #[test]
    #[should_panic(expected = "whole stereo frames")]
    fn odd_output_buffer_panics() {
        let mut converter = low(2, 8_000, 8_000);
        let mut provider = BufferProvider::constant(2, 0, 10);
        converter.resample(&mut [0; 3], &mut provider);
    }

    #[test]
    fn downsampling_skips_input() {
        let mut converter = low(1, 32_000, 8_000);
        let mut provider = BufferProvider::new(1, (0..40).map(|i| i * 10).collect());
        let mut out = vec![0; 2 * 5];
        converter.resample(&mut out, &mut provider);
        let left: Vec<i16> = out.chunks(2).map(|f| accumulator_to_i16(f[0])).collect();
        assert_eq!(left, [0, 30, 70, 110, 150]);
    }
}
