//! Fixed-point formats shared by the resampler.
//!
//! The converter never uses floating point on the audio path. Positions
//! between input frames are tracked in a phase accumulator with
//! [`PHASE_FRACTION_BITS`] fractional bits, gains are Q4.12 and the output
//! accumulator is Q19.12 (a 16-bit sample multiplied by a Q4.12 gain).

/// Number of fractional bits in the phase accumulator.
pub const PHASE_FRACTION_BITS: u32 = 30;

/// One whole input frame in phase units.
pub const PHASE_ONE: u64 = 1 << PHASE_FRACTION_BITS;

/// Mask selecting the fractional part of the phase accumulator.
pub const PHASE_FRACTION_MASK: u64 = PHASE_ONE - 1;

/// Number of fractional bits in a Q4.12 gain.
pub const VOLUME_FRACTION_BITS: u32 = 12;

/// Unity gain in Q4.12.
pub const UNITY_GAIN: i16 = 1 << VOLUME_FRACTION_BITS;

/// Number of fractional bits in the Q19.12 output accumulator.
pub const ACCUMULATOR_FRACTION_BITS: u32 = VOLUME_FRACTION_BITS;

/// Phase increment for converting `input` frames per second into `output`
/// frames per second, rounded to the nearest phase unit.
///
/// # Panics
///
/// Panics if `output` is zero.
pub fn phase_increment(input: u32, output: u32) -> u64 {
    assert!(output != 0);
    let output = u64::from(output);
    ((u64::from(input) << PHASE_FRACTION_BITS) + output / 2) / output
}

/// Integer part of a phase value, in whole input frames.
#[inline]
pub fn phase_frames(phase: u64) -> u64 {
    phase >> PHASE_FRACTION_BITS
}

/// Fractional part of a phase value, always below [`PHASE_ONE`].
#[inline]
pub fn phase_fraction(phase: u64) -> u32 {
    (phase & PHASE_FRACTION_MASK) as u32
}

/// Scales a sample in the 16-bit domain by a Q4.12 gain, producing a Q19.12
/// accumulator value.
#[inline]
pub fn apply_gain(sample: i32, gain: i16) -> i32 {
    sample.wrapping_mul(i32::from(gain))
}

/// Converts a Q19.12 accumulator value back to a 16-bit sample, rounding to
/// nearest and saturating.
#[inline]
pub fn accumulator_to_i16(value: i32) -> i16 {
    let rounded = (i64::from(value) + (1 << (ACCUMULATOR_FRACTION_BITS - 1)))
        >> ACCUMULATOR_FRACTION_BITS;
    rounded.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

/// Converts a floating point gain (1.0 is unity) into Q4.12, saturating.
pub fn gain_from_f32(gain: f32) -> i16 {
    let scaled = (gain * f32::from(UNITY_GAIN)).round();
    scaled.clamp(0.0, f32::from(i16::MAX)) as i16
}
