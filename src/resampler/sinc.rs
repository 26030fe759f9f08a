//! Windowed-sinc polyphase kernels for the fixed-tap tiers.
//!
//! Coefficient tables are designed once per process on first use. Each table
//! holds `2^phase_bits + 1` rows of `half_taps` coefficients, row `p` being
//! the positive half of the impulse response sampled at offsets
//! `i + p / 2^phase_bits`. Between rows the coefficients are linearly
//! interpolated with [`LERP_BITS`] of the phase.

use std::f64::consts::PI;
use std::sync::OnceLock;

use super::ResamplerKernel;
use crate::fixed::{PHASE_FRACTION_BITS, PHASE_ONE};

/// Bits of phase used to interpolate between adjacent coefficient rows.
const LERP_BITS: u32 = 15;

/// Coefficients are Q0.31.
const COEF_BITS: u32 = 31;

/// Cutoff used when the input rate is not above the output rate, as a
/// fraction of the input rate.
const CUTOFF_UP: f64 = 20_478.0 / 48_000.0;

/// Cutoff used when downsampling, tuned for 48 kHz to 44.1 kHz.
const CUTOFF_DOWN: f64 = 17_189.0 / 48_000.0;

/// Shape of one fixed-tap tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FirSpec {
    /// Zero crossings on each side of the impulse.
    pub half_taps: usize,
    /// log2 of the number of coefficient rows per zero crossing.
    pub phase_bits: u32,
    /// Kaiser window shape parameter.
    pub beta: f64,
}

pub(crate) const HIGH: FirSpec = FirSpec {
    half_taps: 8,
    phase_bits: 7,
    beta: 7.865,
};

pub(crate) const VERY_HIGH: FirSpec = FirSpec {
    half_taps: 32,
    phase_bits: 10,
    beta: 9.5,
};

/// One polyphase coefficient table.
#[derive(Debug)]
pub(crate) struct FirTable {
    half_taps: usize,
    phase_bits: u32,
    coefs: Box<[i32]>,
}

impl FirTable {
    pub(crate) fn design(spec: FirSpec, cutoff: f64) -> Self {
        let half = spec.half_taps;
        let phases = 1usize << spec.phase_bits;
        let rows = phases + 1;
        let window_scale = bessel_i0(spec.beta);

        let response: Vec<f64> = (0..rows * half)
            .map(|n| {
                let (row, tap) = (n / half, n % half);
                let x = tap as f64 + row as f64 / phases as f64;
                let t = x / half as f64;
                let window = if t >= 1.0 {
                    0.0
                } else {
                    bessel_i0(spec.beta * (1.0 - t * t).sqrt()) / window_scale
                };
                2.0 * cutoff * sinc(2.0 * PI * cutoff * x) * window
            })
            .collect();

        // Row p and row (phases - p) are always used together, one per side,
        // so scale each pair to unity DC gain.
        let row_sum = |row: usize| response[row * half..(row + 1) * half].iter().sum::<f64>();
        let full_scale = (1u64 << COEF_BITS) as f64;
        let coefs = response
            .iter()
            .enumerate()
            .map(|(n, value)| {
                let row = n / half;
                let gain = row_sum(row) + row_sum(phases - row);
                let scaled = (value / gain * full_scale).round();
                scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
            })
            .collect();

        Self {
            half_taps: half,
            phase_bits: spec.phase_bits,
            coefs,
        }
    }

    pub(crate) fn half_taps(&self) -> usize {
        self.half_taps
    }

    /// Row index and inter-row weight for a phase in `0..=PHASE_ONE`.
    #[inline]
    fn locate(&self, phase: u64) -> (usize, i64) {
        let shift = PHASE_FRACTION_BITS - self.phase_bits;
        let row = (phase >> shift) as usize;
        let lerp = ((phase >> (shift - LERP_BITS)) & ((1 << LERP_BITS) - 1)) as i64;
        (row, lerp)
    }

    #[inline]
    fn coefficient(&self, row: usize, lerp: i64, tap: usize) -> i64 {
        let c0 = i64::from(self.coefs[row * self.half_taps + tap]);
        if lerp == 0 {
            return c0;
        }
        let c1 = i64::from(self.coefs[(row + 1) * self.half_taps + tap]);
        c0 + (((c1 - c0) * lerp) >> LERP_BITS)
    }

    /// Sum of the two halves used at `phase`, in Q0.31.
    #[cfg(test)]
    fn dc_gain(&self, phase: u64) -> i64 {
        let (row_p, lerp_p) = self.locate(phase);
        let (row_n, lerp_n) = self.locate(PHASE_ONE - phase);
        (0..self.half_taps)
            .map(|tap| self.coefficient(row_p, lerp_p, tap) + self.coefficient(row_n, lerp_n, tap))
            .sum()
    }
}

/// Upsampling and downsampling tables of one tier.
#[derive(Debug)]
pub(crate) struct FirSet {
    pub up: FirTable,
    pub down: FirTable,
}

impl FirSet {
    fn design(spec: FirSpec) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            half_taps = spec.half_taps,
            phase_bits = spec.phase_bits,
            "designing resampler coefficient tables"
        );
        Self {
            up: FirTable::design(spec, CUTOFF_UP),
            down: FirTable::design(spec, CUTOFF_DOWN),
        }
    }

    pub(crate) fn high() -> &'static FirSet {
        static TABLES: OnceLock<FirSet> = OnceLock::new();
        TABLES.get_or_init(|| FirSet::design(HIGH))
    }

    pub(crate) fn very_high() -> &'static FirSet {
        static TABLES: OnceLock<FirSet> = OnceLock::new();
        TABLES.get_or_init(|| FirSet::design(VERY_HIGH))
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Modified Bessel function of the first kind, order zero.
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
        term *= half / k as f64;
        let squared = term * term;
        sum += squared;
        if squared < sum * 1e-16 {
            break;
        }
    }
    sum
}

/// Polyphase FIR kernel.
///
/// Keeps `2 * half_taps` frames of history. The output lies between the
/// frame `half_taps` behind the newest one and its successor.
#[derive(Debug, Clone)]
pub(crate) struct Sinc {
    tables: &'static FirSet,
    downsampling: bool,
    half: usize,
    /// Twice the window so shifting only happens every `2 * half` pushes.
    history: Vec<[i16; 2]>,
    head: usize,
    primed: bool,
}

impl Sinc {
    pub(crate) fn new(tables: &'static FirSet, input: u32, output: u32) -> Self {
        let half = tables.up.half_taps();
        Self {
            tables,
            downsampling: input > output,
            half,
            history: vec![[0; 2]; 4 * half],
            head: 0,
            primed: false,
        }
    }

    fn table(&self) -> &'static FirTable {
        if self.downsampling {
            &self.tables.down
        } else {
            &self.tables.up
        }
    }
}

impl ResamplerKernel for Sinc {
    fn push(&mut self, frame: [i16; 2]) {
        let span = 2 * self.half;
        if !self.primed {
            self.history.fill(frame);
            self.head = 0;
            self.primed = true;
            return;
        }
        if self.head + span == self.history.len() {
            self.history.copy_within(self.head + 1.., 0);
            self.head = 0;
        } else {
            self.head += 1;
        }
        self.history[self.head + span - 1] = frame;
    }

    fn interpolate(&self, fraction: u32) -> [i32; 2] {
        let table = self.table();
        let phase = u64::from(fraction);
        let (row_p, lerp_p) = table.locate(phase);
        let (row_n, lerp_n) = table.locate(PHASE_ONE - phase);

        let window = &self.history[self.head..self.head + 2 * self.half];
        let (past, future) = window.split_at(self.half);
        let mut acc = [0i64; 2];
        for (tap, (older, newer)) in past.iter().rev().zip(future).enumerate() {
            let cp = table.coefficient(row_p, lerp_p, tap);
            let cn = table.coefficient(row_n, lerp_n, tap);
            for ch in 0..2 {
                acc[ch] += cp * i64::from(older[ch]) + cn * i64::from(newer[ch]);
            }
        }
        acc.map(|sum| ((sum + (1 << (COEF_BITS - 1))) >> COEF_BITS) as i32)
    }

    fn clear(&mut self) {
        self.head = 0;
        self.primed = false;
    }

    fn rates_changed(&mut self, input: u32, output: u32) {
        self.downsampling = input > output;
    }

    fn latency_frames(&self) -> usize {
        self.half
    }
}
