use super::ResamplerKernel;
use crate::fixed::PHASE_FRACTION_BITS;

/// Bits of the phase fraction fed into the polynomial.
const INTERP_BITS: u32 = 14;

/// Catmull-Rom coefficients for one channel, kept up to date on every push.
#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    y: [i64; 4],
    a: i64,
    b: i64,
    c: i64,
}

impl Segment {
    fn push(&mut self, sample: i64) {
        self.y = [self.y[1], self.y[2], self.y[3], sample];
        let [y0, y1, y2, y3] = self.y;
        self.a = (3 * (y1 - y2) - y0 + y3) >> 1;
        self.b = (y2 << 1) + y0 - ((5 * y1 + y3) >> 1);
        self.c = (y2 - y0) >> 1;
    }

    fn fill(&mut self, sample: i64) {
        *self = Self {
            y: [sample; 4],
            ..Self::default()
        };
    }

    /// Value between `y[1]` and `y[2]` at `x / 2^14`.
    #[inline]
    fn at(&self, x: i64) -> i64 {
        ((((((self.a * x) >> INTERP_BITS) + self.b) * x >> INTERP_BITS) + self.c) * x
            >> INTERP_BITS)
            + self.y[1]
    }
}

/// Third-order interpolation over the four newest frames.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cubic {
    channels: [Segment; 2],
    primed: bool,
}

impl ResamplerKernel for Cubic {
    fn push(&mut self, frame: [i16; 2]) {
        for (segment, sample) in self.channels.iter_mut().zip(frame) {
            if self.primed {
                segment.push(i64::from(sample));
            } else {
                segment.fill(i64::from(sample));
            }
        }
        self.primed = true;
    }

    #[inline]
    fn interpolate(&self, fraction: u32) -> [i32; 2] {
        let x = i64::from(fraction >> (PHASE_FRACTION_BITS - INTERP_BITS));
        self.channels.map(|segment| segment.at(x) as i32)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn latency_frames(&self) -> usize {
        2
    }
}
