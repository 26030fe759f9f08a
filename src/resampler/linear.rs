use super::ResamplerKernel;
use crate::fixed::PHASE_FRACTION_BITS;

/// Bits of the phase fraction used to weight the two frames.
const INTERP_BITS: u32 = 15;

/// First-order interpolation between the two newest frames.
#[derive(Debug, Clone, Default)]
pub(crate) struct Linear {
    previous: [i32; 2],
    current: [i32; 2],
    primed: bool,
}

impl ResamplerKernel for Linear {
    fn push(&mut self, frame: [i16; 2]) {
        let frame = frame.map(i32::from);
        self.previous = if self.primed { self.current } else { frame };
        self.current = frame;
        self.primed = true;
    }

    #[inline]
    fn interpolate(&self, fraction: u32) -> [i32; 2] {
        // |delta| < 2^16 and weight < 2^15, so the product fits in an i32.
        let weight = (fraction >> (PHASE_FRACTION_BITS - INTERP_BITS)) as i32;
        [0, 1].map(|ch| {
            let delta = self.current[ch] - self.previous[ch];
            self.previous[ch] + ((delta * weight) >> INTERP_BITS)
        })
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn latency_frames(&self) -> usize {
        1
    }
}
