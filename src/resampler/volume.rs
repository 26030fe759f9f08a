use crate::fixed::UNITY_GAIN;

/// Output frames a full volume change is spread over.
pub const VOLUME_RAMP_FRAMES: u32 = 256;

/// Extra fractional bits kept while ramping so small steps still move.
const RAMP_EXTRA_BITS: u32 = 16;

/// Left/right gain that glides toward its target one output frame at a time.
///
/// Gains are Q4.12. While ramping, the current gain moves by a fixed step per
/// frame and is clamped to the target, so it never overshoots.
#[derive(Debug, Clone)]
pub(crate) struct VolumeRamp {
    /// Current gains in Q4.12 with [`RAMP_EXTRA_BITS`] more fraction bits.
    current: [i32; 2],
    target: [i16; 2],
    step: [i32; 2],
}

impl Default for VolumeRamp {
    fn default() -> Self {
        Self::new(UNITY_GAIN, UNITY_GAIN)
    }
}

impl VolumeRamp {
    pub(crate) fn new(left: i16, right: i16) -> Self {
        Self {
            current: [widen(left), widen(right)],
            target: [left, right],
            step: [0, 0],
        }
    }

    /// Starts a ramp from the current gains to `left`/`right`.
    pub(crate) fn set_target(&mut self, left: i16, right: i16) {
        self.target = [left.max(0), right.max(0)];
        for ch in 0..2 {
            let distance = widen(self.target[ch]) - self.current[ch];
            let step = distance / VOLUME_RAMP_FRAMES as i32;
            self.step[ch] = match step {
                0 => distance.signum(),
                step => step,
            };
        }
    }

    /// Jumps straight to `left`/`right`.
    pub(crate) fn set_immediate(&mut self, left: i16, right: i16) {
        *self = Self::new(left.max(0), right.max(0));
    }

    /// Gains for the next output frame, then advances the ramp.
    #[inline]
    pub(crate) fn next_gains(&mut self) -> [i16; 2] {
        let gains = self.current();
        for ch in 0..2 {
            if self.step[ch] == 0 {
                continue;
            }
            let target = widen(self.target[ch]);
            let next = self.current[ch] + self.step[ch];
            let reached = if self.step[ch] > 0 {
                next >= target
            } else {
                next <= target
            };
            if reached {
                self.current[ch] = target;
                self.step[ch] = 0;
            } else {
                self.current[ch] = next;
            }
        }
        gains
    }

    pub(crate) fn current(&self) -> [i16; 2] {
        [narrow(self.current[0]), narrow(self.current[1])]
    }

    pub(crate) fn target(&self) -> [i16; 2] {
        self.target
    }

    pub(crate) fn is_ramping(&self) -> bool {
        self.step != [0, 0]
    }
}

fn widen(gain: i16) -> i32 {
    i32::from(gain) << RAMP_EXTRA_BITS
}

fn narrow(gain: i32) -> i16 {
    (gain >> RAMP_EXTRA_BITS) as i16
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(ramp: &mut VolumeRamp, frames: usize) -> Vec<[i16; 2]> {
        (0..frames).map(|_| ramp.next_gains()).collect()
    }

    #[test]
    fn no_ramp_at_target() {
        let mut ramp = VolumeRamp::default();
        ramp.set_target(UNITY_GAIN, UNITY_GAIN);
        assert!(!ramp.is_ramping());
        assert!(run(&mut ramp, 10).iter().all(|g| *g == [UNITY_GAIN; 2]));
    }

    #[test]
    fn ramps_down_monotonically_without_overshoot() {
        let mut ramp = VolumeRamp::default();
        ramp.set_target(0, UNITY_GAIN / 2);
        let gains = run(&mut ramp, 2 * VOLUME_RAMP_FRAMES as usize);
        for pair in gains.windows(2) {
            assert!(pair[1][0] <= pair[0][0]);
            assert!(pair[1][1] <= pair[0][1]);
        }
        assert!(gains.iter().all(|g| g[0] >= 0 && g[1] >= UNITY_GAIN / 2));
        assert_eq!(*gains.last().unwrap(), [0, UNITY_GAIN / 2]);
        assert!(!ramp.is_ramping());
    }

    #[test]
    fn ramps_up_and_settles_within_ramp_length() {
        let mut ramp = VolumeRamp::new(0, 0);
        ramp.set_target(UNITY_GAIN, 3);
        let gains = run(&mut ramp, VOLUME_RAMP_FRAMES as usize + 1);
        assert_eq!(gains[0], [0, 0]);
        assert!(gains.iter().all(|g| g[0] <= UNITY_GAIN && g[1] <= 3));
        assert_eq!(ramp.current(), [UNITY_GAIN, 3]);
    }

    #[test]
    fn retarget_mid_ramp_turns_around() {
        let mut ramp = VolumeRamp::default();
        ramp.set_target(0, 0);
        run(&mut ramp, 100);
        let halfway = ramp.current();
        ramp.set_target(UNITY_GAIN, UNITY_GAIN);
        let gains = run(&mut ramp, 2 * VOLUME_RAMP_FRAMES as usize);
        assert_eq!(gains[0], halfway);
        assert!(gains.windows(2).all(|p| p[1][0] >= p[0][0]));
        assert_eq!(ramp.current(), [UNITY_GAIN; 2]);
    }

    #[test]
    fn negative_gains_clamp_to_zero() {
        let mut ramp = VolumeRamp::default();
        ramp.set_immediate(-5, 100);
        assert_eq!(ramp.target(), [0, 100]);
        assert_eq!(ramp.current(), [0, 100]);
    }
}
