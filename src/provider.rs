//! Where the resampler gets its input from.
//!
//! A [`FrameProvider`] hands out borrowed views of interleaved 16-bit frames
//! and is told when the consumer is done with them. The view always starts at
//! the first frame that has not been released yet, so a consumer may ask for
//! the same region again on a later call and pick up where it left off.

use crate::common::ChannelCount;

/// Source of interleaved 16-bit PCM frames for a
/// [`SampleRateConverter`](crate::SampleRateConverter).
pub trait FrameProvider {
    /// Returns up to `requested` frames, starting at the first frame not yet
    /// released. The slice holds `frames * channels` interleaved samples.
    ///
    /// Returning fewer frames than requested is normal. An empty slice means
    /// no data is available right now (or ever again).
    fn next_buffer(&mut self, requested: usize) -> &[i16];

    /// Marks the first `frames` frames of the last returned buffer as
    /// consumed. They will not be returned again.
    fn release_buffer(&mut self, frames: usize);
}

impl<P> FrameProvider for &mut P
where
    P: FrameProvider + ?Sized,
{
    #[inline]
    fn next_buffer(&mut self, requested: usize) -> &[i16] {
        (**self).next_buffer(requested)
    }

    #[inline]
    fn release_buffer(&mut self, frames: usize) {
        (**self).release_buffer(frames)
    }
}

impl<P> FrameProvider for Box<P>
where
    P: FrameProvider + ?Sized,
{
    #[inline]
    fn next_buffer(&mut self, requested: usize) -> &[i16] {
        (**self).next_buffer(requested)
    }

    #[inline]
    fn release_buffer(&mut self, frames: usize) {
        (**self).release_buffer(frames)
    }
}

/// In-memory provider over a vector of interleaved samples.
///
/// # Example
///
/// ```
/// use submix::provider::{BufferProvider, FrameProvider};
///
/// let mut provider = BufferProvider::new(2, vec![1i16, -1, 2, -2, 3, -3]);
/// assert_eq!(provider.next_buffer(2), &[1, -1, 2, -2]);
/// provider.release_buffer(1);
/// assert_eq!(provider.next_buffer(8), &[2, -2, 3, -3]);
/// ```
#[derive(Debug, Clone)]
pub struct BufferProvider {
    samples: Vec<i16>,
    channels: usize,
    /// Index of the first unreleased frame.
    position: usize,
    /// Upper bound on frames handed out per call, if any.
    max_chunk: Option<usize>,
    released: u64,
}

impl BufferProvider {
    /// Builds a provider over `samples`. A trailing partial frame is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is zero.
    pub fn new(channels: ChannelCount, samples: Vec<i16>) -> Self {
        assert!(channels != 0);
        Self {
            samples,
            channels: usize::from(channels),
            position: 0,
            max_chunk: None,
            released: 0,
        }
    }

    /// A provider that always returns `frames` copies of the same frame.
    pub fn constant(channels: ChannelCount, value: i16, frames: usize) -> Self {
        Self::new(channels, vec![value; frames * usize::from(channels)])
    }

    /// Limits how many frames a single [`FrameProvider::next_buffer`] call
    /// returns, regardless of the request.
    pub fn with_max_chunk(mut self, frames: usize) -> Self {
        self.max_chunk = Some(frames.max(1));
        self
    }

    /// Frames not yet released.
    pub fn remaining_frames(&self) -> usize {
        self.total_frames() - self.position
    }

    /// Total frames released so far.
    pub fn released_frames(&self) -> u64 {
        self.released
    }

    /// Moves the read position to `frame`, clamped to the end of the data.
    pub fn seek(&mut self, frame: usize) {
        self.position = frame.min(self.total_frames());
    }

    fn total_frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

impl FrameProvider for BufferProvider {
    fn next_buffer(&mut self, requested: usize) -> &[i16] {
        let mut frames = requested.min(self.remaining_frames());
        if let Some(max) = self.max_chunk {
            frames = frames.min(max);
        }
        let start = self.position * self.channels;
        &self.samples[start..start + frames * self.channels]
    }

    fn release_buffer(&mut self, frames: usize) {
        debug_assert!(frames <= self.remaining_frames());
        let frames = frames.min(self.remaining_frames());
        self.position += frames;
        self.released += frames as u64;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hands_out_unreleased_region_again() {
        let mut provider = BufferProvider::new(1, (0..10).collect());
        assert_eq!(provider.next_buffer(4), &[0, 1, 2, 3]);
        assert_eq!(provider.next_buffer(4), &[0, 1, 2, 3]);
        provider.release_buffer(3);
        assert_eq!(provider.next_buffer(2), &[3, 4]);
        assert_eq!(provider.released_frames(), 3);
    }

    #[test]
    fn chunk_limit_caps_every_call() {
        let mut provider = BufferProvider::constant(2, 7, 100).with_max_chunk(3);
        assert_eq!(provider.next_buffer(50).len(), 6);
        provider.release_buffer(3);
        assert_eq!(provider.remaining_frames(), 97);
    }

    #[test]
    fn exhausted_provider_returns_empty() {
        let mut provider = BufferProvider::new(2, vec![1, 2, 3]);
        assert_eq!(provider.next_buffer(10), &[1, 2]);
        provider.release_buffer(1);
        assert!(provider.next_buffer(10).is_empty());
    }

    #[test]
    fn seek_clamps_to_end() {
        let mut provider = BufferProvider::new(1, vec![0; 5]);
        provider.seek(100);
        assert_eq!(provider.remaining_frames(), 0);
        provider.seek(2);
        assert_eq!(provider.next_buffer(10).len(), 3);
    }
}
