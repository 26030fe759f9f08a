use super::{PipeError, PipeFormat, PipeReader};
use crate::provider::FrameProvider;

/// Feeds a [`SampleRateConverter`](crate::SampleRateConverter) from the
/// reading end of a pipe.
///
/// Frames read from the pipe are staged until the converter releases them,
/// so a region handed out once stays available across `resample` calls.
/// The staging area holds at most one pipe capacity worth of frames.
#[derive(Debug)]
pub struct PipeProvider {
    reader: PipeReader<i16>,
    staging: Vec<i16>,
    /// Frames currently held in `staging`.
    staged: usize,
    channels: usize,
}

impl PipeProvider {
    /// Wraps `reader`, checking that it carries `expected` frames.
    ///
    /// # Errors
    ///
    /// [`PipeError::FormatMismatch`] if the pipe geometry differs.
    pub fn new(reader: PipeReader<i16>, expected: PipeFormat) -> Result<Self, PipeError> {
        reader.negotiate(expected)?;
        let channels = usize::from(expected.channels());
        Ok(Self {
            staging: vec![0; reader.capacity() * channels],
            staged: 0,
            channels,
            reader,
        })
    }

    /// Frames staged but not yet released.
    pub fn staged_frames(&self) -> usize {
        self.staged
    }

    /// True when the pipe reached end of stream and nothing is staged.
    pub fn is_eof(&self) -> bool {
        self.staged == 0 && self.reader.is_eof()
    }

    /// The wrapped reader.
    pub fn reader(&self) -> &PipeReader<i16> {
        &self.reader
    }

    /// Gives the reader back, dropping anything staged.
    pub fn into_inner(self) -> PipeReader<i16> {
        self.reader
    }
}

impl FrameProvider for PipeProvider {
    fn next_buffer(&mut self, requested: usize) -> &[i16] {
        let capacity = self.staging.len() / self.channels;
        let wanted = requested.min(capacity);
        if self.staged < wanted {
            let start = self.staged * self.channels;
            let end = wanted * self.channels;
            let read = self.reader.read(&mut self.staging[start..end]);
            // Staging is sized in whole frames, so reads always align.
            debug_assert!(read.is_ok(), "pipe read failed: {read:?}");
            self.staged += read.unwrap_or_default();
        }
        let frames = self.staged.min(wanted);
        &self.staging[..frames * self.channels]
    }

    fn release_buffer(&mut self, frames: usize) {
        debug_assert!(frames <= self.staged);
        let frames = frames.min(self.staged);
        self.staging
            .copy_within(frames * self.channels..self.staged * self.channels, 0);
        self.staged -= frames;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pipe::{ring_pipe, WriteMode};

    #[test]
    fn stages_until_released() {
        let format = PipeFormat::new(1, 8_000);
        let (mut writer, reader, _control) = ring_pipe::<i16>(8, format, WriteMode::NonBlocking);
        writer.write(&[1, 2, 3, 4, 5]).unwrap();

        let mut provider = PipeProvider::new(reader, format).unwrap();
        assert_eq!(provider.next_buffer(3), &[1, 2, 3]);
        // Same region again, now grown by what the pipe still holds.
        assert_eq!(provider.next_buffer(8), &[1, 2, 3, 4, 5]);
        provider.release_buffer(4);
        assert_eq!(provider.next_buffer(8), &[5]);
        assert_eq!(provider.staged_frames(), 1);
    }

    #[test]
    fn rejects_other_geometry() {
        let (_writer, reader, _control) =
            ring_pipe::<i16>(8, PipeFormat::new(2, 8_000), WriteMode::NonBlocking);
        let err = PipeProvider::new(reader, PipeFormat::new(1, 8_000)).unwrap_err();
        assert!(matches!(err, PipeError::FormatMismatch { .. }));
    }

    #[test]
    fn flushed_pipe_stages_nothing() {
        let format = PipeFormat::new(2, 8_000);
        let (mut writer, reader, control) = ring_pipe::<i16>(4, format, WriteMode::NonBlocking);
        writer.write(&[1, 1, 2, 2, 3, 3]).unwrap();
        control.shutdown(true);

        let mut provider = PipeProvider::new(reader, format).unwrap();
        assert!(provider.next_buffer(4).is_empty());
        assert_eq!(provider.staged_frames(), 0);
        assert!(provider.is_eof());
        assert_eq!(provider.reader().frames_read(), 3);
    }

    #[test]
    fn end_of_stream_after_drain() {
        let format = PipeFormat::new(2, 8_000);
        let (mut writer, reader, _control) = ring_pipe::<i16>(4, format, WriteMode::NonBlocking);
        writer.write(&[1, 1, 2, 2]).unwrap();
        drop(writer);

        let mut provider = PipeProvider::new(reader, format).unwrap();
        assert_eq!(provider.next_buffer(4).len(), 4);
        assert!(!provider.is_eof());
        provider.release_buffer(2);
        assert!(provider.next_buffer(4).is_empty());
        assert!(provider.is_eof());
    }
}
