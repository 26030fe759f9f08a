//! Single-producer/single-consumer pipe of interleaved PCM frames.
//!
//! A pipe has exactly one [`PipeWriter`] and one [`PipeReader`], each owned by
//! one thread. Frames travel through a lock-free ring buffer; a frame only
//! becomes visible to the reader once every sample of it has been copied in.
//! A cloneable [`PipeControl`] lets a third thread shut the pipe down.
//!
//! Full and empty are ordinary conditions: writes come back short and reads
//! come back with zero frames. Only shutdown and caller mistakes produce
//! errors.
//!
//! # Example
//!
//! ```
//! use submix::pipe::{ring_pipe, PipeFormat, WriteMode};
//!
//! let format = PipeFormat::new(2, 48_000);
//! let (mut writer, mut reader, _control) = ring_pipe::<i16>(8, format, WriteMode::NonBlocking);
//!
//! assert_eq!(writer.write(&[1, -1, 2, -2])?, 2);
//! let mut out = [0i16; 4];
//! assert_eq!(reader.read(&mut out)?, 2);
//! assert_eq!(out, [1, -1, 2, -2]);
//! # Ok::<(), submix::pipe::PipeError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rtrb::RingBuffer;

use crate::common::{assert_error_traits, ChannelCount, SampleRate};

mod provider;

pub use provider::PipeProvider;

const DEFAULT_CAPACITY_FRAMES: usize = 1024;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Errors returned by pipe operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// The pipe was shut down; no more frames will be accepted.
    #[error("the pipe has been shut down")]
    Shutdown,
    /// The buffer does not hold a whole number of frames.
    #[error("{samples} samples is not a whole number of {channels}-channel frames")]
    Misaligned {
        /// Length of the offending buffer, in samples.
        samples: usize,
        /// Channel count of the pipe.
        channels: ChannelCount,
    },
    /// The two ends of a connection disagree on the frame geometry.
    #[error("format mismatch: pipe carries {actual}, caller expects {expected}")]
    FormatMismatch {
        /// Format the caller asked for.
        expected: PipeFormat,
        /// Format the pipe was built with.
        actual: PipeFormat,
    },
}
assert_error_traits!(PipeError);

/// Geometry of the frames carried by a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeFormat {
    channels: ChannelCount,
    sample_rate: SampleRate,
}

impl PipeFormat {
    /// # Panics
    ///
    /// Panics if `channels` is zero.
    pub fn new(channels: ChannelCount, sample_rate: SampleRate) -> Self {
        assert!(channels != 0, "a frame needs at least one channel");
        Self {
            channels,
            sample_rate,
        }
    }

    /// Samples per frame.
    pub fn channels(&self) -> ChannelCount {
        self.channels
    }

    /// Nominal frame rate. Informational; the pipe does not pace itself.
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Bytes occupied by one frame of `T` samples.
    pub fn bytes_per_frame<T>(&self) -> usize {
        usize::from(self.channels) * std::mem::size_of::<T>()
    }
}

impl fmt::Display for PipeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ch @ {} Hz", self.channels, self.sample_rate)
    }
}

/// What a writer does when the pipe has less room than requested.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write what fits and return at once.
    #[default]
    NonBlocking,
    /// Wait for the reader to make room until everything is written, the
    /// pipe shuts down or the write timeout runs out.
    Blocking,
}

/// Builder for a pipe with non-default settings.
///
/// ```
/// use std::time::Duration;
/// use submix::pipe::{PipeBuilder, PipeFormat, WriteMode};
///
/// let (writer, reader, control) = PipeBuilder::new(PipeFormat::new(2, 48_000))
///     .capacity(4096)
///     .write_mode(WriteMode::Blocking)
///     .write_timeout(Some(Duration::from_millis(100)))
///     .build::<i16>();
/// assert_eq!(writer.capacity(), 4096);
/// # drop((reader, control));
/// ```
#[derive(Debug, Clone)]
pub struct PipeBuilder {
    format: PipeFormat,
    capacity: usize,
    write_mode: WriteMode,
    write_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl PipeBuilder {
    /// Starts from the defaults: 1024 frames, non-blocking writes, no write
    /// timeout and a 5 ms poll interval while blocked.
    pub fn new(format: PipeFormat) -> Self {
        Self {
            format,
            capacity: DEFAULT_CAPACITY_FRAMES,
            write_mode: WriteMode::default(),
            write_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Minimum capacity in frames. Rounded up to a power of two.
    pub fn capacity(mut self, frames: usize) -> Self {
        self.capacity = frames;
        self
    }

    /// Sets the behaviour of writes that do not fit.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Upper bound on how long a blocking write waits in total. `None` waits
    /// until the pipe has room or shuts down.
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// How often a blocked writer rechecks for room even without a wakeup.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_micros(100));
        self
    }

    /// Creates the pipe and returns its two ends plus a control handle.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is zero.
    pub fn build<T>(self) -> (PipeWriter<T>, PipeReader<T>, PipeControl)
    where
        T: Copy + Default + Send,
    {
        assert!(self.capacity != 0, "pipe capacity must be at least one frame");
        let capacity = self.capacity.next_power_of_two();
        let (producer, consumer) = RingBuffer::new(capacity * usize::from(self.format.channels));
        let shared = Arc::new(Shared {
            format: self.format,
            capacity,
            shutdown: AtomicBool::new(false),
            flushed: AtomicBool::new(false),
            writer_waiting: AtomicBool::new(false),
            frames_written: AtomicU64::new(0),
            frames_read: AtomicU64::new(0),
            space: (Mutex::new(()), Condvar::new()),
        });

        let writer = PipeWriter {
            producer,
            shared: shared.clone(),
            mode: self.write_mode,
            write_timeout: self.write_timeout,
            poll_interval: self.poll_interval,
        };
        let reader = PipeReader {
            consumer,
            shared: shared.clone(),
        };
        (writer, reader, PipeControl { shared })
    }
}

/// Creates a pipe holding at least `capacity` frames of `format`.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn ring_pipe<T>(
    capacity: usize,
    format: PipeFormat,
    mode: WriteMode,
) -> (PipeWriter<T>, PipeReader<T>, PipeControl)
where
    T: Copy + Default + Send,
{
    PipeBuilder::new(format)
        .capacity(capacity)
        .write_mode(mode)
        .build()
}

/// State shared by both ends and every control handle.
#[derive(Debug)]
struct Shared {
    format: PipeFormat,
    /// Capacity in frames.
    capacity: usize,
    shutdown: AtomicBool,
    flushed: AtomicBool,
    writer_waiting: AtomicBool,
    frames_written: AtomicU64,
    frames_read: AtomicU64,
    /// Signalled whenever the reader frees room or the pipe shuts down.
    space: (Mutex<()>, Condvar),
}

impl Shared {
    fn channels(&self) -> usize {
        usize::from(self.format.channels)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }

    fn check_aligned(&self, samples: usize) -> Result<usize, PipeError> {
        let channels = self.channels();
        if samples % channels != 0 {
            return Err(PipeError::Misaligned {
                samples,
                channels: self.format.channels,
            });
        }
        Ok(samples / channels)
    }

    fn shutdown(&self, flush: bool) {
        if flush {
            self.flushed.store(true, Ordering::Release);
        }
        let was_shutdown = self.shutdown.swap(true, Ordering::AcqRel);
        if !was_shutdown {
            #[cfg(feature = "tracing")]
            tracing::debug!(flush, "pipe shut down");
        }
        let (lock, space) = &self.space;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        space.notify_all();
    }

    fn wake_writer(&self) {
        if self.writer_waiting.load(Ordering::SeqCst) {
            let (lock, space) = &self.space;
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            space.notify_one();
        }
    }

    /// Frames written but not yet read, as seen from a third thread.
    fn buffered_estimate(&self) -> usize {
        let written = self.frames_written.load(Ordering::Acquire);
        let read = self.frames_read.load(Ordering::Acquire);
        (written.saturating_sub(read) as usize).min(self.capacity)
    }
}

/// Writing end of a pipe.
///
/// Dropping the writer shuts the pipe down without flushing, so the reader
/// can drain what is left and then sees end of stream.
pub struct PipeWriter<T> {
    producer: rtrb::Producer<T>,
    shared: Arc<Shared>,
    mode: WriteMode,
    write_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl<T> fmt::Debug for PipeWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeWriter")
            .field("format", &self.shared.format)
            .field("capacity", &self.shared.capacity)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<T> PipeWriter<T>
where
    T: Copy + Default + Send,
{
    /// Writes the interleaved frames in `samples` and returns how many frames
    /// went in.
    ///
    /// In [`WriteMode::NonBlocking`] this writes as many frames as currently
    /// fit, which may be zero. In [`WriteMode::Blocking`] it keeps writing as
    /// room frees up and only returns short if the pipe shuts down after some
    /// frames went in, or the write timeout runs out.
    ///
    /// # Errors
    ///
    /// - [`PipeError::Shutdown`] if the pipe was shut down before any frame
    ///   of this call was written.
    /// - [`PipeError::Misaligned`] if `samples` is not a whole number of
    ///   frames.
    pub fn write(&mut self, samples: &[T]) -> Result<usize, PipeError> {
        let frames = self.shared.check_aligned(samples.len())?;
        if self.shared.is_shutdown() {
            return Err(PipeError::Shutdown);
        }
        let mut written = self.push_frames(samples);
        if written == frames || self.mode == WriteMode::NonBlocking {
            return Ok(written);
        }

        let shared = Arc::clone(&self.shared);
        let channels = shared.channels();
        let deadline = self.write_timeout.map(|timeout| Instant::now() + timeout);
        let (lock, space) = &shared.space;
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        shared.writer_waiting.store(true, Ordering::SeqCst);
        while written < frames {
            if shared.is_shutdown() {
                break;
            }
            written += self.push_frames(&samples[written * channels..]);
            if written == frames {
                break;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(written, frames, "blocking pipe write timed out");
                        break;
                    }
                    (deadline - now).min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            guard = space
                .wait_timeout(guard, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        shared.writer_waiting.store(false, Ordering::SeqCst);
        drop(guard);

        if written == 0 && shared.is_shutdown() {
            return Err(PipeError::Shutdown);
        }
        Ok(written)
    }

    /// Copies as many whole frames as fit and publishes them in one commit.
    fn push_frames(&mut self, samples: &[T]) -> usize {
        let channels = self.shared.channels();
        let frames = (samples.len() / channels).min(self.producer.slots() / channels);
        if frames == 0 {
            return 0;
        }
        let Ok(mut chunk) = self.producer.write_chunk(frames * channels) else {
            return 0;
        };
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        second.copy_from_slice(&samples[split..split + second.len()]);
        chunk.commit_all();
        self.shared
            .frames_written
            .fetch_add(frames as u64, Ordering::Release);
        frames
    }

    /// Frames that can be written right now without blocking.
    ///
    /// A flushed pipe counts as empty even before the reader discards what
    /// it held.
    pub fn available_to_write(&self) -> usize {
        if self.shared.is_flushed() {
            return self.shared.capacity;
        }
        self.producer.slots() / self.shared.channels()
    }

    /// Frames written but not yet read.
    pub fn available_to_read(&self) -> usize {
        self.shared.capacity - self.available_to_write()
    }
}

impl<T> PipeWriter<T> {
    /// Capacity in frames. At least what was requested.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Geometry of the frames this pipe carries.
    pub fn format(&self) -> PipeFormat {
        self.shared.format
    }

    /// Total frames written over the life of the pipe.
    pub fn frames_written(&self) -> u64 {
        self.shared.frames_written.load(Ordering::Acquire)
    }

    /// Shuts the pipe down, see [`PipeControl::shutdown`].
    pub fn shutdown(&self, flush: bool) {
        self.shared.shutdown(flush);
    }

    /// Whether the pipe was shut down.
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Another handle able to shut the pipe down.
    pub fn control(&self) -> PipeControl {
        PipeControl {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for PipeWriter<T> {
    fn drop(&mut self) {
        self.shared.shutdown(false);
    }
}

/// Reading end of a pipe. Reads never block.
///
/// Dropping the reader shuts the pipe down and flushes it, releasing a
/// writer that is waiting for room.
pub struct PipeReader<T> {
    consumer: rtrb::Consumer<T>,
    shared: Arc<Shared>,
}

impl<T> fmt::Debug for PipeReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeReader")
            .field("format", &self.shared.format)
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> PipeReader<T>
where
    T: Copy + Default + Send,
{
    /// Reads up to `out.len() / channels` frames into `out` and returns how
    /// many were read.
    ///
    /// Zero means nothing is buffered right now. Once the pipe is shut down
    /// and drained (or flushed) it stays zero; use [`is_eof`](Self::is_eof)
    /// to tell the two apart.
    ///
    /// # Errors
    ///
    /// [`PipeError::Misaligned`] if `out` is not a whole number of frames.
    pub fn read(&mut self, out: &mut [T]) -> Result<usize, PipeError> {
        let requested = self.shared.check_aligned(out.len())?;
        if self.shared.is_flushed() {
            self.discard_all();
            return Ok(0);
        }

        let channels = self.shared.channels();
        let frames = requested.min(self.consumer.slots() / channels);
        if frames == 0 {
            return Ok(0);
        }
        let Ok(chunk) = self.consumer.read_chunk(frames * channels) else {
            return Ok(0);
        };
        let (first, second) = chunk.as_slices();
        out[..first.len()].copy_from_slice(first);
        out[first.len()..first.len() + second.len()].copy_from_slice(second);
        chunk.commit_all();
        self.finish_read(frames);
        Ok(frames)
    }

    /// Drops every buffered frame without copying it out.
    fn discard_all(&mut self) {
        let slots = self.consumer.slots();
        if slots == 0 {
            return;
        }
        if let Ok(chunk) = self.consumer.read_chunk(slots) {
            chunk.commit_all();
            self.finish_read(slots / self.shared.channels());
        }
    }

    fn finish_read(&mut self, frames: usize) {
        self.shared
            .frames_read
            .fetch_add(frames as u64, Ordering::Release);
        self.shared.wake_writer();
    }

    /// Frames that can be read right now.
    pub fn available_to_read(&self) -> usize {
        if self.shared.is_flushed() {
            return 0;
        }
        self.consumer.slots() / self.shared.channels()
    }

    /// Room left for the writer.
    pub fn available_to_write(&self) -> usize {
        self.shared.capacity - self.available_to_read()
    }

    /// True once the pipe is shut down and nothing is left to read.
    pub fn is_eof(&self) -> bool {
        self.shared.is_shutdown() && self.available_to_read() == 0
    }

    /// Checks that the pipe carries frames of `expected` geometry.
    ///
    /// # Errors
    ///
    /// [`PipeError::FormatMismatch`] if channel count or rate differ.
    pub fn negotiate(&self, expected: PipeFormat) -> Result<(), PipeError> {
        if expected != self.shared.format {
            return Err(PipeError::FormatMismatch {
                expected,
                actual: self.shared.format,
            });
        }
        Ok(())
    }
}

impl<T> PipeReader<T> {
    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Geometry of the frames this pipe carries.
    pub fn format(&self) -> PipeFormat {
        self.shared.format
    }

    /// Total frames read (or flushed) over the life of the pipe.
    pub fn frames_read(&self) -> u64 {
        self.shared.frames_read.load(Ordering::Acquire)
    }

    /// Shuts the pipe down, see [`PipeControl::shutdown`].
    pub fn shutdown(&self, flush: bool) {
        self.shared.shutdown(flush);
    }

    /// Whether the pipe was shut down.
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }
}

impl<T> Drop for PipeReader<T> {
    fn drop(&mut self) {
        self.shared.shutdown(true);
    }
}

/// Handle that can shut a pipe down from any thread.
#[derive(Debug, Clone)]
pub struct PipeControl {
    shared: Arc<Shared>,
}

impl PipeControl {
    /// Closes the pipe for writing and wakes a blocked writer.
    ///
    /// With `flush` the frames still buffered are dropped and the next read
    /// returns zero. Without it the reader keeps draining them and sees end
    /// of stream once empty. Calling this again has no further effect,
    /// except that a later `flush = true` still discards what is left.
    pub fn shutdown(&self, flush: bool) {
        self.shared.shutdown(flush);
    }

    /// Whether the pipe was shut down.
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Frames buffered, as last published by either end.
    pub fn available_to_read(&self) -> usize {
        if self.shared.is_flushed() {
            return 0;
        }
        self.shared.buffered_estimate()
    }

    /// Room left, as last published by either end.
    pub fn available_to_write(&self) -> usize {
        self.shared.capacity - self.available_to_read()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    fn stereo() -> PipeFormat {
        PipeFormat::new(2, 48_000)
    }

    fn frames(range: std::ops::Range<i16>) -> Vec<i16> {
        range.flat_map(|i| [i, -i]).collect()
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let (writer, reader, control) = ring_pipe::<i16>(5, stereo(), WriteMode::NonBlocking);
        assert_eq!(writer.capacity(), 8);
        assert_eq!(reader.capacity(), 8);
        assert_eq!(control.capacity(), 8);
        assert_eq!(writer.available_to_write(), 8);
    }

    #[test]
    fn short_write_when_full() {
        let (mut writer, mut reader, _control) =
            ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        assert_eq!(writer.write(&frames(0..5)), Ok(5));
        assert_eq!(writer.write(&frames(5..10)), Ok(3));
        assert_eq!(writer.write(&frames(10..11)), Ok(0));

        let mut out = vec![0; 16];
        assert_eq!(reader.read(&mut out), Ok(8));
        assert_eq!(out, frames(0..8));
        assert_eq!(reader.read(&mut out), Ok(0));
    }

    #[test]
    fn misaligned_buffers_are_rejected() {
        let (mut writer, mut reader, _control) =
            ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        assert_eq!(
            writer.write(&[1, 2, 3]),
            Err(PipeError::Misaligned {
                samples: 3,
                channels: 2
            })
        );
        let mut out = [0; 5];
        assert!(matches!(
            reader.read(&mut out),
            Err(PipeError::Misaligned { .. })
        ));
    }

    #[test]
    fn write_after_shutdown_fails() {
        let (mut writer, _reader, control) = ring_pipe::<i16>(8, stereo(), WriteMode::Blocking);
        control.shutdown(false);
        assert_eq!(writer.write(&frames(0..1)), Err(PipeError::Shutdown));
    }

    #[test]
    fn write_after_flushing_shutdown_fails_with_shutdown() {
        let (mut writer, _reader, control) =
            ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        control.shutdown(true);
        assert_eq!(writer.write(&frames(0..1)), Err(PipeError::Shutdown));
    }

    #[test]
    fn flush_discards_pending_frames() {
        let (mut writer, mut reader, control) =
            ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        writer.write(&frames(0..4)).unwrap();
        control.shutdown(true);
        assert_eq!(reader.available_to_read(), 0);
        let mut out = vec![0; 8];
        assert_eq!(reader.read(&mut out), Ok(0));
        assert!(reader.is_eof());
        assert_eq!(reader.frames_read(), 4);
    }

    #[test]
    fn flushed_pipe_reports_all_room_free() {
        let (mut writer, reader, control) = ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        writer.write(&frames(0..4)).unwrap();
        control.shutdown(true);

        // Nothing was discarded yet, the reader has not read since.
        assert_eq!(reader.available_to_read(), 0);
        assert_eq!(reader.available_to_write(), 8);
        assert_eq!(writer.available_to_write(), 8);
        assert_eq!(control.available_to_read(), 0);
        assert_eq!(control.available_to_write(), 8);
    }

    #[test]
    fn blocking_write_fills_pipe_as_reader_drains() {
        let (mut writer, mut reader, _control) = ring_pipe::<i16>(2, stereo(), WriteMode::Blocking);
        let handle = thread::spawn(move || (writer.write(&frames(0..6)), writer));
        let mut received = Vec::new();
        let mut out = vec![0; 4];
        while received.len() < 12 {
            let read = reader.read(&mut out).unwrap();
            received.extend_from_slice(&out[..2 * read]);
            thread::yield_now();
        }
        let (written, _writer) = handle.join().unwrap();
        assert_eq!(written, Ok(6));
        assert_eq!(received, frames(0..6));
    }

    #[test]
    #[should_panic(expected = "at least one channel")]
    fn zero_channel_format_is_refused() {
        let _ = PipeFormat::new(0, 48_000);
    }

    #[test]
    fn dropping_writer_is_end_of_stream_after_drain() {
        let (mut writer, mut reader, _control) =
            ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        writer.write(&frames(0..2)).unwrap();
        drop(writer);
        assert!(!reader.is_eof());
        let mut out = vec![0; 8];
        assert_eq!(reader.read(&mut out), Ok(2));
        assert!(reader.is_eof());
    }

    #[test]
    fn dropping_reader_releases_blocked_writer() {
        let (mut writer, reader, _control) = ring_pipe::<i16>(2, stereo(), WriteMode::Blocking);
        let handle = thread::spawn(move || writer.write(&frames(0..4)));
        thread::sleep(Duration::from_millis(20));
        drop(reader);
        assert_eq!(handle.join().unwrap(), Ok(2));
    }

    #[test]
    fn blocking_write_times_out() {
        let (mut writer, _reader, _control) = PipeBuilder::new(stereo())
            .capacity(2)
            .write_mode(WriteMode::Blocking)
            .write_timeout(Some(Duration::from_millis(20)))
            .build::<i16>();
        let started = Instant::now();
        assert_eq!(writer.write(&frames(0..3)), Ok(2));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn negotiate_checks_geometry() {
        let (_writer, reader, _control) = ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        assert_eq!(reader.negotiate(stereo()), Ok(()));
        let mono = PipeFormat::new(1, 48_000);
        assert_eq!(
            reader.negotiate(mono),
            Err(PipeError::FormatMismatch {
                expected: mono,
                actual: stereo()
            })
        );
    }

    #[test]
    fn control_sees_published_counts() {
        let (mut writer, mut reader, control) =
            ring_pipe::<i16>(8, stereo(), WriteMode::NonBlocking);
        writer.write(&frames(0..3)).unwrap();
        assert_eq!(control.available_to_read(), 3);
        assert_eq!(control.available_to_write(), 5);
        let mut out = vec![0; 4];
        reader.read(&mut out).unwrap();
        assert_eq!(control.available_to_read(), 1);
    }

    #[test]
    fn wider_samples_keep_frames_whole() {
        let (mut writer, mut reader, _control) =
            ring_pipe::<i32>(4, PipeFormat::new(3, 8_000), WriteMode::NonBlocking);
        assert_eq!(PipeFormat::new(3, 8_000).bytes_per_frame::<i32>(), 12);
        assert_eq!(writer.write(&[1, 2, 3, 4, 5, 6]), Ok(2));
        let mut out = [0; 3];
        assert_eq!(reader.read(&mut out), Ok(1));
        assert_eq!(out, [1, 2, 3]);
    }
}
