/// Stream sample rate (frames per second).
pub type SampleRate = u32;

/// Number of channels in a stream.
pub type ChannelCount = u16;

/// Checks at compile time that an error type is usable across threads and
/// carries the traits callers expect from a library error.
macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = {
            const fn check<T>()
            where
                T: std::error::Error + Send + Sync + Clone + std::fmt::Debug + std::fmt::Display,
            {
            }
            check::<$to_test>();
        };
    };
}

pub(crate) use assert_error_traits;
