use super::quality::{CpuBudget, Quality};
use super::{check_rates, ConfigError, SampleRateConverter, SUPPORTED_BIT_DEPTH};
use crate::common::{ChannelCount, SampleRate};

/// Configures a [`SampleRateConverter`].
///
/// ```
/// use submix::{ConverterBuilder, CpuBudget, Quality};
///
/// let converter = ConverterBuilder::new(48_000)
///     .input_rate(44_100)
///     .channels(1)
///     .quality(Quality::High)
///     .cpu_budget(CpuBudget::new(100))
///     .build()?;
/// assert_eq!(converter.quality(), Quality::High);
/// # Ok::<(), submix::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConverterBuilder {
    output_rate: SampleRate,
    input_rate: Option<SampleRate>,
    channels: ChannelCount,
    bit_depth: u16,
    quality: Quality,
    budget: Option<CpuBudget>,
}

impl ConverterBuilder {
    /// Starts a stereo, 16-bit, [`Quality::Default`] configuration producing
    /// `output_rate` frames per second. The input rate defaults to the output
    /// rate.
    pub fn new(output_rate: SampleRate) -> Self {
        Self {
            output_rate,
            input_rate: None,
            channels: 2,
            bit_depth: SUPPORTED_BIT_DEPTH,
            quality: Quality::Default,
            budget: None,
        }
    }

    /// Initial input rate.
    pub fn input_rate(mut self, rate: SampleRate) -> Self {
        self.input_rate = Some(rate);
        self
    }

    /// Channels per input frame, 1 or 2.
    pub fn channels(mut self, channels: ChannelCount) -> Self {
        self.channels = channels;
        self
    }

    /// Bits per input sample. Only 16 is accepted.
    pub fn bit_depth(mut self, bits: u16) -> Self {
        self.bit_depth = bits;
        self
    }

    /// Requested quality. The converter may end up with a cheaper tier if the
    /// CPU budget is short.
    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Budget to reserve CPU from instead of [`CpuBudget::global`].
    pub fn cpu_budget(mut self, budget: CpuBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Validates the configuration and reserves CPU for the converter.
    ///
    /// The rate pair is checked against the requested tier, so asking for
    /// [`Quality::High`] with a pair it was not designed for fails even if
    /// the budget would have downgraded it.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn build(self) -> Result<SampleRateConverter, ConfigError> {
        if self.bit_depth != SUPPORTED_BIT_DEPTH {
            return Err(ConfigError::UnsupportedBitDepth(self.bit_depth));
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(ConfigError::UnsupportedChannelCount(self.channels));
        }
        let input_rate = self.input_rate.unwrap_or(self.output_rate);
        check_rates(self.quality, input_rate, self.output_rate)?;

        let budget = self.budget.unwrap_or_else(CpuBudget::global);
        let reservation = budget.reserve(self.quality);
        Ok(SampleRateConverter::from_parts(
            reservation,
            self.channels,
            input_rate,
            self.output_rate,
        ))
    }
}
