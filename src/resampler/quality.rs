//! Quality tiers, the process-wide default tier and the CPU budget.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::common::SampleRate;

/// Environment variable overriding what [`Quality::Default`] resolves to.
///
/// Accepts `low`, `medium`, `high` or `very_high`.
pub const QUALITY_ENV: &str = "SUBMIX_RESAMPLER_QUALITY";

/// Nominal CPU a process may spend on resampling, in MHz.
pub const MAX_CPU_MHZ: u32 = 130;

/// Rate pairs `(input, output)` the fixed-tap tiers are designed for.
///
/// [`Quality::High`] and [`Quality::VeryHigh`] refuse any other pair.
/// Equal rates are always accepted on top of this table.
pub const FIXED_RATE_PAIRS: &[(SampleRate, SampleRate)] = &[
    (48_000, 44_100),
    (44_100, 48_000),
    (32_000, 48_000),
    (32_000, 44_100),
    (24_000, 48_000),
    (22_050, 44_100),
    (22_050, 48_000),
    (16_000, 48_000),
    (16_000, 44_100),
    (11_025, 44_100),
    (8_000, 48_000),
    (8_000, 44_100),
];

/// Interpolation quality of a [`SampleRateConverter`](crate::SampleRateConverter).
///
/// Higher tiers cost more CPU. The fixed-tap tiers only accept the rate
/// pairs listed in [`FIXED_RATE_PAIRS`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quality {
    /// Whatever [`default_quality`] resolves to for this process.
    #[default]
    Default,
    /// Linear interpolation between two frames.
    Low,
    /// Cubic interpolation over four frames.
    Medium,
    /// 16-tap windowed sinc, 128 phases.
    High,
    /// 64-tap windowed sinc, 1024 phases.
    VeryHigh,
}

impl Quality {
    /// Replaces [`Quality::Default`] with the process default.
    pub fn resolve(self) -> Quality {
        match self {
            Quality::Default => default_quality(),
            other => other,
        }
    }

    /// Nominal CPU cost of one converter of this tier, in MHz.
    pub fn cost_mhz(self) -> u32 {
        match self.resolve() {
            Quality::Low => 3,
            Quality::Medium => 6,
            Quality::High => 20,
            Quality::VeryHigh => 34,
            Quality::Default => unreachable!("resolved above"),
        }
    }

    /// The next cheaper tier, if any.
    pub fn downgrade(self) -> Option<Quality> {
        match self.resolve() {
            Quality::VeryHigh => Some(Quality::High),
            Quality::High => Some(Quality::Medium),
            Quality::Medium => Some(Quality::Low),
            Quality::Low | Quality::Default => None,
        }
    }

    /// Whether this tier only supports the pairs in [`FIXED_RATE_PAIRS`].
    pub fn is_fixed_rate(self) -> bool {
        matches!(self.resolve(), Quality::High | Quality::VeryHigh)
    }

    /// Whether this tier can convert `input` to `output`.
    pub fn supports_rates(self, input: SampleRate, output: SampleRate) -> bool {
        !self.is_fixed_rate() || input == output || FIXED_RATE_PAIRS.contains(&(input, output))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Default => "default",
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::VeryHigh => "very_high",
        };
        f.write_str(name)
    }
}

/// Error parsing a [`Quality`] from text.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown resampler quality {0:?}, expected default, low, medium, high or very_high")]
pub struct ParseQualityError(String);
crate::common::assert_error_traits!(ParseQualityError);

impl FromStr for Quality {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Ok(Quality::Default),
            "low" => Ok(Quality::Low),
            "medium" | "med" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            "very_high" | "veryhigh" => Ok(Quality::VeryHigh),
            _ => Err(ParseQualityError(s.to_owned())),
        }
    }
}

/// The tier [`Quality::Default`] stands for in this process.
///
/// Decided once, on first use: the [`QUALITY_ENV`] variable wins if it names
/// a concrete tier, otherwise the host is classified by its available
/// parallelism. The host classification never picks a fixed-tap tier, since
/// those refuse most rate pairs.
pub fn default_quality() -> Quality {
    static DEFAULT: OnceLock<Quality> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        let from_env = std::env::var(QUALITY_ENV)
            .ok()
            .and_then(|value| value.parse::<Quality>().ok())
            .filter(|quality| *quality != Quality::Default);
        let quality = from_env.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
            quality_for_host(cores)
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(%quality, "default resampler quality");
        quality
    })
}

fn quality_for_host(cores: usize) -> Quality {
    if cores >= 2 {
        Quality::Medium
    } else {
        Quality::Low
    }
}

/// Shared account of CPU reserved by live converters.
///
/// Building a converter reserves its tier's [`cost_mhz`](Quality::cost_mhz);
/// dropping it gives the reservation back. When a tier does not fit, the
/// converter is built with the best cheaper tier that does. [`Quality::Low`]
/// is always granted, even over budget.
#[derive(Debug, Clone)]
pub struct CpuBudget {
    inner: Arc<BudgetInner>,
}

#[derive(Debug)]
struct BudgetInner {
    max_mhz: u32,
    used_mhz: Mutex<u32>,
}

impl CpuBudget {
    /// A budget of `max_mhz`, separate from the process-wide one.
    pub fn new(max_mhz: u32) -> Self {
        Self {
            inner: Arc::new(BudgetInner {
                max_mhz,
                used_mhz: Mutex::new(0),
            }),
        }
    }

    /// A budget that never downgrades.
    pub fn unlimited() -> Self {
        Self::new(u32::MAX)
    }

    /// The process-wide budget of [`MAX_CPU_MHZ`], used unless a builder is
    /// given another one.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<CpuBudget> = OnceLock::new();
        GLOBAL.get_or_init(|| CpuBudget::new(MAX_CPU_MHZ)).clone()
    }

    /// MHz currently reserved.
    pub fn used_mhz(&self) -> u32 {
        *self
            .inner
            .used_mhz
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Upper bound in MHz.
    pub fn max_mhz(&self) -> u32 {
        self.inner.max_mhz
    }

    /// Reserves the best tier not above `requested` that fits.
    pub(crate) fn reserve(&self, requested: Quality) -> Reservation {
        let mut used = self
            .inner
            .used_mhz
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut quality = requested.resolve();
        loop {
            let cost = quality.cost_mhz();
            let fits = used.saturating_add(cost) <= self.inner.max_mhz;
            match quality.downgrade() {
                Some(cheaper) if !fits => quality = cheaper,
                _ => {
                    *used = used.saturating_add(cost);
                    #[cfg(feature = "tracing")]
                    if quality != requested.resolve() {
                        tracing::debug!(
                            requested = %requested.resolve(),
                            granted = %quality,
                            used_mhz = *used,
                            "resampler quality downgraded to fit cpu budget"
                        );
                    }
                    return Reservation {
                        budget: self.clone(),
                        quality,
                        mhz: cost,
                    };
                }
            }
        }
    }

    fn release(&self, mhz: u32) {
        let mut used = self
            .inner
            .used_mhz
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *used = used.saturating_sub(mhz);
    }
}

/// CPU held by one converter. Released on drop.
#[derive(Debug)]
pub(crate) struct Reservation {
    budget: CpuBudget,
    quality: Quality,
    mhz: u32,
}

impl Reservation {
    pub(crate) fn quality(&self) -> Quality {
        self.quality
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.budget.release(self.mhz);
    }
}
