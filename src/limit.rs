use std::num::NonZeroU32;
use std::time::Duration;

use crate::clock::duration_to_nanos;
use crate::error::ConfigError;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Configuration for a fixed-interval refill: `permits` tokens every `period`.
///
/// This is the `permits`/`period` pair an interceptor is configured with. The
/// period defaults to one second when built through [`Limit::per_second`].
///
/// # Examples
///
/// ```rust
/// use std::num::NonZeroU32;
/// use std::time::Duration;
/// use tickbucket::Limit;
///
/// // 40 requests every second
/// let limit = Limit::per_second(NonZeroU32::new(40).unwrap());
/// assert_eq!(limit.period(), Duration::from_secs(1));
///
/// // 5 requests every 250ms
/// let limit = Limit::new(NonZeroU32::new(5).unwrap(), Duration::from_millis(250)).unwrap();
/// assert_eq!(limit.period_nanos(), 250_000_000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    permits: NonZeroU32,
    period: Duration,
}

impl std::fmt::Debug for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Limit(permits={}, period={:?})", self.permits, self.period)
    }
}

impl Limit {
    /// Creates a limit granting `permits` tokens every `period`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPeriod`] for an empty period and
    /// [`ConfigError::PeriodOutOfRange`] when the period cannot be expressed
    /// in signed 64-bit nanoseconds.
    pub fn new(permits: NonZeroU32, period: Duration) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        if duration_to_nanos(period) == i64::MAX {
            return Err(ConfigError::PeriodOutOfRange);
        }
        Ok(Self { permits, period })
    }

    /// Creates a limit granting `permits` tokens every second.
    pub const fn per_second(permits: NonZeroU32) -> Self {
        Self {
            permits,
            period: Duration::from_secs(1),
        }
    }

    /// Creates a limit granting `permits` tokens every minute.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tickbucket::Limit;
    /// use nonzero_ext::nonzero;
    ///
    /// let limit = Limit::per_minute(nonzero!(60u32));
    /// assert_eq!(limit.period(), Duration::from_secs(60));
    /// assert_eq!(limit.permits(), nonzero!(60u32));
    /// ```
    pub const fn per_minute(permits: NonZeroU32) -> Self {
        Self {
            permits,
            period: Duration::from_secs(SECONDS_PER_MINUTE),
        }
    }

    /// Creates a limit granting `permits` tokens every hour.
    pub const fn per_hour(permits: NonZeroU32) -> Self {
        Self {
            permits,
            period: Duration::from_secs(SECONDS_PER_HOUR),
        }
    }

    /// Tokens granted per period.
    pub const fn permits(&self) -> NonZeroU32 {
        self.permits
    }

    /// Length of one refill period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Length of one refill period in nanoseconds. Always positive.
    pub fn period_nanos(&self) -> i64 {
        duration_to_nanos(self.period)
    }
}
