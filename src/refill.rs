use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;

use tracing::trace;

use crate::storage::TimeStorage;
use crate::storage::atomic::AtomicStorage;
use crate::{Clock, Limit, StdClock};

/// Policy deciding how many tokens a bucket receives as time passes.
///
/// [`TokenBucket`](crate::TokenBucket) calls [`refill`](Self::refill) while
/// holding its lock, then adds the result (clamped to capacity) to its
/// balance. [`nanos_until_next_refill`](Self::nanos_until_next_refill) is
/// called without the lock to decide how long an underfunded consumer should
/// sleep, so it may observe slightly stale state.
pub trait RefillStrategy {
    /// Returns the number of tokens to add since the last call.
    fn refill(&self) -> u64;

    /// Nanoseconds until [`refill`](Self::refill) is expected to return a
    /// non-zero amount again. Zero if it would do so right now.
    fn nanos_until_next_refill(&self) -> u64;
}

impl<R: RefillStrategy + ?Sized> RefillStrategy for &R {
    fn refill(&self) -> u64 {
        (**self).refill()
    }

    fn nanos_until_next_refill(&self) -> u64 {
        (**self).nanos_until_next_refill()
    }
}

/// Grants a fixed quota of tokens at the start of every period.
///
/// Tokens arrive in a lump at each period boundary rather than trickling in.
/// If nobody asked for several periods, the next refill grants the quota of
/// every elapsed period at once and the bucket's capacity clamps the result.
///
/// The strategy starts one period before the clock's current reading, so the
/// very first refill grants a full quota.
///
/// # Type Parameters
///
/// - `C`: Clock implementation (default: [`StdClock`])
/// - `S`: Storage for the last refill instant (default: [`AtomicStorage`])
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tickbucket::{FixedIntervalRefillStrategy, Limit, ManualClock, RefillStrategy};
/// use nonzero_ext::nonzero;
///
/// let clock = ManualClock::new(0);
/// let strategy: FixedIntervalRefillStrategy<_> =
///     FixedIntervalRefillStrategy::new(Limit::per_second(nonzero!(5u32)), &clock);
///
/// assert_eq!(5, strategy.refill());
/// assert_eq!(0, strategy.refill());
///
/// clock.advance(Duration::from_secs(3));
/// assert_eq!(15, strategy.refill());
/// ```
pub struct FixedIntervalRefillStrategy<C = StdClock, S = AtomicStorage> {
    clock: C,
    last_refill_time: S,
    tokens_per_period: NonZeroU32,
    period_nanos: i64,
}

impl<C: Clock, S: TimeStorage> FixedIntervalRefillStrategy<C, S> {
    /// Creates a strategy granting `limit.permits()` tokens every `limit.period()`.
    pub fn new(limit: Limit, clock: C) -> Self {
        let period_nanos = limit.period_nanos();
        let last_refill_time = S::new(clock.read().saturating_sub(period_nanos));
        Self {
            clock,
            last_refill_time,
            tokens_per_period: limit.permits(),
            period_nanos,
        }
    }

    /// Tokens granted per period.
    pub fn tokens_per_period(&self) -> NonZeroU32 {
        self.tokens_per_period
    }

    /// Length of a period in nanoseconds.
    pub fn period_nanos(&self) -> i64 {
        self.period_nanos
    }

    /// Instant of the latest period boundary that has been accounted for.
    pub fn last_refill_time(&self) -> i64 {
        self.last_refill_time.load()
    }

    /// Instant of the next period boundary.
    pub fn next_refill_time(&self) -> i64 {
        self.last_refill_time
            .load()
            .saturating_add(self.period_nanos)
    }

    /// Returns a reference to the clock driving this strategy.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock, S: TimeStorage> RefillStrategy for FixedIntervalRefillStrategy<C, S> {
    fn refill(&self) -> u64 {
        let now = self.clock.read();
        let mut last = self.last_refill_time.load();
        loop {
            if now < last.saturating_add(self.period_nanos) {
                return 0;
            }
            let periods = now.saturating_sub(last) / self.period_nanos;
            // periods * period <= now - last, so this cannot overflow
            let advanced = last + periods * self.period_nanos;
            match self.last_refill_time.compare_exchange_weak(last, advanced) {
                Ok(()) => {
                    let periods = u64::try_from(periods).unwrap_or(0);
                    let granted =
                        periods.saturating_mul(u64::from(self.tokens_per_period.get()));
                    trace!(periods, granted, last_refill_time = advanced, "refill");
                    return granted;
                }
                Err(actual) => last = actual,
            }
        }
    }

    fn nanos_until_next_refill(&self) -> u64 {
        let now = self.clock.read();
        let wait = self.next_refill_time().saturating_sub(now);
        u64::try_from(wait).unwrap_or(0)
    }
}

impl<C, S: TimeStorage> Debug for FixedIntervalRefillStrategy<C, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedIntervalRefillStrategy")
            .field("tokens_per_period", &self.tokens_per_period)
            .field("period_nanos", &self.period_nanos)
            .field("last_refill_time", &self.last_refill_time.load())
            .finish()
    }
}
