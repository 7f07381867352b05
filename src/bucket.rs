use std::fmt::{Debug, Formatter};
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use likely_stable::unlikely;
use tracing::{debug, warn};

use crate::error::{ConfigError, ExceededCapacity};
use crate::refill::{FixedIntervalRefillStrategy, RefillStrategy};

/// Shortest time an underfunded consumer sleeps before trying again.
const MIN_WAIT: Duration = Duration::from_millis(1);

pub(crate) enum Acquisition {
    Acquired,
    Wait(Duration),
}

/// A thread-safe token bucket refilled by a pluggable [`RefillStrategy`].
///
/// The bucket holds between zero and `capacity` tokens. Consumers take tokens
/// out, either waiting until enough are available ([`consume`](Self::consume),
/// `consume_async`) or giving up immediately ([`try_consume`](Self::try_consume)).
/// The strategy decides how many tokens flow back in as time passes, and
/// callers can hand tokens back explicitly with [`refill`](Self::refill), for
/// example when a request was answered from a cache.
///
/// The refill, the balance check and the decrement happen under a single
/// lock, so two consumers can never spend the same tokens. The lock is never
/// held while waiting.
///
/// # Type Parameters
///
/// - `R`: Refill strategy (default: [`FixedIntervalRefillStrategy`] on the standard clock)
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tickbucket::TokenBucket;
/// use nonzero_ext::nonzero;
///
/// let bucket = TokenBucket::builder()
///     .capacity(5)
///     .initial_tokens(5)
///     .fixed_interval_refill(5, Duration::from_secs(1))
///     .build()
///     .unwrap();
///
/// for _ in 0..5 {
///     bucket.consume_one();
/// }
/// // the sixth token only shows up with the next period
/// assert!(!bucket.try_consume(nonzero!(1u32)));
/// ```
pub struct TokenBucket<R = FixedIntervalRefillStrategy> {
    capacity: NonZeroU64,
    tokens: Mutex<u64>,
    strategy: R,
}

impl<R: RefillStrategy> TokenBucket<R> {
    /// Creates a token bucket around a custom refill strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of tokens the bucket can hold
    /// * `initial_tokens` - Tokens available before the first refill
    /// * `strategy` - Policy deciding how many tokens are added over time
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroCapacity`] if `capacity` is zero and
    /// [`ConfigError::InitialTokensExceedCapacity`] if the bucket would start
    /// overfull.
    pub fn with_strategy(
        capacity: u64,
        initial_tokens: u64,
        strategy: R,
    ) -> Result<Self, ConfigError> {
        let capacity = NonZeroU64::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        if initial_tokens > capacity.get() {
            return Err(ConfigError::InitialTokensExceedCapacity {
                initial: initial_tokens,
                capacity: capacity.get(),
            });
        }
        Ok(Self {
            capacity,
            tokens: Mutex::new(initial_tokens),
            strategy,
        })
    }

    /// Maximum number of tokens the bucket can hold.
    pub fn capacity(&self) -> NonZeroU64 {
        self.capacity
    }

    /// Returns a reference to the refill strategy.
    pub fn strategy(&self) -> &R {
        &self.strategy
    }

    /// Returns the number of tokens that can be consumed right now.
    ///
    /// Pending refills are applied first, so the answer reflects the
    /// current time.
    pub fn available(&self) -> u64 {
        let mut tokens = self.lock();
        self.refill_locked(&mut tokens);
        *tokens
    }

    /// Attempts to consume tokens without waiting.
    ///
    /// Returns `true` if the tokens were taken. A request larger than the
    /// capacity can never succeed and always returns `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tickbucket::TokenBucket;
    /// use nonzero_ext::nonzero;
    ///
    /// let bucket = TokenBucket::builder()
    ///     .capacity(10)
    ///     .fixed_interval_refill(10, Duration::from_secs(60))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(bucket.try_consume(nonzero!(10u32)));
    /// assert!(!bucket.try_consume(nonzero!(1u32)));
    /// ```
    pub fn try_consume(&self, to_consume: impl Into<NonZeroU32>) -> bool {
        match self.check(to_consume.into()) {
            Ok(to_consume) => self.take(to_consume),
            Err(_) => false,
        }
    }

    /// Consumes tokens, blocking the current thread until they are available.
    ///
    /// Each time the bucket is underfunded the thread sleeps until the
    /// strategy's next refill (at least 1ms) and tries again. No fairness is
    /// guaranteed between threads waiting on the same bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ExceededCapacity`] immediately if more tokens are requested
    /// than the bucket can ever hold.
    pub fn consume(&self, to_consume: impl Into<NonZeroU32>) -> Result<(), ExceededCapacity> {
        let to_consume = self.check(to_consume.into())?;
        self.consume_checked(to_consume);
        Ok(())
    }

    /// Consumes exactly one token, blocking until it is available.
    ///
    /// Unlike [`consume`](Self::consume) this cannot fail, every bucket holds
    /// at least one token.
    pub fn consume_one(&self) {
        self.consume_checked(1);
    }

    /// Consumes tokens, suspending the calling task until they are available.
    ///
    /// Dropping the returned future cancels the wait. Tokens are only taken
    /// in the same step that observes them, so a cancelled consumer never
    /// leaves the bucket partially drained.
    ///
    /// # Errors
    ///
    /// Returns [`ExceededCapacity`] immediately if more tokens are requested
    /// than the bucket can ever hold.
    #[cfg(feature = "async")]
    pub async fn consume_async(
        &self,
        to_consume: impl Into<NonZeroU32>,
    ) -> Result<(), ExceededCapacity> {
        let to_consume = self.check(to_consume.into())?;
        self.consume_checked_async(to_consume).await;
        Ok(())
    }

    /// Consumes exactly one token, suspending the calling task until it is
    /// available.
    #[cfg(feature = "async")]
    pub async fn consume_one_async(&self) {
        self.consume_checked_async(1).await
    }

    /// Credits tokens back to the bucket.
    ///
    /// The balance never exceeds the capacity, surplus tokens are dropped.
    /// This is how callers refund a token that was consumed for a request
    /// that turned out to be free, e.g. a cache hit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tickbucket::TokenBucket;
    /// use nonzero_ext::nonzero;
    ///
    /// let bucket = TokenBucket::builder()
    ///     .capacity(3)
    ///     .fixed_interval_refill(3, Duration::from_secs(60))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(bucket.try_consume(nonzero!(3u32)));
    /// bucket.refill(1);
    /// assert!(bucket.try_consume(nonzero!(1u32)));
    /// bucket.refill(100);
    /// assert_eq!(3, bucket.available());
    /// ```
    pub fn refill(&self, tokens: u64) {
        let mut balance = self.lock();
        *balance = self.clamp(balance.saturating_add(tokens));
    }

    /// Applies pending refills, then takes `to_consume` tokens if they are
    /// there. Otherwise returns how long to wait before trying again.
    pub(crate) fn try_acquire(&self, to_consume: u64) -> Acquisition {
        if self.take(to_consume) {
            return Acquisition::Acquired;
        }
        // read outside the lock, a stale value only costs an extra retry
        let wait = Duration::from_nanos(self.strategy.nanos_until_next_refill()).max(MIN_WAIT);
        debug!(to_consume, ?wait, "bucket underfunded");
        Acquisition::Wait(wait)
    }

    fn take(&self, to_consume: u64) -> bool {
        let mut tokens = self.lock();
        self.refill_locked(&mut tokens);
        if *tokens < to_consume {
            return false;
        }
        *tokens -= to_consume;
        true
    }

    fn consume_checked(&self, to_consume: u64) {
        while let Acquisition::Wait(wait) = self.try_acquire(to_consume) {
            std::thread::sleep(wait);
        }
    }

    #[cfg(feature = "async")]
    async fn consume_checked_async(&self, to_consume: u64) {
        while let Acquisition::Wait(wait) = self.try_acquire(to_consume) {
            tokio::time::sleep(wait).await;
        }
    }

    fn check(&self, to_consume: NonZeroU32) -> Result<u64, ExceededCapacity> {
        let to_consume = u64::from(to_consume.get());
        if unlikely(to_consume > self.capacity.get()) {
            return Err(ExceededCapacity {
                requested: to_consume,
                capacity: self.capacity,
            });
        }
        Ok(to_consume)
    }

    fn refill_locked(&self, tokens: &mut u64) {
        let granted = self.strategy.refill();
        if granted > 0 {
            *tokens = self.clamp(tokens.saturating_add(granted));
        }
    }

    fn clamp(&self, tokens: u64) -> u64 {
        tokens.min(self.capacity.get())
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        // the balance is a single integer and is never left half-updated
        self.tokens.lock().unwrap_or_else(|poisoned| {
            warn!("recovering poisoned token bucket lock");
            poisoned.into_inner()
        })
    }
}

impl<R> Debug for TokenBucket<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("TokenBucket");
        s.field("capacity", &self.capacity);
        match self.tokens.try_lock() {
            Ok(tokens) => s.field("tokens", &*tokens),
            Err(_) => s.field("tokens", &format_args!("<locked>")),
        };
        s.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Instant;

    use nonzero_ext::nonzero;

    use super::*;
    use crate::clock::{ManualClock, TokioClock};
    use crate::{Limit, StdClock};

    type ManualBucket = TokenBucket<FixedIntervalRefillStrategy<Arc<ManualClock>>>;

    fn manual_bucket(
        clock: &Arc<ManualClock>,
        capacity: u64,
        initial: u64,
        permits: u32,
    ) -> ManualBucket {
        TokenBucket::builder()
            .capacity(capacity)
            .initial_tokens(initial)
            .fixed_interval_refill(permits, Duration::from_secs(1))
            .clock(Arc::clone(clock))
            .build()
            .unwrap()
    }

    #[test]
    fn five_per_second() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 5, 5, 5);
        // the first refill is clamped, the bucket started full
        for _ in 0..5 {
            assert!(tb.try_consume(nonzero!(1u32)));
        }
        assert_eq!(0, tb.available());
        assert!(!tb.try_consume(nonzero!(1u32)));
        clock.advance(Duration::from_millis(999));
        assert!(!tb.try_consume(nonzero!(1u32)));
        clock.advance(Duration::from_millis(1));
        assert!(tb.try_consume(nonzero!(1u32)));
        assert_eq!(4, tb.available());
    }

    #[test]
    fn idle_start_grants_first_quota() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 10, 0, 4);
        assert_eq!(4, tb.available());
        // the quota was taken into account, the next one is a full period away
        assert_eq!(1_000_000_000, tb.strategy().nanos_until_next_refill());
        assert_eq!(4, tb.available());
    }

    #[test]
    fn burst_catch_up_is_clamped_to_capacity() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 12, 0, 5);
        assert!(tb.try_consume(nonzero!(5u32)));
        clock.set(3_000_000_000);
        // 15 tokens were granted but only 12 fit
        assert_eq!(12, tb.available());
    }

    #[test]
    fn refund_after_draining() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 3, 0, 3);
        assert!(tb.try_consume(nonzero!(3u32)));
        assert!(!tb.try_consume(nonzero!(1u32)));
        tb.refill(1);
        assert!(tb.try_consume(nonzero!(1u32)));
        assert!(!tb.try_consume(nonzero!(1u32)));
        for _ in 0..10 {
            tb.refill(1);
            assert!(tb.available() <= 3);
        }
        assert_eq!(3, tb.available());
        tb.refill(u64::MAX);
        assert_eq!(3, tb.available());
    }

    #[test]
    fn oversized_requests_fail_fast() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 3, 3, 3);
        let err = tb.consume(nonzero!(4u32)).unwrap_err();
        assert_eq!(4, err.requested());
        assert_eq!(nonzero!(3u64), err.capacity());
        assert!(!tb.try_consume(nonzero!(4u32)));
        // nothing was taken
        assert_eq!(3, tb.available());
        assert!(tb.consume(nonzero!(3u32)).is_ok());
    }

    #[test]
    fn tokens_stay_within_capacity() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 7, 2, 3);
        let mut seed = 0x2545_f491_u64;
        for _ in 0..2_000 {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let pick = seed >> 33;
            match pick % 4 {
                0 => {
                    let n = NonZeroU32::new((pick % 9) as u32 + 1).unwrap();
                    tb.try_consume(n);
                }
                1 => tb.refill(pick % 5),
                2 => clock.advance(Duration::from_millis(pick % 1_500)),
                _ => {}
            }
            assert!(tb.available() <= 7);
        }
    }

    #[test]
    fn no_double_spend() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 10, 0, 10);
        let acquired = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..32 {
                s.spawn(|| {
                    if tb.try_consume(nonzero!(1u32)) {
                        acquired.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(10, acquired.load(Ordering::Relaxed));
        assert_eq!(0, tb.available());
    }

    #[test]
    fn concurrent_consume() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 10_000, 0, 10_000);
        std::thread::scope(|s| {
            // 4 threads, each consuming 2000 tokens out of the 10k granted at start
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..2000 {
                        assert!(tb.try_consume(nonzero!(1u32)));
                    }
                });
            }
        });
        assert_eq!(2000, tb.available());
    }

    #[test]
    fn sixth_consume_blocks_for_a_period() {
        let period = Duration::from_millis(200);
        let start = Instant::now();
        let tb = TokenBucket::builder()
            .capacity(5)
            .initial_tokens(5)
            .fixed_interval_refill(5, period)
            .build()
            .unwrap();
        for _ in 0..5 {
            tb.consume_one();
        }
        assert!(start.elapsed() < period);
        tb.consume_one();
        assert!(start.elapsed() >= period);
    }

    #[test]
    fn blocked_threads_are_released_by_refills() {
        let period = Duration::from_millis(100);
        let start = Instant::now();
        let tb = TokenBucket::builder()
            .capacity(4)
            .fixed_interval_refill(4, period)
            .clock(StdClock::default())
            .build()
            .unwrap();
        let consumed = AtomicU64::new(0);
        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    for _ in 0..4 {
                        tb.consume(nonzero!(1u32)).unwrap();
                        consumed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(12, consumed.load(Ordering::Relaxed));
        // 4 tokens at start, then 4 more after each of two periods
        assert!(start.elapsed() >= 2 * period);
    }

    struct Stingy;

    impl RefillStrategy for Stingy {
        fn refill(&self) -> u64 {
            0
        }

        fn nanos_until_next_refill(&self) -> u64 {
            0
        }
    }

    #[test]
    fn custom_strategy() {
        let tb = TokenBucket::with_strategy(2, 1, Stingy).unwrap();
        assert!(tb.try_consume(nonzero!(1u32)));
        assert!(!tb.try_consume(nonzero!(1u32)));
        assert_eq!(0, tb.available());
        match tb.try_acquire(1) {
            Acquisition::Wait(wait) => assert_eq!(MIN_WAIT, wait),
            Acquisition::Acquired => panic!("nothing should be available"),
        }
        tb.refill(5);
        assert_eq!(2, tb.available());

        let by_ref = TokenBucket::with_strategy(1, 0, &Stingy).unwrap();
        assert!(!by_ref.try_consume(nonzero!(1u32)));
    }

    #[test]
    fn invalid_construction() {
        assert_eq!(
            ConfigError::ZeroCapacity,
            TokenBucket::with_strategy(0, 0, Stingy).unwrap_err()
        );
        assert_eq!(
            ConfigError::InitialTokensExceedCapacity {
                initial: 3,
                capacity: 2
            },
            TokenBucket::with_strategy(2, 3, Stingy).unwrap_err()
        );
    }

    #[test]
    fn debug_output() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 3, 1, 3);
        assert_eq!("TokenBucket { capacity: 3, tokens: 1, .. }", format!("{tb:?}"));
    }

    #[test]
    fn survives_a_poisoned_lock() {
        let clock = Arc::new(ManualClock::default());
        let tb = manual_bucket(&clock, 3, 3, 3);
        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _guard = tb.tokens.lock().unwrap();
                panic!("poison the lock");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(tb.tokens.is_poisoned());
        assert!(tb.try_consume(nonzero!(2u32)));
        assert_eq!(1, tb.available());
    }

    fn tokio_bucket(
        capacity: u64,
        permits: u32,
    ) -> Arc<TokenBucket<FixedIntervalRefillStrategy<TokioClock>>> {
        let limit = Limit::per_second(NonZeroU32::new(permits).unwrap());
        Arc::new(
            TokenBucket::builder()
                .capacity(capacity)
                .limit(limit)
                .clock(TokioClock::default())
                .build()
                .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn async_waiters_proceed_as_tokens_arrive() {
        let tb = tokio_bucket(3, 3);
        let done = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let tb = Arc::clone(&tb);
            let done = Arc::clone(&done);
            handles.push(tokio::spawn(async move {
                tb.consume_one_async().await;
                done.fetch_add(1, Ordering::Relaxed);
            }));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        // only the first period's quota went out
        assert_eq!(3, done.load(Ordering::Relaxed));
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(5, done.load(Ordering::Relaxed));
        assert_eq!(1, tb.available());
    }

    #[tokio::test(start_paused = true)]
    async fn async_oversized_request_fails_fast() {
        let tb = tokio_bucket(2, 2);
        let err = tb.consume_async(nonzero!(3u32)).await.unwrap_err();
        assert_eq!(3, err.requested());
        assert!(tb.consume_async(nonzero!(2u32)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_consume_leaves_bucket_untouched() {
        let tb = tokio_bucket(2, 2);
        tb.consume_async(nonzero!(1u32)).await.unwrap();
        // one token left, asking for two has to wait for the next period
        let res =
            tokio::time::timeout(Duration::from_millis(100), tb.consume_async(nonzero!(2u32))).await;
        assert!(res.is_err());
        assert_eq!(1, tb.available());
        // the lock was not leaked
        tb.refill(1);
        assert!(tb.try_consume(nonzero!(2u32)));
    }
}
