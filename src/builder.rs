use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::ConfigError;
use crate::refill::FixedIntervalRefillStrategy;
use crate::{Clock, Limit, StdClock, TokenBucket};

enum Refill {
    Limit(Limit),
    Raw { permits: u32, period: Duration },
}

/// Assembles a [`TokenBucket`] refilled at a fixed interval.
///
/// Created through [`TokenBucket::builder`]. A capacity and a refill
/// configuration are required, the bucket starts empty unless
/// [`initial_tokens`](Self::initial_tokens) says otherwise. Since the refill
/// strategy grants its first quota right away, an "empty" bucket can still
/// serve `permits` consumers immediately.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tickbucket::TokenBucket;
///
/// let bucket = TokenBucket::builder()
///     .capacity(40)
///     .initial_tokens(40)
///     .fixed_interval_refill(40, Duration::from_secs(1))
///     .build()
///     .unwrap();
/// assert_eq!(40, bucket.capacity().get());
/// ```
#[must_use]
pub struct Builder<C = StdClock> {
    capacity: Option<u64>,
    initial_tokens: u64,
    refill: Option<Refill>,
    clock: C,
}

impl TokenBucket {
    /// Starts building a token bucket driven by the standard clock.
    pub fn builder() -> Builder {
        Builder {
            capacity: None,
            initial_tokens: 0,
            refill: None,
            clock: StdClock::default(),
        }
    }
}

impl<C: Clock> Builder<C> {
    /// Maximum number of tokens the bucket can hold.
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Tokens available before the first refill. Defaults to zero.
    pub fn initial_tokens(mut self, initial_tokens: u64) -> Self {
        self.initial_tokens = initial_tokens;
        self
    }

    /// Refill `permits` tokens at the start of every `period`.
    pub fn fixed_interval_refill(mut self, permits: u32, period: Duration) -> Self {
        self.refill = Some(Refill::Raw { permits, period });
        self
    }

    /// Refill according to an already validated [`Limit`].
    pub fn limit(mut self, limit: Limit) -> Self {
        self.refill = Some(Refill::Limit(limit));
        self
    }

    /// Drive refills from a custom clock, e.g. a
    /// [`ManualClock`](crate::ManualClock) in tests.
    pub fn clock<C2: Clock>(self, clock: C2) -> Builder<C2> {
        Builder {
            capacity: self.capacity,
            initial_tokens: self.initial_tokens,
            refill: self.refill,
            clock,
        }
    }

    /// Builds the bucket.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the capacity or refill configuration is
    /// missing or invalid, or when the initial tokens exceed the capacity.
    pub fn build(self) -> Result<TokenBucket<FixedIntervalRefillStrategy<C>>, ConfigError> {
        let capacity = self.capacity.unwrap_or(0);
        let limit = match self.refill.ok_or(ConfigError::MissingRefill)? {
            Refill::Limit(limit) => limit,
            Refill::Raw { permits, period } => {
                let permits = NonZeroU32::new(permits).ok_or(ConfigError::ZeroPermits)?;
                Limit::new(permits, period)?
            }
        };
        let strategy = FixedIntervalRefillStrategy::new(limit, self.clock);
        TokenBucket::with_strategy(capacity, self.initial_tokens, strategy)
    }
}
