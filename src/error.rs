use std::num::NonZeroU64;

/// A token bucket or refill strategy was configured with values that can
/// never work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The bucket must be able to hold at least one token.
    #[error("bucket capacity must be positive")]
    ZeroCapacity,
    /// A refill period must grant at least one token.
    #[error("permits per period must be positive")]
    ZeroPermits,
    /// A refill period of zero would grant an unbounded number of tokens.
    #[error("refill period must be positive")]
    ZeroPeriod,
    /// The refill period does not fit in the clock's nanosecond range.
    #[error("refill period is too long to be represented in nanoseconds")]
    PeriodOutOfRange,
    /// The bucket cannot start with more tokens than it can hold.
    #[error("initial tokens ({initial}) exceed the bucket capacity ({capacity})")]
    InitialTokensExceedCapacity { initial: u64, capacity: u64 },
    /// The builder was asked to build a bucket without a refill configuration.
    #[error("no refill strategy was configured")]
    MissingRefill,
}

/// The requested amount of tokens can never be granted because it exceeds
/// the capacity of the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("requested {requested} tokens but the bucket can never hold more than {capacity}")]
pub struct ExceededCapacity {
    pub(crate) requested: u64,
    pub(crate) capacity: NonZeroU64,
}

impl ExceededCapacity {
    /// Number of tokens the caller asked for.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Capacity of the bucket that rejected the request.
    pub fn capacity(&self) -> NonZeroU64 {
        self.capacity
    }
}
