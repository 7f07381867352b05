pub mod atomic;
pub mod local;

/// Storage policy for the instant a refill strategy last granted tokens.
///
/// Implementations can provide either atomic or non-atomic access to the
/// underlying instant depending on the desired level of concurrency.
pub trait TimeStorage {
    /// Create a new storage holding `instant` (nanoseconds on the strategy's clock).
    fn new(instant: i64) -> Self;
    /// Load the stored instant.
    fn load(&self) -> i64;
    /// Replace the stored instant with `new` if it still equals `current`.
    ///
    /// On failure the actually stored instant is returned. Spurious failures
    /// are allowed, callers are expected to retry in a loop.
    fn compare_exchange_weak(&self, current: i64, new: i64) -> Result<(), i64>;
}
