use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Trait for monotonic clock implementations used by refill strategies.
///
/// Implementations must provide monotonic time that never goes backwards.
/// Time is measured in nanoseconds since an arbitrary, per-clock origin.
/// Two consecutive reads may return the same value.
pub trait Clock {
    /// Returns the current instant in nanoseconds since the clock's origin.
    ///
    /// The returned value must be monotonic (never decrease). It is signed so
    /// that callers can represent instants before the origin.
    fn read(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn read(&self) -> i64 {
        (**self).read()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn read(&self) -> i64 {
        (**self).read()
    }
}

/// Converts an elapsed duration into clock nanoseconds, saturating at `i64::MAX`.
pub(crate) fn duration_to_nanos(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX)
}

/// Standard clock implementation using [`std::time::Instant`].
///
/// The origin is the instant the clock was created, so the first reading is
/// close to zero. `Instant` is monotonic and unaffected by wall-clock
/// adjustments.
///
/// # Examples
///
/// ```rust
/// use tickbucket::{Clock, StdClock};
///
/// let clock = StdClock::default();
/// let a = clock.read();
/// let b = clock.read();
/// assert!(b >= a);
/// ```
#[derive(Debug, Clone)]
pub struct StdClock {
    origin: std::time::Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn read(&self) -> i64 {
        duration_to_nanos(self.origin.elapsed())
    }
}

/// High-precision clock implementation using the `quanta` crate.
///
/// Requires the "quanta" feature to be enabled.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct QuantaClock {
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for QuantaClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl QuantaClock {
    /// Creates a new `QuantaClock` whose origin is the current reading of `clock`.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.now();
        Self { origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for QuantaClock {
    fn read(&self) -> i64 {
        duration_to_nanos(self.origin.elapsed())
    }
}

/// Tokio-compatible clock implementation using [`tokio::time::Instant`].
///
/// Reads follow tokio's notion of time, which means paused test runtimes
/// (`start_paused = true`) advance this clock as timers fire. Requires the
/// "tokio" feature.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(feature = "tokio")]
impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(feature = "tokio")]
impl Clock for TokioClock {
    fn read(&self) -> i64 {
        duration_to_nanos(self.origin.elapsed())
    }
}

/// High-performance clock using quanta's coarse timing.
///
/// Reads the value cached by quanta's upkeep thread instead of the hardware
/// counter, trading precision for speed. Refill periods much shorter than the
/// upkeep interval will be observed late. Requires the "quanta" feature.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "quanta")]
/// # {
/// use std::time::Duration;
/// use tickbucket::{FastClock, TokenBucket};
///
/// let clock = quanta::Clock::new();
/// let _upkeep = quanta::Upkeep::new_with_clock(Duration::from_millis(1), clock.clone())
///     .start()
///     .unwrap();
/// let bucket = TokenBucket::builder()
///     .capacity(100)
///     .fixed_interval_refill(100, Duration::from_secs(1))
///     .clock(FastClock::new(clock))
///     .build()
///     .unwrap();
/// assert!(bucket.try_consume(nonzero_ext::nonzero!(1u32)));
/// # }
/// ```
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct FastClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for FastClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl FastClock {
    /// Creates a new `FastClock` from a `quanta::Clock` instance.
    ///
    /// **Important**: Ensure the clock's upkeep thread is running, otherwise
    /// the strategy will not observe clock changes and no refills will happen.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.recent();
        Self { clock, origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for FastClock {
    fn read(&self) -> i64 {
        duration_to_nanos(self.clock.recent() - self.origin)
    }
}

/// Manual clock implementation for testing and simulation.
///
/// Time only moves when told to, which makes refill behaviour fully
/// deterministic. The clock is thread-safe and can be shared across
/// threads behind an [`Arc`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tickbucket::{ManualClock, TokenBucket};
/// use nonzero_ext::nonzero;
///
/// let clock = Arc::new(ManualClock::new(0));
/// let bucket = TokenBucket::builder()
///     .capacity(2)
///     .fixed_interval_refill(2, Duration::from_secs(1))
///     .clock(Arc::clone(&clock))
///     .build()
///     .unwrap();
///
/// // the first period's quota is granted immediately
/// assert!(bucket.try_consume(nonzero!(2u32)));
/// assert!(!bucket.try_consume(nonzero!(1u32)));
///
/// clock.advance(Duration::from_secs(1));
/// assert!(bucket.try_consume(nonzero!(1u32)));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a new manual clock starting at `now` nanoseconds.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Sets the current time to `now` nanoseconds.
    ///
    /// Callers are responsible for keeping the clock monotonic.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Release);
    }

    /// Advances the current time by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.advance_nanos(duration_to_nanos(delta));
    }

    /// Advances the current time by `delta` nanoseconds.
    pub fn advance_nanos(&self, delta: i64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(delta))
            });
    }
}

impl Clock for ManualClock {
    fn read(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}
