//! Throttling hook for outbound request pipelines.
//!
//! An [`Interceptor`] sits in front of whatever actually sends a request. It
//! takes one token from a shared [`TokenBucket`] before the request goes out
//! and gives it back when the response reports that it was served from a
//! cache, since no real network call was made. Requests to hosts outside the
//! interceptor's scope pass through without touching the bucket.

use std::fmt::{Debug, Formatter};
#[cfg(feature = "async")]
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::refill::{FixedIntervalRefillStrategy, RefillStrategy};
use crate::{Limit, TokenBucket};

/// Implemented by responses that know whether they came from a cache.
pub trait CacheStatus {
    /// `true` if serving this response did not cost a network round trip.
    fn served_from_cache(&self) -> bool;
}

impl<T: CacheStatus + ?Sized> CacheStatus for &T {
    fn served_from_cache(&self) -> bool {
        (**self).served_from_cache()
    }
}

/// Gates outbound requests on a shared [`TokenBucket`].
///
/// # Examples
///
/// ```rust
/// use std::num::NonZeroU32;
/// use tickbucket::intercept::{CacheStatus, Interceptor};
/// use tickbucket::Limit;
///
/// struct Response {
///     cached: bool,
/// }
///
/// impl CacheStatus for Response {
///     fn served_from_cache(&self) -> bool {
///         self.cached
///     }
/// }
///
/// let limit = Limit::per_second(NonZeroU32::new(40).unwrap());
/// let interceptor = Interceptor::from_limit(limit)
///     .unwrap()
///     .scoped_to("api.themoviedb.org");
///
/// let res: Result<Response, std::io::Error> =
///     interceptor.intercept("api.themoviedb.org", || Ok(Response { cached: true }));
/// assert!(res.is_ok());
/// // the cache hit was refunded
/// assert_eq!(40, interceptor.bucket().available());
/// ```
pub struct Interceptor<R = FixedIntervalRefillStrategy> {
    bucket: Arc<TokenBucket<R>>,
    host: Option<String>,
}

impl Interceptor {
    /// Creates a global interceptor over a fresh, full bucket holding
    /// `limit.permits()` tokens and refilled by the same amount every
    /// `limit.period()`.
    ///
    /// # Errors
    ///
    /// Propagates the [`ConfigError`](crate::ConfigError) returned by
    /// [`Builder::build`](crate::Builder::build).
    pub fn from_limit(limit: Limit) -> Result<Self, crate::ConfigError> {
        let permits = u64::from(limit.permits().get());
        let bucket = TokenBucket::builder()
            .capacity(permits)
            .initial_tokens(permits)
            .limit(limit)
            .build()?;
        Ok(Self::new(Arc::new(bucket)))
    }
}

impl<R: RefillStrategy> Interceptor<R> {
    /// Creates an interceptor that throttles requests to every host.
    pub fn new(bucket: Arc<TokenBucket<R>>) -> Self {
        Self { bucket, host: None }
    }

    /// Creates an interceptor that only throttles requests to `host`.
    pub fn for_host(bucket: Arc<TokenBucket<R>>, host: impl Into<String>) -> Self {
        Self::new(bucket).scoped_to(host)
    }

    /// Restricts this interceptor to requests for `host`.
    pub fn scoped_to(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// The bucket requests are charged against.
    pub fn bucket(&self) -> &Arc<TokenBucket<R>> {
        &self.bucket
    }

    /// The host this interceptor is restricted to, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether requests to `host` are throttled. Host names are compared
    /// ASCII case-insensitively.
    pub fn applies_to(&self, host: &str) -> bool {
        self.host
            .as_deref()
            .is_none_or(|scoped| scoped.eq_ignore_ascii_case(host))
    }

    /// Sends a request through the limiter, blocking the current thread until
    /// a token is available.
    ///
    /// `send` is called exactly once. Failed requests are passed through
    /// untouched and keep their token.
    ///
    /// # Errors
    ///
    /// Returns whatever error `send` returns.
    pub fn intercept<T, E, F>(&self, host: &str, send: F) -> Result<T, E>
    where
        T: CacheStatus,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.applies_to(host) {
            trace!(host, "bypassing rate limiter");
            return send();
        }
        self.bucket.consume_one();
        let res = send();
        self.settle(host, &res);
        res
    }

    /// Sends a request through the limiter, suspending the calling task until
    /// a token is available.
    ///
    /// Dropping the returned future before `send` is called leaves the bucket
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns whatever error the future produced by `send` resolves to.
    #[cfg(feature = "async")]
    pub async fn intercept_async<T, E, F, Fut>(&self, host: &str, send: F) -> Result<T, E>
    where
        T: CacheStatus,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.applies_to(host) {
            trace!(host, "bypassing rate limiter");
            return send().await;
        }
        self.bucket.consume_one_async().await;
        let res = send().await;
        self.settle(host, &res);
        res
    }

    fn settle<T: CacheStatus, E>(&self, host: &str, res: &Result<T, E>) {
        if matches!(res, Ok(response) if response.served_from_cache()) {
            debug!(host, "response served from cache, refunding token");
            self.bucket.refill(1);
        }
    }
}

impl<R> Clone for Interceptor<R> {
    fn clone(&self) -> Self {
        Self {
            bucket: Arc::clone(&self.bucket),
            host: self.host.clone(),
        }
    }
}

impl<R> Debug for Interceptor<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("bucket", &self.bucket)
            .field("host", &self.host)
            .finish()
    }
}
