mod stream;
mod timer;

use std::sync::Arc;

pub use stream::RateLimitedStream;

use futures::Stream;

use crate::TokenBucket;
use crate::refill::RefillStrategy;

pub trait RateLimitedStreamExt<S, R>
where
    S: Stream,
    R: RefillStrategy,
{
    /// Throttles the stream so that every item costs one token from `bucket`.
    fn rate_limit(self, bucket: Arc<TokenBucket<R>>) -> RateLimitedStream<S, R>;
}

impl<S, R> RateLimitedStreamExt<S, R> for S
where
    S: Stream,
    R: RefillStrategy,
{
    fn rate_limit(self, bucket: Arc<TokenBucket<R>>) -> RateLimitedStream<S, R> {
        RateLimitedStream::new(self, bucket)
    }
}
