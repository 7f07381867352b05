use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project_lite::pin_project;

use super::timer::{Sleep, sleep};
use crate::bucket::{Acquisition, TokenBucket};
use crate::refill::RefillStrategy;

pin_project! {
    /// A stream that is rate limited by a token bucket.
    ///
    /// Every item costs one token. The stream does not buffer any items, it
    /// takes a token before driving the underlying stream and hands the token
    /// back if the underlying stream turns out to have nothing to offer yet
    /// (or anymore).
    ///
    /// The side effect of this is that the stream might be throttled for 1
    /// extra refill period if the bucket is empty while the underlying stream
    /// has already terminated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use futures::{StreamExt, stream};
    /// use tickbucket::futures::RateLimitedStreamExt;
    /// use tickbucket::TokenBucket;
    ///
    /// # async fn example() {
    /// let bucket = TokenBucket::builder()
    ///     .capacity(10)
    ///     .fixed_interval_refill(10, Duration::from_secs(1))
    ///     .build()
    ///     .unwrap();
    /// let mut throttled = std::pin::pin!(stream::iter(0..100).rate_limit(Arc::new(bucket)));
    /// while let Some(item) = throttled.next().await {
    ///     println!("{item}");
    /// }
    /// # }
    /// ```
    pub struct RateLimitedStream<S, R> {
        #[pin]
        stream: S,
        bucket: Arc<TokenBucket<R>>,
        #[pin]
        delay: Option<Sleep>,
        terminated: bool,
    }
}

impl<S, R> RateLimitedStream<S, R>
where
    S: Stream,
    R: RefillStrategy,
{
    /// Creates a new throttled stream charging items against `bucket`.
    pub fn new(stream: S, bucket: Arc<TokenBucket<R>>) -> Self {
        Self {
            stream,
            bucket,
            delay: None,
            terminated: false,
        }
    }

    /// The bucket items are charged against.
    pub fn bucket(&self) -> &Arc<TokenBucket<R>> {
        &self.bucket
    }

    /// Available tokens in the bucket.
    pub fn available(&self) -> u64 {
        self.bucket.available()
    }
}

impl<S, R> Stream for RateLimitedStream<S, R>
where
    S: Stream,
    R: RefillStrategy,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.terminated {
            return Poll::Ready(None);
        }

        loop {
            // are we already waiting for a refill?
            if let Some(delay) = this.delay.as_mut().as_pin_mut() {
                ready!(delay.poll(cx));
                this.delay.set(None);
            }

            match this.bucket.try_acquire(1) {
                Acquisition::Acquired => {
                    return match this.stream.as_mut().poll_next(cx) {
                        Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
                        Poll::Ready(None) => {
                            this.bucket.refill(1);
                            *this.terminated = true;
                            Poll::Ready(None)
                        }
                        Poll::Pending => {
                            this.bucket.refill(1);
                            Poll::Pending
                        }
                    };
                }
                Acquisition::Wait(wait) => this.delay.set(Some(sleep(wait))),
            }
        }
    }
}
