use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use tickbucket::futures::RateLimitedStreamExt;
use tickbucket::{FastClock, TokenBucket};
use tokio::task::JoinSet;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let clock = quanta::Clock::new();
    let _quanta_thread = quanta::Upkeep::new_with_clock(Duration::from_micros(150), clock.clone())
        .start()
        .unwrap();

    // ten streams share one budget of 5 items per second
    let bucket = Arc::new(
        TokenBucket::builder()
            .capacity(5)
            .fixed_interval_refill(5, Duration::from_secs(1))
            .clock(FastClock::new(clock))
            .build()
            .unwrap(),
    );

    let start = tokio::time::Instant::now();
    let mut handles = JoinSet::new();
    for i in 1..=10 {
        handles.spawn({
            let bucket = Arc::clone(&bucket);
            async move {
                let mut stream1 = std::pin::pin!(stream::iter(1..=3).rate_limit(bucket));
                while let Some(item) = stream1.next().await {
                    println!("[stream={i}] item: {}, elapsed={:?}", item, start.elapsed());
                }
            }
        });
    }

    handles.join_all().await;
    println!("Completed in {:?}", start.elapsed());
}
