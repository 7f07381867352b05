use std::time::{Duration, Instant};

use tickbucket::TokenBucket;

fn main() {
    let tb = TokenBucket::builder()
        .capacity(5)
        .initial_tokens(5)
        .fixed_interval_refill(5, Duration::from_secs(1))
        .build()
        .unwrap();
    let start = Instant::now();
    // the first five go through, the sixth waits for the next period
    for i in 1..=6 {
        tb.consume_one();
        println!("request {i} allowed after {:?}", start.elapsed());
    }
    assert!(start.elapsed() >= Duration::from_secs(1));
}
