use std::time::Duration;

use nonzero_ext::nonzero;
use tickbucket::{FastClock, TokenBucket};

fn main() {
    let clock = quanta::Clock::new();
    // Updates at 1Khz
    let _quanta_thread = quanta::Upkeep::new_with_clock(Duration::from_millis(1), clock.clone())
        .start()
        .unwrap();
    let tb = TokenBucket::builder()
        .capacity(20)
        .fixed_interval_refill(10, Duration::from_secs(1))
        .clock(FastClock::new(clock))
        .build()
        .unwrap();
    println!("available: {}", tb.available());
    // two more periods pass, the bucket catches up to its capacity
    println!("sleeping for 2 seconds...");
    std::thread::sleep(Duration::from_secs(2));
    println!("available: {}", tb.available());
    tb.consume(nonzero!(5u32)).unwrap();
    println!("Consumed 5, available: {}", tb.available());
}
