#![doc = include_str!("../README.md")]
//!
//! # Core Components
//!
//! - [`TokenBucket`] - Thread-safe token bucket with a pluggable refill strategy
//! - [`RefillStrategy`] and [`FixedIntervalRefillStrategy`] - How tokens come back over time
//! - [`Limit`] - `permits` per `period` configuration
//! - [`Builder`] - Assembles a fixed-interval bucket
//! - [`Clock`] trait and implementations for monotonic time sources
//! - [`intercept`] - Consume-before-send, refund-on-cache-hit request gating
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tickbucket::TokenBucket;
//! use nonzero_ext::nonzero;
//!
//! // 10 tokens every second, at most 10 stored
//! let bucket = TokenBucket::builder()
//!     .capacity(10)
//!     .fixed_interval_refill(10, Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//!
//! // blocks until the tokens are there
//! bucket.consume(nonzero!(5u32)).unwrap();
//!
//! // or give up straight away
//! if !bucket.try_consume(nonzero!(8u32)) {
//!     println!("rate limited");
//! }
//! ```

mod bucket;
mod builder;
mod clock;
mod error;
#[cfg(feature = "async")]
pub mod futures;
pub mod intercept;
mod limit;
mod refill;
mod storage;

pub use bucket::TokenBucket;
pub use builder::Builder;
#[cfg(feature = "tokio")]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, StdClock};
#[cfg(feature = "quanta")]
pub use clock::{FastClock, QuantaClock};
pub use error::*;
#[cfg(feature = "async")]
pub use crate::futures::RateLimitedStreamExt;
pub use limit::Limit;
pub use refill::{FixedIntervalRefillStrategy, RefillStrategy};

pub use storage::{TimeStorage, atomic::AtomicStorage, local::LocalStorage};
