use std::num::NonZeroU32;
use std::time::Duration;

use tickbucket::Limit;
use tickbucket::intercept::{CacheStatus, Interceptor};

struct Response {
    path: String,
    cached: bool,
}

impl CacheStatus for Response {
    fn served_from_cache(&self) -> bool {
        self.cached
    }
}

async fn send(path: &str, cached: bool) -> Result<Response, std::io::Error> {
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(Response {
        path: path.to_owned(),
        cached,
    })
}

#[tokio::main]
async fn main() {
    let limit = Limit::new(NonZeroU32::new(4).unwrap(), Duration::from_millis(500)).unwrap();
    let interceptor = Interceptor::from_limit(limit)
        .unwrap()
        .scoped_to("api.themoviedb.org");

    let start = tokio::time::Instant::now();
    for id in 0..12 {
        let path = format!("/3/movie/{id}");
        let res = interceptor
            // every third lookup is already cached
            .intercept_async("api.themoviedb.org", || send(&path, id % 3 == 0))
            .await
            .unwrap();
        println!(
            "{} cached={} elapsed={:?} tokens={}",
            res.path,
            res.cached,
            start.elapsed(),
            interceptor.bucket().available()
        );
    }

    // images live on another host and are not throttled
    let res = interceptor
        .intercept_async("image.tmdb.org", || send("/t/p/w500/poster.jpg", false))
        .await
        .unwrap();
    println!("{} bypassed the limiter", res.path);
}
