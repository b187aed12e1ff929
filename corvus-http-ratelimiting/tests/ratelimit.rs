//! Integration coverage for the two ratelimit scenarios covers
//! end-to-end: a per-bucket limit that defers queued requests until the
//! bucket's reset window has elapsed, and a global ratelimit signal that
//! halts every bucket in one ratelimiter while leaving an independent one
//! (standing in for the "other pipeline") unaffected.
//!
//! Driven against [`InMemoryRatelimiter`] directly rather than through a
//! mock HTTP server, since the ratelimiting behaviour lives entirely in
//! this crate — `corvus-http`'s pipeline is a thin caller of this
//! `Ratelimiter` trait and adds nothing the scenario needs to exercise.

use corvus_http_ratelimiting::{
    headers::RatelimitHeaders, InMemoryRatelimiter, Path, Ratelimiter, Snowflake,
};
use std::time::{Duration, Instant};

fn present_headers(limit: u64, remaining: u64, reset_after_secs: f64) -> RatelimitHeaders {
    let limit = limit.to_string();
    let remaining = remaining.to_string();
    let reset_after = reset_after_secs.to_string();
    let reset = (1_700_000_000.0 + reset_after_secs).to_string();
    let pairs = [
        ("x-ratelimit-bucket", "test-bucket".as_bytes()),
        ("x-ratelimit-limit", limit.as_bytes()),
        ("x-ratelimit-remaining", remaining.as_bytes()),
        ("x-ratelimit-reset-after", reset_after.as_bytes()),
        ("x-ratelimit-reset", reset.as_bytes()),
    ];
    RatelimitHeaders::from_pairs(pairs.into_iter()).expect("valid present headers")
}

fn global_headers(retry_after_secs: u64) -> RatelimitHeaders {
    let retry_after = retry_after_secs.to_string();
    let pairs = [
        ("x-ratelimit-global", "true".as_bytes()),
        ("retry-after", retry_after.as_bytes()),
    ];
    RatelimitHeaders::from_pairs(pairs.into_iter()).expect("valid global headers")
}

/// Spec §8 scenario 3: "Bucket limit respected." Three requests enqueued
/// on the same endpoint; the first dispatches with no bucket known yet,
/// and a `remaining: 0` response must hold the rest back until the
/// bucket's reset window elapses, dispatching them in order afterwards.
#[tokio::test]
async fn bucket_limit_defers_queued_requests_until_reset() {
    let ratelimiter = InMemoryRatelimiter::new();
    let path = Path::ChannelsIdMessages(Snowflake(1));

    let rx1 = ratelimiter.ticket(path.clone()).await.unwrap();
    let rx2 = ratelimiter.ticket(path.clone()).await.unwrap();
    let rx3 = ratelimiter.ticket(path.clone()).await.unwrap();

    // No bucket known yet: the first ticket must be granted immediately.
    let tx1 = tokio::time::timeout(Duration::from_millis(200), rx1)
        .await
        .expect("first request on an unknown bucket must dispatch immediately")
        .unwrap();

    let before_reset = Instant::now();
    tx1.headers(Some(present_headers(5, 0, 0.3))).unwrap();

    // Second ticket must not be granted before the 300ms reset window.
    let tx2 = tokio::time::timeout(Duration::from_millis(200), rx2).await;
    assert!(
        tx2.is_err(),
        "a second request must not dispatch while remaining == 0 and the reset window hasn't elapsed"
    );

    // It must still complete once the window elapses, and in order.
    let tx2 = rx2.await.unwrap();
    assert!(
        before_reset.elapsed() >= Duration::from_millis(280),
        "second request dispatched before the bucket's reset window elapsed"
    );

    let before_second_reset = Instant::now();
    tx2.headers(Some(present_headers(5, 0, 0.3))).unwrap();

    let tx3 = rx3.await.unwrap();
    assert!(
        before_second_reset.elapsed() >= Duration::from_millis(280),
        "third request dispatched before its bucket's reset window elapsed"
    );
    tx3.headers(Some(present_headers(5, 4, 60.0))).unwrap();
}

/// Spec §8 scenario 4: "Global ratelimit halts all queues." A response
/// carrying `X-RateLimit-Global: true` must hold back every bucket in the
/// same ratelimiter/pipeline until `retry_after` elapses; an independent
/// ratelimiter instance (standing in for the other pipeline, "raw" vs.
/// "internal") must be unaffected.
#[tokio::test]
async fn global_ratelimit_halts_every_bucket_in_the_pipeline_only() {
    let limited_pipeline = InMemoryRatelimiter::new();
    let other_pipeline = InMemoryRatelimiter::new();

    let path_a = Path::ChannelsIdMessages(Snowflake(1));
    let path_b = Path::GuildsId(Snowflake(2));

    let rx_a = limited_pipeline.ticket(path_a).await.unwrap();
    let tx_a = tokio::time::timeout(Duration::from_millis(200), rx_a)
        .await
        .expect("first request on a fresh bucket dispatches immediately")
        .unwrap();

    tx_a.headers(Some(global_headers(1))).unwrap();

    // Give the path-A queue task a chance to observe the global-limited
    // response and flip the pipeline's shared lock before any other
    // ticket is requested.
    while !limited_pipeline.globally_locked().await.unwrap() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let before_global = Instant::now();
    let rx_b = limited_pipeline.ticket(path_b.clone()).await.unwrap();

    // An independent ratelimiter (standing in for the other pipeline, e.g.
    // "raw" vs. "internal") must not observe pipeline A's global lock at
    // all.
    let rx_other = other_pipeline.ticket(path_b).await.unwrap();
    let tx_other = tokio::time::timeout(Duration::from_millis(200), rx_other)
        .await
        .expect("an independent pipeline must not be held back by another pipeline's global limit")
        .unwrap();
    tx_other.headers(Some(present_headers(5, 4, 60.0))).unwrap();

    // Back on the limited pipeline, the second bucket must wait out
    // retry_after before dispatching.
    let tx_b = rx_b.await.unwrap();
    assert!(
        before_global.elapsed() >= Duration::from_millis(900),
        "a different bucket on the globally-limited pipeline dispatched before retry_after elapsed"
    );
    tx_b.headers(Some(present_headers(5, 4, 60.0))).unwrap();
}
