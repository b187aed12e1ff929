mod bucket;

use self::bucket::Bucket;
use crate::{
    headers::RatelimitHeaders,
    ticket::{self, TicketHeaders, TicketNotifier, TicketReceiver},
    Bucket as BucketSnapshot, GetBucketFuture, GetTicketFuture, HasBucketFuture,
    IsGloballyLockedFuture, Path, Ratelimiter,
};
use futures_util::future;
use std::{
    collections::hash_map::{DefaultHasher, HashMap},
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::time::interval;

/// Width of the concurrency-queue pool a fresh [`InMemoryRatelimiter`]
/// spawns if [`InMemoryRatelimiter::with_queue_count`] isn't used. Spec
/// §4.4 calls this "K" and asks for it to default to 8 and be configurable.
pub const DEFAULT_QUEUE_COUNT: usize = 8;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// How long a bucket with an empty ticket queue lingers in its owning
/// queue's map before being dropped, per spec §4.4's "to-remove" list —
/// long enough that a bursty endpoint doesn't pay bucket-recreation cost on
/// every lull.
const BUCKET_RETENTION: Duration = Duration::from_secs(90);

fn queue_index(path: &Path, queue_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    (hasher.finish() as usize) % queue_count
}

struct QueueState {
    buckets: HashMap<Path, Bucket>,
    /// Buckets seen empty, and the instant they were first noticed that
    /// way; swept once they've sat idle for [`BUCKET_RETENTION`].
    to_remove: Vec<(Path, Instant)>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            to_remove: Vec::new(),
        }
    }
}

/// One of the pipeline's K concurrency queues (spec §4.4): owns a disjoint
/// slice of the endpoint space, chosen by `hash(endpoint) mod K`, and ticks
/// once a second, draining whichever of its buckets may currently dispatch.
///
/// `globally_limited_until` is shared by every queue in the same
/// [`InMemoryRatelimiter`]: any queue that observes `X-RateLimit-Global` on
/// a response sets it, and every queue (including itself) skips dispatch
/// entirely on ticks before that instant.
struct Queue {
    state: Mutex<QueueState>,
    globally_limited_until: Arc<Mutex<Option<Instant>>>,
}

impl Debug for Queue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field(
                "buckets",
                &self.state.lock().expect("queue poisoned").buckets.len(),
            )
            .finish()
    }
}

impl Queue {
    fn new(globally_limited_until: Arc<Mutex<Option<Instant>>>) -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
            globally_limited_until,
        }
    }

    fn push(&self, path: Path, notifier: TicketNotifier) {
        let mut state = self.state.lock().expect("queue poisoned");
        state.to_remove.retain(|(idle_path, _)| idle_path != &path);
        state
            .buckets
            .entry(path)
            .or_insert_with(Bucket::new)
            .queue
            .push_back(notifier);
    }

    fn snapshot(&self, path: &Path) -> Option<BucketSnapshot> {
        self.state
            .lock()
            .expect("queue poisoned")
            .buckets
            .get(path)
            .map(Bucket::snapshot)
    }

    fn has(&self, path: &Path) -> bool {
        self.state
            .lock()
            .expect("queue poisoned")
            .buckets
            .contains_key(path)
    }

    fn spawn_tick_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = interval(TICK_INTERVAL);
            loop {
                ticker.tick().await;
                Self::tick(&self);
            }
        });
    }

    /// Run one second's worth of dispatch decisions for every bucket this
    /// queue owns, then sweep the to-remove list. Takes `queue` as an
    /// explicit `Arc` (rather than a method receiver) so it can clone
    /// itself into the per-ticket response-handling tasks it spawns.
    fn tick(queue: &Arc<Self>) {
        let now = Instant::now();

        let locked_until = *queue
            .globally_limited_until
            .lock()
            .expect("global lock poisoned");
        if locked_until.is_some_and(|until| now < until) {
            return;
        }

        let mut state = queue.state.lock().expect("queue poisoned");

        let paths: Vec<Path> = state.buckets.keys().cloned().collect();
        for path in paths {
            let bucket = state.buckets.get_mut(&path).expect("path just listed");
            if bucket.queue.is_empty() || !bucket.may_dispatch(now) {
                continue;
            }

            let notifier = bucket.queue.pop_front().expect("checked non-empty above");
            bucket.record_dispatch(now);

            let Some(headers_future) = notifier.available() else {
                continue;
            };

            let queue = Arc::clone(queue);
            tokio::spawn(async move { queue.apply_response(path, headers_future).await });
        }

        let newly_idle: Vec<Path> = state
            .buckets
            .iter()
            .filter(|(path, bucket)| {
                bucket.queue.is_empty() && !state.to_remove.iter().any(|(idle, _)| idle == path)
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in newly_idle {
            state.to_remove.push((path, now));
        }

        let expired: Vec<Path> = state
            .to_remove
            .iter()
            .filter(|(_, since)| now.duration_since(*since) >= BUCKET_RETENTION)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &expired {
            state.buckets.remove(path);
        }
        state.to_remove.retain(|(path, _)| !expired.contains(path));
    }

    /// Wait for the response to the ticket this queue just granted, then
    /// fold its ratelimit headers back into bucket (or global) state.
    async fn apply_response(&self, path: Path, headers_future: TicketHeaders) {
        let Ok(Some(headers)) = headers_future.await else {
            return;
        };

        if let RatelimitHeaders::GlobalLimited(global) = &headers {
            let until = Instant::now() + Duration::from_secs(global.retry_after());
            let mut locked_until = self
                .globally_limited_until
                .lock()
                .expect("global lock poisoned");
            if !locked_until.is_some_and(|existing| existing >= until) {
                *locked_until = Some(until);
            }
            return;
        }

        if let Some(bucket) = self.state.lock().expect("queue poisoned").buckets.get_mut(&path) {
            bucket.update_from_headers(&headers);
        }
    }
}

/// Default in-memory [`Ratelimiter`]: a fixed pool of `K` concurrency
/// queues (spec §4.4), each ticking once a second and owning whichever
/// [`Path`]s hash to it.
#[derive(Clone)]
pub struct InMemoryRatelimiter {
    queues: Arc<Vec<Arc<Queue>>>,
    globally_limited_until: Arc<Mutex<Option<Instant>>>,
}

impl Debug for InMemoryRatelimiter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRatelimiter")
            .field("queues", &self.queues.len())
            .finish()
    }
}

impl Default for InMemoryRatelimiter {
    fn default() -> Self {
        Self::with_queue_count(DEFAULT_QUEUE_COUNT)
    }
}

impl InMemoryRatelimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ratelimiter with `queue_count` concurrency queues instead of
    /// the default [`DEFAULT_QUEUE_COUNT`]. Every instance gets its own
    /// independent set of queues and its own `globally_limited_until`, so
    /// two `InMemoryRatelimiter`s never contend with each other — this is
    /// what keeps this design's "internal" and "raw" REST pipelines from
    /// sharing a global ratelimit (spec §4.4).
    #[must_use]
    pub fn with_queue_count(queue_count: usize) -> Self {
        let queue_count = queue_count.max(1);
        let globally_limited_until = Arc::new(Mutex::new(None));

        let queues = (0..queue_count)
            .map(|_| {
                let queue = Arc::new(Queue::new(Arc::clone(&globally_limited_until)));
                Arc::clone(&queue).spawn_tick_task();
                queue
            })
            .collect();

        Self {
            queues: Arc::new(queues),
            globally_limited_until,
        }
    }

    fn queue_for(&self, path: &Path) -> &Arc<Queue> {
        &self.queues[queue_index(path, self.queues.len())]
    }
}

impl Ratelimiter for InMemoryRatelimiter {
    fn bucket(&self, path: &Path) -> GetBucketFuture {
        let found = self.queue_for(path).snapshot(path);
        Box::pin(future::ok(found))
    }

    fn globally_locked(&self) -> IsGloballyLockedFuture {
        let now = Instant::now();
        let locked = self
            .globally_limited_until
            .lock()
            .expect("global lock poisoned")
            .is_some_and(|until| now < until);

        Box::pin(future::ok(locked))
    }

    fn has(&self, path: &Path) -> HasBucketFuture {
        let has = self.queue_for(path).has(path);
        Box::pin(future::ok(has))
    }

    fn ticket(&self, path: Path) -> GetTicketFuture {
        let (notifier, receiver) = ticket::channel();
        self.queue_for(&path).push(path, notifier);
        Box::pin(future::ok::<TicketReceiver, crate::GenericError>(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;

    #[tokio::test]
    async fn fresh_path_is_tracked_by_exactly_one_queue() {
        let ratelimiter = InMemoryRatelimiter::new();
        let path = Path::Other(Method::Get, "/gateway/bot".to_owned());

        assert!(!ratelimiter.has(&path).await.unwrap());

        let rx = ratelimiter.ticket(path.clone()).await.unwrap();
        let tx = rx.await.unwrap();
        tx.headers(None).unwrap();

        assert!(ratelimiter.has(&path).await.unwrap());
    }

    #[tokio::test]
    async fn global_lock_starts_unlocked() {
        let ratelimiter = InMemoryRatelimiter::new();
        assert!(!ratelimiter.globally_locked().await.unwrap());
    }

    #[test]
    fn queue_index_is_stable_for_the_same_path() {
        let path = Path::GuildsId(crate::Snowflake(42));
        assert_eq!(queue_index(&path, 8), queue_index(&path, 8));
    }

    #[test]
    fn with_queue_count_rejects_zero_by_clamping_to_one() {
        let ratelimiter = InMemoryRatelimiter::with_queue_count(0);
        assert_eq!(ratelimiter.queues.len(), 1);
    }
}
