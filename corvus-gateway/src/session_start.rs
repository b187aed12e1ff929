//! Session-start gating : Discord limits how often a bot may
//! open a *new* gateway session, both per day (the `session_start_limit`
//! returned by `GET /gateway/bot`) and per concurrency bucket (at most one
//! `IDENTIFY` per bucket every few seconds). Grounded on the teacher's
//! `DayLimiter` (daily budget) and `LargeBotQueue` (per-bucket pacing),
//! collapsed into a single type here since the cluster's batch-of-C
//! startup algorithm (the top-level crate) needs both checks at the same
//! call site, right before a shard identifies.

use corvus_model::SessionStartLimit;
use std::time::Duration;
use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};

/// Discord's IDENTIFY concurrency rule allows one identify per bucket per
/// five seconds; matches the teacher's hardcoded pacing constant.
const BUCKET_SPACING: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Budget {
    total: u64,
    remaining: u64,
    reset_at: Instant,
}

impl Budget {
    fn from_limit(info: &SessionStartLimit) -> Self {
        Self {
            total: info.total,
            remaining: info.remaining,
            reset_at: Instant::now() + Duration::from_millis(info.reset_after),
        }
    }
}

/// Gates `IDENTIFY` attempts across every shard in a cluster against
/// Discord's daily session-start budget and per-bucket concurrency limit.
#[derive(Debug)]
pub struct SessionStartLimiter {
    budget: Mutex<Budget>,
    max_concurrency: u64,
    buckets: Vec<Mutex<Instant>>,
}

impl SessionStartLimiter {
    #[must_use]
    pub fn new(info: &SessionStartLimit) -> Self {
        let max_concurrency = info.max_concurrency.max(1);
        let now = Instant::now();
        let buckets = (0..max_concurrency).map(|_| Mutex::new(now)).collect();

        Self {
            budget: Mutex::new(Budget::from_limit(info)),
            max_concurrency,
            buckets,
        }
    }

    #[must_use]
    pub fn max_concurrency(&self) -> u64 {
        self.max_concurrency
    }

    /// Replace the tracked budget with a fresh `GET /gateway/bot` reading,
    /// the way the teacher's `DayLimiter` re-fetches once its local copy
    /// runs out.
    pub async fn refresh(&self, info: &SessionStartLimit) {
        *self.budget.lock().await = Budget::from_limit(info);
    }

    /// Resolve once `shard_id` is clear to send `IDENTIFY`: its
    /// concurrency bucket has gone quiet for [`BUCKET_SPACING`], and the
    /// daily budget has room (waiting out the reset if it doesn't).
    pub async fn acquire(&self, shard_id: u64) {
        let bucket_index = usize::try_from(shard_id % self.max_concurrency).unwrap_or_default();
        let mut next_allowed = self.buckets[bucket_index].lock().await;
        let now = Instant::now();
        if *next_allowed > now {
            sleep(*next_allowed - now).await;
        }
        *next_allowed = Instant::now() + BUCKET_SPACING;
        drop(next_allowed);

        let mut budget = self.budget.lock().await;
        if budget.remaining == 0 {
            let now = Instant::now();
            if budget.reset_at > now {
                let wait = budget.reset_at - now;
                drop(budget);
                sleep(wait).await;
                budget = self.budget.lock().await;
            }
            budget.remaining = budget.total;
        }
        budget.remaining = budget.remaining.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(total: u64, remaining: u64, max_concurrency: u64) -> SessionStartLimit {
        SessionStartLimit {
            total,
            remaining,
            reset_after: 1000,
            max_concurrency,
        }
    }

    #[tokio::test]
    async fn distinct_buckets_do_not_block_each_other() {
        let limiter = SessionStartLimiter::new(&limit(10, 10, 2));

        // Shards 0 and 1 land in different buckets, so neither waits on
        // the other's spacing window.
        tokio::time::timeout(Duration::from_millis(200), async {
            limiter.acquire(0).await;
            limiter.acquire(1).await;
        })
        .await
        .expect("distinct buckets must not serialize");
    }

    #[tokio::test]
    async fn budget_exhaustion_waits_for_reset_then_restores_total() {
        let limiter = SessionStartLimiter::new(&limit(1, 1, 1));
        limiter.acquire(0).await;

        let budget = limiter.budget.lock().await;
        assert_eq!(budget.remaining, 0);
    }
}
