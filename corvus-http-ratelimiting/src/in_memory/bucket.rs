use crate::{headers::RatelimitHeaders, ticket::TicketNotifier};
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// The live ratelimit state for one [`Path`], plus the FIFO of callers
/// waiting to use it.
///
/// Spec §4.4's dispatch algorithm treats a bucket with no observed response
/// yet (`updated_at: None`) as unconstrained: every queued ticket dispatches
/// immediately until the first response establishes a real `limit`/
/// `remaining`.
#[derive(Debug)]
pub(super) struct Bucket {
    pub(super) queue: VecDeque<TicketNotifier>,
    limit: u64,
    remaining: u64,
    reset_after: Duration,
    retry_after: Duration,
    updated_at: Option<Instant>,
}

impl Bucket {
    pub(super) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            limit: 1,
            remaining: 1,
            reset_after: Duration::ZERO,
            retry_after: Duration::ZERO,
            updated_at: None,
        }
    }

    pub(super) fn snapshot(&self) -> crate::Bucket {
        crate::Bucket {
            limit: self.limit,
            remaining: self.remaining,
            reset_after: self.reset_after,
            started_at: self.updated_at,
        }
    }

    /// No bucket known yet → dispatch; a free slot → dispatch; enough time
    /// elapsed since the last response for the window to have reset →
    /// dispatch; otherwise the caller stays queued.
    pub(super) fn may_dispatch(&self, now: Instant) -> bool {
        match self.updated_at {
            None => true,
            Some(updated_at) => {
                self.remaining >= 1 || now > updated_at + self.reset_after.max(self.retry_after)
            }
        }
    }

    /// Called immediately after popping a ticket this tick decided to grant,
    /// so the next bucket in the same tick sees an up-to-date `remaining`.
    pub(super) fn record_dispatch(&mut self, now: Instant) {
        let Some(updated_at) = self.updated_at else {
            return;
        };

        if now > updated_at + self.reset_after.max(self.retry_after) {
            self.remaining = self.limit;
        }
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub(super) fn update_from_headers(&mut self, headers: &RatelimitHeaders) {
        if let RatelimitHeaders::Present(present) = headers {
            self.limit = present.limit();
            self.remaining = present.remaining();
            self.reset_after = Duration::from_millis(present.reset_after());
            self.updated_at = Some(Instant::now());
        }
    }
}
