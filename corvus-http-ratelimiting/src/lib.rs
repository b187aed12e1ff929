//! Ratelimiting primitives backing the Corvus REST pipeline.
//!
//! Discord ratelimits requests both globally and per-route.
//! This crate defines a [`Ratelimiter`] trait and the default
//! [`InMemoryRatelimiter`] implementation; `corvus-http` is the only
//! consumer, routing requests through whichever `Ratelimiter` its
//! [`Client`](https://docs.rs/corvus-http) is configured with.

pub mod headers;
pub mod in_memory;
pub mod request;
pub mod ticket;

pub use self::{
    headers::RatelimitHeaders,
    in_memory::InMemoryRatelimiter,
    request::{Method, Path},
};

pub use corvus_model::Snowflake;

use self::ticket::TicketReceiver;
use std::{
    error::Error,
    fmt::Debug,
    future::Future,
    pin::Pin,
    time::{Duration, Instant},
};

/// A generic boxed error, used where a custom [`Ratelimiter`] backend (e.g.
/// one backed by a shared database for a multi-process bot) may fail in
/// ways this crate can't predict.
pub type GenericError = Box<dyn Error + Send + Sync>;

pub type GetBucketFuture =
    Pin<Box<dyn Future<Output = Result<Option<Bucket>, GenericError>> + Send + 'static>>;
pub type IsGloballyLockedFuture =
    Pin<Box<dyn Future<Output = Result<bool, GenericError>> + Send + 'static>>;
pub type HasBucketFuture = Pin<Box<dyn Future<Output = Result<bool, GenericError>> + Send + 'static>>;
pub type GetTicketFuture =
    Pin<Box<dyn Future<Output = Result<TicketReceiver, GenericError>> + Send + 'static>>;

/// A snapshot of a [`Path`]'s ratelimit state, per the "Bucket" record.
#[derive(Clone, Copy, Debug)]
pub struct Bucket {
    limit: u64,
    remaining: u64,
    reset_after: Duration,
    started_at: Option<Instant>,
}

impl Bucket {
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    pub const fn reset_after(&self) -> Duration {
        self.reset_after
    }

    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// How long until the bucket refreshes, or `None` if it already has or
    /// the countdown hasn't started.
    pub fn time_remaining(&self) -> Option<Duration> {
        let reset_at = self.started_at? + self.reset_after;
        reset_at.checked_duration_since(Instant::now)
    }
}

/// A pluggable backend tracking per-route and global ratelimit state.
///
/// [`InMemoryRatelimiter`] is the only implementation `corvus-http` ships,
/// but the trait exists (as the teacher's does) so a multi-process bot can
/// swap in a shared-storage backend without touching the REST pipeline.
pub trait Ratelimiter: Debug + Send + Sync {
    /// Current bucket state for a route, if any requests have been made on
    /// it yet.
    fn bucket(&self, path: &Path) -> GetBucketFuture;

    /// Whether the pipeline is currently globally ratelimited.
    fn globally_locked(&self) -> IsGloballyLockedFuture;

    /// Whether a bucket has been recorded for this route yet.
    fn has(&self, path: &Path) -> HasBucketFuture;

    /// Request a ticket to send on this route. The returned future
    /// resolves to a [`TicketReceiver`], which itself resolves once the
    /// ratelimiter grants permission to send.
    fn ticket(&self, path: Path) -> GetTicketFuture;
}
