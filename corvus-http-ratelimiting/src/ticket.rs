//! Handshake a ratelimiter uses to tell a caller when it may send a request.
//!
//! 1. A caller asks a [`crate::Ratelimiter`] for a ticket and gets back a
//!    [`TicketReceiver`] to await.
//! 2. When the ratelimiter decides the request may proceed, it resolves the
//!    receiver into a [`TicketSender`].
//! 3. The caller performs the HTTP request, parses the response's ratelimit
//!    headers, and sends them back (or `None` on failure) via
//!    [`TicketSender::headers`], completing the cycle.

use crate::headers::RatelimitHeaders;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot::{self, error::RecvError, Receiver, Sender};

/// Awaited by the ratelimiter once it has notified a caller; resolves when
/// the caller reports back its response's ratelimit headers.
#[derive(Debug)]
pub struct TicketHeaders(Receiver<Option<RatelimitHeaders>>);

impl Future for TicketHeaders {
    type Output = Result<Option<RatelimitHeaders>, RecvError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// Held by the ratelimiter; consumed to unblock a waiting caller.
#[derive(Debug)]
pub struct TicketNotifier(Sender<Sender<Option<RatelimitHeaders>>>);

impl TicketNotifier {
    /// Tell the caller it may send its request now.
    ///
    /// Returns `None` if the caller already dropped its [`TicketReceiver`]
    /// (gave up waiting); the ratelimiter should treat the ticket as
    /// abandoned and not expect headers back for it.
    #[must_use]
    pub fn available(self) -> Option<TicketHeaders> {
        let (tx, rx) = oneshot::channel();
        self.0.send(tx).ok()?;
        Some(TicketHeaders(rx))
    }
}

/// Held by the caller while waiting for permission to send a request.
#[derive(Debug)]
pub struct TicketReceiver(Receiver<Sender<Option<RatelimitHeaders>>>);

impl Future for TicketReceiver {
    type Output = Result<TicketSender, RecvError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map_ok(TicketSender)
    }
}

/// Held by the caller after a ticket becomes available; used to report the
/// response's ratelimit headers back to the ratelimiter.
#[derive(Debug)]
pub struct TicketSender(Sender<Option<RatelimitHeaders>>);

impl TicketSender {
    /// Send the response's ratelimit headers (or `None` if the request
    /// failed before a response arrived) back to the ratelimiter.
    ///
    /// # Errors
    ///
    /// Returns the input if the ratelimiter already dropped its receiving
    /// half (e.g. it was torn down or timed out waiting).
    pub fn headers(
        self,
        headers: Option<RatelimitHeaders>,
    ) -> Result<(), Option<RatelimitHeaders>> {
        self.0.send(headers)
    }
}

/// Create a fresh ticket channel: the notifier half stays with the
/// ratelimiter, the receiver half goes to the caller.
#[must_use]
pub fn channel() -> (TicketNotifier, TicketReceiver) {
    let (tx, rx) = oneshot::channel();
    (TicketNotifier(tx), TicketReceiver(rx))
}
