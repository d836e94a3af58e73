//! The delivery-provider boundary.
//!
//! The engine treats the provider as a black box: one call delivers one
//! message to one or more addresses and yields an opaque message id. The
//! engine owns only the retry/backoff behavior around the call, driven by
//! the transient/permanent split below.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use thiserror::Error;

/// One outbound message, fully rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailOutline {
    pub from: String,
    /// One or more destination addresses; a staff-outreach send carries the
    /// whole staff set in a single outline.
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Transport failure, categorized for retry decisions.
///
/// Transient failures (rate limits, timeouts, provider hiccups) are worth
/// retrying with backoff; everything else fails the attempt immediately.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The provider asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call timed out.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The provider is temporarily unavailable.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the message (bad address, policy, …).
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The request itself was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns `true` if a retry with backoff may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

/// A delivery provider client.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send one message.
    ///
    /// # Errors
    /// Returns a [`TransportError`] describing why the provider did not
    /// accept the message.
    async fn send(&self, outline: &MailOutline) -> Result<String, TransportError>;
}

/// Scriptable in-memory transport for tests.
///
/// Records every outline it is asked to send. Outcomes can be enqueued ahead
/// of time; once the queue is empty every send succeeds with a generated
/// provider id.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<MailOutline>>>,
    responses: Arc<Mutex<VecDeque<Result<String, TransportError>>>>,
    counter: Arc<AtomicU64>,
}

impl MockTransport {
    /// Create a mock transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next un-scripted send.
    ///
    /// # Panics
    /// Panics if the response mutex is poisoned.
    pub fn enqueue(&self, response: Result<String, TransportError>) {
        self.responses
            .lock()
            .expect("MockTransport responses mutex poisoned")
            .push_back(response);
    }

    /// Every outline sent so far, in order.
    ///
    /// # Panics
    /// Panics if the sent mutex is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<MailOutline> {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .clone()
    }

    /// Number of transport calls made.
    ///
    /// # Panics
    /// Panics if the sent mutex is poisoned.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, outline: &MailOutline) -> Result<String, TransportError> {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .push(outline.clone());

        let scripted = self
            .responses
            .lock()
            .expect("MockTransport responses mutex poisoned")
            .pop_front();

        scripted.unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            Ok(format!("re_mock_{n}"))
        })
    }
}
