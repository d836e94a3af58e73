//! Retry policy for transport calls.
//!
//! Encapsulates retry configuration and the backoff calculation so the
//! behavior can be tested independently of the dispatch executor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::{MailOutline, Transport, TransportError};

/// Retry policy for a single transport call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    ///
    /// Default: 3 (4 attempts total)
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay before retry `n` (0-indexed) is `base * 2^n`.
    ///
    /// Default: 1000 ms
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff delay (in milliseconds).
    ///
    /// Default: 30000 ms
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor for randomizing delays (±fraction of the delay).
    ///
    /// Default: 0.0 (no jitter)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Whether another retry may be attempted after `retries` so far.
    #[must_use]
    pub const fn should_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }

    /// The backoff delay before retry number `retry` (0-indexed).
    ///
    /// `base * 2^retry`, capped at `max_delay_ms`, with ±`jitter_factor`
    /// randomness applied when configured.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.min(63);
        let multiplier = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);

        if self.jitter_factor <= 0.0 {
            return Duration::from_millis(delay);
        }

        // Intentional precision loss and casting for randomization
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered = {
            use rand::Rng;
            let jitter_range = (delay as f64) * self.jitter_factor;
            let mut rng = rand::rng();
            let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
            ((delay as f64) + jitter).max(0.0) as u64
        };

        Duration::from_millis(jittered)
    }

    /// Send through `transport`, retrying transient failures with
    /// exponential backoff.
    ///
    /// Permanent failures return immediately without consuming retry budget.
    /// The failure is always returned to the caller, never panicked, so
    /// batch processing can continue with the remaining recipients.
    ///
    /// # Errors
    /// Returns the last [`TransportError`] once retries are exhausted, or
    /// the first permanent error encountered.
    pub async fn send_with_retry(
        &self,
        transport: &dyn Transport,
        outline: &MailOutline,
    ) -> Result<String, TransportError> {
        let mut retries = 0u32;

        loop {
            match transport.send(outline).await {
                Ok(id) => return Ok(id),
                Err(error) if error.is_transient() && self.should_retry(retries) => {
                    let delay = self.delay_for(retries);
                    tracing::warn!(
                        retry = retries + 1,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "transient transport failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

mod defaults {
    pub(super) const fn max_retries() -> u32 {
        3
    }

    pub(super) const fn base_delay_ms() -> u64 {
        1000
    }

    pub(super) const fn max_delay_ms() -> u64 {
        30000
    }

    pub(super) const fn jitter_factor() -> f64 {
        0.0
    }
}
