//! The suppression list: addresses that must never receive campaign mail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an address was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuppressionReason {
    Unsubscribe,
    Bounce,
    Complaint,
    Manual,
}

/// A suppressed address. `email` is stored lowercased; the store keys the
/// table by it, so inserts are idempotent per address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSuppression {
    pub email: String,
    pub reason: SuppressionReason,
    pub created_at: DateTime<Utc>,
}

impl EmailSuppression {
    /// Create an entry, normalizing the address.
    #[must_use]
    pub fn new(email: &str, reason: SuppressionReason, created_at: DateTime<Utc>) -> Self {
        Self {
            email: normalize_email(email),
            reason,
            created_at,
        }
    }
}

/// Canonical form used for every address comparison in the engine:
/// trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_email("  Rep.Smith@Example.GOV "), "rep.smith@example.gov");
        assert_eq!(normalize_email("already@lower.org"), "already@lower.org");
    }

    #[test]
    fn test_entry_is_normalized() {
        let entry = EmailSuppression::new("Bounced@Example.COM", SuppressionReason::Bounce, Utc::now());
        assert_eq!(entry.email, "bounced@example.com");
    }
}
