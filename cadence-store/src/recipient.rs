//! Per-campaign recipient rows.
//!
//! A recipient joins one contact to one campaign and accumulates everything
//! the engine learns about that pairing: transport outcome, engagement
//! timestamps, and (for drip campaigns) the step cursor. The stored `email`
//! is frozen at add time and stays a canonical, parseable address; transport
//! facts live in the structured `delivery_mode` / `resolved_addresses` /
//! `skip_reason` fields instead of being appended onto the address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CampaignId, ContactId, RecipientId};

/// How a recipient's mail was (or will be) routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Straight to the recipient's own address.
    Direct,
    /// To the contact's active staff, falling back to the contact.
    StaffOutreach,
}

/// Why a recipient was passed over without a transport call.
///
/// All skip states are terminal for the run that records them: the dispatch
/// executor never reconsiders a skipped row, so a recipient with no
/// deliverable target is not retried indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Every resolved address was on the suppression list.
    Suppressed,
    /// Every resolved address was already mailed earlier in the same run.
    DuplicateAddress,
    /// Staff outreach found no active staff and no usable contact address.
    NoDeliverableTarget,
}

/// One (campaign, contact) pairing and its accumulated delivery state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    /// Frozen at add time; never mutated afterwards.
    pub email: String,
    /// Route to the contact's staff instead of the contact.
    pub email_staff: bool,

    /// For one-time campaigns: set at most once, when the send succeeds.
    /// For drip campaigns: the send time of the most recent step.
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    /// Opaque provider message id from the most recent successful send.
    pub provider_id: Option<String>,

    pub delivery_mode: Option<DeliveryMode>,
    /// The concrete addresses the last successful send went to.
    pub resolved_addresses: Vec<String>,
    pub skip_reason: Option<SkipReason>,

    /// 0-indexed cursor into the campaign's ordered sequence steps.
    pub current_step: u32,
    /// When the step at `current_step` becomes due. `None` means the
    /// sequence is complete, terminally skipped, or not yet started.
    pub next_send_at: Option<DateTime<Utc>>,
}

impl Recipient {
    /// Create a fresh, unsent recipient row.
    #[must_use]
    pub fn new(
        campaign_id: CampaignId,
        contact_id: ContactId,
        email: impl Into<String>,
        email_staff: bool,
    ) -> Self {
        Self {
            id: RecipientId::generate(),
            campaign_id,
            contact_id,
            email: email.into(),
            email_staff,
            sent_at: None,
            opened_at: None,
            clicked_at: None,
            bounced_at: None,
            replied_at: None,
            provider_id: None,
            delivery_mode: None,
            resolved_addresses: Vec::new(),
            skip_reason: None,
            current_step: 0,
            next_send_at: None,
        }
    }

    /// Whether this row is still a candidate for a one-time send.
    #[must_use]
    pub const fn unsent(&self) -> bool {
        self.sent_at.is_none() && self.skip_reason.is_none()
    }

    /// Record a successful transport call.
    pub fn record_sent(
        &mut self,
        mode: DeliveryMode,
        addresses: Vec<String>,
        provider_id: String,
        at: DateTime<Utc>,
    ) {
        self.sent_at = Some(at);
        self.provider_id = Some(provider_id);
        self.delivery_mode = Some(mode);
        self.resolved_addresses = addresses;
    }

    /// Record a terminal skip.
    pub fn record_skipped(&mut self, mode: DeliveryMode, reason: SkipReason) {
        self.delivery_mode = Some(mode);
        self.skip_reason = Some(reason);
        self.next_send_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> Recipient {
        Recipient::new(
            CampaignId::generate(),
            ContactId::generate(),
            "Rep.Smith@example.gov",
            false,
        )
    }

    #[test]
    fn test_new_recipient_is_unsent() {
        let r = recipient();
        assert!(r.unsent());
        assert_eq!(r.current_step, 0);
        assert!(r.next_send_at.is_none());
    }

    #[test]
    fn test_record_sent_freezes_email() {
        let mut r = recipient();
        let original_email = r.email.clone();
        r.record_sent(
            DeliveryMode::Direct,
            vec!["rep.smith@example.gov".into()],
            "re_123".into(),
            Utc::now(),
        );

        assert!(!r.unsent());
        assert_eq!(r.email, original_email);
        assert_eq!(r.provider_id.as_deref(), Some("re_123"));
        assert_eq!(r.resolved_addresses, vec!["rep.smith@example.gov"]);
    }

    #[test]
    fn test_record_skipped_is_terminal() {
        let mut r = recipient();
        r.next_send_at = Some(Utc::now());
        r.record_skipped(DeliveryMode::StaffOutreach, SkipReason::NoDeliverableTarget);

        assert!(!r.unsent());
        assert!(r.next_send_at.is_none());
        assert_eq!(r.skip_reason, Some(SkipReason::NoDeliverableTarget));
    }
}
