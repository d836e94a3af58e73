//! Append-only audit records: provider events and sent communications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CampaignId, CommunicationId, ContactId, EventId, RecipientId};

/// The internal event vocabulary the reconciler maps provider callbacks onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
    Replied,
}

/// One provider callback, preserved even when its aggregate effect was
/// deduplicated away. The event log is the durable history behind the
/// campaign counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEvent {
    pub id: EventId,
    pub kind: EventKind,
    /// The provider message id the event refers to.
    pub provider_id: String,
    pub recipient_id: RecipientId,
    /// Free-form event detail, e.g. a clicked URL.
    pub metadata: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl EmailEvent {
    #[must_use]
    pub fn new(
        kind: EventKind,
        provider_id: impl Into<String>,
        recipient_id: RecipientId,
        metadata: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            kind,
            provider_id: provider_id.into(),
            recipient_id,
            metadata,
            occurred_at,
        }
    }
}

/// Audit row for one person actually reached by a send.
///
/// Staff outreach writes one row per distinct staff contact reached, or a
/// single fallback-flagged row when the mail went to the superior directly;
/// this is what lets staff engagement roll up to the represented contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Communication {
    pub id: CommunicationId,
    pub campaign_id: CampaignId,
    pub recipient_id: RecipientId,
    /// The contact whose inbox the mail landed in.
    pub contact_id: ContactId,
    pub address: String,
    /// Set when staff outreach fell back to the represented contact.
    pub is_fallback: bool,
    pub sent_at: DateTime<Utc>,
}

impl Communication {
    #[must_use]
    pub fn new(
        campaign_id: CampaignId,
        recipient_id: RecipientId,
        contact_id: ContactId,
        address: impl Into<String>,
        is_fallback: bool,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CommunicationId::generate(),
            campaign_id,
            recipient_id,
            contact_id,
            address: address.into(),
            is_fallback,
            sent_at,
        }
    }
}
