//! Campaign records and lifecycle.
//!
//! A campaign is either a one-time blast or a drip sequence. Lifecycle:
//! Draft → (Scheduled) → Sending → Sent, with Paused reachable only for
//! drip sequences. Aggregate counters are maintained by the dispatch
//! executor and the event reconciler; the underlying event log remains the
//! durable record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CampaignId;

/// What kind of send a campaign performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignType {
    /// A single send to every recipient.
    OneTime,
    /// An ordered multi-step sequence, advanced by the drip scheduler.
    DripSequence,
}

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    /// Frozen drip advancement; only valid for [`CampaignType::DripSequence`].
    Paused,
}

/// Aggregate engagement counters, maintained first-occurrence-wins by the
/// event reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTotals {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub replied: u64,
    pub recipients: u64,
}

/// A campaign definition plus its aggregate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub campaign_type: CampaignType,
    pub status: CampaignStatus,
    /// Subject template; `{{key}}` tokens are substituted per recipient.
    pub subject: String,
    /// HTML body template.
    pub body: String,
    /// When a Scheduled campaign becomes due for the periodic trigger.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub totals: CampaignTotals,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new draft campaign.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        campaign_type: CampaignType,
        subject: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CampaignId::generate(),
            name: name.into(),
            campaign_type,
            status: CampaignStatus::Draft,
            subject: subject.into(),
            body: body.into(),
            scheduled_at: None,
            totals: CampaignTotals::default(),
            created_at,
        }
    }

    /// Whether the campaign carries the subject and body every send requires.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.subject.trim().is_empty() && !self.body.trim().is_empty()
    }

    /// Whether the recipient list may still be mutated.
    #[must_use]
    pub fn accepts_recipients(&self) -> bool {
        self.status == CampaignStatus::Draft
    }

    /// Whether a send run may begin from the current status.
    ///
    /// Sending is re-entrant: a run interrupted mid-way leaves the campaign
    /// Sending, and the next run picks up the remaining unsent recipients.
    #[must_use]
    pub fn sendable(&self) -> bool {
        matches!(
            self.status,
            CampaignStatus::Draft | CampaignStatus::Scheduled | CampaignStatus::Sending
        )
    }
}
