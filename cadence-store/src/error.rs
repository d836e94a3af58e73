//! Error types for the cadence-store crate.

use thiserror::Error;

use crate::types::{CampaignId, ContactId, RecipientId, TemplateId};

/// Top-level store error type.
///
/// Categorizes failures into missing entities, rejected writes, and internal
/// errors so callers can distinguish "does not exist" from "not allowed".
#[derive(Debug, Error)]
pub enum StoreError {
    /// Campaign not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// Recipient not found.
    #[error("recipient not found: {0}")]
    RecipientNotFound(RecipientId),

    /// Contact not found.
    #[error("contact not found: {0}")]
    ContactNotFound(ContactId),

    /// Template not found.
    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// A write was rejected by an add-time invariant.
    #[error("invalid write: {0}")]
    InvalidWrite(#[from] WriteError),

    /// Internal error (lock poisoning, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Add-time invariant violations.
///
/// These guard the recipient-list and sequence invariants the dispatch engine
/// relies on: they are enforced here, at the write boundary, so the send path
/// never has to re-check them.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Recipient lists are frozen once a campaign leaves Draft.
    #[error("campaign {0} is not a draft; its recipient list is frozen")]
    CampaignNotDraft(CampaignId),

    /// One recipient row per (campaign, contact) pair.
    #[error("contact {contact} is already a recipient of campaign {campaign}")]
    DuplicateRecipient {
        campaign: CampaignId,
        contact: ContactId,
    },

    /// Staff-typed contacts cannot themselves be staff-routed.
    #[error("contact {0} is staff; staff outreach would loop")]
    StaffOfStaff(ContactId),

    /// Sequence steps must be contiguous and unique per campaign.
    #[error("campaign {campaign} step order {order} is not the next step")]
    NonContiguousStep { campaign: CampaignId, order: u32 },

    /// Sequence steps only attach to drip campaigns.
    #[error("campaign {0} is not a drip sequence")]
    NotDripSequence(CampaignId),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_conversion() {
        let id = CampaignId::generate();
        let err: StoreError = WriteError::CampaignNotDraft(id.clone()).into();
        assert!(matches!(err, StoreError::InvalidWrite(_)));
        assert!(err.to_string().contains(&id.to_string()));
    }
}
