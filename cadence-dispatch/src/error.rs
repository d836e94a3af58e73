//! Typed error handling for dispatch operations.
//!
//! Validation errors surface synchronously, before any send attempt.
//! Per-recipient transport failures never appear here: they are recorded in
//! the run summary so one bad address cannot abort a batch.

use thiserror::Error;

use cadence_store::{CampaignId, CampaignStatus, StoreError};

/// Top-level dispatch error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested operation is invalid for the campaign's current state.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The store rejected or failed an operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Preconditions checked before a run touches the transport.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Subject and body are required before any send attempt.
    #[error("campaign {0} is missing a subject or body")]
    MissingContent(CampaignId),

    /// A send needs at least one recipient that has not been processed.
    #[error("campaign {0} has no unsent recipients")]
    NoRecipients(CampaignId),

    /// The campaign's status does not permit the requested operation.
    #[error("campaign {campaign} cannot be sent while {status:?}")]
    InvalidStatus {
        campaign: CampaignId,
        status: CampaignStatus,
    },

    /// Drip operations only apply to drip campaigns.
    #[error("campaign {0} is not a drip sequence")]
    NotDripSequence(CampaignId),

    /// A drip campaign cannot start without steps.
    #[error("campaign {0} has no sequence steps")]
    NoSteps(CampaignId),
}
