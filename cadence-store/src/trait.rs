//! The storage abstraction the dispatch engine runs against.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    campaign::Campaign,
    contact::{Contact, ContactEdges},
    error::Result,
    event::{Communication, EmailEvent},
    recipient::Recipient,
    sequence::{EmailTemplate, SequenceStep},
    suppression::EmailSuppression,
    types::{CampaignId, ContactId, RecipientId, TemplateId},
};

/// Durable state behind the dispatch engine.
///
/// Everything the engine persists goes through this trait, consumed as an
/// `Arc<dyn Store>`. Implementations must be safe for concurrent use; the
/// engine treats each single-row update as its unit of atomicity, so a run
/// interrupted between updates leaves a consistent store.
///
/// Add operations enforce the write-boundary invariants (`WriteError`):
/// recipient lists mutate only on Draft campaigns, one recipient per
/// (campaign, contact), no staff routing for staff-typed contacts, and
/// contiguous 0-indexed sequence steps.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    // Campaigns

    async fn add_campaign(&self, campaign: Campaign) -> Result<()>;

    async fn campaign(&self, id: &CampaignId) -> Result<Campaign>;

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Scheduled campaigns whose `scheduled_at` is at or before `now`.
    async fn due_scheduled_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    // Recipients

    /// Add a recipient row, enforcing the add-time invariants.
    async fn add_recipient(&self, recipient: Recipient) -> Result<()>;

    async fn recipient(&self, id: &RecipientId) -> Result<Recipient>;

    async fn update_recipient(&self, recipient: &Recipient) -> Result<()>;

    /// All recipient rows of a campaign.
    async fn campaign_recipients(&self, campaign: &CampaignId) -> Result<Vec<Recipient>>;

    /// Rows still eligible for a one-time send: never sent, never skipped.
    async fn unsent_recipients(&self, campaign: &CampaignId) -> Result<Vec<Recipient>>;

    /// The recipient a provider message id belongs to, if any.
    async fn recipient_by_provider_id(&self, provider_id: &str) -> Result<Option<Recipient>>;

    /// Recipients of Sending drip campaigns whose `next_send_at` is due.
    async fn due_drip_recipients(&self, now: DateTime<Utc>) -> Result<Vec<Recipient>>;

    // Sequences and templates

    async fn add_template(&self, template: EmailTemplate) -> Result<()>;

    async fn template(&self, id: &TemplateId) -> Result<EmailTemplate>;

    /// Append a sequence step; `step_order` must be the next contiguous slot.
    async fn add_sequence_step(&self, step: SequenceStep) -> Result<()>;

    /// A campaign's steps, ordered by `step_order`.
    async fn sequence_steps(&self, campaign: &CampaignId) -> Result<Vec<SequenceStep>>;

    // Contacts

    async fn add_contact(&self, contact: Contact) -> Result<()>;

    /// A contact joined with its canonical superior and active staff.
    async fn contact_edges(&self, id: &ContactId) -> Result<ContactEdges>;

    // Suppression

    /// The subset of `addresses` (already lowercased) that is suppressed.
    async fn suppressed(&self, addresses: &HashSet<String>) -> Result<HashSet<String>>;

    /// Insert a suppression entry; a no-op if the address is already listed.
    async fn add_suppression(&self, entry: EmailSuppression) -> Result<()>;

    // Audit

    async fn append_event(&self, event: EmailEvent) -> Result<()>;

    async fn add_communication(&self, communication: Communication) -> Result<()>;
}
