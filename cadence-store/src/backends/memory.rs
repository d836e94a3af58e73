use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Store, StoreError,
    campaign::{Campaign, CampaignStatus, CampaignType},
    contact::{Contact, ContactEdges},
    error::{Result, WriteError},
    event::{Communication, EmailEvent},
    recipient::Recipient,
    sequence::{EmailTemplate, SequenceStep},
    suppression::{EmailSuppression, normalize_email},
    types::{CampaignId, ContactId, RecipientId, TemplateId},
};

#[derive(Debug, Default)]
struct Tables {
    campaigns: HashMap<CampaignId, Campaign>,
    recipients: HashMap<RecipientId, Recipient>,
    contacts: HashMap<ContactId, Contact>,
    templates: HashMap<TemplateId, EmailTemplate>,
    steps: HashMap<CampaignId, Vec<SequenceStep>>,
    suppressions: HashMap<String, EmailSuppression>,
    events: Vec<EmailEvent>,
    communications: Vec<Communication>,
}

/// In-memory store implementation
///
/// All tables live in a single `RwLock`, so every operation observes a
/// consistent snapshot. Primarily intended for testing and for single-node
/// deployments where the campaign state is small.
///
/// # Concurrency
/// Uses an `RwLock` for interior mutability; the engine's unit of atomicity
/// is a single-row update, which maps onto one write-lock acquisition here.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every appended provider event, in arrival order.
    ///
    /// Test support; recovers gracefully if the lock is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<EmailEvent> {
        self.tables
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .events
            .clone()
    }

    /// Every communication audit row, in append order.
    #[must_use]
    pub fn communications(&self) -> Vec<Communication> {
        self.tables
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .communications
            .clone()
    }

    /// Current number of suppression entries.
    #[must_use]
    pub fn suppression_len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .suppressions
            .len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add_campaign(&self, campaign: Campaign) -> Result<()> {
        self.tables
            .write()?
            .campaigns
            .insert(campaign.id.clone(), campaign);
        Ok(())
    }

    async fn campaign(&self, id: &CampaignId) -> Result<Campaign> {
        self.tables
            .read()?
            .campaigns
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::CampaignNotFound(id.clone()))
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()> {
        let mut tables = self.tables.write()?;
        if !tables.campaigns.contains_key(&campaign.id) {
            return Err(StoreError::CampaignNotFound(campaign.id.clone()));
        }
        tables
            .campaigns
            .insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    async fn due_scheduled_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let tables = self.tables.read()?;
        let mut due: Vec<_> = tables
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Scheduled)
            .filter(|c| c.scheduled_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(due)
    }

    async fn add_recipient(&self, recipient: Recipient) -> Result<()> {
        let mut tables = self.tables.write()?;

        let campaign = tables
            .campaigns
            .get(&recipient.campaign_id)
            .ok_or_else(|| StoreError::CampaignNotFound(recipient.campaign_id.clone()))?;
        if !campaign.accepts_recipients() {
            return Err(WriteError::CampaignNotDraft(recipient.campaign_id.clone()).into());
        }

        let contact = tables
            .contacts
            .get(&recipient.contact_id)
            .ok_or_else(|| StoreError::ContactNotFound(recipient.contact_id.clone()))?;
        if recipient.email_staff && contact.contact_type == crate::contact::ContactType::Staff {
            return Err(WriteError::StaffOfStaff(recipient.contact_id.clone()).into());
        }

        let duplicate = tables.recipients.values().any(|r| {
            r.campaign_id == recipient.campaign_id && r.contact_id == recipient.contact_id
        });
        if duplicate {
            return Err(WriteError::DuplicateRecipient {
                campaign: recipient.campaign_id.clone(),
                contact: recipient.contact_id.clone(),
            }
            .into());
        }

        if let Some(campaign) = tables.campaigns.get_mut(&recipient.campaign_id) {
            campaign.totals.recipients += 1;
        }
        tables.recipients.insert(recipient.id.clone(), recipient);
        Ok(())
    }

    async fn recipient(&self, id: &RecipientId) -> Result<Recipient> {
        self.tables
            .read()?
            .recipients
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RecipientNotFound(id.clone()))
    }

    async fn update_recipient(&self, recipient: &Recipient) -> Result<()> {
        let mut tables = self.tables.write()?;
        if !tables.recipients.contains_key(&recipient.id) {
            return Err(StoreError::RecipientNotFound(recipient.id.clone()));
        }
        tables
            .recipients
            .insert(recipient.id.clone(), recipient.clone());
        Ok(())
    }

    async fn campaign_recipients(&self, campaign: &CampaignId) -> Result<Vec<Recipient>> {
        let tables = self.tables.read()?;
        let mut rows: Vec<_> = tables
            .recipients
            .values()
            .filter(|r| &r.campaign_id == campaign)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn unsent_recipients(&self, campaign: &CampaignId) -> Result<Vec<Recipient>> {
        Ok(self
            .campaign_recipients(campaign)
            .await?
            .into_iter()
            .filter(Recipient::unsent)
            .collect())
    }

    async fn recipient_by_provider_id(&self, provider_id: &str) -> Result<Option<Recipient>> {
        Ok(self
            .tables
            .read()?
            .recipients
            .values()
            .find(|r| r.provider_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn due_drip_recipients(&self, now: DateTime<Utc>) -> Result<Vec<Recipient>> {
        let tables = self.tables.read()?;
        let mut due: Vec<_> = tables
            .recipients
            .values()
            .filter(|r| r.next_send_at.is_some_and(|at| at <= now))
            .filter(|r| {
                tables.campaigns.get(&r.campaign_id).is_some_and(|c| {
                    c.campaign_type == CampaignType::DripSequence
                        && c.status == CampaignStatus::Sending
                })
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(due)
    }

    async fn add_template(&self, template: EmailTemplate) -> Result<()> {
        self.tables
            .write()?
            .templates
            .insert(template.id.clone(), template);
        Ok(())
    }

    async fn template(&self, id: &TemplateId) -> Result<EmailTemplate> {
        self.tables
            .read()?
            .templates
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::TemplateNotFound(id.clone()))
    }

    async fn add_sequence_step(&self, step: SequenceStep) -> Result<()> {
        let mut tables = self.tables.write()?;

        let campaign = tables
            .campaigns
            .get(&step.campaign_id)
            .ok_or_else(|| StoreError::CampaignNotFound(step.campaign_id.clone()))?;
        if campaign.campaign_type != CampaignType::DripSequence {
            return Err(WriteError::NotDripSequence(step.campaign_id.clone()).into());
        }

        let steps = tables.steps.entry(step.campaign_id.clone()).or_default();
        let expected = u32::try_from(steps.len()).unwrap_or(u32::MAX);
        if step.step_order != expected {
            return Err(WriteError::NonContiguousStep {
                campaign: step.campaign_id.clone(),
                order: step.step_order,
            }
            .into());
        }
        steps.push(step);
        Ok(())
    }

    async fn sequence_steps(&self, campaign: &CampaignId) -> Result<Vec<SequenceStep>> {
        let mut steps = self
            .tables
            .read()?
            .steps
            .get(campaign)
            .cloned()
            .unwrap_or_default();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn add_contact(&self, contact: Contact) -> Result<()> {
        self.tables
            .write()?
            .contacts
            .insert(contact.id.clone(), contact);
        Ok(())
    }

    async fn contact_edges(&self, id: &ContactId) -> Result<ContactEdges> {
        let tables = self.tables.read()?;
        let contact = tables
            .contacts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ContactNotFound(id.clone()))?;

        let superior = match contact.canonical_superior_edge() {
            Some(edge) => Some(
                tables
                    .contacts
                    .get(&edge.superior)
                    .cloned()
                    .ok_or_else(|| StoreError::ContactNotFound(edge.superior.clone()))?,
            ),
            None => None,
        };

        let mut staff = Vec::new();
        for edge in contact.active_staff_edges() {
            staff.push(
                tables
                    .contacts
                    .get(&edge.staff)
                    .cloned()
                    .ok_or_else(|| StoreError::ContactNotFound(edge.staff.clone()))?,
            );
        }

        Ok(ContactEdges {
            contact,
            superior,
            staff,
        })
    }

    async fn suppressed(&self, addresses: &HashSet<String>) -> Result<HashSet<String>> {
        let tables = self.tables.read()?;
        Ok(addresses
            .iter()
            .filter(|addr| tables.suppressions.contains_key(&normalize_email(addr)))
            .map(|addr| normalize_email(addr))
            .collect())
    }

    async fn add_suppression(&self, entry: EmailSuppression) -> Result<()> {
        self.tables
            .write()?
            .suppressions
            .entry(entry.email.clone())
            .or_insert(entry);
        Ok(())
    }

    async fn append_event(&self, event: EmailEvent) -> Result<()> {
        self.tables.write()?.events.push(event);
        Ok(())
    }

    async fn add_communication(&self, communication: Communication) -> Result<()> {
        self.tables.write()?.communications.push(communication);
        Ok(())
    }
}
