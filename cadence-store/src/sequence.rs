//! Drip-sequence steps and the templates they reference.

use serde::{Deserialize, Serialize};

use crate::types::{CampaignId, TemplateId};

/// A reusable email template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: TemplateId,
    pub name: String,
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: TemplateId::generate(),
            name: name.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// One step of a drip sequence.
///
/// Steps are 0-indexed, contiguous, and unique per campaign (enforced at add
/// time). `delay_days` counts from the *previous* step's send: the scheduler
/// uses the step at the recipient's new cursor to compute the next due time,
/// so step 0's delay only matters when the campaign is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStep {
    pub campaign_id: CampaignId,
    pub step_order: u32,
    pub template_id: TemplateId,
    /// Overrides the template subject when set.
    pub subject: Option<String>,
    /// Overrides the template body when set.
    pub body: Option<String>,
    pub delay_days: u32,
}

impl SequenceStep {
    #[must_use]
    pub fn new(
        campaign_id: CampaignId,
        step_order: u32,
        template_id: TemplateId,
        delay_days: u32,
    ) -> Self {
        Self {
            campaign_id,
            step_order,
            template_id,
            subject: None,
            body: None,
            delay_days,
        }
    }

    /// The subject actually sent for this step.
    #[must_use]
    pub fn effective_subject<'a>(&'a self, template: &'a EmailTemplate) -> &'a str {
        self.subject.as_deref().unwrap_or(&template.subject)
    }

    /// The body actually sent for this step.
    #[must_use]
    pub fn effective_body<'a>(&'a self, template: &'a EmailTemplate) -> &'a str {
        self.body.as_deref().unwrap_or(&template.body)
    }
}
