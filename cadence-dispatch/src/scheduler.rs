//! The drip state machine.
//!
//! Per recipient the states are implicit in two columns: `current_step`
//! points at the next step to send, `next_send_at` says when it is due
//! (`None` = complete, terminally skipped, or not started). A periodic
//! external trigger calls [`DripScheduler::run_due`]; all durable state
//! lives in the store, so re-invocation after a crash is safe and pausing a
//! campaign freezes advancement simply by falling out of the due query.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use cadence_store::{
    CampaignId, CampaignStatus, EmailTemplate, Recipient, SkipReason, Store, TemplateId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::DispatchError,
    executor::{DispatchExecutor, Prepared, RunSummary, truncated},
    suppression::SuppressionSnapshot,
};

/// Outcome counts for one scheduler pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerSummary {
    /// Recipients selected by the due query.
    pub due: usize,
    /// Steps sent successfully.
    pub sent: usize,
    /// Recipients whose sequence finished (no step at the cursor).
    pub completed: usize,
    /// Terminal skips recorded this pass.
    pub skipped: usize,
    /// Transport failures; the rows stay due and retry on the next pass.
    pub failed: usize,
    /// Campaigns that transitioned Sending → Sent this pass.
    pub campaigns_completed: usize,
    pub errors: Vec<String>,
}

/// Polling-driven advancement of drip sequences.
#[derive(Debug, Clone)]
pub struct DripScheduler {
    store: Arc<dyn Store>,
    executor: DispatchExecutor,
}

impl DripScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, executor: DispatchExecutor) -> Self {
        Self { store, executor }
    }

    /// Advance every due recipient of every Sending drip campaign.
    ///
    /// Failures are isolated per campaign: one campaign's error is recorded
    /// and the pass continues with the rest.
    pub async fn run_due(&self, now: DateTime<Utc>) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();

        let due = match self.store.due_drip_recipients(now).await {
            Ok(due) => due,
            Err(error) => {
                tracing::error!(error = %error, "due-recipient query failed");
                summary.errors.push(truncated(&error.to_string()));
                return summary;
            }
        };
        summary.due = due.len();
        if due.is_empty() {
            return summary;
        }

        let snapshot = match self.executor.load_snapshot(&due).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::error!(error = %error, "suppression snapshot failed");
                summary.errors.push(truncated(&error.to_string()));
                return summary;
            }
        };

        let mut by_campaign: BTreeMap<CampaignId, Vec<Recipient>> = BTreeMap::new();
        for recipient in due {
            by_campaign
                .entry(recipient.campaign_id.clone())
                .or_default()
                .push(recipient);
        }

        cadence_common::dispatch!(
            level = INFO,
            "drip pass: {} recipients due across {} campaigns",
            summary.due,
            by_campaign.len()
        );

        // One address-dedup set per pass, shared across campaigns, so two
        // rows resolving to the same inbox yield one message per pass.
        let mut dedup: HashSet<String> = HashSet::new();

        for (campaign_id, rows) in by_campaign {
            if let Err(error) = self
                .advance_campaign(&campaign_id, rows, &snapshot, &mut dedup, now, &mut summary)
                .await
            {
                tracing::error!(
                    campaign = %campaign_id,
                    error = %error,
                    "drip advancement failed"
                );
                summary
                    .errors
                    .push(truncated(&format!("{campaign_id}: {error}")));
            }
        }

        summary
    }

    async fn advance_campaign(
        &self,
        campaign_id: &CampaignId,
        rows: Vec<Recipient>,
        snapshot: &SuppressionSnapshot,
        dedup: &mut HashSet<String>,
        now: DateTime<Utc>,
        summary: &mut SchedulerSummary,
    ) -> Result<(), DispatchError> {
        let mut campaign = self.store.campaign(campaign_id).await?;
        let steps = self.store.sequence_steps(campaign_id).await?;
        let mut templates: HashMap<TemplateId, EmailTemplate> = HashMap::new();
        let mut sent_this_campaign = 0u64;

        for recipient in rows {
            let Some(step) = steps.get(recipient.current_step as usize) else {
                // Sequence exhausted: terminal, no send.
                let mut done = recipient;
                done.next_send_at = None;
                self.store.update_recipient(&done).await?;
                summary.completed += 1;
                continue;
            };

            if !templates.contains_key(&step.template_id) {
                let template = self.store.template(&step.template_id).await?;
                templates.insert(step.template_id.clone(), template);
            }
            let Some(template) = templates.get(&step.template_id) else {
                continue;
            };
            let subject = step.effective_subject(template).to_string();
            let body = step.effective_body(template).to_string();

            match self
                .executor
                .prepare(recipient.clone(), snapshot, dedup)
                .await?
            {
                Prepared::Skip(mode, reason) => {
                    if reason == SkipReason::DuplicateAddress {
                        // The inbox was already mailed this pass (possibly by
                        // another campaign); leave the row due and let the
                        // next pass retry with its own dedup set.
                        tracing::debug!(
                            recipient = %recipient.id,
                            "destination already mailed this pass, deferring step"
                        );
                        continue;
                    }
                    let mut run = RunSummary::default();
                    self.executor
                        .persist_skip(recipient, mode, reason, &mut run)
                        .await;
                    summary.skipped += run.skipped;
                }
                Prepared::Ready(pending) => {
                    match self.executor.execute(*pending, &subject, &body, now).await {
                        Ok(mut sent) => {
                            sent.current_step += 1;
                            sent.next_send_at = steps
                                .get(sent.current_step as usize)
                                .map(|next| now + chrono::Duration::days(i64::from(next.delay_days)));
                            self.store.update_recipient(&sent).await?;
                            summary.sent += 1;
                            sent_this_campaign += 1;
                        }
                        Err(failure) => {
                            // Row stays due; the next trigger retries the step.
                            summary.failed += 1;
                            if summary.errors.len() < self.executor.config().max_reported_errors {
                                summary.errors.push(truncated(&format!(
                                    "{}: {}",
                                    failure.recipient, failure.message
                                )));
                            }
                        }
                    }
                }
            }
        }

        let mut dirty = false;
        if sent_this_campaign > 0 {
            campaign.totals.sent += sent_this_campaign;
            dirty = true;
        }

        // Whole-campaign completion is decided here, not in the send path:
        // the campaign is Sent once no recipient has a pending due time.
        if campaign.status == CampaignStatus::Sending {
            let rows = self.store.campaign_recipients(campaign_id).await?;
            if rows.iter().all(|r| r.next_send_at.is_none()) {
                campaign.status = CampaignStatus::Sent;
                dirty = true;
                summary.campaigns_completed += 1;
                tracing::info!(campaign = %campaign_id, "drip campaign complete");
            }
        }
        if dirty {
            self.store.update_campaign(&campaign).await?;
        }

        Ok(())
    }
}
