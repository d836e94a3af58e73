//! Campaign send execution.
//!
//! The executor owns the send path shared by one-time campaigns and drip
//! steps: resolve → render → transport (with retry) → persist outcome. Each
//! recipient's persisted update is the unit of atomicity; an interrupted run
//! leaves the remaining rows unsent and safe to retry on the next trigger.

use std::{collections::HashSet, sync::Arc, time::Duration};

use cadence_store::{
    CampaignId, CampaignStatus, CampaignType, Communication, DeliveryMode, Recipient, RecipientId,
    SkipReason, Store, StoreError, normalize_email,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::{
    error::{DispatchError, ValidationError},
    merge::{MergeValues, render},
    resolver::resolve,
    retry::RetryPolicy,
    suppression::SuppressionSnapshot,
    transport::{MailOutline, Transport},
};

/// Surfaced error strings are truncated to this many characters so a large
/// run cannot return an unbounded payload.
const ERROR_DETAIL_MAX: usize = 200;

const fn default_batch_size() -> usize {
    10
}

const fn default_batch_pause_ms() -> u64 {
    1000
}

const fn default_max_reported_errors() -> usize {
    25
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Direct-mode batch width: how many recipients are in flight at once.
    ///
    /// This is a throughput ceiling for the transport provider's benefit,
    /// not a correctness requirement.
    ///
    /// Default: 10
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between direct-mode batches (in milliseconds).
    ///
    /// Default: 1000 ms
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Maximum number of error strings surfaced in a run summary.
    ///
    /// Default: 25
    #[serde(default = "default_max_reported_errors")]
    pub max_reported_errors: usize,

    /// Envelope sender for every outgoing message.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Retry policy for transport calls.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            max_reported_errors: default_max_reported_errors(),
            from_address: default_from_address(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome counts for one run, with a capped error list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub(crate) fn record_failure(&mut self, cap: usize, message: String) {
        self.failed += 1;
        if self.errors.len() < cap {
            self.errors.push(truncated(&message));
        }
    }
}

/// Truncate an error detail for inclusion in a summary payload.
pub(crate) fn truncated(message: &str) -> String {
    if message.chars().count() <= ERROR_DETAIL_MAX {
        message.to_string()
    } else {
        let mut out: String = message.chars().take(ERROR_DETAIL_MAX).collect();
        out.push('…');
        out
    }
}

/// A recipient that resolved to at least one fresh destination and is ready
/// for render + transport.
#[derive(Debug)]
pub(crate) struct PendingSend {
    pub(crate) recipient: Recipient,
    pub(crate) mode: DeliveryMode,
    pub(crate) destinations: Vec<String>,
    pub(crate) is_fallback: bool,
    pub(crate) reached: Vec<(cadence_store::ContactId, String)>,
    pub(crate) values: MergeValues,
}

/// The resolution verdict for one recipient within a run.
#[derive(Debug)]
pub(crate) enum Prepared {
    Ready(Box<PendingSend>),
    Skip(DeliveryMode, SkipReason),
}

/// A per-recipient failure, reported in the summary without aborting the run.
#[derive(Debug)]
pub(crate) struct DispatchFailure {
    pub(crate) recipient: RecipientId,
    pub(crate) message: String,
}

/// The send path shared by one-time campaigns and drip steps.
///
/// Holds the injected store and transport; cloning is cheap and clones share
/// both.
#[derive(Debug, Clone)]
pub struct DispatchExecutor {
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
}

impl DispatchExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, transport: Arc<dyn Transport>, config: ExecutorConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    pub(crate) const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a one-time send for a whole campaign.
    ///
    /// Direct-mode recipients go out in fixed-size batches with bounded
    /// parallelism and a pause between batches; staff-outreach recipients
    /// follow sequentially. A single recipient's failure never aborts the
    /// run — the summary carries counts and a capped error list instead.
    ///
    /// # Errors
    /// Returns a validation error (missing content, no unsent recipients,
    /// wrong status) before any send attempt, or a store error if campaign
    /// state itself cannot be read or written.
    pub async fn send_campaign(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, DispatchError> {
        let mut campaign = self.store.campaign(id).await?;
        if !campaign.has_content() {
            return Err(ValidationError::MissingContent(id.clone()).into());
        }
        if !campaign.sendable() {
            return Err(ValidationError::InvalidStatus {
                campaign: id.clone(),
                status: campaign.status,
            }
            .into());
        }
        let recipients = self.store.unsent_recipients(id).await?;
        if recipients.is_empty() {
            return Err(ValidationError::NoRecipients(id.clone()).into());
        }

        // One batch suppression query for the whole run.
        let snapshot = self.load_snapshot(&recipients).await?;

        campaign.status = CampaignStatus::Sending;
        self.store.update_campaign(&campaign).await?;

        let (staff, direct): (Vec<_>, Vec<_>) =
            recipients.into_iter().partition(|r| r.email_staff);

        cadence_common::dispatch!(
            level = INFO,
            "campaign {} run starting: {} direct, {} staff-outreach, {} suppressed in scope",
            campaign.id,
            direct.len(),
            staff.len(),
            snapshot.len()
        );

        let mut summary = RunSummary::default();
        let mut dedup: HashSet<String> = HashSet::new();

        let subject_tpl: Arc<str> = Arc::from(campaign.subject.as_str());
        let body_tpl: Arc<str> = Arc::from(campaign.body.as_str());

        for (index, chunk) in direct.chunks(self.config.batch_size.max(1)).enumerate() {
            if index > 0 && self.config.batch_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_pause_ms)).await;
            }

            let mut batch: JoinSet<Result<Recipient, DispatchFailure>> = JoinSet::new();
            for recipient in chunk {
                match self.prepare(recipient.clone(), &snapshot, &mut dedup).await {
                    Ok(Prepared::Ready(pending)) => {
                        let executor = self.clone();
                        let subject = Arc::clone(&subject_tpl);
                        let body = Arc::clone(&body_tpl);
                        batch.spawn(async move {
                            executor.execute(*pending, &subject, &body, now).await
                        });
                    }
                    Ok(Prepared::Skip(mode, reason)) => {
                        self.persist_skip(recipient.clone(), mode, reason, &mut summary)
                            .await;
                    }
                    Err(error) => {
                        tracing::error!(
                            recipient = %recipient.id,
                            error = %error,
                            "failed to resolve recipient"
                        );
                        summary.record_failure(
                            self.config.max_reported_errors,
                            format!("{}: {error}", recipient.email),
                        );
                    }
                }
            }

            while let Some(joined) = batch.join_next().await {
                match joined {
                    Ok(Ok(_)) => summary.sent += 1,
                    Ok(Err(failure)) => {
                        summary.record_failure(
                            self.config.max_reported_errors,
                            format!("{}: {}", failure.recipient, failure.message),
                        );
                    }
                    Err(join_error) => {
                        tracing::error!(error = %join_error, "send task aborted");
                        summary.record_failure(
                            self.config.max_reported_errors,
                            format!("send task aborted: {join_error}"),
                        );
                    }
                }
            }
        }

        for recipient in staff {
            match self.prepare(recipient.clone(), &snapshot, &mut dedup).await {
                Ok(Prepared::Ready(pending)) => {
                    match self.execute(*pending, &subject_tpl, &body_tpl, now).await {
                        Ok(_) => summary.sent += 1,
                        Err(failure) => summary.record_failure(
                            self.config.max_reported_errors,
                            format!("{}: {}", failure.recipient, failure.message),
                        ),
                    }
                }
                Ok(Prepared::Skip(mode, reason)) => {
                    self.persist_skip(recipient, mode, reason, &mut summary).await;
                }
                Err(error) => {
                    tracing::error!(
                        recipient = %recipient.id,
                        error = %error,
                        "failed to resolve staff-outreach recipient"
                    );
                    summary.record_failure(
                        self.config.max_reported_errors,
                        format!("{}: {error}", recipient.email),
                    );
                }
            }
        }

        campaign.totals.sent += summary.sent as u64;
        if campaign.campaign_type == CampaignType::OneTime {
            campaign.status = CampaignStatus::Sent;
        }
        self.store.update_campaign(&campaign).await?;

        tracing::info!(
            campaign = %campaign.id,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "campaign run finished"
        );

        Ok(summary)
    }

    /// Start a drip campaign: mark it Sending and seed every fresh
    /// recipient's first due time from step 0's delay.
    ///
    /// Returns the number of recipients seeded.
    ///
    /// # Errors
    /// Returns a validation error if the campaign is not a drip sequence,
    /// has no steps, or is not in a startable status.
    pub async fn start_campaign(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<usize, DispatchError> {
        let mut campaign = self.store.campaign(id).await?;
        if campaign.campaign_type != CampaignType::DripSequence {
            return Err(ValidationError::NotDripSequence(id.clone()).into());
        }
        if !matches!(
            campaign.status,
            CampaignStatus::Draft | CampaignStatus::Scheduled
        ) {
            return Err(ValidationError::InvalidStatus {
                campaign: id.clone(),
                status: campaign.status,
            }
            .into());
        }
        let steps = self.store.sequence_steps(id).await?;
        let Some(first) = steps.first() else {
            return Err(ValidationError::NoSteps(id.clone()).into());
        };

        let due = now + chrono::Duration::days(i64::from(first.delay_days));
        let mut seeded = 0usize;
        for mut recipient in self.store.campaign_recipients(id).await? {
            if !recipient.unsent() {
                continue;
            }
            recipient.next_send_at = Some(due);
            self.store.update_recipient(&recipient).await?;
            seeded += 1;
        }

        campaign.status = CampaignStatus::Sending;
        self.store.update_campaign(&campaign).await?;

        cadence_common::dispatch!(
            level = INFO,
            "drip campaign {} started, {} recipients due at {}",
            campaign.id,
            seeded,
            due
        );

        Ok(seeded)
    }

    /// Collect the run's candidate addresses and take one suppression
    /// snapshot for all of them.
    pub(crate) async fn load_snapshot(
        &self,
        recipients: &[Recipient],
    ) -> Result<SuppressionSnapshot, StoreError> {
        let mut universe = HashSet::new();
        for recipient in recipients {
            universe.insert(normalize_email(&recipient.email));
            if recipient.email_staff {
                let edges = self.store.contact_edges(&recipient.contact_id).await?;
                for staff in &edges.staff {
                    if let Some(email) = &staff.email {
                        universe.insert(normalize_email(email));
                    }
                }
                if let Some(email) = &edges.contact.email {
                    universe.insert(normalize_email(email));
                }
            }
        }
        SuppressionSnapshot::load(self.store.as_ref(), &universe).await
    }

    /// Resolve one recipient and claim its destinations against the run's
    /// dedup set.
    pub(crate) async fn prepare(
        &self,
        recipient: Recipient,
        snapshot: &SuppressionSnapshot,
        dedup: &mut HashSet<String>,
    ) -> Result<Prepared, StoreError> {
        let edges = self.store.contact_edges(&recipient.contact_id).await?;
        let resolution = resolve(&recipient, &edges, snapshot);

        if resolution.mode == DeliveryMode::Direct
            && resolution
                .destinations
                .first()
                .is_some_and(|addr| snapshot.is_suppressed(addr))
        {
            return Ok(Prepared::Skip(resolution.mode, SkipReason::Suppressed));
        }

        if resolution.destinations.is_empty() {
            return Ok(Prepared::Skip(
                resolution.mode,
                SkipReason::NoDeliverableTarget,
            ));
        }

        // Claim fresh addresses; drop the ones already mailed this run.
        let mut destinations = Vec::new();
        for address in resolution.destinations {
            if dedup.insert(address.clone()) {
                destinations.push(address);
            }
        }
        if destinations.is_empty() {
            return Ok(Prepared::Skip(resolution.mode, SkipReason::DuplicateAddress));
        }
        let reached: Vec<_> = resolution
            .reached
            .into_iter()
            .filter(|(_, address)| destinations.contains(address))
            .collect();

        let values = resolution.context.values();
        Ok(Prepared::Ready(Box::new(PendingSend {
            recipient,
            mode: resolution.mode,
            destinations,
            is_fallback: resolution.is_fallback,
            reached,
            values,
        })))
    }

    /// Render and send one prepared recipient, then persist the outcome.
    pub(crate) async fn execute(
        &self,
        pending: PendingSend,
        subject_template: &str,
        body_template: &str,
        now: DateTime<Utc>,
    ) -> Result<Recipient, DispatchFailure> {
        let PendingSend {
            mut recipient,
            mode,
            destinations,
            is_fallback,
            reached,
            values,
        } = pending;

        let outline = MailOutline {
            from: self.config.from_address.clone(),
            to: destinations.clone(),
            subject: render(subject_template, &values),
            html: render(body_template, &values),
        };

        let provider_id = self
            .config
            .retry
            .send_with_retry(self.transport.as_ref(), &outline)
            .await
            .map_err(|error| {
                tracing::warn!(
                    recipient = %recipient.id,
                    error = %error,
                    "transport failed after retries"
                );
                DispatchFailure {
                    recipient: recipient.id.clone(),
                    message: error.to_string(),
                }
            })?;

        recipient.record_sent(mode, destinations, provider_id.clone(), now);
        self.store
            .update_recipient(&recipient)
            .await
            .map_err(|error| DispatchFailure {
                recipient: recipient.id.clone(),
                message: format!("sent but outcome not persisted: {error}"),
            })?;

        for (contact_id, address) in reached {
            if let Err(error) = self
                .store
                .add_communication(Communication::new(
                    recipient.campaign_id.clone(),
                    recipient.id.clone(),
                    contact_id,
                    address,
                    is_fallback,
                    now,
                ))
                .await
            {
                tracing::warn!(
                    recipient = %recipient.id,
                    error = %error,
                    "communication audit row not recorded"
                );
            }
        }

        tracing::debug!(
            recipient = %recipient.id,
            provider_id = %provider_id,
            mode = ?mode,
            fallback = is_fallback,
            "message dispatched"
        );

        Ok(recipient)
    }

    /// Persist a terminal skip outcome.
    pub(crate) async fn persist_skip(
        &self,
        mut recipient: Recipient,
        mode: DeliveryMode,
        reason: SkipReason,
        summary: &mut RunSummary,
    ) {
        recipient.record_skipped(mode, reason);
        if let Err(error) = self.store.update_recipient(&recipient).await {
            tracing::warn!(
                recipient = %recipient.id,
                error = %error,
                "skip outcome not persisted"
            );
        }
        tracing::debug!(recipient = %recipient.id, reason = ?reason, "recipient skipped");
        summary.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_caps_length() {
        let long = "x".repeat(ERROR_DETAIL_MAX * 2);
        let out = truncated(&long);
        assert_eq!(out.chars().count(), ERROR_DETAIL_MAX + 1);
        assert!(out.ends_with('…'));

        assert_eq!(truncated("short"), "short");
    }

    #[test]
    fn test_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_pause_ms, 1000);
        assert_eq!(config.max_reported_errors, 25);
    }
}
