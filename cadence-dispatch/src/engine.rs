//! Top-level orchestration for the periodic trigger.
//!
//! One trigger invocation processes everything currently due: scheduled
//! one-time campaigns are sent, scheduled drip campaigns are started, and
//! due drip steps are advanced. Failures are isolated per campaign — one
//! campaign's error never prevents the others from being attempted.

use std::sync::Arc;

use cadence_store::{CampaignType, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    executor::{DispatchExecutor, ExecutorConfig, truncated},
    reconciler::EventReconciler,
    scheduler::{DripScheduler, SchedulerSummary},
    transport::Transport,
};

/// What one trigger invocation accomplished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerSummary {
    /// One-time campaigns fully processed this invocation.
    pub campaigns_sent: usize,
    /// Drip campaigns started this invocation.
    pub campaigns_started: usize,
    /// One-time messages sent / failed / skipped, summed over campaigns.
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// The drip pass that ran after the scheduled campaigns.
    pub drip: SchedulerSummary,
    pub errors: Vec<String>,
}

/// The dispatch engine: everything behind the trigger and webhook endpoints.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    executor: DispatchExecutor,
    scheduler: DripScheduler,
    reconciler: EventReconciler,
}

impl Engine {
    /// Assemble the engine from its injected collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        config: ExecutorConfig,
    ) -> Self {
        let executor = DispatchExecutor::new(Arc::clone(&store), transport, config);
        let scheduler = DripScheduler::new(Arc::clone(&store), executor.clone());
        let reconciler = EventReconciler::new(Arc::clone(&store));
        Self {
            store,
            executor,
            scheduler,
            reconciler,
        }
    }

    /// The reconciler serving the webhook endpoint.
    #[must_use]
    pub const fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    /// The executor, for callers that drive individual campaigns directly.
    #[must_use]
    pub const fn executor(&self) -> &DispatchExecutor {
        &self.executor
    }

    /// Process everything due at `now`: scheduled campaigns first, then the
    /// drip pass.
    pub async fn process_due(&self, now: DateTime<Utc>) -> TriggerSummary {
        let mut summary = TriggerSummary::default();

        match self.store.due_scheduled_campaigns(now).await {
            Ok(due) => {
                for campaign in due {
                    match campaign.campaign_type {
                        CampaignType::OneTime => {
                            match self.executor.send_campaign(&campaign.id, now).await {
                                Ok(run) => {
                                    summary.campaigns_sent += 1;
                                    summary.sent += run.sent;
                                    summary.failed += run.failed;
                                    summary.skipped += run.skipped;
                                    summary.errors.extend(run.errors);
                                }
                                Err(error) => {
                                    tracing::error!(
                                        campaign = %campaign.id,
                                        error = %error,
                                        "scheduled campaign send failed"
                                    );
                                    summary
                                        .errors
                                        .push(truncated(&format!("{}: {error}", campaign.id)));
                                }
                            }
                        }
                        CampaignType::DripSequence => {
                            match self.executor.start_campaign(&campaign.id, now).await {
                                Ok(seeded) => {
                                    summary.campaigns_started += 1;
                                    tracing::info!(
                                        campaign = %campaign.id,
                                        seeded,
                                        "scheduled drip campaign started"
                                    );
                                }
                                Err(error) => {
                                    tracing::error!(
                                        campaign = %campaign.id,
                                        error = %error,
                                        "scheduled drip start failed"
                                    );
                                    summary
                                        .errors
                                        .push(truncated(&format!("{}: {error}", campaign.id)));
                                }
                            }
                        }
                    }
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "scheduled-campaign query failed");
                summary.errors.push(truncated(&error.to_string()));
            }
        }

        summary.drip = self.scheduler.run_due(now).await;
        summary
    }
}
