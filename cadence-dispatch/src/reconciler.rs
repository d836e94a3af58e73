//! Provider-event reconciliation.
//!
//! Delivery providers report engagement asynchronously and at-least-once:
//! the same open can arrive twice, and the stream includes traffic for mail
//! this system never sent. Ingestion is therefore idempotent per
//! (provider id, event kind): recipient timestamps are first-occurrence-wins
//! and campaign counters only move on the actual transition, while the
//! append-only event log keeps every located callback, replays included.

use std::sync::Arc;

use cadence_store::{
    EmailEvent, EmailSuppression, EventKind, Store, StoreError, SuppressionReason,
};
use chrono::{DateTime, Utc};

/// One raw provider callback, as the webhook boundary hands it over.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    /// Provider vocabulary, e.g. `email.opened`.
    pub event_type: String,
    /// The provider message id the event refers to.
    pub provider_id: String,
    /// Free-form detail, e.g. a clicked URL.
    pub metadata: Option<String>,
}

/// What an ingestion call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingestion {
    /// A recipient timestamp transitioned and the campaign counter moved.
    Applied(EventKind),
    /// The event was logged but changed no aggregate (replay, or a kind
    /// with no recipient timestamp).
    AuditOnly(EventKind),
    /// No recipient carries this provider id; the event is not ours.
    UnknownRecipient,
    /// The provider vocabulary did not map to an internal kind.
    UnknownType,
}

/// Map the provider's raw event vocabulary onto the internal kind set.
///
/// Unknown types yield `None` and are dropped, not errored.
#[must_use]
pub fn map_event_type(raw: &str) -> Option<EventKind> {
    let normalized = raw.trim().to_ascii_lowercase();
    let kind = normalized.strip_prefix("email.").unwrap_or(&normalized);
    match kind {
        "delivered" => Some(EventKind::Delivered),
        "opened" | "open" => Some(EventKind::Opened),
        "clicked" | "click" => Some(EventKind::Clicked),
        "bounced" | "bounce" => Some(EventKind::Bounced),
        "complained" | "complaint" => Some(EventKind::Complained),
        "replied" | "reply" => Some(EventKind::Replied),
        _ => None,
    }
}

/// Applies provider events onto recipient and campaign aggregates.
#[derive(Debug, Clone)]
pub struct EventReconciler {
    store: Arc<dyn Store>,
}

impl EventReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Ingest one provider event.
    ///
    /// Unknown recipients and unknown types are successful no-ops — the
    /// provider's stream includes traffic unrelated to campaign mail.
    ///
    /// # Errors
    /// Returns a store error only when reading or persisting state fails;
    /// never because of the event's content.
    pub async fn ingest(
        &self,
        event: &ProviderEvent,
        now: DateTime<Utc>,
    ) -> Result<Ingestion, StoreError> {
        let Some(kind) = map_event_type(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "unmapped provider event dropped");
            return Ok(Ingestion::UnknownType);
        };

        let Some(mut recipient) = self
            .store
            .recipient_by_provider_id(&event.provider_id)
            .await?
        else {
            tracing::debug!(provider_id = %event.provider_id, "event for non-campaign mail dropped");
            return Ok(Ingestion::UnknownRecipient);
        };

        let mut campaign = self.store.campaign(&recipient.campaign_id).await?;

        let applied = match kind {
            // No recipient timestamp tracks delivery; the event log is the record.
            EventKind::Delivered => false,
            EventKind::Opened => {
                transition(&mut recipient.opened_at, &mut campaign.totals.opened, now)
            }
            EventKind::Clicked => {
                transition(&mut recipient.clicked_at, &mut campaign.totals.clicked, now)
            }
            EventKind::Bounced | EventKind::Complained => {
                transition(&mut recipient.bounced_at, &mut campaign.totals.bounced, now)
            }
            EventKind::Replied => {
                transition(&mut recipient.replied_at, &mut campaign.totals.replied, now)
            }
        };

        // Bounces and complaints block the address from all future sends,
        // regardless of whether this particular callback was a replay.
        if matches!(kind, EventKind::Bounced | EventKind::Complained) {
            let reason = if kind == EventKind::Complained {
                SuppressionReason::Complaint
            } else {
                SuppressionReason::Bounce
            };
            self.store
                .add_suppression(EmailSuppression::new(&recipient.email, reason, now))
                .await?;
        }

        if applied {
            self.store.update_recipient(&recipient).await?;
            self.store.update_campaign(&campaign).await?;
        }

        self.store
            .append_event(EmailEvent::new(
                kind,
                &event.provider_id,
                recipient.id.clone(),
                event.metadata.clone(),
                now,
            ))
            .await?;

        tracing::debug!(
            provider_id = %event.provider_id,
            kind = ?kind,
            applied,
            "provider event reconciled"
        );

        Ok(if applied {
            Ingestion::Applied(kind)
        } else {
            Ingestion::AuditOnly(kind)
        })
    }
}

fn transition(slot: &mut Option<DateTime<Utc>>, counter: &mut u64, now: DateTime<Utc>) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(now);
    *counter += 1;
    true
}
