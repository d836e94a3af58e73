//! Shared fixtures for dispatch integration tests.
#![allow(dead_code, unreachable_pub)]

use std::sync::Arc;

use cadence_dispatch::{DispatchExecutor, Engine, ExecutorConfig, MockTransport, RetryPolicy};
use cadence_store::{
    Campaign, CampaignType, Contact, ContactType, MemoryStore, Recipient, StaffAssignment, Store,
};
use chrono::Utc;

/// Executor config with no pauses and millisecond backoff, so failing tests
/// do not sleep for real.
pub fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        batch_size: 10,
        batch_pause_ms: 0,
        max_reported_errors: 25,
        from_address: "campaigns@cadence.test".into(),
        retry: RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
        },
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub transport: MockTransport,
    pub executor: DispatchExecutor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = MockTransport::new();
        let executor = DispatchExecutor::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::new(transport.clone()),
            config,
        );
        Self {
            store,
            transport,
            executor,
        }
    }

    pub fn engine(&self) -> Engine {
        Engine::new(
            Arc::clone(&self.store) as Arc<dyn Store>,
            Arc::new(self.transport.clone()),
            fast_config(),
        )
    }
}

pub async fn one_time_campaign(store: &MemoryStore, subject: &str, body: &str) -> Campaign {
    let campaign = Campaign::new("blast", CampaignType::OneTime, subject, body, Utc::now());
    store
        .add_campaign(campaign.clone())
        .await
        .expect("add campaign");
    campaign
}

pub async fn drip_campaign(store: &MemoryStore) -> Campaign {
    let campaign = Campaign::new(
        "sequence",
        CampaignType::DripSequence,
        "Sequence",
        "<p>sequence</p>",
        Utc::now(),
    );
    store
        .add_campaign(campaign.clone())
        .await
        .expect("add campaign");
    campaign
}

pub async fn principal(store: &MemoryStore, first: &str, email: Option<&str>) -> Contact {
    let contact = Contact::new(
        ContactType::Principal,
        first,
        "Example",
        email.map(String::from),
    );
    store
        .add_contact(contact.clone())
        .await
        .expect("add contact");
    contact
}

/// A principal plus active staff members, wired up with assignment edges.
pub async fn principal_with_staff(
    store: &MemoryStore,
    first: &str,
    email: Option<&str>,
    staff_emails: &[&str],
) -> Contact {
    let mut boss = Contact::new(
        ContactType::Principal,
        first,
        "Example",
        email.map(String::from),
    );
    for (index, staff_email) in staff_emails.iter().enumerate() {
        let staffer = Contact::new(
            ContactType::Staff,
            format!("Staffer{index}"),
            "Example",
            Some((*staff_email).to_string()),
        );
        boss.staff_assignments.push(StaffAssignment {
            staff: staffer.id.clone(),
            superior: boss.id.clone(),
            created_at: Utc::now(),
            end_date: None,
        });
        store.add_contact(staffer).await.expect("add staffer");
    }
    store.add_contact(boss.clone()).await.expect("add boss");
    boss
}

pub async fn add_recipient(
    store: &MemoryStore,
    campaign: &Campaign,
    contact: &Contact,
    email: &str,
    email_staff: bool,
) -> Recipient {
    let recipient = Recipient::new(
        campaign.id.clone(),
        contact.id.clone(),
        email,
        email_staff,
    );
    store
        .add_recipient(recipient.clone())
        .await
        .expect("add recipient");
    recipient
}
