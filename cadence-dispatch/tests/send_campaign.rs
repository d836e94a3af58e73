//! Integration tests for one-time campaign sends.

mod support;

use cadence_dispatch::{
    DispatchError, ExecutorConfig, SuppressionSnapshot, TransportError, ValidationError,
};
use cadence_store::{
    CampaignStatus, DeliveryMode, EmailSuppression, SkipReason, Store, SuppressionReason,
};
use chrono::Utc;
use support::{Harness, add_recipient, fast_config, one_time_campaign, principal};

#[tokio::test]
async fn test_send_campaign_renders_and_records() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "Hi {{firstName}}", "<p>Hello {{firstName}}</p>").await;

    let ada = principal(&harness.store, "Ada", Some("a@x.com")).await;
    let ben = principal(&harness.store, "Ben", Some("b@x.com")).await;
    add_recipient(&harness.store, &campaign, &ada, "a@x.com", false).await;
    add_recipient(&harness.store, &campaign, &ben, "b@x.com", false).await;

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary.errors.is_empty());

    // Every recipient ends the run with a recorded outcome.
    for recipient in harness
        .store
        .campaign_recipients(&campaign.id)
        .await
        .expect("recipients")
    {
        assert!(recipient.sent_at.is_some());
        assert!(recipient.provider_id.is_some());
        assert_eq!(recipient.delivery_mode, Some(DeliveryMode::Direct));
    }

    let reloaded = harness.store.campaign(&campaign.id).await.expect("campaign");
    assert_eq!(reloaded.status, CampaignStatus::Sent);
    assert_eq!(reloaded.totals.sent, 2);

    // Subjects carry each contact's actual first name, never the token.
    let subjects: Vec<String> = harness
        .transport
        .sent()
        .iter()
        .map(|outline| outline.subject.clone())
        .collect();
    assert_eq!(subjects.len(), 2);
    assert!(subjects.contains(&"Hi Ada".to_string()));
    assert!(subjects.contains(&"Hi Ben".to_string()));
    assert!(subjects.iter().all(|s| !s.contains("{{")));

    // One audit row per person reached.
    assert_eq!(harness.store.communications().len(), 2);
}

#[tokio::test]
async fn test_validation_aborts_before_any_send() {
    let harness = Harness::new();

    // Missing body.
    let campaign = one_time_campaign(&harness.store, "Subject", "   ").await;
    let ada = principal(&harness.store, "Ada", Some("a@x.com")).await;
    add_recipient(&harness.store, &campaign, &ada, "a@x.com", false).await;
    let err = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect_err("missing content");
    assert!(matches!(
        err,
        DispatchError::Validation(ValidationError::MissingContent(_))
    ));

    // No recipients.
    let empty = one_time_campaign(&harness.store, "Subject", "<p>Body</p>").await;
    let err = harness
        .executor
        .send_campaign(&empty.id, Utc::now())
        .await
        .expect_err("no recipients");
    assert!(matches!(
        err,
        DispatchError::Validation(ValidationError::NoRecipients(_))
    ));

    assert_eq!(harness.transport.sent_count(), 0);
}

#[tokio::test]
async fn test_sent_campaign_cannot_be_rerun() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    let ada = principal(&harness.store, "Ada", Some("a@x.com")).await;
    add_recipient(&harness.store, &campaign, &ada, "a@x.com", false).await;

    harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("first run");

    let err = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect_err("second run rejected");
    assert!(matches!(
        err,
        DispatchError::Validation(ValidationError::InvalidStatus { .. })
    ));
    assert_eq!(harness.transport.sent_count(), 1);
}

#[tokio::test]
async fn test_duplicate_inbox_is_mailed_once_per_run() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "S {{firstName}}", "<p>B</p>").await;

    // Two recipient rows, one physical inbox.
    let ada = principal(&harness.store, "Ada", Some("shared@x.com")).await;
    let twin = principal(&harness.store, "Twin", Some("shared@x.com")).await;
    add_recipient(&harness.store, &campaign, &ada, "shared@x.com", false).await;
    add_recipient(&harness.store, &campaign, &twin, "Shared@X.COM", false).await;

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.transport.sent_count(), 1);

    let rows = harness
        .store
        .campaign_recipients(&campaign.id)
        .await
        .expect("recipients");
    let skipped: Vec<_> = rows
        .iter()
        .filter(|r| r.skip_reason == Some(SkipReason::DuplicateAddress))
        .collect();
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].sent_at.is_none());
}

#[tokio::test]
async fn test_suppressed_direct_recipient_is_skipped() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    let ada = principal(&harness.store, "Ada", Some("a@x.com")).await;
    let ben = principal(&harness.store, "Ben", Some("b@x.com")).await;
    add_recipient(&harness.store, &campaign, &ada, "a@x.com", false).await;
    add_recipient(&harness.store, &campaign, &ben, "b@x.com", false).await;

    harness
        .store
        .add_suppression(EmailSuppression::new(
            "A@X.com",
            SuppressionReason::Unsubscribe,
            Utc::now(),
        ))
        .await
        .expect("suppress");

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.transport.sent_count(), 1);
    assert_eq!(harness.transport.sent()[0].to, vec!["b@x.com"]);
}

#[tokio::test]
async fn test_suppression_snapshot_governs_within_a_run() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    let ada = principal(&harness.store, "Ada", Some("a@x.com")).await;
    let recipient = add_recipient(&harness.store, &campaign, &ada, "a@x.com", false).await;

    // The run's snapshot is taken at its start …
    let unsent = harness
        .store
        .unsent_recipients(&campaign.id)
        .await
        .expect("unsent");
    let universe = [recipient.email.clone()].into_iter().collect();
    let snapshot = SuppressionSnapshot::load(harness.store.as_ref(), &universe)
        .await
        .expect("snapshot");
    assert_eq!(unsent.len(), 1);
    assert!(!snapshot.is_suppressed("a@x.com"));

    // … and an entry added afterwards does not change its decisions.
    harness
        .store
        .add_suppression(EmailSuppression::new(
            "a@x.com",
            SuppressionReason::Bounce,
            Utc::now(),
        ))
        .await
        .expect("suppress");
    assert!(!snapshot.is_suppressed("a@x.com"));

    // The next snapshot honors the now-current list.
    let next = SuppressionSnapshot::load(harness.store.as_ref(), &universe)
        .await
        .expect("snapshot");
    assert!(next.is_suppressed("a@x.com"));
}

#[tokio::test]
async fn test_one_failure_never_aborts_the_batch() {
    let harness = Harness::with_config(ExecutorConfig {
        batch_size: 1, // sequential, so the scripted failure lands deterministically
        ..fast_config()
    });
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    let ada = principal(&harness.store, "Ada", Some("a@x.com")).await;
    let ben = principal(&harness.store, "Ben", Some("b@x.com")).await;
    add_recipient(&harness.store, &campaign, &ada, "a@x.com", false).await;
    add_recipient(&harness.store, &campaign, &ben, "b@x.com", false).await;

    harness
        .transport
        .enqueue(Err(TransportError::Rejected("mailbox does not exist".into())));

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run still succeeds");

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("mailbox does not exist"));

    // The failed row keeps a null sent_at; the campaign still completes.
    let rows = harness
        .store
        .campaign_recipients(&campaign.id)
        .await
        .expect("recipients");
    assert_eq!(rows.iter().filter(|r| r.sent_at.is_some()).count(), 1);
    let reloaded = harness.store.campaign(&campaign.id).await.expect("campaign");
    assert_eq!(reloaded.status, CampaignStatus::Sent);
    assert_eq!(reloaded.totals.sent, 1);
}

#[tokio::test]
async fn test_error_list_is_capped() {
    let harness = Harness::with_config(ExecutorConfig {
        batch_size: 1,
        max_reported_errors: 2,
        ..fast_config()
    });
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    for (index, email) in ["a@x.com", "b@x.com", "c@x.com", "d@x.com"].iter().enumerate() {
        let contact = principal(&harness.store, &format!("C{index}"), Some(email)).await;
        add_recipient(&harness.store, &campaign, &contact, email, false).await;
        harness
            .transport
            .enqueue(Err(TransportError::Rejected(format!("bad {email}"))));
    }

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.failed, 4);
    assert_eq!(summary.errors.len(), 2);
}

#[tokio::test]
async fn test_staff_outreach_single_call_and_per_staffer_audit() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "From {{bossFirstName}}", "<p>B</p>").await;
    let boss = support::principal_with_staff(
        &harness.store,
        "Dana",
        Some("dana@x.com"),
        &["one@x.com", "two@x.com"],
    )
    .await;
    add_recipient(&harness.store, &campaign, &boss, "dana@x.com", true).await;

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.sent, 1);
    // One provider call carries the whole staff set.
    assert_eq!(harness.transport.sent_count(), 1);
    let outline = &harness.transport.sent()[0];
    assert_eq!(outline.to, vec!["one@x.com", "two@x.com"]);
    assert_eq!(outline.subject, "From Dana");

    // One audit row per staff contact actually reached, none fallback-flagged.
    let communications = harness.store.communications();
    assert_eq!(communications.len(), 2);
    assert!(communications.iter().all(|c| !c.is_fallback));
}

#[tokio::test]
async fn test_staff_outreach_falls_back_to_the_boss() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    let boss =
        support::principal_with_staff(&harness.store, "Dana", Some("dana@x.com"), &["one@x.com"])
            .await;
    add_recipient(&harness.store, &campaign, &boss, "dana@x.com", true).await;

    harness
        .store
        .add_suppression(EmailSuppression::new(
            "one@x.com",
            SuppressionReason::Bounce,
            Utc::now(),
        ))
        .await
        .expect("suppress staffer");

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.sent, 1);
    assert_eq!(harness.transport.sent()[0].to, vec!["dana@x.com"]);

    let communications = harness.store.communications();
    assert_eq!(communications.len(), 1);
    assert!(communications[0].is_fallback);
    assert_eq!(communications[0].contact_id, boss.id);
}

#[tokio::test]
async fn test_no_deliverable_target_is_terminal() {
    let harness = Harness::new();
    let campaign = one_time_campaign(&harness.store, "S", "<p>B</p>").await;
    // No staff, no usable own address.
    let boss = support::principal_with_staff(&harness.store, "Dana", None, &[]).await;
    add_recipient(&harness.store, &campaign, &boss, "unused@x.com", true).await;

    let summary = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect("run succeeds");

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.transport.sent_count(), 0);

    let rows = harness
        .store
        .campaign_recipients(&campaign.id)
        .await
        .expect("recipients");
    assert_eq!(rows[0].skip_reason, Some(SkipReason::NoDeliverableTarget));

    // The skip is terminal: a subsequent run finds nothing to do.
    let mut reloaded = harness.store.campaign(&campaign.id).await.expect("campaign");
    reloaded.status = CampaignStatus::Sending;
    harness
        .store
        .update_campaign(&reloaded)
        .await
        .expect("reopen");
    let err = harness
        .executor
        .send_campaign(&campaign.id, Utc::now())
        .await
        .expect_err("nothing left");
    assert!(matches!(
        err,
        DispatchError::Validation(ValidationError::NoRecipients(_))
    ));
}
