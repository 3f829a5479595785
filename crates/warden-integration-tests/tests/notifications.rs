//! Notification delivery never blocks or fails privileged operations.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FailingChannel, Harness, HangingChannel, RecordingChannel, WEBHOOK};
use warden_core::CapabilitySet;

#[tokio::test]
async fn ban_is_announced_without_the_webhook_secret() {
    let channel = Arc::new(RecordingChannel::default());
    let h = Harness::with_channel(Arc::clone(&channel) as _, Duration::from_secs(1)).await;
    h.set_webhook().await;
    let target = h.member("noisy", 5, CapabilitySet::empty()).await;

    h.gatekeeper
        .ban_identity(&h.owner, target.identity.id, "spamming invites")
        .await
        .unwrap();

    let messages = channel.wait_for(1).await;
    let ban = messages
        .iter()
        .find(|m| m.contains("banned"))
        .expect("ban notification");
    assert!(ban.contains("spamming invites"));
    for message in &messages {
        assert!(!message.contains("s3cr3t-token"), "{message}");
        assert!(!message.contains(WEBHOOK));
    }
}

#[tokio::test]
async fn silent_without_webhook() {
    let channel = Arc::new(RecordingChannel::default());
    let h = Harness::with_channel(Arc::clone(&channel) as _, Duration::from_secs(1)).await;
    let target = h.member("quiet", 5, CapabilitySet::empty()).await;

    h.gatekeeper
        .ban_identity(&h.owner, target.identity.id, "reason")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(channel.messages().is_empty());
}

#[tokio::test]
async fn hanging_channel_does_not_block() {
    let h = Harness::with_channel(Arc::new(HangingChannel), Duration::from_secs(30)).await;
    h.set_webhook().await;
    let target = h.member("stuck", 5, CapabilitySet::empty()).await;

    let banned = tokio::time::timeout(
        Duration::from_secs(5),
        h.gatekeeper
            .ban_identity(&h.owner, target.identity.id, "reason"),
    )
    .await
    .expect("ban blocked on notification");
    assert!(banned.unwrap().suspended);
}

#[tokio::test]
async fn failing_channel_does_not_fail_the_operation() {
    let channel = Arc::new(FailingChannel::default());
    let h = Harness::with_channel(Arc::clone(&channel) as _, Duration::from_secs(1)).await;
    h.set_webhook().await;
    let target = h.member("unlucky", 5, CapabilitySet::empty()).await;

    let banned = h
        .gatekeeper
        .ban_identity(&h.owner, target.identity.id, "reason")
        .await
        .unwrap();
    assert!(banned.suspended);

    for _ in 0..100 {
        if channel.attempts.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(channel.attempts.load(Ordering::SeqCst) > 0);
    assert!(h.gatekeeper.verify_audit_chain(&h.owner).await.unwrap().valid);
}
