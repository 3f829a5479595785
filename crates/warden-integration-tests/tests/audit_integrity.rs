//! Audit atomicity and chain integrity scenarios.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{CountingEffect, Harness};
use warden_authz::{AccessLevel, AuditQuery, AuthzError, ModerationAction, RoleDraft};
use warden_audit::AuditKind;
use warden_core::{Capability, CapabilitySet, Rank};
use warden_storage::KvStore;

#[tokio::test]
async fn each_mutation_writes_one_attributed_entry() {
    let h = Harness::new().await;
    let gk = &h.gatekeeper;
    let owner = h.owner.subject;
    let target = h.member("subject", 5, CapabilitySet::empty()).await;
    let id = target.identity.id;

    let before = h.audit_count().await;
    let role = gk
        .create_role(&h.owner, RoleDraft::new("Helpers", 12, CapabilitySet::empty()))
        .await
        .unwrap();
    h.single_entry_since(before, AuditKind::RoleCreated, owner, role.id)
        .await;

    let before = h.audit_count().await;
    let draft = RoleDraft::new(
        "Helpers+",
        14,
        CapabilitySet::empty().with(Capability::ViewScriptLogs),
    );
    gk.update_role(&h.owner, role.id, draft).await.unwrap();
    let entry = h
        .single_entry_since(before, AuditKind::RoleUpdated, owner, role.id)
        .await;
    assert_eq!(entry.payload["change"], "definition");

    let before = h.audit_count().await;
    gk.assign_role(&h.owner, id, role.id).await.unwrap();
    let entry = h
        .single_entry_since(before, AuditKind::RoleUpdated, owner, id)
        .await;
    assert_eq!(entry.payload["change"], "assignment");

    let before = h.audit_count().await;
    gk.ban_identity(&h.owner, id, "spam").await.unwrap();
    h.single_entry_since(before, AuditKind::Ban, owner, id).await;

    let before = h.audit_count().await;
    gk.reinstate_identity(&h.owner, id).await.unwrap();
    h.single_entry_since(before, AuditKind::Unban, owner, id).await;

    let before = h.audit_count().await;
    gk.flag_identity(&h.owner, id, "watch trades").await.unwrap();
    h.single_entry_since(before, AuditKind::ModNote, owner, id).await;

    // Free the role so it can be deleted.
    let default = gk.roles().by_name("User").await.unwrap().unwrap();
    gk.assign_role(&h.owner, id, default.id).await.unwrap();
    let before = h.audit_count().await;
    gk.delete_role(&h.owner, role.id).await.unwrap();
    h.single_entry_since(before, AuditKind::RoleDeleted, owner, role.id)
        .await;
}

#[tokio::test]
async fn failed_audit_leaves_nothing_behind() {
    let h = Harness::new().await;
    let target = h.member("target", 5, CapabilitySet::empty()).await;
    let before = h.audit_count().await;
    h.audit_storage.fail(true);

    let ban = h
        .gatekeeper
        .ban_identity(&h.owner, target.identity.id, "spam")
        .await;
    assert!(matches!(ban, Err(AuthzError::AuditUnavailable(_))));

    let role = h
        .gatekeeper
        .create_role(&h.owner, RoleDraft::new("Phantom", 9, CapabilitySet::empty()))
        .await;
    assert!(matches!(role, Err(AuthzError::AuditUnavailable(_))));

    let setting = h
        .gatekeeper
        .update_setting(&h.owner, "discord_link", "https://discord.gg/abcdef")
        .await;
    assert!(matches!(setting, Err(AuthzError::AuditUnavailable(_))));

    let key = h.gatekeeper.issue_service_key(&h.owner, "bots").await;
    assert!(matches!(key, Err(AuthzError::AuditUnavailable(_))));

    h.audit_storage.fail(false);

    let identity = h
        .gatekeeper
        .identities()
        .require(target.identity.id)
        .await
        .unwrap();
    assert!(!identity.suspended);
    assert!(h.gatekeeper.roles().by_rank(Rank::new(9)).await.unwrap().is_none());
    assert!(h.gatekeeper.get_setting("discord_link").await.is_err());
    assert!(h.gatekeeper.list_service_keys(&h.owner).await.unwrap().is_empty());
    assert_eq!(h.audit_count().await, before);

    // The target's session was not revoked by the failed ban.
    assert!(h.gatekeeper.verify(target.token.as_str()).is_ok());
}

#[tokio::test]
async fn failed_audit_compensates_collaborator_effect() {
    let h = Harness::new().await;
    let effect = CountingEffect::default();
    let action = ModerationAction::PostAnnouncement {
        content: "maintenance tonight".into(),
    };

    h.audit_storage.fail(true);
    let result = h.gatekeeper.moderate(&h.owner, &action, &effect).await;
    assert!(matches!(result, Err(AuthzError::AuditUnavailable(_))));
    assert_eq!(effect.applied(), 1);
    assert_eq!(effect.compensated(), 1);
}

#[tokio::test]
async fn failed_effect_writes_no_audit() {
    let h = Harness::new().await;
    let effect = CountingEffect::default();
    effect.fail.store(true, Ordering::SeqCst);
    let before = h.audit_count().await;

    let result = h
        .gatekeeper
        .moderate(
            &h.owner,
            &ModerationAction::ApproveGame {
                game_id: "g-1".into(),
                access_level: AccessLevel::Whitelisted,
            },
            &effect,
        )
        .await;
    assert!(matches!(result, Err(AuthzError::Effect(_))));
    assert_eq!(effect.compensated(), 0);
    assert_eq!(h.audit_count().await, before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chain_verifies_after_concurrent_operations() {
    let h = Harness::new().await;
    let mut tasks = Vec::new();
    for i in 0..8_u32 {
        let gatekeeper = Arc::clone(&h.gatekeeper);
        let owner = h.owner;
        tasks.push(tokio::spawn(async move {
            gatekeeper
                .create_role(
                    &owner,
                    RoleDraft::new(
                        format!("Role {i}"),
                        i.saturating_add(10),
                        CapabilitySet::empty(),
                    ),
                )
                .await
                .unwrap();
            gatekeeper
                .issue_service_key(&owner, &format!("scope-{i}"))
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let result = h.gatekeeper.verify_audit_chain(&h.owner).await.unwrap();
    assert!(result.valid, "{:?}", result.issues);
    // Bootstrap plus two entries per task.
    assert_eq!(result.entries_verified, 17);

    let sequences: Vec<u64> = h
        .gatekeeper
        .audit_log(&h.owner, AuditQuery::All)
        .await
        .unwrap()
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(sequences, (1..=17).collect::<Vec<_>>());
}

#[tokio::test]
async fn tampering_is_detected() {
    let h = Harness::new().await;
    let target = h.member("tampered", 5, CapabilitySet::empty()).await;
    h.gatekeeper
        .ban_identity(&h.owner, target.identity.id, "original reason")
        .await
        .unwrap();

    let store = h.audit_storage.inner.store();
    let mut rows = store.scan("audit:entries").await.unwrap();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    let (key, bytes) = rows.last().unwrap().clone();
    let mut entry: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    entry["payload"]["reason"] = serde_json::json!("rewritten reason");
    store
        .set("audit:entries", &key, serde_json::to_vec(&entry).unwrap())
        .await
        .unwrap();

    let result = h.gatekeeper.verify_audit_chain(&h.owner).await.unwrap();
    assert!(!result.valid);
    assert!(!result.issues.is_empty());
}
