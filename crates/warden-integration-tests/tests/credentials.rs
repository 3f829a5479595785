//! Registration, login and session token scenarios.

mod common;

use std::time::{Duration, Instant};

use common::{Harness, SECRET};
use warden_authz::{AuthzError, Credentials, Registration};
use warden_crypto::PasswordParams;
use warden_session::SessionError;

#[tokio::test]
async fn duplicate_username_and_email_are_refused() {
    let h = Harness::new().await;
    h.gatekeeper
        .register(Registration::new("alice", "alice@example.com", SECRET))
        .await
        .unwrap();

    let same_name = h
        .gatekeeper
        .register(Registration::new("alice", "other@example.com", SECRET))
        .await;
    assert!(matches!(
        same_name,
        Err(AuthzError::DuplicateIdentity { field: "username" })
    ));

    let same_email = h
        .gatekeeper
        .register(Registration::new("alice2", "ALICE@example.com", SECRET))
        .await;
    assert!(matches!(
        same_email,
        Err(AuthzError::DuplicateIdentity { field: "email" })
    ));
}

#[tokio::test]
async fn unknown_email_and_wrong_secret_look_the_same() {
    let h = Harness::new().await;
    let unknown = h
        .gatekeeper
        .authenticate("nobody@example.com", SECRET)
        .await
        .unwrap_err();
    let wrong = h
        .gatekeeper
        .authenticate(common::OWNER_EMAIL, "not the secret")
        .await
        .unwrap_err();
    assert!(matches!(unknown, AuthzError::InvalidCredentials));
    assert!(matches!(wrong, AuthzError::InvalidCredentials));
    assert_eq!(unknown.surface().public_message(), wrong.surface().public_message());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_email_takes_as_long_as_wrong_secret() {
    let h = Harness::with_password(PasswordParams {
        memory_kib: 8 * 1024,
        iterations: 2,
        parallelism: 1,
    })
    .await;

    let mut unknown = Duration::ZERO;
    let mut wrong = Duration::ZERO;
    for _ in 0..5 {
        let started = Instant::now();
        let _ = h.gatekeeper.authenticate("nobody@example.com", SECRET).await;
        unknown = unknown.saturating_add(started.elapsed());

        let started = Instant::now();
        let _ = h.gatekeeper.authenticate(common::OWNER_EMAIL, "wrong").await;
        wrong = wrong.saturating_add(started.elapsed());
    }

    // Both paths run one argon2 verification; allow generous scheduling noise.
    assert!(unknown.saturating_mul(3) > wrong, "unknown {unknown:?} vs wrong {wrong:?}");
    assert!(wrong.saturating_mul(3) > unknown, "unknown {unknown:?} vs wrong {wrong:?}");
}

#[tokio::test]
async fn flipped_token_bit_fails_verification() {
    let h = Harness::new().await;
    let session = h
        .gatekeeper
        .authenticate(common::OWNER_EMAIL, SECRET)
        .await
        .unwrap();
    let token = session.token.as_str();
    assert!(h.gatekeeper.verify(token).is_ok());

    let mut bytes = token.as_bytes().to_vec();
    // Swap one base64url character of the payload for another valid one.
    bytes[3] = if bytes[3] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();

    assert!(matches!(
        h.gatekeeper.verify(&tampered),
        Err(AuthzError::Token(
            SessionError::SignatureInvalid | SessionError::Malformed(_)
        ))
    ));
}

#[tokio::test]
async fn bearer_header_is_required() {
    let h = Harness::new().await;
    let session = h
        .gatekeeper
        .authenticate(common::OWNER_EMAIL, SECRET)
        .await
        .unwrap();

    let missing = Credentials::from_headers([("x-api-key", "wk_abc")]);
    assert!(matches!(
        h.gatekeeper.identify(&missing),
        Err(AuthzError::MissingCredentials)
    ));

    let header = format!("Bearer {}", session.token.as_str());
    let present = Credentials::from_headers([("Authorization", header.as_str())]);
    let claims = h.gatekeeper.identify(&present).unwrap();
    assert_eq!(claims.subject, h.owner.subject);
}

#[tokio::test]
async fn short_secret_is_rejected() {
    let h = Harness::new().await;
    let result = h
        .gatekeeper
        .register(Registration::new("shorty", "shorty@example.com", "short"))
        .await;
    assert!(matches!(result, Err(AuthzError::InvalidInput(_))));
}

#[test]
fn registration_debug_hides_secret() {
    let registration = Registration::new("alice", "alice@example.com", "hunter22");
    assert!(!format!("{registration:?}").contains("hunter22"));
}
