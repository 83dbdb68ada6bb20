//! Session and directory flows against an in-memory service
//!
//! - OTP login, verification and token persistence
//! - session restore from a stored token
//! - resend countdown
//! - directory search and conversation refresh

mod common;

use chrono::{TimeZone, Utc};
use common::{ada, init_tracing, MockApi, VALID_CODE, VALID_TOKEN};
use ping_chat_core::{
    ChatError, Conversation, DirectoryCache, OtpCode, Reconciler, SessionStore, TokenStore, User,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

fn session(api: &Arc<MockApi>, dir: &TempDir) -> SessionStore {
    SessionStore::new(api.clone(), TokenStore::new(dir.path()))
}

#[tokio::test]
async fn test_login_verify_and_restore() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockApi::new());

    let mut store = session(&api, &dir);
    assert_eq!(store.init().await.unwrap(), None);
    assert!(!store.is_authenticated());

    let message = store.login("ada@example.com").await.unwrap();
    assert_eq!(message, "OTP sent to your mail");
    assert_eq!(store.pending_email(), Some("ada@example.com"));

    let code = OtpCode::parse(VALID_CODE).unwrap();
    let verified = store.verify(&code).await.unwrap();
    assert_eq!(verified.user.email, "ada@example.com");
    assert!(store.is_authenticated());
    assert_eq!(store.pending_email(), None);
    assert_eq!(api.current_token().as_deref(), Some(VALID_TOKEN));

    // A fresh process picks the session up from disk
    let restored_api = Arc::new(MockApi::new());
    let mut restored = session(&restored_api, &dir);
    assert_eq!(restored.init().await.unwrap(), Some(ada()));
    assert!(restored.is_authenticated());
}

#[tokio::test]
async fn test_wrong_code_keeps_pending_login() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockApi::new());
    let mut store = session(&api, &dir);

    store.login("ada@example.com").await.unwrap();
    let error = store
        .verify(&OtpCode::parse("000000").unwrap())
        .await
        .unwrap_err();

    assert_eq!(error.user_message(), "Invalid OTP");
    assert!(!store.is_authenticated());
    assert_eq!(store.pending_email(), Some("ada@example.com"));
    assert!(!TokenStore::new(dir.path()).path().exists());
}

#[tokio::test]
async fn test_verify_requires_login_first() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockApi::new());
    let mut store = session(&api, &dir);

    let result = store.verify(&OtpCode::parse(VALID_CODE).unwrap()).await;
    assert!(matches!(result, Err(ChatError::InvalidEmail(_))));
}

#[tokio::test]
async fn test_invalid_email_is_not_sent() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockApi::new());
    let mut store = session(&api, &dir);

    assert!(matches!(
        store.login("not-an-email").await,
        Err(ChatError::InvalidEmail(_))
    ));
    assert!(api.login_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_resend_countdown() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockApi::new());
    let mut store = session(&api, &dir);

    store.login("ada@example.com").await.unwrap();

    let now = Instant::now();
    assert!(matches!(
        store.resend(now).await,
        Err(ChatError::ResendTooSoon(secs)) if secs > 0 && secs <= 60
    ));

    let later = now + Duration::from_secs(61);
    store.resend(later).await.unwrap();
    assert_eq!(api.login_calls.lock().unwrap().len(), 2);
    assert_eq!(store.resend_remaining_secs(later), Some(60));
}

#[tokio::test]
async fn test_rejected_token_is_removed() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let tokens = TokenStore::new(dir.path());
    tokens.save("tok-stale", Utc::now()).await.unwrap();

    let api = Arc::new(MockApi::new());
    let mut store = session(&api, &dir);

    assert_eq!(store.init().await.unwrap(), None);
    assert!(!tokens.path().exists());
    assert_eq!(api.current_token(), None);
}

#[tokio::test]
async fn test_offline_start_keeps_token() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let tokens = TokenStore::new(dir.path());
    tokens.save(VALID_TOKEN, Utc::now()).await.unwrap();

    let api = Arc::new(MockApi::new());
    api.set_offline(true);
    let mut store = session(&api, &dir);

    let error = store.init().await.unwrap_err();
    assert!(error.is_recoverable());
    assert!(tokens.path().exists());
}

#[tokio::test]
async fn test_logout_removes_token() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockApi::new());
    let mut store = session(&api, &dir);

    store.login("ada@example.com").await.unwrap();
    store.verify(&OtpCode::parse(VALID_CODE).unwrap()).await.unwrap();
    store.logout().await.unwrap();

    assert!(!store.is_authenticated());
    assert_eq!(api.current_token(), None);
    assert!(!TokenStore::new(dir.path()).path().exists());
}

#[tokio::test]
async fn test_directory_search_excludes_self() {
    init_tracing();
    let api = Arc::new(
        MockApi::new().with_users(vec![
            User::new("u3", "carol", "carol@example.com"),
            ada(),
            User::new("u2", "Bob", "bob@example.com"),
            User::new("u2", "Bob", "bob@example.com"),
        ]),
    );
    *api.token.lock().unwrap() = Some(VALID_TOKEN.to_string());

    let mut directory = DirectoryCache::new(api);
    assert_eq!(directory.refresh_users().await.unwrap(), 3);

    let names: Vec<&str> = directory.users().iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Ada Lovelace", "Bob", "carol"]);

    let all: Vec<&str> = directory
        .search("", "u1")
        .iter()
        .map(|u| u.id.as_str())
        .collect();
    assert_eq!(all, ["u2", "u3"]);

    assert!(directory.search("ada", "u1").is_empty());
    assert_eq!(directory.search("EXAMPLE", "u1").len(), 2);
    assert_eq!(directory.user("u3").unwrap().name, "carol");
}

#[tokio::test]
async fn test_conversation_refresh_failure_keeps_state() {
    init_tracing();
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let api = Arc::new(MockApi::new().with_conversations(vec![
        Conversation::new("c1", User::new("u2", "Bob", "bob@example.com"), at),
    ]));
    *api.token.lock().unwrap() = Some(VALID_TOKEN.to_string());

    let directory = DirectoryCache::new(api.clone());
    let mut reconciler = Reconciler::new("u1");
    assert_eq!(directory.refresh_conversations(&mut reconciler).await.unwrap(), 1);

    api.set_offline(true);
    assert!(directory.refresh_conversations(&mut reconciler).await.is_err());
    assert_eq!(reconciler.conversations().len(), 1);
}
