//! Session store
//!
//! Owns the current user identity and the credential token. At startup the
//! stored token (if any, and not expired) is validated against the "who am I"
//! endpoint. Login is two-step: request a code by email, then verify it.

use crate::api::{ChatApi, VerifiedSession};
use crate::models::User;
use crate::otp::{OtpCode, ResendCountdown};
use crate::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Name of the token file inside the data directory
pub const TOKEN_FILE_NAME: &str = "token.json";

/// How long a stored token is considered valid
pub const TOKEN_LIFETIME_DAYS: i64 = 15;

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Token persisted on disk with a fixed expiry
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    lifetime: chrono::Duration,
}

impl TokenStore {
    /// Token store in `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(TOKEN_FILE_NAME),
            lifetime: chrono::Duration::days(TOKEN_LIFETIME_DAYS),
        }
    }

    pub fn with_lifetime_days(mut self, days: i64) -> Self {
        self.lifetime = chrono::Duration::days(days);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token if present and still valid at `now`
    ///
    /// Unreadable or expired files count as no token; expired ones are removed.
    pub async fn load(&self, now: DateTime<Utc>) -> Option<String> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored token at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let stored: StoredToken = match serde_json::from_str(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring malformed token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        if stored.expires_at <= now {
            info!("Stored token expired at {}", stored.expires_at);
            if let Err(e) = self.clear().await {
                warn!("Failed to remove expired token: {}", e);
            }
            return None;
        }

        Some(stored.token)
    }

    /// Persist `token`, valid for the configured lifetime from `now`
    pub async fn save(&self, token: &str, now: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let stored = StoredToken {
            token: token.to_string(),
            expires_at: now + self.lifetime,
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, json).await?;

        debug!("Stored token until {}", stored.expires_at);
        Ok(())
    }

    /// Remove the token file; a missing file is not an error
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingLogin {
    email: String,
    countdown: ResendCountdown,
}

/// Current user and authentication state
pub struct SessionStore {
    api: Arc<dyn ChatApi>,
    tokens: TokenStore,
    user: Option<User>,
    pending: Option<PendingLogin>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn ChatApi>, tokens: TokenStore) -> Self {
        Self {
            api,
            tokens,
            user: None,
            pending: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Email a code was last requested for
    pub fn pending_email(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.email.as_str())
    }

    /// Seconds until a new code may be requested
    pub fn resend_remaining_secs(&self, now: Instant) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|p| p.countdown.remaining_secs(now))
    }

    /// Restore the session from the stored token
    ///
    /// Returns the user when the token is accepted. A rejected token is
    /// removed; transport failures leave it in place for the next start.
    pub async fn init(&mut self) -> Result<Option<User>> {
        let Some(token) = self.tokens.load(Utc::now()).await else {
            return Ok(None);
        };

        self.api.set_token(Some(token)).await;
        match self.api.fetch_current_user().await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                self.user = Some(user.clone());
                Ok(Some(user))
            }
            Err(e) if e.requires_reauth() => {
                info!("Stored token rejected, logging out");
                self.api.set_token(None).await;
                self.tokens.clear().await?;
                Ok(None)
            }
            Err(e) => {
                self.api.set_token(None).await;
                Err(e)
            }
        }
    }

    /// Ask for a verification code to be mailed to `email`
    pub async fn login(&mut self, email: &str) -> Result<String> {
        let email = validate_email(email)?;
        let message = self.api.login(&email).await?;

        info!("Verification code requested for {}", email);
        self.pending = Some(PendingLogin {
            email,
            countdown: ResendCountdown::start(Instant::now()),
        });
        Ok(message)
    }

    /// Request a new code for the pending login once the countdown allows it
    pub async fn resend(&mut self, now: Instant) -> Result<String> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| ChatError::InvalidEmail("enter your email first".to_string()))?;

        if !pending.countdown.can_resend(now) {
            return Err(ChatError::ResendTooSoon(pending.countdown.remaining_secs(now)));
        }

        let email = pending.email.clone();
        let message = self.api.login(&email).await?;

        if let Some(pending) = self.pending.as_mut() {
            pending.countdown.restart(now);
        }
        info!("Verification code re-sent to {}", email);
        Ok(message)
    }

    /// Verify the code for the pending login and persist the token
    pub async fn verify(&mut self, code: &OtpCode) -> Result<VerifiedSession> {
        let email = self
            .pending_email()
            .ok_or_else(|| ChatError::InvalidEmail("enter your email first".to_string()))?
            .to_string();

        let session = self.api.verify_otp(&email, code).await?;

        self.tokens.save(&session.token, Utc::now()).await?;
        self.api.set_token(Some(session.token.clone())).await;
        self.user = Some(session.user.clone());
        self.pending = None;

        info!("Logged in as {}", session.user.email);
        Ok(session)
    }

    /// Forget the session and remove the stored token
    pub async fn logout(&mut self) -> Result<()> {
        self.user = None;
        self.pending = None;
        self.api.set_token(None).await;
        self.tokens.clear().await?;
        info!("Logged out");
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(email.to_string())
        }
        _ => Err(ChatError::InvalidEmail(format!("{:?} is not an email address", email))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("nested"));

        assert_eq!(store.load(now()).await, None);

        store.save("secret", now()).await.unwrap();
        assert_eq!(store.load(now()).await.as_deref(), Some("secret"));
        assert_eq!(
            store.load(now() + chrono::Duration::days(14)).await.as_deref(),
            Some("secret")
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_removed() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        store.save("secret", now()).await.unwrap();

        assert_eq!(store.load(now() + chrono::Duration::days(15)).await, None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_custom_lifetime() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path()).with_lifetime_days(1);
        store.save("secret", now()).await.unwrap();

        assert_eq!(store.load(now() + chrono::Duration::hours(25)).await, None);
    }

    #[tokio::test]
    async fn test_malformed_token_file() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        std::fs::write(store.path(), "eyJhbGciOi").unwrap();

        assert_eq!(store.load(now()).await, None);
    }

    #[tokio::test]
    async fn test_clear_missing_token() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        tokio_test::assert_ok!(store.clear().await);
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" ada@example.com ").unwrap(), "ada@example.com");
        for email in ["", "ada", "@example.com", "ada@"] {
            assert!(matches!(validate_email(email), Err(ChatError::InvalidEmail(_))));
        }
    }
}
