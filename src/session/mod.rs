// src/session/mod.rs — Session authority
//
// Bearer tokens tied to one account. Issuing a session supersedes all prior
// sessions for that account; expiry is checked lazily at validate time, so
// no background sweep touches session rows.

use std::sync::MutexGuard;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::infra::config::{BillingConfig, SessionConfig};
use crate::infra::errors::SurveyorError;
use crate::store::{SharedStore, Store};

/// Minimal read-only projection of an account, returned by validate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AccountView {
    pub account_id: String,
    pub display_name: String,
    pub balance: i64,
}

pub struct SessionAuthority {
    store: SharedStore,
    config: SessionConfig,
    starting_credits: i64,
}

impl SessionAuthority {
    pub fn new(store: SharedStore, config: SessionConfig, billing: &BillingConfig) -> Self {
        Self {
            store,
            config,
            starting_credits: billing.starting_credits,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>, SurveyorError> {
        self.store
            .lock()
            .map_err(|_| SurveyorError::Other(anyhow::anyhow!("store mutex poisoned")))
    }

    /// Register a new account and open its first session.
    /// Returns (account view, session token).
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(AccountView, String), SurveyorError> {
        let store = self.store()?;

        if let Some(existing) = store.find_account_by_login(email)? {
            if existing.email.as_deref() == Some(email) {
                return Err(SurveyorError::EmailTaken);
            }
        }
        if store.find_account_by_login(username)?.is_some() {
            return Err(SurveyorError::UsernameTaken);
        }

        let account_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        store.insert_account(
            &account_id,
            username,
            email,
            &digest_password(password),
            self.starting_credits,
            &now.to_rfc3339(),
        )?;

        let token = self.issue_session(&store, &account_id, now)?;
        Ok((
            AccountView {
                account_id,
                display_name: username.to_string(),
                balance: self.starting_credits,
            },
            token,
        ))
    }

    /// Verify credentials and open a new session, superseding any prior one.
    pub fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<(AccountView, String), SurveyorError> {
        let store = self.store()?;

        let account = store
            .find_account_by_login(username_or_email)?
            .ok_or(SurveyorError::BadCredentials)?;

        let digest = account
            .password_digest
            .as_deref()
            .ok_or(SurveyorError::BadCredentials)?;
        if !verify_password(password, digest) {
            return Err(SurveyorError::BadCredentials);
        }
        if !account.is_active {
            return Err(SurveyorError::AccountInactive);
        }

        let now = Utc::now();
        store.touch_account(&account.account_id, &now.to_rfc3339())?;
        let token = self.issue_session(&store, &account.account_id, now)?;

        Ok((
            AccountView {
                display_name: account
                    .username
                    .clone()
                    .unwrap_or_else(|| account.account_id.clone()),
                account_id: account.account_id,
                balance: account.credits,
            },
            token,
        ))
    }

    /// Open a session for a known account id (admin / test entry point).
    pub fn create_session(&self, account_id: &str) -> Result<String, SurveyorError> {
        let store = self.store()?;
        self.issue_session(&store, account_id, Utc::now())
    }

    fn issue_session(
        &self,
        store: &Store,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SurveyorError> {
        let token = generate_token();
        let expires_at = now + Duration::hours(self.config.ttl_hours);
        store.create_session(&token, account_id, &now.to_rfc3339(), &expires_at.to_rfc3339())?;
        Ok(token)
    }

    /// Resolve a bearer token to its account. Fails closed: unknown,
    /// inactive, expired, and superseded sessions all surface as the same
    /// InvalidToken.
    pub fn validate(&self, token: &str) -> Result<AccountView, SurveyorError> {
        let store = self.store()?;

        let session = store
            .find_session(token)?
            .ok_or(SurveyorError::InvalidToken)?;
        if !session.active {
            return Err(SurveyorError::InvalidToken);
        }

        let expires_at = DateTime::parse_from_rfc3339(&session.expires_at)
            .map_err(|_| SurveyorError::InvalidToken)?
            .with_timezone(&Utc);
        if Utc::now() >= expires_at {
            return Err(SurveyorError::InvalidToken);
        }

        let account = store
            .find_account(&session.account_id)?
            .ok_or(SurveyorError::InvalidToken)?;
        if !account.is_active {
            return Err(SurveyorError::InvalidToken);
        }

        Ok(AccountView {
            display_name: account
                .username
                .clone()
                .unwrap_or_else(|| account.account_id.clone()),
            account_id: account.account_id,
            balance: account.credits,
        })
    }

    /// Mark the session inactive. Idempotent; returns whether an active
    /// session was found.
    pub fn invalidate(&self, token: &str) -> Result<bool, SurveyorError> {
        Ok(self.store()?.end_session(token, "logout")?)
    }
}

/// Generate an unguessable fixed-length bearer token (32 random bytes, hex).
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).expect("OS random source unavailable");
    hex::encode(bytes)
}

/// Salted SHA-256 digest, stored as "salt$hash". Hashing scheme is a policy
/// seam; swap in a KDF without touching callers.
fn digest_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt).expect("OS random source unavailable");
    let salt_hex = hex::encode(salt);
    format!("{}${}", salt_hex, hash_with_salt(&salt_hex, password))
}

fn verify_password(password: &str, digest: &str) -> bool {
    let Some((salt, expected)) = digest.split_once('$') else {
        return false;
    };
    constant_time_eq(
        hash_with_salt(salt, password).as_bytes(),
        expected.as_bytes(),
    )
}

fn hash_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte comparison to prevent timing attacks on verification.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_authority() -> SessionAuthority {
        let store = crate::store::in_memory().unwrap();
        SessionAuthority::new(store, SessionConfig::default(), &BillingConfig::default())
    }

    #[test]
    fn test_token_is_fixed_length_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_round_trip() {
        let digest = digest_password("hunter2");
        assert!(verify_password("hunter2", &digest));
        assert!(!verify_password("hunter3", &digest));
    }

    #[test]
    fn test_digest_is_salted() {
        assert_ne!(digest_password("same"), digest_password("same"));
    }

    #[test]
    fn test_register_then_validate() {
        let authority = test_authority();
        let (account, token) = authority
            .register("ada", "ada@example.com", "pw")
            .unwrap();

        let view = authority.validate(&token).unwrap();
        assert_eq!(view.account_id, account.account_id);
        assert_eq!(view.display_name, "ada");
        assert_eq!(view.balance, 10);
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let authority = test_authority();
        authority.register("ada", "ada@example.com", "pw").unwrap();

        let err = authority
            .register("grace", "ada@example.com", "pw")
            .unwrap_err();
        assert!(matches!(err, SurveyorError::EmailTaken));
    }

    #[test]
    fn test_register_rejects_duplicate_username() {
        let authority = test_authority();
        authority.register("ada", "ada@example.com", "pw").unwrap();

        let err = authority
            .register("ada", "other@example.com", "pw")
            .unwrap_err();
        assert!(matches!(err, SurveyorError::UsernameTaken));
    }

    #[test]
    fn test_login_wrong_password() {
        let authority = test_authority();
        authority.register("ada", "ada@example.com", "pw").unwrap();

        let err = authority.login("ada", "wrong").unwrap_err();
        assert!(matches!(err, SurveyorError::BadCredentials));
    }

    #[test]
    fn test_login_by_email() {
        let authority = test_authority();
        authority.register("ada", "ada@example.com", "pw").unwrap();

        let (view, _token) = authority.login("ada@example.com", "pw").unwrap();
        assert_eq!(view.display_name, "ada");
    }

    #[test]
    fn test_new_login_supersedes_previous_session() {
        let authority = test_authority();
        let (_, first) = authority.register("ada", "ada@example.com", "pw").unwrap();
        let (_, second) = authority.login("ada", "pw").unwrap();

        assert!(authority.validate(&first).is_err());
        assert!(authority.validate(&second).is_ok());
    }

    #[test]
    fn test_expired_session_never_validates() {
        let store = crate::store::in_memory().unwrap();
        let authority = SessionAuthority::new(
            store,
            SessionConfig { ttl_hours: 0 },
            &BillingConfig::default(),
        );
        let (_, token) = authority.register("ada", "ada@example.com", "pw").unwrap();

        // TTL of zero hours: expiry == issuance, so the row is still
        // active = 1 but past its expiry.
        let err = authority.validate(&token).unwrap_err();
        assert!(matches!(err, SurveyorError::InvalidToken));
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let authority = test_authority();
        let (_, token) = authority.register("ada", "ada@example.com", "pw").unwrap();

        assert!(authority.invalidate(&token).unwrap());
        assert!(!authority.invalidate(&token).unwrap());
        assert!(authority.validate(&token).is_err());
    }

    #[test]
    fn test_unknown_token_is_invalid() {
        let authority = test_authority();
        assert!(matches!(
            authority.validate("not-a-token").unwrap_err(),
            SurveyorError::InvalidToken
        ));
    }
}
