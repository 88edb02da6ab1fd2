use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::storage::{attr_str, Item, SharedStore};

use super::gate::strip_bearer;
use super::password::PasswordHasher;
use super::token::{generate_token, token_hint};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues sessions on login and resolves tokens back to usernames.
///
/// A session is valid iff its record exists and `now <= expires_at`. Records are
/// never updated; expired ones stay in the table until the sweeper removes them.
pub struct SessionManager {
    store: SharedStore,
    hasher: PasswordHasher,
    users_table: String,
    sessions_table: String,
    ttl: chrono::Duration,
    dummy_digest: OnceCell<String>,
}

impl SessionManager {
    pub fn new(store: SharedStore, cfg: &AppConfig, hasher: PasswordHasher) -> Self {
        let ttl = chrono::Duration::from_std(cfg.session_ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        Self {
            store,
            hasher,
            users_table: cfg.users_table.clone(),
            sessions_table: cfg.sessions_table.clone(),
            ttl,
            dummy_digest: OnceCell::new(),
        }
    }

    pub fn hasher(&self) -> &PasswordHasher { &self.hasher }

    pub fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        self.login_at(email, password, Utc::now())
    }

    pub fn login_at(&self, email: &str, password: &str, now: DateTime<Utc>) -> AppResult<LoginOutcome> {
        let matches = self.store.query_eq(&self.users_table, "email", email)?;
        if matches.len() > 1 {
            warn!(target: "agendum::identity", count = matches.len(), "several credential records share one email; using the first");
        }
        let Some(user) = matches.into_iter().next() else {
            // Equalise timing with the wrong-password path
            let _ = self.hasher.verify(password, self.dummy_digest());
            debug!(target: "agendum::identity", "login rejected");
            return Err(AppError::InvalidCredentials);
        };
        let stored = attr_str(&user, "password").unwrap_or_default();
        if !self.hasher.verify(password, stored) {
            debug!(target: "agendum::identity", "login rejected");
            return Err(AppError::InvalidCredentials);
        }
        let Some(username) = attr_str(&user, "username").filter(|u| !u.is_empty()).map(str::to_string) else {
            warn!(target: "agendum::identity", "credential record without username");
            return Err(AppError::InvalidCredentials);
        };

        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            AppError::internal(format!("session expiry out of range for ttl {}s", self.ttl.num_seconds()))
        })?;
        let token = generate_token()?;
        let mut record = Item::new();
        record.insert("token".into(), json!(token));
        record.insert("username".into(), json!(username));
        record.insert("expires_at".into(), json!(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)));
        self.store.put_item(&self.sessions_table, record)?;
        info!(target: "agendum::identity", user = %username, token = token_hint(&token), "session issued");
        Ok(LoginOutcome { username, token, expires_at })
    }

    /// Resolve a raw header value (with or without `Bearer `) to the session's username.
    pub fn validate(&self, raw: &str) -> AppResult<String> {
        self.validate_at(raw, Utc::now())
    }

    pub fn validate_at(&self, raw: &str, now: DateTime<Utc>) -> AppResult<String> {
        let token = strip_bearer(raw);
        if token.is_empty() {
            return Err(AppError::Unauthenticated);
        }
        let record = match self.store.get_item(&self.sessions_table, token) {
            Ok(Some(r)) => r,
            Ok(None) => {
                debug!(target: "agendum::identity", token = token_hint(token), "unknown session token");
                return Err(AppError::Unauthenticated);
            }
            Err(e) => {
                warn!(target: "agendum::identity", "session lookup failed: {e}");
                return Err(AppError::Unauthenticated);
            }
        };
        if !session_is_live(&record, now) {
            debug!(target: "agendum::identity", token = token_hint(token), "expired or malformed session");
            return Err(AppError::Unauthenticated);
        }
        attr_str(&record, "username")
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or(AppError::Unauthenticated)
    }

    /// Physically remove sessions that can no longer validate.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        Ok(self.store.sweep(&self.sessions_table, &|item: &Item| session_is_live(item, now))?)
    }

    fn dummy_digest(&self) -> &str {
        self.dummy_digest.get_or_init(|| match self.hasher.hash("agendum-login-filler") {
            Ok(digest) => digest,
            Err(e) => {
                warn!(target: "agendum::identity", "no filler digest, unknown-email logins will skip the hash work: {e}");
                String::new()
            }
        })
    }
}

/// A session record validates at `now` iff its expiry parses and is not in the past.
pub fn session_is_live(record: &Item, now: DateTime<Utc>) -> bool {
    attr_str(record, "expires_at")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|exp| now <= exp.with_timezone(&Utc))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::error::MSG_INTERNAL;
    use crate::storage::testing::DownStore;
    use crate::storage::MemoryStore;

    fn setup() -> (SessionManager, SharedStore) {
        let cfg = AppConfig::default();
        let store: SharedStore = Arc::new(MemoryStore::for_config(&cfg));
        let hasher = PasswordHasher::with_cost(64, 1).unwrap();
        let mut bob = Item::new();
        bob.insert("username".into(), json!("bob"));
        bob.insert("email".into(), json!("bob@x.com"));
        bob.insert("password".into(), json!(hasher.hash("s3cret!").unwrap()));
        store.put_item(&cfg.users_table, bob).unwrap();
        (SessionManager::new(store.clone(), &cfg, hasher), store)
    }

    fn put_session(store: &SharedStore, token: &str, username: &str, expires_at: &str) {
        let mut rec = Item::new();
        rec.insert("token".into(), json!(token));
        rec.insert("username".into(), json!(username));
        rec.insert("expires_at".into(), json!(expires_at));
        store.put_item("Sessions", rec).unwrap();
    }

    #[test]
    fn login_then_validate_returns_username() {
        let (sm, _) = setup();
        let out = sm.login("bob@x.com", "s3cret!").unwrap();
        assert_eq!(out.username, "bob");
        assert!(!out.token.is_empty());
        assert_eq!(sm.validate(&out.token).unwrap(), "bob");
        assert_eq!(sm.validate(&format!("Bearer {}", out.token)).unwrap(), "bob");
    }

    #[test]
    fn login_sets_expiry_one_ttl_ahead() {
        let (sm, store) = setup();
        let now = Utc::now();
        let out = sm.login_at("bob@x.com", "s3cret!", now).unwrap();
        assert_eq!(out.expires_at, now + chrono::Duration::hours(24));
        let rec = store.get_item("Sessions", &out.token).unwrap().unwrap();
        assert_eq!(attr_str(&rec, "username"), Some("bob"));
        assert!(attr_str(&rec, "expires_at").unwrap().ends_with('Z'));
    }

    #[test]
    fn unknown_email_and_wrong_password_look_the_same() {
        let (sm, _) = setup();
        let a = sm.login("bob@x.com", "wrong").unwrap_err();
        let b = sm.login("nonexistent@example.com", "anything").unwrap_err();
        assert!(matches!(a, AppError::InvalidCredentials));
        assert!(matches!(b, AppError::InvalidCredentials));
        assert_eq!(a.http_status(), b.http_status());
        assert_eq!(a.client_message(), b.client_message());
    }

    #[test]
    fn email_match_is_exact() {
        let (sm, _) = setup();
        assert!(matches!(sm.login("BOB@x.com", "s3cret!"), Err(AppError::InvalidCredentials)));
    }

    #[test]
    fn concurrent_sessions_are_independent() {
        let (sm, _) = setup();
        let a = sm.login("bob@x.com", "s3cret!").unwrap();
        let b = sm.login("bob@x.com", "s3cret!").unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(sm.validate(&a.token).unwrap(), "bob");
        assert_eq!(sm.validate(&b.token).unwrap(), "bob");
    }

    #[test]
    fn unknown_or_empty_tokens_are_unauthenticated() {
        let (sm, _) = setup();
        for raw in ["garbage", "", "Bearer ", "Bearer garbage"] {
            assert!(matches!(sm.validate(raw), Err(AppError::Unauthenticated)), "{raw:?}");
        }
    }

    #[test]
    fn bearer_prefix_is_case_sensitive() {
        let (sm, _) = setup();
        let out = sm.login("bob@x.com", "s3cret!").unwrap();
        assert!(sm.validate(&format!("bearer {}", out.token)).is_err());
    }

    #[test]
    fn expired_session_fails_even_though_record_exists() {
        let (sm, store) = setup();
        put_session(&store, "old-token", "bob", "2020-01-01T00:00:00Z");
        assert!(matches!(sm.validate("old-token"), Err(AppError::Unauthenticated)));
        assert!(store.get_item("Sessions", "old-token").unwrap().is_some());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let (sm, store) = setup();
        put_session(&store, "edge", "bob", "2030-06-01T12:00:00Z");
        let at = DateTime::parse_from_rfc3339("2030-06-01T12:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(sm.validate_at("edge", at).unwrap(), "bob");
        assert!(sm.validate_at("edge", at + chrono::Duration::seconds(1)).is_err());
    }

    #[test]
    fn malformed_expiry_is_unauthenticated() {
        let (sm, store) = setup();
        put_session(&store, "weird", "bob", "tomorrow-ish");
        assert!(matches!(sm.validate("weird"), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn sweep_drops_only_dead_sessions() {
        let (sm, store) = setup();
        let live = sm.login("bob@x.com", "s3cret!").unwrap();
        put_session(&store, "old", "bob", "2020-01-01T00:00:00Z");
        put_session(&store, "bad", "bob", "???");
        assert_eq!(sm.sweep_expired(Utc::now()).unwrap(), 2);
        assert_eq!(sm.validate(&live.token).unwrap(), "bob");
    }

    #[test]
    fn ttl_past_the_calendar_is_an_error_not_a_panic() {
        let cfg = AppConfig { session_ttl: std::time::Duration::from_secs(10_000_000_000_000), ..AppConfig::default() };
        let store: SharedStore = Arc::new(MemoryStore::for_config(&cfg));
        let hasher = PasswordHasher::with_cost(64, 1).unwrap();
        let mut bob = Item::new();
        bob.insert("username".into(), json!("bob"));
        bob.insert("email".into(), json!("bob@x.com"));
        bob.insert("password".into(), json!(hasher.hash("pw").unwrap()));
        store.put_item(&cfg.users_table, bob).unwrap();
        let sm = SessionManager::new(store.clone(), &cfg, hasher);

        let err = sm.login("bob@x.com", "pw").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.http_status(), 500);
        assert_eq!(sm.sweep_expired(Utc::now()).unwrap(), 0);
    }

    fn down_manager() -> SessionManager {
        SessionManager::new(Arc::new(DownStore), &AppConfig::default(), PasswordHasher::with_cost(64, 1).unwrap())
    }

    #[test]
    fn store_outage_during_validate_is_unauthenticated() {
        let sm = down_manager();
        assert!(matches!(sm.validate("Bearer some-token"), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn store_outage_during_login_is_an_opaque_internal_error() {
        let sm = down_manager();
        let err = sm.login("bob@x.com", "s3cret!").unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.client_message(), MSG_INTERNAL);
        assert!(!err.client_message().contains("refused"));
    }

    #[test]
    fn unknown_email_path_verifies_against_a_real_digest() {
        let (sm, _) = setup();
        assert!(matches!(sm.login("ghost@x.com", "pw"), Err(AppError::InvalidCredentials)));
        assert!(sm.dummy_digest().starts_with("$argon2id$"));
    }
}
