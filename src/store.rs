//! Account entity and the collaborator traits the sign-in core consumes.
//!
//! Persistence, password hashing, and session transport are external
//! concerns. Implement these traits for your database / hasher / cookie
//! layer; the in-memory implementations in [`test`] back the crate's own
//! tests and are available to downstream tests via the `test-support`
//! feature.

use crate::error::Result;
use async_trait::async_trait;
use std::time::SystemTime;

/// An external login attached to an account (e.g. an OAuth identity).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalLogin {
    /// The login provider (e.g. "github").
    pub provider: String,
    /// The provider's key for this account.
    pub provider_key: String,
}

/// The account entity operated on by the sign-in core.
///
/// `security_stamp`, `failed_access_count`, and `lockout_end` are mutated
/// only through this crate's operations; callers that write them directly
/// break token revocation and lockout invariants.
#[derive(Clone, Debug)]
pub struct Account {
    /// Unique, opaque id.
    pub id: String,
    /// Unique normalized name (e.g. lowercased email).
    pub name: String,
    /// Opaque password hash, owned by the external hasher.
    pub password_hash: String,
    /// Opaque random value regenerated on any sensitive mutation. Every
    /// stamp-bound token derives from the current value, so rotating it
    /// invalidates all outstanding tokens at once.
    pub security_stamp: String,
    /// Base32-encoded authenticator secret, independent of the stamp.
    pub authenticator_key: Option<String>,
    /// Whether two-factor is enabled for this account.
    pub two_factor_enabled: bool,
    /// Whether the account's email has been confirmed.
    pub email_confirmed: bool,
    /// Consecutive failed access attempts since the last success or lockout.
    pub failed_access_count: u32,
    /// Exclusive end of the current lockout window, if any.
    pub lockout_end: Option<SystemTime>,
    /// Whether lockout can ever trigger for this account. Permanently false
    /// for account types created before lockout support existed.
    pub lockout_enabled: bool,
    /// External logins attached to this account.
    pub external_logins: Vec<ExternalLogin>,
    /// Optimistic concurrency token; the store refreshes it on every update
    /// and rejects writes made against a stale value.
    pub concurrency_stamp: String,
}

impl Account {
    /// Create a new account with a fresh security stamp and no credentials.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            password_hash: String::new(),
            security_stamp: uuid::Uuid::new_v4().to_string(),
            authenticator_key: None,
            two_factor_enabled: false,
            email_confirmed: false,
            failed_access_count: 0,
            lockout_end: None,
            lockout_enabled: true,
            external_logins: Vec::new(),
            concurrency_stamp: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Outcome of an atomic recovery-code redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryRedemption {
    /// The code was valid and has now been consumed.
    Redeemed {
        /// Codes left in the current batch.
        remaining: usize,
    },
    /// The code belonged to the current batch but was already consumed.
    AlreadyUsed,
    /// The code was never issued (or belongs to a discarded batch).
    Invalid,
}

/// Trait for account storage operations.
///
/// `update` must be conditioned on the `concurrency_stamp` read at decision
/// time so that concurrent failed-attempt counting cannot lose writes;
/// `redeem_recovery_code` must be an atomic remove-if-present so that
/// concurrent redemptions of the same code allow at most one success.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by its unique id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;

    /// Find an account by its normalized name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Account>>;

    /// Find an account by an attached external login.
    async fn find_by_login(&self, provider: &str, provider_key: &str) -> Result<Option<Account>>;

    /// Persist an updated account.
    ///
    /// Fails with [`SeawallError::ConcurrencyConflict`](crate::SeawallError::ConcurrencyConflict)
    /// when the stored `concurrency_stamp` no longer matches the one on
    /// `account`. Returns the account with a refreshed stamp on success.
    async fn update(&self, account: Account) -> Result<Account>;

    /// Atomically replace the account's recovery codes with a new batch,
    /// discarding all codes (used or not) from any previous batch.
    async fn replace_recovery_codes(&self, account_id: &str, codes: &[String]) -> Result<()>;

    /// Atomically redeem a recovery code (remove-if-present).
    async fn redeem_recovery_code(
        &self,
        account_id: &str,
        code: &str,
    ) -> Result<RecoveryRedemption>;

    /// Count of unredeemed codes in the current batch.
    async fn recovery_codes_remaining(&self, account_id: &str) -> Result<usize>;
}

/// Outcome of a password verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordCheck {
    /// The password matches.
    Success,
    /// The password matches, but the hash was produced with outdated
    /// parameters and should be transparently re-hashed.
    SuccessRehashNeeded,
    /// The password does not match.
    Failed,
}

/// Trait for the external password hasher.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    /// Verify a candidate password against a stored hash.
    async fn verify(&self, stored_hash: &str, candidate: &str) -> Result<PasswordCheck>;

    /// Hash a password. Used for transparent rehash upgrades and for the
    /// dummy verification performed when an account does not exist (keeps
    /// unknown-name timing comparable to wrong-password timing).
    async fn hash(&self, password: &str) -> Result<String>;
}

/// How a session was authenticated, recorded by the session layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticationMethod {
    /// Password only.
    Password,
    /// Password plus a two-factor code.
    TwoFactor,
    /// Password plus a recovery code.
    RecoveryCode,
    /// An external login provider.
    External,
}

/// Trait for the external session/cookie transport.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Establish an authenticated session for an account.
    async fn establish_session(
        &self,
        account_id: &str,
        persistent: bool,
        method: AuthenticationMethod,
    ) -> Result<()>;

    /// Sign out of the named scheme.
    async fn sign_out(&self, scheme: &str) -> Result<()>;
}

#[async_trait]
impl<T: SessionManager + ?Sized> SessionManager for std::sync::Arc<T> {
    async fn establish_session(
        &self,
        account_id: &str,
        persistent: bool,
        method: AuthenticationMethod,
    ) -> Result<()> {
        (**self).establish_session(account_id, persistent, method).await
    }

    async fn sign_out(&self, scheme: &str) -> Result<()> {
        (**self).sign_out(scheme).await
    }
}

/// Pre-sign-in policy check, run before any credential verification.
///
/// The `()` implementation allows everyone, the way optional collaborators
/// default to no-ops elsewhere in this crate.
#[async_trait]
pub trait SignInPolicy: Send + Sync {
    /// Whether this account is currently allowed to sign in at all.
    async fn can_sign_in(&self, account: &Account) -> Result<bool>;
}

#[async_trait]
impl SignInPolicy for () {
    async fn can_sign_in(&self, _account: &Account) -> Result<bool> {
        Ok(true)
    }
}

/// Policy requiring a confirmed email before sign-in.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequireConfirmedEmail;

#[async_trait]
impl SignInPolicy for RequireConfirmedEmail {
    async fn can_sign_in(&self, account: &Account) -> Result<bool> {
        Ok(account.email_confirmed)
    }
}

/// In-memory implementations for testing.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use super::*;
    use crate::error::SeawallError;
    use std::collections::{HashMap, HashSet};
    use std::sync::RwLock;

    #[derive(Default)]
    struct RecoveryState {
        codes: HashSet<String>,
        used: HashSet<String>,
    }

    /// In-memory account store for testing.
    #[derive(Default)]
    pub struct InMemoryAccountStore {
        accounts: RwLock<HashMap<String, Account>>,
        recovery: RwLock<HashMap<String, RecoveryState>>,
    }

    impl InMemoryAccountStore {
        /// Create a new in-memory store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed an account into the store.
        pub fn add_account(&self, account: Account) {
            self.accounts
                .write()
                .unwrap()
                .insert(account.id.clone(), account);
        }

        /// Read an account back directly (bypasses the trait for assertions).
        pub fn get(&self, id: &str) -> Option<Account> {
            self.accounts.read().unwrap().get(id).cloned()
        }
    }

    #[async_trait]
    impl AccountStore for InMemoryAccountStore {
        async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
            Ok(self.accounts.read().unwrap().get(id).cloned())
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Account>> {
            Ok(self
                .accounts
                .read()
                .unwrap()
                .values()
                .find(|a| a.name == name)
                .cloned())
        }

        async fn find_by_login(
            &self,
            provider: &str,
            provider_key: &str,
        ) -> Result<Option<Account>> {
            Ok(self
                .accounts
                .read()
                .unwrap()
                .values()
                .find(|a| {
                    a.external_logins
                        .iter()
                        .any(|l| l.provider == provider && l.provider_key == provider_key)
                })
                .cloned())
        }

        async fn update(&self, mut account: Account) -> Result<Account> {
            let mut accounts = self.accounts.write().unwrap();
            let stored = accounts
                .get_mut(&account.id)
                .ok_or_else(|| SeawallError::ConcurrencyConflict("account deleted".into()))?;
            if stored.concurrency_stamp != account.concurrency_stamp {
                return Err(SeawallError::ConcurrencyConflict(format!(
                    "stale write for account {}",
                    account.id
                )));
            }
            account.concurrency_stamp = uuid::Uuid::new_v4().to_string();
            *stored = account.clone();
            Ok(account)
        }

        async fn replace_recovery_codes(&self, account_id: &str, codes: &[String]) -> Result<()> {
            let mut recovery = self.recovery.write().unwrap();
            let state = recovery.entry(account_id.to_string()).or_default();
            state.codes = codes.iter().cloned().collect();
            state.used.clear();
            Ok(())
        }

        async fn redeem_recovery_code(
            &self,
            account_id: &str,
            code: &str,
        ) -> Result<RecoveryRedemption> {
            let mut recovery = self.recovery.write().unwrap();
            let state = recovery.entry(account_id.to_string()).or_default();
            if state.codes.remove(code) {
                state.used.insert(code.to_string());
                Ok(RecoveryRedemption::Redeemed {
                    remaining: state.codes.len(),
                })
            } else if state.used.contains(code) {
                Ok(RecoveryRedemption::AlreadyUsed)
            } else {
                Ok(RecoveryRedemption::Invalid)
            }
        }

        async fn recovery_codes_remaining(&self, account_id: &str) -> Result<usize> {
            Ok(self
                .recovery
                .read()
                .unwrap()
                .get(account_id)
                .map(|s| s.codes.len())
                .unwrap_or(0))
        }
    }

    /// Plain-text password "hasher" for testing. Hashes are `plain:{pw}`;
    /// hashes prefixed `legacy:` verify but report a rehash is needed.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct PlainTextVerifier;

    #[async_trait]
    impl PasswordVerifier for PlainTextVerifier {
        async fn verify(&self, stored_hash: &str, candidate: &str) -> Result<PasswordCheck> {
            if let Some(pw) = stored_hash.strip_prefix("plain:") {
                if pw == candidate {
                    return Ok(PasswordCheck::Success);
                }
            }
            if let Some(pw) = stored_hash.strip_prefix("legacy:") {
                if pw == candidate {
                    return Ok(PasswordCheck::SuccessRehashNeeded);
                }
            }
            Ok(PasswordCheck::Failed)
        }

        async fn hash(&self, password: &str) -> Result<String> {
            Ok(format!("plain:{password}"))
        }
    }

    /// Session manager that records established sessions for assertions.
    #[derive(Default)]
    pub struct RecordingSessionManager {
        sessions: RwLock<Vec<(String, bool, AuthenticationMethod)>>,
        sign_outs: RwLock<Vec<String>>,
    }

    impl RecordingSessionManager {
        /// Create a new recording session manager.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Sessions established so far.
        pub fn sessions(&self) -> Vec<(String, bool, AuthenticationMethod)> {
            self.sessions.read().unwrap().clone()
        }

        /// Schemes signed out so far.
        pub fn sign_outs(&self) -> Vec<String> {
            self.sign_outs.read().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionManager for RecordingSessionManager {
        async fn establish_session(
            &self,
            account_id: &str,
            persistent: bool,
            method: AuthenticationMethod,
        ) -> Result<()> {
            self.sessions
                .write()
                .unwrap()
                .push((account_id.to_string(), persistent, method));
            Ok(())
        }

        async fn sign_out(&self, scheme: &str) -> Result<()> {
            self.sign_outs.write().unwrap().push(scheme.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::*;
    use super::*;

    #[tokio::test]
    async fn update_rejects_stale_concurrency_stamp() {
        let store = InMemoryAccountStore::new();
        let account = Account::new("alice");
        store.add_account(account.clone());

        // First writer wins and refreshes the stamp.
        let mut first = account.clone();
        first.failed_access_count = 1;
        store.update(first).await.unwrap();

        // Second writer still holds the original stamp.
        let mut second = account;
        second.failed_access_count = 1;
        let err = store.update(second).await.unwrap_err();
        assert!(matches!(
            err,
            crate::SeawallError::ConcurrencyConflict(_)
        ));
    }

    #[tokio::test]
    async fn redeem_distinguishes_used_from_unknown() {
        let store = InMemoryAccountStore::new();
        store
            .replace_recovery_codes("a1", &["AAAAA-BBBBB".to_string()])
            .await
            .unwrap();

        assert_eq!(
            store.redeem_recovery_code("a1", "AAAAA-BBBBB").await.unwrap(),
            RecoveryRedemption::Redeemed { remaining: 0 }
        );
        assert_eq!(
            store.redeem_recovery_code("a1", "AAAAA-BBBBB").await.unwrap(),
            RecoveryRedemption::AlreadyUsed
        );
        assert_eq!(
            store.redeem_recovery_code("a1", "CCCCC-DDDDD").await.unwrap(),
            RecoveryRedemption::Invalid
        );
    }

    #[tokio::test]
    async fn plain_text_verifier_reports_rehash() {
        let verifier = PlainTextVerifier;
        assert_eq!(
            verifier.verify("plain:pw", "pw").await.unwrap(),
            PasswordCheck::Success
        );
        assert_eq!(
            verifier.verify("legacy:pw", "pw").await.unwrap(),
            PasswordCheck::SuccessRehashNeeded
        );
        assert_eq!(
            verifier.verify("plain:pw", "nope").await.unwrap(),
            PasswordCheck::Failed
        );
    }
}
