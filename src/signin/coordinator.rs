//! The sign-in state machine.

use crate::config::LockoutOptions;
use crate::error::{Result, SeawallError};
use crate::lockout::{LockoutDecision, LockoutPolicy};
use crate::remembered::RememberedDeviceTracker;
use crate::signin::types::{SignInOutcome, TwoFactorChallenge, TwoFactorResult};
use crate::store::{
    Account, AccountStore, AuthenticationMethod, PasswordCheck, PasswordVerifier, SessionManager,
    SignInPolicy,
};
use crate::token::{provider_names, purpose, TokenService};
use std::sync::Arc;
use std::time::SystemTime;

/// Orchestrates credential check → lockout → two-factor → session.
///
/// States: `Idle → CredentialChecked → {Success | Failed | LockedOut |
/// NotAllowed | TwoFactorRequired} → (TwoFactorPending) → {Success | Failed |
/// LockedOut}`. Each public method drives one externally observable
/// transition; the ephemeral [`TwoFactorChallenge`] is the only state that
/// crosses a method boundary, carried by the host's transport layer.
///
/// # Example
///
/// ```rust,ignore
/// use seawall::{SignInCoordinator, SignInOutcome};
///
/// let coordinator = SignInCoordinator::new(store, hasher, sessions);
/// match coordinator.password_sign_in("alice", "hunter2", false, true, None).await? {
///     SignInOutcome::Success => { /* session established */ }
///     SignInOutcome::TwoFactorRequired(challenge) => { /* prompt for a code */ }
///     other => { /* rejected */ }
/// }
/// ```
pub struct SignInCoordinator<S, H, N, P = ()>
where
    S: AccountStore,
    H: PasswordVerifier,
    N: SessionManager,
    P: SignInPolicy,
{
    store: Arc<S>,
    verifier: H,
    sessions: N,
    policy: P,
    tokens: TokenService<S>,
    remembered: RememberedDeviceTracker,
    lockout: LockoutPolicy,
}

impl<S, H, N> SignInCoordinator<S, H, N, ()>
where
    S: AccountStore + 'static,
    H: PasswordVerifier,
    N: SessionManager,
{
    /// Create a coordinator with default options, the default token
    /// registry, and a permit-all pre-sign-in policy.
    pub fn new(store: Arc<S>, verifier: H, sessions: N) -> Self {
        Self {
            tokens: TokenService::new(store.clone()),
            store,
            verifier,
            sessions,
            policy: (),
            remembered: RememberedDeviceTracker::with_random_key(Default::default()),
            lockout: LockoutPolicy::default(),
        }
    }

    /// Replace the permit-all policy with a real pre-sign-in check.
    pub fn with_policy<P: SignInPolicy>(self, policy: P) -> SignInCoordinator<S, H, N, P> {
        SignInCoordinator {
            store: self.store,
            verifier: self.verifier,
            sessions: self.sessions,
            policy,
            tokens: self.tokens,
            remembered: self.remembered,
            lockout: self.lockout,
        }
    }
}

impl<S, H, N, P> SignInCoordinator<S, H, N, P>
where
    S: AccountStore + 'static,
    H: PasswordVerifier,
    N: SessionManager,
    P: SignInPolicy,
{
    /// Replace the lockout options.
    #[must_use]
    pub fn with_lockout_options(mut self, options: LockoutOptions) -> Self {
        self.lockout = LockoutPolicy::new(options);
        self
    }

    /// Replace the token service (custom registry or purpose mapping).
    #[must_use]
    pub fn with_token_service(mut self, tokens: TokenService<S>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replace the remembered-device tracker (stable signing key).
    #[must_use]
    pub fn with_remembered_device_tracker(mut self, tracker: RememberedDeviceTracker) -> Self {
        self.remembered = tracker;
        self
    }

    /// The token service, for account security operations outside sign-in.
    #[must_use]
    pub fn tokens(&self) -> &TokenService<S> {
        &self.tokens
    }

    /// The remembered-device tracker.
    #[must_use]
    pub fn remembered_devices(&self) -> &RememberedDeviceTracker {
        &self.remembered
    }

    /// Verify a password against an account, applying lockout policy.
    ///
    /// Terminal short-circuits: `NotAllowed` when the pre-sign-in policy
    /// refuses the account, `LockedOut` while a lockout window is open (no
    /// other reason is revealed in that state). Does not establish a
    /// session; see [`password_sign_in`](Self::password_sign_in).
    pub async fn check_password(
        &self,
        account: &Account,
        password: &str,
        lockout_on_failure: bool,
    ) -> Result<SignInOutcome> {
        let (outcome, _) = self
            .check_password_internal(account, password, lockout_on_failure)
            .await?;
        Ok(outcome)
    }

    async fn check_password_internal(
        &self,
        account: &Account,
        password: &str,
        lockout_on_failure: bool,
    ) -> Result<(SignInOutcome, Account)> {
        let now = SystemTime::now();

        if let Some(blocked) = self.pre_sign_in_check(account, now).await? {
            return Ok((blocked, account.clone()));
        }

        match self
            .verifier
            .verify(&account.password_hash, password)
            .await?
        {
            check @ (PasswordCheck::Success | PasswordCheck::SuccessRehashNeeded) => {
                let mut updated = account.clone();
                if check == PasswordCheck::SuccessRehashNeeded {
                    // Transparent upgrade to current hash parameters.
                    updated.password_hash = self.verifier.hash(password).await?;
                }
                updated.failed_access_count = self.lockout.on_success();
                let updated = if updated.failed_access_count != account.failed_access_count
                    || check == PasswordCheck::SuccessRehashNeeded
                {
                    tracing::debug!(
                        target: "signin.lockout.cleared",
                        account_id = %account.id,
                        "Failed-attempt counter cleared on successful password check"
                    );
                    self.store.update(updated).await?
                } else {
                    updated
                };
                Ok((SignInOutcome::Success, updated))
            }
            PasswordCheck::Failed => {
                tracing::debug!(
                    target: "signin.password.rejected",
                    account_id = %account.id,
                    "Password verification failed"
                );
                if lockout_on_failure {
                    let decision = self.lockout.on_failure(account, now);
                    let updated = self.persist_lockout(account, decision).await?;
                    if decision.just_locked {
                        return Ok((SignInOutcome::LockedOut, updated));
                    }
                    return Ok((SignInOutcome::Failed, updated));
                }
                Ok((SignInOutcome::Failed, account.clone()))
            }
        }
    }

    /// Full password sign-in: resolve the account by normalized name, check
    /// the password, then establish a session or issue a two-factor
    /// challenge.
    ///
    /// An unknown name returns `Failed`, indistinguishable from a wrong
    /// password; a dummy hash keeps the timing comparable too.
    pub async fn password_sign_in(
        &self,
        name: &str,
        password: &str,
        persistent: bool,
        lockout_on_failure: bool,
        device_token: Option<&str>,
    ) -> Result<SignInOutcome> {
        let account = match self.store.find_by_name(name).await? {
            Some(account) => account,
            None => {
                let _ = self.verifier.hash(password).await;
                tracing::info!(
                    target: "signin.password.unknown_name",
                    "Sign-in attempt for unknown account name"
                );
                return Ok(SignInOutcome::Failed);
            }
        };

        let (outcome, account) = self
            .check_password_internal(&account, password, lockout_on_failure)
            .await?;
        if !outcome.is_success() {
            return Ok(outcome);
        }

        self.sign_in_or_challenge(&account, persistent, None, device_token)
            .await
    }

    /// Establish a session for an account that passed its first factor, or
    /// issue a two-factor challenge.
    ///
    /// The challenge is issued only when two-factor is enabled, at least one
    /// registered provider can generate codes for the account, and the
    /// device is not remembered.
    pub async fn sign_in_or_challenge(
        &self,
        account: &Account,
        persistent: bool,
        login_provider: Option<&str>,
        device_token: Option<&str>,
    ) -> Result<SignInOutcome> {
        if account.two_factor_enabled {
            let providers = self.tokens.two_factor_providers(account).await;
            let remembered = device_token
                .map(|token| self.remembered.is_remembered(&account.id, token))
                .unwrap_or(false);
            if !providers.is_empty() && !remembered {
                let challenge = match login_provider {
                    Some(provider) => TwoFactorChallenge::for_login(&account.id, provider),
                    None => TwoFactorChallenge::new(&account.id),
                };
                tracing::info!(
                    target: "signin.two_factor.challenge_issued",
                    account_id = %account.id,
                    providers = ?providers,
                    "Two-factor challenge issued"
                );
                return Ok(SignInOutcome::TwoFactorRequired(challenge));
            }
        }

        let method = if login_provider.is_some() {
            AuthenticationMethod::External
        } else {
            AuthenticationMethod::Password
        };
        self.sessions
            .establish_session(&account.id, persistent, method)
            .await?;
        tracing::info!(
            target: "signin.session.established",
            account_id = %account.id,
            persistent = persistent,
            "Session established"
        );
        Ok(SignInOutcome::Success)
    }

    /// Complete a two-factor challenge with a code from a named provider.
    ///
    /// Re-runs the pre-sign-in and lockout checks: account state may have
    /// changed since the challenge was issued. Failed codes count toward the
    /// same lockout counter as failed passwords. An unregistered provider
    /// name is a configuration error and propagates; a valid code submitted
    /// against the wrong provider simply fails.
    pub async fn complete_two_factor(
        &self,
        challenge: &TwoFactorChallenge,
        provider_name: &str,
        code: &str,
        remember_device: bool,
        persistent: bool,
    ) -> Result<TwoFactorResult> {
        let now = SystemTime::now();
        let Some(account) = self.store.find_by_id(&challenge.account_id).await? else {
            tracing::info!(
                target: "signin.two_factor.unresolved_challenge",
                "Two-factor completion for unresolvable account"
            );
            return Ok(TwoFactorResult::of(SignInOutcome::Failed));
        };

        if let Some(blocked) = self.pre_sign_in_check(&account, now).await? {
            return Ok(TwoFactorResult::of(blocked));
        }

        let provider = self.tokens.registry().get(provider_name)?;
        let valid = match provider.validate(purpose::TWO_FACTOR, code, &account).await {
            Ok(valid) => valid,
            Err(
                SeawallError::TokenAlreadyUsed
                | SeawallError::InvalidOrExpiredToken
                | SeawallError::InvalidFormat(_),
            ) => false,
            Err(err) => return Err(err),
        };

        if !valid {
            tracing::warn!(
                target: "signin.two_factor.rejected",
                account_id = %account.id,
                provider = %provider_name,
                "Two-factor code rejected"
            );
            let decision = self.lockout.on_failure(&account, now);
            self.persist_lockout(&account, decision).await?;
            let outcome = if decision.just_locked {
                SignInOutcome::LockedOut
            } else {
                SignInOutcome::Failed
            };
            return Ok(TwoFactorResult::of(outcome));
        }

        let account = self.clear_failed_attempts(account).await?;
        let method = if challenge.login_provider.is_some() {
            AuthenticationMethod::External
        } else {
            AuthenticationMethod::TwoFactor
        };
        self.sessions
            .establish_session(&account.id, persistent, method)
            .await?;

        let remembered_device = remember_device.then(|| self.remembered.remember(&account.id));
        tracing::info!(
            target: "signin.two_factor.verified",
            account_id = %account.id,
            provider = %provider_name,
            remembered = remember_device,
            "Two-factor challenge completed"
        );
        Ok(TwoFactorResult {
            outcome: SignInOutcome::Success,
            remembered_device,
        })
    }

    /// Complete a two-factor challenge with a one-time recovery code.
    ///
    /// Recovery codes are high-entropy, so failures here deliberately do not
    /// count toward the lockout counter; a bad code is simply `Failed`.
    pub async fn complete_two_factor_by_recovery_code(
        &self,
        challenge: &TwoFactorChallenge,
        code: &str,
    ) -> Result<SignInOutcome> {
        let now = SystemTime::now();
        let Some(account) = self.store.find_by_id(&challenge.account_id).await? else {
            return Ok(SignInOutcome::Failed);
        };

        if let Some(blocked) = self.pre_sign_in_check(&account, now).await? {
            return Ok(blocked);
        }

        let provider = self.tokens.registry().get(provider_names::RECOVERY)?;
        let valid = match provider.validate(purpose::TWO_FACTOR, code, &account).await {
            Ok(valid) => valid,
            Err(SeawallError::TokenAlreadyUsed | SeawallError::InvalidOrExpiredToken) => false,
            Err(err) => return Err(err),
        };

        if !valid {
            tracing::info!(
                target: "signin.two_factor.recovery_rejected",
                account_id = %account.id,
                "Recovery code rejected"
            );
            return Ok(SignInOutcome::Failed);
        }

        let account = self.clear_failed_attempts(account).await?;
        self.sessions
            .establish_session(&account.id, false, AuthenticationMethod::RecoveryCode)
            .await?;
        tracing::info!(
            target: "signin.two_factor.recovery_verified",
            account_id = %account.id,
            "Signed in with a recovery code"
        );
        Ok(SignInOutcome::Success)
    }

    /// Sign in via an external login, skipping the password step.
    pub async fn external_login_sign_in(
        &self,
        provider: &str,
        provider_key: &str,
        persistent: bool,
        device_token: Option<&str>,
    ) -> Result<SignInOutcome> {
        let now = SystemTime::now();
        let Some(account) = self.store.find_by_login(provider, provider_key).await? else {
            tracing::info!(
                target: "signin.external.unknown_login",
                provider = %provider,
                "External sign-in for unknown login"
            );
            return Ok(SignInOutcome::Failed);
        };

        if let Some(blocked) = self.pre_sign_in_check(&account, now).await? {
            return Ok(blocked);
        }

        self.sign_in_or_challenge(&account, persistent, Some(provider), device_token)
            .await
    }

    /// Sign out of the named scheme through the session layer.
    pub async fn sign_out(&self, scheme: &str) -> Result<()> {
        self.sessions.sign_out(scheme).await
    }

    /// Policy and lockout gates shared by every entry point. Returns the
    /// terminal outcome when the account may not proceed.
    async fn pre_sign_in_check(
        &self,
        account: &Account,
        now: SystemTime,
    ) -> Result<Option<SignInOutcome>> {
        if !self.policy.can_sign_in(account).await? {
            tracing::info!(
                target: "signin.policy.not_allowed",
                account_id = %account.id,
                "Pre-sign-in policy refused the account"
            );
            return Ok(Some(SignInOutcome::NotAllowed));
        }
        if self.lockout.is_locked_out(account, now) {
            tracing::warn!(
                target: "signin.lockout.blocked",
                account_id = %account.id,
                "Sign-in attempt while locked out"
            );
            return Ok(Some(SignInOutcome::LockedOut));
        }
        Ok(None)
    }

    async fn persist_lockout(
        &self,
        account: &Account,
        decision: LockoutDecision,
    ) -> Result<Account> {
        if decision.failed_access_count == account.failed_access_count
            && decision.lockout_end == account.lockout_end
        {
            return Ok(account.clone());
        }
        let mut updated = account.clone();
        updated.failed_access_count = decision.failed_access_count;
        updated.lockout_end = decision.lockout_end;
        self.store.update(updated).await
    }

    async fn clear_failed_attempts(&self, account: Account) -> Result<Account> {
        if account.failed_access_count == 0 && account.lockout_end.is_none() {
            return Ok(account);
        }
        let mut updated = account;
        updated.failed_access_count = self.lockout.on_success();
        updated.lockout_end = None;
        self.store.update(updated).await
    }
}
